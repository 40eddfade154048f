//! Stub providers shared by the integration tests.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use resume_search::embedding::Embedder;
use resume_search::progress::{IngestProgressEvent, IngestProgressReporter};
use serde_json::{json, Value};
use std::sync::Mutex;

pub const DIMS: usize = 32;

/// Deterministic bag-of-words embedder: each lowercase token adds 1.0 to
/// the bucket picked by the sum of its bytes.
pub struct BagOfWordsEmbedder;

pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let bucket = token
            .to_lowercase()
            .bytes()
            .map(|b| b as usize)
            .sum::<usize>()
            % DIMS;
        v[bucket] += 1.0;
    }
    v
}

#[async_trait]
impl Embedder for BagOfWordsEmbedder {
    fn model_name(&self) -> &str {
        "bag-of-words"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| bag_of_words(t)).collect())
    }
}

/// Fails any text containing `marker`, embeds the rest like
/// [`BagOfWordsEmbedder`].
pub struct FailingEmbedder {
    pub marker: String,
}

#[async_trait]
impl Embedder for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.iter().any(|t| t.contains(&self.marker)) {
            bail!("503 Service Unavailable");
        }
        Ok(texts.iter().map(|t| bag_of_words(t)).collect())
    }
}

/// Always fails, like an unreachable provider.
pub struct DownEmbedder;

#[async_trait]
impl Embedder for DownEmbedder {
    fn model_name(&self) -> &str {
        "down"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed_texts(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("connection refused")
    }
}

/// Collects progress events for assertions.
#[derive(Default)]
pub struct RecordingProgress {
    pub events: Mutex<Vec<IngestProgressEvent>>,
}

impl IngestProgressReporter for RecordingProgress {
    fn report(&self, event: IngestProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn nurse_resume() -> Value {
    json!({
        "full_name": "Jane Doe",
        "summary": "Registered nurse with ten years of intensive care experience",
        "skills": [{"name": "Triage"}, {"name": {"value": "Ventilator management"}}],
        "work_experience": [
            {"job_title": "Nurse", "employer": "City Hospital", "description": "ICU care"}
        ],
        "education": [{"degree": "BSN", "institution": "State University"}]
    })
}

pub fn welder_resume() -> Value {
    json!({
        "full_name": "Sam Ortiz",
        "summary": "Certified welder for pipelines and structural steel",
        "skills": [{"name": "TIG welding"}, {"name": "Blueprint reading"}],
        "work_experience": [
            {"job_title": "Welder", "employer": "Gulf Fabrication"}
        ],
        "certifications": [{"name": "AWS D1.1"}]
    })
}

pub fn accountant_resume() -> Value {
    json!({
        "full_name": "Priya Raman",
        "summary": "Accountant focused on audits and tax filings",
        "skills": ["Excel", {"name": "QuickBooks"}],
        "education": [{"degree": "BCom", "institution": "Delhi University"}]
    })
}
