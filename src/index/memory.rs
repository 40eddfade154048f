//! In-memory [`SearchIndex`] for tests and offline runs.
//!
//! Documents live in a `HashMap` behind `std::sync::RwLock`, keyed by id, so
//! re-uploading a document replaces it. Vector queries are brute-force
//! cosine similarity. Hybrid queries blend min-max normalized vector and
//! term-overlap scores; there is no semantic re-ranker, so
//! `semantic_score` is always `0.0`.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::{SearchIndex, SearchRequest};
use crate::embedding::cosine_similarity;
use crate::error::PipelineError;
use crate::models::{SearchDocument, SearchHit, UploadOutcome};

/// Weight of the vector score in hybrid mode.
const HYBRID_ALPHA: f64 = 0.5;

pub struct InMemoryIndex {
    name: String,
    dims: Option<usize>,
    max_batch_size: usize,
    docs: RwLock<HashMap<String, SearchDocument>>,
}

impl InMemoryIndex {
    /// Create an empty index. `dims = None` accepts vectors of any length.
    pub fn new(dims: Option<usize>) -> Self {
        Self {
            name: "memory".to_string(),
            dims,
            max_batch_size: 1000,
            docs: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }

    pub fn len(&self) -> usize {
        self.docs.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &str) -> Option<SearchDocument> {
        self.docs.read().ok().and_then(|d| d.get(id).cloned())
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl SearchIndex for InMemoryIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn dims(&self) -> Option<usize> {
        self.dims
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn upload(&self, docs: &[SearchDocument]) -> Result<Vec<UploadOutcome>> {
        let mut stored = self
            .docs
            .write()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))?;

        let outcomes = docs
            .iter()
            .map(|doc| match self.dims {
                Some(expected) if doc.embedding.len() != expected => UploadOutcome::failed(
                    &doc.id,
                    PipelineError::DimensionMismatch {
                        expected,
                        actual: doc.embedding.len(),
                    },
                ),
                _ => {
                    stored.insert(doc.id.clone(), doc.clone());
                    UploadOutcome::ok(&doc.id)
                }
            })
            .collect();
        Ok(outcomes)
    }

    async fn query(&self, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        let stored = self
            .docs
            .read()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))?;

        let candidates: Vec<&SearchDocument> = stored
            .values()
            .filter(|d| {
                request
                    .document_type
                    .as_deref()
                    .map_or(true, |t| d.document_type == t)
            })
            .collect();

        let vector_scores: Vec<f64> = candidates
            .iter()
            .map(|d| cosine_similarity(&request.vector, &d.embedding) as f64)
            .collect();

        let scores = match request.search_text.as_deref() {
            Some(text) if !text.trim().is_empty() => {
                let terms = tokenize(text);
                let lexical: Vec<f64> = candidates
                    .iter()
                    .map(|d| term_overlap(&terms, d))
                    .collect();
                let norm_vector = normalize_scores(&vector_scores);
                let norm_lexical = normalize_scores(&lexical);
                norm_vector
                    .iter()
                    .zip(norm_lexical)
                    .map(|(v, k)| HYBRID_ALPHA * v + (1.0 - HYBRID_ALPHA) * k)
                    .collect()
            }
            _ => vector_scores,
        };

        let mut hits: Vec<SearchHit> = candidates
            .into_iter()
            .zip(scores)
            .map(|(doc, score)| SearchHit {
                id: doc.id.clone(),
                name: doc.name.clone(),
                summary: doc.summary.clone(),
                skills: doc.skills.clone(),
                experience: doc.experience.clone(),
                education: doc.education.clone(),
                score,
                semantic_score: 0.0,
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(request.top);
        Ok(hits)
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Fraction of query terms present anywhere in the document's text fields.
fn term_overlap(terms: &HashSet<String>, doc: &SearchDocument) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let mut haystack = tokenize(&doc.name);
    haystack.extend(tokenize(&doc.summary));
    haystack.extend(tokenize(&doc.experience));
    haystack.extend(tokenize(&doc.education));
    for skill in &doc.skills {
        haystack.extend(tokenize(skill));
    }
    let matched = terms.iter().filter(|t| haystack.contains(*t)).count();
    matched as f64 / terms.len() as f64
}

/// Min-max normalize to `[0.0, 1.0]`; equal scores all become `1.0`.
fn normalize_scores(scores: &[f64]) -> Vec<f64> {
    let s_min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let s_max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    scores
        .iter()
        .map(|s| {
            if (s_max - s_min).abs() < f64::EPSILON {
                1.0
            } else {
                (s - s_min) / (s_max - s_min)
            }
        })
        .collect()
}
