//! Embedding provider abstraction and implementations.
//!
//! Defines the [`Embedder`] trait and concrete implementations:
//! - **[`DisabledEmbedder`]**: returns errors; used when embeddings are not configured.
//! - **[`AzureOpenAIEmbedder`]**: calls an Azure OpenAI embedding deployment.
//! - **[`OpenAIEmbedder`]**: calls the OpenAI embeddings API.
//!
//! [`embed`] is the single-text wrapper used by ingestion and search. It
//! does not retry: a failed call is reported as
//! [`PipelineError::ProviderUnavailable`] and the caller decides what to do
//! with the record.
//!
//! # Provider Selection
//!
//! ```rust,no_run
//! # use resume_search::config::EmbeddingConfig;
//! # use resume_search::embedding::create_embedder;
//! let config = EmbeddingConfig::default(); // provider = "disabled"
//! let embedder = create_embedder(&config).unwrap();
//! assert_eq!(embedder.model_name(), "disabled");
//! ```

mod openai;

pub use openai::{AzureOpenAIEmbedder, OpenAIEmbedder};

use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::config::{EmbeddingConfig, EmptyTextPolicy};
use crate::error::PipelineError;

/// Text substituted for empty input under [`EmptyTextPolicy::Placeholder`].
pub const EMPTY_TEXT_PLACEHOLDER: &str = " ";

/// Trait for embedding providers.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model or deployment identifier.
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `3072`).
    fn dims(&self) -> usize;
    /// Embed a batch of texts; one vector per input, in input order.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single text and return its vector.
///
/// Empty (or whitespace-only) text is handled per `policy` rather than
/// passed through to the provider, which would reject it. A vector whose
/// length differs from [`Embedder::dims`] fails with
/// [`PipelineError::DimensionMismatch`]; a `dims` of `0` means unknown.
pub async fn embed(
    embedder: &dyn Embedder,
    text: &str,
    policy: EmptyTextPolicy,
) -> Result<Vec<f32>, PipelineError> {
    let input = if text.trim().is_empty() {
        match policy {
            EmptyTextPolicy::Skip => return Err(PipelineError::EmptyInput),
            EmptyTextPolicy::Placeholder => EMPTY_TEXT_PLACEHOLDER,
        }
    } else {
        text
    };

    debug!(model = embedder.model_name(), chars = input.len(), "embedding text");
    let vectors = embedder
        .embed_texts(&[input.to_string()])
        .await
        .map_err(|e| PipelineError::provider(format!("{:#}", e)))?;

    let vector = vectors
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::provider("empty embedding response"))?;

    let expected = embedder.dims();
    if expected > 0 && vector.len() != expected {
        return Err(PipelineError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(vector)
}

// ============ Disabled Provider ============

/// A no-op embedder that always returns errors.
///
/// Used when `embedding.provider = "disabled"` in the configuration.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed_texts(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("Embedding provider is disabled")
    }
}

/// Create the [`Embedder`] named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledEmbedder`] |
/// | `"azure_openai"` | [`AzureOpenAIEmbedder`] |
/// | `"openai"` | [`OpenAIEmbedder`] |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledEmbedder)),
        "azure_openai" => Ok(Box::new(AzureOpenAIEmbedder::new(config)?)),
        "openai" => Ok(Box::new(OpenAIEmbedder::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every batch it is asked to embed.
    struct RecordingEmbedder {
        seen: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl Embedder for RecordingEmbedder {
        fn model_name(&self) -> &str {
            "recording"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.seen.lock().unwrap().push(texts.to_vec());
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    fn recording() -> RecordingEmbedder {
        RecordingEmbedder {
            seen: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn test_embed_returns_first_vector() {
        let e = recording();
        let v = embed(&e, "Name: Jane", EmptyTextPolicy::Placeholder)
            .await
            .unwrap();
        assert_eq!(v, vec![1.0, 0.0]);
        assert_eq!(e.seen.lock().unwrap()[0], vec!["Name: Jane".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_text_placeholder() {
        let e = recording();
        embed(&e, "", EmptyTextPolicy::Placeholder).await.unwrap();
        assert_eq!(
            e.seen.lock().unwrap()[0],
            vec![EMPTY_TEXT_PLACEHOLDER.to_string()]
        );
    }

    #[tokio::test]
    async fn test_empty_text_skip_does_not_call_provider() {
        let e = recording();
        let err = embed(&e, "  \n", EmptyTextPolicy::Skip).await.unwrap_err();
        assert_eq!(err, PipelineError::EmptyInput);
        assert!(e.seen.lock().unwrap().is_empty());
    }

    /// Claims three dimensions but returns two.
    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        fn model_name(&self) -> &str {
            "short"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    #[tokio::test]
    async fn test_wrong_length_vector_is_dimension_mismatch() {
        let err = embed(&ShortEmbedder, "Name: Jane", EmptyTextPolicy::Placeholder)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        );
    }

    #[tokio::test]
    async fn test_disabled_is_provider_unavailable() {
        let err = embed(&DisabledEmbedder, "text", EmptyTextPolicy::Placeholder)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ProviderUnavailable(_)));
    }

    #[test]
    fn test_create_disabled() {
        let e = create_embedder(&EmbeddingConfig::default()).unwrap();
        assert_eq!(e.model_name(), "disabled");
        assert_eq!(e.dims(), 0);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_different_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }
}
