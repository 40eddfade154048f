//! Query pipeline: embed the query text, ask the index, return hits in the
//! index's relevance order.

use anyhow::{bail, Result};
use tracing::debug;

use crate::assembler::DOCUMENT_TYPE;
use crate::config::{Config, EmptyTextPolicy};
use crate::embedding::{create_embedder, embed, Embedder};
use crate::error::PipelineError;
use crate::index::{AzureSearchIndex, SearchIndex, SearchRequest};
use crate::models::{SearchHit, SearchMode};

/// Search resumes for `query`.
///
/// An empty or whitespace-only query returns no hits without calling the
/// embedder or the index.
pub async fn search(
    embedder: &dyn Embedder,
    index: &dyn SearchIndex,
    query: &str,
    top: usize,
    mode: SearchMode,
) -> Result<Vec<SearchHit>, PipelineError> {
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }
    if top == 0 {
        return Err(PipelineError::InvalidRequest(
            "top must be at least 1".to_string(),
        ));
    }

    let vector = embed(embedder, query, EmptyTextPolicy::Placeholder).await?;
    let request = build_request(query, vector, top, mode);
    debug!(index = index.name(), %mode, top, "running search");

    Ok(index.query(&request).await?)
}

fn build_request(query: &str, vector: Vec<f32>, top: usize, mode: SearchMode) -> SearchRequest {
    let hybrid = mode == SearchMode::Hybrid;
    SearchRequest {
        search_text: hybrid.then(|| query.to_string()),
        vector,
        k_nearest_neighbors: top,
        document_type: Some(DOCUMENT_TYPE.to_string()),
        top,
        semantic: hybrid,
    }
}

/// `resume-search search`: print hits to stdout.
pub async fn run_search(
    config: &Config,
    query: &str,
    mode: Option<SearchMode>,
    top: Option<usize>,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }
    if !config.embedding.is_enabled() {
        bail!("Search requires embeddings. Set [embedding] provider in config.");
    }

    let mode = mode.unwrap_or(config.search.default_mode);
    let top = top.unwrap_or(config.search.default_top);
    let embedder = create_embedder(&config.embedding)?;
    let index = AzureSearchIndex::new(&config.index, &config.embedding)?;

    let hits = search(embedder.as_ref(), &index, query, top, mode).await?;
    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!("{}. {} ({})", i + 1, hit.name, hit.id);
        println!(
            "   score: {:.4}  semantic: {:.4}",
            hit.score, hit.semantic_score
        );
        println!("   summary: {}", truncate_chars(&hit.summary, 100));
        println!("   skills: {}", hit.skills.join(", "));
        println!("   experience: {}", truncate_chars(&hit.experience, 150));
        println!();
    }
    Ok(())
}

/// Cut `text` to at most `max` characters, marking the cut with `...`.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte, _)) => format!("{}...", &text[..byte]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::InMemoryIndex;
    use crate::models::{SearchDocument, UploadOutcome};
    use anyhow::Result as AnyResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn model_name(&self) -> &str {
            "counting"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed_texts(&self, texts: &[String]) -> AnyResult<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    fn counting() -> CountingEmbedder {
        CountingEmbedder {
            calls: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn test_empty_query_calls_nothing() {
        let embedder = counting();
        let index = InMemoryIndex::new(Some(2));
        let hits = search(&embedder, &index, "   ", 5, SearchMode::Hybrid)
            .await
            .unwrap();
        assert!(hits.is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_top_is_invalid() {
        let embedder = counting();
        let index = InMemoryIndex::new(Some(2));
        let err = search(&embedder, &index, "nurse", 0, SearchMode::Vector)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_returns_index_hits() {
        let embedder = counting();
        let index = InMemoryIndex::new(Some(2));
        index
            .upload(&[SearchDocument {
                id: "r1".to_string(),
                document_type: "resume".to_string(),
                name: "Jane".to_string(),
                summary: String::new(),
                skills: Vec::new(),
                experience: String::new(),
                education: String::new(),
                embedding: vec![1.0, 0.0],
            }])
            .await
            .unwrap();
        let hits = search(&embedder, &index, "nurse", 3, SearchMode::Vector)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "r1");
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    /// Returns fixed hits in ascending score order, whatever the request.
    struct FixedOrderIndex;

    fn hit(id: &str, score: f64) -> SearchHit {
        SearchHit {
            id: id.to_string(),
            name: id.to_uppercase(),
            summary: String::new(),
            skills: Vec::new(),
            experience: String::new(),
            education: String::new(),
            score,
            semantic_score: 0.0,
        }
    }

    #[async_trait]
    impl SearchIndex for FixedOrderIndex {
        fn name(&self) -> &str {
            "fixed"
        }
        fn dims(&self) -> Option<usize> {
            Some(2)
        }
        fn max_batch_size(&self) -> usize {
            1000
        }
        async fn ensure_schema(&self) -> AnyResult<()> {
            Ok(())
        }
        async fn upload(&self, _docs: &[SearchDocument]) -> AnyResult<Vec<UploadOutcome>> {
            Ok(Vec::new())
        }
        async fn query(&self, _request: &SearchRequest) -> AnyResult<Vec<SearchHit>> {
            Ok(vec![hit("low", 0.1), hit("mid", 0.5), hit("high", 0.9)])
        }
    }

    #[tokio::test]
    async fn test_keeps_backend_order() {
        let hits = search(&counting(), &FixedOrderIndex, "nurse", 3, SearchMode::Hybrid)
            .await
            .unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["low", "mid", "high"]);
        assert_eq!(hits[2].score, 0.9);
    }

    #[test]
    fn test_request_shape_by_mode() {
        let vector = build_request("icu nurse", vec![0.1], 7, SearchMode::Vector);
        assert_eq!(vector.search_text, None);
        assert!(!vector.semantic);
        assert_eq!(vector.k_nearest_neighbors, 7);
        assert_eq!(vector.document_type.as_deref(), Some("resume"));

        let hybrid = build_request("icu nurse", vec![0.1], 7, SearchMode::Hybrid);
        assert_eq!(hybrid.search_text.as_deref(), Some("icu nurse"));
        assert!(hybrid.semantic);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
        assert_eq!(truncate_chars("ñañaña", 2), "ña...");
    }
}
