//! Search index abstraction and the batch upload contract.
//!
//! The [`SearchIndex`] trait is the narrow seam to the managed search
//! service: upload one bounded batch, answer one query. Implementations:
//! - [`AzureSearchIndex`]: Azure AI Search REST API.
//! - [`InMemoryIndex`]: brute-force in-process index for tests.
//!
//! [`upload_batch`] sits on top of the trait and owns the per-document
//! contract: dimension checks, chunking to the service's batch limit, and
//! exactly one [`UploadOutcome`] per input document in input order.

mod azure;
mod memory;

pub use azure::{index_definition, AzureSearchIndex};
pub use memory::InMemoryIndex;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::models::{SearchDocument, SearchHit, UploadOutcome};

/// Fields returned for every hit.
pub const SELECT_FIELDS: &[&str] = &["id", "name", "summary", "skills", "experience", "education"];

/// Name of the vector field in the index schema.
pub const VECTOR_FIELD: &str = "embedding";

/// A backend-neutral query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Raw query text for lexical matching and semantic re-ranking; `None`
    /// for a pure vector query.
    pub search_text: Option<String>,
    pub vector: Vec<f32>,
    pub k_nearest_neighbors: usize,
    /// Restrict results to documents with this `document_type`.
    pub document_type: Option<String>,
    pub top: usize,
    /// Ask the backend for semantic re-ranking scores.
    pub semantic: bool,
}

/// Abstract search index.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Index name, for logs and reports.
    fn name(&self) -> &str;

    /// Declared dimension of the vector field, if the backend has one.
    fn dims(&self) -> Option<usize>;

    /// Largest number of documents accepted in one [`upload`](SearchIndex::upload) call.
    fn max_batch_size(&self) -> usize;

    /// Create or update the index definition.
    async fn ensure_schema(&self) -> Result<()>;

    /// Upload (merge-or-upload) one batch of at most
    /// [`max_batch_size`](SearchIndex::max_batch_size) documents.
    ///
    /// Returns one outcome per document in input order. An `Err` means the
    /// call as a whole failed and no per-document result is known.
    async fn upload(&self, docs: &[SearchDocument]) -> Result<Vec<UploadOutcome>>;

    /// Run a query; hits come back in backend relevance order.
    async fn query(&self, request: &SearchRequest) -> Result<Vec<SearchHit>>;
}

/// Upload documents in batches and report one outcome per document.
///
/// Documents whose embedding length disagrees with the index dimension are
/// rejected without being sent. A failed network call fails every document
/// in that batch and nothing else.
pub async fn upload_batch(index: &dyn SearchIndex, docs: &[SearchDocument]) -> Vec<UploadOutcome> {
    let mut outcomes: Vec<Option<UploadOutcome>> = vec![None; docs.len()];
    let mut sendable: Vec<usize> = Vec::with_capacity(docs.len());

    for (i, doc) in docs.iter().enumerate() {
        match index.dims() {
            Some(expected) if doc.embedding.len() != expected => {
                let err = PipelineError::DimensionMismatch {
                    expected,
                    actual: doc.embedding.len(),
                };
                warn!(id = %doc.id, %err, "rejecting document before upload");
                outcomes[i] = Some(UploadOutcome::failed(&doc.id, err));
            }
            _ => sendable.push(i),
        }
    }

    let batch_size = index.max_batch_size().max(1);
    for positions in sendable.chunks(batch_size) {
        let batch: Vec<SearchDocument> = positions.iter().map(|&i| docs[i].clone()).collect();
        debug!(index = index.name(), docs = batch.len(), "uploading batch");

        match index.upload(&batch).await {
            Ok(results) if results.len() == batch.len() => {
                for (&i, outcome) in positions.iter().zip(results) {
                    outcomes[i] = Some(outcome);
                }
            }
            Ok(results) => {
                let err = PipelineError::provider(format!(
                    "index reported {} results for {} documents",
                    results.len(),
                    batch.len()
                ));
                for &i in positions {
                    outcomes[i] = Some(UploadOutcome::failed(&docs[i].id, &err));
                }
            }
            Err(e) => {
                let err = PipelineError::from(e);
                warn!(index = index.name(), docs = batch.len(), %err, "batch upload failed");
                for &i in positions {
                    outcomes[i] = Some(UploadOutcome::failed(&docs[i].id, &err));
                }
            }
        }
    }

    outcomes
        .into_iter()
        .zip(docs)
        .map(|(outcome, doc)| {
            outcome.unwrap_or_else(|| UploadOutcome::failed(&doc.id, "no outcome recorded"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::Mutex;

    fn doc(id: &str, dims: usize) -> SearchDocument {
        SearchDocument {
            id: id.to_string(),
            document_type: "resume".to_string(),
            name: id.to_string(),
            summary: String::new(),
            skills: Vec::new(),
            experience: String::new(),
            education: String::new(),
            embedding: vec![0.5; dims],
        }
    }

    /// Accepts everything, records batch sizes, optionally fails one batch.
    struct ScriptedIndex {
        batch_size: usize,
        fail_batch: Option<usize>,
        batches: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl SearchIndex for ScriptedIndex {
        fn name(&self) -> &str {
            "scripted"
        }
        fn dims(&self) -> Option<usize> {
            Some(3)
        }
        fn max_batch_size(&self) -> usize {
            self.batch_size
        }
        async fn ensure_schema(&self) -> Result<()> {
            Ok(())
        }
        async fn upload(&self, docs: &[SearchDocument]) -> Result<Vec<UploadOutcome>> {
            let mut batches = self.batches.lock().unwrap();
            let n = batches.len();
            batches.push(docs.iter().map(|d| d.id.clone()).collect());
            if self.fail_batch == Some(n) {
                bail!("503 Service Unavailable");
            }
            Ok(docs.iter().map(|d| UploadOutcome::ok(&d.id)).collect())
        }
        async fn query(&self, _request: &SearchRequest) -> Result<Vec<SearchHit>> {
            Ok(Vec::new())
        }
    }

    fn scripted(batch_size: usize, fail_batch: Option<usize>) -> ScriptedIndex {
        ScriptedIndex {
            batch_size,
            fail_batch,
            batches: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn test_chunks_preserve_order() {
        let index = scripted(2, None);
        let docs: Vec<_> = (0..5).map(|i| doc(&format!("d{}", i), 3)).collect();
        let outcomes = upload_batch(&index, &docs).await;

        let ids: Vec<&str> = outcomes.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["d0", "d1", "d2", "d3", "d4"]);
        assert!(outcomes.iter().all(|o| o.succeeded));
        let sizes: Vec<usize> = index.batches.lock().unwrap().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected_locally() {
        let index = scripted(10, None);
        let docs = vec![doc("a", 3), doc("b", 3), doc("c", 3), doc("bad", 2), doc("e", 3)];
        let outcomes = upload_batch(&index, &docs).await;

        assert_eq!(outcomes.len(), 5);
        assert!(!outcomes[3].succeeded);
        assert!(outcomes[3].error.as_deref().unwrap().contains("dimension"));
        for i in [0, 1, 2, 4] {
            assert!(outcomes[i].succeeded);
        }
        assert_eq!(index.batches.lock().unwrap()[0].len(), 4);
    }

    #[tokio::test]
    async fn test_failed_batch_isolated() {
        let index = scripted(2, Some(1));
        let docs: Vec<_> = (0..5).map(|i| doc(&format!("d{}", i), 3)).collect();
        let outcomes = upload_batch(&index, &docs).await;

        let succeeded: Vec<bool> = outcomes.iter().map(|o| o.succeeded).collect();
        assert_eq!(succeeded, vec![true, true, false, false, true]);
        assert!(outcomes[2].error.as_deref().unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let index = scripted(2, None);
        assert!(upload_batch(&index, &[]).await.is_empty());
        assert!(index.batches.lock().unwrap().is_empty());
    }
}
