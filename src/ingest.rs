//! Ingestion pipeline orchestration.
//!
//! Coordinates the indexing flow: staged record → projection → embedding →
//! assembly → batched upload. Every record either ends up in the index or
//! in the report's failure list with its id and the stage that failed, so a
//! rerun can target just those ids with `--only`.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use tracing::{info, warn};

use crate::assembler::assemble;
use crate::config::{Config, EmptyTextPolicy};
use crate::embedding::{create_embedder, embed, Embedder};
use crate::error::PipelineError;
use crate::index::{upload_batch, AzureSearchIndex, SearchIndex};
use crate::models::{SearchDocument, SourceRecord};
use crate::progress::{IngestProgressEvent, IngestProgressReporter, ProgressMode};
use crate::projector::project;
use crate::source::{MongoSource, RecordSource, StagingDir};

#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    pub empty_text: EmptyTextPolicy,
    /// Embedding calls in flight at once; results keep input order.
    pub concurrency: usize,
}

impl IngestOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            empty_text: config.embedding.empty_text,
            concurrency: config.ingest.concurrency,
        }
    }
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            empty_text: EmptyTextPolicy::default(),
            concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Embed,
    Upload,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureStage::Embed => write!(f, "embed"),
            FailureStage::Upload => write!(f, "upload"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordFailure {
    pub id: String,
    pub stage: FailureStage,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub uploaded: usize,
    pub failures: Vec<RecordFailure>,
}

impl IngestReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.id.as_str()).collect()
    }
}

/// Project, embed, and assemble one record.
pub async fn prepare_document(
    embedder: &dyn Embedder,
    record: &SourceRecord,
    policy: EmptyTextPolicy,
) -> Result<SearchDocument, PipelineError> {
    let projected = project(&record.resume());
    let embedding = embed(embedder, &projected.embedding_source_text, policy).await?;
    Ok(assemble(&record.id, projected, embedding))
}

/// Run records through the pipeline and upload everything that embedded.
///
/// Never aborts on a single record: embedding and upload failures are
/// collected in the returned report.
pub async fn ingest_records(
    embedder: &dyn Embedder,
    index: &dyn SearchIndex,
    records: &[SourceRecord],
    opts: &IngestOptions,
    progress: &dyn IngestProgressReporter,
) -> IngestReport {
    let started_at = Utc::now();
    let total = records.len();
    let policy = opts.empty_text;

    let mut prepared = stream::iter(records.iter().map(|record| async move {
        (record, prepare_document(embedder, record, policy).await)
    }))
    .buffered(opts.concurrency.max(1));

    let mut docs = Vec::with_capacity(total);
    let mut failures = Vec::new();
    let mut n = 0u64;

    while let Some((record, result)) = prepared.next().await {
        n += 1;
        match result {
            Ok(doc) => docs.push(doc),
            Err(e) => {
                warn!(id = %record.id, error = %e, "record not embedded");
                failures.push(RecordFailure {
                    id: record.id.clone(),
                    stage: FailureStage::Embed,
                    error: e.to_string(),
                });
            }
        }
        progress.report(IngestProgressEvent::Embedding {
            n,
            total: total as u64,
        });
    }

    let mut uploaded = 0usize;
    let mut sent = 0u64;
    for chunk in docs.chunks(index.max_batch_size().max(1)) {
        for outcome in upload_batch(index, chunk).await {
            if outcome.succeeded {
                uploaded += 1;
            } else {
                let error = outcome.error.unwrap_or_default();
                warn!(id = %outcome.id, %error, "document not uploaded");
                failures.push(RecordFailure {
                    id: outcome.id,
                    stage: FailureStage::Upload,
                    error,
                });
            }
        }
        sent += chunk.len() as u64;
        progress.report(IngestProgressEvent::Uploading {
            n: sent,
            total: docs.len() as u64,
        });
    }

    info!(
        index = index.name(),
        total,
        uploaded,
        failed = failures.len(),
        "ingest finished"
    );

    IngestReport {
        started_at,
        finished_at: Utc::now(),
        total,
        uploaded,
        failures,
    }
}

/// `resume-search init-index`
pub async fn run_init_index(config: &Config) -> Result<()> {
    let index = AzureSearchIndex::new(&config.index, &config.embedding)?;
    index.ensure_schema().await?;
    println!("index {} ready ({} dims)", config.index.name, config.index.dims);
    Ok(())
}

/// `resume-search fetch`: copy resume records from MongoDB into the staging
/// directory.
pub async fn run_fetch(config: &Config) -> Result<()> {
    let source = MongoSource::connect(&config.source).await?;
    let records = source.fetch().await?;
    let staging = StagingDir::new(&config.source.staging_dir);
    let staged = staging.write_all(&records)?;

    println!("fetch {}", source.describe());
    println!("  records: {}", records.len());
    println!("  staged: {} -> {}", staged.written, staging.root().display());
    if staged.removed > 0 {
        println!("  removed stale: {}", staged.removed);
    }
    println!("ok");
    Ok(())
}

/// Flags of `resume-search index`.
#[derive(Debug, Clone, Default)]
pub struct IndexArgs {
    pub dry_run: bool,
    pub limit: Option<usize>,
    pub only: Vec<String>,
    pub progress: Option<ProgressMode>,
}

/// `resume-search index`: read staged records and upload them.
///
/// `--dry-run` projects every record and reports what would be sent without
/// building any network client.
pub async fn run_index(config: &Config, args: &IndexArgs) -> Result<IngestReport> {
    let progress = args
        .progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();

    let staging = StagingDir::new(&config.source.staging_dir);
    progress.report(IngestProgressEvent::Loading {
        source: staging.describe(),
    });
    let records = select_records(staging.fetch().await?, &args.only, args.limit);

    if args.dry_run {
        let empty = records
            .iter()
            .filter(|r| project(&r.resume()).embedding_source_text.trim().is_empty())
            .count();
        println!("index {} (dry-run)", config.index.name);
        println!("  records: {}", records.len());
        println!("  empty embedding text: {}", empty);
        let now = Utc::now();
        return Ok(IngestReport {
            started_at: now,
            finished_at: now,
            total: records.len(),
            uploaded: 0,
            failures: Vec::new(),
        });
    }

    if !config.embedding.is_enabled() {
        bail!("Indexing requires embeddings. Set [embedding] provider in config.");
    }
    let embedder = create_embedder(&config.embedding)?;
    let index = AzureSearchIndex::new(&config.index, &config.embedding)?;

    let report = ingest_records(
        embedder.as_ref(),
        &index,
        &records,
        &IngestOptions::from_config(config),
        progress.as_ref(),
    )
    .await;

    print_report(&config.index.name, &report);
    Ok(report)
}

/// Apply `--only` then `--limit`. Ids named in `--only` that are not staged
/// are logged.
fn select_records(
    mut records: Vec<SourceRecord>,
    only: &[String],
    limit: Option<usize>,
) -> Vec<SourceRecord> {
    if !only.is_empty() {
        let wanted: HashSet<&str> = only.iter().map(String::as_str).collect();
        records.retain(|r| wanted.contains(r.id.as_str()));
        let found: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
        for id in only.iter().filter(|id| !found.contains(id.as_str())) {
            warn!(%id, "requested record not found in staging directory");
        }
    }
    if let Some(limit) = limit {
        records.truncate(limit);
    }
    records
}

fn print_report(index_name: &str, report: &IngestReport) {
    let elapsed = report.finished_at - report.started_at;
    println!("index {}", index_name);
    println!("  records: {}", report.total);
    println!("  uploaded: {}", report.uploaded);
    println!("  failed: {}", report.failures.len());
    for failure in &report.failures {
        println!("    {}  [{}] {}", failure.id, failure.stage, failure.error);
    }
    println!("  elapsed: {:.1}s", elapsed.num_milliseconds() as f64 / 1000.0);
    if report.is_success() {
        println!("ok");
    } else {
        println!("retry with: --only {}", report.failed_ids().join(" "));
    }
}
