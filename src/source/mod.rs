//! Where resume records come from.
//!
//! A [`RecordSource`] yields [`SourceRecord`]s: an id taken from the source
//! key plus the raw resume payload. Two implementations exist:
//!
//! | Source | Type | Used by |
//! |--------|------|---------|
//! | MongoDB / Cosmos DB (Mongo API) collection | [`MongoSource`] | `fetch` |
//! | Directory of `<id>.json` files | [`StagingDir`] | `index`, `project` |
//!
//! `fetch` copies the database into the staging directory once; indexing
//! then works from disk so it can be re-run or narrowed with `--only`
//! without touching the database again.

mod mongo;
mod staging;

pub use mongo::MongoSource;
pub use staging::{read_one, StageReport, StagingDir};

use anyhow::Result;
use async_trait::async_trait;

use crate::models::SourceRecord;

/// A queryable store of resume records.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Human-readable location, for logs.
    fn describe(&self) -> String;

    /// Return every record in a stable order.
    async fn fetch(&self) -> Result<Vec<SourceRecord>>;
}
