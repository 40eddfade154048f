//! # resume-search
//!
//! Turns semi-structured resume records into documents in a vector search
//! service and answers free-text queries against them.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────────────────┐   ┌──────────────┐
//! │ RecordSource │──▶│ project → embed → assemble │──▶│ SearchIndex  │
//! │ Mongo/staged │   └───────────────────────────┘   │ Azure/memory │
//! └──────────────┘                                   └──────┬───────┘
//!                                                           │
//!                                 ┌─────────────────────────┤
//!                                 ▼                         ▼
//!                           ┌──────────┐              ┌──────────┐
//!                           │   CLI    │              │   HTTP   │
//!                           └──────────┘              └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Resume records, search documents, hits |
//! | [`projector`] | Flatten a resume into searchable text fields |
//! | [`assembler`] | Build upload-ready documents |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Search index abstraction and batch upload |
//! | [`source`] | MongoDB and staging-directory record sources |
//! | [`ingest`] | Indexing pipeline and reports |
//! | [`search`] | Query pipeline |
//! | [`server`] | HTTP API |
//! | [`progress`] | Indexing progress on stderr |
//! | [`error`] | Pipeline failure taxonomy |

pub mod assembler;
pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod ingest;
pub mod models;
pub mod progress;
pub mod projector;
pub mod search;
pub mod server;
pub mod source;
