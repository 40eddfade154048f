//! TOML configuration for the record source, embedding provider, search
//! index, ingestion, search defaults, and HTTP server.
//!
//! Secrets never live in the file: each external client names the
//! environment variable that holds its key (`api_key_env`, `uri_env`).

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::SearchMode;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_discriminator_field")]
    pub discriminator_field: String,
    #[serde(default = "default_discriminator_value")]
    pub discriminator_value: String,
    #[serde(default = "default_payload_field")]
    pub payload_field: String,
    #[serde(default = "default_uri_env")]
    pub uri_env: String,
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            collection: default_collection(),
            discriminator_field: default_discriminator_field(),
            discriminator_value: default_discriminator_value(),
            payload_field: default_payload_field(),
            uri_env: default_uri_env(),
            staging_dir: default_staging_dir(),
        }
    }
}

fn default_database() -> String {
    "ContentProcess".to_string()
}
fn default_collection() -> String {
    "Processes".to_string()
}
fn default_discriminator_field() -> String {
    "target_schema.ClassName".to_string()
}
fn default_discriminator_value() -> String {
    "Resume".to_string()
}
fn default_payload_field() -> String {
    "result".to_string()
}
fn default_uri_env() -> String {
    "RESUME_SOURCE_URI".to_string()
}
fn default_staging_dir() -> PathBuf {
    PathBuf::from("./resumes")
}

/// What to send the embedding provider when a record has no text at all.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmptyTextPolicy {
    /// Substitute a single space so every record still gets a vector.
    #[default]
    Placeholder,
    /// Fail the record without calling the provider.
    Skip,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Azure deployment name, or the model name for plain OpenAI.
    #[serde(default)]
    pub deployment: Option<String>,
    #[serde(default = "default_embedding_api_version")]
    pub api_version: String,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub empty_text: EmptyTextPolicy,
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            endpoint: None,
            deployment: None,
            api_version: default_embedding_api_version(),
            dims: None,
            timeout_secs: default_embedding_timeout_secs(),
            empty_text: EmptyTextPolicy::default(),
            api_key_env: None,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_embedding_api_version() -> String {
    "2024-08-01-preview".to_string()
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    /// Environment variable holding the provider key.
    pub fn key_env(&self) -> &str {
        match (&self.api_key_env, self.provider.as_str()) {
            (Some(name), _) => name,
            (None, "openai") => "OPENAI_API_KEY",
            (None, _) => "AZURE_OPENAI_API_KEY",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_index_name")]
    pub name: String,
    #[serde(default = "default_index_api_version")]
    pub api_version: String,
    #[serde(default = "default_index_dims")]
    pub dims: usize,
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    #[serde(default = "default_index_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_semantic_configuration")]
    pub semantic_configuration: String,
    #[serde(default = "default_hnsw_m")]
    pub hnsw_m: u32,
    #[serde(default = "default_hnsw_ef_construction")]
    pub hnsw_ef_construction: u32,
    #[serde(default = "default_index_key_env")]
    pub api_key_env: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            name: default_index_name(),
            api_version: default_index_api_version(),
            dims: default_index_dims(),
            max_batch_size: default_max_batch_size(),
            timeout_secs: default_index_timeout_secs(),
            semantic_configuration: default_semantic_configuration(),
            hnsw_m: default_hnsw_m(),
            hnsw_ef_construction: default_hnsw_ef_construction(),
            api_key_env: default_index_key_env(),
        }
    }
}

fn default_index_name() -> String {
    "resumes".to_string()
}
fn default_index_api_version() -> String {
    "2024-07-01".to_string()
}
fn default_index_dims() -> usize {
    3072
}
fn default_max_batch_size() -> usize {
    1000
}
fn default_index_timeout_secs() -> u64 {
    60
}
fn default_semantic_configuration() -> String {
    "semanticConfig".to_string()
}
fn default_hnsw_m() -> u32 {
    10
}
fn default_hnsw_ef_construction() -> u32 {
    200
}
fn default_index_key_env() -> String {
    "AZURE_SEARCH_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_top")]
    pub default_top: usize,
    #[serde(default)]
    pub default_mode: SearchMode,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top: default_top(),
            default_mode: SearchMode::default(),
        }
    }
}

fn default_top() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:4000".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    match config.embedding.provider.as_str() {
        "disabled" | "azure_openai" | "openai" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, azure_openai, or openai.",
            other
        ),
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.deployment.is_none() {
            bail!(
                "embedding.deployment must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.provider == "azure_openai" {
            match config.embedding.endpoint.as_deref() {
                Some(url) => check_url("embedding.endpoint", url)?,
                None => bail!("embedding.endpoint is required for azure_openai"),
            }
        }
        if let Some(dims) = config.embedding.dims {
            if dims != config.index.dims {
                bail!(
                    "embedding.dims ({}) must equal index.dims ({})",
                    dims,
                    config.index.dims
                );
            }
        }
    }

    if config.index.dims == 0 {
        bail!("index.dims must be > 0");
    }
    if !(1..=1000).contains(&config.index.max_batch_size) {
        bail!("index.max_batch_size must be in [1, 1000]");
    }
    if let Some(url) = config.index.endpoint.as_deref() {
        check_url("index.endpoint", url)?;
    }

    if config.ingest.concurrency == 0 {
        bail!("ingest.concurrency must be >= 1");
    }
    if config.search.default_top == 0 {
        bail!("search.default_top must be >= 1");
    }

    Ok(())
}

fn check_url(field: &str, url: &str) -> Result<()> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        bail!("{} must be an http(s) URL, got '{}'", field, url);
    }
    Ok(())
}
