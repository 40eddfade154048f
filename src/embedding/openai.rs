//! HTTP embedders for Azure OpenAI deployments and the OpenAI API.
//!
//! Both services speak the same response shape (`data[].embedding` with an
//! `index`), so parsing is shared. Neither embedder retries; the request
//! timeout comes from `embedding.timeout_secs`.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::Embedder;
use crate::config::EmbeddingConfig;

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// Embedder backed by an Azure OpenAI embedding deployment.
///
/// Calls `POST {endpoint}/openai/deployments/{deployment}/embeddings` with
/// the `api-key` header taken from the environment variable named by
/// [`EmbeddingConfig::key_env`].
pub struct AzureOpenAIEmbedder {
    client: reqwest::Client,
    url: String,
    deployment: String,
    dims: usize,
}

impl AzureOpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| anyhow!("embedding.endpoint required for Azure OpenAI provider"))?;
        let deployment = config
            .deployment
            .clone()
            .ok_or_else(|| anyhow!("embedding.deployment required for Azure OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow!("embedding.dims required for Azure OpenAI provider"))?;
        let api_key = read_key(config.key_env())?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "api-key",
            HeaderValue::from_str(api_key.trim()).context("invalid Azure OpenAI API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .context("failed to build Azure OpenAI HTTP client")?;

        Ok(Self {
            client,
            url: deployment_url(endpoint, &deployment, &config.api_version),
            deployment,
            dims,
        })
    }
}

#[async_trait]
impl Embedder for AzureOpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.deployment
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingRequest {
            model: None,
            input: texts,
        };
        post_embeddings(&self.client, &self.url, &body, texts.len(), "Azure OpenAI").await
    }
}

/// Embedder backed by the public OpenAI embeddings API.
///
/// `embedding.deployment` carries the model name (e.g.
/// `"text-embedding-3-large"`); the key is sent as a bearer token.
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dims: usize,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .deployment
            .clone()
            .ok_or_else(|| anyhow!("embedding.deployment required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow!("embedding.dims required for OpenAI provider"))?;
        let api_key = read_key(config.key_env())?;

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
                .context("invalid OpenAI API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .context("failed to build OpenAI HTTP client")?;

        let url = config
            .endpoint
            .as_deref()
            .map(|e| format!("{}/v1/embeddings", e.trim_end_matches('/')))
            .unwrap_or_else(|| OPENAI_EMBEDDINGS_URL.to_string());

        Ok(Self {
            client,
            url,
            model,
            dims,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingRequest {
            model: Some(&self.model),
            input: texts,
        };
        post_embeddings(&self.client, &self.url, &body, texts.len(), "OpenAI").await
    }
}

fn read_key(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => bail!("{} environment variable not set", var),
    }
}

fn deployment_url(endpoint: &str, deployment: &str, api_version: &str) -> String {
    format!(
        "{}/openai/deployments/{}/embeddings?api-version={}",
        endpoint.trim_end_matches('/'),
        deployment,
        api_version
    )
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

async fn post_embeddings(
    client: &reqwest::Client,
    url: &str,
    body: &EmbeddingRequest<'_>,
    expected: usize,
    service: &str,
) -> Result<Vec<Vec<f32>>> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .with_context(|| format!("{} embedding request failed", service))?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("{} API error {}: {}", service, status, body_text);
    }

    let payload: EmbeddingResponse = response
        .json()
        .await
        .with_context(|| format!("failed to parse {} embedding response", service))?;
    parse_embeddings(payload, expected)
}

/// Return the vectors ordered by their `index`, checking the count.
fn parse_embeddings(payload: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
    if payload.data.len() != expected {
        bail!(
            "embedding response carried {} vectors for {} inputs",
            payload.data.len(),
            expected
        );
    }
    let mut data = payload.data;
    data.sort_by_key(|d| d.index.unwrap_or(0));
    Ok(data.into_iter().map(|d| d.embedding).collect())
}
