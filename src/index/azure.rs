//! Azure AI Search REST client.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | schema | `PUT {endpoint}/indexes/{name}` |
//! | upload | `POST {endpoint}/indexes/{name}/docs/index` (`mergeOrUpload`) |
//! | query | `POST {endpoint}/indexes/{name}/docs/search` |
//!
//! Requests carry the admin key from the environment variable named by
//! `index.api_key_env` in the `api-key` header.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use super::{SearchIndex, SearchRequest, SELECT_FIELDS, VECTOR_FIELD};
use crate::config::{EmbeddingConfig, IndexConfig};
use crate::error::PipelineError;
use crate::models::{SearchDocument, SearchHit, UploadOutcome};

const HNSW_ALGORITHM: &str = "hnsw";
const VECTOR_PROFILE: &str = "hnswProfile";
const VECTORIZER: &str = "vectorizer";

pub struct AzureSearchIndex {
    client: reqwest::Client,
    endpoint: String,
    config: IndexConfig,
    definition: Value,
}

impl AzureSearchIndex {
    pub fn new(config: &IndexConfig, embedding: &EmbeddingConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| anyhow!("index.endpoint must be set to use Azure AI Search"))?;
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow!("{} environment variable not set", config.api_key_env))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "api-key",
            HeaderValue::from_str(api_key.trim()).context("invalid Azure Search API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .context("failed to build Azure Search HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            config: config.clone(),
            definition: index_definition(config, embedding),
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/indexes/{}{}?api-version={}",
            self.endpoint, self.config.name, path, self.config.api_version
        )
    }
}

#[async_trait]
impl SearchIndex for AzureSearchIndex {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn dims(&self) -> Option<usize> {
        Some(self.config.dims)
    }

    fn max_batch_size(&self) -> usize {
        self.config.max_batch_size
    }

    async fn ensure_schema(&self) -> Result<()> {
        let response = self
            .client
            .put(self.url(""))
            .json(&self.definition)
            .send()
            .await
            .context("index definition request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }
        info!(index = %self.config.name, dims = self.config.dims, "index created or updated");
        Ok(())
    }

    async fn upload(&self, docs: &[SearchDocument]) -> Result<Vec<UploadOutcome>> {
        if docs.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .client
            .post(self.url("/docs/index"))
            .json(&upload_body(docs)?)
            .send()
            .await
            .context("upload request failed")?;

        let status = response.status();
        // 207 means some documents failed; the body still has every result.
        if status != StatusCode::OK && status != StatusCode::MULTI_STATUS {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let payload: IndexingResponse = response
            .json()
            .await
            .context("failed to parse upload response")?;
        Ok(match_outcomes(docs, payload))
    }

    async fn query(&self, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        let body = search_body(request, &self.config.semantic_configuration);
        debug!(index = %self.config.name, top = request.top, semantic = request.semantic, "querying index");

        let response = self
            .client
            .post(self.url("/docs/search"))
            .json(&body)
            .send()
            .await
            .context("search request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let payload: Value = response
            .json()
            .await
            .context("failed to parse search response")?;
        Ok(parse_hits(&payload))
    }
}

/// 4xx answers are rejections; everything else means the service is
/// unavailable.
fn status_error(status: StatusCode, body: String) -> anyhow::Error {
    let err = if status.is_client_error()
        && status != StatusCode::TOO_MANY_REQUESTS
        && status != StatusCode::UNAUTHORIZED
        && status != StatusCode::FORBIDDEN
    {
        PipelineError::Rejected {
            status: status.as_u16(),
            message: body,
        }
    } else {
        PipelineError::ProviderUnavailable(format!("Azure Search error {}: {}", status, body))
    };
    anyhow::Error::new(err)
}

/// Build the index definition: fields, HNSW vector profile, optional Azure
/// OpenAI vectorizer, and the semantic configuration.
pub fn index_definition(config: &IndexConfig, embedding: &EmbeddingConfig) -> Value {
    let vectorizer = match (
        embedding.provider.as_str(),
        embedding.endpoint.as_deref(),
        embedding.deployment.as_deref(),
    ) {
        ("azure_openai", Some(endpoint), Some(deployment)) => Some(json!({
            "name": VECTORIZER,
            "kind": "azureOpenAI",
            "azureOpenAIParameters": {
                "resourceUri": endpoint.trim_end_matches('/'),
                "deploymentId": deployment,
                "modelName": deployment,
            }
        })),
        _ => None,
    };

    let mut profile = json!({ "name": VECTOR_PROFILE, "algorithm": HNSW_ALGORITHM });
    if vectorizer.is_some() {
        profile["vectorizer"] = json!(VECTORIZER);
    }

    json!({
        "name": config.name,
        "fields": [
            { "name": "id", "type": "Edm.String", "key": true, "filterable": true },
            { "name": "document_type", "type": "Edm.String", "filterable": true, "facetable": true },
            { "name": "name", "type": "Edm.String", "searchable": true, "filterable": false, "sortable": true },
            { "name": "summary", "type": "Edm.String", "searchable": true, "filterable": false },
            { "name": "skills", "type": "Collection(Edm.String)", "searchable": true, "filterable": true, "facetable": true },
            { "name": "experience", "type": "Edm.String", "searchable": true, "filterable": false },
            { "name": "education", "type": "Edm.String", "searchable": true, "filterable": false },
            {
                "name": VECTOR_FIELD,
                "type": "Collection(Edm.Single)",
                "searchable": true,
                "dimensions": config.dims,
                "vectorSearchProfile": VECTOR_PROFILE
            }
        ],
        "vectorSearch": {
            "algorithms": [{
                "name": HNSW_ALGORITHM,
                "kind": "hnsw",
                "hnswParameters": {
                    "m": config.hnsw_m,
                    "efConstruction": config.hnsw_ef_construction
                }
            }],
            "profiles": [profile],
            "vectorizers": vectorizer.into_iter().collect::<Vec<_>>()
        },
        "semantic": {
            "configurations": [{
                "name": config.semantic_configuration,
                "prioritizedFields": {
                    "titleField": { "fieldName": "name" },
                    "prioritizedContentFields": [
                        { "fieldName": "summary" },
                        { "fieldName": "experience" },
                        { "fieldName": "education" }
                    ],
                    "prioritizedKeywordsFields": [{ "fieldName": "skills" }]
                }
            }]
        }
    })
}

fn upload_body(docs: &[SearchDocument]) -> Result<Value> {
    let mut actions = Vec::with_capacity(docs.len());
    for doc in docs {
        let mut action = match serde_json::to_value(doc)? {
            Value::Object(map) => map,
            _ => bail!("document {} did not serialize to an object", doc.id),
        };
        action.insert("@search.action".to_string(), json!("mergeOrUpload"));
        actions.push(Value::Object(action));
    }
    Ok(json!({ "value": actions }))
}

fn search_body(request: &SearchRequest, semantic_configuration: &str) -> Value {
    let mut body = Map::new();
    body.insert(
        "vectorQueries".to_string(),
        json!([{
            "kind": "vector",
            "vector": request.vector,
            "k": request.k_nearest_neighbors,
            "fields": VECTOR_FIELD
        }]),
    );
    body.insert("select".to_string(), json!(SELECT_FIELDS.join(",")));
    body.insert("top".to_string(), json!(request.top));
    if let Some(document_type) = &request.document_type {
        body.insert(
            "filter".to_string(),
            json!(format!("document_type eq '{}'", document_type.replace('\'', "''"))),
        );
    }
    if let Some(text) = &request.search_text {
        body.insert("search".to_string(), json!(text));
        if request.semantic {
            body.insert("queryType".to_string(), json!("semantic"));
            body.insert(
                "semanticConfiguration".to_string(),
                json!(semantic_configuration),
            );
        }
    }
    Value::Object(body)
}

#[derive(Debug, Deserialize)]
struct IndexingResponse {
    #[serde(default)]
    value: Vec<IndexingResult>,
}

#[derive(Debug, Deserialize)]
struct IndexingResult {
    key: String,
    status: bool,
    #[serde(rename = "errorMessage", default)]
    error_message: Option<String>,
    #[serde(rename = "statusCode", default)]
    status_code: Option<u16>,
}

/// Pair each submitted document with the service's result for its key.
fn match_outcomes(docs: &[SearchDocument], payload: IndexingResponse) -> Vec<UploadOutcome> {
    let mut by_key: HashMap<String, IndexingResult> = HashMap::new();
    for result in payload.value {
        by_key.entry(result.key.clone()).or_insert(result);
    }

    docs.iter()
        .map(|doc| match by_key.get(&doc.id) {
            Some(r) if r.status => UploadOutcome::ok(&doc.id),
            Some(r) => UploadOutcome::failed(
                &doc.id,
                PipelineError::Rejected {
                    status: r.status_code.unwrap_or(400),
                    message: r.error_message.clone().unwrap_or_default(),
                },
            ),
            None => UploadOutcome::failed(&doc.id, "no result reported for document"),
        })
        .collect()
}

fn parse_hits(payload: &Value) -> Vec<SearchHit> {
    let Some(items) = payload.get("value").and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .map(|item| SearchHit {
            id: str_field(item, "id"),
            name: str_field(item, "name"),
            summary: str_field(item, "summary"),
            skills: item
                .get("skills")
                .and_then(Value::as_array)
                .map(|skills| {
                    skills
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            experience: str_field(item, "experience"),
            education: str_field(item, "education"),
            score: item
                .get("@search.score")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
            semantic_score: item
                .get("@search.rerankerScore")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
        })
        .collect()
}

fn str_field(item: &Value, key: &str) -> String {
    item.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
