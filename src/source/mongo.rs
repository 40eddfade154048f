//! MongoDB (and Cosmos DB Mongo API) record source.
//!
//! Selects documents whose `discriminator_field` equals
//! `discriminator_value` and reads the resume from `payload_field`. The
//! connection string comes from the environment variable named by
//! `source.uri_env`.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bson::{Bson, Document};
use futures::TryStreamExt;
use mongodb::{Client, Collection};
use serde_json::Value;
use tracing::{info, warn};

use super::RecordSource;
use crate::config::SourceConfig;
use crate::models::SourceRecord;

pub struct MongoSource {
    collection: Collection<Document>,
    filter: Document,
    payload_field: String,
    label: String,
}

impl MongoSource {
    pub async fn connect(config: &SourceConfig) -> Result<Self> {
        let uri = std::env::var(&config.uri_env)
            .ok()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| anyhow!("{} environment variable not set", config.uri_env))?;

        let client = Client::with_uri_str(uri.trim())
            .await
            .context("failed to connect to MongoDB")?;
        let collection = client
            .database(&config.database)
            .collection::<Document>(&config.collection);

        Ok(Self {
            collection,
            filter: discriminator_filter(config),
            payload_field: config.payload_field.clone(),
            label: format!("mongodb:{}/{}", config.database, config.collection),
        })
    }
}

#[async_trait]
impl RecordSource for MongoSource {
    fn describe(&self) -> String {
        self.label.clone()
    }

    async fn fetch(&self) -> Result<Vec<SourceRecord>> {
        let cursor = self
            .collection
            .find(self.filter.clone())
            .await
            .with_context(|| format!("query failed on {}", self.label))?;
        let docs: Vec<Document> = cursor
            .try_collect()
            .await
            .with_context(|| format!("failed to read results from {}", self.label))?;

        let mut records = Vec::with_capacity(docs.len());
        for doc in docs {
            match to_record(doc, &self.payload_field) {
                Some(record) => records.push(record),
                None => warn!(source = %self.label, "skipping document without _id"),
            }
        }
        info!(source = %self.label, records = records.len(), "fetched resume records");
        Ok(records)
    }
}

/// `{ "<discriminator_field>": "<discriminator_value>" }`; dotted field
/// names address nested keys.
fn discriminator_filter(config: &SourceConfig) -> Document {
    let mut filter = Document::new();
    filter.insert(
        config.discriminator_field.clone(),
        config.discriminator_value.clone(),
    );
    filter
}

/// Any other `_id` type is keyed by its relaxed extended-JSON text.
fn to_record(mut doc: Document, payload_field: &str) -> Option<SourceRecord> {
    let id = match doc.get("_id")? {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) if s.is_empty() => return None,
        Bson::String(s) => s.clone(),
        Bson::Int32(n) => n.to_string(),
        Bson::Int64(n) => n.to_string(),
        Bson::Null | Bson::Undefined => return None,
        other => other.clone().into_relaxed_extjson().to_string(),
    };
    let payload = doc
        .remove(payload_field)
        .map(Bson::into_relaxed_extjson)
        .unwrap_or(Value::Null);
    Some(SourceRecord::new(id, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, oid::ObjectId};

    #[test]
    fn test_filter_uses_configured_discriminator() {
        let filter = discriminator_filter(&SourceConfig::default());
        assert_eq!(filter, doc! { "target_schema.ClassName": "Resume" });
    }

    #[test]
    fn test_object_id_becomes_hex() {
        let oid = ObjectId::parse_str("64f1c0ffee0000000000abcd").unwrap();
        let record = to_record(
            doc! { "_id": oid, "result": { "full_name": "Jane", "skills": [] } },
            "result",
        )
        .unwrap();
        assert_eq!(record.id, "64f1c0ffee0000000000abcd");
        assert_eq!(record.payload["full_name"], "Jane");
    }

    #[test]
    fn test_string_id_and_missing_payload() {
        let record = to_record(doc! { "_id": "resume-7" }, "result").unwrap();
        assert_eq!(record.id, "resume-7");
        assert_eq!(record.payload, Value::Null);
    }

    #[test]
    fn test_missing_id_is_skipped() {
        assert!(to_record(doc! { "result": {} }, "result").is_none());
        assert!(to_record(doc! { "_id": "", "result": {} }, "result").is_none());
    }

    #[test]
    fn test_other_id_types_use_extended_json() {
        let record = to_record(doc! { "_id": 4.5, "result": {} }, "result").unwrap();
        assert_eq!(record.id, "4.5");

        let record = to_record(doc! { "_id": { "a": "x", "b": 7 } }, "result").unwrap();
        assert_eq!(record.id, r#"{"a":"x","b":7}"#);
    }
}
