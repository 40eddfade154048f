//! Data types that flow through the ingestion and search pipeline.
//!
//! [`ResumeRecord`] is deliberately forgiving: every field is optional and a
//! value of the wrong JSON type is treated as absent, so a half-filled or
//! partly malformed record still projects cleanly. [`SearchDocument`] is the
//! opposite: a flat, fixed-shape record whose serialized keys are exactly the
//! index schema's fields.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// A record as returned by a [`RecordSource`](crate::source::RecordSource):
/// the opaque source identifier plus the raw resume payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub id: String,
    pub payload: Value,
}

impl SourceRecord {
    pub fn new(id: impl Into<String>, payload: Value) -> Self {
        Self {
            id: id.into(),
            payload,
        }
    }

    pub fn resume(&self) -> ResumeRecord {
        ResumeRecord::from_value(self.payload.clone())
    }
}

/// Semi-structured resume as produced by the upstream content extractor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResumeRecord {
    #[serde(deserialize_with = "lenient::string")]
    pub full_name: Option<String>,
    #[serde(deserialize_with = "lenient::object")]
    pub contact_info: Option<ContactInfo>,
    #[serde(deserialize_with = "lenient::string")]
    pub summary: Option<String>,
    #[serde(deserialize_with = "lenient::entries")]
    pub education: Vec<EducationEntry>,
    #[serde(deserialize_with = "lenient::entries")]
    pub work_experience: Vec<WorkExperienceEntry>,
    #[serde(deserialize_with = "lenient::entries")]
    pub certifications: Vec<CertificationEntry>,
    #[serde(deserialize_with = "lenient::entries")]
    pub skills: Vec<SkillEntry>,
    #[serde(deserialize_with = "lenient::entries")]
    pub languages: Vec<LanguageEntry>,
    #[serde(deserialize_with = "lenient::strings")]
    pub awards: Vec<String>,
    #[serde(deserialize_with = "lenient::strings")]
    pub publications: Vec<String>,
    #[serde(deserialize_with = "lenient::strings")]
    pub volunteer_experience: Vec<String>,
    #[serde(deserialize_with = "lenient::object")]
    pub healthcare: Option<HealthcareExtension>,
    #[serde(deserialize_with = "lenient::map")]
    pub industry_extensions: Map<String, Value>,
}

impl ResumeRecord {
    /// Build a record from any JSON value. Non-object input yields an empty
    /// record.
    pub fn from_value(value: Value) -> Self {
        if !value.is_object() {
            return Self::default();
        }
        serde_json::from_value(value).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContactInfo {
    #[serde(deserialize_with = "lenient::string")]
    pub email: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub phone: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub address: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub linkedin: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub website: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EducationEntry {
    #[serde(deserialize_with = "lenient::string")]
    pub degree: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub institution: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub field_of_study: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub start_date: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub end_date: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub honors: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkExperienceEntry {
    #[serde(deserialize_with = "lenient::string")]
    pub job_title: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub employer: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub start_date: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub end_date: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub location: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub industry: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CertificationEntry {
    #[serde(deserialize_with = "lenient::string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub issuer: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub issue_date: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub expiration_date: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub credential_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SkillEntry {
    pub name: Option<SkillName>,
    #[serde(deserialize_with = "lenient::string")]
    pub level: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub category: Option<String>,
}

/// The two shapes a skill name arrives in, plus a catch-all.
///
/// Extractors sometimes wrap values as `{"value": "...", "confidence": ...}`;
/// anything that is neither a string nor such a wrapper lands in `Other`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SkillName {
    Plain(String),
    Nested { value: Value },
    Other(Value),
}

impl SkillName {
    /// Resolve to the skill's display string; unsupported shapes resolve to
    /// the empty string.
    pub fn resolve(&self) -> &str {
        match self {
            SkillName::Plain(name) => name,
            SkillName::Nested {
                value: Value::String(name),
            } => name,
            SkillName::Nested { .. } | SkillName::Other(_) => "",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LanguageEntry {
    #[serde(deserialize_with = "lenient::string")]
    pub language: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub proficiency: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HealthcareExtension {
    #[serde(deserialize_with = "lenient::string")]
    pub npi_number: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub license_state: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub license_number: Option<String>,
    #[serde(deserialize_with = "lenient::strings")]
    pub specialties: Vec<String>,
    #[serde(deserialize_with = "lenient::strings")]
    pub board_certifications: Vec<String>,
    #[serde(deserialize_with = "lenient::strings")]
    pub emr_systems: Vec<String>,
    #[serde(deserialize_with = "lenient::number")]
    pub clinical_experience_years: Option<f64>,
    #[serde(deserialize_with = "lenient::strings")]
    pub patient_populations: Vec<String>,
}

/// Flattened text derived from a [`ResumeRecord`] by
/// [`project`](crate::projector::project).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectedFields {
    pub display_name: String,
    pub summary_text: String,
    pub skills_list: Vec<String>,
    pub experience_text: String,
    pub education_text: String,
    pub embedding_source_text: String,
}

/// Upload-ready record. Serializes to exactly the index schema's fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub id: String,
    pub document_type: String,
    pub name: String,
    pub summary: String,
    pub skills: Vec<String>,
    pub experience: String,
    pub education: String,
    pub embedding: Vec<f32>,
}

/// Result of submitting one document to the index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadOutcome {
    pub id: String,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadOutcome {
    pub fn ok(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            succeeded: true,
            error: None,
        }
    }

    pub fn failed(id: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            id: id.into(),
            succeeded: false,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Nearest-neighbour query on the embedding field only.
    Vector,
    /// Query text and vector together, with semantic re-ranking.
    #[default]
    Hybrid,
}

impl FromStr for SearchMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vector" => Ok(SearchMode::Vector),
            "hybrid" => Ok(SearchMode::Hybrid),
            other => anyhow::bail!("Unknown search mode: {}. Use vector or hybrid.", other),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMode::Vector => f.write_str("vector"),
            SearchMode::Hybrid => f.write_str("hybrid"),
        }
    }
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub name: String,
    pub summary: String,
    pub skills: Vec<String>,
    pub experience: String,
    pub education: String,
    pub score: f64,
    /// Semantic re-ranker score; 0 when the backend does not provide one.
    pub semantic_score: f64,
}

/// Deserializers that treat wrongly-typed values as absent.
mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::{Map, Value};

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => Some(s),
            _ => None,
        })
    }

    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(Value::deserialize(d)?.as_f64())
    }

    pub fn strings<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        })
    }

    /// Sequence of mappings; non-mapping entries are skipped one by one.
    pub fn entries<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items
                .into_iter()
                .filter(Value::is_object)
                .filter_map(|v| serde_json::from_value(v).ok())
                .collect(),
            _ => Vec::new(),
        })
    }

    pub fn object<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(match Value::deserialize(d)? {
            v @ Value::Object(_) => serde_json::from_value(v).ok(),
            _ => None,
        })
    }

    pub fn map<'de, D: Deserializer<'de>>(d: D) -> Result<Map<String, Value>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Object(m) => m,
            _ => Map::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_object_is_empty_record() {
        let r = ResumeRecord::from_value(json!({}));
        assert!(r.full_name.is_none());
        assert!(r.skills.is_empty());
        assert!(r.industry_extensions.is_empty());
    }

    #[test]
    fn test_non_object_payload_is_empty_record() {
        let r = ResumeRecord::from_value(json!(["not", "a", "resume"]));
        assert!(r.full_name.is_none());
        assert!(r.work_experience.is_empty());
    }

    #[test]
    fn test_wrong_types_treated_as_absent() {
        let r = ResumeRecord::from_value(json!({
            "full_name": 42,
            "summary": null,
            "skills": "Python",
            "awards": ["Best Nurse", 7],
            "contact_info": "n/a",
        }));
        assert!(r.full_name.is_none());
        assert!(r.summary.is_none());
        assert!(r.skills.is_empty());
        assert_eq!(r.awards, vec!["Best Nurse"]);
        assert!(r.contact_info.is_none());
    }

    #[test]
    fn test_non_mapping_entries_skipped() {
        let r = ResumeRecord::from_value(json!({
            "work_experience": [
                "freelance",
                {"job_title": "Nurse", "employer": "City Hospital"},
                null
            ]
        }));
        assert_eq!(r.work_experience.len(), 1);
        assert_eq!(r.work_experience[0].job_title.as_deref(), Some("Nurse"));
    }

    #[test]
    fn test_skill_name_shapes() {
        let r = ResumeRecord::from_value(json!({
            "skills": [
                {"name": "Python"},
                {"name": {"value": "Rust", "confidence": 0.93}},
                {"name": {"value": 3}},
                {"name": 5},
                {"level": "Advanced"}
            ]
        }));
        let resolved: Vec<&str> = r
            .skills
            .iter()
            .map(|s| s.name.as_ref().map(SkillName::resolve).unwrap_or(""))
            .collect();
        assert_eq!(resolved, vec!["Python", "Rust", "", "", ""]);
        assert_eq!(r.skills[1].name, Some(SkillName::Nested { value: json!("Rust") }));
    }

    #[test]
    fn test_healthcare_extension_parsed() {
        let r = ResumeRecord::from_value(json!({
            "healthcare": {
                "npi_number": "1234567890",
                "emr_systems": ["Epic", "Cerner"],
                "clinical_experience_years": 10.5
            }
        }));
        let hc = r.healthcare.unwrap();
        assert_eq!(hc.emr_systems, vec!["Epic", "Cerner"]);
        assert_eq!(hc.clinical_experience_years, Some(10.5));
    }

    #[test]
    fn test_search_document_has_exact_keys() {
        let doc = SearchDocument {
            id: "a".into(),
            document_type: "resume".into(),
            name: "n".into(),
            summary: String::new(),
            skills: vec![],
            experience: String::new(),
            education: String::new(),
            embedding: vec![0.5],
        };
        let value = serde_json::to_value(&doc).unwrap();
        let mut keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "document_type",
                "education",
                "embedding",
                "experience",
                "id",
                "name",
                "skills",
                "summary"
            ]
        );
    }

    #[test]
    fn test_search_mode_parse() {
        assert_eq!("vector".parse::<SearchMode>().unwrap(), SearchMode::Vector);
        assert_eq!("hybrid".parse::<SearchMode>().unwrap(), SearchMode::Hybrid);
        assert!("keyword".parse::<SearchMode>().is_err());
    }
}
