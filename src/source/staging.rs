//! Staging directory: one pretty-printed `<id>.json` per record.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::RecordSource;
use crate::assembler::document_id_from_key;
use crate::models::SourceRecord;

/// Result of [`StagingDir::write_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageReport {
    /// Distinct files written.
    pub written: usize,
    /// Files from earlier runs whose record was not fetched this time.
    pub removed: usize,
}

pub struct StagingDir {
    root: PathBuf,
}

impl StagingDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a record with this id is staged at.
    ///
    /// `%`, `/` and `\` are percent-encoded, so distinct ids always map to
    /// distinct files and [`read_one`] recovers the original id.
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.json", encode_file_stem(id)))
    }

    /// Write every record, replacing files with the same id, then remove
    /// staged files whose record is no longer in `records`.
    ///
    /// A record whose id was already written in this call replaces the
    /// earlier one and is logged; [`StageReport::written`] counts distinct
    /// files.
    pub fn write_all(&self, records: &[SourceRecord]) -> Result<StageReport> {
        std::fs::create_dir_all(&self.root).with_context(|| {
            format!("failed to create staging directory {}", self.root.display())
        })?;

        let mut written: HashMap<PathBuf, &str> = HashMap::new();
        for record in records {
            let path = self.path_for(&record.id);
            if let Some(previous) = written.get(&path) {
                warn!(
                    id = %record.id,
                    previous = %previous,
                    path = %path.display(),
                    "duplicate record id, keeping the later record"
                );
            }
            let body = serde_json::to_string_pretty(&record.payload)?;
            std::fs::write(&path, body)
                .with_context(|| format!("failed to write {}", path.display()))?;
            written.insert(path, &record.id);
        }

        let mut removed = 0;
        for path in self.staged_files()? {
            if !written.contains_key(&path) {
                std::fs::remove_file(&path)
                    .with_context(|| format!("failed to remove stale {}", path.display()))?;
                debug!(path = %path.display(), "removed stale staged record");
                removed += 1;
            }
        }

        Ok(StageReport {
            written: written.len(),
            removed,
        })
    }

    fn staged_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type().is_file()
                && path.extension().and_then(|e| e.to_str()) == Some("json")
            {
                files.push(path.to_path_buf());
            }
        }
        Ok(files)
    }

    /// Read every `*.json` directly inside the directory, sorted by id.
    ///
    /// Files that are not valid JSON are skipped with a warning.
    pub fn read_all(&self) -> Result<Vec<SourceRecord>> {
        if !self.root.exists() {
            bail!(
                "Staging directory does not exist: {} (run `resume-search fetch` first)",
                self.root.display()
            );
        }

        let mut records = Vec::new();
        for path in self.staged_files()? {
            match read_one(&path) {
                Ok(record) => records.push(record),
                Err(e) => warn!(path = %path.display(), error = %format!("{:#}", e), "skipping staged file"),
            }
        }

        records.sort_by(|a, b| a.id.cmp(&b.id));
        debug!(dir = %self.root.display(), records = records.len(), "read staging directory");
        Ok(records)
    }
}

#[async_trait]
impl RecordSource for StagingDir {
    fn describe(&self) -> String {
        format!("staging:{}", self.root.display())
    }

    async fn fetch(&self) -> Result<Vec<SourceRecord>> {
        self.read_all()
    }
}

/// Read a single staged record; the id is the decoded file name minus
/// `.json`.
pub fn read_one(path: &Path) -> Result<SourceRecord> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("invalid record path {}", path.display()))?;
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let payload: serde_json::Value = serde_json::from_str(&body)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    let id = decode_file_stem(document_id_from_key(file_name));
    Ok(SourceRecord::new(id, payload))
}

fn encode_file_stem(id: &str) -> String {
    let mut stem = String::with_capacity(id.len());
    for c in id.chars() {
        match c {
            '%' => stem.push_str("%25"),
            '/' => stem.push_str("%2F"),
            '\\' => stem.push_str("%5C"),
            _ => stem.push(c),
        }
    }
    stem
}

/// Inverse of `encode_file_stem`; unknown escapes are kept as written.
fn decode_file_stem(stem: &str) -> String {
    let mut id = String::with_capacity(stem.len());
    let mut rest = stem;
    while let Some(pos) = rest.find('%') {
        id.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let decoded = match tail.get(..3) {
            Some("%25") => Some('%'),
            Some("%2F") => Some('/'),
            Some("%5C") => Some('\\'),
            _ => None,
        };
        match decoded {
            Some(c) => {
                id.push(c);
                rest = &tail[3..];
            }
            None => {
                id.push('%');
                rest = &tail[1..];
            }
        }
    }
    id.push_str(rest);
    id
}
