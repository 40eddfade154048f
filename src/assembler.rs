//! Assembly of upload-ready [`SearchDocument`]s.

use crate::models::{ProjectedFields, SearchDocument};

/// Discriminator stored in every document this crate uploads.
pub const DOCUMENT_TYPE: &str = "resume";

/// Combine projected fields and an embedding into a [`SearchDocument`].
///
/// `id_hint` is used verbatim; callers pass a stable source identifier
/// (see [`document_id_from_key`]) so re-uploads overwrite rather than
/// duplicate.
pub fn assemble(id_hint: &str, projected: ProjectedFields, embedding: Vec<f32>) -> SearchDocument {
    SearchDocument {
        id: id_hint.to_string(),
        document_type: DOCUMENT_TYPE.to_string(),
        name: projected.display_name,
        summary: projected.summary_text,
        skills: projected.skills_list,
        experience: projected.experience_text,
        education: projected.education_text,
        embedding,
    }
}

/// Derive a document id from a source key, dropping a trailing
/// file-extension-like suffix (`64f1c0ffee.json` → `64f1c0ffee`).
pub fn document_id_from_key(key: &str) -> &str {
    match key.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.len() <= 5
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            stem
        }
        _ => key,
    }
}
