//! Projection of a [`ResumeRecord`] into the flat text fields used for
//! indexing and embedding.
//!
//! Pure and infallible: every missing value renders as an empty string, and
//! absent sections are left out of the embedding text instead of producing
//! empty headers.

use crate::models::{ProjectedFields, ResumeRecord, SkillName};

/// Display name used when a record carries no usable `full_name`.
pub const ANONYMOUS_CANDIDATE: &str = "Anonymous Candidate";

const ENTRY_SEPARATOR: &str = " | ";
const SECTION_SEPARATOR: &str = "\n\n";

pub fn project(resume: &ResumeRecord) -> ProjectedFields {
    let full_name = non_empty(resume.full_name.as_deref());
    let summary = resume.summary.as_deref().unwrap_or("");
    let skills = skill_names(resume);

    ProjectedFields {
        display_name: full_name.unwrap_or(ANONYMOUS_CANDIDATE).to_string(),
        summary_text: summary.to_string(),
        experience_text: experience_text(resume),
        education_text: education_text(resume),
        embedding_source_text: embedding_source_text(resume, &skills),
        skills_list: skills,
    }
}

/// Resolved skill names in source order, empty names dropped.
pub fn skill_names(resume: &ResumeRecord) -> Vec<String> {
    resume
        .skills
        .iter()
        .filter_map(|skill| skill.name.as_ref())
        .map(SkillName::resolve)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn experience_text(resume: &ResumeRecord) -> String {
    resume
        .work_experience
        .iter()
        .map(|exp| {
            let mut line = format!(
                "{} at {}",
                text(exp.job_title.as_deref()),
                text(exp.employer.as_deref())
            );
            if let Some(desc) = non_empty(exp.description.as_deref()) {
                line.push_str(": ");
                line.push_str(desc);
            }
            line
        })
        .collect::<Vec<_>>()
        .join(ENTRY_SEPARATOR)
}

fn education_text(resume: &ResumeRecord) -> String {
    resume
        .education
        .iter()
        .map(|edu| {
            format!(
                "{} from {}",
                text(edu.degree.as_deref()),
                text(edu.institution.as_deref())
            )
        })
        .collect::<Vec<_>>()
        .join(ENTRY_SEPARATOR)
}

fn embedding_source_text(resume: &ResumeRecord, skills: &[String]) -> String {
    let mut sections: Vec<String> = Vec::new();

    if let Some(name) = non_empty(resume.full_name.as_deref()) {
        sections.push(format!("Name: {}", name));
    }
    if let Some(summary) = non_empty(resume.summary.as_deref()) {
        sections.push(format!("Summary: {}", summary));
    }
    if !skills.is_empty() {
        sections.push(format!("Skills: {}", skills.join(", ")));
    }

    for exp in &resume.work_experience {
        let mut line = format!(
            "Position: {} at {}",
            text(exp.job_title.as_deref()),
            text(exp.employer.as_deref())
        );
        if let Some(desc) = non_empty(exp.description.as_deref()) {
            line.push_str(" - ");
            line.push_str(desc);
        }
        sections.push(line);
    }

    for edu in &resume.education {
        sections.push(format!(
            "Education: {} from {}",
            text(edu.degree.as_deref()),
            text(edu.institution.as_deref())
        ));
    }

    for cert in &resume.certifications {
        sections.push(format!("Certification: {}", text(cert.name.as_deref())));
    }

    sections.join(SECTION_SEPARATOR)
}

fn text(value: Option<&str>) -> &str {
    value.unwrap_or("")
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}
