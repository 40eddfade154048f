//! Binary-level tests for commands that need no network access.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_resume-search"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let staging = root.join("resumes");
    fs::create_dir_all(&staging).unwrap();
    fs::write(
        staging.join("64f1c0ffee0000000000abcd.json"),
        r#"{
  "full_name": "Jane Doe",
  "summary": "ICU nurse",
  "skills": [{"name": "Triage"}, {"name": {"value": "Ventilators"}}, {"name": 5}],
  "work_experience": [{"job_title": "Nurse", "employer": "City Hospital", "description": "ICU care"}],
  "education": [{"degree": "BSN", "institution": "State University"}]
}"#,
    )
    .unwrap();
    fs::write(staging.join("blank.json"), "{}").unwrap();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_path = config_dir.join("resume-search.toml");
    fs::write(
        &config_path,
        format!(
            r#"[source]
staging_dir = "{}"

[index]
name = "resumes-test"
"#,
            staging.display()
        ),
    )
    .unwrap();

    (tmp, config_path)
}

fn run(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(binary())
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run resume-search binary");
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

#[test]
fn test_project_prints_fields() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("resumes/64f1c0ffee0000000000abcd.json");

    let (stdout, stderr, success) = run(&config_path, &["project", file.to_str().unwrap()]);
    assert!(success, "stderr: {}", stderr);
    let fields: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(fields["display_name"], "Jane Doe");
    assert_eq!(fields["skills_list"], serde_json::json!(["Triage", "Ventilators"]));
    assert_eq!(fields["experience_text"], "Nurse at City Hospital: ICU care");
    assert_eq!(fields["education_text"], "BSN from State University");
}

#[test]
fn test_project_does_not_need_config() {
    let (tmp, _config_path) = setup_test_env();
    let file = tmp.path().join("resumes/blank.json");
    let missing = tmp.path().join("nope.toml");

    let (stdout, stderr, success) = run(&missing, &["project", file.to_str().unwrap()]);
    assert!(success, "stderr: {}", stderr);
    assert!(stdout.contains("Anonymous Candidate"));
}

#[test]
fn test_index_dry_run_counts_records() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run(&config_path, &["index", "--dry-run", "--progress", "off"]);
    assert!(success, "stderr: {}", stderr);
    assert!(stdout.contains("index resumes-test (dry-run)"));
    assert!(stdout.contains("records: 2"));
    assert!(stdout.contains("empty embedding text: 1"));
}

#[test]
fn test_index_dry_run_only_filters() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _stderr, success) = run(
        &config_path,
        &["index", "--dry-run", "--progress", "off", "--only", "blank"],
    );
    assert!(success);
    assert!(stdout.contains("records: 1"));
}

#[test]
fn test_index_without_embeddings_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_stdout, stderr, success) = run(&config_path, &["index", "--progress", "off"]);
    assert!(!success);
    assert!(stderr.contains("embedding"));
}

#[test]
fn test_index_rejects_unknown_progress_mode() {
    let (_tmp, config_path) = setup_test_env();

    let (_stdout, stderr, success) = run(&config_path, &["index", "--dry-run", "--progress", "loud"]);
    assert!(!success);
    assert!(stderr.contains("unknown progress mode"));
}

#[test]
fn test_search_empty_query() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run(&config_path, &["search", "  "]);
    assert!(success, "stderr: {}", stderr);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_invalid_config_rejected() {
    let (tmp, _config_path) = setup_test_env();
    let bad = tmp.path().join("bad.toml");
    fs::write(&bad, "[index]\nmax_batch_size = 5000\n").unwrap();

    let (_stdout, stderr, success) = run(&bad, &["search", "nurse"]);
    assert!(!success);
    assert!(stderr.contains("max_batch_size"));
}

#[test]
fn test_completions() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _stderr, success) = run(&config_path, &["completions", "bash"]);
    assert!(success);
    assert!(stdout.contains("resume-search"));
}
