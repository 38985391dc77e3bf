//! Tests that drive the compiled `crag` binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn crag_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("crag");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("docs")).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/crag.sqlite"

[documents]
root = "{}/docs"

[server]
bind = "127.0.0.1:0"
"#,
        root.display(),
        root.display()
    );

    let config_path = config_dir.join("crag.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_crag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = crag_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run crag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_crag(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data").join("crag.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, first) = run_crag(&config_path, &["init"]);
    assert!(first, "First init failed");
    let (_, _, second) = run_crag(&config_path, &["init"]);
    assert!(second, "Second init failed (not idempotent)");
}

#[test]
fn test_courses_on_empty_index() {
    let (_tmp, config_path) = setup_test_env();
    run_crag(&config_path, &["init"]);

    let (stdout, stderr, success) = run_crag(&config_path, &["courses"]);
    assert!(success, "courses failed: stderr={}", stderr);
    assert!(stdout.contains("Courses:     0"));
}

#[test]
fn test_ingest_errors_when_embeddings_disabled() {
    let (tmp, config_path) = setup_test_env();
    fs::write(
        tmp.path().join("docs").join("course.txt"),
        "Course Title: Solo\n\nLesson 1: Only\nSome text here.\n",
    )
    .unwrap();

    let (_, stderr, success) = run_crag(&config_path, &["ingest"]);
    assert!(!success);
    assert!(stderr.contains("disabled"), "stderr={}", stderr);
}

#[test]
fn test_ingest_reports_unparseable_documents() {
    let (tmp, config_path) = setup_test_env();
    fs::write(tmp.path().join("docs").join("notes.txt"), "no course header\n").unwrap();

    let (stdout, stderr, success) = run_crag(&config_path, &["ingest"]);
    assert!(success, "ingest failed: stderr={}", stderr);
    assert!(stdout.contains("courses added:    0"));
    assert!(stdout.contains("failed:           1"));
    assert!(stdout.contains("notes.txt"));
}

#[test]
fn test_ingest_missing_folder() {
    let (tmp, config_path) = setup_test_env();
    let missing = tmp.path().join("nope");

    let (_, stderr, success) = run_crag(
        &config_path,
        &["ingest", "--folder", missing.to_str().unwrap()],
    );
    assert!(!success);
    assert!(stderr.contains("does not exist"));
}

#[test]
fn test_ask_errors_when_llm_disabled() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_crag(&config_path, &["ask", "What is Rust?"]);
    assert!(!success);
    assert!(stderr.contains("LLM provider is disabled"), "stderr={}", stderr);
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_crag(&tmp.path().join("absent.toml"), &["courses"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
