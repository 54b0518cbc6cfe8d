use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();
    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/eint.sqlite"

[search]
max_queries = 3
engines = []
academic_sources = []
social_sources = []

[pdf]
sources = []
"#,
        root.display()
    );
    let config_path = config_dir.join("eint.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_eint(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_eint"))
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run eint: {e}"));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn init_creates_database_and_is_idempotent() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_eint(&config_path, &["init"]);
    assert!(success, "init failed: stdout={stdout}, stderr={stderr}");
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data").join("eint.sqlite").exists());

    let (_, _, again) = run_eint(&config_path, &["init"]);
    assert!(again, "second init failed");
}

#[test]
fn validate_reports_reputation_as_json() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_eint(&config_path, &["validate", " Buch1202@Mail.ru "]);
    assert!(success, "validate failed: {stderr}");
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["valid"], true);
    assert_eq!(report["info"]["email"], "buch1202@mail.ru");
    assert_eq!(report["info"]["domain"], "mail.ru");

    let (stdout, _, success) = run_eint(&config_path, &["validate", "not-an-email"]);
    assert!(success);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["valid"], false);
}

#[test]
fn show_without_stored_profile_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_eint(&config_path, &["init"]);

    let (_, stderr, success) = run_eint(&config_path, &["show", "nobody@example.com"]);
    assert!(!success);
    assert!(stderr.contains("No stored profile"));
}

#[test]
fn collect_with_no_sources_stores_an_empty_profile() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_eint(&config_path, &["collect", "someone@example.com"]);
    assert!(success, "collect failed: {stderr}");
    let profile: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(profile["email"], "someone@example.com");
    assert_eq!(profile["confidence_score"], 0.0);

    let (stdout, stderr, success) = run_eint(&config_path, &["show", "someone@example.com"]);
    assert!(success, "show failed: {stderr}");
    let shown: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(shown["summary"]["name"], "Unknown");
}

#[test]
fn invalid_email_is_an_error() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_eint(&config_path, &["collect", "plainaddress"]);
    assert!(!success);
    assert!(stderr.contains("invalid email"));
}
