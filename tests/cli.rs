//! End-to-end tests driving the `mm` binary.
//!
//! Stdout is not a terminal here, so every command answers in JSON.

use assert_cmd::Command;
use serde_json::Value;
use std::path::PathBuf;
use tempfile::TempDir;

struct Home {
    _dir: TempDir,
    db: PathBuf,
    config: PathBuf,
}

impl Home {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("data").join("mirror.db");
        let config = dir.path().join("config.json");
        Self { _dir: dir, db, config }
    }

    fn mm(&self, args: &[&str]) -> std::process::Output {
        Command::cargo_bin("mm")
            .unwrap()
            .env_remove("MM_TEST_DB")
            .env_remove("MEMENTO_TOKEN")
            .arg("--db")
            .arg(&self.db)
            .arg("--config")
            .arg(&self.config)
            .args(args)
            .output()
            .unwrap()
    }

    fn write_config(&self, text: &str) {
        std::fs::write(&self.config, text).unwrap();
    }
}

fn json_of(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap()
}

fn error_code(output: &std::process::Output) -> String {
    json_of(&output.stderr)["error"]["code"]
        .as_str()
        .unwrap()
        .to_string()
}

#[test]
fn version_reports_package_version() {
    let output = Command::cargo_bin("mm").unwrap().args(["version", "--json"]).output().unwrap();
    assert!(output.status.success());
    let body = json_of(&output.stdout);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn init_then_status() {
    let home = Home::new();

    let init = home.mm(&["init"]);
    assert!(init.status.success());
    assert!(home.db.exists());
    assert!(home.config.exists());

    let status = home.mm(&["status"]);
    assert!(status.status.success());
    let body = json_of(&status.stdout);
    assert_eq!(body["collections"].as_array().unwrap().len(), 0);
    assert_eq!(body["recent_runs"].as_array().unwrap().len(), 0);
}

#[test]
fn second_init_is_refused() {
    let home = Home::new();
    assert!(home.mm(&["init"]).status.success());

    let again = home.mm(&["init"]);
    assert_eq!(again.status.code(), Some(2));
    assert_eq!(error_code(&again), "ALREADY_INITIALIZED");
}

#[test]
fn status_without_database_is_not_initialized() {
    let home = Home::new();
    let output = home.mm(&["status"]);
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(error_code(&output), "NOT_INITIALIZED");
}

#[test]
fn status_lists_configured_collections() {
    let home = Home::new();
    assert!(home.mm(&["init"]).status.success());
    home.write_config(r#"{"collections": [{"id": "Books-2024"}]}"#);

    let body = json_of(&home.mm(&["status"]).stdout);
    let collection = &body["collections"][0];
    assert_eq!(collection["id"], "Books-2024");
    assert_eq!(collection["table"], "mm_books_2024");
    assert!(collection["rows"].is_null());
}

#[test]
fn sync_unknown_collection_suggests_configured() {
    let home = Home::new();
    assert!(home.mm(&["init"]).status.success());
    home.write_config(r#"{"collections": [{"id": "books"}]}"#);

    let output = home.mm(&["sync", "bookz"]);
    assert_eq!(output.status.code(), Some(3));
    let body = json_of(&output.stderr);
    assert_eq!(body["error"]["code"], "COLLECTION_NOT_FOUND");
    assert!(body["error"]["hint"].as_str().unwrap().contains("books"));
}

#[test]
fn sync_rejects_zero_limit() {
    let home = Home::new();
    let output = home.mm(&["sync", "--limit", "0"]);
    assert_eq!(output.status.code(), Some(4));
    assert_eq!(error_code(&output), "INVALID_ARGUMENT");
}

#[test]
fn invalid_config_is_reported() {
    let home = Home::new();
    assert!(home.mm(&["init"]).status.success());
    home.write_config(r#"{"defaults": {"sync": "sometimes"}}"#);

    let output = home.mm(&["sync"]);
    assert_eq!(output.status.code(), Some(7));
    assert_eq!(error_code(&output), "CONFIG_ERROR");
}

#[test]
fn state_reset_without_watermark() {
    let home = Home::new();
    assert!(home.mm(&["init"]).status.success());

    let output = home.mm(&["state", "reset", "books"]);
    assert!(output.status.success());
    let body = json_of(&output.stdout);
    assert_eq!(body["reset"], false);
}

#[test]
fn completions_are_generated() {
    let output = Command::cargo_bin("mm").unwrap().args(["completions", "bash"]).output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("mm"));
}
