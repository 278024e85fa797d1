//! CLI tests for the shopsearch command
//!
//! Argument parsing plus a few end-to-end runs against a scratch workspace.
//! Every run points HOME at a temp directory and clears the embedding
//! variables so the host configuration cannot leak in.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const CATALOG: &str = r#"[
    {"id": 1, "title": "Desk Lamp", "price": 19.99, "category": "Lighting"},
    {"id": 2, "title": "Leather Couch", "price": 899.0, "category": "Furniture"},
    {"id": 3, "title": "Oak Table", "category": "Furniture"}
]"#;

/// Get a Command for the shopsearch binary
#[allow(deprecated)]
fn shopsearch() -> Command {
    Command::cargo_bin("shopsearch").expect("Failed to find shopsearch binary")
}

/// A command isolated inside `workspace`
fn isolated(workspace: &TempDir) -> Command {
    let mut cmd = shopsearch();
    cmd.current_dir(workspace.path())
        .env("HOME", workspace.path().join("home"))
        .env_remove("RUST_LOG")
        .env_remove("EMBEDDINGS_API_KEY")
        .env_remove("EMBEDDINGS_PROVIDER")
        .env_remove("EMBEDDINGS_API_BASE_URL")
        .env_remove("EMBEDDINGS_MODEL")
        .env_remove("SHOPSEARCH_WORKSPACE")
        .env_remove("SHOPSEARCH_CONFIG")
        .env_remove("SHOPSEARCH_DB")
        .env_remove("SHOPSEARCH_QDRANT_URL")
        .env_remove("SHOPSEARCH_PROVIDER");
    cmd
}

fn write_catalog(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("catalog.json");
    std::fs::write(&path, CATALOG).unwrap();
    path
}

fn imported_workspace() -> TempDir {
    let workspace = tempfile::tempdir().unwrap();
    let catalog = write_catalog(workspace.path());
    isolated(&workspace)
        .arg("import")
        .arg(&catalog)
        .assert()
        .success();
    workspace
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_shows_all_commands() {
    shopsearch()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("search"))
        .stdout(predicate::str::contains("backfill"))
        .stdout(predicate::str::contains("import"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_flag() {
    shopsearch()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("shopsearch"));
}

#[test]
fn test_global_options_in_help() {
    shopsearch()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--workspace"))
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--db"))
        .stdout(predicate::str::contains("--qdrant"))
        .stdout(predicate::str::contains("--provider"))
        .stdout(predicate::str::contains("--verbose"))
        .stdout(predicate::str::contains("--quiet"));
}

#[test]
fn test_search_help() {
    shopsearch()
        .args(["search", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--mode"))
        .stdout(predicate::str::contains("--category"))
        .stdout(predicate::str::contains("--limit"))
        .stdout(predicate::str::contains("--json"));
}

#[test]
fn test_backfill_help() {
    shopsearch()
        .args(["backfill", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--force"))
        .stdout(predicate::str::contains("--delay-ms"));
}

// ============================================================================
// Parse Error Tests
// ============================================================================

#[test]
fn test_invalid_mode_rejected() {
    shopsearch()
        .args(["search", "lamp", "--mode", "fuzzy"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("fuzzy"));
}

#[test]
fn test_invalid_provider_rejected() {
    shopsearch()
        .args(["--provider", "cohere", "search", "lamp"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cohere"));
}

#[test]
fn test_import_requires_file() {
    shopsearch().arg("import").assert().failure();
}

#[test]
fn test_missing_subcommand() {
    shopsearch().assert().failure();
}

// ============================================================================
// Config Command Tests
// ============================================================================

#[test]
fn test_config_init_and_path() {
    let workspace = tempfile::tempdir().unwrap();

    isolated(&workspace)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created"));
    assert!(workspace.path().join(".shopsearch/config.toml").exists());

    isolated(&workspace)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));

    isolated(&workspace)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(".shopsearch"))
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_show_applies_overrides() {
    let workspace = tempfile::tempdir().unwrap();

    isolated(&workspace)
        .args(["--provider", "gemini", "--db", "other.db", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("provider = \"gemini\""))
        .stdout(predicate::str::contains("other.db"))
        .stdout(predicate::str::contains("min_score_ratio"));
}

#[test]
fn test_config_show_rejects_invalid_file() {
    let workspace = tempfile::tempdir().unwrap();
    let config = workspace.path().join("bad.toml");
    std::fs::write(&config, "[search]\nmin_score_ratio = 2.0\n").unwrap();

    isolated(&workspace)
        .arg("--config")
        .arg(&config)
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("min_score_ratio"));
}

// ============================================================================
// Import and Search Tests
// ============================================================================

#[test]
fn test_import_reports_counts() {
    let workspace = tempfile::tempdir().unwrap();
    let catalog = write_catalog(workspace.path());

    isolated(&workspace)
        .arg("import")
        .arg(&catalog)
        .assert()
        .success()
        .stdout(predicate::str::contains("Added 3 products (0 skipped)"));

    isolated(&workspace)
        .args(["import", "--json"])
        .arg(&catalog)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"skipped\": 3"));

    assert!(workspace.path().join("shopsearch.db").exists());
}

#[test]
fn test_import_missing_file_fails() {
    let workspace = tempfile::tempdir().unwrap();

    isolated(&workspace)
        .args(["import", "nope.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope.json"));
}

#[test]
fn test_lexical_search() {
    let workspace = imported_workspace();

    isolated(&workspace)
        .args(["search", "lamp"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Desk Lamp"))
        .stdout(predicate::str::contains("[lexical]"))
        .stdout(predicate::str::contains("Leather Couch").not());
}

#[test]
fn test_search_by_category() {
    let workspace = imported_workspace();

    isolated(&workspace)
        .args(["search", "--category", "Furniture", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Leather Couch"))
        .stdout(predicate::str::contains("Oak Table"))
        .stdout(predicate::str::contains("Desk Lamp").not())
        .stdout(predicate::str::contains("\"lexical_only\""));
}

#[test]
fn test_semantic_search_without_key_falls_back() {
    let workspace = imported_workspace();

    isolated(&workspace)
        .args(["search", "sofa", "--mode", "semantic"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Leather Couch"))
        .stderr(predicate::str::contains("semantic search unavailable"));
}

#[test]
fn test_search_no_results() {
    let workspace = imported_workspace();

    isolated(&workspace)
        .args(["search", "zeppelin"])
        .assert()
        .success()
        .stderr(predicate::str::contains("No results found"));
}

#[test]
fn test_backfill_without_key_fails() {
    let workspace = imported_workspace();

    isolated(&workspace)
        .args(["backfill", "--quiet"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("API key"));
}

#[test]
fn test_status_json() {
    let workspace = imported_workspace();

    isolated(&workspace)
        .args(["status", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"products\": 3"))
        .stdout(predicate::str::contains("\"missing_embeddings\": 3"))
        .stdout(predicate::str::contains("\"enabled\": false"));
}

#[test]
fn test_explicit_workspace_and_db() {
    let workspace = imported_workspace();
    let elsewhere = tempfile::tempdir().unwrap();

    isolated(&elsewhere)
        .arg("--workspace")
        .arg(workspace.path())
        .args(["search", "table"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Oak Table"));

    isolated(&elsewhere)
        .arg("--db")
        .arg(workspace.path().join("shopsearch.db"))
        .args(["status", "--json", "--no-probe"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"products\": 3"));
}
