//! CLI tests for the `kbg` binary.

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

fn kbg_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("kbg");
    path
}

fn run_kbg(args: &[&str]) -> (String, String, bool) {
    let binary = kbg_binary();
    let output = Command::new(&binary)
        .args(args)
        .env_remove("KNOWLEDGE_BASE_ID")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run kbg binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_models_catalog_needs_no_config() {
    let (stdout, stderr, success) = run_kbg(&["models", "--catalog"]);
    assert!(success, "stderr={}", stderr);
    assert!(stdout.contains("anthropic.claude-instant-v1"));
    assert!(stdout.contains("Claude Instant"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("kbg.toml");
    fs::write(&path, "[crawler]\nrate_limit = 1000\n").unwrap();

    let (_stdout, stderr, success) =
        run_kbg(&["--config", path.to_str().unwrap(), "urls", "show"]);
    assert!(!success);
    assert!(stderr.contains("crawler.rate_limit"), "stderr={}", stderr);
}

#[test]
fn test_missing_config_file_is_reported() {
    let (_stdout, stderr, success) =
        run_kbg(&["--config", "/nonexistent/kbg.toml", "ingest"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"), "stderr={}", stderr);
}

#[test]
fn test_ask_without_knowledge_base_fails() {
    let (stdout, _stderr, success) = run_kbg(&["ask", "Where are the offices?"]);
    assert!(!success);
    assert!(stdout.contains("Server side error: please check function logs"));
}
