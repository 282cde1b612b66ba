//! Integration tests for the docbody binary
//!
//! These run the real executable with bodies piped through stdin.

use std::fs;
use std::io::Write;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

fn docbody_bin() -> String {
    env!("CARGO_BIN_EXE_docbody").to_string()
}

fn run(args: &[&str], stdin: &[u8]) -> Output {
    let mut child = Command::new(docbody_bin())
        .args(args)
        .env_remove("DOCBODY_CONFIG")
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    child.stdin.take().unwrap().write_all(stdin).unwrap();
    child.wait_with_output().unwrap()
}

// =============================================================================
// encode / decode
// =============================================================================

#[test]
fn test_encode_hello() {
    let output = run(&["encode", "--chunk-size", "8"], b"Hello");

    assert!(
        output.status.success(),
        "docbody encode failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(output.stdout, b"5\r\nHello\r\n0\r\n");
}

#[test]
fn test_encode_empty_input() {
    let output = run(&["encode"], b"");
    assert!(output.status.success());
    assert_eq!(output.stdout, b"0\r\n");
}

#[test]
fn test_encode_rfc7230_framing() {
    let output = run(&["encode", "--rfc7230"], b"doc");
    assert!(output.status.success());
    assert_eq!(output.stdout, b"3\r\ndoc\r\n0\r\n\r\n");
}

#[test]
fn test_decode_round_trip() {
    let doc: Vec<u8> = br#"{"_id":"cli","items":[1,2,3]}"#.repeat(200);

    let encoded = run(&["encode", "--chunk-size", "100"], &doc);
    assert!(encoded.status.success());

    let decoded = run(&["decode"], &encoded.stdout);
    assert!(
        decoded.status.success(),
        "docbody decode failed: {}",
        String::from_utf8_lossy(&decoded.stderr)
    );
    assert_eq!(decoded.stdout, doc);
}

#[test]
fn test_decode_rejects_malformed_body() {
    let output = run(&["decode"], b"X\r\n");

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid chunked body"), "stderr: {}", stderr);
}

#[test]
fn test_decode_rejects_truncated_body() {
    let output = run(&["decode"], b"5\r\nHel");
    assert!(!output.status.success());
}

#[test]
fn test_decode_enforces_max_chunk_size() {
    let output = run(&["decode", "--max-chunk-size", "4"], b"5\r\nHello\r\n0\r\n");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("exceeds limit"), "stderr: {}", stderr);
}

#[test]
fn test_decode_json_summary_with_trailers() {
    let output = run(
        &["decode", "--rfc7230", "--json"],
        b"3;ext=1\r\ndoc\r\n0\r\nX-Checksum: abc\r\n\r\n",
    );
    assert!(output.status.success());
    assert_eq!(output.stdout, b"doc");

    let stderr = String::from_utf8_lossy(&output.stderr);
    let line = stderr.lines().last().unwrap();
    let summary: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(summary["command"], "decode");
    assert_eq!(summary["bytes"], 3);
    assert_eq!(summary["chunks"], 1);
    assert_eq!(summary["trailers"][0][0], "X-Checksum");
    assert_eq!(summary["trailers"][0][1], "abc");
}

// =============================================================================
// limit
// =============================================================================

#[test]
fn test_limit_truncates_input() {
    let output = run(&["limit", "--bytes", "4"], b"abcdefgh");
    assert!(output.status.success());
    assert_eq!(output.stdout, b"abcd");
}

#[test]
fn test_limit_short_input() {
    let output = run(&["limit", "--bytes", "100", "--json"], b"abc");
    assert!(output.status.success());
    assert_eq!(output.stdout, b"abc");

    let stderr = String::from_utf8_lossy(&output.stderr);
    let line = stderr.lines().last().unwrap();
    let summary: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(summary["bytes"], 3);
    assert!(summary.get("chunks").is_none());
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_config_file_sets_framing() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("docbody.toml");
    fs::write(&config, "framing = \"rfc7230\"\n").unwrap();

    let output = run(&["encode", "--config", config.to_str().unwrap()], b"abc");
    assert!(output.status.success());
    assert_eq!(output.stdout, b"3\r\nabc\r\n0\r\n\r\n");
}

#[test]
fn test_flag_overrides_config_file() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("docbody.toml");
    fs::write(&config, "max_chunk_size = 2\n").unwrap();
    let body = b"3\r\nabc\r\n0\r\n";

    let output = run(&["decode", "--config", config.to_str().unwrap()], body);
    assert!(!output.status.success());

    let output = run(
        &["decode", "--config", config.to_str().unwrap(), "--max-chunk-size", "8"],
        body,
    );
    assert!(output.status.success());
    assert_eq!(output.stdout, b"abc");
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("docbody.toml");
    fs::write(&config, "chunk_size = 0\n").unwrap();

    let output = run(&["encode", "--config", config.to_str().unwrap()], b"abc");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("chunk_size"), "stderr: {}", stderr);
}
