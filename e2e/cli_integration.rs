//! E2E: the `qcdbgen` and `qcdbstress` binaries as black boxes.
//!
//! Covers argument parsing, exit codes, generated artifacts, and a short
//! forked multi-process stress run against a generated table.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

fn qcdbgen() -> &'static str {
    env!("CARGO_BIN_EXE_qcdbgen")
}

fn qcdbstress() -> &'static str {
    env!("CARGO_BIN_EXE_qcdbstress")
}

fn write_schema(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    path
}

// ── qcdbgen ──────────────────────────────────────────────────────────────────

#[test]
fn generates_table_file_with_exit_zero() {
    let dir = TempDir::new().unwrap();
    let schema = write_schema(&dir, "person.skm", "0 PERSON 3\n0 AGE i 1\n1 NAME c 16\n");

    let status = Command::new(qcdbgen())
        .args(["-s", schema.to_str().unwrap(), "-o", dir.path().to_str().unwrap()])
        .status()
        .expect("failed to run qcdbgen");
    assert!(status.success());

    let table = dir.path().join("PERSON.qcdb");
    assert!(table.exists());
    assert_eq!(
        fs::metadata(&table).unwrap().len() as usize,
        qcdb::HEADER_SIZE + 3 * 20
    );
}

#[test]
fn emits_record_source_when_requested() {
    let dir = TempDir::new().unwrap();
    let schema = write_schema(&dir, "event.skm", "0 EVENT 4\n0 KIND I 1\n1 FLAGS I 1\n2 STAMP L 1\n");

    let status = Command::new(qcdbgen())
        .args([
            "-s",
            schema.to_str().unwrap(),
            "-o",
            dir.path().to_str().unwrap(),
            "-g",
            dir.path().to_str().unwrap(),
        ])
        .status()
        .expect("failed to run qcdbgen");
    assert!(status.success());

    let source = fs::read_to_string(dir.path().join("EVENT.rs")).unwrap();
    assert!(source.contains("pub struct EVENT {"));
    assert!(source.contains("pub KIND: u32,"));
    assert!(source.contains("pub STAMP: u64,"));
}

#[test]
fn strict_violation_exits_with_bad_argument_code() {
    let dir = TempDir::new().unwrap();
    let schema = write_schema(&dir, "mix.skm", "0 MIX 2\n0 FLAG ? 1\n1 ID l 1\n");

    let output = Command::new(qcdbgen())
        .args([
            "-s",
            schema.to_str().unwrap(),
            "-o",
            dir.path().to_str().unwrap(),
            "--strict",
        ])
        .output()
        .expect("failed to run qcdbgen");
    assert_eq!(output.status.code(), Some(0x40));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("line 3"), "stderr was: {}", stderr);
    assert!(!dir.path().join("MIX.qcdb").exists());
}

#[test]
fn parse_error_names_offending_line() {
    let dir = TempDir::new().unwrap();
    let schema = write_schema(&dir, "bad.skm", "0 BAD 2\n0 AGE i 1\n1 NAME z 8\n");

    let output = Command::new(qcdbgen())
        .args(["-s", schema.to_str().unwrap()])
        .output()
        .expect("failed to run qcdbgen");
    assert_eq!(output.status.code(), Some(0x40));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("line 3"), "stderr was: {}", stderr);
}

#[test]
fn unknown_flag_is_bad_usage() {
    let output = Command::new(qcdbgen())
        .args(["--no-such-flag"])
        .output()
        .expect("failed to run qcdbgen");
    assert_eq!(output.status.code(), Some(0x40));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("bad usage"), "stderr was: {}", stderr);
}

#[test]
fn missing_schema_path_is_bad_usage() {
    let output = Command::new(qcdbgen())
        .output()
        .expect("failed to run qcdbgen");
    assert_eq!(output.status.code(), Some(0x40));
}

#[test]
fn missing_schema_file_is_not_found() {
    let output = Command::new(qcdbgen())
        .args(["-s", "/nonexistent/ghost.skm"])
        .output()
        .expect("failed to run qcdbgen");
    assert_eq!(output.status.code(), Some(0x08));
}

#[test]
fn help_and_version_exit_zero() {
    for flag in ["--help", "-h", "--version", "-V"] {
        let output = Command::new(qcdbgen())
            .arg(flag)
            .output()
            .expect("failed to run qcdbgen");
        assert!(output.status.success(), "flag {}", flag);
        assert!(!output.stdout.is_empty(), "flag {}", flag);
    }
}

// ── qcdbstress against a generated CHARACTER table ───────────────────────────

fn character_schema() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/character.skm")
}

#[test]
fn stress_tool_runs_threaded_against_generated_table() {
    let dir = TempDir::new().unwrap();
    let status = Command::new(qcdbgen())
        .args([
            "-s",
            character_schema().to_str().unwrap(),
            "-o",
            dir.path().to_str().unwrap(),
        ])
        .status()
        .expect("failed to run qcdbgen");
    assert!(status.success());

    let table = dir.path().join("CHARACTER.qcdb");
    let status = Command::new(qcdbstress())
        .args(["-d", table.to_str().unwrap(), "-s", "1", "-p", "2", "-r", "8"])
        .status()
        .expect("failed to run qcdbstress");
    assert!(status.success());
}

#[test]
fn stress_tool_runs_forked_processes() {
    let dir = TempDir::new().unwrap();
    let status = Command::new(qcdbgen())
        .args([
            "-s",
            character_schema().to_str().unwrap(),
            "-o",
            dir.path().to_str().unwrap(),
        ])
        .status()
        .expect("failed to run qcdbgen");
    assert!(status.success());

    let table = dir.path().join("CHARACTER.qcdb");
    let status = Command::new(qcdbstress())
        .args([
            "-d",
            table.to_str().unwrap(),
            "-s",
            "1",
            "-p",
            "2",
            "-r",
            "8",
            "--fork",
        ])
        .status()
        .expect("failed to run qcdbstress");
    assert!(status.success());
}

#[test]
fn stress_tool_rejects_missing_table() {
    let output = Command::new(qcdbstress())
        .args(["-d", "/nonexistent/ghost.qcdb"])
        .output()
        .expect("failed to run qcdbstress");
    assert_eq!(output.status.code(), Some(0x08));
}
