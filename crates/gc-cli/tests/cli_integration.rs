//! CLI integration tests
//!
//! Tests the gatecheck CLI using assert_cmd.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::Path;
use std::thread;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};

fn gatecheck() -> Command {
    let mut cmd = Command::cargo_bin("gatecheck")
        .expect("Failed to locate gatecheck binary - ensure it's built before running tests");
    cmd.env_remove("GATECHECK_TOKEN").env_remove("RUST_LOG");
    cmd
}

/// Write an empty config file so the user's own config is never read
fn empty_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    std::fs::write(&path, "").unwrap();
    path
}

/// A port with nothing listening on it
fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Gateway that answers every connection with a challenge and replies
/// hello-ok to any connect request. Serves `connections` connections.
fn spawn_gateway(connections: usize) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    thread::spawn(move || {
        for stream in listener.incoming().take(connections) {
            let Ok(mut stream) = stream else { continue };
            let challenge = json!({
                "type": "event",
                "event": "connect.challenge",
                "payload": {"nonce": "abc123", "ts": 1000}
            });
            // Probe connections hang up straight away
            if writeln!(stream, "{}", challenge).is_err() {
                continue;
            }

            let mut line = String::new();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            if reader.read_line(&mut line).unwrap_or(0) == 0 {
                continue;
            }
            let request: Value = match serde_json::from_str(&line) {
                Ok(request) => request,
                Err(_) => continue,
            };
            let response = json!({
                "type": "res",
                "id": request["id"],
                "ok": true,
                "payload": {"type": "hello-ok", "protocol": 3, "auth": {"deviceToken": "tok-xyz"}}
            });
            let _ = writeln!(stream, "{}", response);
        }
    });

    port
}

#[test]
fn test_cli_help() {
    gatecheck()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("gatecheck"))
        .stdout(predicate::str::contains(
            "Gateway connectivity and handshake diagnostics",
        ));
}

#[test]
fn test_cli_version() {
    gatecheck()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("gatecheck"));
}

#[test]
fn test_cli_check_help() {
    gatecheck()
        .args(["check", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--token"))
        .stdout(predicate::str::contains("--no-report"));
}

#[test]
fn test_cli_unknown_command() {
    gatecheck()
        .arg("nonexistent-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_cli_config_path() {
    gatecheck()
        .args(["config", "path", "--config", "/tmp/gatecheck-test/config.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/tmp/gatecheck-test/config.toml"));
}

#[test]
fn test_cli_config_init_and_show() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let path_arg = path.to_str().unwrap();

    gatecheck()
        .args(["config", "init", "--config", path_arg])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created configuration file"));
    assert!(path.exists());

    gatecheck()
        .args(["config", "show", "--config", path_arg])
        .assert()
        .success()
        .stdout(predicate::str::contains("[gateway]"))
        .stdout(predicate::str::contains("18789"));
}

#[test]
fn test_cli_check_without_token() {
    let dir = tempfile::tempdir().unwrap();
    let config = empty_config(dir.path());

    gatecheck()
        .args(["check", "--no-report", "--config", config.to_str().unwrap()])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("GATECHECK_TOKEN"));
}

#[test]
fn test_cli_check_missing_config_file() {
    gatecheck()
        .args(["check", "--token", "tok", "--config", "/nonexistent/gatecheck.toml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to load config"));
}

#[test]
fn test_cli_check_unreachable_gateway() {
    let dir = tempfile::tempdir().unwrap();
    let config = empty_config(dir.path());
    let report = dir.path().join("report.json");
    let port = closed_port();

    gatecheck()
        .args(["check", "--host", "127.0.0.1", "--port", &port.to_string()])
        .args(["--config", config.to_str().unwrap()])
        .args(["--report", report.to_str().unwrap()])
        .env("GATECHECK_TOKEN", "30bfd2b063ab78d7")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("reachability: FAIL"))
        .stdout(predicate::str::contains("open in the firewall"));

    let parsed: Value = serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(parsed["target"]["port"], port);
    assert_eq!(parsed["summary"]["failed"], 1);
    assert_eq!(parsed["summary"]["skipped"], 2);
    assert_eq!(parsed["results"][0]["name"], "reachability");
    assert_eq!(parsed["results"][0]["status"], "fail");
    assert_eq!(parsed["results"][2]["status"], "skip");
}

#[test]
fn test_cli_check_against_gateway() {
    let dir = tempfile::tempdir().unwrap();
    let config = empty_config(dir.path());
    let report = dir.path().join("report.json");
    let port = spawn_gateway(3);

    gatecheck()
        .args(["check", "--host", "127.0.0.1", "--port", &port.to_string()])
        .args(["--token", "30bfd2b063ab78d7", "--timeout", "5"])
        .args(["--config", config.to_str().unwrap()])
        .args(["--report", report.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("handshake: PASS"))
        .stdout(predicate::str::contains("All checks passed"));

    let parsed: Value = serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(parsed["summary"]["passed"], 3);
    assert_eq!(parsed["results"][2]["details"]["protocol"], 3);
    assert!(parsed["device"]["id"].as_str().unwrap().starts_with("device_"));
    // The token never lands in the report
    assert!(!std::fs::read_to_string(&report).unwrap().contains("30bfd2b063ab78d7"));
}

#[test]
fn test_cli_handshake_command() {
    let dir = tempfile::tempdir().unwrap();
    let config = empty_config(dir.path());
    let port = spawn_gateway(1);

    gatecheck()
        .args(["handshake", "--host", "127.0.0.1", "--port", &port.to_string()])
        .args(["--token", "tok", "--no-device"])
        .args(["--config", config.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Handshake succeeded"))
        .stdout(predicate::str::contains("none (token only)"));
}
