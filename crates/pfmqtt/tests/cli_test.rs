//! Integration tests for the `pfmqtt` binary.
//!
//! These exercise argument parsing and configuration errors without a
//! live firewall or broker.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

const ENV_VARS: &[&str] = &[
    "PFMQTT_CONFIG",
    "MQTTHOST",
    "MQTTPORT",
    "MQTTUSER",
    "MQTTPASSWORD",
    "MQTTPFSENSETOPIC",
    "PFSENSEHOST",
    "PFSENSEAPIKEY",
    "PFSENSEAPISECRET",
    "PFSENSERULES",
    "HASSDISCOVERYPREFIX",
    "HASSTOPIC",
    "RUST_LOG",
];

/// Build a command for the `pfmqtt` binary running in `dir`, isolated from
/// the caller's configuration and environment.
fn pfmqtt_cmd(dir: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("pfmqtt");
    cmd.current_dir(dir)
        .env("HOME", "/tmp/pfmqtt-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/pfmqtt-cli-test-nonexistent");
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_help_flag() {
    let dir = tempfile::tempdir().unwrap();
    pfmqtt_cmd(dir.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("Home Assistant")
            .and(predicate::str::contains("run"))
            .and(predicate::str::contains("status")),
    );
}

#[test]
fn test_version_flag() {
    let dir = tempfile::tempdir().unwrap();
    pfmqtt_cmd(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pfmqtt"));
}

#[test]
fn test_invalid_log_format() {
    let dir = tempfile::tempdir().unwrap();
    let output = pfmqtt_cmd(dir.path())
        .args(["--log-format", "xml", "status"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("xml"));
}

// ── Configuration errors ────────────────────────────────────────────

#[test]
fn test_missing_configuration_exits_with_config_code() {
    let dir = tempfile::tempdir().unwrap();
    let output = pfmqtt_cmd(dir.path()).arg("run").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(
        text.contains("no file found"),
        "Expected missing-config diagnostic:\n{text}"
    );
}

#[test]
fn test_status_without_credentials_exits_with_auth_code() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "[pfsense]\nhost = \"192.0.2.1\"\n\n[topics]\nrules = [\"Block-Guest-WAN\"]\n",
    )
    .unwrap();

    let output = pfmqtt_cmd(dir.path()).arg("status").output().unwrap();
    assert_eq!(output.status.code(), Some(3));
    assert!(combined_output(&output).contains("credentials"));
}

#[test]
fn test_malformed_legacy_rules_env() {
    let dir = tempfile::tempdir().unwrap();
    let output = pfmqtt_cmd(dir.path())
        .env("PFSENSERULES", "Block-Guest-WAN")
        .arg("status")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("PFSENSERULES"));
}

#[test]
fn test_wildcard_prefix_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("custom.toml");
    std::fs::write(
        &config,
        "[pfsense]\nhost = \"192.0.2.1\"\napi_key = \"PFFAkey\"\napi_secret = \"secret\"\n\n\
         [topics]\nprefix = \"pfsense/#\"\n",
    )
    .unwrap();

    let output = pfmqtt_cmd(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("status")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("topics.prefix"));
}
