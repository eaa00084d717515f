// integration tests for the config command

use crate::common::*;
use serde_json::{json, Value};
use std::fs;

#[test]
fn test_config_path_uses_flag() {
    let env = TestEnv::new();
    let custom = env.dir.path().join("other.json");

    let output = env.run(&["--config", custom.to_str().unwrap(), "config", "path"]);
    assert_eq!(stdout(&output).trim(), custom.to_str().unwrap());
}

#[test]
fn test_config_show_defaults_when_missing() {
    let env = TestEnv::new();
    let output = env.run(&["config", "show"]);

    assert!(output.status.success());
    let config: Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(config["settings"]["limit"], 500);
    assert_eq!(config["settings"]["pretty"], true);
}

#[test]
fn test_config_set_saves_value() {
    let env = TestEnv::new();

    let output = env.run(&["config", "set", "settings.limit", "25"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let saved: Value = serde_json::from_str(&fs::read_to_string(env.config_path()).unwrap()).unwrap();
    assert_eq!(saved["settings"]["limit"], 25);
}

#[test]
fn test_config_set_invalid_value() {
    let env = TestEnv::new();
    let output = env.run(&["config", "set", "settings.limit", "5000"]);

    assert_eq!(output.status.code(), Some(4));
    assert!(!env.config_path().exists());
}

#[test]
fn test_config_set_saved_query_then_match() {
    let env = TestEnv::new();
    let output = env.run(&[
        "config",
        "set",
        "queries.images",
        r#"{"field": "relative_path", "comparator": "BEGINS_WITH", "value": "img/"}"#,
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let output = env.run_with_stdin(&["--json", "match", "-s", "images"], RECORDS);
    assert_eq!(json_output(&output)["result"]["matched"], 1);
}

#[test]
fn test_config_verify_valid() {
    let env = TestEnv::new();
    env.write_config(&json!({"settings": {"limit": 10}}));

    let output = env.run(&["config", "verify"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Configuration is valid"));
}

#[test]
fn test_config_verify_reports_errors() {
    let env = TestEnv::new();
    env.write_config(&json!({
        "queries": {"broken": {"field": "a", "comparator": "NOPE"}},
        "settings": {"limit": 0}
    }));

    let output = env.run(&["--no-json", "config", "verify"]);

    assert_eq!(output.status.code(), Some(5));
    let out = stdout(&output);
    assert!(out.contains("2 error(s)"), "{}", out);
    assert!(out.contains("queries.broken"), "{}", out);
}

#[test]
fn test_match_with_out_of_range_configured_limit() {
    let env = TestEnv::new();
    env.write_config(&json!({"settings": {"limit": 0}}));

    let output = env.run_with_stdin(
        &["--json", "match", "-w", r#"{"field": "n", "comparator": "EXISTS"}"#],
        "[{\"n\": 1}]",
    );

    assert_eq!(output.status.code(), Some(5));
    assert!(stdout(&output).contains("settings.limit"), "{}", stdout(&output));
}

#[test]
fn test_config_malformed_file_is_config_error() {
    let env = TestEnv::new();
    fs::write(env.config_path(), "{ not json").unwrap();

    let output = env.run_with_stdin(&["match"], "[]");
    assert_eq!(output.status.code(), Some(5));
}
