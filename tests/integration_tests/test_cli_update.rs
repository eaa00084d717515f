// integration tests for the update and changeset commands

use crate::common::*;
use serde_json::{json, Value};
use std::fs;

#[test]
fn test_update_prints_updated_record() {
    let env = TestEnv::new();
    let record = r#"{"metadata": {"a": {"b": 1}, "old": true}, "tags": ["x", "y"]}"#;

    let output = env.run_with_stdin(
        &[
            "--json",
            "update",
            "--put-tags",
            "z",
            "--remove-tags",
            "x",
            "--put-metadata",
            "a.c=2",
            "--remove-metadata",
            "old",
        ],
        record,
    );

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(
        json_output(&output)["result"],
        json!({"metadata": {"a": {"b": 1, "c": 2}}, "tags": ["y", "z"]})
    );
}

#[test]
fn test_update_without_changes_fails() {
    let env = TestEnv::new();
    let output = env.run_with_stdin(&["--json", "update"], "{}");

    assert_eq!(output.status.code(), Some(4));
    assert_eq!(json_output(&output)["error"]["code"], -32004);
}

#[test]
fn test_update_rejects_pair_without_separator() {
    let env = TestEnv::new();
    let output = env.run_with_stdin(&["update", "--put-metadata", "novalue"], "{}");
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_update_in_place_keeps_json_lines() {
    let env = TestEnv::new();
    let path = env.write(
        "records.jsonl",
        "{\"metadata\": {}, \"tags\": []}\n{\"metadata\": {\"k\": 1}, \"tags\": [\"t\"]}\n",
    );

    let output = env.run(&[
        "--no-json",
        "update",
        "-i",
        path.to_str().unwrap(),
        "--in-place",
        "--put-tags",
        "new",
    ]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("Updated 2 record(s)"));

    let written = fs::read_to_string(&path).unwrap();
    let lines: Vec<Value> = written
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines[0]["tags"], json!(["new"]));
    assert_eq!(lines[1]["tags"], json!(["t", "new"]));
}

#[test]
fn test_changeset_queue_show_apply_clear() {
    let env = TestEnv::new();

    for args in [
        vec!["changeset", "put-tags", "logs/a.log", "reviewed"],
        vec!["changeset", "remove-tags", "logs/a.log", "raw"],
        vec!["changeset", "put-fields", "logs/a.log", "owner=\"bo\"", "size=11"],
        vec!["changeset", "describe", "img/c.png", "a picture"],
    ] {
        let output = env.run(&args);
        assert!(output.status.success(), "{:?}: {}", args, stderr(&output));
    }

    let output = env.run(&["--json", "changeset", "show"]);
    let pending = &json_output(&output)["result"]["pending"];
    assert_eq!(
        pending["logs/a.log"]["metadata_changeset"]["put_tags"],
        json!(["reviewed"])
    );
    assert_eq!(pending["img/c.png"]["description"], "a picture");

    let input = env.write("records.json", RECORDS);
    let output = env.run(&[
        "--json",
        "changeset",
        "apply",
        "-i",
        input.to_str().unwrap(),
        "--in-place",
        "--clear",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(json_output(&output)["result"]["updated"], 2);

    let records: Value = serde_json::from_str(&fs::read_to_string(&input).unwrap()).unwrap();
    assert_eq!(records[0]["tags"], json!(["reviewed"]));
    assert_eq!(records[0]["metadata"], json!({"size": 11, "owner": "bo"}));
    assert_eq!(records[2]["description"], "a picture");

    assert_eq!(fs::read_to_string(env.changeset_path()).unwrap(), "");
}

#[test]
fn test_changeset_path_honors_flag() {
    let env = TestEnv::new();
    let custom = env.dir.path().join("custom.jsonl");

    let output = env.run(&["changeset", "--file", custom.to_str().unwrap(), "path"]);
    assert_eq!(stdout(&output).trim(), custom.to_str().unwrap());

    let output = env.run(&["changeset", "path"]);
    assert_eq!(stdout(&output).trim(), env.changeset_path().to_str().unwrap());
}

#[test]
fn test_changeset_malformed_line_is_parse_error() {
    let env = TestEnv::new();
    fs::write(env.changeset_path(), "{\"relative_path\": \"a\", \"update\": {}}\nnot json\n")
        .unwrap();

    let output = env.run(&["--no-json", "changeset", "show"]);

    assert_eq!(output.status.code(), Some(8));
    assert!(stderr(&output).contains(":2"), "{}", stderr(&output));
}
