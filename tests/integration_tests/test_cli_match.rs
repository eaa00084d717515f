// integration tests for the match, explain and completions commands

use crate::common::*;
use serde_json::json;

const LARGE: &str = r#"{"field": "metadata.size", "comparator": ">", "value": 20}"#;

#[test]
fn test_match_where_json_output() {
    let env = TestEnv::new();
    let input = env.write("records.json", RECORDS);

    let output = env.run(&["--json", "match", "--where", LARGE, "-i", input.to_str().unwrap()]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let response = json_output(&output);
    assert_eq!(response["jsonrpc"], "2.0");
    assert_eq!(response["result"]["matched"], 2);
    assert_eq!(response["result"]["records"][0]["relative_path"], "logs/b.log");
    assert_eq!(response["result"]["records"][1]["relative_path"], "img/c.png");
}

#[test]
fn test_match_reads_json_lines_from_stdin() {
    let env = TestEnv::new();
    let lines = "{\"n\": 1}\n{\"n\": 5}\n{\"n\": 9}\n";

    let output = env.run_with_stdin(
        &["--json", "match", "-w", r#"{"field": "n", "comparator": ">=", "value": 5}"#],
        lines,
    );

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(json_output(&output)["result"]["returned"], 2);
}

#[test]
fn test_match_sort_limit_and_next_token() {
    let env = TestEnv::new();
    let input = env.write("records.json", RECORDS);
    let input = input.to_str().unwrap();

    let output = env.run(&[
        "--json", "match", "-i", input, "--sort-by", "metadata.size", "--sort-direction", "asc",
        "--limit", "2",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let result = &json_output(&output)["result"];
    assert_eq!(result["matched"], 3);
    assert_eq!(result["records"][0]["relative_path"], "logs/a.log");
    let token = result["next_token"].as_str().unwrap().to_string();

    let output = env.run(&[
        "--json", "match", "-i", input, "--sort-by", "metadata.size", "--sort-direction", "asc",
        "--limit", "2", "--after", &token,
    ]);
    let result = &json_output(&output)["result"];
    assert_eq!(result["returned"], 1);
    assert!(result.get("next_token").is_none());
}

#[test]
fn test_match_count_and_format() {
    let env = TestEnv::new();
    let input = env.write("records.json", RECORDS);
    let input = input.to_str().unwrap();

    let output = env.run(&["--no-json", "match", "-w", LARGE, "-i", input, "--count"]);
    assert_eq!(stdout(&output).trim(), "2");

    let output = env.run(&[
        "match", "-w", LARGE, "-i", input, "--format", "{relative_path}: {tags}",
    ]);
    assert_eq!(stdout(&output), "logs/b.log: \nimg/c.png: raw, image\n");
}

#[test]
fn test_match_saved_query() {
    let env = TestEnv::new();
    env.write_config(&json!({
        "queries": {"raw": {"field": "tags", "comparator": "CONTAINS", "value": "raw"}}
    }));
    let input = env.write("records.json", RECORDS);

    let output = env.run(&["--json", "match", "--saved", "raw", "-i", input.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(json_output(&output)["result"]["matched"], 2);
}

#[test]
fn test_match_unknown_saved_query_suggests() {
    let env = TestEnv::new();
    env.write_config(&json!({
        "queries": {"raw": {"field": "tags", "comparator": "EXISTS"}}
    }));

    let output = env.run_with_stdin(&["--json", "match", "--saved", "rwa"], "[]");

    assert_eq!(output.status.code(), Some(4));
    let response = json_output(&output);
    assert_eq!(response["error"]["code"], -32004);
    assert_eq!(response["error"]["data"]["suggestions"], json!(["raw"]));
}

#[test]
fn test_match_bad_comparator_is_parse_error() {
    let env = TestEnv::new();

    let output = env.run_with_stdin(
        &["--no-json", "match", "-w", r#"{"field": "a", "comparator": "EQAULS", "value": 1}"#],
        "[]",
    );

    assert_eq!(output.status.code(), Some(8));
    let err = stderr(&output);
    assert!(err.contains("unrecognized comparator 'EQAULS'"), "{}", err);
    assert!(err.contains("EQUALS"), "{}", err);
}

#[test]
fn test_match_rejects_out_of_range_limit() {
    let env = TestEnv::new();
    let output = env.run_with_stdin(&["match", "--limit", "0"], "[]");
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_match_invalid_page_token() {
    let env = TestEnv::new();
    let output = env.run_with_stdin(&["match", "--after", "page-two"], "[]");
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_explain_lists_fields() {
    let env = TestEnv::new();
    let condition = r#"{"operator": "OR", "conditions": [
        {"field": "metadata.size", "comparator": "LESS_THAN", "value": 5},
        {"field": "dataset.name", "comparator": "BEGINS_WITH", "value": "cam"}
    ]}"#;

    let output = env.run(&["--json", "explain", "-w", condition]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let result = &json_output(&output)["result"];
    assert_eq!(
        result["rendered"],
        r#"(metadata.size < 5 OR dataset.name BEGINS_WITH "cam")"#
    );
    assert_eq!(result["fields"], json!(["dataset.name", "metadata.size"]));
}

#[test]
fn test_explain_without_condition_fails() {
    let env = TestEnv::new();
    let output = env.run(&["explain"]);
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_completions_bash() {
    let env = TestEnv::new();
    let output = env.run(&["completions", "bash"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("metaquery"));
}
