// shared utilities for integration tests

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use serde_json::Value;
use tempfile::TempDir;

/// scratch directory with its own config and changeset file
pub struct TestEnv {
    pub dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create test directory"),
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.json")
    }

    pub fn changeset_path(&self) -> PathBuf {
        self.dir.path().join("changeset.jsonl")
    }

    /// write `content` to a file in the scratch directory
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, content).expect("Failed to write test file");
        path
    }

    pub fn write_config(&self, content: &Value) -> PathBuf {
        let path = self.config_path();
        fs::write(&path, serde_json::to_string_pretty(content).unwrap())
            .expect("Failed to write test config");
        path
    }

    /// run metaquery with no stdin
    pub fn run(&self, args: &[&str]) -> Output {
        self.run_with_stdin(args, "")
    }

    /// run metaquery feeding `stdin`
    pub fn run_with_stdin(&self, args: &[&str], stdin: &str) -> Output {
        let mut child = Command::new(binary_path())
            .args(args)
            .env("METAQUERY_CONFIG", self.config_path())
            .env("METAQUERY_CHANGESET_FILE", self.changeset_path())
            .env_remove("METAQUERY_LOG")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("Failed to run metaquery");

        // the command may exit before reading stdin, so a broken pipe is fine here
        if let Some(mut pipe) = child.stdin.take() {
            pipe.write_all(stdin.as_bytes()).ok();
        }

        child.wait_with_output().expect("Failed to wait for metaquery")
    }
}

pub fn binary_path() -> &'static Path {
    Path::new(env!("CARGO_BIN_EXE_metaquery"))
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// parse a JSON-RPC envelope from stdout
pub fn json_output(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!("stdout is not JSON ({}): {}", e, stdout(output));
    })
}

/// records used across the CLI tests
pub const RECORDS: &str = r#"[
    {"relative_path": "logs/a.log", "metadata": {"size": 10, "owner": "ana"}, "tags": ["raw"]},
    {"relative_path": "logs/b.log", "metadata": {"size": "250", "owner": null}, "tags": []},
    {"relative_path": "img/c.png", "metadata": {"size": 40}, "tags": ["raw", "image"]}
]"#;
