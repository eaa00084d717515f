//! output formatting utilities for scriptable CLI output
//!
//! uses JSON-RPC 2.0 format for machine-readable output:
//! - success: {"jsonrpc": "2.0", "result": {...}, "id": null}
//! - error: {"jsonrpc": "2.0", "error": {"code": N, "message": "...", "data": {...}}, "id": null}
//!
//! also provides format string templating over records for scripting

use std::io::IsTerminal;

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::Value;

use crate::changeset::file::FileUpdate;
use crate::path::DotPath;

/// JSON-RPC version constant
const JSONRPC_VERSION: &str = "2.0";

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\{([^{}\s]+)\}").unwrap();
}

/// output mode determines how results are formatted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// human-readable text output
    Text,
    /// machine-readable JSON-RPC 2.0 output
    Json,
    /// no output on success (errors still go to stderr)
    Quiet,
    /// custom format string with {field.path} placeholders, one line per record
    Format,
}

impl OutputMode {
    /// determine output mode from CLI flags and environment
    ///
    /// priority: quiet > format > json > no_json > auto-detect
    pub fn from_flags(json: bool, no_json: bool, quiet: bool, format: bool) -> Self {
        if quiet {
            return Self::Quiet;
        }
        if format {
            return Self::Format;
        }
        if json {
            return Self::Json;
        }
        if no_json {
            return Self::Text;
        }
        // auto-detect: JSON when stdout is not a TTY (piped)
        if !std::io::stdout().is_terminal() {
            Self::Json
        } else {
            Self::Text
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json)
    }

    pub fn is_quiet(&self) -> bool {
        matches!(self, Self::Quiet)
    }
}

/// JSON-RPC 2.0 success response
#[derive(Serialize)]
pub struct JsonRpcResponse<T: Serialize> {
    pub jsonrpc: &'static str,
    pub result: T,
    /// null for CLI responses (no request id)
    pub id: Option<String>,
}

impl<T: Serialize> JsonRpcResponse<T> {
    pub fn new(result: T) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            result,
            id: None,
        }
    }
}

/// JSON-RPC 2.0 error response
#[derive(Serialize)]
pub struct JsonRpcError {
    pub jsonrpc: &'static str,
    pub error: RpcError,
    pub id: Option<String>,
}

/// JSON-RPC 2.0 error object
#[derive(Serialize)]
pub struct RpcError {
    /// exit code offset by -32000 for application errors
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ErrorData>,
}

#[derive(Serialize)]
pub struct ErrorData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            error: RpcError {
                code: to_jsonrpc_code(code),
                message: message.into(),
                data: None,
            },
            id: None,
        }
    }

    pub fn with_suggestions(
        code: i32,
        message: impl Into<String>,
        suggestions: Vec<String>,
    ) -> Self {
        let mut error = Self::new(code, message);
        if !suggestions.is_empty() {
            error.error.data = Some(ErrorData {
                suggestions: Some(suggestions),
            });
        }
        error
    }
}

/// JSON-RPC reserves -32000 to -32099 for server/application errors
fn to_jsonrpc_code(exit_code: i32) -> i32 {
    -32000 - exit_code
}

// ============================================================================
// Result data structures for different commands
// ============================================================================

/// result of `match`
#[derive(Serialize)]
pub struct MatchData<'a> {
    /// records that matched before paging
    pub matched: usize,
    pub returned: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
    pub records: Vec<&'a Value>,
}

/// result of `match --count`
#[derive(Serialize)]
pub struct CountData {
    pub matched: usize,
}

/// result of `explain`
#[derive(Serialize)]
pub struct ExplainData {
    pub rendered: String,
    pub fields: Vec<String>,
    pub condition: Value,
}

/// result of the `changeset` mutation commands
#[derive(Serialize)]
pub struct QueuedData {
    pub action: &'static str,
    pub relative_path: String,
    pub file: String,
}

/// result of `changeset show`
#[derive(Serialize)]
pub struct PendingData {
    pub file: String,
    pub pending: indexmap::IndexMap<String, FileUpdate>,
}

/// result of `changeset apply` and `update --in-place`
#[derive(Serialize)]
pub struct AppliedData {
    pub updated: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub written: Option<String>,
}

// ============================================================================
// Output functions
// ============================================================================

/// format a string template with `{dot.path}` placeholders resolved against
/// `record`
///
/// unknown placeholders are left as-is, null renders empty and arrays are
/// joined with ", ".
pub fn format_template(template: &str, record: &Value) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            match DotPath::parse(&caps[1]).get(record) {
                Some(value) => render_scalar(value),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                _ => v.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        _ => value.to_string(),
    }
}

/// print JSON-RPC success response to stdout
pub fn print_json<T: Serialize>(data: &T) {
    let response = JsonRpcResponse::new(data);
    if let Ok(json) = serde_json::to_string(&response) {
        println!("{}", json);
    }
}

/// print JSON-RPC error with optional suggestions to stdout
pub fn print_json_error(code: i32, message: &str, suggestions: Vec<String>) {
    let error = JsonRpcError::with_suggestions(code, message, suggestions);
    if let Ok(json) = serde_json::to_string(&error) {
        println!("{}", json);
    }
}

/// print a plain JSON document, pretty or compact
pub fn print_document<T: Serialize>(data: &T, pretty: bool) {
    let rendered = if pretty {
        serde_json::to_string_pretty(data)
    } else {
        serde_json::to_string(data)
    };
    if let Ok(json) = rendered {
        println!("{}", json);
    }
}
