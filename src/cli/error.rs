//! command error type carrying an exit code

use std::fmt;

use crate::changeset::file::ChangesetFileError;
use crate::changeset::ChangesetError;
use crate::conditions::ParseError;
use crate::query::QueryError;

use super::exit_codes;

/// error returned by command execution
#[derive(Debug, Clone)]
pub struct CliError {
    /// exit code (maps to JSON-RPC error code via -32000 - code)
    pub code: i32,
    pub message: String,
    /// suggested alternatives (e.g., close comparator names)
    pub suggestions: Vec<String>,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::new(exit_codes::INVALID_ARGS, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(exit_codes::CONFIG_ERROR, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(exit_codes::PARSE_ERROR, message)
    }

    pub fn general(message: impl Into<String>) -> Self {
        Self::new(exit_codes::ERROR, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        Self::general(format!("{:#}", err))
    }
}

impl From<ParseError> for CliError {
    fn from(err: ParseError) -> Self {
        let suggestions = err.suggestions.clone();
        Self::parse(err.to_string()).with_suggestions(suggestions)
    }
}

impl From<QueryError> for CliError {
    fn from(err: QueryError) -> Self {
        Self::invalid_args(err.to_string())
    }
}

impl From<ChangesetError> for CliError {
    fn from(err: ChangesetError) -> Self {
        Self::invalid_args(err.to_string())
    }
}

impl From<ChangesetFileError> for CliError {
    fn from(err: ChangesetFileError) -> Self {
        match err {
            ChangesetFileError::Malformed { .. } => Self::parse(err.to_string()),
            _ => Self::general(err.to_string()),
        }
    }
}
