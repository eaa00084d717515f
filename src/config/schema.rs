use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::query::DEFAULT_PAGE_SIZE;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// named conditions, stored as condition JSON
    #[serde(default)]
    pub queries: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// page size for `match` when neither the query nor the flags set one
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// pretty-print JSON documents in text mode
    #[serde(default = "default_pretty")]
    pub pretty: bool,
    /// location of the queued file changeset log
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changeset_file: Option<String>,
}

fn default_limit() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_pretty() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            pretty: true,
            changeset_file: None,
        }
    }
}
