mod schema;

pub use schema::{Config, Settings};

use anyhow::{anyhow, Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::conditions::{parse_condition, ConditionType};
use crate::query::MAX_PAGE_SIZE;

const CONFIG_ENV_VAR: &str = "METAQUERY_CONFIG";
const CHANGESET_ENV_VAR: &str = "METAQUERY_CHANGESET_FILE";

fn metaquery_dir() -> Result<PathBuf> {
    Ok(dirs::home_dir()
        .ok_or_else(|| anyhow!("Could not find home directory"))?
        .join(".metaquery"))
}

pub fn get_config_path() -> Result<PathBuf> {
    if let Ok(path) = env::var(CONFIG_ENV_VAR) {
        return Ok(PathBuf::from(path));
    }

    Ok(metaquery_dir()?.join("config.json"))
}

/// `--config` wins over the env var and the default location
pub fn get_config_path_with_override(path: Option<&Path>) -> Result<PathBuf> {
    match path {
        Some(p) => Ok(p.to_path_buf()),
        None => get_config_path(),
    }
}

/// load the config; a missing file yields the defaults
pub fn load_with_override(path: Option<&Path>) -> Result<Config> {
    let path = get_config_path_with_override(path)?;

    if !path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config)
}

pub fn save_with_override(config: &Config, path: Option<&Path>) -> Result<()> {
    let path = get_config_path_with_override(path)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(config).context("Failed to serialize config")?;

    fs::write(&path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;

    Ok(())
}

/// Verify configuration file and return a list of errors
pub fn verify(path: &Path) -> Result<Vec<String>> {
    let mut errors = Vec::new();

    if !path.exists() {
        return Err(anyhow!("config file not found: {}", path.display()));
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: Config = match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            return Err(anyhow!("invalid JSON: {}", e));
        }
    };

    for (name, json) in &config.queries {
        if let Err(e) = parse_condition(json) {
            errors.push(format!("queries.{}: {}", name, e));
        }
    }

    if config.settings.limit == 0 || config.settings.limit > MAX_PAGE_SIZE {
        errors.push(format!(
            "settings.limit: {} is out of range (1..={})",
            config.settings.limit, MAX_PAGE_SIZE
        ));
    }

    Ok(errors)
}

pub fn set_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["settings", "limit"] => {
            let limit: usize = value
                .parse()
                .with_context(|| format!("Invalid number: {}", value))?;
            if limit == 0 || limit > MAX_PAGE_SIZE {
                return Err(anyhow!(
                    "Invalid limit: {}. Use a value between 1 and {}",
                    value,
                    MAX_PAGE_SIZE
                ));
            }
            config.settings.limit = limit;
        }
        ["settings", "pretty"] => {
            config.settings.pretty = parse_bool(value)?;
        }
        ["settings", "changeset_file"] => {
            config.settings.changeset_file = match value {
                "" | "null" | "none" => None,
                path => Some(path.to_string()),
            };
        }
        ["queries", name] => {
            let json: serde_json::Value = serde_json::from_str(value)
                .with_context(|| format!("Invalid JSON for query '{}'", name))?;
            parse_condition(&json).with_context(|| format!("Invalid query '{}'", name))?;
            config.queries.insert(name.to_string(), json);
        }
        _ => {
            return Err(anyhow!(
                "Unknown config key: {}. Valid keys: settings.limit, settings.pretty, settings.changeset_file, queries.<name>",
                key
            ));
        }
    }

    Ok(())
}

/// look up and parse a saved query
pub fn saved_query(config: &Config, name: &str) -> Result<ConditionType> {
    let json = config.queries.get(name).ok_or_else(|| {
        let known: Vec<&str> = config.queries.keys().map(String::as_str).collect();
        if known.is_empty() {
            anyhow!("No saved query named '{}' (no queries configured)", name)
        } else {
            anyhow!(
                "No saved query named '{}'. Known queries: {}",
                name,
                known.join(", ")
            )
        }
    })?;

    parse_condition(json).with_context(|| format!("Invalid saved query '{}'", name))
}

/// resolve the changeset log location
///
/// precedence: `METAQUERY_CHANGESET_FILE`, `settings.changeset_file` (with
/// `~` expansion), then `~/.metaquery/changeset.jsonl`.
pub fn changeset_file_path(config: &Config) -> Result<PathBuf> {
    if let Ok(path) = env::var(CHANGESET_ENV_VAR) {
        return Ok(PathBuf::from(path));
    }

    if let Some(path) = &config.settings.changeset_file {
        return Ok(PathBuf::from(shellexpand::tilde(path).into_owned()));
    }

    Ok(metaquery_dir()?.join("changeset.jsonl"))
}

/// generates a default config with example saved queries
pub fn default_with_examples() -> Config {
    let mut config = Config::default();
    config.queries.insert(
        "large".to_string(),
        serde_json::json!({
            "field": "metadata.size_bytes",
            "comparator": "GREATER_THAN",
            "value": 1_000_000
        }),
    );
    config.queries.insert(
        "untagged_logs".to_string(),
        serde_json::json!({
            "operator": "AND",
            "conditions": [
                { "field": "relative_path", "comparator": "BEGINS_WITH", "value": "logs/" },
                { "field": "tags", "comparator": "NOT_EXISTS" }
            ]
        }),
    );
    config
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(anyhow!(
            "Invalid boolean value: {}. Use true/false, yes/no, 1/0, or on/off",
            value
        )),
    }
}
