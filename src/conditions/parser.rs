//! condition parser - converts JSON to condition trees
//!
//! a node with an `operator` key is a group, a node with a `comparator` key
//! is a leaf. errors carry the JSON path of the offending node, e.g.
//! `conditions[1].comparator`.

use std::str::FromStr;

use chrono::DateTime;
use rust_decimal::Decimal;
use serde::de::{Deserialize, Deserializer, Error as _};
use serde_json::{Map, Value as JsonValue};
use strsim::levenshtein;
use thiserror::Error;

use super::types::{
    Comparator, Condition, ConditionGroup, ConditionOperator, ConditionType, ConditionValue,
    DECIMAL_TAG, TIMESTAMP_TAG,
};

/// error type for parsing conditions
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}{message}", path_prefix(.path))]
pub struct ParseError {
    pub message: String,
    /// JSON path of the node that failed, empty for the root
    pub path: String,
    /// close matches for an unrecognized token
    pub suggestions: Vec<String>,
}

fn path_prefix(path: &str) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!("{}: ", path)
    }
}

impl ParseError {
    pub fn new(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: path.into(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    /// re-anchor an error produced without path context
    fn at(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }
}

// ============================================================================
// Token parsing
// ============================================================================

const MAX_SUGGESTION_DISTANCE: usize = 3;

/// tokens within a small edit distance of `input`, closest first
fn suggest(input: &str, candidates: &[&str]) -> Vec<String> {
    let input = input.to_uppercase();
    let mut scored: Vec<(usize, &str)> = candidates
        .iter()
        .map(|c| (levenshtein(&input, c), *c))
        .filter(|(distance, _)| *distance <= MAX_SUGGESTION_DISTANCE)
        .collect();
    scored.sort_by_key(|(distance, _)| *distance);
    scored.into_iter().map(|(_, c)| c.to_string()).collect()
}

impl FromStr for Comparator {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        let upper = token.to_uppercase();

        let parsed = Comparator::ALL
            .into_iter()
            .find(|c| c.as_str() == upper || c.compact() == token);
        if let Some(comparator) = parsed {
            return Ok(comparator);
        }

        let tokens: Vec<&str> = Comparator::ALL.iter().map(Comparator::as_str).collect();
        Err(
            ParseError::new(format!("unrecognized comparator '{}'", s), "")
                .with_suggestions(suggest(token, &tokens)),
        )
    }
}

impl FromStr for ConditionOperator {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "AND" => Ok(ConditionOperator::And),
            "OR" => Ok(ConditionOperator::Or),
            "NOT" => Ok(ConditionOperator::Not),
            _ => Err(
                ParseError::new(format!("unrecognized operator '{}'", s), "")
                    .with_suggestions(suggest(s.trim(), &["AND", "OR", "NOT"])),
            ),
        }
    }
}

// ============================================================================
// Tree parsing
// ============================================================================

/// parse a JSON value into a condition tree
pub fn parse_condition(json: &JsonValue) -> Result<ConditionType, ParseError> {
    parse_condition_internal(json, "")
}

/// parse a literal condition value
///
/// scalars map to their own variant; strings stay strings (timestamps in
/// string form are coerced at evaluation time, not here). decimals and
/// timestamps are read from their tagged form, `{"$decimal": "20.20"}` and
/// `{"$timestamp": "2024-03-01T12:00:00Z"}`.
pub fn parse_value(json: &JsonValue, path: &str) -> Result<ConditionValue, ParseError> {
    match json {
        JsonValue::Null => Ok(ConditionValue::Null),
        JsonValue::Bool(b) => Ok(ConditionValue::Bool(*b)),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(ConditionValue::Int(i))
            } else if let Some(f) = n.as_f64() {
                Ok(ConditionValue::Float(f))
            } else {
                Err(ParseError::new(format!("unsupported number {}", n), path))
            }
        }
        JsonValue::String(s) => Ok(ConditionValue::String(s.clone())),
        JsonValue::Array(_) => Err(ParseError::new(
            "value must be a scalar, got an array",
            path,
        )),
        JsonValue::Object(obj) => parse_tagged_value(obj, path),
    }
}

fn parse_tagged_value(
    obj: &Map<String, JsonValue>,
    path: &str,
) -> Result<ConditionValue, ParseError> {
    let mut entries = obj.iter();
    let (tag, raw) = match (entries.next(), entries.next()) {
        (Some((tag, JsonValue::String(raw))), None) => (tag.as_str(), raw),
        _ => {
            return Err(ParseError::new(
                format!(
                    "value must be a scalar or a tagged {{\"{}\": ..}} / {{\"{}\": ..}} string",
                    DECIMAL_TAG, TIMESTAMP_TAG
                ),
                path,
            ))
        }
    };

    match tag {
        DECIMAL_TAG => raw
            .trim()
            .parse::<Decimal>()
            .map(ConditionValue::Decimal)
            .map_err(|e| ParseError::new(format!("invalid decimal '{}': {}", raw, e), path)),
        TIMESTAMP_TAG => parse_timestamp(raw)
            .map(ConditionValue::Timestamp)
            .ok_or_else(|| ParseError::new(format!("invalid timestamp '{}'", raw), path)),
        other => Err(ParseError::new(
            format!("unknown value tag '{}'", other),
            path,
        )
        .with_suggestions(suggest_tag(other))),
    }
}

fn suggest_tag(tag: &str) -> Vec<String> {
    [DECIMAL_TAG, TIMESTAMP_TAG]
        .into_iter()
        .filter(|t| levenshtein(tag, t) <= MAX_SUGGESTION_DISTANCE)
        .map(str::to_string)
        .collect()
}

/// parse a timestamp literal: RFC 3339, or a naive date/time taken as UTC
pub fn parse_timestamp(s: &str) -> Option<DateTime<chrono::FixedOffset>> {
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts);
    }

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
    for format in NAIVE_FORMATS {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc().fixed_offset());
        }
    }

    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}

fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn parse_condition_internal(json: &JsonValue, path: &str) -> Result<ConditionType, ParseError> {
    let obj = match json {
        JsonValue::Object(obj) => obj,
        other => {
            return Err(ParseError::new(
                format!("expected a condition object, got {}", type_name(other)),
                path,
            ))
        }
    };

    match (obj.contains_key("operator"), obj.contains_key("comparator")) {
        (true, true) => Err(ParseError::new(
            "ambiguous node: has both 'operator' and 'comparator'",
            path,
        )),
        (true, false) => parse_group(obj, path).map(ConditionType::Group),
        (false, true) => parse_leaf(obj, path).map(ConditionType::Condition),
        (false, false) => Err(ParseError::new(
            "expected 'comparator' (condition) or 'operator' (condition group)",
            path,
        )),
    }
}

fn parse_leaf(obj: &Map<String, JsonValue>, path: &str) -> Result<Condition, ParseError> {
    let field = match obj.get("field") {
        Some(JsonValue::String(s)) if !s.is_empty() => s.clone(),
        Some(JsonValue::String(_)) => {
            return Err(ParseError::new(
                "field must not be empty",
                join_path(path, "field"),
            ))
        }
        Some(other) => {
            return Err(ParseError::new(
                format!("field must be a string, got {}", type_name(other)),
                join_path(path, "field"),
            ))
        }
        None => return Err(ParseError::new("missing 'field'", path)),
    };

    let comparator_path = join_path(path, "comparator");
    let comparator = match obj.get("comparator") {
        Some(JsonValue::String(s)) => s
            .parse::<Comparator>()
            .map_err(|e| e.at(&comparator_path))?,
        Some(other) => {
            return Err(ParseError::new(
                format!("comparator must be a string, got {}", type_name(other)),
                comparator_path,
            ))
        }
        None => return Err(ParseError::new("missing 'comparator'", path)),
    };

    let value = match obj.get("value") {
        Some(json) => parse_value(json, &join_path(path, "value"))?,
        None if comparator.requires_value() => {
            return Err(ParseError::new(
                format!("comparator {} requires a 'value'", comparator),
                path,
            ))
        }
        None => ConditionValue::Null,
    };

    Ok(Condition {
        field,
        comparator,
        value,
    })
}

fn parse_group(obj: &Map<String, JsonValue>, path: &str) -> Result<ConditionGroup, ParseError> {
    let operator_path = join_path(path, "operator");
    let operator = match obj.get("operator") {
        Some(JsonValue::String(s)) => s
            .parse::<ConditionOperator>()
            .map_err(|e| e.at(&operator_path))?,
        Some(other) => {
            return Err(ParseError::new(
                format!("operator must be a string, got {}", type_name(other)),
                operator_path,
            ))
        }
        None => return Err(ParseError::new("missing 'operator'", path)),
    };

    let conditions_path = join_path(path, "conditions");
    let items = match obj.get("conditions") {
        Some(JsonValue::Array(items)) => items,
        Some(other) => {
            return Err(ParseError::new(
                format!("conditions must be an array, got {}", type_name(other)),
                conditions_path,
            ))
        }
        None => return Err(ParseError::new("missing 'conditions'", path)),
    };

    let conditions = items
        .iter()
        .enumerate()
        .map(|(i, item)| parse_condition_internal(item, &format!("{}[{}]", conditions_path, i)))
        .collect::<Result<Vec<_>, _>>()?;

    ConditionGroup::new(operator, conditions)
        .map_err(|e| ParseError::new(e.to_string(), conditions_path))
}

fn type_name(json: &JsonValue) -> &'static str {
    match json {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

// ============================================================================
// serde integration
// ============================================================================

impl<'de> Deserialize<'de> for ConditionType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = JsonValue::deserialize(deserializer)?;
        parse_condition(&json).map_err(D::Error::custom)
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match ConditionType::deserialize(deserializer)? {
            ConditionType::Condition(c) => Ok(c),
            ConditionType::Group(_) => Err(D::Error::custom(
                "expected a condition, got a condition group",
            )),
        }
    }
}

impl<'de> Deserialize<'de> for ConditionGroup {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match ConditionType::deserialize(deserializer)? {
            ConditionType::Group(g) => Ok(g),
            ConditionType::Condition(_) => Err(D::Error::custom(
                "expected a condition group, got a condition",
            )),
        }
    }
}

impl<'de> Deserialize<'de> for Comparator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

impl<'de> Deserialize<'de> for ConditionOperator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

impl<'de> Deserialize<'de> for ConditionValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = JsonValue::deserialize(deserializer)?;
        parse_value(&json, "").map_err(D::Error::custom)
    }
}
