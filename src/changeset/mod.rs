//! metadata changesets: additive and subtractive edits to a record's
//! metadata mapping and tag list

pub mod file;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::path::DotPath;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChangesetError {
    #[error("expected KEY=VALUE, got '{0}'")]
    MissingSeparator(String),
    #[error("empty key in '{0}'")]
    EmptyKey(String),
}

/// treat an explicit `null` like a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn concat(a: &[String], b: &[String]) -> Vec<String> {
    a.iter().chain(b).cloned().collect()
}

/// a bundle of edits to a metadata mapping and a tag list
///
/// field keys are dot-paths (`b.c.1`). removals are applied before puts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataChangeset {
    /// tags to add when not already present
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub put_tags: Vec<String>,

    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub remove_tags: Vec<String>,

    /// dot-path to value, applied in insertion order
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub put_fields: IndexMap<String, Value>,

    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub remove_fields: Vec<String>,
}

impl MetadataChangeset {
    pub fn builder() -> MetadataChangesetBuilder {
        MetadataChangesetBuilder::default()
    }

    pub fn is_empty(&self) -> bool {
        self.put_tags.is_empty()
            && self.remove_tags.is_empty()
            && self.put_fields.is_empty()
            && self.remove_fields.is_empty()
    }

    /// merge two changesets; `other`'s field puts win on key collision and
    /// list edits are concatenated
    pub fn combine(&self, other: &MetadataChangeset) -> MetadataChangeset {
        let mut put_fields = self.put_fields.clone();
        for (key, value) in &other.put_fields {
            put_fields.insert(key.clone(), value.clone());
        }

        MetadataChangeset {
            put_tags: concat(&self.put_tags, &other.put_tags),
            remove_tags: concat(&self.remove_tags, &other.remove_tags),
            put_fields,
            remove_fields: concat(&self.remove_fields, &other.remove_fields),
        }
    }

    /// return a copy of `existing` with this changeset's field edits applied
    ///
    /// removals prune containers they leave empty. puts create intermediate
    /// objects and insert at list indices. a put whose path cannot be
    /// followed is skipped with a warning.
    pub fn apply_field_updates(&self, existing: &Map<String, Value>) -> Map<String, Value> {
        let mut updated = Value::Object(existing.clone());

        for key in &self.remove_fields {
            if DotPath::parse(key).remove(&mut updated) {
                debug!(path = %key, "removed metadata field");
            }
        }

        for (key, value) in &self.put_fields {
            match DotPath::parse(key).put(&mut updated, value.clone()) {
                Ok(()) => debug!(path = %key, "put metadata field"),
                Err(e) => warn!(path = %key, error = %e, "skipping metadata field"),
            }
        }

        updated.as_object_mut().map(std::mem::take).unwrap_or_default()
    }

    /// return `existing` minus removed tags, followed by new put tags
    pub fn apply_tag_updates(&self, existing: &[String]) -> Vec<String> {
        let mut tags: Vec<String> = existing
            .iter()
            .filter(|tag| !self.remove_tags.contains(tag))
            .cloned()
            .collect();

        for tag in &self.put_tags {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }

        tags
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetadataChangesetBuilder {
    changeset: MetadataChangeset,
}

impl MetadataChangesetBuilder {
    pub fn put_tag(mut self, tag: impl Into<String>) -> Self {
        self.changeset.put_tags.push(tag.into());
        self
    }

    pub fn remove_tag(mut self, tag: impl Into<String>) -> Self {
        self.changeset.remove_tags.push(tag.into());
        self
    }

    pub fn put_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.changeset.put_fields.insert(key.into(), value.into());
        self
    }

    pub fn remove_field(mut self, key: impl Into<String>) -> Self {
        self.changeset.remove_fields.push(key.into());
        self
    }

    pub fn build(self) -> MetadataChangeset {
        self.changeset
    }
}

/// parse `key.path=VALUE`; the value is read as JSON when it parses,
/// otherwise taken as a plain string
pub fn parse_key_value(pair: &str) -> Result<(String, Value), ChangesetError> {
    let (key, raw) = pair
        .split_once('=')
        .ok_or_else(|| ChangesetError::MissingSeparator(pair.to_string()))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(ChangesetError::EmptyKey(pair.to_string()));
    }

    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}
