//! queued per-file changesets
//!
//! edits to files that do not exist yet are appended to a JSON lines log,
//! one `{"relative_path", "update"}` row per call. when the edits are
//! consumed, rows are grouped by relative path and combined in file order.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use super::MetadataChangeset;

#[derive(Debug, Error)]
pub enum ChangesetFileError {
    #[error("failed to access changeset file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed changeset entry at {path}:{line}: {source}")]
    Malformed {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode changeset entry: {0}")]
    Encode(#[from] serde_json::Error),
}

/// pending update for one file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_changeset: Option<MetadataChangeset>,
}

impl FileUpdate {
    /// fold a later update into this one
    pub fn merge(&mut self, later: FileUpdate) {
        if later.description.is_some() {
            self.description = later.description;
        }
        self.metadata_changeset = match (self.metadata_changeset.take(), later.metadata_changeset) {
            (Some(earlier), Some(later)) => Some(earlier.combine(&later)),
            (earlier, later) => earlier.or(later),
        };
    }

    /// apply this update to a record shaped `{description?, metadata, tags}`
    ///
    /// `metadata` and `tags` are only rewritten when the changeset edits them.
    pub fn apply_to(&self, record: &mut Map<String, Value>) {
        if let Some(description) = &self.description {
            record.insert("description".to_string(), Value::String(description.clone()));
        }

        let Some(changeset) = &self.metadata_changeset else {
            return;
        };

        if !changeset.put_fields.is_empty() || !changeset.remove_fields.is_empty() {
            let metadata = match record.get("metadata") {
                Some(Value::Object(map)) => changeset.apply_field_updates(map),
                _ => changeset.apply_field_updates(&Map::new()),
            };
            record.insert("metadata".to_string(), Value::Object(metadata));
        }

        if !changeset.put_tags.is_empty() || !changeset.remove_tags.is_empty() {
            let existing = match record.get("tags") {
                Some(Value::Array(items)) => items.clone(),
                _ => Vec::new(),
            };
            record.insert("tags".to_string(), Value::Array(apply_tags(changeset, existing)));
        }
    }
}

/// run tag edits over a raw tag list; non-string entries are kept in place
fn apply_tags(changeset: &MetadataChangeset, existing: Vec<Value>) -> Vec<Value> {
    let strings: Vec<String> = existing
        .iter()
        .filter_map(|t| t.as_str().map(str::to_string))
        .collect();
    let updated = changeset.apply_tag_updates(&strings);

    let mut tags: Vec<Value> = existing
        .into_iter()
        .filter(|t| t.as_str().map_or(true, |s| updated.iter().any(|u| u == s)))
        .collect();
    tags.extend(
        updated
            .into_iter()
            .filter(|t| !strings.contains(t))
            .map(Value::String),
    );
    tags
}

/// a single row of the changeset log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileChangesetItem {
    pub relative_path: String,
    pub update: FileUpdate,
}

/// appends and reads back queued file updates
#[derive(Debug, Clone)]
pub struct FileChangesetManager {
    path: PathBuf,
}

impl FileChangesetManager {
    /// open the changeset log at `path`, creating it (and its parent
    /// directories) if missing
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ChangesetFileError> {
        let path = path.into();
        let io_err = |source| ChangesetFileError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn put_tags<I, S>(&self, relative_path: &str, tags: I) -> Result<(), ChangesetFileError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let changeset = MetadataChangeset {
            put_tags: tags.into_iter().map(Into::into).collect(),
            ..MetadataChangeset::default()
        };
        self.append_changeset(relative_path, changeset)
    }

    pub fn remove_tags<I, S>(&self, relative_path: &str, tags: I) -> Result<(), ChangesetFileError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let changeset = MetadataChangeset {
            remove_tags: tags.into_iter().map(Into::into).collect(),
            ..MetadataChangeset::default()
        };
        self.append_changeset(relative_path, changeset)
    }

    pub fn put_fields<I, K>(&self, relative_path: &str, fields: I) -> Result<(), ChangesetFileError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let changeset = MetadataChangeset {
            put_fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            ..MetadataChangeset::default()
        };
        self.append_changeset(relative_path, changeset)
    }

    pub fn remove_fields<I, S>(&self, relative_path: &str, keys: I) -> Result<(), ChangesetFileError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let changeset = MetadataChangeset {
            remove_fields: keys.into_iter().map(Into::into).collect(),
            ..MetadataChangeset::default()
        };
        self.append_changeset(relative_path, changeset)
    }

    pub fn set_description(
        &self,
        relative_path: &str,
        description: impl Into<String>,
    ) -> Result<(), ChangesetFileError> {
        self.append(&FileChangesetItem {
            relative_path: relative_path.to_string(),
            update: FileUpdate {
                description: Some(description.into()),
                metadata_changeset: None,
            },
        })
    }

    /// every row of the log, in file order
    pub fn items(&self) -> Result<Vec<FileChangesetItem>, ChangesetFileError> {
        let content = fs::read_to_string(&self.path).map_err(|source| ChangesetFileError::Io {
            path: self.path.clone(),
            source,
        })?;

        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str(line).map_err(|source| ChangesetFileError::Malformed {
                    path: self.path.clone(),
                    line: i + 1,
                    source,
                })
            })
            .collect()
    }

    /// combined update per relative path, in first-seen order
    pub fn pending_updates(&self) -> Result<IndexMap<String, FileUpdate>, ChangesetFileError> {
        let mut updates: IndexMap<String, FileUpdate> = IndexMap::new();
        for item in self.items()? {
            match updates.get_mut(&item.relative_path) {
                Some(existing) => existing.merge(item.update),
                None => {
                    updates.insert(item.relative_path, item.update);
                }
            }
        }
        Ok(updates)
    }

    /// apply pending updates to records carrying a matching `relative_path`
    ///
    /// returns the number of records updated.
    pub fn apply_to_records(&self, records: &mut [Value]) -> Result<usize, ChangesetFileError> {
        let updates = self.pending_updates()?;
        let mut applied = 0;

        for record in records.iter_mut() {
            let Some(map) = record.as_object_mut() else {
                continue;
            };
            let Some(update) = map
                .get("relative_path")
                .and_then(Value::as_str)
                .and_then(|p| updates.get(p))
            else {
                continue;
            };
            update.apply_to(map);
            applied += 1;
        }

        info!(applied, pending = updates.len(), "applied file changesets");
        Ok(applied)
    }

    /// drop every queued update
    pub fn clear(&self) -> Result<(), ChangesetFileError> {
        fs::write(&self.path, "").map_err(|source| ChangesetFileError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn append_changeset(
        &self,
        relative_path: &str,
        changeset: MetadataChangeset,
    ) -> Result<(), ChangesetFileError> {
        self.append(&FileChangesetItem {
            relative_path: relative_path.to_string(),
            update: FileUpdate {
                description: None,
                metadata_changeset: Some(changeset),
            },
        })
    }

    fn append(&self, item: &FileChangesetItem) -> Result<(), ChangesetFileError> {
        let mut line = serde_json::to_string(item)?;
        line.push('\n');

        let io_err = |source| ChangesetFileError::Io {
            path: self.path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        file.write_all(line.as_bytes()).map_err(io_err)?;

        debug!(path = %item.relative_path, "queued file update");
        Ok(())
    }
}
