//! resource qualified field names
//!
//! a field may carry a prefix naming the kind of resource it applies to,
//! e.g. `dataset.metadata.owner` or `file.tags`. the qualifier is stripped
//! before the field is resolved against a target.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

lazy_static! {
    static ref DATASET_FIELD: Regex =
        Regex::new(r"^(?:msgpath\.)?(?:topic\.)?(?:file\.)?dataset\.(?P<path>.+)$").unwrap();
    static ref FILE_FIELD: Regex =
        Regex::new(r"^(?:msgpath\.)?(?:topic\.)?file\.(?P<path>.+)$").unwrap();
    static ref TOPIC_FIELD: Regex = Regex::new(r"^(?:msgpath\.)?topic\.(?P<path>.+)$").unwrap();
    static ref MESSAGE_PATH_FIELD: Regex = Regex::new(r"^msgpath\.(?P<path>.+)$").unwrap();
}

/// kind of resource a qualified field applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Dataset,
    File,
    Topic,
    MessagePath,
}

/// qualifier and unqualified path of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldTarget<'a> {
    pub resource: Option<Resource>,
    pub path: &'a str,
}

pub struct Field;

impl Field {
    /// split a field into its resource qualifier and the path to resolve
    ///
    /// the most specific qualifier wins: `msgpath.topic.file.dataset.x`
    /// targets the dataset. unqualified fields resolve as written.
    pub fn parse(field: &str) -> FieldTarget<'_> {
        let patterns: [(&Regex, Resource); 4] = [
            (&*DATASET_FIELD, Resource::Dataset),
            (&*FILE_FIELD, Resource::File),
            (&*TOPIC_FIELD, Resource::Topic),
            (&*MESSAGE_PATH_FIELD, Resource::MessagePath),
        ];

        for (pattern, resource) in patterns {
            if let Some(path) = pattern
                .captures(field)
                .and_then(|caps| caps.name("path"))
                .map(|m| m.as_str())
            {
                return FieldTarget {
                    resource: Some(resource),
                    path,
                };
            }
        }

        FieldTarget {
            resource: None,
            path: field,
        }
    }
}
