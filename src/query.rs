//! query specifications and their local execution over JSON records

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::conditions::{compare_json, ConditionType, Field, ParseError};
use crate::path::DotPath;

/// maximum allowable page size
pub const MAX_PAGE_SIZE: usize = 1000;

/// page size used when none is configured
pub const DEFAULT_PAGE_SIZE: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    #[serde(rename = "ASC")]
    Ascending,
    #[serde(rename = "DESC")]
    Descending,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SortDirection {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(SortDirection::Ascending),
            "desc" => Ok(SortDirection::Descending),
            _ => Err(ParseError::new(
                format!("unrecognized sort direction '{}'", s),
                "sort_direction",
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("invalid page token '{0}'")]
    InvalidPageToken(String),
    #[error("invalid limit {0}: use a value between 1 and {max}", max = MAX_PAGE_SIZE)]
    InvalidLimit(usize),
}

fn default_limit() -> usize {
    MAX_PAGE_SIZE
}

/// a condition plus paging and sorting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpecification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionType>,

    #[serde(default = "default_limit")]
    pub limit: usize,

    /// page token returned as `next_token` by a previous page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,

    /// defaults to descending when `sort_by` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_direction: Option<SortDirection>,
}

impl Default for QuerySpecification {
    fn default() -> Self {
        Self {
            condition: None,
            limit: MAX_PAGE_SIZE,
            after: None,
            sort_by: None,
            sort_direction: None,
        }
    }
}

/// one page of query results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPage<'a> {
    pub items: Vec<&'a Value>,
    /// number of records that matched before paging
    pub total_matched: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

impl QuerySpecification {
    pub fn new(condition: impl Into<ConditionType>) -> Self {
        Self {
            condition: Some(condition.into()),
            ..Self::default()
        }
    }

    /// every field referenced anywhere in the condition tree
    pub fn fields(&self) -> BTreeSet<String> {
        self.condition
            .iter()
            .flat_map(|c| c.fields())
            .map(str::to_string)
            .collect()
    }

    /// filter, sort and page `records`
    ///
    /// records without the sort field always come last. records with equal
    /// sort keys keep their input order.
    pub fn execute<'a>(&self, records: &'a [Value]) -> Result<QueryPage<'a>, QueryError> {
        if self.limit == 0 || self.limit > MAX_PAGE_SIZE {
            return Err(QueryError::InvalidLimit(self.limit));
        }
        let offset = match &self.after {
            Some(token) => decode_token(token)?,
            None => 0,
        };

        let mut matched: Vec<&Value> = records
            .iter()
            .filter(|r| self.condition.as_ref().map_or(true, |c| c.matches(r)))
            .collect();

        if let Some(sort_by) = &self.sort_by {
            let path = DotPath::parse(Field::parse(sort_by).path);
            let direction = self.sort_direction.unwrap_or(SortDirection::Descending);
            matched.sort_by(|a, b| {
                let a = path.get(a).filter(|v| !v.is_null());
                let b = path.get(b).filter(|v| !v.is_null());
                match (a, b) {
                    (Some(a), Some(b)) => match direction {
                        SortDirection::Ascending => compare_json(a, b),
                        SortDirection::Descending => compare_json(b, a),
                    },
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                }
            });
        }

        let total_matched = matched.len();
        let end = offset.saturating_add(self.limit).min(total_matched);
        let items: Vec<&Value> = matched
            .into_iter()
            .skip(offset)
            .take(self.limit)
            .collect();
        let next_token = (!items.is_empty() && end < total_matched).then(|| encode_token(end));

        debug!(
            total_matched,
            returned = items.len(),
            offset,
            "executed query"
        );

        Ok(QueryPage {
            items,
            total_matched,
            next_token,
        })
    }
}

fn encode_token(offset: usize) -> String {
    format!("offset:{}", offset)
}

fn decode_token(token: &str) -> Result<usize, QueryError> {
    token
        .strip_prefix("offset:")
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| QueryError::InvalidPageToken(token.to_string()))
}
