//! core types for the condition system

use std::fmt;

use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use thiserror::Error;

use super::field::{Field, FieldTarget, Resource};

/// comparators supported in conditions
///
/// the wire form is always the upper snake case token (`GREATER_THAN`); the
/// compact symbols are only used for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Contains,
    NotContains,
    IsNull,
    IsNotNull,
    Exists,
    NotExists,
    BeginsWith,
    /// SQL pattern, evaluated only by the remote search service
    Like,
    /// SQL pattern, evaluated only by the remote search service
    NotLike,
}

impl Comparator {
    pub const ALL: [Comparator; 15] = [
        Comparator::Equals,
        Comparator::NotEquals,
        Comparator::GreaterThan,
        Comparator::GreaterThanOrEqual,
        Comparator::LessThan,
        Comparator::LessThanOrEqual,
        Comparator::Contains,
        Comparator::NotContains,
        Comparator::IsNull,
        Comparator::IsNotNull,
        Comparator::Exists,
        Comparator::NotExists,
        Comparator::BeginsWith,
        Comparator::Like,
        Comparator::NotLike,
    ];

    /// wire token
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::Equals => "EQUALS",
            Comparator::NotEquals => "NOT_EQUALS",
            Comparator::GreaterThan => "GREATER_THAN",
            Comparator::GreaterThanOrEqual => "GREATER_THAN_OR_EQUAL",
            Comparator::LessThan => "LESS_THAN",
            Comparator::LessThanOrEqual => "LESS_THAN_OR_EQUAL",
            Comparator::Contains => "CONTAINS",
            Comparator::NotContains => "NOT_CONTAINS",
            Comparator::IsNull => "IS_NULL",
            Comparator::IsNotNull => "IS_NOT_NULL",
            Comparator::Exists => "EXISTS",
            Comparator::NotExists => "NOT_EXISTS",
            Comparator::BeginsWith => "BEGINS_WITH",
            Comparator::Like => "LIKE",
            Comparator::NotLike => "NOT_LIKE",
        }
    }

    /// symbol for equality and ordering comparators, wire token otherwise
    pub fn compact(&self) -> &'static str {
        match self {
            Comparator::Equals => "=",
            Comparator::NotEquals => "!=",
            Comparator::GreaterThan => ">",
            Comparator::GreaterThanOrEqual => ">=",
            Comparator::LessThan => "<",
            Comparator::LessThanOrEqual => "<=",
            other => other.as_str(),
        }
    }

    /// whether a condition using this comparator needs a `value`
    pub fn requires_value(&self) -> bool {
        !matches!(
            self,
            Comparator::IsNull | Comparator::IsNotNull | Comparator::Exists | Comparator::NotExists
        )
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for Comparator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// operator used to combine the children of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionOperator {
    And,
    Or,
    /// none of the children match
    Not,
}

impl ConditionOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionOperator::And => "AND",
            ConditionOperator::Or => "OR",
            ConditionOperator::Not => "NOT",
        }
    }
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for ConditionOperator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// wire key of a decimal literal, `{"$decimal": "20.20"}`
pub(crate) const DECIMAL_TAG: &str = "$decimal";

/// wire key of a timestamp literal, `{"$timestamp": "2024-03-01T12:00:00+00:00"}`
pub(crate) const TIMESTAMP_TAG: &str = "$timestamp";

/// literal a field is compared against
///
/// decimals and timestamps serialize as single-key tagged objects so they
/// parse back to the same variant.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConditionValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Timestamp(DateTime<FixedOffset>),
    String(String),
}

impl ConditionValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ConditionValue::Null)
    }
}

impl fmt::Display for ConditionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionValue::Null => write!(f, "null"),
            ConditionValue::Bool(b) => write!(f, "{}", b),
            ConditionValue::Int(n) => write!(f, "{}", n),
            ConditionValue::Float(n) => write!(f, "{}", serde_json::Value::from(*n)),
            ConditionValue::Decimal(d) => write!(f, "{}", d),
            ConditionValue::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            ConditionValue::String(s) => write!(f, "{}", serde_json::Value::from(s.as_str())),
        }
    }
}

impl Serialize for ConditionValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ConditionValue::Null => serializer.serialize_unit(),
            ConditionValue::Bool(b) => serializer.serialize_bool(*b),
            ConditionValue::Int(n) => serializer.serialize_i64(*n),
            ConditionValue::Float(n) => serializer.serialize_f64(*n),
            ConditionValue::Decimal(d) => serialize_tagged(serializer, DECIMAL_TAG, &d.to_string()),
            ConditionValue::Timestamp(ts) => {
                serialize_tagged(serializer, TIMESTAMP_TAG, &ts.to_rfc3339())
            }
            ConditionValue::String(s) => serializer.serialize_str(s),
        }
    }
}

fn serialize_tagged<S: Serializer>(
    serializer: S,
    tag: &str,
    value: &str,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(1))?;
    map.serialize_entry(tag, value)?;
    map.end()
}

impl From<bool> for ConditionValue {
    fn from(value: bool) -> Self {
        ConditionValue::Bool(value)
    }
}

impl From<i64> for ConditionValue {
    fn from(value: i64) -> Self {
        ConditionValue::Int(value)
    }
}

impl From<i32> for ConditionValue {
    fn from(value: i32) -> Self {
        ConditionValue::Int(i64::from(value))
    }
}

impl From<f64> for ConditionValue {
    fn from(value: f64) -> Self {
        ConditionValue::Float(value)
    }
}

impl From<Decimal> for ConditionValue {
    fn from(value: Decimal) -> Self {
        ConditionValue::Decimal(value)
    }
}

impl From<DateTime<FixedOffset>> for ConditionValue {
    fn from(value: DateTime<FixedOffset>) -> Self {
        ConditionValue::Timestamp(value)
    }
}

impl From<DateTime<Utc>> for ConditionValue {
    fn from(value: DateTime<Utc>) -> Self {
        ConditionValue::Timestamp(value.fixed_offset())
    }
}

impl From<&str> for ConditionValue {
    fn from(value: &str) -> Self {
        ConditionValue::String(value.to_string())
    }
}

impl From<String> for ConditionValue {
    fn from(value: String) -> Self {
        ConditionValue::String(value)
    }
}

impl<T: Into<ConditionValue>> From<Option<T>> for ConditionValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

/// error raised when building an invalid condition tree
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("at least one condition must be provided to a condition group, got 0")]
    EmptyGroup,
}

/// a single field comparison
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    /// dot-path into the target, optionally resource qualified (`dataset.metadata.owner`)
    pub field: String,
    pub comparator: Comparator,
    pub value: ConditionValue,
}

impl Condition {
    pub fn new(
        field: impl Into<String>,
        comparator: Comparator,
        value: impl Into<ConditionValue>,
    ) -> Self {
        Self {
            field: field.into(),
            comparator,
            value: value.into(),
        }
    }

    pub fn equals(field: impl Into<String>, value: impl Into<ConditionValue>) -> Self {
        Self::new(field, Comparator::Equals, value)
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Self::new(field, Comparator::Exists, ConditionValue::Null)
    }

    /// resource qualifier and path this condition's field points at
    pub fn target(&self) -> FieldTarget<'_> {
        Field::parse(&self.field)
    }

    pub fn target_unspecified(&self) -> bool {
        self.target().resource.is_none()
    }

    pub fn targets_dataset(&self) -> bool {
        self.target().resource == Some(Resource::Dataset)
    }

    pub fn targets_file(&self) -> bool {
        self.target().resource == Some(Resource::File)
    }

    pub fn targets_topic(&self) -> bool {
        self.target().resource == Some(Resource::Topic)
    }

    pub fn targets_message_path(&self) -> bool {
        self.target().resource == Some(Resource::MessagePath)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.comparator.compact())?;
        if !self.value.is_null() {
            write!(f, " {}", self.value)?;
        }
        Ok(())
    }
}

/// boolean combination of conditions, never empty
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionGroup {
    operator: ConditionOperator,
    conditions: Vec<ConditionType>,
}

impl ConditionGroup {
    pub fn new(
        operator: ConditionOperator,
        conditions: Vec<ConditionType>,
    ) -> Result<Self, ConditionError> {
        if conditions.is_empty() {
            return Err(ConditionError::EmptyGroup);
        }
        Ok(Self {
            operator,
            conditions,
        })
    }

    pub fn and_group<I, C>(conditions: I) -> Result<Self, ConditionError>
    where
        I: IntoIterator<Item = C>,
        C: Into<ConditionType>,
    {
        Self::new(
            ConditionOperator::And,
            conditions.into_iter().map(Into::into).collect(),
        )
    }

    pub fn or_group<I, C>(conditions: I) -> Result<Self, ConditionError>
    where
        I: IntoIterator<Item = C>,
        C: Into<ConditionType>,
    {
        Self::new(
            ConditionOperator::Or,
            conditions.into_iter().map(Into::into).collect(),
        )
    }

    pub fn not_group<I, C>(conditions: I) -> Result<Self, ConditionError>
    where
        I: IntoIterator<Item = C>,
        C: Into<ConditionType>,
    {
        Self::new(
            ConditionOperator::Not,
            conditions.into_iter().map(Into::into).collect(),
        )
    }

    pub fn operator(&self) -> ConditionOperator {
        self.operator
    }

    pub fn conditions(&self) -> &[ConditionType] {
        &self.conditions
    }

    pub fn into_parts(self) -> (ConditionOperator, Vec<ConditionType>) {
        (self.operator, self.conditions)
    }
}

impl fmt::Display for ConditionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, c) in self.conditions.iter().enumerate() {
            if i > 0 {
                write!(f, " {} ", self.operator)?;
            }
            write!(f, "{}", c)?;
        }
        write!(f, ")")
    }
}

/// a condition tree node: leaf or group
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConditionType {
    Condition(Condition),
    Group(ConditionGroup),
}

impl ConditionType {
    /// every field referenced in this tree, in visiting order
    pub fn fields(&self) -> Vec<&str> {
        let mut fields = Vec::new();
        collect_fields(self, &mut fields);
        fields
    }
}

fn collect_fields<'a>(condition: &'a ConditionType, fields: &mut Vec<&'a str>) {
    match condition {
        ConditionType::Condition(c) => fields.push(&c.field),
        ConditionType::Group(g) => {
            for child in &g.conditions {
                collect_fields(child, fields);
            }
        }
    }
}

impl From<Condition> for ConditionType {
    fn from(condition: Condition) -> Self {
        ConditionType::Condition(condition)
    }
}

impl From<ConditionGroup> for ConditionType {
    fn from(group: ConditionGroup) -> Self {
        ConditionType::Group(group)
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionType::Condition(c) => write!(f, "{}", c),
            ConditionType::Group(g) => write!(f, "{}", g),
        }
    }
}
