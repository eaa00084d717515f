//! condition evaluator
//!
//! evaluates condition trees against JSON targets. evaluation never fails:
//! missing fields, type mismatches and unparseable coercions all make a
//! comparison false.

use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use super::parser::parse_timestamp;
use super::types::{
    Comparator, Condition, ConditionGroup, ConditionOperator, ConditionType, ConditionValue,
};
use crate::path::DotPath;

/// borrowed view of either side of a comparison
#[derive(Debug, Clone, Copy)]
enum Operand<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Timestamp(DateTime<FixedOffset>),
    Str(&'a str),
    Array(&'a [JsonValue]),
    Object(&'a Map<String, JsonValue>),
}

impl<'a> Operand<'a> {
    fn from_json(json: &'a JsonValue) -> Self {
        match json {
            JsonValue::Null => Operand::Null,
            JsonValue::Bool(b) => Operand::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Operand::Int(i),
                None => Operand::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Operand::Str(s),
            JsonValue::Array(items) => Operand::Array(items),
            JsonValue::Object(map) => Operand::Object(map),
        }
    }

    fn from_literal(value: &'a ConditionValue) -> Self {
        match value {
            ConditionValue::Null => Operand::Null,
            ConditionValue::Bool(b) => Operand::Bool(*b),
            ConditionValue::Int(i) => Operand::Int(*i),
            ConditionValue::Float(f) => Operand::Float(*f),
            ConditionValue::Decimal(d) => Operand::Decimal(*d),
            ConditionValue::Timestamp(ts) => Operand::Timestamp(*ts),
            ConditionValue::String(s) => Operand::Str(s),
        }
    }

    fn is_collection(&self) -> bool {
        matches!(self, Operand::Str(_) | Operand::Array(_) | Operand::Object(_))
    }
}

// ============================================================================
// Coercion
// ============================================================================

/// convert a string target to the type of the literal it is compared with
///
/// returns `None` when the string cannot be read as that type. non-string
/// targets and string or null literals pass through unchanged.
fn coerce<'a>(actual: Operand<'a>, literal: &ConditionValue) -> Option<Operand<'a>> {
    let Operand::Str(s) = actual else {
        return Some(actual);
    };

    let coerced = match literal {
        ConditionValue::Null | ConditionValue::String(_) => return Some(actual),
        ConditionValue::Int(_) => s.trim().parse::<i64>().ok().map(Operand::Int),
        ConditionValue::Float(_) => s.trim().parse::<f64>().ok().map(Operand::Float),
        ConditionValue::Bool(_) => Some(Operand::Bool(s.to_lowercase() == "true")),
        ConditionValue::Decimal(_) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Decimal::from_f64)
            .map(Operand::Decimal),
        ConditionValue::Timestamp(_) => parse_timestamp(s).map(Operand::Timestamp),
    };

    if coerced.is_none() {
        debug!(value = s, literal = %literal, "could not coerce target value");
    }
    coerced
}

// ============================================================================
// Comparison
// ============================================================================

fn numeric_cmp(a: Operand<'_>, b: Operand<'_>) -> Option<Ordering> {
    match (a, b) {
        (Operand::Int(x), Operand::Int(y)) => Some(x.cmp(&y)),
        (Operand::Decimal(x), Operand::Decimal(y)) => Some(x.cmp(&y)),
        (Operand::Decimal(x), Operand::Int(y)) => Some(x.cmp(&Decimal::from(y))),
        (Operand::Int(x), Operand::Decimal(y)) => Some(Decimal::from(x).cmp(&y)),
        (Operand::Decimal(x), Operand::Float(y)) => x.to_f64()?.partial_cmp(&y),
        (Operand::Float(x), Operand::Decimal(y)) => x.partial_cmp(&y.to_f64()?),
        (Operand::Int(x), Operand::Float(y)) => (x as f64).partial_cmp(&y),
        (Operand::Float(x), Operand::Int(y)) => x.partial_cmp(&(y as f64)),
        (Operand::Float(x), Operand::Float(y)) => x.partial_cmp(&y),
        _ => None,
    }
}

/// ordering between two operands of compatible types
fn compare(a: Operand<'_>, b: Operand<'_>) -> Option<Ordering> {
    match (a, b) {
        (Operand::Str(x), Operand::Str(y)) => Some(x.cmp(y)),
        (Operand::Bool(x), Operand::Bool(y)) => Some(x.cmp(&y)),
        (Operand::Timestamp(x), Operand::Timestamp(y)) => Some(x.cmp(&y)),
        _ => numeric_cmp(a, b),
    }
}

fn loose_eq(a: Operand<'_>, b: Operand<'_>) -> bool {
    match (a, b) {
        (Operand::Null, Operand::Null) => true,
        (Operand::Array(x), Operand::Array(y)) => x == y,
        (Operand::Object(x), Operand::Object(y)) => x == y,
        _ => compare(a, b) == Some(Ordering::Equal),
    }
}

fn contains(collection: Operand<'_>, item: Operand<'_>) -> bool {
    match (collection, item) {
        (Operand::Array(items), _) => items
            .iter()
            .any(|v| loose_eq(Operand::from_json(v), item)),
        (Operand::Str(s), Operand::Str(sub)) => s.contains(sub),
        (Operand::Object(map), Operand::Str(key)) => map.contains_key(key),
        _ => false,
    }
}

fn compare_with(comparator: Comparator, actual: Operand<'_>, expected: Operand<'_>) -> bool {
    let ordering = || compare(actual, expected);

    match comparator {
        Comparator::Equals => loose_eq(actual, expected),
        Comparator::NotEquals => !loose_eq(actual, expected),
        Comparator::GreaterThan => ordering() == Some(Ordering::Greater),
        Comparator::GreaterThanOrEqual => {
            matches!(ordering(), Some(Ordering::Greater | Ordering::Equal))
        }
        Comparator::LessThan => ordering() == Some(Ordering::Less),
        Comparator::LessThanOrEqual => matches!(ordering(), Some(Ordering::Less | Ordering::Equal)),
        Comparator::Contains => actual.is_collection() && contains(actual, expected),
        Comparator::NotContains => {
            actual.is_collection()
                && match (actual, expected) {
                    // a string only holds strings
                    (Operand::Str(_), other) if !matches!(other, Operand::Str(_)) => false,
                    _ => !contains(actual, expected),
                }
        }
        Comparator::BeginsWith => match (actual, expected) {
            (Operand::Str(s), Operand::Str(prefix)) => s.starts_with(prefix),
            _ => false,
        },
        // pattern matching is evaluated by the search service only
        Comparator::Like | Comparator::NotLike => false,
        Comparator::IsNull | Comparator::IsNotNull | Comparator::Exists | Comparator::NotExists => {
            false
        }
    }
}

// ============================================================================
// Matching
// ============================================================================

impl Condition {
    /// evaluate this condition against a target record
    ///
    /// the field's resource qualifier is stripped before resolving it. a
    /// stored JSON `null` counts as absent.
    pub fn matches(&self, target: &JsonValue) -> bool {
        let path = DotPath::parse(self.target().path);
        let resolved = path.get(target).filter(|v| !v.is_null());

        match self.comparator {
            Comparator::NotExists | Comparator::IsNull => return resolved.is_none(),
            Comparator::Exists | Comparator::IsNotNull => return resolved.is_some(),
            _ => {}
        }

        let Some(resolved) = resolved else {
            return false;
        };
        let Some(actual) = coerce(Operand::from_json(resolved), &self.value) else {
            return false;
        };

        let result = compare_with(self.comparator, actual, Operand::from_literal(&self.value));
        debug!(condition = %self, result, "evaluated condition");
        result
    }
}

impl ConditionGroup {
    /// evaluate this group against a target record
    pub fn matches(&self, target: &JsonValue) -> bool {
        self.matches_with(|c| c.matches(target))
    }

    /// combine the results of `evaluate` over the children with this
    /// group's operator
    ///
    /// lets callers substitute their own leaf evaluation while keeping the
    /// group semantics.
    pub fn matches_with<F>(&self, mut evaluate: F) -> bool
    where
        F: FnMut(&ConditionType) -> bool,
    {
        let mut results = self.conditions().iter().map(&mut evaluate);
        match self.operator() {
            ConditionOperator::And => results.all(|r| r),
            ConditionOperator::Or => results.any(|r| r),
            ConditionOperator::Not => !results.any(|r| r),
        }
    }
}

impl ConditionType {
    pub fn matches(&self, target: &JsonValue) -> bool {
        match self {
            ConditionType::Condition(c) => c.matches(target),
            ConditionType::Group(g) => g.matches(target),
        }
    }
}

// ============================================================================
// Ordering for sorting
// ============================================================================

fn type_rank(json: &JsonValue) -> u8 {
    match json {
        JsonValue::Bool(_) => 0,
        JsonValue::Number(_) => 1,
        JsonValue::String(_) => 2,
        JsonValue::Array(_) => 3,
        JsonValue::Object(_) => 4,
        JsonValue::Null => 5,
    }
}

/// total order over JSON values used to sort query results
///
/// values of different types order by a fixed type rank (booleans, numbers,
/// strings, arrays, objects, null). arrays order by length, objects are
/// all equal.
pub fn compare_json(a: &JsonValue, b: &JsonValue) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }

    match (a, b) {
        (JsonValue::Array(x), JsonValue::Array(y)) => x.len().cmp(&y.len()),
        (JsonValue::Object(_), JsonValue::Object(_)) => Ordering::Equal,
        _ => compare(Operand::from_json(a), Operand::from_json(b)).unwrap_or(Ordering::Equal),
    }
}
