//! condition system for matching JSON records
//!
//! provides:
//! - leaf conditions comparing a dot-path field to a literal
//! - groups combining conditions with AND, OR and NOT (none of)
//! - string coercion of target values toward the literal's type
//! - resource qualified fields (`dataset.`, `file.`, `topic.`, `msgpath.`)
//!
//! trees are read from JSON via [`parse_condition`] or serde, and rendered
//! in a compact human form via `Display`.

mod eval;
mod field;
mod parser;
mod types;
mod visitor;

pub use eval::compare_json;
pub use field::{Field, FieldTarget, Resource};
pub use parser::{parse_condition, parse_timestamp, parse_value, ParseError};
pub use types::{
    Comparator, Condition, ConditionError, ConditionGroup, ConditionOperator, ConditionType,
    ConditionValue,
};
pub use visitor::{walk_group, ConditionVisitor, ResourceScope};
