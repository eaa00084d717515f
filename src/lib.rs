// library crate for metaquery
// the binary in main.rs is a thin wrapper around `cli::run`

pub mod changeset;
pub mod cli;
pub mod conditions;
pub mod config;
pub mod path;
pub mod query;
