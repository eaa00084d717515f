//! exit codes for metaquery commands
//!
//! these follow Unix conventions where 0 = success and non-zero = error
//! specific codes help scripts distinguish between failure types

/// command completed successfully
pub const SUCCESS: i32 = 0;

/// general or unknown error (I/O, malformed changeset log)
pub const ERROR: i32 = 1;

/// invalid command-line arguments
pub const INVALID_ARGS: i32 = 4;

/// configuration file error
pub const CONFIG_ERROR: i32 = 5;

/// condition, query or input JSON could not be parsed
pub const PARSE_ERROR: i32 = 8;
