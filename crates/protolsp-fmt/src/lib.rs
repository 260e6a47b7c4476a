//! Canonical formatting for Protobuf ASTs.
//!
//! The printer rewrites a whole file in one fixed style: two-space
//! indents, one declaration per line, blank lines between top-level
//! declarations. Leading comments captured by the parser are kept.

mod printer;

pub use printer::{format_file, write_file};
