//! Errors raised while converting a plan to SQL.
//!
//! The parser only produces well-formed plans, so any of these indicates a bug in whatever built
//! the plan rather than a bad filter.

use thiserror::Error;

/// A broken plan invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("the plan has no primary table")]
    MissingPrimaryTable,
    #[error("table '{0}' is marked primary but is not the first table")]
    MisplacedPrimaryTable(String),
    #[error("raw SQL fragment '{sql}' has {placeholders} placeholders but {bindings} bindings")]
    BindingMismatch {
        sql: String,
        placeholders: usize,
        bindings: usize,
    },
}
