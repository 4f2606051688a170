//! Errors for find query translation.

use query_engine_metadata::metadata::database::ScalarType;
use query_engine_sql::sql;

/// A type for translation errors.
///
/// Everything but `Internal` is caused by the request or the metadata it is compiled against.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    // Unresolved metadata references
    #[error("entity '{0}' not found")]
    EntityNotFound(String),
    #[error("field '{field}' not found on entity '{entity}'")]
    FieldNotFound { field: String, entity: String },
    #[error("no component of polymorphic field '{field}' matches id {value}")]
    PolymorphicComponentNotFound { field: String, value: String },
    #[error("alias '{0}' is not bound to any table")]
    UnboundAlias(String),
    #[error("invalid id {value}, expected an id tagged '{expected_tag}'")]
    InvalidId { value: String, expected_tag: String },
    #[error("unknown code {value} for enum column '{column}'")]
    UnknownEnumCode { value: String, column: String },
    #[error("value {value} does not match column type {scalar_type}")]
    TypeMismatch {
        value: serde_json::Value,
        scalar_type: ScalarType,
    },

    // Unresolved inheritance lookups
    #[error("entity '{sub_type}' is not a single-table subtype of '{base}'")]
    SubTypeNotFound { base: String, sub_type: String },

    // Unsupported filter shapes
    #[error("field '{field}' of entity '{entity}' is a {kind} field, which is not supported here")]
    UnsupportedField {
        field: String,
        entity: String,
        kind: String,
    },
    #[error("operator '{operator}' is not supported on field '{field}'")]
    UnsupportedOperator { field: String, operator: String },
    #[error("joining through polymorphic field '{0}' is not supported")]
    JoinThroughPolymorphic(String),
    #[error("malformed filter: {0}")]
    MalformedFilter(String),
    #[error("invalid expression: {0}")]
    InvalidExpression(String),

    #[error("internal error: {0}")]
    Internal(#[from] sql::error::InvariantViolation),
}
