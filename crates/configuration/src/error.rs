//! Errors that can be thrown when processing configuration.

use std::path::PathBuf;

/// The errors that can be thrown when reading a configuration directory.
#[derive(Debug, thiserror::Error)]
pub enum ParseConfigurationError {
    #[error("parse error on {file_path}:{line}:{column}: {message}")]
    ParseError {
        file_path: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("unsupported configuration version {0}")]
    UnsupportedVersion(u32),

    #[error("I/O error: {0}")]
    IoErrorButStringified(String),
}

/// The errors that can be thrown when writing a configuration directory.
#[derive(Debug, thiserror::Error)]
pub enum WriteParsedConfigurationError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// The errors that can be thrown when elaborating a parsed configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MakeRuntimeConfigurationError {
    #[error("entity '{entity}' refers to unknown entity '{other_entity}'")]
    UnknownEntity { entity: String, other_entity: String },

    #[error("field '{field}' of entity '{entity}' refers to unknown field '{other_field}' of entity '{other_entity}'")]
    UnknownField {
        entity: String,
        field: String,
        other_entity: String,
        other_field: String,
    },

    #[error("entity '{0}' has no primary key")]
    MissingPrimaryKey(String),

    #[error("single-table entity '{entity}' names discriminator field '{field}', which is not an enum field")]
    InvalidDiscriminator { entity: String, field: String },
}
