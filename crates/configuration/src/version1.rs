//! Version 1 of the configuration format: the entity metadata and compiler settings, stored in
//! a single JSON file.

use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::fs;

use query_engine_metadata::metadata;

use crate::error::{ParseConfigurationError, WriteParsedConfigurationError};

const CURRENT_VERSION: u32 = 1;
pub const CONFIGURATION_FILENAME: &str = "configuration.json";
const CONFIGURATION_JSONSCHEMA_FILENAME: &str = "schema.json";

/// The configuration as it is stored on disk.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct ParsedConfiguration {
    // Which version of the configuration format are we using
    pub version: u32,
    #[serde(default)]
    pub metadata: metadata::Metadata,
    #[serde(default)]
    #[serde(skip_serializing_if = "CompilerSettings::is_default")]
    pub settings: CompilerSettings,
}

impl ParsedConfiguration {
    pub fn empty() -> Self {
        Self {
            version: CURRENT_VERSION,
            metadata: metadata::Metadata::default(),
            settings: CompilerSettings::default(),
        }
    }
}

/// Defaults applied to every compiled find query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct CompilerSettings {
    /// Drop joins that no select, condition or ordering refers to.
    #[serde(default = "default_true")]
    pub prune_joins: bool,
    /// Finish every query by ordering on the primary key, for stable pagination.
    #[serde(default = "default_true")]
    pub default_order_by: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CompilerSettings {
    fn default() -> Self {
        CompilerSettings {
            prune_joins: true,
            default_order_by: true,
        }
    }
}

impl CompilerSettings {
    fn is_default(&self) -> bool {
        *self == CompilerSettings::default()
    }
}

/// Parse the configuration format from a directory.
pub async fn parse_configuration(
    configuration_dir: impl AsRef<Path>,
) -> Result<ParsedConfiguration, ParseConfigurationError> {
    let configuration_file = configuration_dir.as_ref().join(CONFIGURATION_FILENAME);

    let configuration_file_contents =
        fs::read_to_string(&configuration_file)
            .await
            .map_err(|err| {
                ParseConfigurationError::IoErrorButStringified(format!(
                    "{}: {}",
                    &configuration_file.display(),
                    err
                ))
            })?;

    let parsed_config: ParsedConfiguration = serde_json::from_str(&configuration_file_contents)
        .map_err(|error| ParseConfigurationError::ParseError {
            file_path: configuration_file.clone(),
            line: error.line(),
            column: error.column(),
            message: error.to_string(),
        })?;

    if parsed_config.version != CURRENT_VERSION {
        return Err(ParseConfigurationError::UnsupportedVersion(
            parsed_config.version,
        ));
    }

    tracing::debug!(
        file = %configuration_file.display(),
        entities = parsed_config.metadata.entities.0.len(),
        "parsed configuration"
    );
    Ok(parsed_config)
}

/// Write the parsed configuration, and its JSON schema, into a directory on disk.
pub async fn write_parsed_configuration(
    parsed_config: ParsedConfiguration,
    out_dir: impl AsRef<Path>,
) -> Result<(), WriteParsedConfigurationError> {
    let configuration_file = out_dir.as_ref().to_owned().join(CONFIGURATION_FILENAME);
    fs::create_dir_all(out_dir.as_ref()).await?;

    // create the configuration file
    fs::write(
        configuration_file,
        serde_json::to_string_pretty(&parsed_config)
            .map_err(|e| WriteParsedConfigurationError::IoError(e.into()))?
            + "\n",
    )
    .await?;

    // create the jsonschema file
    let configuration_jsonschema_file_path = out_dir
        .as_ref()
        .to_owned()
        .join(CONFIGURATION_JSONSCHEMA_FILENAME);

    fs::write(
        &configuration_jsonschema_file_path,
        serde_json::to_string_pretty(&generate_schema())
            .map_err(|e| WriteParsedConfigurationError::IoError(e.into()))?
            + "\n",
    )
    .await?;

    Ok(())
}

/// The JSON schema of the configuration file.
pub fn generate_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(ParsedConfiguration)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "version": 1,
        "metadata": {
            "entities": {
                "Author": {
                    "name": "Author",
                    "tag_name": "a",
                    "table_name": "authors",
                    "fields": {
                        "id": {
                            "kind": "primaryKey",
                            "column": {
                                "column_name": "id",
                                "type": "integer",
                                "serde": { "kind": "key", "tag_name": "a" }
                            }
                        },
                        "firstName": {
                            "kind": "primitive",
                            "column": { "column_name": "first_name", "type": "character varying" }
                        }
                    }
                }
            }
        }
    }"#;

    #[test]
    fn settings_default_to_pruning_and_ordering() {
        let parsed: ParsedConfiguration = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(parsed.settings, CompilerSettings::default());
        assert!(parsed.settings.prune_joins);
        assert!(parsed.settings.default_order_by);
    }

    #[test]
    fn sample_is_valid_against_schema() {
        let schema = serde_json::to_value(generate_schema()).unwrap();
        let compiled = jsonschema::JSONSchema::compile(&schema).unwrap();
        let instance: serde_json::Value = serde_json::from_str(SAMPLE).unwrap();
        assert!(compiled.is_valid(&instance));
    }

    #[tokio::test]
    async fn written_configuration_parses_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut parsed: ParsedConfiguration = serde_json::from_str(SAMPLE).unwrap();
        parsed.settings.prune_joins = false;

        write_parsed_configuration(parsed.clone(), dir.path())
            .await
            .unwrap();

        assert!(dir.path().join(CONFIGURATION_JSONSCHEMA_FILENAME).exists());
        let reparsed = parse_configuration(dir.path()).await.unwrap();
        assert_eq!(reparsed, parsed);
    }

    #[tokio::test]
    async fn rejects_unknown_versions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIGURATION_FILENAME),
            r#"{ "version": 2 }"#,
        )
        .unwrap();

        let error = parse_configuration(dir.path()).await.unwrap_err();
        assert!(matches!(
            error,
            ParseConfigurationError::UnsupportedVersion(2)
        ));
    }

    #[tokio::test]
    async fn reports_parse_error_location() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIGURATION_FILENAME),
            "{\n  \"version\": 1,\n  \"metadata\": 3\n}",
        )
        .unwrap();

        match parse_configuration(dir.path()).await {
            Err(ParseConfigurationError::ParseError { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected a parse error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let error = parse_configuration(dir.path().join("nope")).await.unwrap_err();
        assert!(matches!(
            error,
            ParseConfigurationError::IoErrorButStringified(_)
        ));
    }
}
