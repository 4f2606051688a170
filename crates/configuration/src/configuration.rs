//! Configuration for the find-query compiler.

use query_engine_metadata::metadata;

use crate::error::MakeRuntimeConfigurationError;
use crate::version1::{CompilerSettings, ParsedConfiguration};

/// The 'Configuration' type collects all the information necessary to compile queries at
/// runtime.
///
/// Values of this type are produced from a 'ParsedConfiguration' using
/// 'make_runtime_configuration', which checks that every reference between entities resolves.
#[derive(Debug)]
pub struct Configuration {
    pub metadata: metadata::Metadata,
    pub settings: CompilerSettings,
    /// Inheritance groupings, computed on first use.
    pub inheritance: metadata::InheritanceCache,
}

/// Validate a parsed configuration and turn it into a runtime configuration.
pub fn make_runtime_configuration(
    parsed_config: ParsedConfiguration,
) -> Result<Configuration, MakeRuntimeConfigurationError> {
    validate_metadata(&parsed_config.metadata)?;
    Ok(Configuration {
        metadata: parsed_config.metadata,
        settings: parsed_config.settings,
        inheritance: metadata::InheritanceCache::new(),
    })
}

fn validate_metadata(metadata: &metadata::Metadata) -> Result<(), MakeRuntimeConfigurationError> {
    let entities = &metadata.entities.0;
    let lookup = |entity: &metadata::EntityMetadata, other_entity: &str| {
        entities
            .get(other_entity)
            .ok_or_else(|| MakeRuntimeConfigurationError::UnknownEntity {
                entity: entity.name.clone(),
                other_entity: other_entity.to_string(),
            })
    };

    for entity in entities.values() {
        if entity.primary_key().is_none() {
            return Err(MakeRuntimeConfigurationError::MissingPrimaryKey(
                entity.name.clone(),
            ));
        }
        for name in entity.base_types.iter().chain(&entity.sub_types) {
            lookup(entity, name)?;
        }

        for (field_name, field) in &entity.fields {
            if let Some(other_entity) = field.kind.other_entity() {
                lookup(entity, other_entity)?;
            }
            match &field.kind {
                metadata::FieldKind::OneToMany {
                    other_entity,
                    other_field_name,
                }
                | metadata::FieldKind::OneToOne {
                    other_entity,
                    other_field_name,
                } => {
                    let other = lookup(entity, other_entity)?;
                    if !other.fields.contains_key(other_field_name) {
                        return Err(MakeRuntimeConfigurationError::UnknownField {
                            entity: entity.name.clone(),
                            field: field_name.clone(),
                            other_entity: other_entity.clone(),
                            other_field: other_field_name.clone(),
                        });
                    }
                }
                metadata::FieldKind::Polymorphic { components } => {
                    for component in components {
                        lookup(entity, &component.other_entity)?;
                    }
                }
                metadata::FieldKind::PrimaryKey { .. }
                | metadata::FieldKind::Primitive { .. }
                | metadata::FieldKind::Enum { .. }
                | metadata::FieldKind::ManyToOne { .. }
                | metadata::FieldKind::ManyToMany { .. } => {}
            }
        }

        if let Some(discriminator) = &entity.sti_discriminator_field {
            let is_enum = matches!(
                entity.fields.get(discriminator).map(|field| &field.kind),
                Some(metadata::FieldKind::Enum { .. })
            );
            if !is_enum {
                return Err(MakeRuntimeConfigurationError::InvalidDiscriminator {
                    entity: entity.name.clone(),
                    field: discriminator.clone(),
                });
            }
        }
    }
    Ok(())
}
