//! Metadata information regarding entities, their fields, and how they relate to each other.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::database::ColumnInfo;

/// Mapping from an entity type name to its information.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct EntitiesInfo(pub BTreeMap<String, EntityMetadata>);

impl EntitiesInfo {
    pub fn empty() -> Self {
        EntitiesInfo(BTreeMap::new())
    }
}

/// How an entity participates in an inheritance hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum InheritanceType {
    /// Class-table inheritance: each type has its own table sharing the primary key.
    Cti,
    /// Single-table inheritance: every type lives in one table, told apart by a discriminator.
    Sti,
}

/// Information about an entity type and the table backing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EntityMetadata {
    /// The entity type name, also used as its runtime type tag.
    pub name: String,
    /// The prefix of this entity's tagged ids, i.e. `a` in `a:1`.
    pub tag_name: String,
    pub table_name: String,
    pub fields: BTreeMap<String, Field>,
    /// Ancestor types, closest first.
    #[serde(default)]
    pub base_types: Vec<String>,
    /// Descendant types, in declaration order.
    #[serde(default)]
    pub sub_types: Vec<String>,
    #[serde(default)]
    pub inheritance: Option<InheritanceType>,
    /// On a single-table base, the enum field holding the discriminator.
    #[serde(default)]
    pub sti_discriminator_field: Option<String>,
    /// On a single-table subtype, the discriminator id identifying rows of this type.
    #[serde(default)]
    pub sti_discriminator_value: Option<i64>,
}

impl EntityMetadata {
    /// Whether queries against this entity need joins to its base or sub tables.
    pub fn needs_class_per_table_joins(&self) -> bool {
        self.inheritance == Some(InheritanceType::Cti)
            && (!self.base_types.is_empty() || !self.sub_types.is_empty())
    }

    /// The column backing the primary key, if the entity declares one.
    pub fn primary_key(&self) -> Option<&ColumnInfo> {
        self.fields.values().find_map(|field| match &field.kind {
            FieldKind::PrimaryKey { column } => Some(column),
            _ => None,
        })
    }
}

/// A field of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Field {
    #[serde(flatten)]
    pub kind: FieldKind,
    /// Suffix added to the entity's alias when the field lives on a base table, i.e. `_b0`.
    #[serde(default)]
    pub alias_suffix: String,
}

/// The different kinds of entity fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FieldKind {
    PrimaryKey {
        column: ColumnInfo,
    },
    Primitive {
        column: ColumnInfo,
    },
    Enum {
        column: ColumnInfo,
    },
    /// A foreign key from this entity's table to another entity.
    ManyToOne {
        column: ColumnInfo,
        other_entity: String,
    },
    /// The inverse side of another entity's many-to-one.
    OneToMany {
        other_entity: String,
        other_field_name: String,
    },
    /// The inverse side of another entity's unique many-to-one.
    OneToOne {
        other_entity: String,
        other_field_name: String,
    },
    ManyToMany {
        other_entity: String,
        join_table: String,
        column_name: String,
        other_column_name: String,
    },
    /// A reference to one of several entity types, one nullable column per type.
    Polymorphic {
        components: Vec<PolymorphicComponent>,
    },
}

impl FieldKind {
    /// A short name for error messages.
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::PrimaryKey { .. } => "primaryKey",
            FieldKind::Primitive { .. } => "primitive",
            FieldKind::Enum { .. } => "enum",
            FieldKind::ManyToOne { .. } => "manyToOne",
            FieldKind::OneToMany { .. } => "oneToMany",
            FieldKind::OneToOne { .. } => "oneToOne",
            FieldKind::ManyToMany { .. } => "manyToMany",
            FieldKind::Polymorphic { .. } => "polymorphic",
        }
    }

    /// The entity this field points at, if it is a relation to a single entity type.
    pub fn other_entity(&self) -> Option<&str> {
        match self {
            FieldKind::ManyToOne { other_entity, .. }
            | FieldKind::OneToMany { other_entity, .. }
            | FieldKind::OneToOne { other_entity, .. }
            | FieldKind::ManyToMany { other_entity, .. } => Some(other_entity),
            FieldKind::PrimaryKey { .. }
            | FieldKind::Primitive { .. }
            | FieldKind::Enum { .. }
            | FieldKind::Polymorphic { .. } => None,
        }
    }
}

/// One of the possible targets of a polymorphic field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PolymorphicComponent {
    pub other_entity: String,
    pub column: ColumnInfo,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::database::{ColumnSerde, ScalarType};

    #[test]
    fn parses_fields_by_kind() {
        let field: Field = serde_json::from_value(serde_json::json!({
            "kind": "manyToOne",
            "other_entity": "Author",
            "column": {
                "column_name": "author_id",
                "type": "integer",
                "serde": { "kind": "key", "tag_name": "a" }
            }
        }))
        .unwrap();

        similar_asserts::assert_eq!(
            field,
            Field {
                kind: FieldKind::ManyToOne {
                    column: ColumnInfo {
                        column_name: "author_id".to_string(),
                        r#type: ScalarType::Integer,
                        is_array: false,
                        serde: ColumnSerde::Key {
                            tag_name: "a".to_string()
                        },
                    },
                    other_entity: "Author".to_string(),
                },
                alias_suffix: String::new(),
            }
        );
    }

    #[test]
    fn only_cti_entities_with_relatives_need_joins() {
        let mut entity = EntityMetadata {
            name: "Publisher".to_string(),
            tag_name: "p".to_string(),
            table_name: "publishers".to_string(),
            fields: BTreeMap::new(),
            base_types: vec![],
            sub_types: vec!["SmallPublisher".to_string()],
            inheritance: Some(InheritanceType::Cti),
            sti_discriminator_field: None,
            sti_discriminator_value: None,
        };
        assert!(entity.needs_class_per_table_joins());

        entity.inheritance = Some(InheritanceType::Sti);
        assert!(!entity.needs_class_per_table_joins());

        entity.inheritance = Some(InheritanceType::Cti);
        entity.sub_types.clear();
        assert!(!entity.needs_class_per_table_joins());
    }
}
