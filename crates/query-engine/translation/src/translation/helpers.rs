//! Helpers for processing the find request and building the query plan.

use std::collections::{BTreeMap, BTreeSet};

use find_query_configuration::Configuration;
use query_engine_metadata::metadata;
use query_engine_sql::sql;

use super::error::Error;
use super::models;

/// Static information from the metadata, shared by every query.
#[derive(Debug, Clone, Copy)]
pub struct Env<'a> {
    pub metadata: &'a metadata::Metadata,
    pub inheritance: &'a metadata::InheritanceCache,
}

/// Mutable state collected while translating a single request.
#[derive(Debug, Default)]
pub struct State {
    /// Next suffix per table abbreviation.
    alias_counters: BTreeMap<String, u32>,
    allocated_aliases: BTreeSet<sql::ast::TableAlias>,
    /// Which entity each table alias stands for.
    alias_entities: BTreeMap<sql::ast::TableAlias, String>,
    pub selects: Vec<sql::ast::SelectItem>,
    pub tables: Vec<sql::ast::Table>,
    /// Simple conditions, ANDed together.
    pub conditions: Vec<sql::ast::Condition>,
    /// Boolean trees, ANDed with the simple conditions.
    pub complex_conditions: Vec<sql::ast::BooleanExpression>,
    pub order_bys: Vec<sql::ast::OrderByElement>,
    pub bound_aliases: BTreeMap<String, sql::ast::TableAlias>,
}

impl<'a> Env<'a> {
    pub fn new(
        metadata: &'a metadata::Metadata,
        inheritance: &'a metadata::InheritanceCache,
    ) -> Self {
        Env {
            metadata,
            inheritance,
        }
    }

    pub fn from_configuration(configuration: &'a Configuration) -> Self {
        Env::new(&configuration.metadata, &configuration.inheritance)
    }

    /// Lookup an entity's information in the metadata.
    pub fn lookup_entity(&self, entity_name: &str) -> Result<&'a metadata::EntityMetadata, Error> {
        self.metadata
            .entities
            .0
            .get(entity_name)
            .ok_or_else(|| Error::EntityNotFound(entity_name.to_string()))
    }
}

/// Lookup a field of an entity, including fields inherited from its base types.
pub fn lookup_field<'a>(
    entity: &'a metadata::EntityMetadata,
    field_name: &str,
) -> Result<&'a metadata::Field, Error> {
    entity
        .fields
        .get(field_name)
        .ok_or_else(|| Error::FieldNotFound {
            field: field_name.to_string(),
            entity: entity.name.clone(),
        })
}

/// The primary key column of an entity.
pub fn primary_key_column(
    entity: &metadata::EntityMetadata,
) -> Result<&metadata::ColumnInfo, Error> {
    entity.primary_key().ok_or_else(|| Error::FieldNotFound {
        field: "id".to_string(),
        entity: entity.name.clone(),
    })
}

/// The first letter of every underscore-separated word, i.e. `bp` for `book_publishers`.
pub fn abbreviation(table_name: &str) -> String {
    table_name
        .split('_')
        .filter_map(|word| word.chars().next())
        .collect()
}

impl State {
    /// Build a new state.
    pub fn new() -> State {
        State::default()
    }

    /// Allocate an alias for a new occurrence of a table: its abbreviation the first time, then
    /// the abbreviation followed by `1`, `2`, and so on.
    pub fn make_table_alias(&mut self, table_name: &str) -> sql::ast::TableAlias {
        let abbreviation = abbreviation(table_name);
        let counter = self.alias_counters.entry(abbreviation.clone()).or_insert(0);
        loop {
            let candidate = if *counter == 0 {
                abbreviation.clone()
            } else {
                format!("{abbreviation}{counter}")
            };
            *counter += 1;
            let alias = sql::helpers::make_table_alias(candidate);
            if self.allocated_aliases.insert(alias.clone()) {
                return alias;
            }
        }
    }

    /// Reserve an alias that was derived from another one, i.e. `a_b0` for the base table of `a`.
    pub fn reserve_table_alias(&mut self, alias: &sql::ast::TableAlias) {
        self.allocated_aliases.insert(alias.clone());
    }

    /// Add a table to the plan, remembering which entity it holds.
    pub fn push_table(&mut self, table: sql::ast::Table, entity: &metadata::EntityMetadata) {
        self.alias_entities
            .insert(table.alias.clone(), entity.name.clone());
        self.tables.push(table);
    }

    /// The entity held by an aliased table.
    pub fn alias_entity(&self, alias: &sql::ast::TableAlias) -> Option<&str> {
        self.alias_entities.get(alias).map(String::as_str)
    }

    /// Record the canonical alias of a caller's alias placeholder.
    pub fn bind_alias(&mut self, alias: &models::Alias, table_alias: &sql::ast::TableAlias) {
        self.bound_aliases
            .insert(alias.name.clone(), table_alias.clone());
    }

    /// Resolve a caller's alias placeholder.
    pub fn lookup_bound_alias(&self, name: &str) -> Result<&sql::ast::TableAlias, Error> {
        self.bound_aliases
            .get(name)
            .ok_or_else(|| Error::UnboundAlias(name.to_string()))
    }

    pub fn add_condition(
        &mut self,
        table: sql::ast::TableAlias,
        column: &str,
        filter: sql::ast::ValueFilter<sql::ast::Value>,
    ) {
        self.conditions
            .push(sql::helpers::column_condition(table, column, filter));
    }

    /// Assemble the plan.
    pub fn into_query(self) -> sql::ast::FindQuery {
        let mut conditions = self.conditions;
        conditions.extend(
            self.complex_conditions
                .into_iter()
                .map(sql::ast::Condition::Expression),
        );
        let condition = if conditions.is_empty() {
            None
        } else {
            Some(sql::helpers::and_expression(conditions))
        };
        sql::ast::FindQuery {
            selects: self.selects,
            tables: self.tables,
            condition,
            order_bys: self.order_bys,
            cte: None,
            lateral_joins: None,
            bound_aliases: self.bound_aliases,
        }
    }
}
