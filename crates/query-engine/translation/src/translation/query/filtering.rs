//! Translate a nested entity filter into tables, joins and conditions.

use indexmap::IndexMap;
use query_engine_metadata::metadata;
use query_engine_sql::sql;

use super::entity_filter::{parse_entity_filter, EntityFilter};
use super::inheritance;
use super::values::{map_to_db, parse_value_filter, UNPERSISTED_ID};
use crate::translation::error::Error;
use crate::translation::helpers::{lookup_field, primary_key_column, Env, State};
use crate::translation::models::{EntityRef, Filter, AS_KEY};

/// Add an entity's table to the query, then translate the filter on it.
///
/// Non-primary tables that the filter does not need are skipped.
pub fn add_table(
    env: &Env,
    state: &mut State,
    entity: &metadata::EntityMetadata,
    alias: sql::ast::TableAlias,
    join: sql::ast::Join,
    filter: &Filter,
) -> Result<(), Error> {
    let entity_filter = parse_entity_filter(filter)?;
    let is_primary = join == sql::ast::Join::Primary;
    if entity_filter == EntityFilter::Absent && !is_primary {
        return Ok(());
    }

    state.push_table(
        sql::ast::Table {
            alias: alias.clone(),
            name: sql::ast::TableName(entity.table_name.clone()),
            join,
        },
        entity,
    );

    if entity.needs_class_per_table_joins() {
        inheritance::add_class_per_table_joins(env, state, entity, &alias, is_primary)?;
    }

    // The caller's alias placeholders don't necessarily line up with the aliases we allocate,
    // so record which canonical alias each one ended up with.
    match filter {
        Filter::Alias(placeholder) => state.bind_alias(placeholder, &alias),
        Filter::Object(map) => {
            if let Some(Filter::Alias(placeholder)) = map.get(AS_KEY) {
                state.bind_alias(placeholder, &alias);
            }
        }
        _ => {}
    }

    match entity_filter {
        EntityFilter::Join(fields) => add_field_filters(env, state, entity, &alias, fields),
        EntityFilter::Match(value_filters) => {
            let id = primary_key_column(entity)?;
            for value_filter in value_filters {
                let condition = map_to_db("id", id, value_filter)?;
                state.add_condition(alias.clone(), &id.column_name, condition);
            }
            Ok(())
        }
        EntityFilter::Absent | EntityFilter::Alias(_) => Ok(()),
    }
}

fn add_field_filters(
    env: &Env,
    state: &mut State,
    entity: &metadata::EntityMetadata,
    alias: &sql::ast::TableAlias,
    fields: &IndexMap<String, Filter>,
) -> Result<(), Error> {
    for (field_name, filter) in fields {
        // Skip the alias binding
        if field_name == AS_KEY {
            continue;
        }
        let field = lookup_field(entity, field_name)?;
        // Inherited fields live on the base table's join
        let field_alias =
            sql::helpers::make_table_alias(format!("{alias}{}", field.alias_suffix));

        match &field.kind {
            metadata::FieldKind::PrimaryKey { column }
            | metadata::FieldKind::Primitive { column }
            | metadata::FieldKind::Enum { column } => {
                for value_filter in parse_value_filter(filter)? {
                    let condition = map_to_db(field_name, column, value_filter)?;
                    state.add_condition(field_alias.clone(), &column.column_name, condition);
                }
            }

            metadata::FieldKind::ManyToOne {
                column,
                other_entity,
            } => match parse_entity_filter(filter)? {
                EntityFilter::Absent => {}
                // Only join when the other side is filtered on, or an alias needs binding
                EntityFilter::Alias(_) | EntityFilter::Join(_) => {
                    let other = env.lookup_entity(other_entity)?;
                    let other_alias = state.make_table_alias(&other.table_name);
                    let on = sql::ast::JoinCondition {
                        left: sql::helpers::make_column(field_alias, &column.column_name),
                        right: sql::helpers::make_column(
                            other_alias.clone(),
                            &primary_key_column(other)?.column_name,
                        ),
                    };
                    add_table(
                        env,
                        state,
                        other,
                        other_alias,
                        sql::ast::Join::Inner { on },
                        filter,
                    )?;
                }
                // A match on the id can use our foreign key column instead
                EntityFilter::Match(value_filters) => {
                    for value_filter in value_filters {
                        let condition = map_to_db(field_name, column, value_filter)?;
                        state.add_condition(field_alias.clone(), &column.column_name, condition);
                    }
                }
            },

            // There is no column on our side to probe, so these are always joined.
            metadata::FieldKind::OneToMany {
                other_entity,
                other_field_name,
            }
            | metadata::FieldKind::OneToOne {
                other_entity,
                other_field_name,
            } => {
                let other = env.lookup_entity(other_entity)?;
                let other_column = inverse_column(entity, other, other_field_name)?;
                let other_alias = state.make_table_alias(&other.table_name);
                let on = sql::ast::JoinCondition {
                    left: sql::helpers::make_column(
                        alias.clone(),
                        &primary_key_column(entity)?.column_name,
                    ),
                    right: sql::helpers::make_column(other_alias.clone(), other_column),
                };
                // Nothing makes the inverse column unique, so one-to-one is treated like one-to-many
                add_table(
                    env,
                    state,
                    other,
                    other_alias,
                    sql::ast::Join::Outer { on, distinct: true },
                    filter,
                )?;
            }

            metadata::FieldKind::Polymorphic { components } => {
                let filter = tag_unpersisted_entities(env, filter)?;
                match parse_entity_filter(&filter)? {
                    EntityFilter::Absent => {}
                    EntityFilter::Alias(_) | EntityFilter::Join(_) => {
                        return Err(Error::JoinThroughPolymorphic(field_name.clone()));
                    }
                    EntityFilter::Match(value_filters) => {
                        for value_filter in value_filters {
                            add_polymorphic_condition(
                                env,
                                state,
                                &field_alias,
                                field_name,
                                components,
                                value_filter,
                            )?;
                        }
                    }
                }
            }

            metadata::FieldKind::ManyToMany { .. } => {
                return Err(Error::UnsupportedField {
                    field: field_name.clone(),
                    entity: entity.name.clone(),
                    kind: field.kind.name().to_string(),
                });
            }
        }
    }
    Ok(())
}

/// The column on the other side of a one-to-many or one-to-one field that points back at us.
fn inverse_column<'a>(
    entity: &metadata::EntityMetadata,
    other: &'a metadata::EntityMetadata,
    other_field_name: &str,
) -> Result<&'a str, Error> {
    let other_field = lookup_field(other, other_field_name)?;
    match &other_field.kind {
        metadata::FieldKind::ManyToOne { column, .. } => Ok(&column.column_name),
        metadata::FieldKind::Polymorphic { components } => components
            .iter()
            .find(|component| {
                component.other_entity == entity.name
                    || entity.base_types.contains(&component.other_entity)
            })
            .map(|component| component.column.column_name.as_str())
            .ok_or_else(|| Error::PolymorphicComponentNotFound {
                field: other_field_name.to_string(),
                value: entity.name.clone(),
            }),
        kind => Err(Error::UnsupportedField {
            field: other_field_name.to_string(),
            entity: other.name.clone(),
            kind: kind.name().to_string(),
        }),
    }
}

/// Entities that were never persisted have no id to tell the component from, so give their
/// sentinel id the tag of the entity they reference, i.e. `b:-1`.
fn tag_unpersisted_entities(env: &Env, filter: &Filter) -> Result<Filter, Error> {
    Ok(match filter {
        Filter::Entity(EntityRef { entity, id: None }) => {
            let tag_name = &env.lookup_entity(entity)?.tag_name;
            Filter::Value(serde_json::Value::String(format!(
                "{tag_name}:{UNPERSISTED_ID}"
            )))
        }
        Filter::List(items) => Filter::List(
            items
                .iter()
                .map(|item| tag_unpersisted_entities(env, item))
                .collect::<Result<_, _>>()?,
        ),
        Filter::Object(map) => {
            let mut tagged = IndexMap::with_capacity(map.len());
            for (key, value) in map {
                tagged.insert(key.clone(), tag_unpersisted_entities(env, value)?);
            }
            Filter::Object(tagged)
        }
        filter => filter.clone(),
    })
}

/// Conditions on the columns of a polymorphic field. Only equality, inequality, `in` and
/// `is-null` are supported.
fn add_polymorphic_condition(
    env: &Env,
    state: &mut State,
    alias: &sql::ast::TableAlias,
    field_name: &str,
    components: &[metadata::PolymorphicComponent],
    value_filter: sql::ast::ValueFilter<serde_json::Value>,
) -> Result<(), Error> {
    match value_filter {
        sql::ast::ValueFilter::Eq(ref id) | sql::ast::ValueFilter::Ne(ref id) => {
            let component = find_component(env, field_name, components, id)?;
            let condition = map_to_db(field_name, &component.column, value_filter.clone())?;
            state.add_condition(alias.clone(), &component.column.column_name, condition);
        }
        // Every component column must be null, the checks are ANDed
        sql::ast::ValueFilter::IsNull => {
            for component in components {
                state.add_condition(
                    alias.clone(),
                    &component.column.column_name,
                    sql::ast::ValueFilter::IsNull,
                );
            }
        }
        sql::ast::ValueFilter::In(ids) => {
            // Split up the ids by component, in order of first appearance
            let mut ids_by_component: IndexMap<usize, Vec<serde_json::Value>> = IndexMap::new();
            for id in ids {
                let index = component_index(env, field_name, components, &id)?;
                ids_by_component.entry(index).or_default().push(id);
            }
            // An empty list still needs a condition that matches nothing
            if ids_by_component.is_empty() {
                if components.is_empty() {
                    return Err(Error::PolymorphicComponentNotFound {
                        field: field_name.to_string(),
                        value: "[]".to_string(),
                    });
                }
                ids_by_component.insert(0, vec![]);
            }
            // Or together `parent_book_id = ANY(?) OR parent_author_id = ANY(?)`
            let conditions = ids_by_component
                .into_iter()
                .map(|(index, ids)| {
                    let column = &components[index].column;
                    let condition =
                        map_to_db(field_name, column, sql::ast::ValueFilter::In(ids))?;
                    Ok(sql::helpers::column_condition(
                        alias.clone(),
                        &column.column_name,
                        condition,
                    ))
                })
                .collect::<Result<Vec<_>, Error>>()?;
            state
                .complex_conditions
                .push(sql::helpers::or_expression(conditions));
        }
        other => {
            return Err(Error::UnsupportedOperator {
                field: field_name.to_string(),
                operator: other.name().to_string(),
            })
        }
    }
    Ok(())
}

fn find_component<'a>(
    env: &Env,
    field_name: &str,
    components: &'a [metadata::PolymorphicComponent],
    id: &serde_json::Value,
) -> Result<&'a metadata::PolymorphicComponent, Error> {
    let index = component_index(env, field_name, components, id)?;
    Ok(&components[index])
}

/// The component whose entity the tag of a tagged id like `b:1` names.
fn component_index(
    env: &Env,
    field_name: &str,
    components: &[metadata::PolymorphicComponent],
    id: &serde_json::Value,
) -> Result<usize, Error> {
    let not_found = || Error::PolymorphicComponentNotFound {
        field: field_name.to_string(),
        value: id.to_string(),
    };
    let tag = id
        .as_str()
        .and_then(|id| id.split_once(':'))
        .map(|(tag, _)| tag)
        .ok_or_else(not_found)?;
    for (index, component) in components.iter().enumerate() {
        if env.lookup_entity(&component.other_entity)?.tag_name == tag {
            return Ok(index);
        }
    }
    Err(not_found())
}
