//! Joins and conditions for entities that take part in an inheritance hierarchy.

use query_engine_metadata::metadata;
use query_engine_sql::sql;

use crate::translation::error::Error;
use crate::translation::helpers::{lookup_field, primary_key_column, Env, State};

/// Join in the tables of a class-table entity's ancestors and, for the primary table, its
/// descendants, and select the columns needed to tell which type each row is.
///
/// Ancestors are always joined, in case a filter uses one of their fields. Descendants are only
/// useful when loading rows, i.e. for the primary table.
pub fn add_class_per_table_joins(
    env: &Env,
    state: &mut State,
    entity: &metadata::EntityMetadata,
    alias: &sql::ast::TableAlias,
    is_primary: bool,
) -> Result<(), Error> {
    let id = &primary_key_column(entity)?.column_name;

    for (index, base_type) in entity.base_types.iter().enumerate() {
        let base = env.lookup_entity(base_type)?;
        let base_alias = sql::helpers::make_table_alias(format!("{alias}_b{index}"));
        if is_primary {
            state
                .selects
                .push(sql::ast::SelectItem::Star(base_alias.clone()));
        }
        join_on_id(state, base, alias, base_alias, id);
    }

    if !is_primary {
        return Ok(());
    }

    let mut cases = vec![];
    for (index, sub_type) in entity.sub_types.iter().enumerate() {
        let sub = env.lookup_entity(sub_type)?;
        let sub_alias = sql::helpers::make_table_alias(format!("{alias}_s{index}"));
        state
            .selects
            .push(sql::ast::SelectItem::Star(sub_alias.clone()));
        cases.push(sql::ast::ClassTagCase {
            column: sql::helpers::make_column(sub_alias.clone(), id),
            type_name: sub.name.clone(),
        });
        join_on_id(state, sub, alias, sub_alias, id);
    }

    // Nominate a specific `id` column to avoid ambiguity
    state
        .selects
        .push(sql::ast::SelectItem::PrimaryKey(sql::helpers::make_column(
            alias.clone(),
            id,
        )));

    // Leaf types don't need a __class
    if !cases.is_empty() {
        state
            .selects
            .push(sql::ast::SelectItem::ClassTag(sql::ast::ClassTag {
                cases,
                default: entity.name.clone(),
            }));
    }
    Ok(())
}

fn join_on_id(
    state: &mut State,
    entity: &metadata::EntityMetadata,
    alias: &sql::ast::TableAlias,
    other_alias: sql::ast::TableAlias,
    id: &str,
) {
    state.reserve_table_alias(&other_alias);
    let on = sql::ast::JoinCondition {
        left: sql::helpers::make_column(alias.clone(), id),
        right: sql::helpers::make_column(other_alias.clone(), id),
    };
    state.push_table(
        sql::helpers::outer_join(other_alias, &entity.table_name, on, false),
        entity,
    );
}

/// Restrict a query against a single-table subtype to the rows of that subtype.
pub fn add_sti_discriminator(
    env: &Env,
    state: &mut State,
    entity: &metadata::EntityMetadata,
    alias: &sql::ast::TableAlias,
) -> Result<(), Error> {
    let Some(discriminator_value) = entity.sti_discriminator_value else {
        return Ok(());
    };
    if entity.inheritance != Some(metadata::InheritanceType::Sti) {
        return Ok(());
    }

    let base_name = env
        .inheritance
        .sti_entities(env.metadata)
        .get(&entity.name)
        .map(|group| group.base.clone())
        .or_else(|| entity.base_types.last().cloned())
        .unwrap_or_default();
    let not_found = || Error::SubTypeNotFound {
        base: base_name.clone(),
        sub_type: entity.name.clone(),
    };

    env.inheritance
        .lookup_sub_type(env.metadata, &base_name, &entity.name)
        .ok_or_else(not_found)?;
    let base = env.lookup_entity(&base_name)?;
    let field_name = base
        .sti_discriminator_field
        .as_deref()
        .ok_or_else(not_found)?;
    let field = lookup_field(base, field_name)?;
    let metadata::FieldKind::Enum { column } = &field.kind else {
        return Err(Error::UnsupportedField {
            field: field_name.to_string(),
            entity: base.name.clone(),
            kind: field.kind.name().to_string(),
        });
    };

    tracing::trace!(
        entity = %entity.name,
        base = %base.name,
        discriminator_value,
        "restricting to single-table subtype"
    );
    state.add_condition(
        alias.clone(),
        &column.column_name,
        sql::ast::ValueFilter::Eq(sql::ast::Value::Int(discriminator_value)),
    );
    Ok(())
}
