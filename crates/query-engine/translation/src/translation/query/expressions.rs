//! Translate a complex boolean expression over bound aliases.

use query_engine_metadata::metadata;
use query_engine_sql::sql;

use super::entity_filter::{parse_entity_filter, EntityFilter};
use super::values::{json_to_value, map_to_db, parse_value_filter};
use crate::translation::error::Error;
use crate::translation::helpers::{lookup_field, Env, State};
use crate::translation::models::{AliasCondition, ExpressionFilter, RawFilter};

/// Translate an `and`/`or` tree. Its leaves can only refer to aliases bound by the filter, no
/// tables are added.
pub fn translate_expression(
    env: &Env,
    state: &State,
    expression: &ExpressionFilter,
) -> Result<sql::ast::BooleanExpression, Error> {
    let (op, children) = match expression {
        ExpressionFilter::And(children) => (sql::ast::BooleanOperator::And, children),
        ExpressionFilter::Or(children) => (sql::ast::BooleanOperator::Or, children),
        ExpressionFilter::Column(_) | ExpressionFilter::Raw(_) => {
            return Err(Error::InvalidExpression(
                "the top level must be an 'and' or an 'or'".to_string(),
            ))
        }
    };

    let mut conditions = vec![];
    for child in children {
        match child {
            ExpressionFilter::And(_) | ExpressionFilter::Or(_) => conditions.push(
                sql::ast::Condition::Expression(translate_expression(env, state, child)?),
            ),
            ExpressionFilter::Column(condition) => {
                conditions.extend(translate_alias_condition(env, state, condition)?);
            }
            ExpressionFilter::Raw(raw) => conditions.push(translate_raw(state, raw)?),
        }
    }
    Ok(sql::ast::BooleanExpression { op, conditions })
}

/// A leaf with several value filters, i.e. `{ gt: 1, lt: 5 }`, keeps them ANDed.
fn translate_alias_condition(
    env: &Env,
    state: &State,
    condition: &AliasCondition,
) -> Result<Option<sql::ast::Condition>, Error> {
    let alias = state.lookup_bound_alias(&condition.alias)?;
    let entity_name = state
        .alias_entity(alias)
        .ok_or_else(|| Error::UnboundAlias(condition.alias.clone()))?;
    let entity = env.lookup_entity(entity_name)?;
    let field = lookup_field(entity, &condition.field)?;
    let table = sql::helpers::make_table_alias(format!("{alias}{}", field.alias_suffix));

    let (column, value_filters) = match &field.kind {
        metadata::FieldKind::PrimaryKey { column }
        | metadata::FieldKind::Primitive { column }
        | metadata::FieldKind::Enum { column } => (column, parse_value_filter(&condition.filter)?),
        metadata::FieldKind::ManyToOne { column, .. } => {
            match parse_entity_filter(&condition.filter)? {
                EntityFilter::Absent => (column, vec![]),
                EntityFilter::Match(value_filters) => (column, value_filters),
                EntityFilter::Alias(_) | EntityFilter::Join(_) => {
                    return Err(Error::InvalidExpression(format!(
                        "'{}.{}' can only be compared to ids",
                        condition.alias, condition.field
                    )))
                }
            }
        }
        kind => {
            return Err(Error::UnsupportedField {
                field: condition.field.clone(),
                entity: entity.name.clone(),
                kind: kind.name().to_string(),
            })
        }
    };

    let mut conditions = value_filters
        .into_iter()
        .map(|value_filter| {
            Ok(sql::helpers::column_condition(
                table.clone(),
                &column.column_name,
                map_to_db(&condition.field, column, value_filter)?,
            ))
        })
        .collect::<Result<Vec<_>, Error>>()?;

    Ok(match conditions.len() {
        0 => None,
        1 => conditions.pop(),
        _ => Some(sql::ast::Condition::Expression(
            sql::helpers::and_expression(conditions),
        )),
    })
}

fn translate_raw(state: &State, raw: &RawFilter) -> Result<sql::ast::Condition, Error> {
    let aliases = raw
        .aliases
        .iter()
        .map(|alias| state.lookup_bound_alias(alias).cloned())
        .collect::<Result<Vec<_>, Error>>()?;
    Ok(sql::ast::Condition::Raw(sql::ast::RawCondition {
        aliases,
        condition: raw.condition.clone(),
        bindings: raw.bindings.iter().map(json_to_value).collect(),
    }))
}
