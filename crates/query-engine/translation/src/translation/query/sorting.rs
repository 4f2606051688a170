//! Translate an order-by into ORDER BY elements, joining many-to-one relations as needed.

use query_engine_metadata::metadata;
use query_engine_sql::sql;

use crate::translation::error::Error;
use crate::translation::helpers::{lookup_field, primary_key_column, Env, State};
use crate::translation::models::{Direction, OrderBy, OrderByValue};

impl From<Direction> for sql::ast::OrderByDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Asc => sql::ast::OrderByDirection::Asc,
            Direction::Desc => sql::ast::OrderByDirection::Desc,
        }
    }
}

/// Add the ORDER BY elements of an order-by, in order.
pub fn add_order_by(
    env: &Env,
    state: &mut State,
    entity: &metadata::EntityMetadata,
    alias: &sql::ast::TableAlias,
    order_by: &OrderBy,
) -> Result<(), Error> {
    for (field_name, value) in &order_by.0 {
        let field = lookup_field(entity, field_name)?;
        let field_alias =
            sql::helpers::make_table_alias(format!("{alias}{}", field.alias_suffix));

        match (&field.kind, value) {
            (
                metadata::FieldKind::PrimaryKey { column }
                | metadata::FieldKind::Primitive { column }
                | metadata::FieldKind::Enum { column },
                OrderByValue::Direction(direction),
            ) => state.order_bys.push(sql::ast::OrderByElement {
                target: sql::helpers::make_column(field_alias, &column.column_name),
                direction: (*direction).into(),
            }),

            (
                metadata::FieldKind::ManyToOne {
                    column,
                    other_entity,
                },
                OrderByValue::Nested(nested),
            ) => {
                let other = env.lookup_entity(other_entity)?;
                let left = sql::helpers::make_column(field_alias, &column.column_name);
                // Do we already have this relation joined in?
                let existing = state
                    .tables
                    .iter()
                    .find(|table| {
                        table.name.0 == other.table_name
                            && table.join.condition().is_some_and(|on| on.left == left)
                    })
                    .map(|table| table.alias.clone());
                let other_alias = match existing {
                    Some(other_alias) => other_alias,
                    None => {
                        let other_alias = state.make_table_alias(&other.table_name);
                        let on = sql::ast::JoinCondition {
                            left,
                            right: sql::helpers::make_column(
                                other_alias.clone(),
                                &primary_key_column(other)?.column_name,
                            ),
                        };
                        // Sorting must not drop rows that have no related row
                        state.push_table(
                            sql::helpers::outer_join(
                                other_alias.clone(),
                                &other.table_name,
                                on,
                                false,
                            ),
                            other,
                        );
                        other_alias
                    }
                };
                add_order_by(env, state, other, &other_alias, nested)?;
            }

            (
                metadata::FieldKind::PrimaryKey { .. }
                | metadata::FieldKind::Primitive { .. }
                | metadata::FieldKind::Enum { .. }
                | metadata::FieldKind::ManyToOne { .. },
                _,
            ) => {
                return Err(Error::MalformedFilter(format!(
                    "invalid order by for field '{field_name}'"
                )))
            }

            (kind, _) => {
                return Err(Error::UnsupportedField {
                    field: field_name.clone(),
                    entity: entity.name.clone(),
                    kind: kind.name().to_string(),
                })
            }
        }
    }
    Ok(())
}

/// Finish the ordering on the primary key, unless the query already orders by it.
pub fn add_default_order_by(
    query: &mut sql::ast::FindQuery,
    entity: &metadata::EntityMetadata,
) -> Result<(), Error> {
    let primary = query
        .primary_table()
        .ok_or(sql::error::InvariantViolation::MissingPrimaryTable)?;
    let target = sql::helpers::make_column(
        primary.alias.clone(),
        &primary_key_column(entity)?.column_name,
    );
    if !query.order_bys.iter().any(|order_by| order_by.target == target) {
        query.order_bys.push(sql::ast::OrderByElement {
            target,
            direction: sql::ast::OrderByDirection::Asc,
        });
    }
    Ok(())
}
