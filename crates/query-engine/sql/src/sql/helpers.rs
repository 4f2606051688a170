//! Helpers for building sql::ast types in certain shapes and patterns.

use super::ast::*;
use std::collections::BTreeMap;

// Empty clauses //

/// A plan with no tables, selects or conditions.
pub fn empty_find_query() -> FindQuery {
    FindQuery {
        selects: vec![],
        tables: vec![],
        condition: None,
        order_bys: vec![],
        cte: None,
        lateral_joins: None,
        bound_aliases: BTreeMap::new(),
    }
}

/// Empty `LIMIT` and `OFFSET` clauses.
pub fn empty_limit() -> Limit {
    Limit {
        limit: None,
        offset: None,
    }
}

// Aliasing //

/// Create table aliases using this function so we build everything in one place.
pub fn make_table_alias(name: String) -> TableAlias {
    TableAlias(name)
}

/// Generate a column reference to a specific aliased table.
pub fn make_column(table: TableAlias, name: &str) -> ColumnReference {
    ColumnReference {
        table,
        name: ColumnName(name.to_string()),
    }
}

// Tables //

pub fn primary_table(alias: TableAlias, name: &str) -> Table {
    Table {
        alias,
        name: TableName(name.to_string()),
        join: Join::Primary,
    }
}

pub fn inner_join(alias: TableAlias, name: &str, on: JoinCondition) -> Table {
    Table {
        alias,
        name: TableName(name.to_string()),
        join: Join::Inner { on },
    }
}

pub fn outer_join(alias: TableAlias, name: &str, on: JoinCondition, distinct: bool) -> Table {
    Table {
        alias,
        name: TableName(name.to_string()),
        join: Join::Outer { on, distinct },
    }
}

// Conditions //

pub fn and_expression(conditions: Vec<Condition>) -> BooleanExpression {
    BooleanExpression {
        op: BooleanOperator::And,
        conditions,
    }
}

pub fn or_expression(conditions: Vec<Condition>) -> BooleanExpression {
    BooleanExpression {
        op: BooleanOperator::Or,
        conditions,
    }
}

pub fn column_condition(table: TableAlias, column: &str, filter: ValueFilter<Value>) -> Condition {
    Condition::Column(ColumnCondition {
        table,
        column: ColumnName(column.to_string()),
        filter,
    })
}
