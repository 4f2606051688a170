//! Remove joins that nothing in the query refers to.

use std::collections::BTreeSet;

use query_engine_sql::sql;

/// Remove every join that is not used by a select, a condition, an ordering or `keep_aliases`,
/// directly or through a join that depends on it. The primary table is always kept.
pub fn prune_unused_joins(
    query: &mut sql::ast::FindQuery,
    keep_aliases: &BTreeSet<sql::ast::TableAlias>,
) {
    let mut used = used_aliases(query, keep_aliases);

    // A used join needs the table on the left of its predicate. Restart from the top whenever
    // a dependency is found, since it may come before us.
    let mut index = 0;
    while index < query.tables.len() {
        let table = &query.tables[index];
        if let Some(on) = table.join.condition() {
            if used.contains(&table.alias) && !used.contains(&on.left.table) {
                used.insert(on.left.table.clone());
                index = 0;
                continue;
            }
        }
        index += 1;
    }

    query.tables.retain(|table| {
        let keep = table.join == sql::ast::Join::Primary || used.contains(&table.alias);
        if !keep {
            tracing::trace!(alias = %table.alias, "pruning unused join");
        }
        keep
    });
}

/// Every alias referred to outside of the join predicates.
fn used_aliases(
    query: &sql::ast::FindQuery,
    keep_aliases: &BTreeSet<sql::ast::TableAlias>,
) -> BTreeSet<sql::ast::TableAlias> {
    let mut used: BTreeSet<sql::ast::TableAlias> = keep_aliases.clone();
    for select in &query.selects {
        used.extend(select.table_aliases().into_iter().cloned());
    }
    for order_by in &query.order_bys {
        used.insert(order_by.target.table.clone());
    }

    let mut todo: Vec<&sql::ast::BooleanExpression> = query.condition.iter().collect();
    while let Some(expression) = todo.pop() {
        for condition in &expression.conditions {
            match condition {
                sql::ast::Condition::Expression(nested) => todo.push(nested),
                sql::ast::Condition::Column(column) => {
                    used.insert(column.table.clone());
                }
                sql::ast::Condition::Raw(raw) => used.extend(raw.aliases.iter().cloned()),
            }
        }
    }
    used
}

#[cfg(test)]
mod tests {
    use super::*;
    use sql::helpers::{make_column, make_table_alias};

    fn alias(name: &str) -> sql::ast::TableAlias {
        make_table_alias(name.to_string())
    }

    fn join(name: &str, from: &str) -> sql::ast::Table {
        sql::helpers::inner_join(
            alias(name),
            name,
            sql::ast::JoinCondition {
                left: make_column(alias(from), "id"),
                right: make_column(alias(name), "parent_id"),
            },
        )
    }

    /// `a` <- `b` <- `c`, and `a` <- `d`, where only `c` is used.
    fn chain() -> sql::ast::FindQuery {
        let mut query = sql::helpers::empty_find_query();
        query.selects.push(sql::ast::SelectItem::Star(alias("a")));
        query
            .tables
            .push(sql::helpers::primary_table(alias("a"), "a"));
        query.tables.push(join("b", "a"));
        query.tables.push(join("d", "a"));
        query.tables.push(join("c", "b"));
        query.condition = Some(sql::helpers::and_expression(vec![
            sql::ast::Condition::Expression(sql::helpers::or_expression(vec![
                sql::helpers::column_condition(alias("c"), "x", sql::ast::ValueFilter::IsNull),
            ])),
        ]));
        query
    }

    fn aliases(query: &sql::ast::FindQuery) -> Vec<String> {
        query
            .tables
            .iter()
            .map(|table| table.alias.to_string())
            .collect()
    }

    #[test]
    fn keeps_the_join_chain_of_used_aliases() {
        let mut query = chain();
        prune_unused_joins(&mut query, &BTreeSet::new());
        assert_eq!(aliases(&query), vec!["a", "b", "c"]);
    }

    #[test]
    fn keep_aliases_are_never_pruned() {
        let mut query = chain();
        prune_unused_joins(&mut query, &BTreeSet::from([alias("d")]));
        assert_eq!(aliases(&query), vec!["a", "b", "d", "c"]);
    }

    #[test]
    fn pruning_is_idempotent() {
        let mut once = chain();
        prune_unused_joins(&mut once, &BTreeSet::new());
        let mut twice = once.clone();
        prune_unused_joins(&mut twice, &BTreeSet::new());
        assert_eq!(once, twice);
    }

    #[test]
    fn raw_conditions_and_order_bys_count_as_uses() {
        let mut query = chain();
        query.condition = Some(sql::helpers::and_expression(vec![
            sql::ast::Condition::Raw(sql::ast::RawCondition {
                aliases: vec![alias("d")],
                condition: "d.x = 1".to_string(),
                bindings: vec![],
            }),
        ]));
        query.order_bys.push(sql::ast::OrderByElement {
            target: make_column(alias("b"), "y"),
            direction: sql::ast::OrderByDirection::Asc,
        });
        prune_unused_joins(&mut query, &BTreeSet::new());
        assert_eq!(aliases(&query), vec!["a", "b", "d"]);
    }
}
