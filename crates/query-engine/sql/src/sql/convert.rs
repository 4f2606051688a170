//! Convert a find query plan to a low-level SQL string.

use super::ast::*;
use super::error::InvariantViolation;
use super::string::{count_placeholders, SQL};

/// Render a plan, with optional LIMIT and OFFSET, as a single SQL string and its bindings.
pub fn find_query_to_sql(query: &FindQuery, limit: &Limit) -> Result<SQL, InvariantViolation> {
    let mut sql = SQL::new();
    query.to_sql(limit, &mut sql)?;
    Ok(sql)
}

// Convert to SQL strings

impl FindQuery {
    pub fn to_sql(&self, limit: &Limit, sql: &mut SQL) -> Result<(), InvariantViolation> {
        // If we're doing o2m joins, add a `DISTINCT` clause to avoid duplicates
        let needs_distinct = self
            .tables
            .iter()
            .any(|table| matches!(table.join, Join::Outer { distinct: true, .. }));

        if let Some(cte) = &self.cte {
            check_bindings(&cte.sql, &cte.bindings)?;
            sql.append_fragment(&cte.sql, &cte.bindings);
            sql.append_syntax(" ");
        }

        sql.append_syntax("SELECT ");
        if needs_distinct {
            sql.append_syntax("DISTINCT ");
        }
        for (index, select) in self.selects.iter().enumerate() {
            select.to_sql(sql);
            if index < (self.selects.len() - 1) {
                sql.append_syntax(", ");
            }
        }

        // Make sure the primary is first
        let (primary, joins) = match self.tables.split_first() {
            Some((primary, joins)) if primary.join == Join::Primary => (primary, joins),
            _ => return Err(InvariantViolation::MissingPrimaryTable),
        };
        sql.append_syntax(" FROM ");
        primary.to_sql_as(sql);
        // Then the joins
        for table in joins {
            table.to_sql(sql)?;
        }

        if let Some(lateral_joins) = &self.lateral_joins {
            let joins = lateral_joins.joins.join(" ");
            check_bindings(&joins, &lateral_joins.bindings)?;
            sql.append_syntax(" ");
            sql.append_fragment(&joins, &lateral_joins.bindings);
        }

        if let Some(condition) = &self.condition {
            if let Some(where_) = condition.to_sql(true)? {
                sql.append_syntax(" WHERE ");
                sql.append_fragment(&where_.sql, &where_.params);
            }
        }

        if !self.order_bys.is_empty() {
            sql.append_syntax(" ORDER BY ");
            for (index, order_by) in self.order_bys.iter().enumerate() {
                order_by.to_sql(sql);
                if index < (self.order_bys.len() - 1) {
                    sql.append_syntax(", ");
                }
            }
        }

        limit.to_sql(sql);
        Ok(())
    }
}

fn check_bindings(fragment: &str, bindings: &[Value]) -> Result<(), InvariantViolation> {
    let placeholders = count_placeholders(fragment);
    if placeholders == bindings.len() {
        Ok(())
    } else {
        Err(InvariantViolation::BindingMismatch {
            sql: fragment.to_string(),
            placeholders,
            bindings: bindings.len(),
        })
    }
}

impl SelectItem {
    pub fn to_sql(&self, sql: &mut SQL) {
        match self {
            SelectItem::Star(alias) => {
                alias.to_sql(sql);
                sql.append_syntax(".*");
            }
            SelectItem::PrimaryKey(column) => {
                column.to_sql(sql);
                sql.append_syntax(" AS id");
            }
            SelectItem::ClassTag(ClassTag { cases, default }) => {
                sql.append_syntax("CASE");
                for case in cases {
                    sql.append_syntax(" WHEN ");
                    case.column.to_sql(sql);
                    sql.append_syntax(" IS NOT NULL THEN ");
                    sql.append_string_literal(&case.type_name);
                }
                sql.append_syntax(" ELSE ");
                sql.append_string_literal(default);
                sql.append_syntax(" END AS __class");
            }
        }
    }
}

impl Table {
    /// `"table" AS "alias"`
    pub fn to_sql_as(&self, sql: &mut SQL) {
        self.name.to_sql(sql);
        sql.append_syntax(" AS ");
        self.alias.to_sql(sql);
    }

    /// A join clause. Only joined tables can be rendered this way.
    pub fn to_sql(&self, sql: &mut SQL) -> Result<(), InvariantViolation> {
        let on = match &self.join {
            Join::Inner { on } => {
                sql.append_syntax(" INNER JOIN ");
                on
            }
            Join::Outer { on, .. } => {
                sql.append_syntax(" LEFT OUTER JOIN ");
                on
            }
            Join::Primary => {
                return Err(InvariantViolation::MisplacedPrimaryTable(
                    self.alias.to_string(),
                ))
            }
        };
        self.to_sql_as(sql);
        sql.append_syntax(" ON ");
        on.to_sql(sql);
        Ok(())
    }
}

impl JoinCondition {
    pub fn to_sql(&self, sql: &mut SQL) {
        self.left.to_sql(sql);
        sql.append_syntax(" = ");
        self.right.to_sql(sql);
    }
}

impl BooleanExpression {
    /// Returns `cond AND (cond OR cond)` with its bindings, or `None` if there is nothing
    /// to combine. Only nested expressions are parenthesized.
    pub fn to_sql(&self, top_level: bool) -> Result<Option<SQL>, InvariantViolation> {
        let mut parts = vec![];
        for condition in &self.conditions {
            let part = match condition {
                Condition::Expression(expression) => expression.to_sql(false)?,
                Condition::Column(column_condition) => {
                    let mut sql = SQL::new();
                    column_condition.to_sql(&mut sql);
                    Some(sql)
                }
                Condition::Raw(raw) => {
                    check_bindings(&raw.condition, &raw.bindings)?;
                    let mut sql = SQL::new();
                    sql.append_fragment(&raw.condition, &raw.bindings);
                    Some(sql)
                }
            };
            parts.extend(part);
        }
        // If we don't have any conditions to combine, there is nothing to render
        if parts.is_empty() {
            return Ok(None);
        }

        let mut sql = SQL::new();
        if !top_level {
            sql.append_syntax("(");
        }
        for (index, part) in parts.iter().enumerate() {
            sql.append_fragment(&part.sql, &part.params);
            if index < (parts.len() - 1) {
                self.op.to_sql(&mut sql);
            }
        }
        if !top_level {
            sql.append_syntax(")");
        }
        Ok(Some(sql))
    }
}

impl BooleanOperator {
    pub fn to_sql(&self, sql: &mut SQL) {
        match self {
            BooleanOperator::And => sql.append_syntax(" AND "),
            BooleanOperator::Or => sql.append_syntax(" OR "),
        }
    }
}

impl ColumnCondition {
    pub fn to_sql(&self, sql: &mut SQL) {
        let column = ColumnReference {
            table: self.table.clone(),
            name: self.column.clone(),
        };
        let binary = |sql: &mut SQL, operator: &str, value: &Value| {
            column.to_sql(sql);
            sql.append_syntax(" ");
            sql.append_syntax(operator);
            sql.append_syntax(" ");
            sql.append_param(value.clone());
        };
        let negated = |sql: &mut SQL, operator: &str, value: &Value| {
            sql.append_syntax("NOT (");
            binary(sql, operator, value);
            sql.append_syntax(")");
        };

        match &self.filter {
            ValueFilter::Eq(value) => binary(sql, "=", value),
            ValueFilter::Ne(value) => binary(sql, "!=", value),
            ValueFilter::Gt(value) => binary(sql, ">", value),
            ValueFilter::Gte(value) => binary(sql, ">=", value),
            ValueFilter::Lt(value) => binary(sql, "<", value),
            ValueFilter::Lte(value) => binary(sql, "<=", value),
            ValueFilter::Like(value) => binary(sql, "LIKE", value),
            ValueFilter::NotLike(value) => binary(sql, "NOT LIKE", value),
            ValueFilter::ILike(value) => binary(sql, "ILIKE", value),
            ValueFilter::NotILike(value) => binary(sql, "NOT ILIKE", value),
            ValueFilter::Contains(value) => binary(sql, "@>", value),
            ValueFilter::ContainedBy(value) => binary(sql, "<@", value),
            ValueFilter::Overlaps(value) => binary(sql, "&&", value),
            ValueFilter::NotContains(value) => negated(sql, "@>", value),
            ValueFilter::NotOverlaps(value) => negated(sql, "&&", value),
            ValueFilter::IsNull => {
                column.to_sql(sql);
                sql.append_syntax(" IS NULL");
            }
            ValueFilter::NotNull => {
                column.to_sql(sql);
                sql.append_syntax(" IS NOT NULL");
            }
            ValueFilter::In(values) => {
                column.to_sql(sql);
                sql.append_syntax(" = ANY(");
                sql.append_param(Value::Array(values.clone()));
                sql.append_syntax(")");
            }
            ValueFilter::NotIn(values) => {
                column.to_sql(sql);
                sql.append_syntax(" != ALL(");
                sql.append_param(Value::Array(values.clone()));
                sql.append_syntax(")");
            }
            ValueFilter::Between(low, high) => {
                column.to_sql(sql);
                sql.append_syntax(" BETWEEN ");
                sql.append_param(low.clone());
                sql.append_syntax(" AND ");
                sql.append_param(high.clone());
            }
        }
    }
}

impl OrderByElement {
    pub fn to_sql(&self, sql: &mut SQL) {
        self.target.to_sql(sql);
        self.direction.to_sql(sql);
    }
}

impl OrderByDirection {
    pub fn to_sql(&self, sql: &mut SQL) {
        match self {
            OrderByDirection::Asc => sql.append_syntax(" ASC"),
            OrderByDirection::Desc => sql.append_syntax(" DESC"),
        }
    }
}

impl Limit {
    pub fn to_sql(&self, sql: &mut SQL) {
        // zero means no limit, and no offset
        if let Some(limit) = self.limit.filter(|limit| *limit > 0) {
            sql.append_syntax(" LIMIT ");
            sql.append_param(Value::Int(limit.into()));
        }
        if let Some(offset) = self.offset.filter(|offset| *offset > 0) {
            sql.append_syntax(" OFFSET ");
            sql.append_param(Value::Int(offset.into()));
        }
    }
}

// names
impl TableName {
    pub fn to_sql(&self, sql: &mut SQL) {
        let TableName(name) = self;
        sql.append_identifier(name);
    }
}

impl TableAlias {
    pub fn to_sql(&self, sql: &mut SQL) {
        let TableAlias(name) = self;
        sql.append_identifier(name);
    }
}

impl ColumnReference {
    pub fn to_sql(&self, sql: &mut SQL) {
        self.table.to_sql(sql);
        sql.append_syntax(".");
        let ColumnName(name) = &self.name;
        sql.append_identifier(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::helpers;
    use similar_asserts::assert_eq;

    fn alias(name: &str) -> TableAlias {
        helpers::make_table_alias(name.to_string())
    }

    fn authors_query() -> FindQuery {
        let mut query = helpers::empty_find_query();
        query.selects.push(SelectItem::Star(alias("a")));
        query
            .tables
            .push(helpers::primary_table(alias("a"), "authors"));
        query
    }

    fn where_(conditions: Vec<Condition>) -> Option<BooleanExpression> {
        Some(helpers::and_expression(conditions))
    }

    #[test]
    fn renders_a_simple_equality() {
        let mut query = authors_query();
        query.condition = where_(vec![helpers::column_condition(
            alias("a"),
            "name",
            ValueFilter::Eq(Value::String("Foo".to_string())),
        )]);

        let sql = find_query_to_sql(&query, &helpers::empty_limit()).unwrap();
        insta::assert_snapshot!(sql.sql, @r#"SELECT "a".* FROM "authors" AS "a" WHERE "a"."name" = ?"#);
        assert_eq!(sql.params, vec![Value::String("Foo".to_string())]);
    }

    #[test]
    fn renders_limit_without_where() {
        let query = authors_query();
        let limit = Limit {
            limit: Some(10),
            offset: None,
        };

        let sql = find_query_to_sql(&query, &limit).unwrap();
        assert_eq!(sql.sql, r#"SELECT "a".* FROM "authors" AS "a" LIMIT ?"#);
        assert_eq!(sql.params, vec![Value::Int(10)]);
    }

    #[test]
    fn skips_zero_limit_and_offset() {
        let query = authors_query();
        let limit = Limit {
            limit: Some(0),
            offset: Some(0),
        };

        let sql = find_query_to_sql(&query, &limit).unwrap();
        assert_eq!(sql.sql, r#"SELECT "a".* FROM "authors" AS "a""#);
        assert!(sql.params.is_empty());
    }

    #[test]
    fn renders_in_as_any_with_a_single_array_binding() {
        let mut query = authors_query();
        query.condition = where_(vec![helpers::column_condition(
            alias("a"),
            "id",
            ValueFilter::In(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
        )]);

        let sql = find_query_to_sql(&query, &helpers::empty_limit()).unwrap();
        assert!(sql.sql.ends_with(r#"WHERE "a"."id" = ANY(?)"#));
        assert_eq!(
            sql.params,
            vec![Value::Array(vec![
                Value::Int(1),
                Value::Int(2),
                Value::Int(3)
            ])]
        );
    }

    #[test]
    fn renders_between_low_then_high() {
        let mut query = authors_query();
        query.condition = where_(vec![helpers::column_condition(
            alias("a"),
            "age",
            ValueFilter::Between(Value::Int(1), Value::Int(10)),
        )]);

        let sql = find_query_to_sql(&query, &helpers::empty_limit()).unwrap();
        assert!(sql.sql.ends_with(r#"WHERE "a"."age" BETWEEN ? AND ?"#));
        assert_eq!(sql.params, vec![Value::Int(1), Value::Int(10)]);
    }

    #[test]
    fn maps_every_operator() {
        let v = || Value::Int(1);
        let cases: Vec<(ValueFilter<Value>, &str, usize)> = vec![
            (ValueFilter::Eq(v()), r#""a"."c" = ?"#, 1),
            (ValueFilter::Ne(v()), r#""a"."c" != ?"#, 1),
            (ValueFilter::Gt(v()), r#""a"."c" > ?"#, 1),
            (ValueFilter::Gte(v()), r#""a"."c" >= ?"#, 1),
            (ValueFilter::Lt(v()), r#""a"."c" < ?"#, 1),
            (ValueFilter::Lte(v()), r#""a"."c" <= ?"#, 1),
            (ValueFilter::Like(v()), r#""a"."c" LIKE ?"#, 1),
            (ValueFilter::NotLike(v()), r#""a"."c" NOT LIKE ?"#, 1),
            (ValueFilter::ILike(v()), r#""a"."c" ILIKE ?"#, 1),
            (ValueFilter::NotILike(v()), r#""a"."c" NOT ILIKE ?"#, 1),
            (ValueFilter::Contains(v()), r#""a"."c" @> ?"#, 1),
            (ValueFilter::ContainedBy(v()), r#""a"."c" <@ ?"#, 1),
            (ValueFilter::Overlaps(v()), r#""a"."c" && ?"#, 1),
            (ValueFilter::NotContains(v()), r#"NOT ("a"."c" @> ?)"#, 1),
            (ValueFilter::NotOverlaps(v()), r#"NOT ("a"."c" && ?)"#, 1),
            (ValueFilter::IsNull, r#""a"."c" IS NULL"#, 0),
            (ValueFilter::NotNull, r#""a"."c" IS NOT NULL"#, 0),
            (ValueFilter::In(vec![v()]), r#""a"."c" = ANY(?)"#, 1),
            (ValueFilter::NotIn(vec![v()]), r#""a"."c" != ALL(?)"#, 1),
            (ValueFilter::Between(v(), v()), r#""a"."c" BETWEEN ? AND ?"#, 2),
        ];
        for (filter, expected, bindings) in cases {
            let condition = ColumnCondition {
                table: alias("a"),
                column: ColumnName("c".to_string()),
                filter,
            };
            let mut sql = SQL::new();
            condition.to_sql(&mut sql);
            assert_eq!(sql.sql, expected);
            assert_eq!(sql.params.len(), bindings);
        }
    }

    #[test]
    fn parenthesizes_nested_expressions_and_skips_empty_ones() {
        let mut query = authors_query();
        query.condition = where_(vec![
            helpers::column_condition(alias("a"), "age", ValueFilter::Gt(Value::Int(1))),
            Condition::Expression(helpers::or_expression(vec![
                helpers::column_condition(alias("a"), "first_name", ValueFilter::IsNull),
                helpers::column_condition(
                    alias("a"),
                    "last_name",
                    ValueFilter::Eq(Value::String("l".to_string())),
                ),
            ])),
            Condition::Expression(helpers::or_expression(vec![])),
        ]);

        let sql = find_query_to_sql(&query, &helpers::empty_limit()).unwrap();
        assert_eq!(
            sql.sql,
            r#"SELECT "a".* FROM "authors" AS "a" WHERE "a"."age" > ? AND ("a"."first_name" IS NULL OR "a"."last_name" = ?)"#
        );
        assert_eq!(
            sql.params,
            vec![Value::Int(1), Value::String("l".to_string())]
        );
    }

    #[test]
    fn omits_where_when_every_expression_is_empty() {
        let mut query = authors_query();
        query.condition = where_(vec![Condition::Expression(helpers::or_expression(vec![]))]);

        let sql = find_query_to_sql(&query, &helpers::empty_limit()).unwrap();
        assert_eq!(sql.sql, r#"SELECT "a".* FROM "authors" AS "a""#);
    }

    #[test]
    fn renders_joins_distinct_and_order_by() {
        let mut query = authors_query();
        query.tables.push(helpers::outer_join(
            alias("b"),
            "books",
            JoinCondition {
                left: helpers::make_column(alias("a"), "id"),
                right: helpers::make_column(alias("b"), "author_id"),
            },
            true,
        ));
        query.tables.push(helpers::inner_join(
            alias("p"),
            "publishers",
            JoinCondition {
                left: helpers::make_column(alias("a"), "publisher_id"),
                right: helpers::make_column(alias("p"), "id"),
            },
        ));
        query.order_bys.push(OrderByElement {
            target: helpers::make_column(alias("p"), "name"),
            direction: OrderByDirection::Desc,
        });
        query.order_bys.push(OrderByElement {
            target: helpers::make_column(alias("a"), "id"),
            direction: OrderByDirection::Asc,
        });

        let sql = find_query_to_sql(&query, &helpers::empty_limit()).unwrap();
        assert_eq!(
            sql.sql,
            r#"SELECT DISTINCT "a".* FROM "authors" AS "a" LEFT OUTER JOIN "books" AS "b" ON "a"."id" = "b"."author_id" INNER JOIN "publishers" AS "p" ON "a"."publisher_id" = "p"."id" ORDER BY "p"."name" DESC, "a"."id" ASC"#
        );
    }

    #[test]
    fn outer_joins_for_sorting_do_not_need_distinct() {
        let mut query = authors_query();
        query.tables.push(helpers::outer_join(
            alias("p"),
            "publishers",
            JoinCondition {
                left: helpers::make_column(alias("a"), "publisher_id"),
                right: helpers::make_column(alias("p"), "id"),
            },
            false,
        ));

        let sql = find_query_to_sql(&query, &helpers::empty_limit()).unwrap();
        assert!(sql.sql.starts_with(r#"SELECT "a".* FROM"#));
    }

    #[test]
    fn renders_class_tag_select() {
        let mut query = helpers::empty_find_query();
        query.selects = vec![
            SelectItem::Star(alias("p")),
            SelectItem::PrimaryKey(helpers::make_column(alias("p"), "id")),
            SelectItem::ClassTag(ClassTag {
                cases: vec![ClassTagCase {
                    column: helpers::make_column(alias("p_s0"), "id"),
                    type_name: "SmallPublisher".to_string(),
                }],
                default: "Publisher".to_string(),
            }),
        ];
        query
            .tables
            .push(helpers::primary_table(alias("p"), "publishers"));

        let sql = find_query_to_sql(&query, &helpers::empty_limit()).unwrap();
        assert_eq!(
            sql.sql,
            r#"SELECT "p".*, "p"."id" AS id, CASE WHEN "p_s0"."id" IS NOT NULL THEN 'SmallPublisher' ELSE 'Publisher' END AS __class FROM "publishers" AS "p""#
        );
    }

    #[test]
    fn orders_bindings_cte_lateral_where_limit_offset() {
        let mut query = authors_query();
        query.cte = Some(RawSql {
            sql: "WITH counts AS (SELECT ? AS n)".to_string(),
            bindings: vec![Value::String("cte".to_string())],
        });
        query.lateral_joins = Some(LateralJoins {
            joins: vec!["CROSS JOIN LATERAL (SELECT ? AS x) AS l".to_string()],
            bindings: vec![Value::String("lateral".to_string())],
        });
        query.condition = where_(vec![Condition::Raw(RawCondition {
            aliases: vec![alias("a")],
            condition: "a.age > ?".to_string(),
            bindings: vec![Value::String("where".to_string())],
        })]);
        let limit = Limit {
            limit: Some(5),
            offset: Some(10),
        };

        let sql = find_query_to_sql(&query, &limit).unwrap();
        assert_eq!(
            sql.sql,
            r#"WITH counts AS (SELECT ? AS n) SELECT "a".* FROM "authors" AS "a" CROSS JOIN LATERAL (SELECT ? AS x) AS l WHERE a.age > ? LIMIT ? OFFSET ?"#
        );
        assert_eq!(
            sql.params,
            vec![
                Value::String("cte".to_string()),
                Value::String("lateral".to_string()),
                Value::String("where".to_string()),
                Value::Int(5),
                Value::Int(10),
            ]
        );
    }

    #[test]
    fn rejects_a_primary_table_in_a_join_position() {
        let mut query = authors_query();
        query
            .tables
            .push(helpers::primary_table(alias("b"), "books"));

        assert_eq!(
            find_query_to_sql(&query, &helpers::empty_limit()),
            Err(InvariantViolation::MisplacedPrimaryTable("b".to_string()))
        );
    }

    #[test]
    fn rejects_a_plan_without_primary_table() {
        let mut query = helpers::empty_find_query();
        query.selects.push(SelectItem::Star(alias("a")));

        assert_eq!(
            find_query_to_sql(&query, &helpers::empty_limit()),
            Err(InvariantViolation::MissingPrimaryTable)
        );
    }

    #[test]
    fn rejects_raw_conditions_with_mismatched_bindings() {
        let mut query = authors_query();
        query.condition = where_(vec![Condition::Raw(RawCondition {
            aliases: vec![],
            condition: "a.age > ? AND a.age < ?".to_string(),
            bindings: vec![Value::Int(1)],
        })]);

        assert_eq!(
            find_query_to_sql(&query, &helpers::empty_limit()),
            Err(InvariantViolation::BindingMismatch {
                sql: "a.age > ? AND a.age < ?".to_string(),
                placeholders: 2,
                bindings: 1,
            })
        );
    }
}
