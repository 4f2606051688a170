//! Type definitions of a find query plan.
//!
//! The plan is independent of any SQL dialect: it names tables, joins, conditions and
//! orderings, and leaves spelling them out to `convert`.

use std::collections::BTreeMap;

use serde::Serialize;

/// The result of parsing a find filter.
#[derive(Debug, Clone, PartialEq)]
pub struct FindQuery {
    pub selects: Vec<SelectItem>,
    /// The primary table, followed by any joins.
    pub tables: Vec<Table>,
    /// Every condition, simple and complex, ANDed together at the top level.
    pub condition: Option<BooleanExpression>,
    /// Any orders to apply before the default ordering by primary key.
    pub order_bys: Vec<OrderByElement>,
    /// A leading WITH clause supplied upstream.
    pub cte: Option<RawSql>,
    /// Lateral joins supplied upstream, rendered after the regular joins.
    pub lateral_joins: Option<LateralJoins>,
    /// The canonical alias assigned to each alias placeholder found in the filter.
    pub bound_aliases: BTreeMap<String, TableAlias>,
}

impl FindQuery {
    /// The primary table, if the plan is well formed.
    pub fn primary_table(&self) -> Option<&Table> {
        self.tables
            .first()
            .filter(|table| matches!(table.join, Join::Primary))
    }
}

/// An entry in the select list.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    /// `"a".*`
    Star(TableAlias),
    /// `"a"."id" AS id`, nominating one `id` when several joined tables have one.
    PrimaryKey(ColumnReference),
    /// A `CASE` reporting the most specific type of each row as `__class`.
    ClassTag(ClassTag),
}

impl SelectItem {
    /// The table aliases this select reads from.
    pub fn table_aliases(&self) -> Vec<&TableAlias> {
        match self {
            SelectItem::Star(alias) => vec![alias],
            SelectItem::PrimaryKey(column) => vec![&column.table],
            SelectItem::ClassTag(class_tag) => class_tag
                .cases
                .iter()
                .map(|case| &case.column.table)
                .collect(),
        }
    }
}

/// `CASE WHEN <column> IS NOT NULL THEN '<type>' ... ELSE '<default>' END AS __class`
#[derive(Debug, Clone, PartialEq)]
pub struct ClassTag {
    pub cases: Vec<ClassTagCase>,
    pub default: String,
}

/// A single `WHEN` of a class tag.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassTagCase {
    pub column: ColumnReference,
    pub type_name: String,
}

/// A table occurrence in the query.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub alias: TableAlias,
    pub name: TableName,
    pub join: Join,
}

/// How a table is brought into the query.
#[derive(Debug, Clone, PartialEq)]
pub enum Join {
    /// The table being queried. Always the first table.
    Primary,
    /// INNER JOIN
    Inner { on: JoinCondition },
    /// LEFT OUTER JOIN
    Outer {
        on: JoinCondition,
        /// Whether the join may multiply rows, requiring a SELECT DISTINCT.
        distinct: bool,
    },
}

impl Join {
    pub fn condition(&self) -> Option<&JoinCondition> {
        match self {
            Join::Primary => None,
            Join::Inner { on } | Join::Outer { on, .. } => Some(on),
        }
    }
}

/// `left = right`, where `left` is on a table introduced earlier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinCondition {
    pub left: ColumnReference,
    pub right: ColumnReference,
}

/// A boolean combination of conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct BooleanExpression {
    pub op: BooleanOperator,
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOperator {
    And,
    Or,
}

/// A child of a boolean expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Expression(BooleanExpression),
    Column(ColumnCondition),
    Raw(RawCondition),
}

/// A comparison of a single column against a filter.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnCondition {
    pub table: TableAlias,
    pub column: ColumnName,
    pub filter: ValueFilter<Value>,
}

/// Raw SQL written by the caller, with `?` placeholders for its bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCondition {
    /// The aliases the fragment refers to, so they survive join pruning.
    pub aliases: Vec<TableAlias>,
    pub condition: String,
    pub bindings: Vec<Value>,
}

/// A filter applied to a single value.
///
/// The parser builds these with domain values and then maps them to storage values.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueFilter<V> {
    Eq(V),
    Ne(V),
    Gt(V),
    Gte(V),
    Lt(V),
    Lte(V),
    Like(V),
    NotLike(V),
    ILike(V),
    NotILike(V),
    /// `@>`, the value is an array.
    Contains(V),
    /// `<@`, the value is an array.
    ContainedBy(V),
    /// `&&`, the value is an array.
    Overlaps(V),
    NotContains(V),
    NotOverlaps(V),
    In(Vec<V>),
    NotIn(Vec<V>),
    Between(V, V),
    IsNull,
    NotNull,
}

impl<V> ValueFilter<V> {
    /// The name of the filter operator.
    pub fn name(&self) -> &'static str {
        match self {
            ValueFilter::Eq(_) => "eq",
            ValueFilter::Ne(_) => "ne",
            ValueFilter::Gt(_) => "gt",
            ValueFilter::Gte(_) => "gte",
            ValueFilter::Lt(_) => "lt",
            ValueFilter::Lte(_) => "lte",
            ValueFilter::Like(_) => "like",
            ValueFilter::NotLike(_) => "nlike",
            ValueFilter::ILike(_) => "ilike",
            ValueFilter::NotILike(_) => "nilike",
            ValueFilter::Contains(_) => "contains",
            ValueFilter::ContainedBy(_) => "containedBy",
            ValueFilter::Overlaps(_) => "overlaps",
            ValueFilter::NotContains(_) => "ncontains",
            ValueFilter::NotOverlaps(_) => "noverlaps",
            ValueFilter::In(_) => "in",
            ValueFilter::NotIn(_) => "nin",
            ValueFilter::Between(_, _) => "between",
            ValueFilter::IsNull => "is-null",
            ValueFilter::NotNull => "not-null",
        }
    }

    /// Convert every value held by the filter, stopping at the first failure.
    pub fn try_map<W, E>(
        self,
        mut f: impl FnMut(V) -> Result<W, E>,
    ) -> Result<ValueFilter<W>, E> {
        Ok(match self {
            ValueFilter::Eq(v) => ValueFilter::Eq(f(v)?),
            ValueFilter::Ne(v) => ValueFilter::Ne(f(v)?),
            ValueFilter::Gt(v) => ValueFilter::Gt(f(v)?),
            ValueFilter::Gte(v) => ValueFilter::Gte(f(v)?),
            ValueFilter::Lt(v) => ValueFilter::Lt(f(v)?),
            ValueFilter::Lte(v) => ValueFilter::Lte(f(v)?),
            ValueFilter::Like(v) => ValueFilter::Like(f(v)?),
            ValueFilter::NotLike(v) => ValueFilter::NotLike(f(v)?),
            ValueFilter::ILike(v) => ValueFilter::ILike(f(v)?),
            ValueFilter::NotILike(v) => ValueFilter::NotILike(f(v)?),
            ValueFilter::Contains(v) => ValueFilter::Contains(f(v)?),
            ValueFilter::ContainedBy(v) => ValueFilter::ContainedBy(f(v)?),
            ValueFilter::Overlaps(v) => ValueFilter::Overlaps(f(v)?),
            ValueFilter::NotContains(v) => ValueFilter::NotContains(f(v)?),
            ValueFilter::NotOverlaps(v) => ValueFilter::NotOverlaps(f(v)?),
            ValueFilter::In(values) => {
                ValueFilter::In(values.into_iter().map(&mut f).collect::<Result<_, _>>()?)
            }
            ValueFilter::NotIn(values) => {
                ValueFilter::NotIn(values.into_iter().map(&mut f).collect::<Result<_, _>>()?)
            }
            ValueFilter::Between(low, high) => ValueFilter::Between(f(low)?, f(high)?),
            ValueFilter::IsNull => ValueFilter::IsNull,
            ValueFilter::NotNull => ValueFilter::NotNull,
        })
    }
}

/// An ORDER BY element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderByElement {
    pub target: ColumnReference,
    pub direction: OrderByDirection,
}

/// A direction for a single ORDER BY element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderByDirection {
    Asc,
    Desc,
}

/// LIMIT and OFFSET clauses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Limit {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// A leading SQL fragment with its own bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSql {
    pub sql: String,
    pub bindings: Vec<Value>,
}

/// Lateral join fragments, emitted verbatim after the regular joins.
#[derive(Debug, Clone, PartialEq)]
pub struct LateralJoins {
    pub joins: Vec<String>,
    pub bindings: Vec<Value>,
}

/// A value in its storage representation, bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Json(serde_json::Value),
}

/// A database table name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName(pub String);

/// aliases that we give to table occurrences
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableAlias(pub String);

impl std::fmt::Display for TableAlias {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let TableAlias(alias) = self;
        write!(f, "{alias}")
    }
}

/// A database table's column name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnName(pub String);

/// A column of an aliased table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnReference {
    pub table: TableAlias,
    pub name: ColumnName,
}
