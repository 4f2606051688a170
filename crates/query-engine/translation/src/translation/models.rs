//! The find request: a filter over an entity graph, with optional complex conditions and
//! ordering.

use indexmap::IndexMap;
use serde::Deserialize;

/// The JSON key marking an object as an alias placeholder, i.e. `{ "$alias": "b" }`.
pub const ALIAS_KEY: &str = "$alias";
/// The JSON key marking an object as an entity reference, i.e. `{ "$entity": "Author", "id": "a:1" }`.
pub const ENTITY_KEY: &str = "$entity";
/// The filter key binding an alias to the table of the enclosing object.
pub const AS_KEY: &str = "as";

/// A find request against a single entity.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub entity: String,
    #[serde(default)]
    pub filter: Filter,
    #[serde(default)]
    pub expression: Option<ExpressionFilter>,
    #[serde(default)]
    pub order_by: Option<OrderBy>,
}

impl QueryRequest {
    pub fn new(entity: impl Into<String>, filter: Filter) -> Self {
        QueryRequest {
            entity: entity.into(),
            filter,
            expression: None,
            order_by: None,
        }
    }
}

/// A filter over an entity, a relation or a single value.
///
/// Object keys keep the order they were written in, since that order decides which aliases the
/// joined tables get.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "serde_json::Value")]
pub enum Filter {
    /// No filter at all. Matches everything.
    Undefined,
    Null,
    /// A string, number or boolean.
    Value(serde_json::Value),
    Entity(EntityRef),
    List(Vec<Filter>),
    Alias(Alias),
    Object(IndexMap<String, Filter>),
}

impl Default for Filter {
    fn default() -> Self {
        Filter::Object(IndexMap::new())
    }
}

impl Filter {
    pub fn alias(name: impl Into<String>) -> Self {
        Filter::Alias(Alias::new(name))
    }
}

impl From<serde_json::Value> for Filter {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Filter::Null,
            serde_json::Value::Array(items) => {
                Filter::List(items.into_iter().map(Filter::from).collect())
            }
            serde_json::Value::Object(mut map) => {
                if map.len() == 1 {
                    if let Some(serde_json::Value::String(name)) = map.get(ALIAS_KEY) {
                        return Filter::alias(name.clone());
                    }
                }
                if let Some(serde_json::Value::String(entity)) = map.get(ENTITY_KEY) {
                    let entity = entity.clone();
                    return Filter::Entity(EntityRef {
                        entity,
                        id: map.remove("id").filter(|id| !id.is_null()),
                    });
                }
                Filter::Object(
                    map.into_iter()
                        .map(|(key, value)| {
                            let filter = match value {
                                serde_json::Value::String(name) if key == AS_KEY => {
                                    Filter::alias(name)
                                }
                                value => Filter::from(value),
                            };
                            (key, filter)
                        })
                        .collect(),
                )
            }
            scalar => Filter::Value(scalar),
        }
    }
}

impl From<Alias> for Filter {
    fn from(alias: Alias) -> Self {
        Filter::Alias(alias)
    }
}

/// A placeholder for a table alias, bound to its canonical alias during translation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub struct Alias {
    pub name: String,
}

impl Alias {
    pub fn new(name: impl Into<String>) -> Self {
        Alias { name: name.into() }
    }
}

/// A reference to an entity. Entities that were never persisted have no id.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EntityRef {
    pub entity: String,
    pub id: Option<serde_json::Value>,
}

/// A boolean tree of conditions against aliases bound by the filter.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpressionFilter {
    And(Vec<ExpressionFilter>),
    Or(Vec<ExpressionFilter>),
    Column(AliasCondition),
    Raw(RawFilter),
}

/// A value filter against a field of an aliased entity.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AliasCondition {
    pub alias: String,
    pub field: String,
    pub filter: Filter,
}

/// A raw SQL condition with `?` placeholders.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawFilter {
    pub condition: String,
    #[serde(default)]
    pub bindings: Vec<serde_json::Value>,
    /// The aliases the condition refers to.
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// An ordering, keyed by field name, nesting through many-to-one fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct OrderBy(pub IndexMap<String, OrderByValue>);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OrderByValue {
    Direction(Direction),
    Nested(OrderBy),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Asc,
    Desc,
}
