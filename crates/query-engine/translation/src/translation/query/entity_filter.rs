//! Classify the filter attached to an entity or a relation.

use indexmap::IndexMap;
use query_engine_sql::sql::ast::ValueFilter;

use super::values::{entity_id, parse_value_filter};
use crate::translation::error::Error;
use crate::translation::models::{Alias, Filter};

/// What a filter on an entity asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityFilter<'f> {
    /// Nothing: every row matches.
    Absent,
    /// Only binds an alias to the entity's table.
    Alias(&'f Alias),
    /// A match on the entity's id. The conditions are ANDed.
    Match(Vec<ValueFilter<serde_json::Value>>),
    /// Conditions on the entity's own fields, which requires its table.
    Join(&'f IndexMap<String, Filter>),
}

/// Parse an entity filter, which could be "just an id", a list of ids, or a nested filter.
pub fn parse_entity_filter(filter: &Filter) -> Result<EntityFilter<'_>, Error> {
    match filter {
        // Omitting a relation filter matches everything, it does not mean "must be null"
        Filter::Undefined => Ok(EntityFilter::Absent),
        Filter::Alias(alias) => Ok(EntityFilter::Alias(alias)),
        Filter::Object(map) if map.len() == 1 && map.contains_key("ne") => {
            Ok(match &map["ne"] {
                Filter::Undefined => EntityFilter::Absent,
                Filter::Null => EntityFilter::Match(vec![ValueFilter::NotNull]),
                Filter::List(items) => {
                    EntityFilter::Match(vec![ValueFilter::NotIn(ids(items)?)])
                }
                value => EntityFilter::Match(vec![ValueFilter::Ne(id(value)?)]),
            })
        }
        Filter::Object(map) if map.len() == 1 && map.contains_key("id") => match &map["id"] {
            Filter::Undefined => Ok(EntityFilter::Absent),
            Filter::Object(_) => {
                let value_filters = parse_value_filter(&map["id"])?;
                Ok(if value_filters.is_empty() {
                    EntityFilter::Absent
                } else {
                    EntityFilter::Match(value_filters)
                })
            }
            value => parse_id_match(value),
        },
        Filter::Object(map) => Ok(EntityFilter::Join(map)),
        value => parse_id_match(value),
    }
}

fn parse_id_match(filter: &Filter) -> Result<EntityFilter<'_>, Error> {
    Ok(EntityFilter::Match(vec![match filter {
        Filter::Null => ValueFilter::IsNull,
        Filter::List(items) => ValueFilter::In(ids(items)?),
        value => ValueFilter::Eq(id(value)?),
    }]))
}

fn id(filter: &Filter) -> Result<serde_json::Value, Error> {
    match filter {
        Filter::Value(value @ (serde_json::Value::String(_) | serde_json::Value::Number(_))) => {
            Ok(value.clone())
        }
        Filter::Entity(entity) => Ok(entity_id(entity)),
        _ => Err(Error::MalformedFilter(format!(
            "expected an id or an entity, found {filter:?}"
        ))),
    }
}

fn ids(items: &[Filter]) -> Result<Vec<serde_json::Value>, Error> {
    items.iter().map(id).collect()
}
