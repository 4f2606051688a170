//! Handle the translation of filter values.

use query_engine_metadata::metadata::{database, ColumnInfo, ColumnSerde, ComparisonOperator};
use query_engine_sql::sql;
use sql::ast::ValueFilter;

use crate::translation::error::Error;
use crate::translation::models::{EntityRef, Filter};

/// The id standing in for entities that were never persisted. No row has it.
pub const UNPERSISTED_ID: i64 = -1;

/// The id of a referenced entity, in its domain representation.
pub fn entity_id(entity: &EntityRef) -> serde_json::Value {
    entity
        .id
        .clone()
        .unwrap_or_else(|| serde_json::Value::from(UNPERSISTED_ID))
}

fn domain_value(filter: &Filter) -> Result<serde_json::Value, Error> {
    match filter {
        Filter::Value(value) => Ok(value.clone()),
        Filter::Null => Ok(serde_json::Value::Null),
        Filter::Entity(entity) => Ok(entity_id(entity)),
        Filter::List(items) => items
            .iter()
            .map(domain_value)
            .collect::<Result<Vec<_>, _>>()
            .map(serde_json::Value::Array),
        Filter::Undefined | Filter::Alias(_) | Filter::Object(_) => Err(Error::MalformedFilter(
            format!("expected a value, found {filter:?}"),
        )),
    }
}

fn domain_values(filter: &Filter) -> Result<Vec<serde_json::Value>, Error> {
    match filter {
        Filter::List(items) => items.iter().map(domain_value).collect(),
        _ => Err(Error::MalformedFilter(format!(
            "expected a list of values, found {filter:?}"
        ))),
    }
}

/// Parse a filter on a single value into the conditions it stands for. The conditions are
/// meant to be ANDed together; an empty result matches everything.
pub fn parse_value_filter(filter: &Filter) -> Result<Vec<ValueFilter<serde_json::Value>>, Error> {
    match filter {
        Filter::Null => Ok(vec![ValueFilter::IsNull]),
        // No filter matches every row
        Filter::Undefined => Ok(vec![]),
        Filter::List(_) => Ok(vec![ValueFilter::In(domain_values(filter)?)]),
        Filter::Value(_) | Filter::Entity(_) => Ok(vec![ValueFilter::Eq(domain_value(filter)?)]),
        Filter::Alias(alias) => Err(Error::MalformedFilter(format!(
            "alias '{}' cannot be compared to a value",
            alias.name
        ))),
        Filter::Object(map) => {
            if map.len() == 2 {
                // `{ op: "gt", value: 1 }`
                if let (Some(op), Some(value)) = (map.get("op"), map.get("value")) {
                    let Filter::Value(serde_json::Value::String(op)) = op else {
                        return Err(Error::MalformedFilter(format!(
                            "'op' must name an operator, found {op:?}"
                        )));
                    };
                    return match value {
                        Filter::Null => Ok(vec![ValueFilter::IsNull]),
                        value => Ok(vec![operator_filter(op, value)?]),
                    };
                }
                // `{ gte: 1, lte: 10 }`
                if let (Some(low), Some(high)) = (map.get("gte"), map.get("lte")) {
                    if !matches!(low, Filter::Undefined) && !matches!(high, Filter::Undefined) {
                        return Ok(vec![ValueFilter::Between(
                            domain_value(low)?,
                            domain_value(high)?,
                        )]);
                    }
                }
            }
            map.iter()
                .filter(|(_, value)| !matches!(value, Filter::Undefined))
                .map(|(key, value)| operator_filter(key, value))
                .collect()
        }
    }
}

fn operator_filter(key: &str, value: &Filter) -> Result<ValueFilter<serde_json::Value>, Error> {
    Ok(match key {
        "eq" if matches!(value, Filter::Null) => ValueFilter::IsNull,
        "ne" if matches!(value, Filter::Null) => ValueFilter::NotNull,
        "eq" => ValueFilter::Eq(domain_value(value)?),
        "ne" => ValueFilter::Ne(domain_value(value)?),
        "gt" => ValueFilter::Gt(domain_value(value)?),
        "gte" => ValueFilter::Gte(domain_value(value)?),
        "lt" => ValueFilter::Lt(domain_value(value)?),
        "lte" => ValueFilter::Lte(domain_value(value)?),
        "like" => ValueFilter::Like(domain_value(value)?),
        "nlike" => ValueFilter::NotLike(domain_value(value)?),
        "ilike" => ValueFilter::ILike(domain_value(value)?),
        "nilike" => ValueFilter::NotILike(domain_value(value)?),
        "contains" => ValueFilter::Contains(domain_value(value)?),
        "containedBy" => ValueFilter::ContainedBy(domain_value(value)?),
        "overlaps" => ValueFilter::Overlaps(domain_value(value)?),
        "ncontains" => ValueFilter::NotContains(domain_value(value)?),
        "noverlaps" => ValueFilter::NotOverlaps(domain_value(value)?),
        "in" => ValueFilter::In(domain_values(value)?),
        "nin" => ValueFilter::NotIn(domain_values(value)?),
        "between" => match <[_; 2]>::try_from(domain_values(value)?) {
            Ok([low, high]) => ValueFilter::Between(low, high),
            Err(values) => {
                return Err(Error::MalformedFilter(format!(
                    "between takes two values, found {}",
                    values.len()
                )))
            }
        },
        _ => {
            return Err(Error::MalformedFilter(format!(
                "unsupported value filter key '{key}'"
            )))
        }
    })
}

/// Convert the domain values of a filter into the values stored in the column, and check that
/// the column supports the resulting operator.
pub fn map_to_db(
    field: &str,
    column: &ColumnInfo,
    filter: ValueFilter<serde_json::Value>,
) -> Result<ValueFilter<sql::ast::Value>, Error> {
    let filter = if column.is_array {
        // Arrays need a special operator
        match filter {
            ValueFilter::In(values) => ValueFilter::Contains(serde_json::Value::Array(values)),
            ValueFilter::Eq(value) if !value.is_array() => {
                ValueFilter::Contains(serde_json::Value::Array(vec![value]))
            }
            ValueFilter::NotIn(_) => {
                return Err(Error::UnsupportedOperator {
                    field: field.to_string(),
                    operator: "nin".to_string(),
                })
            }
            filter => filter,
        }
    } else {
        filter
    };
    check_operator(field, column, &filter)?;
    filter.try_map(|value| translate_json_value(column, &value))
}

fn check_operator<V>(
    field: &str,
    column: &ColumnInfo,
    filter: &ValueFilter<V>,
) -> Result<(), Error> {
    let supported = ComparisonOperator::from_name(filter.name())
        .is_some_and(|operator| column.comparison_operators().contains(&operator));
    if supported {
        Ok(())
    } else {
        Err(Error::UnsupportedOperator {
            field: field.to_string(),
            operator: filter.name().to_string(),
        })
    }
}

/// Convert a JSON value into the value stored in a column.
pub fn translate_json_value(
    column: &ColumnInfo,
    value: &serde_json::Value,
) -> Result<sql::ast::Value, Error> {
    match (&column.serde, value) {
        (_, serde_json::Value::Null) => Ok(sql::ast::Value::Null),
        (ColumnSerde::Primitive, _)
            if matches!(
                column.r#type,
                database::ScalarType::Json | database::ScalarType::Jsonb
            ) =>
        {
            Ok(sql::ast::Value::Json(value.clone()))
        }
        (_, serde_json::Value::Array(items)) => items
            .iter()
            .map(|item| translate_json_value(column, item))
            .collect::<Result<Vec<_>, _>>()
            .map(sql::ast::Value::Array),
        (ColumnSerde::Key { tag_name }, _) => key_to_db(tag_name, value),
        (ColumnSerde::Enum { codes }, serde_json::Value::String(code)) => codes
            .get(code)
            .map(|id| sql::ast::Value::Int(*id))
            .ok_or_else(|| Error::UnknownEnumCode {
                value: code.clone(),
                column: column.column_name.clone(),
            }),
        (ColumnSerde::Enum { .. }, serde_json::Value::Number(number)) => number
            .as_i64()
            .map(sql::ast::Value::Int)
            .ok_or_else(|| type_mismatch(value, column.r#type)),
        (ColumnSerde::Enum { .. }, _) => Err(type_mismatch(value, column.r#type)),
        (ColumnSerde::Primitive, _) => primitive_to_db(value, column.r#type),
    }
}

/// Tagged ids like `a:1` are stored as `1`. Untagged ids pass through.
fn key_to_db(tag_name: &str, value: &serde_json::Value) -> Result<sql::ast::Value, Error> {
    let id = match value {
        serde_json::Value::Number(number) => number.as_i64(),
        serde_json::Value::String(id) => match id.split_once(':') {
            Some((tag, id)) if tag == tag_name => id.parse().ok(),
            Some(_) => None,
            None => id.parse().ok(),
        },
        _ => None,
    };
    id.map(sql::ast::Value::Int).ok_or_else(|| Error::InvalidId {
        value: value.to_string(),
        expected_tag: tag_name.to_string(),
    })
}

fn primitive_to_db(
    value: &serde_json::Value,
    scalar_type: database::ScalarType,
) -> Result<sql::ast::Value, Error> {
    match value {
        // numbers
        serde_json::Value::Number(number) => match scalar_type {
            database::ScalarType::Smallint
            | database::ScalarType::Integer
            | database::ScalarType::Bigint => number
                .as_i64()
                .map(sql::ast::Value::Int)
                .ok_or_else(|| type_mismatch(value, scalar_type)),
            database::ScalarType::Real
            | database::ScalarType::DoublePrecision
            | database::ScalarType::Numeric => number
                .as_f64()
                .map(sql::ast::Value::Float)
                .ok_or_else(|| type_mismatch(value, scalar_type)),
            database::ScalarType::Any => Ok(json_to_value(value)),
            _ => Err(type_mismatch(value, scalar_type)),
        },

        // booleans
        serde_json::Value::Bool(b) => match scalar_type {
            database::ScalarType::Boolean | database::ScalarType::Any => {
                Ok(sql::ast::Value::Bool(*b))
            }
            _ => Err(type_mismatch(value, scalar_type)),
        },

        // strings
        serde_json::Value::String(s) => match scalar_type {
            database::ScalarType::Character
            | database::ScalarType::CharacterVarying
            | database::ScalarType::Text
            | database::ScalarType::Citext
            | database::ScalarType::Any => Ok(sql::ast::Value::String(s.clone())),

            // the database parses these from their string form
            database::ScalarType::Numeric
            | database::ScalarType::Date
            | database::ScalarType::TimestampWithTimeZone
            | database::ScalarType::TimestampWithoutTimeZone
            | database::ScalarType::Uuid => Ok(sql::ast::Value::String(s.clone())),

            _ => Err(type_mismatch(value, scalar_type)),
        },

        serde_json::Value::Object(_) if scalar_type == database::ScalarType::Any => {
            Ok(sql::ast::Value::Json(value.clone()))
        }
        _ => Err(type_mismatch(value, scalar_type)),
    }
}

fn type_mismatch(value: &serde_json::Value, scalar_type: database::ScalarType) -> Error {
    Error::TypeMismatch {
        value: value.clone(),
        scalar_type,
    }
}

/// Convert a JSON value into a SQL value without any column to guide it, i.e. for the bindings
/// of raw conditions.
pub fn json_to_value(value: &serde_json::Value) -> sql::ast::Value {
    match value {
        serde_json::Value::Null => sql::ast::Value::Null,
        serde_json::Value::Bool(b) => sql::ast::Value::Bool(*b),
        serde_json::Value::Number(number) => match (number.as_i64(), number.as_f64()) {
            (Some(int), _) => sql::ast::Value::Int(int),
            (None, Some(float)) => sql::ast::Value::Float(float),
            (None, None) => sql::ast::Value::Json(value.clone()),
        },
        serde_json::Value::String(s) => sql::ast::Value::String(s.clone()),
        serde_json::Value::Array(items) => {
            sql::ast::Value::Array(items.iter().map(json_to_value).collect())
        }
        serde_json::Value::Object(_) => sql::ast::Value::Json(value.clone()),
    }
}
