//! Metadata information regarding the database columns backing entity fields.

use std::collections::{BTreeMap, BTreeSet};

use enum_iterator::Sequence;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The scalar types a column may be declared with.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Sequence, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Boolean,
    Smallint,
    Integer,
    Bigint,
    Real,
    #[serde(rename = "double precision")]
    DoublePrecision,
    Numeric,
    Character,
    #[serde(rename = "character varying")]
    CharacterVarying,
    Text,
    Citext,
    Json,
    Jsonb,
    Date,
    #[serde(rename = "timestamp with time zone")]
    TimestampWithTimeZone,
    #[serde(rename = "timestamp without time zone")]
    TimestampWithoutTimeZone,
    Uuid,
    Any,
}

impl ScalarType {
    const OPERATORS_SUPPORTED_BY_ALL_TYPES: &'static [ComparisonOperator] = &[
        ComparisonOperator::Equals,
        ComparisonOperator::NotEquals,
        ComparisonOperator::LessThan,
        ComparisonOperator::LessThanOrEqualTo,
        ComparisonOperator::GreaterThan,
        ComparisonOperator::GreaterThanOrEqualTo,
        ComparisonOperator::In,
        ComparisonOperator::NotIn,
        ComparisonOperator::Between,
        ComparisonOperator::IsNull,
        ComparisonOperator::IsNotNull,
    ];

    const STRING_OPERATORS: &'static [ComparisonOperator] = &[
        ComparisonOperator::Like,
        ComparisonOperator::NotLike,
        ComparisonOperator::CaseInsensitiveLike,
        ComparisonOperator::NotCaseInsensitiveLike,
    ];

    const ARRAY_OPERATORS: &'static [ComparisonOperator] = &[
        ComparisonOperator::Equals,
        ComparisonOperator::NotEquals,
        ComparisonOperator::IsNull,
        ComparisonOperator::IsNotNull,
        ComparisonOperator::Contains,
        ComparisonOperator::ContainedBy,
        ComparisonOperator::Overlaps,
        ComparisonOperator::NotContains,
        ComparisonOperator::NotOverlaps,
    ];

    /// Returns the complete set of comparison operators for a scalar column of the given type.
    pub fn comparison_operators(&self) -> BTreeSet<ComparisonOperator> {
        let mut operators =
            BTreeSet::from_iter(Self::OPERATORS_SUPPORTED_BY_ALL_TYPES.iter().copied());
        operators.extend(match self {
            ScalarType::Character
            | ScalarType::CharacterVarying
            | ScalarType::Text
            | ScalarType::Citext
            | ScalarType::Any => Self::STRING_OPERATORS.iter(),
            _ => [].iter(),
        });
        operators
    }

    /// Returns the complete set of comparison operators for an array column of the given type.
    pub fn array_comparison_operators(&self) -> BTreeSet<ComparisonOperator> {
        BTreeSet::from_iter(Self::ARRAY_OPERATORS.iter().copied())
    }
}

impl std::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ScalarType::DoublePrecision => write!(f, "double precision"),
            ScalarType::CharacterVarying => write!(f, "character varying"),
            ScalarType::TimestampWithTimeZone => write!(f, "timestamp with time zone"),
            ScalarType::TimestampWithoutTimeZone => write!(f, "timestamp without time zone"),
            _ => write!(f, "{}", format!("{self:?}").to_lowercase()),
        }
    }
}

/// The complete list of operators a filter may apply to a column.
/// Not all of these are supported for every column.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Sequence,
    Serialize,
    Deserialize,
    JsonSchema,
)]
pub enum ComparisonOperator {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
    In,
    NotIn,
    Between,
    IsNull,
    IsNotNull,
    Like,
    NotLike,
    CaseInsensitiveLike,
    NotCaseInsensitiveLike,
    Contains,
    ContainedBy,
    Overlaps,
    NotContains,
    NotOverlaps,
}

impl ComparisonOperator {
    /// The name of the operator as written in a filter.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Equals => "eq",
            Self::NotEquals => "ne",
            Self::LessThan => "lt",
            Self::LessThanOrEqualTo => "lte",
            Self::GreaterThan => "gt",
            Self::GreaterThanOrEqualTo => "gte",
            Self::In => "in",
            Self::NotIn => "nin",
            Self::Between => "between",
            Self::IsNull => "is-null",
            Self::IsNotNull => "not-null",
            Self::Like => "like",
            Self::NotLike => "nlike",
            Self::CaseInsensitiveLike => "ilike",
            Self::NotCaseInsensitiveLike => "nilike",
            Self::Contains => "contains",
            Self::ContainedBy => "containedBy",
            Self::Overlaps => "overlaps",
            Self::NotContains => "ncontains",
            Self::NotOverlaps => "noverlaps",
        }
    }

    /// Look up an operator by the name used in filters.
    pub fn from_name(name: &str) -> Option<Self> {
        enum_iterator::all::<Self>().find(|operator| operator.name() == name)
    }
}

impl std::fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// How a domain value is turned into the value stored in the column.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ColumnSerde {
    /// The value is stored as is, after checking it against the column type.
    #[default]
    Primitive,
    /// A tagged id such as `a:1`, stored as the number after the tag.
    Key { tag_name: String },
    /// An enum code, stored as the id of the enum row.
    Enum { codes: BTreeMap<String, i64> },
}

/// Information about a database column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnInfo {
    pub column_name: String,
    pub r#type: ScalarType,
    #[serde(default)]
    pub is_array: bool,
    #[serde(default)]
    pub serde: ColumnSerde,
}

impl ColumnInfo {
    /// The operators a filter may apply to this column.
    pub fn comparison_operators(&self) -> BTreeSet<ComparisonOperator> {
        if self.is_array {
            self.r#type.array_comparison_operators()
        } else {
            self.r#type.comparison_operators()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_all_comparison_operators_are_used() {
        // This is the set of all operators reachable from some column.
        let exposed_operators = enum_iterator::all::<ScalarType>()
            .flat_map(|scalar_type| {
                let mut operators = scalar_type.comparison_operators();
                operators.extend(scalar_type.array_comparison_operators());
                operators
            })
            .collect::<BTreeSet<ComparisonOperator>>();

        for operator in enum_iterator::all::<ComparisonOperator>() {
            assert!(
                exposed_operators.contains(&operator),
                "The operator {operator:?} is not exposed anywhere."
            );
        }
    }

    #[test]
    fn operator_names_round_trip() {
        for operator in enum_iterator::all::<ComparisonOperator>() {
            assert_eq!(ComparisonOperator::from_name(operator.name()), Some(operator));
        }
        assert_eq!(ComparisonOperator::from_name("regex"), None);
    }

    #[test]
    fn string_operators_only_on_text_columns() {
        let text = ColumnInfo {
            column_name: "first_name".to_string(),
            r#type: ScalarType::Text,
            is_array: false,
            serde: ColumnSerde::Primitive,
        };
        let int = ColumnInfo {
            r#type: ScalarType::Integer,
            ..text.clone()
        };
        assert!(text
            .comparison_operators()
            .contains(&ComparisonOperator::CaseInsensitiveLike));
        assert!(!int
            .comparison_operators()
            .contains(&ComparisonOperator::CaseInsensitiveLike));
    }

    #[test]
    fn array_columns_use_containment_operators() {
        let tags = ColumnInfo {
            column_name: "nick_names".to_string(),
            r#type: ScalarType::Text,
            is_array: true,
            serde: ColumnSerde::Primitive,
        };
        let operators = tags.comparison_operators();
        assert!(operators.contains(&ComparisonOperator::Contains));
        assert!(!operators.contains(&ComparisonOperator::In));
        assert!(!operators.contains(&ComparisonOperator::NotIn));
    }

    #[test]
    fn column_serde_defaults_to_primitive() {
        let column: ColumnInfo =
            serde_json::from_str(r#"{ "column_name": "title", "type": "text" }"#).unwrap();
        assert_eq!(column.serde, ColumnSerde::Primitive);
        assert!(!column.is_array);
    }
}
