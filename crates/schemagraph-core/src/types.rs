use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Base SQL type of a column, independent of any engine's spelling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    SmallInt,
    Integer,
    BigInt,
    Decimal,
    Numeric,
    Real,
    Double,
    Boolean,
    Char,
    Varchar,
    Text,
    Date,
    Time,
    Timestamp,
    Binary,
    Blob,
    Uuid,
    /// Engine specific type name kept verbatim.
    Other(String),
}

/// Families of types whose values can be stored in one another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeFamily {
    Integral,
    Exact,
    Approximate,
    Boolean,
    Character,
    Date,
    Time,
    Timestamp,
    Binary,
    Uuid,
}

impl DataType {
    /// Returns true when a column of this type can hold values of `other`
    /// without a conversion, e.g. `integer` and `bigint`.
    pub fn is_compatible_with(&self, other: &DataType) -> bool {
        match (self, other) {
            (DataType::Other(a), DataType::Other(b)) => a.eq_ignore_ascii_case(b),
            (DataType::Other(_), _) | (_, DataType::Other(_)) => false,
            _ => self.family() == other.family(),
        }
    }

    fn family(&self) -> Option<TypeFamily> {
        let family = match self {
            DataType::SmallInt | DataType::Integer | DataType::BigInt => TypeFamily::Integral,
            DataType::Decimal | DataType::Numeric => TypeFamily::Exact,
            DataType::Real | DataType::Double => TypeFamily::Approximate,
            DataType::Boolean => TypeFamily::Boolean,
            DataType::Char | DataType::Varchar | DataType::Text => TypeFamily::Character,
            DataType::Date => TypeFamily::Date,
            DataType::Time => TypeFamily::Time,
            DataType::Timestamp => TypeFamily::Timestamp,
            DataType::Binary | DataType::Blob => TypeFamily::Binary,
            DataType::Uuid => TypeFamily::Uuid,
            DataType::Other(_) => return None,
        };
        Some(family)
    }
}

/// Whether a column accepts `NULL`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Nullability {
    NotNull,
    #[default]
    Nullable,
    Unknown,
}

/// Referential action for updates and deletes of parent rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FkAction {
    #[default]
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

/// Deferrability of a foreign key constraint check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Deferrability {
    #[default]
    NotDeferrable,
    InitiallyDeferred,
    InitiallyImmediate,
}

/// Multiplicity of one side of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    ZeroOrOne,
    One,
    ZeroOrMore,
    OneOrMore,
}
