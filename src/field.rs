//! The closed record schema: field names, value kinds and JSON coercion.

use crate::score::Score;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// One column of the series schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Id,
    Title,
    Order,
    PremiereYear,
    EndYear,
    Episodes,
    Rating,
    Score,
    Link,
    Popularity,
    Cast,
}

/// Storage type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Integer,
    Decimal,
    Text,
    List,
}

impl Field {
    /// Every field, in column order.
    pub const ALL: [Field; 11] = [
        Field::Id,
        Field::Title,
        Field::Order,
        Field::PremiereYear,
        Field::EndYear,
        Field::Episodes,
        Field::Rating,
        Field::Score,
        Field::Link,
        Field::Popularity,
        Field::Cast,
    ];

    /// Fields a create request must supply.
    pub const REQUIRED: [Field; 8] = [
        Field::Title,
        Field::Order,
        Field::PremiereYear,
        Field::Episodes,
        Field::Rating,
        Field::Score,
        Field::Link,
        Field::Popularity,
    ];

    /// Canonical name, as used in request bodies and the CSV header.
    pub fn name(self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Title => "title",
            Field::Order => "order",
            Field::PremiereYear => "premiere_year",
            Field::EndYear => "end_year",
            Field::Episodes => "episodes",
            Field::Rating => "rating",
            Field::Score => "score",
            Field::Link => "link",
            Field::Popularity => "popularity",
            Field::Cast => "cast",
        }
    }

    pub fn kind(self) -> Kind {
        match self {
            Field::Id
            | Field::Order
            | Field::PremiereYear
            | Field::EndYear
            | Field::Episodes
            | Field::Rating => Kind::Integer,
            Field::Score | Field::Popularity => Kind::Decimal,
            Field::Title | Field::Link => Kind::Text,
            Field::Cast => Kind::List,
        }
    }

    pub fn is_required(self) -> bool {
        Field::REQUIRED.contains(&self)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parses a canonical field name. Legacy column headers are only understood
/// by the CSV loader, not here.
impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Field::ALL
            .iter()
            .copied()
            .find(|field| field.name() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// A typed value held by one field of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Decimal(Score),
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    /// The value a missing cell is coerced to.
    pub fn default_for(kind: Kind) -> Self {
        match kind {
            Kind::Integer => FieldValue::Integer(0),
            Kind::Decimal => FieldValue::Decimal(Score::ZERO),
            Kind::Text => FieldValue::Text(String::new()),
            Kind::List => FieldValue::List(Vec::new()),
        }
    }

    /// Coerces a JSON value from a create/update body into the field's type.
    ///
    /// Numbers and numeric strings are accepted for numeric fields; integer
    /// fields reject values with a fractional part. Text is trimmed, the way
    /// the CSV loader reads it back. Numbers are accepted for text fields and
    /// rendered as-is. Cast names must be non-blank and free of
    /// [`CAST_SEPARATOR`]. `null` resets the field to its default.
    pub fn coerce(field: Field, value: &Value) -> std::result::Result<Self, String> {
        let kind = field.kind();
        if value.is_null() {
            return Ok(FieldValue::default_for(kind));
        }

        match kind {
            Kind::Integer => match value {
                Value::Number(n) => integer_from_number(n)
                    .map(FieldValue::Integer)
                    .ok_or_else(|| format!("expected an integer, found {}", n)),
                Value::String(s) => parse_integer(s)
                    .map(FieldValue::Integer)
                    .ok_or_else(|| format!("expected an integer, found \"{}\"", s)),
                other => Err(format!("expected an integer, found {}", other)),
            },
            Kind::Decimal => match value {
                Value::Number(n) => Score::from_json_number(n)
                    .map(FieldValue::Decimal)
                    .ok_or_else(|| format!("expected a number, found {}", n)),
                Value::String(s) => Score::from_str(s)
                    .map(FieldValue::Decimal)
                    .map_err(|_| format!("expected a number, found \"{}\"", s)),
                other => Err(format!("expected a number, found {}", other)),
            },
            Kind::Text => match value {
                Value::String(s) => Ok(FieldValue::Text(s.trim().to_string())),
                Value::Number(n) => Ok(FieldValue::Text(n.to_string())),
                other => Err(format!("expected a string, found {}", other)),
            },
            Kind::List => match value {
                Value::Array(items) => items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => cast_name(s),
                        other => Err(format!("expected a list of strings, found {}", other)),
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map(FieldValue::List),
                other => Err(format!("expected a list of strings, found {}", other)),
            },
        }
    }

    /// Strict equality against a filter value.
    ///
    /// Numbers compare numerically, strings exactly, lists element by element
    /// in order. A value of the wrong JSON type never matches. `null` matches
    /// the field's default value.
    pub fn matches(&self, expected: &Value) -> bool {
        match (self, expected) {
            (FieldValue::Integer(actual), Value::Null) => *actual == 0,
            (FieldValue::Decimal(actual), Value::Null) => actual.is_zero(),
            (FieldValue::Text(actual), Value::Null) => actual.is_empty(),
            (FieldValue::List(actual), Value::Null) => actual.is_empty(),
            (FieldValue::Integer(actual), Value::Number(n)) => {
                Score::from_json_number(n) == Some(Score::new((*actual).into()))
            }
            (FieldValue::Decimal(actual), Value::Number(n)) => {
                Score::from_json_number(n).as_ref() == Some(actual)
            }
            (FieldValue::Text(actual), Value::String(s)) => actual == s,
            (FieldValue::List(actual), Value::Array(items)) => {
                actual.len() == items.len()
                    && actual
                        .iter()
                        .zip(items)
                        .all(|(name, item)| item.as_str() == Some(name.as_str()))
            }
            _ => false,
        }
    }
}

/// Separator between cast members inside the single CSV cast column.
pub const CAST_SEPARATOR: &str = "|";

fn cast_name(name: &str) -> std::result::Result<String, String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        Err("cast names must not be blank".to_string())
    } else if trimmed.contains(CAST_SEPARATOR) {
        Err(format!(
            "cast name \"{}\" must not contain '{}'",
            trimmed, CAST_SEPARATOR
        ))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Parses an integer cell, accepting a zero-fraction float rendering such as
/// `2013.0`.
pub fn parse_integer(s: &str) -> Option<i64> {
    let trimmed = s.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(i);
    }
    let f = trimmed.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn integer_from_number(n: &serde_json::Number) -> Option<i64> {
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    let f = n.as_f64()?;
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}
