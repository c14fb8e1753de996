//! Exact decimal type for the review score and popularity columns.
//!
//! Backed by `rust_decimal` so that equality filters compare exactly what was
//! written to the CSV file, and a reload reproduces the same values.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A decimal score such as an IMDb rating (`9.5`) or a popularity index.
///
/// Values are normalized on construction, so `8.0` and `8` are the same
/// score. Rendering always keeps at least one fractional digit.
///
/// # Examples
///
/// ```
/// use std::str::FromStr;
/// use series_store::Score;
///
/// let score = Score::from_str("9.50").unwrap();
/// assert_eq!(score.to_string(), "9.5");
/// assert_eq!(Score::from_str("8").unwrap().to_string(), "8.0");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Score(Decimal);

impl Score {
    /// Zero value, used for missing cells.
    pub const ZERO: Self = Score(Decimal::ZERO);

    /// Creates a new `Score`, stripping trailing zeros.
    pub fn new(value: Decimal) -> Self {
        Score(value.normalize())
    }

    /// Returns `true` if this value is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Converts a JSON number into a score without going through binary
    /// floating point where the number has a decimal rendering.
    pub fn from_json_number(number: &serde_json::Number) -> Option<Self> {
        if let Some(i) = number.as_i64() {
            return Some(Score::new(Decimal::from(i)));
        }
        if let Some(u) = number.as_u64() {
            return Some(Score::new(Decimal::from(u)));
        }
        number.to_string().parse().ok()
    }

    /// Nearest `f64`, used when rendering JSON responses.
    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or_default()
    }
}

impl FromStr for Score {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        let decimal = Decimal::from_str(trimmed).or_else(|_| Decimal::from_scientific(trimmed))?;
        Ok(Score::new(decimal))
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.scale() == 0 {
            write!(f, "{}.0", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Scores render as JSON numbers, which are binary floating point. Values with
/// more significant digits than an `f64` holds are rounded in responses; the
/// CSV file keeps the exact decimal.
impl Serialize for Score {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(self.to_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_normalizes() {
        assert_eq!(Score::from_str("9.50").unwrap().to_string(), "9.5");
        assert_eq!(Score::from_str("8").unwrap().to_string(), "8.0");
        assert_eq!(Score::from_str("  7.25  ").unwrap().to_string(), "7.25");
        assert_eq!(Score::from_str("0.0").unwrap(), Score::ZERO);
    }

    #[test]
    fn test_equality_ignores_trailing_zeros() {
        assert_eq!(Score::from_str("8.0").unwrap(), Score::from_str("8").unwrap());
        assert_ne!(Score::from_str("8.1").unwrap(), Score::from_str("8").unwrap());
    }

    #[test]
    fn test_from_json_number() {
        let n: serde_json::Number = serde_json::from_str("9.5").unwrap();
        assert_eq!(Score::from_json_number(&n), Some(Score::from_str("9.5").unwrap()));

        let n: serde_json::Number = serde_json::from_str("18").unwrap();
        assert_eq!(Score::from_json_number(&n), Some(Score::from_str("18").unwrap()));

        let n: serde_json::Number = serde_json::from_str("1e2").unwrap();
        assert_eq!(Score::from_json_number(&n), Some(Score::from_str("100").unwrap()));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(Score::from_str("high").is_err());
        assert!(Score::from_str("").is_err());
    }

    #[test]
    fn test_serializes_as_number() {
        let score = Score::from_str("9.5").unwrap();
        assert_eq!(serde_json::to_string(&score).unwrap(), "9.5");
    }

    #[test]
    fn test_serialization_rounds_but_display_is_exact() {
        let score = Score::from_str("0.12345678901234567890").unwrap();
        assert_eq!(score.to_string(), "0.1234567890123456789");
        let rendered = serde_json::to_value(score).unwrap().as_f64().unwrap();
        assert!((rendered - 0.1234567890123456789).abs() < 1e-15);
    }
}
