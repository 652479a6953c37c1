//! # Field Values
//!
//! Every numeric cell of a row is a [`FieldValue`]: a finite number, or the
//! *empty* sentinel for a cell the user never filled in. Empty is distinct
//! from zero: it counts as 0 in arithmetic but is shown as a blank cell.
//!
//! On the wire a field is either a JSON number or the empty string `""`,
//! matching the persisted document format. Any other string (hand-edited
//! files, foreign data) is kept verbatim so a load/save cycle never rewrites
//! it, and is coerced to a number only when a calculation needs one.
//!
//! ## Example
//!
//! ```rust
//! use rate_core::value::FieldValue;
//!
//! let blank = FieldValue::parse_input("discount", "   ").unwrap();
//! assert!(blank.is_empty());
//! assert_eq!(blank.value(), 0.0);
//!
//! let rate = FieldValue::parse_input("basicRate", "120.5").unwrap();
//! assert_eq!(rate.value(), 120.5);
//! assert!(FieldValue::parse_input("basicRate", "12abc").is_err());
//! ```

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{RateError, RateResult};

/// One numeric cell of a row.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    /// No input yet
    #[default]
    Empty,
    /// A number entered by the user or derived by the calculator
    Number(f64),
    /// A non-empty string found in persisted data, preserved as-is
    Text(String),
}

impl FieldValue {
    /// Parse user input for a field.
    ///
    /// Blank input is [`FieldValue::Empty`]; anything else must parse as a
    /// finite number.
    pub fn parse_input(field: &str, input: &str) -> RateResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(FieldValue::Empty);
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(FieldValue::Number(n)),
            _ => Err(RateError::invalid_input(field, input, "Expected a number or an empty value")),
        }
    }

    /// Numeric value for arithmetic: empty and non-numeric values are 0.
    pub fn value(&self) -> f64 {
        match self {
            FieldValue::Empty => 0.0,
            FieldValue::Number(n) if n.is_finite() => *n,
            FieldValue::Number(_) => 0.0,
            FieldValue::Text(s) => match s.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => n,
                _ => 0.0,
            },
        }
    }

    /// True only for the empty sentinel.
    pub fn is_empty(&self) -> bool {
        matches!(self, FieldValue::Empty)
    }

    /// Raw display text: empty cells render as an empty string, not "0".
    pub fn display(&self) -> String {
        match self {
            FieldValue::Empty => String::new(),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Text(s) => s.clone(),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Empty => serializer.serialize_str(""),
            FieldValue::Number(n) => serialize_number(n, serializer),
            FieldValue::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// Largest integer an f64 holds exactly
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Write whole numbers without a fraction (`100`, not `100.0`), matching
/// documents written by earlier versions. Non-finite numbers become `null`.
pub(crate) fn serialize_number<S: Serializer>(n: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        serializer.serialize_i64(*n as i64)
    } else {
        serializer.serialize_f64(*n)
    }
}

struct FieldValueVisitor;

impl<'de> Visitor<'de> for FieldValueVisitor {
    type Value = FieldValue;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a number, an empty string, or null")
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<FieldValue, E> {
        Ok(FieldValue::Number(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<FieldValue, E> {
        Ok(FieldValue::Number(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<FieldValue, E> {
        Ok(FieldValue::Number(v as f64))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<FieldValue, E> {
        if v.is_empty() {
            Ok(FieldValue::Empty)
        } else {
            Ok(FieldValue::Text(v.to_string()))
        }
    }

    fn visit_unit<E: de::Error>(self) -> Result<FieldValue, E> {
        Ok(FieldValue::Empty)
    }

    fn visit_none<E: de::Error>(self) -> Result<FieldValue, E> {
        Ok(FieldValue::Empty)
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FieldValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_not_zero() {
        let empty = FieldValue::Empty;
        let zero = FieldValue::Number(0.0);
        assert_eq!(empty.value(), zero.value());
        assert_ne!(empty, zero);
        assert_eq!(empty.display(), "");
        assert_eq!(zero.display(), "0");
    }

    #[test]
    fn test_parse_input() {
        assert_eq!(FieldValue::parse_input("f", "").unwrap(), FieldValue::Empty);
        assert_eq!(FieldValue::parse_input("f", " 5 ").unwrap(), FieldValue::Number(5.0));
        assert_eq!(FieldValue::parse_input("f", "-2.25").unwrap(), FieldValue::Number(-2.25));

        let err = FieldValue::parse_input("taxPercent", "five").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
        assert!(FieldValue::parse_input("f", "inf").is_err());
        assert!(FieldValue::parse_input("f", "NaN").is_err());
    }

    #[test]
    fn test_text_coercion() {
        assert_eq!(FieldValue::Text("12".to_string()).value(), 12.0);
        assert_eq!(FieldValue::Text("abc".to_string()).value(), 0.0);
        assert_eq!(FieldValue::Number(f64::NAN).value(), 0.0);
    }

    #[test]
    fn test_wire_format() {
        let values = vec![
            FieldValue::Empty,
            FieldValue::Number(97.5),
            FieldValue::Number(3.0),
            FieldValue::Text("n/a".to_string()),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"["",97.5,3,"n/a"]"#);

        let roundtrip: Vec<FieldValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(roundtrip, values);
    }

    #[test]
    fn test_null_reads_as_empty() {
        let value: FieldValue = serde_json::from_str("null").unwrap();
        assert!(value.is_empty());
        let value: FieldValue = serde_json::from_str("7").unwrap();
        assert_eq!(value, FieldValue::Number(7.0));
    }

    #[test]
    fn test_non_finite_numbers_write_null() {
        let json = serde_json::to_string(&FieldValue::Number(f64::INFINITY)).unwrap();
        assert_eq!(json, "null");
        let json = serde_json::to_string(&FieldValue::Number(-4.0)).unwrap();
        assert_eq!(json, "-4");
    }

    #[test]
    fn test_bool_is_rejected() {
        assert!(serde_json::from_str::<FieldValue>("true").is_err());
    }
}
