//! # Auto-Commission
//!
//! Derives a row's commission from its basic rate and discount using a
//! panel's two configured percentages:
//!
//! ```text
//! net    = max(0, basic_rate - discount)
//! stage1 = net * rate1 / 100
//! result = stage1 * (1 - rate2 / 100)
//! ```
//!
//! `rate2` reduces the markup stage; it is not a second percentage of the
//! net. Unlike the row result, the net is floored at zero so a discount
//! larger than the basic rate never yields a negative commission.
//!
//! ## Example
//!
//! ```rust
//! use rate_core::calculations::commission::compute_auto_commission;
//! use rate_core::value::FieldValue;
//!
//! let commission = compute_auto_commission(
//!     &FieldValue::Number(100.0),
//!     &FieldValue::Number(10.0),
//!     1.5,
//!     12.0,
//! );
//! assert_eq!(commission, 1.19);
//! ```

use serde::{Deserialize, Serialize};

use super::{round_to, MONEY_DIGITS};
use crate::value::{serialize_number, FieldValue};

/// Default markup percentage for new and migrated panels
pub const DEFAULT_RATE1: f64 = 1.5;

/// Default reduction percentage for new and migrated panels
pub const DEFAULT_RATE2: f64 = 12.0;

/// The two percentages a panel uses to derive commissions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommissionSettings {
    /// Markup stage, percent of the net
    #[serde(serialize_with = "serialize_number")]
    pub rate1: f64,
    /// Reduction stage, percent taken off the markup result
    #[serde(serialize_with = "serialize_number")]
    pub rate2: f64,
}

impl CommissionSettings {
    pub fn new(rate1: f64, rate2: f64) -> Self {
        CommissionSettings { rate1, rate2 }
    }

    /// Commission for one row's basic rate and discount under these rates.
    pub fn commission_for(&self, basic_rate: &FieldValue, discount: &FieldValue) -> f64 {
        compute_auto_commission(basic_rate, discount, self.rate1, self.rate2)
    }
}

impl Default for CommissionSettings {
    fn default() -> Self {
        CommissionSettings {
            rate1: DEFAULT_RATE1,
            rate2: DEFAULT_RATE2,
        }
    }
}

/// Compute the auto-commission, rounded to 2 fraction digits.
///
/// Empty and non-numeric inputs count as 0. Total: never fails.
pub fn compute_auto_commission(basic_rate: &FieldValue, discount: &FieldValue, rate1: f64, rate2: f64) -> f64 {
    let net = (basic_rate.value() - discount.value()).max(0.0);
    let stage1 = net * (rate1 / 100.0);
    let result = stage1 * (1.0 - rate2 / 100.0);
    if !result.is_finite() {
        return 0.0;
    }
    round_to(result, MONEY_DIGITS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> FieldValue {
        FieldValue::Number(n)
    }

    #[test]
    fn test_reference_commission() {
        // net 90, stage1 1.35, 1.35 * 0.88 = 1.188
        assert_eq!(compute_auto_commission(&num(100.0), &num(10.0), 1.5, 12.0), 1.19);
    }

    #[test]
    fn test_net_floors_at_zero() {
        assert_eq!(compute_auto_commission(&num(10.0), &num(50.0), 1.5, 12.0), 0.0);
        assert_eq!(compute_auto_commission(&num(10.0), &num(10.0), 5.0, 0.0), 0.0);
        assert_eq!(compute_auto_commission(&num(-5.0), &num(0.0), 10.0, 10.0), 0.0);
    }

    #[test]
    fn test_empty_fields_count_as_zero() {
        assert_eq!(compute_auto_commission(&FieldValue::Empty, &FieldValue::Empty, 1.5, 12.0), 0.0);
        assert_eq!(compute_auto_commission(&num(200.0), &FieldValue::Empty, 10.0, 50.0), 10.0);
        assert_eq!(
            compute_auto_commission(&FieldValue::Text("oops".to_string()), &num(0.0), 10.0, 0.0),
            0.0
        );
    }

    #[test]
    fn test_rate2_reduces_stage_one() {
        // 1000 * 10% = 100, reduced by 25% = 75 (not 1000 * (10% - 25%))
        assert_eq!(compute_auto_commission(&num(1000.0), &num(0.0), 10.0, 25.0), 75.0);
    }

    #[test]
    fn test_overflowing_commission_is_zero() {
        assert_eq!(compute_auto_commission(&num(f64::MAX), &num(0.0), 1e300, 0.0), 0.0);
        let large = compute_auto_commission(&num(1e307), &num(0.0), 10.0, 0.0);
        assert!((large - 1e306).abs() < 1e292);
    }

    #[test]
    fn test_settings_defaults() {
        let settings = CommissionSettings::default();
        assert_eq!(settings, CommissionSettings::new(1.5, 12.0));
        assert_eq!(settings.commission_for(&num(100.0), &num(10.0)), 1.19);

        let json = serde_json::to_string(&settings).unwrap();
        assert_eq!(json, r#"{"rate1":1.5,"rate2":12}"#);
    }
}
