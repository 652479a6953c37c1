//! # Rate Calculations
//!
//! Pure, total calculation functions. Nothing here fails or touches state:
//! empty and non-numeric fields are coerced to 0 before they reach the
//! arithmetic.
//!
//! ## Available Calculations
//!
//! - [`row`] - Per-row result (net, tax, commission, freight)
//! - [`commission`] - Two-stage auto-commission from basic rate and discount

pub mod commission;
pub mod row;

// Re-export commonly used items
pub use commission::{compute_auto_commission, CommissionSettings};
pub use row::{compute_row_breakdown, compute_row_result, RowBreakdown};

/// Fraction digits kept in row results and commissions
pub const MONEY_DIGITS: i32 = 2;

/// Round to `digits` fraction digits, half away from zero.
///
/// Negative zero is normalized to `0.0` so a blank row never shows `-0.00`.
///
/// ```rust
/// use rate_core::calculations::round_to;
///
/// assert_eq!(round_to(1.188, 2), 1.19);
/// assert_eq!(round_to(-2.345, 2), -2.35);
/// assert_eq!(round_to(224.015, 4), 224.015);
/// ```
pub fn round_to(value: f64, digits: i32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10f64.powi(digits);
    let scaled = value * factor;
    // Pull values that sit one ulp under a half (1.005 * 100 = 100.49999...)
    // back onto it before rounding.
    let nudged = scaled + scaled.signum() * scaled.abs() * f64::EPSILON;
    if !nudged.is_finite() {
        // Too large to carry any fraction digits
        return value;
    }
    let rounded = nudged.round() / factor;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}
