//! # Row Result
//!
//! The result of one row, in this exact order:
//!
//! ```text
//! net       = basic_rate - discount          (not floored)
//! tax       = net * tax_percent / 100
//! subtotal  = net + tax
//! result    = (subtotal - commission) + freight + freight2
//! ```
//!
//! rounded to 2 fraction digits. A discount larger than the basic rate makes
//! the net negative and lowers the result; see [`super::commission`] for the
//! floored variant used when deriving commissions.
//!
//! ## Example
//!
//! ```rust
//! use rate_core::calculations::row::compute_row_result;
//! use rate_core::model::Row;
//!
//! let row = Row::with_values(100.0, 10.0, 5.0, 2.0, 5.0);
//! assert_eq!(compute_row_result(&row), 97.5);
//! ```

use serde::{Deserialize, Serialize};

use super::{round_to, MONEY_DIGITS};
use crate::model::Row;

/// Intermediate values of a row calculation, for detail and print views.
///
/// Only `result` is rounded; the intermediates are raw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RowBreakdown {
    /// Basic rate minus discount
    pub net: f64,
    /// Tax on the net
    pub tax_amount: f64,
    /// Net plus tax
    pub subtotal: f64,
    /// Sum of all freight columns
    pub freight_total: f64,
    /// Final rounded result
    pub result: f64,
}

/// Compute every stage of a row's result.
pub fn compute_row_breakdown(row: &Row) -> RowBreakdown {
    let net = row.basic_rate.value() - row.discount.value();
    let tax_amount = net * (row.tax_percent.value() / 100.0);
    let subtotal = net + tax_amount;
    let freight_total = row.freight.value() + row.freight2.value();
    let result = (subtotal - row.commission.value()) + freight_total;
    // Overflow past f64::MAX has no meaningful total
    let result = if result.is_finite() { result } else { 0.0 };

    RowBreakdown {
        net,
        tax_amount,
        subtotal,
        freight_total,
        result: round_to(result, MONEY_DIGITS),
    }
}

/// Compute a row's result, rounded to 2 fraction digits. Total: never fails.
pub fn compute_row_result(row: &Row) -> f64 {
    compute_row_breakdown(row).result
}
