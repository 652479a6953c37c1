//! # rate_core - Rate/Pricing Calculation Engine
//!
//! `rate_core` is the computational heart of RateCalc: named panels of rate
//! rows, the fixed row-result arithmetic, auto-derived commissions, a small
//! formula evaluator, and a versioned persisted document that upgrades
//! itself on load.
//!
//! ## Design Philosophy
//!
//! - **Pure calculations**: [`calculations`] and [`formula`] never fail and
//!   never touch storage
//! - **One owner**: a [`Session`] holds the state and saves after each change
//! - **JSON-First**: the document and all model types are serde types
//! - **Rich Errors**: Structured error types, not just strings
//!
//! ## Quick Start
//!
//! ```rust
//! use rate_core::calculations::compute_row_result;
//! use rate_core::model::Row;
//!
//! // basic 100, discount 10, tax 5%, commission 2, freight 5
//! let row = Row::with_values(100.0, 10.0, 5.0, 2.0, 5.0);
//! assert_eq!(compute_row_result(&row), 97.5);
//! ```
//!
//! ## Modules
//!
//! - [`calculations`] - Row result and auto-commission arithmetic
//! - [`formula`] - Arithmetic formula evaluator with `%` literals
//! - [`model`] - Panels, rows, theme and scale preferences
//! - [`value`] - Numeric-or-empty field values
//! - [`migration`] - Schema upgrade chain for persisted panels
//! - [`session`] - State owner that persists every mutation
//! - [`storage`] - Key-value store trait, in-memory and file stores
//! - [`export`] - Tab-separated export and print table view
//! - [`errors`] - Structured error types

pub mod calculations;
pub mod errors;
pub mod export;
pub mod formula;
pub mod migration;
pub mod model;
pub mod session;
pub mod storage;
pub mod value;

// Re-export commonly used types at crate root for convenience
pub use calculations::{compute_auto_commission, compute_row_result, CommissionSettings};
pub use errors::{RateError, RateResult};
pub use formula::{evaluate_formula, parse_formula};
pub use model::{AppState, Panel, Row, RowField, Theme};
pub use session::Session;
pub use storage::{KeyValueStore, MemoryStore};
pub use value::FieldValue;

#[cfg(not(target_arch = "wasm32"))]
pub use storage::FileStore;
