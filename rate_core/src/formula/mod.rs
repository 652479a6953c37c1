//! # Formula Evaluator
//!
//! Evaluates short arithmetic formulas such as `200 + 200*12% + 1.5%`.
//!
//! The accepted language is deliberately tiny:
//!
//! - decimal numbers (`12`, `1.5`, `.5`, `3.`)
//! - binary `+ - * /` with the usual precedence, left associative
//! - unary `+` and `-`
//! - parentheses
//! - a `%` suffix on a number literal, meaning "divide by 100"
//!
//! Evaluation runs in three steps:
//!
//! 1. every `<number>%` (optional whitespace before `%`) is rewritten to
//!    `(<number>/100)`
//! 2. the rewritten text is rejected outright if it contains anything besides
//!    digits, `+ - * / ( ) .` and whitespace
//! 3. the remaining text is parsed and evaluated by [`parser`]
//!
//! A finite result is rounded to 4 fraction digits.
//!
//! ## Example
//!
//! ```rust
//! use rate_core::formula::evaluate_formula;
//!
//! assert_eq!(evaluate_formula("200 + 200*12% + 1.5%"), Some(224.015));
//! assert_eq!(evaluate_formula("(2 + 3) * 4"), Some(20.0));
//!
//! // Still typing, rejected, or not arithmetic at all
//! assert_eq!(evaluate_formula(""), None);
//! assert_eq!(evaluate_formula("(2+3"), None);
//! assert_eq!(evaluate_formula("200; alert(1)"), None);
//! ```

pub mod parser;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::calculations::round_to;

/// Fraction digits kept in a formula result
pub const FORMULA_DIGITS: i32 = 4;

static PERCENT_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9]+(?:\.[0-9]+)?)\s*%").expect("percent pattern is valid"));

static FORBIDDEN_CHAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^0-9+\-*/().\s]").expect("allowed-character pattern is valid"));

/// Why a formula was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("formula is empty")]
    Empty,

    #[error("character '{0}' is not allowed")]
    ForbiddenCharacter(char),

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("unexpected '{token}' at position {position}")]
    UnexpectedToken { token: String, position: usize },

    #[error("formula ends unexpectedly")]
    UnexpectedEnd,

    #[error("missing closing ')' for '(' at position {0}")]
    UnclosedParen(usize),

    #[error("formula is nested too deeply")]
    TooDeep,

    #[error("result is not a finite number")]
    NotFinite,
}

/// Rewrite every `<number>%` to `(<number>/100)`.
///
/// ```rust
/// use rate_core::formula::rewrite_percentages;
///
/// assert_eq!(rewrite_percentages("200*12 %"), "200*(12/100)");
/// ```
pub fn rewrite_percentages(text: &str) -> String {
    PERCENT_LITERAL.replace_all(text, "($1/100)").into_owned()
}

/// Evaluate a formula, explaining any rejection.
pub fn parse_formula(text: &str) -> Result<f64, FormulaError> {
    if text.trim().is_empty() {
        return Err(FormulaError::Empty);
    }

    let rewritten = rewrite_percentages(text);
    if let Some(m) = FORBIDDEN_CHAR.find(&rewritten) {
        let c = m.as_str().chars().next().unwrap_or('?');
        return Err(FormulaError::ForbiddenCharacter(c));
    }

    let value = parser::evaluate(&rewritten)?;
    if !value.is_finite() {
        return Err(FormulaError::NotFinite);
    }
    Ok(round_to(value, FORMULA_DIGITS))
}

/// Evaluate a formula to a number, or `None` if it is empty or rejected.
///
/// Never panics. Callers that need to tell "still typing" from "rejected"
/// check whether the input was blank.
pub fn evaluate_formula(text: &str) -> Option<f64> {
    parse_formula(text).ok()
}
