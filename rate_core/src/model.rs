//! # Panels and Rows
//!
//! [`AppState`] is the root container for all user data: an ordered list of
//! [`Panel`]s plus the theme and UI scale preferences. Each panel owns its
//! [`Row`]s; deleting a panel drops its rows with it.
//!
//! ## Structure
//!
//! ```text
//! AppState
//! ├── panels: Vec<Panel> (creation/display order)
//! │   ├── name, freight labels
//! │   ├── commission_settings: Option<CommissionSettings> (rate mode)
//! │   ├── commission_formula: Option<String> (formula mode)
//! │   └── rows: Vec<Row> (entry order)
//! ├── theme: Theme
//! └── ui_scale: f64 in [0.5, 1.2]
//! ```
//!
//! The mutation methods here only change memory. Persisting after each
//! change is the job of [`crate::session::Session`].
//!
//! ## Example
//!
//! ```rust
//! use rate_core::model::{AppState, RowField};
//! use rate_core::value::FieldValue;
//!
//! let mut state = AppState::default();
//! let panel_id = state.add_panel();
//! let panel = state.panel_mut(&panel_id).unwrap();
//! let row_id = panel.add_row();
//!
//! panel.set_field(&row_id, RowField::BasicRate, FieldValue::Number(100.0)).unwrap();
//! panel.set_field(&row_id, RowField::Discount, FieldValue::Number(10.0)).unwrap();
//!
//! // New panels derive commissions from the default 1.5% / 12% rates
//! assert_eq!(panel.row(&row_id).unwrap().commission, FieldValue::Number(1.19));
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calculations::{compute_row_result, CommissionSettings};
use crate::errors::{RateError, RateResult};
use crate::formula::parse_formula;
use crate::value::FieldValue;

/// Label of the first freight column
pub const DEFAULT_FREIGHT_NAME: &str = "Freight";

/// Label of the second freight column
pub const DEFAULT_FREIGHT2_NAME: &str = "Freight 2";

/// Name of the panel created for a fresh or reset store
pub const DEFAULT_PANEL_NAME: &str = "General Rates";

/// Smallest accepted UI scale
pub const MIN_UI_SCALE: f64 = 0.5;

/// Largest accepted UI scale
pub const MAX_UI_SCALE: f64 = 1.2;

/// UI scale used when none is stored
pub const DEFAULT_UI_SCALE: f64 = 1.0;

/// Generate a fresh opaque id for a panel or row.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_freight_name() -> String {
    DEFAULT_FREIGHT_NAME.to_string()
}

fn default_freight2_name() -> String {
    DEFAULT_FREIGHT2_NAME.to_string()
}

// ============================================================================
// Row
// ============================================================================

/// The editable numeric columns of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowField {
    BasicRate,
    Discount,
    TaxPercent,
    Commission,
    Freight,
    Freight2,
}

impl RowField {
    /// All fields in column order
    pub const ALL: [RowField; 6] = [
        RowField::BasicRate,
        RowField::Discount,
        RowField::TaxPercent,
        RowField::Commission,
        RowField::Freight,
        RowField::Freight2,
    ];

    /// Key used in the persisted document
    pub fn key(&self) -> &'static str {
        match self {
            RowField::BasicRate => "basicRate",
            RowField::Discount => "discount",
            RowField::TaxPercent => "taxPercent",
            RowField::Commission => "commission",
            RowField::Freight => "freight",
            RowField::Freight2 => "freight2",
        }
    }

    /// Whether editing this field re-derives the commission in rate mode
    pub fn triggers_auto_commission(&self) -> bool {
        matches!(self, RowField::BasicRate | RowField::Discount)
    }
}

impl fmt::Display for RowField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for RowField {
    type Err = RateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "basicrate" | "basic" | "rate" => Ok(RowField::BasicRate),
            "discount" => Ok(RowField::Discount),
            "taxpercent" | "tax" => Ok(RowField::TaxPercent),
            "commission" => Ok(RowField::Commission),
            "freight" | "freight1" => Ok(RowField::Freight),
            "freight2" => Ok(RowField::Freight2),
            _ => Err(RateError::invalid_input(
                "field",
                s,
                "Expected one of basicRate, discount, taxPercent, commission, freight, freight2",
            )),
        }
    }
}

/// One line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    /// Opaque unique id
    #[serde(default = "generate_id")]
    pub id: String,

    #[serde(default)]
    pub basic_rate: FieldValue,

    #[serde(default)]
    pub discount: FieldValue,

    /// Tax as a percentage of the net
    #[serde(default)]
    pub tax_percent: FieldValue,

    #[serde(default)]
    pub commission: FieldValue,

    #[serde(default)]
    pub freight: FieldValue,

    /// Second freight column (schema v2)
    #[serde(default)]
    pub freight2: FieldValue,
}

impl Row {
    /// A row with a fresh id and every field empty.
    pub fn new() -> Self {
        Row {
            id: generate_id(),
            basic_rate: FieldValue::Empty,
            discount: FieldValue::Empty,
            tax_percent: FieldValue::Empty,
            commission: FieldValue::Empty,
            freight: FieldValue::Empty,
            freight2: FieldValue::Empty,
        }
    }

    /// A row with the five primary fields filled in; `freight2` stays empty.
    pub fn with_values(basic_rate: f64, discount: f64, tax_percent: f64, commission: f64, freight: f64) -> Self {
        Row {
            basic_rate: FieldValue::Number(basic_rate),
            discount: FieldValue::Number(discount),
            tax_percent: FieldValue::Number(tax_percent),
            commission: FieldValue::Number(commission),
            freight: FieldValue::Number(freight),
            ..Row::new()
        }
    }

    pub fn get(&self, field: RowField) -> &FieldValue {
        match field {
            RowField::BasicRate => &self.basic_rate,
            RowField::Discount => &self.discount,
            RowField::TaxPercent => &self.tax_percent,
            RowField::Commission => &self.commission,
            RowField::Freight => &self.freight,
            RowField::Freight2 => &self.freight2,
        }
    }

    pub fn get_mut(&mut self, field: RowField) -> &mut FieldValue {
        match field {
            RowField::BasicRate => &mut self.basic_rate,
            RowField::Discount => &mut self.discount,
            RowField::TaxPercent => &mut self.tax_percent,
            RowField::Commission => &mut self.commission,
            RowField::Freight => &mut self.freight,
            RowField::Freight2 => &mut self.freight2,
        }
    }

    /// The row's computed result
    pub fn result(&self) -> f64 {
        compute_row_result(self)
    }
}

impl Default for Row {
    fn default() -> Self {
        Row::new()
    }
}

// ============================================================================
// Panel
// ============================================================================

/// How a panel derives its commissions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommissionMode {
    /// Commissions follow basic rate and discount through the panel's rates
    Rates(CommissionSettings),
    /// Commission is typed in, or seeded from a formula into the first row
    Formula,
}

impl CommissionMode {
    pub fn name(&self) -> &'static str {
        match self {
            CommissionMode::Rates(_) => "rate",
            CommissionMode::Formula => "formula",
        }
    }
}

/// A named table of rows sharing one set of commission settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Panel {
    #[serde(default = "generate_id")]
    pub id: String,

    pub name: String,

    /// Rows in entry order
    #[serde(default)]
    pub rows: Vec<Row>,

    /// Last formula applied in formula mode, for re-display
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commission_formula: Option<String>,

    /// Rates applied to every row (schema v3); `None` means formula mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commission_settings: Option<CommissionSettings>,

    /// Display label of the first freight column (schema v2)
    #[serde(default = "default_freight_name")]
    pub freight_name: String,

    /// Display label of the second freight column (schema v2)
    #[serde(default = "default_freight2_name")]
    pub freight2_name: String,
}

/// Label for a panel added at zero-based position `index`.
pub fn new_panel_name(index: usize) -> String {
    format!("New Panel {}", index + 1)
}

fn assign_field(row: &mut Row, settings: Option<CommissionSettings>, field: RowField, value: FieldValue) {
    *row.get_mut(field) = value;
    if let Some(settings) = settings {
        if field.triggers_auto_commission() {
            row.commission = FieldValue::Number(settings.commission_for(&row.basic_rate, &row.discount));
        }
    }
}

impl Panel {
    /// An empty panel with current-schema defaults.
    pub fn new(name: impl Into<String>) -> Self {
        Panel {
            id: generate_id(),
            name: name.into(),
            rows: Vec::new(),
            commission_formula: None,
            commission_settings: Some(CommissionSettings::default()),
            freight_name: default_freight_name(),
            freight2_name: default_freight2_name(),
        }
    }

    pub fn mode(&self) -> CommissionMode {
        match self.commission_settings {
            Some(settings) => CommissionMode::Rates(settings),
            None => CommissionMode::Formula,
        }
    }

    pub fn row(&self, row_id: &str) -> Option<&Row> {
        self.rows.iter().find(|r| r.id == row_id)
    }

    pub fn row_mut(&mut self, row_id: &str) -> Option<&mut Row> {
        self.rows.iter_mut().find(|r| r.id == row_id)
    }

    fn row_index(&self, row_id: &str) -> RateResult<usize> {
        self.rows
            .iter()
            .position(|r| r.id == row_id)
            .ok_or_else(|| RateError::row_not_found(&self.id, row_id))
    }

    /// Append a blank row and return its id.
    pub fn add_row(&mut self) -> String {
        let row = Row::new();
        let id = row.id.clone();
        self.rows.push(row);
        id
    }

    /// Remove a row by id.
    pub fn delete_row(&mut self, row_id: &str) -> RateResult<Row> {
        let index = self.row_index(row_id)?;
        Ok(self.rows.remove(index))
    }

    /// Set one field of a row.
    ///
    /// In rate mode, changing the basic rate or discount re-derives that
    /// row's commission.
    pub fn set_field(&mut self, row_id: &str, field: RowField, value: FieldValue) -> RateResult<()> {
        let settings = self.commission_settings;
        let index = self.row_index(row_id)?;
        assign_field(&mut self.rows[index], settings, field, value);
        Ok(())
    }

    /// Copy the first row's value of `field` into every later empty cell.
    ///
    /// Returns how many cells were filled. Nothing happens when the panel has
    /// no rows or the first row's cell is itself empty.
    pub fn fill_column(&mut self, field: RowField) -> usize {
        let first = match self.rows.first() {
            Some(row) if !row.get(field).is_empty() => row.get(field).clone(),
            _ => return 0,
        };

        let settings = self.commission_settings;
        let mut filled = 0;
        for row in self.rows.iter_mut().skip(1) {
            if row.get(field).is_empty() {
                assign_field(row, settings, field, first.clone());
                filled += 1;
            }
        }
        filled
    }

    /// Replace the panel's rates and re-derive every row's commission.
    ///
    /// Existing commissions are overwritten unconditionally. Puts a
    /// formula-mode panel into rate mode.
    pub fn set_commission_settings(&mut self, settings: CommissionSettings) {
        self.commission_settings = Some(settings);
        for row in &mut self.rows {
            row.commission = FieldValue::Number(settings.commission_for(&row.basic_rate, &row.discount));
        }
    }

    /// Switch to formula mode. Row commissions keep their current values.
    pub fn clear_commission_settings(&mut self) {
        self.commission_settings = None;
    }

    /// Evaluate `formula` and seed the first row's commission with it.
    ///
    /// Creates a row holding only that commission when the panel is empty,
    /// and remembers the formula text. Blank formulas are a no-op returning
    /// `Ok(None)`. Only allowed in formula mode.
    pub fn apply_commission_formula(&mut self, formula: &str) -> RateResult<Option<f64>> {
        if let CommissionMode::Rates(_) = self.mode() {
            return Err(RateError::CommissionModeConflict {
                panel_id: self.id.clone(),
                mode: self.mode().name().to_string(),
                reason: "commissions are derived from rates; clear the rates to apply a formula".to_string(),
            });
        }
        if formula.trim().is_empty() {
            return Ok(None);
        }

        let result = parse_formula(formula).map_err(|e| RateError::invalid_formula(formula, e.to_string()))?;

        match self.rows.first_mut() {
            Some(first) => first.commission = FieldValue::Number(result),
            None => {
                let mut row = Row::new();
                row.commission = FieldValue::Number(result);
                self.rows.push(row);
            }
        }
        self.commission_formula = Some(formula.to_string());
        Ok(Some(result))
    }

    /// Computed result of every row, in row order
    pub fn results(&self) -> Vec<f64> {
        self.rows.iter().map(Row::result).collect()
    }
}

// ============================================================================
// Application state
// ============================================================================

/// Colour theme preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Dark,
    #[default]
    Light,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    pub fn toggled(self) -> Theme {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = RateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            _ => Err(RateError::invalid_input("theme", s, "Expected 'dark' or 'light'")),
        }
    }
}

/// Clamp a UI scale into the accepted range; non-finite input gives the default.
pub fn clamp_ui_scale(scale: f64) -> f64 {
    if scale.is_finite() {
        scale.clamp(MIN_UI_SCALE, MAX_UI_SCALE)
    } else {
        DEFAULT_UI_SCALE
    }
}

/// All user data of one installation.
#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    /// Panels in creation/display order
    pub panels: Vec<Panel>,
    pub theme: Theme,
    pub ui_scale: f64,
}

impl AppState {
    /// State with no panels at all.
    pub fn empty() -> Self {
        AppState {
            panels: Vec::new(),
            theme: Theme::default(),
            ui_scale: DEFAULT_UI_SCALE,
        }
    }

    /// The panel list used when nothing usable is stored: one panel with one
    /// sample row.
    pub fn default_panels() -> Vec<Panel> {
        let mut panel = Panel::new(DEFAULT_PANEL_NAME);
        panel.rows.push(Row::with_values(100.0, 10.0, 5.0, 2.0, 5.0));
        vec![panel]
    }

    pub fn panel(&self, panel_id: &str) -> RateResult<&Panel> {
        self.panels
            .iter()
            .find(|p| p.id == panel_id)
            .ok_or_else(|| RateError::panel_not_found(panel_id))
    }

    pub fn panel_mut(&mut self, panel_id: &str) -> RateResult<&mut Panel> {
        self.panels
            .iter_mut()
            .find(|p| p.id == panel_id)
            .ok_or_else(|| RateError::panel_not_found(panel_id))
    }

    /// Append an empty panel named `New Panel <n>` and return its id.
    pub fn add_panel(&mut self) -> String {
        let panel = Panel::new(new_panel_name(self.panels.len()));
        let id = panel.id.clone();
        self.panels.push(panel);
        id
    }

    /// Remove a panel and, with it, all of its rows.
    pub fn delete_panel(&mut self, panel_id: &str) -> RateResult<Panel> {
        let index = self
            .panels
            .iter()
            .position(|p| p.id == panel_id)
            .ok_or_else(|| RateError::panel_not_found(panel_id))?;
        Ok(self.panels.remove(index))
    }

    /// Set the UI scale, clamped to [0.5, 1.2]. Returns the stored value.
    pub fn set_ui_scale(&mut self, scale: f64) -> f64 {
        self.ui_scale = clamp_ui_scale(scale);
        self.ui_scale
    }
}

impl Default for AppState {
    fn default() -> Self {
        AppState {
            panels: AppState::default_panels(),
            ..AppState::empty()
        }
    }
}
