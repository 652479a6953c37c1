//! # Export and Print Views
//!
//! Two read-only renderings of a [`Panel`]:
//!
//! - [`export_panel_tsv`] - tab-separated text for pasting into a
//!   spreadsheet, handed to a [`Clipboard`]
//! - [`PanelTable`] - a structured table for print/detail output
//!
//! ## Example
//!
//! ```rust
//! use rate_core::export::export_panel_tsv;
//! use rate_core::model::AppState;
//!
//! let panel = &AppState::default().panels[0];
//! let tsv = export_panel_tsv(panel);
//!
//! assert!(tsv.starts_with("Panel: General Rates\n\n"));
//! assert!(tsv.ends_with("100\t10\t5\t2\t5\t97.50\n"));
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::calculations::{round_to, MONEY_DIGITS};
use crate::model::{Panel, Row, RowField};

/// Destination for exported text.
///
/// Copying is fire-and-forget: implementations report failure with `false`
/// and never touch calculator state.
pub trait Clipboard {
    fn copy_text(&mut self, text: &str) -> bool;
}

/// Format a row result for display: always 2 fraction digits.
pub fn format_result(result: f64) -> String {
    format!("{:.2}", result)
}

fn has_freight2(panel: &Panel) -> bool {
    panel.rows.iter().any(|r| !r.freight2.is_empty())
}

fn raw_cells(row: &Row, fields: &[RowField]) -> Vec<String> {
    fields.iter().map(|f| row.get(*f).display()).collect()
}

/// Render a panel as tab-separated text.
///
/// Title line `Panel: <name>`, a blank line, the header line, then one line
/// per row with raw values (empty cells stay empty) and the result to 2
/// fraction digits. The second freight column, headed by the panel's
/// `freight2_name`, is only included when some row has a value in it.
pub fn export_panel_tsv(panel: &Panel) -> String {
    let mut fields = vec![
        RowField::BasicRate,
        RowField::Discount,
        RowField::TaxPercent,
        RowField::Commission,
        RowField::Freight,
    ];
    let mut headers = vec!["Basic Rate", "Discount", "Tax %", "Commission", "Freight"];
    if has_freight2(panel) {
        fields.push(RowField::Freight2);
        headers.push(panel.freight2_name.as_str());
    }
    headers.push("Result");

    let mut out = format!("Panel: {}\n\n", panel.name);
    out.push_str(&headers.join("\t"));
    out.push('\n');

    for row in &panel.rows {
        let mut cells = raw_cells(row, &fields);
        cells.push(format_result(row.result()));
        out.push_str(&cells.join("\t"));
        out.push('\n');
    }
    out
}

/// Print-ready table for one panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelTable {
    pub title: String,
    /// Column headers, using the panel's freight labels
    pub headers: Vec<String>,
    /// One entry per row: display cells followed by the formatted result
    pub rows: Vec<Vec<String>>,
    /// Sum of all row results, formatted
    pub total: String,
    pub generated_at: DateTime<Utc>,
}

impl PanelTable {
    /// Build the table view of `panel`, stamped with the current time.
    pub fn from_panel(panel: &Panel) -> Self {
        Self::at(panel, Utc::now())
    }

    /// Build the table view with an explicit timestamp.
    pub fn at(panel: &Panel, generated_at: DateTime<Utc>) -> Self {
        let headers = vec![
            "Basic Rate".to_string(),
            "Discount".to_string(),
            "Tax %".to_string(),
            "Commission".to_string(),
            panel.freight_name.clone(),
            panel.freight2_name.clone(),
            "Result".to_string(),
        ];

        let rows = panel
            .rows
            .iter()
            .map(|row| {
                let mut cells = raw_cells(row, &RowField::ALL);
                cells.push(format_result(row.result()));
                cells
            })
            .collect();

        let total: f64 = panel.results().iter().sum();

        PanelTable {
            title: panel.name.clone(),
            headers,
            rows,
            // Sum of no rows is -0.0
            total: format_result(round_to(total, MONEY_DIGITS)),
            generated_at,
        }
    }
}
