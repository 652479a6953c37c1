//! # Schema Migration
//!
//! Upgrades a persisted panel list from whatever schema it was written in to
//! the current one. Runs once at load, before anything is calculated.
//!
//! ## Schema History
//!
//! | Version | Adds |
//! |---------|------|
//! | 1 | `id`, `name`, `rows`, optional `commissionFormula` (unversioned documents) |
//! | 2 | panel `freightName`, `freight2Name`; row `freight2` |
//! | 3 | panel `commissionSettings` |
//!
//! Each increment is one small step working on the raw JSON. Steps only
//! insert what is missing and never overwrite an existing field, so running
//! one twice changes nothing.
//!
//! Independent of version, a panel with no `name` is given the label a newly
//! added panel at that position would get, so one unnamed panel does not
//! discard the whole document.
//!
//! ## Example
//!
//! ```rust
//! use rate_core::migration::upgrade;
//!
//! let legacy = r#"[{"id":"p1","name":"Old","rows":[
//!     {"id":"r1","basicRate":100,"discount":10,"taxPercent":5,"commission":2,"freight":5}
//! ]}]"#;
//!
//! let panels = upgrade(legacy, None).unwrap();
//! assert_eq!(panels[0].freight_name, "Freight");
//! assert_eq!(panels[0].commission_settings.unwrap().rate1, 1.5);
//! assert_eq!(panels[0].rows[0].result(), 97.5);
//! ```

use serde_json::{json, Map, Value};

use crate::calculations::commission::{DEFAULT_RATE1, DEFAULT_RATE2};
use crate::errors::{RateError, RateResult};
use crate::model::{new_panel_name, Panel, DEFAULT_FREIGHT2_NAME, DEFAULT_FREIGHT_NAME};

/// Schema version written by this build
pub const CURRENT_SCHEMA_VERSION: u32 = 3;

/// Version assumed for documents that carry no version
pub const LEGACY_SCHEMA_VERSION: u32 = 1;

type PanelObject = Map<String, Value>;

/// One schema increment, applied to a single panel object.
struct Migration {
    /// Version this step upgrades from
    from: u32,
    description: &'static str,
    apply: fn(&mut PanelObject, usize) -> RateResult<()>,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        from: 1,
        description: "freight column labels and second freight column",
        apply: add_freight_columns,
    },
    Migration {
        from: 2,
        description: "commission settings",
        apply: add_commission_settings,
    },
];

fn add_freight_columns(panel: &mut PanelObject, index: usize) -> RateResult<()> {
    panel
        .entry("freightName")
        .or_insert_with(|| Value::String(DEFAULT_FREIGHT_NAME.to_string()));
    panel
        .entry("freight2Name")
        .or_insert_with(|| Value::String(DEFAULT_FREIGHT2_NAME.to_string()));

    if let Some(rows) = panel.get_mut("rows") {
        let rows = rows
            .as_array_mut()
            .ok_or_else(|| RateError::malformed(format!("rows of panel {} is not a list", index)))?;
        for (row_index, row) in rows.iter_mut().enumerate() {
            let row = row.as_object_mut().ok_or_else(|| {
                RateError::malformed(format!("row {} of panel {} is not an object", row_index, index))
            })?;
            row.entry("freight2").or_insert_with(|| Value::String(String::new()));
        }
    }
    Ok(())
}

fn add_commission_settings(panel: &mut PanelObject, _index: usize) -> RateResult<()> {
    let settings = panel.entry("commissionSettings").or_insert(Value::Null);
    if settings.is_null() {
        *settings = json!({ "rate1": DEFAULT_RATE1, "rate2": DEFAULT_RATE2 });
    }
    Ok(())
}

fn fill_missing_name(panel: &mut PanelObject, index: usize) {
    let name = panel.entry("name").or_insert(Value::Null);
    if name.is_null() {
        *name = Value::String(new_panel_name(index));
    }
}

/// Upgrade a raw JSON panel list written at `version` (`None` = unversioned).
///
/// Fails with [`RateError::MalformedDocument`] when the payload is not a list
/// of panel objects, and [`RateError::VersionMismatch`] when it was written by
/// a newer schema.
pub fn upgrade(raw: &str, version: Option<u32>) -> RateResult<Vec<Panel>> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| RateError::malformed(format!("invalid JSON: {}", e)))?;
    upgrade_value(value, version)
}

/// Upgrade an already parsed panel list. See [`upgrade`].
pub fn upgrade_value(mut value: Value, version: Option<u32>) -> RateResult<Vec<Panel>> {
    let version = version.unwrap_or(LEGACY_SCHEMA_VERSION).max(LEGACY_SCHEMA_VERSION);
    if version > CURRENT_SCHEMA_VERSION {
        return Err(RateError::VersionMismatch {
            found: version,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }

    let panels = value
        .as_array_mut()
        .ok_or_else(|| RateError::malformed("expected a list of panels"))?;

    let steps: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.from >= version).collect();
    for step in &steps {
        log::debug!("Upgrading {} panel(s) from schema v{}: {}", panels.len(), step.from, step.description);
    }

    for (index, panel) in panels.iter_mut().enumerate() {
        let panel = panel
            .as_object_mut()
            .ok_or_else(|| RateError::malformed(format!("panel {} is not an object", index)))?;
        for step in &steps {
            (step.apply)(panel, index)?;
        }
        fill_missing_name(panel, index);
    }

    serde_json::from_value(value).map_err(|e| RateError::malformed(e.to_string()))
}

/// Serialize a panel list in the current schema.
pub fn encode_panels(panels: &[Panel]) -> RateResult<String> {
    Ok(serde_json::to_string(panels)?)
}
