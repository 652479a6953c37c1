//! # Session
//!
//! A [`Session`] owns the [`AppState`] and the [`KeyValueStore`] it came
//! from. It is the only writer: every mutation is made on a copy of the
//! state, the whole document is saved, and only then does the copy replace
//! the state in memory. A failed save leaves memory matching the store.
//!
//! Loading never fails because of what is stored. A missing document gives
//! the default state; a document that cannot be upgraded is logged at error
//! level with its raw payload and replaced by the default state. Only the
//! store itself failing to read is an error.
//!
//! ## Example
//!
//! ```rust
//! use rate_core::model::RowField;
//! use rate_core::session::Session;
//! use rate_core::storage::MemoryStore;
//!
//! let mut session = Session::load(MemoryStore::new())?;
//! let panel_id = session.add_panel()?;
//! let row_id = session.add_row(&panel_id)?;
//!
//! session.update_field(&panel_id, &row_id, RowField::BasicRate, "100")?;
//! session.update_field(&panel_id, &row_id, RowField::Discount, "10")?;
//!
//! let panel = session.panel(&panel_id)?;
//! assert_eq!(panel.row(&row_id).unwrap().commission.value(), 1.19);
//!
//! // Everything is already persisted
//! let reloaded = Session::load(session.into_store())?;
//! assert_eq!(reloaded.state().panels.len(), 2);
//! # Ok::<(), rate_core::errors::RateError>(())
//! ```

use crate::calculations::CommissionSettings;
use crate::errors::{RateError, RateResult};
use crate::export::{export_panel_tsv, Clipboard};
use crate::formula::parse_formula;
use crate::migration::{encode_panels, upgrade, CURRENT_SCHEMA_VERSION};
use crate::model::{clamp_ui_scale, AppState, Panel, Row, RowField, Theme, DEFAULT_UI_SCALE};
use crate::storage::{KeyValueStore, ALL_KEYS, PANELS_KEY, SCHEMA_VERSION_KEY, THEME_KEY, UI_SCALE_KEY};
use crate::value::FieldValue;

/// Application state bound to its store.
#[derive(Debug)]
pub struct Session<S: KeyValueStore> {
    store: S,
    state: AppState,
}

impl<S: KeyValueStore> Session<S> {
    /// Load the state from `store`, upgrading older documents.
    ///
    /// Nothing is written until the first mutation.
    pub fn load(store: S) -> RateResult<Self> {
        let panels = load_panels(&store)?;
        let theme = load_theme(&store)?;
        let ui_scale = load_ui_scale(&store)?;

        Ok(Session {
            store,
            state: AppState {
                panels,
                theme,
                ui_scale,
            },
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Give back the store, e.g. to reload from it.
    pub fn into_store(self) -> S {
        self.store
    }

    pub fn panel(&self, panel_id: &str) -> RateResult<&Panel> {
        self.state.panel(panel_id)
    }

    pub fn row(&self, panel_id: &str, row_id: &str) -> RateResult<&Row> {
        let panel = self.state.panel(panel_id)?;
        panel
            .row(row_id)
            .ok_or_else(|| RateError::row_not_found(panel_id, row_id))
    }

    /// Write the whole document: panels, schema version, theme and scale.
    pub fn save(&mut self) -> RateResult<()> {
        save_state(&mut self.store, &self.state)
    }

    /// Save `next` and make it the current state. On failure the current
    /// state is left as it was, matching what is stored.
    fn commit(&mut self, next: AppState) -> RateResult<()> {
        save_state(&mut self.store, &next)?;
        self.state = next;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Panels
    // ------------------------------------------------------------------

    /// Append a panel named `New Panel <n>`; returns its id.
    pub fn add_panel(&mut self) -> RateResult<String> {
        let mut next = self.state.clone();
        let id = next.add_panel();
        self.commit(next)?;
        Ok(id)
    }

    pub fn rename_panel(&mut self, panel_id: &str, name: &str) -> RateResult<()> {
        let mut next = self.state.clone();
        next.panel_mut(panel_id)?.name = name.to_string();
        self.commit(next)
    }

    /// Rename the freight column labels. `None` keeps a label as it is.
    pub fn rename_freight_columns(
        &mut self,
        panel_id: &str,
        freight_name: Option<&str>,
        freight2_name: Option<&str>,
    ) -> RateResult<()> {
        let mut next = self.state.clone();
        let panel = next.panel_mut(panel_id)?;
        if let Some(name) = freight_name {
            panel.freight_name = name.to_string();
        }
        if let Some(name) = freight2_name {
            panel.freight2_name = name.to_string();
        }
        self.commit(next)
    }

    /// Remove a panel together with its rows.
    pub fn delete_panel(&mut self, panel_id: &str) -> RateResult<Panel> {
        let mut next = self.state.clone();
        let removed = next.delete_panel(panel_id)?;
        self.commit(next)?;
        log::info!("Deleted panel '{}' with {} row(s)", removed.name, removed.rows.len());
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Rows
    // ------------------------------------------------------------------

    /// Append a blank row; returns its id.
    pub fn add_row(&mut self, panel_id: &str) -> RateResult<String> {
        let mut next = self.state.clone();
        let id = next.panel_mut(panel_id)?.add_row();
        self.commit(next)?;
        Ok(id)
    }

    pub fn delete_row(&mut self, panel_id: &str, row_id: &str) -> RateResult<Row> {
        let mut next = self.state.clone();
        let removed = next.panel_mut(panel_id)?.delete_row(row_id)?;
        self.commit(next)?;
        Ok(removed)
    }

    /// Set a field from user input: blank clears it, anything else must be a
    /// number. Rejected input leaves the row unchanged.
    pub fn update_field(&mut self, panel_id: &str, row_id: &str, field: RowField, input: &str) -> RateResult<()> {
        let value = FieldValue::parse_input(field.key(), input)?;
        self.set_field(panel_id, row_id, field, value)
    }

    /// Set a field to an already validated value.
    pub fn set_field(&mut self, panel_id: &str, row_id: &str, field: RowField, value: FieldValue) -> RateResult<()> {
        let mut next = self.state.clone();
        next.panel_mut(panel_id)?.set_field(row_id, field, value)?;
        self.commit(next)
    }

    /// Copy the first row's value into later empty cells of the column.
    pub fn fill_column(&mut self, panel_id: &str, field: RowField) -> RateResult<usize> {
        let mut next = self.state.clone();
        let filled = next.panel_mut(panel_id)?.fill_column(field);
        if filled > 0 {
            self.commit(next)?;
        }
        Ok(filled)
    }

    // ------------------------------------------------------------------
    // Commission
    // ------------------------------------------------------------------

    /// Evaluate a formula into the first row's commission (formula mode).
    pub fn apply_commission_formula(&mut self, panel_id: &str, formula: &str) -> RateResult<Option<f64>> {
        let mut next = self.state.clone();
        let result = next.panel_mut(panel_id)?.apply_commission_formula(formula)?;
        if result.is_some() {
            self.commit(next)?;
        }
        Ok(result)
    }

    /// Set the panel's rates and re-derive every row's commission.
    pub fn set_commission_settings(&mut self, panel_id: &str, settings: CommissionSettings) -> RateResult<()> {
        let mut next = self.state.clone();
        next.panel_mut(panel_id)?.set_commission_settings(settings);
        self.commit(next)
    }

    /// Set the panel's rates from formula text, e.g. `"1.5"` and `"10 + 2"`.
    ///
    /// Both texts are evaluated before anything changes.
    pub fn set_commission_rates(
        &mut self,
        panel_id: &str,
        rate1_text: &str,
        rate2_text: &str,
    ) -> RateResult<CommissionSettings> {
        let rate1 = parse_formula(rate1_text).map_err(|e| RateError::invalid_formula(rate1_text, e.to_string()))?;
        let rate2 = parse_formula(rate2_text).map_err(|e| RateError::invalid_formula(rate2_text, e.to_string()))?;
        let settings = CommissionSettings::new(rate1, rate2);
        self.set_commission_settings(panel_id, settings)?;
        Ok(settings)
    }

    /// Put the panel in formula mode. Commissions keep their values.
    pub fn clear_commission_settings(&mut self, panel_id: &str) -> RateResult<()> {
        let mut next = self.state.clone();
        next.panel_mut(panel_id)?.clear_commission_settings();
        self.commit(next)
    }

    // ------------------------------------------------------------------
    // Preferences
    // ------------------------------------------------------------------

    pub fn toggle_theme(&mut self) -> RateResult<Theme> {
        let mut next = self.state.clone();
        next.theme = next.theme.toggled();
        self.commit(next)?;
        Ok(self.state.theme)
    }

    pub fn set_theme(&mut self, theme: Theme) -> RateResult<()> {
        let mut next = self.state.clone();
        next.theme = theme;
        self.commit(next)
    }

    /// Set the UI scale, clamped to [0.5, 1.2]; returns the stored value.
    pub fn set_ui_scale(&mut self, scale: f64) -> RateResult<f64> {
        let mut next = self.state.clone();
        let stored = next.set_ui_scale(scale);
        self.commit(next)?;
        Ok(stored)
    }

    /// Clear every stored key and start over with the default state.
    ///
    /// All keys go in one save; if it fails, both the store and the state in
    /// memory are left untouched. The store stays empty until the next
    /// mutation; loading it meanwhile yields the same defaults.
    pub fn reset(&mut self) -> RateResult<()> {
        self.store.clear_batch(&ALL_KEYS)?;
        self.state = AppState::default();
        log::info!("Reset to default state");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------

    /// Hand the panel's tab-separated export to a clipboard.
    ///
    /// Returns whether the clipboard accepted it.
    pub fn copy_panel(&self, panel_id: &str, clipboard: &mut dyn Clipboard) -> RateResult<bool> {
        let text = export_panel_tsv(self.state.panel(panel_id)?);
        let copied = clipboard.copy_text(&text);
        if !copied {
            log::warn!("Clipboard rejected export of panel {}", panel_id);
        }
        Ok(copied)
    }
}

fn save_state<S: KeyValueStore>(store: &mut S, state: &AppState) -> RateResult<()> {
    let entries = [
        (PANELS_KEY, encode_panels(&state.panels)?),
        (SCHEMA_VERSION_KEY, CURRENT_SCHEMA_VERSION.to_string()),
        (THEME_KEY, state.theme.as_str().to_string()),
        (UI_SCALE_KEY, state.ui_scale.to_string()),
    ];
    store.write_batch(&entries)?;
    log::debug!(
        "Saved {} panel(s), theme {}, scale {}",
        state.panels.len(),
        state.theme,
        state.ui_scale
    );
    Ok(())
}

fn load_panels<S: KeyValueStore>(store: &S) -> RateResult<Vec<Panel>> {
    let raw = match store.read(PANELS_KEY)? {
        Some(raw) => raw,
        None => {
            log::info!("No stored panels, starting with defaults");
            return Ok(AppState::default_panels());
        }
    };

    let upgraded = parse_schema_version(store.read(SCHEMA_VERSION_KEY)?).and_then(|version| upgrade(&raw, version));
    match upgraded {
        Ok(panels) => {
            log::info!("Loaded {} panel(s)", panels.len());
            Ok(panels)
        }
        Err(e) => {
            log::error!("Discarding stored panels ({}); payload: {}", e, raw);
            Ok(AppState::default_panels())
        }
    }
}

fn parse_schema_version(raw: Option<String>) -> RateResult<Option<u32>> {
    match raw {
        None => Ok(None),
        Some(text) => text
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| RateError::malformed(format!("schema version '{}' is not a number", text))),
    }
}

fn load_theme<S: KeyValueStore>(store: &S) -> RateResult<Theme> {
    Ok(match store.read(THEME_KEY)? {
        None => Theme::default(),
        Some(text) => text.parse().unwrap_or_else(|e| {
            log::warn!("Ignoring stored theme: {}", e);
            Theme::default()
        }),
    })
}

fn load_ui_scale<S: KeyValueStore>(store: &S) -> RateResult<f64> {
    Ok(match store.read(UI_SCALE_KEY)? {
        None => DEFAULT_UI_SCALE,
        Some(text) => match text.trim().parse::<f64>() {
            Ok(scale) => clamp_ui_scale(scale),
            Err(_) => {
                log::warn!("Ignoring stored UI scale '{}'", text);
                DEFAULT_UI_SCALE
            }
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DEFAULT_PANEL_NAME;
    use crate::storage::MemoryStore;

    fn fresh() -> Session<MemoryStore> {
        Session::load(MemoryStore::new()).unwrap()
    }

    fn reload(session: Session<MemoryStore>) -> Session<MemoryStore> {
        Session::load(session.into_store()).unwrap()
    }

    /// A store whose writes can be switched to fail, e.g. a full disk.
    #[derive(Debug, Default)]
    struct FlakyStore {
        inner: MemoryStore,
        failing: bool,
    }

    impl FlakyStore {
        fn check(&self, operation: &str) -> RateResult<()> {
            if self.failing {
                return Err(RateError::storage(operation, "flaky", "disk full"));
            }
            Ok(())
        }
    }

    impl KeyValueStore for FlakyStore {
        fn read(&self, key: &str) -> RateResult<Option<String>> {
            self.inner.read(key)
        }

        fn write(&mut self, key: &str, value: &str) -> RateResult<()> {
            self.check("write")?;
            self.inner.write(key, value)
        }

        fn clear(&mut self, key: &str) -> RateResult<()> {
            self.check("clear")?;
            self.inner.clear(key)
        }

        fn write_batch(&mut self, entries: &[(&str, String)]) -> RateResult<()> {
            self.check("write")?;
            self.inner.write_batch(entries)
        }

        fn clear_batch(&mut self, keys: &[&str]) -> RateResult<()> {
            self.check("clear")?;
            self.inner.clear_batch(keys)
        }
    }

    #[test]
    fn test_empty_store_gives_defaults_without_writing() {
        let session = fresh();
        assert_eq!(session.state().panels.len(), 1);
        assert_eq!(session.state().panels[0].name, DEFAULT_PANEL_NAME);
        assert_eq!(session.state().theme, Theme::Light);
        assert!(session.store().is_empty());
    }

    #[test]
    fn test_every_mutation_is_persisted() {
        let mut session = fresh();
        let panel_id = session.add_panel().unwrap();
        assert_eq!(session.store().read(SCHEMA_VERSION_KEY).unwrap().as_deref(), Some("3"));

        let row_id = session.add_row(&panel_id).unwrap();
        session.update_field(&panel_id, &row_id, RowField::BasicRate, "200").unwrap();
        session.rename_panel(&panel_id, "Export").unwrap();

        let session = reload(session);
        let panel = session.panel(&panel_id).unwrap();
        assert_eq!(panel.name, "Export");
        assert_eq!(panel.rows[0].basic_rate, FieldValue::Number(200.0));
        assert_eq!(panel.rows[0].commission, FieldValue::Number(2.64));
    }

    #[test]
    fn test_rejected_input_changes_nothing() {
        let mut session = fresh();
        let panel_id = session.state().panels[0].id.clone();
        let row_id = session.state().panels[0].rows[0].id.clone();

        let err = session
            .update_field(&panel_id, &row_id, RowField::TaxPercent, "ten")
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
        assert_eq!(session.row(&panel_id, &row_id).unwrap().tax_percent, FieldValue::Number(5.0));
        assert!(session.store().is_empty());

        session.update_field(&panel_id, &row_id, RowField::TaxPercent, " ").unwrap();
        assert!(session.row(&panel_id, &row_id).unwrap().tax_percent.is_empty());
    }

    #[test]
    fn test_malformed_document_resets() {
        for raw in ["{oops", r#"{"not":"a list"}"#, "[42]"] {
            let store = MemoryStore::with_entries([(PANELS_KEY, raw), (THEME_KEY, "dark")]);
            let session = Session::load(store).unwrap();
            assert_eq!(session.state().panels.len(), 1, "payload {}", raw);
            assert_eq!(session.state().panels[0].name, DEFAULT_PANEL_NAME);
            // Preferences are independent of the panel document
            assert_eq!(session.state().theme, Theme::Dark);
            // The discarded payload is still there until the next save
            assert_eq!(session.store().read(PANELS_KEY).unwrap().as_deref(), Some(raw));
        }
    }

    #[test]
    fn test_newer_schema_and_bad_version_reset() {
        for version in ["4", "three"] {
            let store = MemoryStore::with_entries([(PANELS_KEY, "[]"), (SCHEMA_VERSION_KEY, version)]);
            let session = Session::load(store).unwrap();
            assert_eq!(session.state().panels.len(), 1);
        }
    }

    #[test]
    fn test_stored_empty_list_is_kept() {
        let store = MemoryStore::with_entries([(PANELS_KEY, "[]"), (SCHEMA_VERSION_KEY, "3")]);
        let session = Session::load(store).unwrap();
        assert!(session.state().panels.is_empty());
    }

    #[test]
    fn test_bad_preferences_fall_back() {
        let store = MemoryStore::with_entries([(THEME_KEY, "purple"), (UI_SCALE_KEY, "huge")]);
        let session = Session::load(store).unwrap();
        assert_eq!(session.state().theme, Theme::Light);
        assert_eq!(session.state().ui_scale, 1.0);

        let store = MemoryStore::with_entries([(UI_SCALE_KEY, "3")]);
        assert_eq!(Session::load(store).unwrap().state().ui_scale, 1.2);
    }

    #[test]
    fn test_preferences_roundtrip() {
        let mut session = fresh();
        assert_eq!(session.toggle_theme().unwrap(), Theme::Dark);
        assert_eq!(session.set_ui_scale(0.75).unwrap(), 0.75);

        let mut session = reload(session);
        assert_eq!(session.state().theme, Theme::Dark);
        assert_eq!(session.state().ui_scale, 0.75);

        session.set_theme(Theme::Light).unwrap();
        assert_eq!(session.store().read(THEME_KEY).unwrap().as_deref(), Some("light"));
    }

    #[test]
    fn test_rates_from_formula_text() {
        let mut session = fresh();
        let panel_id = session.state().panels[0].id.clone();

        let settings = session.set_commission_rates(&panel_id, "1 + 0.5", "24 / 2").unwrap();
        assert_eq!(settings, CommissionSettings::new(1.5, 12.0));
        assert_eq!(session.panel(&panel_id).unwrap().rows[0].commission, FieldValue::Number(1.19));

        let err = session.set_commission_rates(&panel_id, "2", "12 +").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_FORMULA");
        assert_eq!(session.panel(&panel_id).unwrap().commission_settings, Some(settings));
    }

    #[test]
    fn test_formula_mode_flow() {
        let mut session = fresh();
        let panel_id = session.state().panels[0].id.clone();

        let err = session.apply_commission_formula(&panel_id, "5").unwrap_err();
        assert_eq!(err.error_code(), "COMMISSION_MODE_CONFLICT");

        session.clear_commission_settings(&panel_id).unwrap();
        assert_eq!(session.apply_commission_formula(&panel_id, "200 * 1.5%").unwrap(), Some(3.0));

        let session = reload(session);
        let panel = session.panel(&panel_id).unwrap();
        assert!(panel.commission_settings.is_none());
        assert_eq!(panel.commission_formula.as_deref(), Some("200 * 1.5%"));
        assert_eq!(panel.rows[0].commission, FieldValue::Number(3.0));
    }

    #[test]
    fn test_delete_panel_and_row() {
        let mut session = fresh();
        let panel_id = session.state().panels[0].id.clone();
        let row_id = session.state().panels[0].rows[0].id.clone();

        session.delete_row(&panel_id, &row_id).unwrap();
        assert!(session.panel(&panel_id).unwrap().rows.is_empty());

        session.delete_panel(&panel_id).unwrap();
        let session = reload(session);
        assert!(session.state().panels.is_empty());
    }

    #[test]
    fn test_fill_column_persists() {
        let mut session = fresh();
        let panel_id = session.state().panels[0].id.clone();
        let row_id = session.add_row(&panel_id).unwrap();

        assert_eq!(session.fill_column(&panel_id, RowField::TaxPercent).unwrap(), 1);
        assert_eq!(session.fill_column(&panel_id, RowField::TaxPercent).unwrap(), 0);

        let session = reload(session);
        assert_eq!(session.row(&panel_id, &row_id).unwrap().tax_percent, FieldValue::Number(5.0));
    }

    #[test]
    fn test_reset_clears_store() {
        let mut session = fresh();
        session.add_panel().unwrap();
        session.toggle_theme().unwrap();

        session.reset().unwrap();
        assert!(session.store().is_empty());
        assert_eq!(session.state().panels.len(), 1);
        assert_eq!(session.state().theme, Theme::Light);
    }

    #[test]
    fn test_failed_save_leaves_state_unchanged() {
        let mut session = Session::load(FlakyStore::default()).unwrap();
        let panel_id = session.add_panel().unwrap();
        let row_id = session.add_row(&panel_id).unwrap();
        let before = session.state().clone();
        let stored = session.store().inner.clone();

        session.store.failing = true;
        assert_eq!(session.add_panel().unwrap_err().error_code(), "STORAGE_ERROR");
        assert!(session.rename_panel(&panel_id, "Lost").is_err());
        assert!(session.update_field(&panel_id, &row_id, RowField::BasicRate, "500").is_err());
        assert!(session.delete_row(&panel_id, &row_id).is_err());
        assert!(session.delete_panel(&panel_id).is_err());
        assert!(session.toggle_theme().is_err());
        assert!(session.set_ui_scale(0.5).is_err());
        assert!(session.clear_commission_settings(&panel_id).is_err());

        assert_eq!(session.state(), &before);
        assert_eq!(session.store().inner, stored);

        session.store.failing = false;
        session.save().unwrap();
        let session = Session::load(session.into_store()).unwrap();
        assert_eq!(session.state(), &before);
    }

    #[test]
    fn test_failed_reset_keeps_everything() {
        let mut session = Session::load(FlakyStore::default()).unwrap();
        session.add_panel().unwrap();
        session.toggle_theme().unwrap();
        let before = session.state().clone();

        session.store.failing = true;
        assert!(session.reset().is_err());
        assert_eq!(session.state(), &before);
        assert_eq!(session.store().inner.len(), ALL_KEYS.len());
    }

    #[test]
    fn test_unnamed_panel_keeps_the_rest() {
        let raw = r#"[
            {"id":"p1","name":"Keep me","rows":[
                {"id":"r1","basicRate":100,"discount":10,"taxPercent":5,"commission":2,"freight":5}]},
            {"id":"p2","rows":[]}
        ]"#;
        let store = MemoryStore::with_entries([(PANELS_KEY, raw), (SCHEMA_VERSION_KEY, "3")]);
        let session = Session::load(store).unwrap();
        assert_eq!(session.state().panels.len(), 2);
        assert_eq!(session.panel("p1").unwrap().name, "Keep me");
        assert_eq!(session.panel("p1").unwrap().rows[0].result(), 97.5);
        assert_eq!(session.panel("p2").unwrap().name, "New Panel 2");
    }

    #[test]
    fn test_copy_panel() {
        struct Broken;
        impl Clipboard for Broken {
            fn copy_text(&mut self, _text: &str) -> bool {
                false
            }
        }

        let session = fresh();
        let panel_id = session.state().panels[0].id.clone();
        let before = session.state().clone();

        assert!(!session.copy_panel(&panel_id, &mut Broken).unwrap());
        assert_eq!(session.state(), &before);
        assert_eq!(
            session.copy_panel("missing", &mut Broken).unwrap_err().error_code(),
            "PANEL_NOT_FOUND"
        );
    }

    #[test]
    fn test_legacy_store_is_upgraded_on_load() {
        let legacy = r#"[{"id":"p1","name":"Old","rows":[
            {"id":"r1","basicRate":100,"discount":10,"taxPercent":5,"commission":2,"freight":5}]}]"#;
        let mut session = Session::load(MemoryStore::with_entries([(PANELS_KEY, legacy)])).unwrap();
        let panel = session.panel("p1").unwrap();
        assert_eq!(panel.commission_settings, Some(CommissionSettings::default()));
        assert_eq!(panel.rows[0].result(), 97.5);

        session.rename_freight_columns("p1", Some("Road"), None).unwrap();
        let session = reload(session);
        assert_eq!(session.panel("p1").unwrap().freight_name, "Road");
        assert_eq!(session.panel("p1").unwrap().freight2_name, "Freight 2");
    }
}
