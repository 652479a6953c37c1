//! End-to-end session behaviour over both store implementations.

use rate_core::export::export_panel_tsv;
use rate_core::migration::CURRENT_SCHEMA_VERSION;
use rate_core::storage::{FileStore, KeyValueStore, MemoryStore, PANELS_KEY, SCHEMA_VERSION_KEY};
use rate_core::{FieldValue, RowField, Session, Theme};
use tempfile::tempdir;

const LEGACY_PANELS: &str = r#"[
    {
        "id": "legacy",
        "name": "Legacy Rates",
        "commissionFormula": "100 * 2%",
        "rows": [
            {"id": "a", "basicRate": 100, "discount": 10, "taxPercent": 5, "commission": 2, "freight": 5},
            {"id": "b", "basicRate": 40, "discount": 60, "taxPercent": "", "commission": "", "freight": 1}
        ]
    }
]"#;

fn build_price_list<S: KeyValueStore>(session: &mut Session<S>) -> String {
    let panel_id = session.add_panel().unwrap();
    session.rename_panel(&panel_id, "Wholesale").unwrap();

    let first = session.add_row(&panel_id).unwrap();
    session.update_field(&panel_id, &first, RowField::BasicRate, "1000").unwrap();
    session.update_field(&panel_id, &first, RowField::Discount, "100").unwrap();
    session.update_field(&panel_id, &first, RowField::TaxPercent, "18").unwrap();
    session.update_field(&panel_id, &first, RowField::Freight, "25").unwrap();

    let second = session.add_row(&panel_id).unwrap();
    session.update_field(&panel_id, &second, RowField::BasicRate, "500").unwrap();
    session.fill_column(&panel_id, RowField::TaxPercent).unwrap();
    session.fill_column(&panel_id, RowField::Discount).unwrap();

    panel_id
}

#[test]
fn memory_session_full_flow() {
    let mut session = Session::load(MemoryStore::new()).unwrap();
    let panel_id = build_price_list(&mut session);

    let panel = session.panel(&panel_id).unwrap();
    // 900 * 1.5% * 0.88 = 11.88, then (900 + 162 - 11.88) + 25
    assert_eq!(panel.rows[0].commission, FieldValue::Number(11.88));
    assert_eq!(panel.rows[0].result(), 1075.12);
    // discount filled from row one: 400 * 1.5% * 0.88 = 5.28
    assert_eq!(panel.rows[1].commission, FieldValue::Number(5.28));
    assert_eq!(panel.rows[1].result(), 466.72);

    let tsv = export_panel_tsv(panel);
    assert!(tsv.contains("1000\t100\t18\t11.88\t25\t1075.12\n"));
}

#[test]
fn legacy_document_upgrades_and_persists_current_schema() {
    let store = MemoryStore::with_entries([(PANELS_KEY, LEGACY_PANELS)]);
    let mut session = Session::load(store).unwrap();

    let panel = session.panel("legacy").unwrap();
    assert_eq!(panel.rows[0].result(), 97.5);
    // net is not floored in the row result
    assert_eq!(panel.rows[1].result(), -19.0);
    assert_eq!(panel.commission_formula.as_deref(), Some("100 * 2%"));

    // Any mutation rewrites the document in the current schema
    session.toggle_theme().unwrap();
    let version = session.store().read(SCHEMA_VERSION_KEY).unwrap();
    assert_eq!(version, Some(CURRENT_SCHEMA_VERSION.to_string()));

    let reloaded = Session::load(session.into_store()).unwrap();
    let panel = reloaded.panel("legacy").unwrap();
    assert_eq!(panel.freight2_name, "Freight 2");
    assert_eq!(panel.rows[1].commission, FieldValue::Empty);
    assert_eq!(reloaded.state().theme, Theme::Dark);
}

#[test]
fn file_session_survives_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ratecalc.json");

    let panel_id = {
        let mut session = Session::load(FileStore::open(&path).unwrap()).unwrap();
        let panel_id = build_price_list(&mut session);
        session.set_ui_scale(0.9).unwrap();
        panel_id
    };

    let session = Session::load(FileStore::open(&path).unwrap()).unwrap();
    assert_eq!(session.state().panels.len(), 2);
    assert_eq!(session.state().ui_scale, 0.9);
    assert_eq!(session.panel(&panel_id).unwrap().name, "Wholesale");
    assert_eq!(session.panel(&panel_id).unwrap().results(), vec![1075.12, 466.72]);
}

#[test]
fn file_session_reset_and_corrupt_panels() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ratecalc.json");

    let mut store = FileStore::open(&path).unwrap();
    store.write(PANELS_KEY, "[{\"name\": 7}]").unwrap();

    let mut session = Session::load(store).unwrap();
    assert_eq!(session.state().panels[0].name, "General Rates");

    session.reset().unwrap();
    let store = FileStore::open(&path).unwrap();
    assert_eq!(store.read(PANELS_KEY).unwrap(), None);
}
