use std::sync::Arc;

use dc_core::*;
use dc_state::*;

fn key(name: &str) -> ScenarioKey {
    ScenarioKey::from(name)
}

fn two_sector_profile() -> ScenarioProfile {
    ScenarioProfile::new(
        vec![SectorName::from("Domestic"), SectorName::from("Commercial")],
        Some(2045),
    )
}

fn populate(store: &ScenarioStore) {
    store.register_profile(&key("Base"), two_sector_profile());
    store
        .update(
            &key("Base"),
            ScenarioPatch::default()
                .time_range(TimeRange::new(2010, 2040).unwrap())
                .unit(EnergyUnit::Gwh)
                .active_selection(ActiveSelection::Losses)
                .demand_type(DemandType::OnGrid)
                .comparison_target(Some(key("High Growth"))),
        )
        .unwrap();
    store
        .set_model_selection(&key("Base"), "Domestic".into(), "MLR".into())
        .unwrap();
    let chart = ChartFingerprint::new(ChartKind::StackedBar, "Base");
    store.toggle_series(&chart, "Commercial");
    store.set_zoom(&chart, Some(ZoomRange { min: 2015.0, max: 2030.0 }));
    store.set_active_scenario(Some(key("Base")));
}

#[test]
fn memory_sink_restores_identical_state() {
    let sink = Arc::new(MemorySink::new());
    let store = ScenarioStore::with_sink(StoreDefaults::default(), sink.clone());
    populate(&store);
    let before = store.get(&key("Base"));

    let restored = ScenarioStore::with_sink(StoreDefaults::default(), sink);
    assert_eq!(restored.get(&key("Base")), before);
    assert_eq!(restored.active_scenario(), Some(key("Base")));
}

#[test]
fn json_file_sink_restores_identical_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("dashboard.json");

    let store = ScenarioStore::with_sink(
        StoreDefaults::default(),
        Arc::new(JsonFileSink::new(&path)),
    );
    populate(&store);
    let before = store.get(&key("Base"));
    assert!(path.exists());

    let restored = ScenarioStore::with_sink(
        StoreDefaults::default(),
        Arc::new(JsonFileSink::new(&path)),
    );
    assert_eq!(restored.get(&key("Base")), before);
    let chart = restored.chart(&ChartFingerprint::new(ChartKind::StackedBar, "Base"));
    assert!(chart.hidden_series.contains("Commercial"));
    assert_eq!(chart.zoom_range, Some(ZoomRange { min: 2015.0, max: 2030.0 }));
}

#[test]
fn untouched_restored_scenarios_are_kept_on_save() {
    let sink = Arc::new(MemorySink::new());
    let store = ScenarioStore::with_sink(StoreDefaults::default(), sink.clone());
    populate(&store);

    let restored = ScenarioStore::with_sink(StoreDefaults::default(), sink.clone());
    restored
        .update(&key("Other"), ScenarioPatch::default().unit(EnergyUnit::Twh))
        .unwrap();
    assert_eq!(restored.scenario_keys(), vec![key("Base"), key("Other")]);

    let snapshot = StoreSnapshot::from_json(&sink.contents().unwrap()).unwrap();
    assert!(snapshot.scenarios.contains_key(&key("Base")));
    assert_eq!(snapshot.scenarios[&key("Other")].unit, EnergyUnit::Twh);
}

#[test]
fn foreign_version_snapshot_is_discarded() {
    let sink = Arc::new(MemorySink::with_contents(
        r#"{"version": 42, "saved_at": "2026-01-01T00:00:00Z", "scenarios": {}}"#,
    ));
    let store = ScenarioStore::with_sink(StoreDefaults::default(), sink);
    assert!(store.scenario_keys().is_empty());
    assert_eq!(store.active_scenario(), None);
    assert_eq!(store.get(&key("Base")).unit, EnergyUnit::Kwh);
}

#[test]
fn garbage_snapshot_is_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dashboard.json");
    std::fs::write(&path, "not json").unwrap();

    let store = ScenarioStore::with_sink(StoreDefaults::default(), Arc::new(JsonFileSink::new(&path)));
    assert!(store.scenario_keys().is_empty());
}

#[test]
fn restored_state_is_reconciled_against_new_metadata() {
    let sink = Arc::new(MemorySink::new());
    let store = ScenarioStore::with_sink(StoreDefaults::default(), sink.clone());
    populate(&store);
    store
        .update(
            &key("Base"),
            ScenarioPatch::default().active_selection(ActiveSelection::Sector("Commercial".into())),
        )
        .unwrap();

    let restored = ScenarioStore::with_sink(StoreDefaults::default(), sink);
    restored.register_profile(
        &key("Base"),
        ScenarioProfile::new(vec![SectorName::from("Domestic")], Some(2030)),
    );
    let state = restored.get(&key("Base"));
    assert_eq!(state.time_range, TimeRange { start: 2010, end: 2030 });
    assert_eq!(state.active_selection, ActiveSelection::Sector("Domestic".into()));
    assert_eq!(state.model_selections.len(), 1);
}
