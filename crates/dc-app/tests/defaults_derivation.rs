//! Default model derivation against a scripted service.

mod support;

use std::sync::Arc;
use std::time::Duration;

use dc_app::AppError;
use dc_core::{ModelId, ScenarioKey, SectorName};
use support::{base_service, dashboard, MockService};

fn sector(name: &str) -> SectorName {
    SectorName::from(name)
}

#[tokio::test(start_paused = true)]
async fn repeated_derivation_is_stable_and_lists_models_once() {
    let service = Arc::new(base_service());
    let dashboard = dashboard(Arc::clone(&service));
    let key = ScenarioKey::from("Base");

    let first = dashboard.defaults().ensure_model_selections(&key).await.unwrap();
    let second = dashboard.defaults().ensure_model_selections(&key).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(service.calls("list_models"), 1);
    assert_eq!(first[&sector("Domestic")], ModelId::from("SLR"));
    assert_eq!(first[&sector("Commercial")], ModelId::from("WAM"));
    assert_eq!(first[&sector("Industrial")], ModelId::from("SLR"));
    assert_eq!(dashboard.store().get(&key).model_selections, first);
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_one_derivation() {
    let service = Arc::new(base_service());
    let dashboard = dashboard(Arc::clone(&service));
    let key = ScenarioKey::from("Base");

    let (a, b) = tokio::join!(
        dashboard.defaults().ensure_model_selections(&key),
        dashboard.defaults().ensure_model_selections(&key),
    );
    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(service.calls("list_models"), 1);
    assert_eq!(service.calls("list_sectors"), 1);
}

#[tokio::test(start_paused = true)]
async fn later_user_choice_is_never_overwritten() {
    let service = Arc::new(base_service());
    let dashboard = dashboard(Arc::clone(&service));
    let key = ScenarioKey::from("Base");

    dashboard.defaults().ensure_model_selections(&key).await.unwrap();
    dashboard
        .store()
        .set_model_selection(&key, sector("Domestic"), ModelId::from("MLR"))
        .unwrap();

    let again = dashboard.defaults().ensure_model_selections(&key).await.unwrap();
    assert_eq!(again[&sector("Domestic")], ModelId::from("MLR"));
    assert_eq!(again.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn choice_made_while_models_load_is_kept() {
    let service = Arc::new(
        base_service().with_models_latency("Base", Duration::from_millis(300)),
    );
    let dashboard = dashboard(Arc::clone(&service));
    let key = ScenarioKey::from("Base");

    let (derived, chosen) = tokio::join!(
        dashboard.defaults().ensure_model_selections(&key),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            dashboard
                .store()
                .set_model_selection(&key, sector("Domestic"), ModelId::from("MLR"))
        },
    );
    chosen.unwrap();
    let derived = derived.unwrap();

    assert_eq!(derived[&sector("Domestic")], ModelId::from("MLR"));
    assert_eq!(derived.len(), 3);
    let stored = dashboard.store().get(&key).model_selections;
    assert_eq!(stored[&sector("Domestic")], ModelId::from("MLR"));
    assert_eq!(stored, derived);
}

#[tokio::test(start_paused = true)]
async fn reload_forgets_the_scenario_and_derives_again() {
    let service = Arc::new(base_service());
    let dashboard = dashboard(Arc::clone(&service));
    let key = ScenarioKey::from("Base");

    dashboard.defaults().ensure_model_selections(&key).await.unwrap();
    assert!(dashboard.catalog().is_cached(&key));

    dashboard.catalog().invalidate(&key);
    assert!(!dashboard.catalog().is_cached(&key));

    let again = dashboard.defaults().ensure_model_selections(&key).await.unwrap();
    assert_eq!(again.len(), 3);
    assert_eq!(service.calls("list_sectors"), 2);
}

#[tokio::test(start_paused = true)]
async fn partial_map_is_completed_around_existing_entries() {
    let service = Arc::new(base_service());
    let dashboard = dashboard(Arc::clone(&service));
    let key = ScenarioKey::from("Base");

    dashboard.open_scenario(&key).await.unwrap();
    dashboard
        .store()
        .set_model_selection(&key, sector("Industrial"), ModelId::from("WAM"))
        .unwrap();

    let derived = dashboard.defaults().ensure_model_selections(&key).await.unwrap();
    assert_eq!(derived[&sector("Industrial")], ModelId::from("WAM"));
    assert_eq!(derived[&sector("Domestic")], ModelId::from("SLR"));
    assert_eq!(derived.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn sector_without_models_blocks_and_writes_nothing() {
    let service = Arc::new(MockService::new().with_scenario(
        "Sparse",
        vec![("Domestic", vec!["SLR"]), ("Agriculture", vec![])],
        None,
    ));
    let dashboard = dashboard(Arc::clone(&service));
    let key = ScenarioKey::from("Sparse");

    let err = dashboard
        .defaults()
        .ensure_model_selections(&key)
        .await
        .unwrap_err();
    match err {
        AppError::NoModelsAvailable { scenario, sectors } => {
            assert_eq!(scenario, key);
            assert_eq!(sectors, vec![sector("Agriculture")]);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(dashboard.store().get(&key).model_selections.is_empty());
}
