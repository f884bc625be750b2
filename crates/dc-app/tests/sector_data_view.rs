//! Per-sector data and dashboard wiring.

mod support;

use std::sync::Arc;

use dc_app::{Dashboard, DashboardConfig};
use dc_core::{EnergyUnit, ScenarioKey, SectorName};
use dc_state::{ChartFingerprint, ChartKind, ZoomRange};
use support::{base_service, dashboard};

#[tokio::test(start_paused = true)]
async fn compared_sector_series_use_each_scenarios_horizon() {
    let service = Arc::new(base_service());
    let dashboard = dashboard(Arc::clone(&service));
    let view = dashboard.sector_data();

    view.compare(
        &ScenarioKey::from("Base"),
        &ScenarioKey::from("High Growth"),
        &SectorName::from("Domestic"),
    )
    .await
    .unwrap();
    view.settled().await;

    let base = view.primary_state().data.unwrap();
    let high = view.target_state().data.unwrap();
    assert_eq!(base.rows.last().map(|r| r.year), Some(2040));
    assert_eq!(high.rows.last().map(|r| r.year), Some(2060));

    let (history, projection) = base.split_at_forecast_start();
    assert_eq!(history.len(), 5);
    assert_eq!(projection.first().map(|r| r.year), Some(2011));

    let mwh = base.in_unit(EnergyUnit::Mwh);
    assert!((mwh.rows[0].values["SLR"] - 2.006).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn single_sector_view_drops_the_comparison_side() {
    let dashboard = dashboard(Arc::new(base_service()));
    let view = dashboard.sector_data();
    let domestic = SectorName::from("Domestic");

    view.compare(&ScenarioKey::from("Base"), &ScenarioKey::from("High Growth"), &domestic)
        .await
        .unwrap();
    view.settled().await;
    view.show(&ScenarioKey::from("Base"), &domestic).await.unwrap();

    assert_eq!(view.target_state().data, None);
    view.settled().await;
    assert!(view.primary_state().data.is_some());
}

#[tokio::test(start_paused = true)]
async fn dashboard_state_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = DashboardConfig::default();
    config.service.project_path = "/projects/test".to_string();
    config.state.snapshot_path = Some(dir.path().join("dashboard.json"));

    let base = ScenarioKey::from("Base");
    let chart = ChartFingerprint::new(ChartKind::Line, "Base");
    {
        let dashboard = Dashboard::new(config.clone(), Arc::new(base_service()));
        dashboard.open_scenario(&base).await.unwrap();
        dashboard.store().toggle_series(&chart, "Solar");
        dashboard
            .store()
            .set_zoom(&chart, Some(ZoomRange { min: 2010.0, max: 2030.0 }));
    }

    let restarted = Dashboard::new(config, Arc::new(base_service()));
    assert_eq!(restarted.store().active_scenario(), Some(base.clone()));
    let restored = restarted.store().chart(&chart);
    assert!(restored.hidden_series.contains("Solar"));
    assert_eq!(restored.zoom_range, Some(ZoomRange { min: 2010.0, max: 2030.0 }));
    assert_eq!(restarted.store().get(&base).time_range.end, 2040);
}
