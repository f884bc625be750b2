//! Scripted in-memory analysis service.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dc_app::{Dashboard, DashboardConfig};
use dc_client::*;
use dc_core::{ModelId, ScenarioKey, SectorName, Year};
use parking_lot::Mutex;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Default)]
pub struct MockScenario {
    pub sectors: Vec<SectorName>,
    pub models: AvailableModels,
    pub target_year: Option<Year>,
    pub latency: Duration,
    pub models_latency: Duration,
    pub consolidated_failure: Option<ServiceError>,
}

#[derive(Default)]
pub struct MockService {
    scenarios: Mutex<BTreeMap<ScenarioKey, MockScenario>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    pub consolidated_requests: Mutex<Vec<ConsolidatedRequest>>,
    pub sector_requests: Mutex<Vec<SectorDataRequest>>,
    pub submitted: Mutex<Vec<ForecastRequest>>,
    progress_script: Mutex<Option<Vec<ServiceResult<ProgressEvent>>>>,
    progress_refused: Mutex<Option<ServiceError>>,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a scenario whose sectors offer the given models.
    pub fn with_scenario(
        self,
        name: &str,
        sectors: Vec<(&str, Vec<&str>)>,
        target_year: Option<Year>,
    ) -> Self {
        let scenario = MockScenario {
            sectors: sectors.iter().map(|(s, _)| SectorName::from(*s)).collect(),
            models: sectors
                .into_iter()
                .map(|(s, models)| (SectorName::from(s), models.into_iter().map(ModelId::from).collect()))
                .collect(),
            target_year,
            ..MockScenario::default()
        };
        self.scenarios.lock().insert(ScenarioKey::from(name), scenario);
        self
    }

    pub fn with_latency(self, name: &str, latency: Duration) -> Self {
        self.edit(name, |s| s.latency = latency);
        self
    }

    pub fn with_models_latency(self, name: &str, latency: Duration) -> Self {
        self.edit(name, |s| s.models_latency = latency);
        self
    }

    pub fn failing_consolidated(self, name: &str, error: ServiceError) -> Self {
        self.edit(name, |s| s.consolidated_failure = Some(error));
        self
    }

    pub fn with_progress(self, events: Vec<ServiceResult<ProgressEvent>>) -> Self {
        *self.progress_script.lock() = Some(events);
        self
    }

    pub fn refusing_progress(self, error: ServiceError) -> Self {
        *self.progress_refused.lock() = Some(error);
        self
    }

    pub fn edit(&self, name: &str, f: impl FnOnce(&mut MockScenario)) {
        if let Some(scenario) = self.scenarios.lock().get_mut(&ScenarioKey::from(name)) {
            f(scenario);
        }
    }

    pub fn calls(&self, operation: &str) -> usize {
        self.calls.lock().get(operation).copied().unwrap_or(0)
    }

    fn record(&self, operation: &'static str) {
        *self.calls.lock().entry(operation).or_default() += 1;
    }

    fn scenario(&self, key: &ScenarioKey) -> ServiceResult<MockScenario> {
        self.scenarios
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| ServiceError::Application(format!("Unknown scenario {key}")))
    }
}

/// One row per year; every selected sector contributes `year * 1000` kWh.
fn consolidated_rows(request: &ConsolidatedRequest) -> Vec<SeriesRow> {
    (request.start_year..=request.end_year)
        .map(|year| SeriesRow {
            year,
            values: request
                .selected_models
                .keys()
                .map(|sector| (sector.as_str().to_string(), year as f64 * 1000.0))
                .collect(),
        })
        .collect()
}

#[async_trait]
impl AnalysisService for MockService {
    async fn list_scenarios(&self, _project: &str) -> ServiceResult<Vec<ScenarioKey>> {
        self.record("list_scenarios");
        Ok(self.scenarios.lock().keys().cloned().collect())
    }

    async fn list_sectors(
        &self,
        _project: &str,
        scenario: &ScenarioKey,
    ) -> ServiceResult<Vec<SectorName>> {
        self.record("list_sectors");
        Ok(self.scenario(scenario)?.sectors)
    }

    async fn list_models(
        &self,
        _project: &str,
        scenario: &ScenarioKey,
    ) -> ServiceResult<AvailableModels> {
        self.record("list_models");
        let scenario = self.scenario(scenario)?;
        tokio::time::sleep(scenario.models_latency).await;
        Ok(scenario.models)
    }

    async fn scenario_meta(
        &self,
        _project: &str,
        scenario: &ScenarioKey,
    ) -> ServiceResult<ScenarioMeta> {
        self.record("scenario_meta");
        Ok(ScenarioMeta {
            target_year: self.scenario(scenario)?.target_year,
        })
    }

    async fn fetch_sector_data(&self, request: &SectorDataRequest) -> ServiceResult<SectorDataset> {
        self.record("fetch_sector_data");
        self.sector_requests.lock().push(request.clone());
        let scenario = self.scenario(&request.scenario)?;
        tokio::time::sleep(scenario.latency).await;
        Ok(SectorDataset {
            rows: (request.start_year..=request.end_year)
                .map(|year| SeriesRow {
                    year,
                    values: [("SLR".to_string(), year as f64)].into_iter().collect(),
                })
                .collect(),
            forecast_start_year: Some(request.start_year + 5),
            unit: Default::default(),
        })
    }

    async fn fetch_consolidated(
        &self,
        request: &ConsolidatedRequest,
    ) -> ServiceResult<ConsolidatedDataset> {
        self.record("fetch_consolidated");
        self.consolidated_requests.lock().push(request.clone());
        let scenario = self.scenario(&request.scenario)?;
        tokio::time::sleep(scenario.latency).await;
        if let Some(err) = scenario.consolidated_failure {
            return Err(err);
        }
        Ok(ConsolidatedDataset {
            rows: consolidated_rows(request),
            unit: Default::default(),
        })
    }

    async fn submit_forecast(&self, request: &ForecastRequest) -> ServiceResult<()> {
        self.record("submit_forecast");
        self.submitted.lock().push(request.clone());
        Ok(())
    }

    async fn open_progress_channel(&self, _project: &str) -> ServiceResult<ProgressReceiver> {
        self.record("open_progress_channel");
        if let Some(err) = self.progress_refused.lock().clone() {
            return Err(err);
        }
        let script = self.progress_script.lock().take().unwrap_or_default();
        let (tx, rx) = mpsc::channel(script.len().max(1));
        tokio::spawn(async move {
            for event in script {
                tokio::time::sleep(Duration::from_millis(10)).await;
                if tx.send(event).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }
}

pub fn dashboard(service: Arc<MockService>) -> Dashboard {
    let mut config = DashboardConfig::default();
    config.service.project_path = "/projects/test".to_string();
    Dashboard::new(config, service)
}

/// Three sectors, SLR preferred where offered.
pub fn base_service() -> MockService {
    MockService::new()
        .with_scenario(
            "Base",
            vec![
                ("Domestic", vec!["MLR", "SLR"]),
                ("Commercial", vec!["WAM"]),
                ("Industrial", vec!["SLR", "WAM"]),
            ],
            Some(2040),
        )
        .with_scenario(
            "High Growth",
            vec![("Domestic", vec!["SLR"]), ("Commercial", vec!["SLR"])],
            Some(2060),
        )
}
