//! Wiring of the application services from a config.

use std::sync::Arc;

use dc_client::{AnalysisService, HttpAnalysisService};
use dc_core::{DemandType, EnergyUnit, ScenarioKey, TimeRange, Year};
use dc_dispatch::RequestDispatcher;
use dc_state::{JsonFileSink, ScenarioPatch, ScenarioState, ScenarioStore};

use crate::catalog::ScenarioCatalog;
use crate::config::DashboardConfig;
use crate::consolidated::ConsolidatedOrchestrator;
use crate::defaults::ModelDefaults;
use crate::error::AppResult;
use crate::progress::ForecastProgressConsumer;
use crate::sector_data::SectorDataView;

/// View choices a frontend applies to a scenario. Unset fields are left as stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewSettings {
    pub start: Option<Year>,
    pub end: Option<Year>,
    pub demand_type: Option<DemandType>,
    pub unit: Option<EnergyUnit>,
}

impl ViewSettings {
    fn patch(&self, state: &ScenarioState) -> AppResult<ScenarioPatch> {
        let mut patch = ScenarioPatch::default();
        if self.start.is_some() || self.end.is_some() {
            let range = TimeRange::new(
                self.start.unwrap_or(state.time_range.start),
                self.end.unwrap_or(state.time_range.end),
            )?;
            patch = patch.time_range(range);
        }
        if let Some(demand_type) = self.demand_type {
            patch = patch.demand_type(demand_type);
        }
        if let Some(unit) = self.unit {
            patch = patch.unit(unit);
        }
        Ok(patch)
    }
}

/// Everything a frontend needs, sharing one dispatcher and one store.
pub struct Dashboard {
    config: DashboardConfig,
    dispatcher: RequestDispatcher,
    store: Arc<ScenarioStore>,
    catalog: Arc<ScenarioCatalog>,
    defaults: Arc<ModelDefaults>,
    consolidated: ConsolidatedOrchestrator,
    sector_data: SectorDataView,
    forecasts: ForecastProgressConsumer,
}

impl Dashboard {
    /// Dashboard talking to the configured HTTP service.
    pub fn connect(config: DashboardConfig) -> Self {
        let service = Arc::new(HttpAnalysisService::new(config.service.base_url.clone()));
        Self::new(config, service)
    }

    pub fn new(config: DashboardConfig, service: Arc<dyn AnalysisService>) -> Self {
        let dispatcher = RequestDispatcher::new(config.dispatcher.to_dispatcher_config());
        let store_defaults = config.defaults.store_defaults();
        let store = Arc::new(match &config.state.snapshot_path {
            Some(path) => ScenarioStore::with_sink(store_defaults, Arc::new(JsonFileSink::new(path))),
            None => ScenarioStore::new(store_defaults),
        });
        let project = config.service.project_path.clone();

        let catalog = Arc::new(ScenarioCatalog::new(
            Arc::clone(&service),
            dispatcher.clone(),
            Arc::clone(&store),
            project.clone(),
        ));
        let defaults = Arc::new(ModelDefaults::new(
            Arc::clone(&catalog),
            Arc::clone(&store),
            config.defaults.preferred_models.clone(),
        ));
        let consolidated = ConsolidatedOrchestrator::new(
            Arc::clone(&service),
            dispatcher.clone(),
            Arc::clone(&store),
            Arc::clone(&catalog),
            Arc::clone(&defaults),
        );
        let sector_data = SectorDataView::new(
            Arc::clone(&service),
            dispatcher.clone(),
            Arc::clone(&store),
            Arc::clone(&catalog),
        );
        let forecasts = ForecastProgressConsumer::new(service, project);

        Self {
            config,
            dispatcher,
            store,
            catalog,
            defaults,
            consolidated,
            sector_data,
            forecasts,
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &RequestDispatcher {
        &self.dispatcher
    }

    pub fn store(&self) -> &Arc<ScenarioStore> {
        &self.store
    }

    pub fn catalog(&self) -> &Arc<ScenarioCatalog> {
        &self.catalog
    }

    pub fn defaults(&self) -> &Arc<ModelDefaults> {
        &self.defaults
    }

    pub fn consolidated(&self) -> &ConsolidatedOrchestrator {
        &self.consolidated
    }

    pub fn sector_data(&self) -> &SectorDataView {
        &self.sector_data
    }

    pub fn forecasts(&self) -> &ForecastProgressConsumer {
        &self.forecasts
    }

    /// Load a scenario's metadata, make it the active scenario and return its state.
    pub async fn open_scenario(&self, key: &ScenarioKey) -> AppResult<ScenarioState> {
        self.catalog.profile(key).await?;
        self.store.set_active_scenario(Some(key.clone()));
        Ok(self.store.get(key))
    }

    /// Write `view` into the stored state of every scenario in `keys`.
    ///
    /// Each scenario's metadata is loaded first so the range is clamped to its
    /// own horizon. The active scenario is not changed.
    pub async fn apply_view(&self, keys: &[&ScenarioKey], view: &ViewSettings) -> AppResult<()> {
        for key in keys {
            self.catalog.profile(key).await?;
            let patch = view.patch(&self.store.get(key))?;
            self.store.update(key, patch)?;
        }
        Ok(())
    }

    /// Drop cached metadata after the scenario changed upstream, e.g. a finished forecast.
    pub async fn reload_scenario(&self, key: &ScenarioKey) -> AppResult<ScenarioState> {
        self.catalog.invalidate(key);
        self.open_scenario(key).await
    }
}
