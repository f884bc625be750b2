//! Cached scenario metadata.

use std::collections::HashMap;
use std::sync::Arc;

use dc_client::{AnalysisService, AvailableModels};
use dc_core::ScenarioKey;
use dc_dispatch::RequestDispatcher;
use dc_state::{ScenarioProfile, ScenarioStore};
use parking_lot::Mutex;
use tokio::sync::OnceCell;

use crate::error::AppResult;

/// Per-scenario sector list, horizon and available models.
///
/// Each item is fetched at most once per key, even under concurrent callers;
/// failed fetches are not cached. Loading a profile registers it with the
/// store so clamping and selection checks use live metadata.
pub struct ScenarioCatalog {
    service: Arc<dyn AnalysisService>,
    dispatcher: RequestDispatcher,
    store: Arc<ScenarioStore>,
    project: String,
    entries: Mutex<HashMap<ScenarioKey, Arc<CatalogEntry>>>,
}

#[derive(Default)]
struct CatalogEntry {
    profile: OnceCell<ScenarioProfile>,
    models: OnceCell<AvailableModels>,
    /// Serializes default derivation for the scenario.
    derivation: Arc<tokio::sync::Mutex<()>>,
}

impl ScenarioCatalog {
    pub fn new(
        service: Arc<dyn AnalysisService>,
        dispatcher: RequestDispatcher,
        store: Arc<ScenarioStore>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            service,
            dispatcher,
            store,
            project: project.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub async fn scenarios(&self) -> AppResult<Vec<ScenarioKey>> {
        let scenarios = self
            .dispatcher
            .enqueue(|| self.service.list_scenarios(&self.project))
            .await?;
        Ok(scenarios)
    }

    pub async fn profile(&self, key: &ScenarioKey) -> AppResult<ScenarioProfile> {
        let entry = self.entry(key);
        let profile = entry
            .profile
            .get_or_try_init(|| async {
                let (sectors, meta) = tokio::try_join!(
                    self.dispatcher
                        .enqueue(|| self.service.list_sectors(&self.project, key)),
                    self.dispatcher
                        .enqueue(|| self.service.scenario_meta(&self.project, key)),
                )?;
                let profile = ScenarioProfile::new(sectors, meta.target_year);
                tracing::debug!(
                    scenario = %key,
                    sectors = profile.sectors.len(),
                    max_year = profile.max_year,
                    "catalog.profile_loaded"
                );
                self.store.register_profile(key, profile.clone());
                AppResult::Ok(profile)
            })
            .await?;
        Ok(profile.clone())
    }

    pub async fn models(&self, key: &ScenarioKey) -> AppResult<AvailableModels> {
        let entry = self.entry(key);
        let models = entry
            .models
            .get_or_try_init(|| async {
                let models = self
                    .dispatcher
                    .enqueue(|| self.service.list_models(&self.project, key))
                    .await?;
                tracing::debug!(scenario = %key, sectors = models.len(), "catalog.models_loaded");
                AppResult::Ok(models)
            })
            .await?;
        Ok(models.clone())
    }

    /// Lock held while defaults are derived for `key`. Dropped with the
    /// rest of the entry on [`invalidate`](Self::invalidate).
    pub fn derivation_lock(&self, key: &ScenarioKey) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(&self.entry(key).derivation)
    }

    /// Whether anything is cached for `key`.
    pub fn is_cached(&self, key: &ScenarioKey) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Forget everything cached for `key`.
    pub fn invalidate(&self, key: &ScenarioKey) {
        if self.entries.lock().remove(key).is_some() {
            tracing::debug!(scenario = %key, "catalog.invalidate");
        }
    }

    fn entry(&self, key: &ScenarioKey) -> Arc<CatalogEntry> {
        Arc::clone(self.entries.lock().entry(key.clone()).or_default())
    }
}
