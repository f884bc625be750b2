//! Per-sector time series for one scenario or a compared pair.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dc_client::{AnalysisService, SectorDataRequest, SectorDataset};
use dc_core::{ScenarioKey, SectorName};
use dc_dispatch::{FetchBinding, FetchState, RequestDispatcher};
use dc_state::ScenarioStore;

use crate::catalog::ScenarioCatalog;
use crate::error::AppResult;
use crate::resources::SectorResource;

/// Sector table bindings. In comparison mode each scenario's range is
/// clamped to its own max year.
pub struct SectorDataView {
    store: Arc<ScenarioStore>,
    catalog: Arc<ScenarioCatalog>,
    primary: FetchBinding<SectorResource>,
    target: FetchBinding<SectorResource>,
    generation: AtomicU64,
}

impl SectorDataView {
    pub fn new(
        service: Arc<dyn AnalysisService>,
        dispatcher: RequestDispatcher,
        store: Arc<ScenarioStore>,
        catalog: Arc<ScenarioCatalog>,
    ) -> Self {
        let resource = Arc::new(SectorResource::new(service));
        Self {
            store,
            catalog,
            primary: FetchBinding::new(Arc::clone(&resource), dispatcher.clone()),
            target: FetchBinding::new(resource, dispatcher),
            generation: AtomicU64::new(0),
        }
    }

    pub async fn show(&self, key: &ScenarioKey, sector: &SectorName) -> AppResult<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.target.clear();
        self.load(&self.primary, key, sector, generation).await
    }

    /// Load `sector` for both scenarios. A failure on one side leaves the other untouched.
    pub async fn compare(
        &self,
        primary: &ScenarioKey,
        target: &ScenarioKey,
        sector: &SectorName,
    ) -> AppResult<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (a, b) = tokio::join!(
            self.load(&self.primary, primary, sector, generation),
            self.load(&self.target, target, sector, generation),
        );
        a.and(b)
    }

    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.primary.clear();
        self.target.clear();
    }

    pub fn primary_state(&self) -> FetchState<SectorDataset> {
        self.primary.state()
    }

    pub fn target_state(&self) -> FetchState<SectorDataset> {
        self.target.state()
    }

    pub fn retry(&self) {
        for binding in [&self.primary, &self.target] {
            if binding.state().error.is_some() {
                binding.retry();
            }
        }
    }

    pub async fn settled(&self) {
        tokio::join!(self.primary.settled(), self.target.settled());
    }

    async fn load(
        &self,
        binding: &FetchBinding<SectorResource>,
        key: &ScenarioKey,
        sector: &SectorName,
        generation: u64,
    ) -> AppResult<()> {
        let profile = self.catalog.profile(key).await;
        if self.generation.load(Ordering::SeqCst) != generation {
            return profile.map(|_| ());
        }
        match profile {
            Ok(profile) => {
                let range = self.store.get(key).time_range.clamped_to(profile.max_year);
                binding.set(
                    SectorDataRequest::new(self.catalog.project(), key.clone(), sector.clone(), range),
                    true,
                );
                Ok(())
            }
            Err(err) => {
                binding.block(err.to_binding_error());
                Err(err)
            }
        }
    }
}
