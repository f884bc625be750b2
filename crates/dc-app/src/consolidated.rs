//! Consolidated projection in single-scenario and comparison mode.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dc_client::{AnalysisService, ConsolidatedDataset, ConsolidatedRequest};
use dc_core::{ActiveSelection, DemandType, EnergyUnit, ScenarioKey, TimeRange, Year};
use dc_dispatch::{FetchBinding, FetchState, RequestDispatcher};
use dc_state::{ScenarioPatch, ScenarioProfile, ScenarioStore};
use parking_lot::Mutex;

use crate::catalog::ScenarioCatalog;
use crate::defaults::ModelDefaults;
use crate::error::{AppError, AppResult};
use crate::resources::ConsolidatedResource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewMode {
    Single(ScenarioKey),
    Comparison {
        primary: ScenarioKey,
        target: ScenarioKey,
    },
}

impl ViewMode {
    pub fn scenarios(&self) -> Vec<&ScenarioKey> {
        match self {
            ViewMode::Single(key) => vec![key],
            ViewMode::Comparison { primary, target } => vec![primary, target],
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ModeState {
    mode: Option<ViewMode>,
    /// End year of the primary scenario when comparison was entered.
    restore_end: Option<Year>,
}

/// Drives the consolidated fetches of the dashboard.
///
/// Single mode uses one binding; comparison mode uses one binding per side so
/// each side loads, fails and retries on its own. Every entry point clears the
/// bindings of the mode being left before any request is issued, and a
/// generation counter keeps a slow entry point from overwriting a newer one.
pub struct ConsolidatedOrchestrator {
    store: Arc<ScenarioStore>,
    catalog: Arc<ScenarioCatalog>,
    defaults: Arc<ModelDefaults>,
    single: FetchBinding<ConsolidatedResource>,
    primary: FetchBinding<ConsolidatedResource>,
    target: FetchBinding<ConsolidatedResource>,
    mode: Mutex<ModeState>,
    generation: AtomicU64,
}

impl ConsolidatedOrchestrator {
    pub fn new(
        service: Arc<dyn AnalysisService>,
        dispatcher: RequestDispatcher,
        store: Arc<ScenarioStore>,
        catalog: Arc<ScenarioCatalog>,
        defaults: Arc<ModelDefaults>,
    ) -> Self {
        let resource = Arc::new(ConsolidatedResource::new(service));
        Self {
            store,
            catalog,
            defaults,
            single: FetchBinding::new(Arc::clone(&resource), dispatcher.clone()),
            primary: FetchBinding::new(Arc::clone(&resource), dispatcher.clone()),
            target: FetchBinding::new(resource, dispatcher),
            mode: Mutex::new(ModeState::default()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn mode(&self) -> Option<ViewMode> {
        self.mode.lock().mode.clone()
    }

    pub fn single_state(&self) -> FetchState<ConsolidatedDataset> {
        self.single.state()
    }

    /// `(primary, target)` results of comparison mode.
    pub fn comparison_states(
        &self,
    ) -> (FetchState<ConsolidatedDataset>, FetchState<ConsolidatedDataset>) {
        (self.primary.state(), self.target.state())
    }

    /// Wait until no binding is loading.
    pub async fn settled(&self) {
        tokio::join!(
            self.single.settled(),
            self.primary.settled(),
            self.target.settled()
        );
    }

    /// Show the consolidated projection of `key` alone, leaving comparison mode if needed.
    pub async fn show_single(&self, key: &ScenarioKey) -> AppResult<()> {
        let previous = self.mode.lock().clone();
        if let Some(ViewMode::Comparison { primary, .. }) = &previous.mode {
            self.restore_after_comparison(primary, previous.restore_end)?;
        }
        let generation = self.switch_to(ViewMode::Single(key.clone()), None);
        self.load(&self.single, key, generation, false).await
    }

    /// Compare `primary` against `target`.
    ///
    /// Side failures are reported on that side's binding only.
    pub async fn enter_comparison(&self, primary: &ScenarioKey, target: &ScenarioKey) -> AppResult<()> {
        if primary == target {
            return Err(AppError::SelfComparison(primary.clone()));
        }

        let previous = self.mode.lock().clone();
        let restore_end = match &previous.mode {
            Some(ViewMode::Comparison { primary: p, .. }) if p == primary => previous.restore_end,
            _ => Some(self.store.get(primary).time_range.end),
        };
        if let Some(ViewMode::Comparison { primary: p, .. }) = &previous.mode
            && p != primary
        {
            self.restore_after_comparison(p, previous.restore_end)?;
        }
        self.store.update(
            primary,
            ScenarioPatch::default().comparison_target(Some(target.clone())),
        )?;

        let generation = self.switch_to(
            ViewMode::Comparison {
                primary: primary.clone(),
                target: target.clone(),
            },
            restore_end,
        );
        tracing::info!(primary = %primary, target = %target, "consolidated.enter_comparison");
        self.load_comparison(primary, target, generation, false).await;
        Ok(())
    }

    /// Leave comparison mode and return to the primary scenario.
    pub async fn exit_comparison(&self) -> AppResult<()> {
        match self.mode() {
            Some(ViewMode::Comparison { primary, .. }) => self.show_single(&primary).await,
            _ => Err(AppError::NotComparing),
        }
    }

    /// Re-issue the current mode's requests after a state change.
    pub async fn refresh(&self) -> AppResult<()> {
        self.reload(false).await
    }

    /// Like [`refresh`](Self::refresh), but also re-sends requests that failed with unchanged params.
    pub async fn retry(&self) -> AppResult<()> {
        self.reload(true).await
    }

    /// Apply a time range to every scenario on screen. Each is clamped to its own max year.
    pub async fn set_time_range(&self, range: TimeRange) -> AppResult<()> {
        self.patch_visible(ScenarioPatch::default().time_range(range))?;
        self.refresh().await
    }

    pub async fn set_demand_type(&self, demand_type: DemandType) -> AppResult<()> {
        self.patch_visible(ScenarioPatch::default().demand_type(demand_type))?;
        self.refresh().await
    }

    /// Display unit only; no refetch.
    pub fn set_unit(&self, unit: EnergyUnit) -> AppResult<()> {
        self.patch_visible(ScenarioPatch::default().unit(unit))
    }

    fn patch_visible(&self, patch: ScenarioPatch) -> AppResult<()> {
        if let Some(mode) = self.mode() {
            for key in mode.scenarios() {
                self.store.update(key, patch.clone())?;
            }
        }
        Ok(())
    }

    async fn reload(&self, force: bool) -> AppResult<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        match self.mode() {
            None => Ok(()),
            Some(ViewMode::Single(key)) => self.load(&self.single, &key, generation, force).await,
            Some(ViewMode::Comparison { primary, target }) => {
                self.load_comparison(&primary, &target, generation, force)
                    .await;
                Ok(())
            }
        }
    }

    /// Record the new mode, clearing bindings whose results no longer apply.
    fn switch_to(&self, next: ViewMode, restore_end: Option<Year>) -> u64 {
        let mut state = self.mode.lock();
        if state.mode.as_ref() != Some(&next) {
            tracing::debug!(from = ?state.mode, to = ?next, "consolidated.switch_mode");
            self.single.clear();
            self.primary.clear();
            self.target.clear();
        }
        state.mode = Some(next);
        state.restore_end = restore_end;
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn restore_after_comparison(&self, primary: &ScenarioKey, restore_end: Option<Year>) -> AppResult<()> {
        let state = self.store.get(primary);
        let profile = self
            .store
            .profile(primary)
            .unwrap_or_else(ScenarioProfile::unknown);
        let mut patch = ScenarioPatch::default()
            .active_selection(ActiveSelection::first_of(&profile.sectors))
            .comparison_target(None);
        if let Some(end) = restore_end {
            patch = patch.time_range(state.time_range.with_end(end));
        }
        self.store.update(primary, patch)?;
        tracing::info!(scenario = %primary, restored_end = ?restore_end, "consolidated.exit_comparison");
        Ok(())
    }

    async fn load_comparison(
        &self,
        primary: &ScenarioKey,
        target: &ScenarioKey,
        generation: u64,
        force: bool,
    ) {
        let (a, b) = tokio::join!(
            self.load(&self.primary, primary, generation, force),
            self.load(&self.target, target, generation, force),
        );
        for (key, result) in [(primary, a), (target, b)] {
            if let Err(err) = result {
                tracing::warn!(scenario = %key, error = %err, "consolidated.side_blocked");
            }
        }
    }

    async fn load(
        &self,
        binding: &FetchBinding<ConsolidatedResource>,
        key: &ScenarioKey,
        generation: u64,
        force: bool,
    ) -> AppResult<()> {
        let prepared = self.prepare(key).await;
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(scenario = %key, generation, "consolidated.superseded");
            return prepared.map(|_| ());
        }
        match prepared {
            Ok(request) => {
                binding.set(request, true);
                if force && binding.state().error.is_some() {
                    binding.retry();
                }
                Ok(())
            }
            Err(err) => {
                binding.block(err.to_binding_error());
                Err(err)
            }
        }
    }

    /// Derive defaults and build the clamped request for one scenario.
    async fn prepare(&self, key: &ScenarioKey) -> AppResult<ConsolidatedRequest> {
        let selected_models = self.defaults.ensure_model_selections(key).await?;
        let profile = self.catalog.profile(key).await?;
        let state = self.store.get(key);
        let range = state.time_range.clamped_to(profile.max_year);
        if range != state.time_range {
            self.store
                .update(key, ScenarioPatch::default().time_range(range))?;
        }
        Ok(ConsolidatedRequest {
            project_path: self.catalog.project().to_string(),
            scenario: key.clone(),
            start_year: range.start,
            end_year: range.end,
            selected_models,
            demand_type: state.demand_type,
        })
    }
}
