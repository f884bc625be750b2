//! Scenario state store.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;

use dc_core::{
    ActiveSelection, DEFAULT_END_YEAR, DemandType, EnergyUnit, MAX_YEAR_SENTINEL, ModelId,
    ScenarioKey, SectorName, TimeRange, Year,
};
use parking_lot::Mutex;

use crate::snapshot::{SnapshotSink, StoreSnapshot};
use crate::types::{
    ChartFingerprint, ChartInteraction, ModelSelections, ScenarioPatch, ScenarioProfile,
    ScenarioState, ZoomRange,
};
use crate::{StateError, StateResult};

/// Values used when a scenario is first accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreDefaults {
    pub default_start_year: Year,
    pub default_end_year: Year,
}

impl Default for StoreDefaults {
    fn default() -> Self {
        Self {
            default_start_year: 2006,
            default_end_year: DEFAULT_END_YEAR,
        }
    }
}

/// Keyed record of per-scenario dashboard state.
///
/// All reads and writes go through one lock, so an update is observed
/// either completely or not at all. With a sink attached, the full keyed map
/// and the active scenario are written after every mutation.
pub struct ScenarioStore {
    defaults: StoreDefaults,
    sink: Option<Arc<dyn SnapshotSink>>,
    inner: Mutex<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    states: BTreeMap<ScenarioKey, ScenarioState>,
    /// Restored states not yet accessed this session.
    persisted: BTreeMap<ScenarioKey, ScenarioState>,
    profiles: BTreeMap<ScenarioKey, ScenarioProfile>,
    active: Option<ScenarioKey>,
}

impl ScenarioStore {
    /// Store without persistence.
    pub fn new(defaults: StoreDefaults) -> Self {
        Self {
            defaults,
            sink: None,
            inner: Mutex::new(StoreInner::default()),
        }
    }

    /// Store rehydrated from `sink` and persisting back to it.
    ///
    /// An unreadable or foreign-version snapshot is discarded and the store
    /// starts empty.
    pub fn with_sink(defaults: StoreDefaults, sink: Arc<dyn SnapshotSink>) -> Self {
        let mut inner = StoreInner::default();
        match sink.load() {
            Ok(Some(snapshot)) => {
                tracing::info!(
                    scenarios = snapshot.scenarios.len(),
                    saved_at = %snapshot.saved_at,
                    "store.restored"
                );
                inner.persisted = snapshot.scenarios;
                inner.active = snapshot.active_scenario;
            }
            Ok(None) => tracing::debug!("store.no_snapshot"),
            Err(err) => tracing::warn!(error = %err, "store.snapshot_discarded"),
        }
        Self {
            defaults,
            sink: Some(sink),
            inner: Mutex::new(inner),
        }
    }

    pub fn defaults(&self) -> StoreDefaults {
        self.defaults
    }

    /// Record the sector list and horizon of a scenario and bring any
    /// existing state for it back within them.
    pub fn register_profile(&self, key: &ScenarioKey, profile: ScenarioProfile) {
        let mut inner = self.inner.lock();
        let changed = match inner.states.get_mut(key) {
            Some(state) => reconcile(key, state, &profile),
            None => false,
        };
        inner.profiles.insert(key.clone(), profile);
        if changed {
            self.persist(&inner);
        }
    }

    pub fn profile(&self, key: &ScenarioKey) -> Option<ScenarioProfile> {
        self.inner.lock().profiles.get(key).cloned()
    }

    /// Latest year the scenario has data for; the sentinel when unknown.
    pub fn max_year(&self, key: &ScenarioKey) -> Year {
        self.inner
            .lock()
            .profiles
            .get(key)
            .map(|p| p.max_year)
            .unwrap_or(MAX_YEAR_SENTINEL)
    }

    /// State of `key`, created from defaults (or the restored snapshot) on first access.
    pub fn get(&self, key: &ScenarioKey) -> ScenarioState {
        let mut inner = self.inner.lock();
        inner.entry(&self.defaults, key).clone()
    }

    /// Shallow-merge `patch` into the state of `key`.
    ///
    /// Nothing is written when the patch violates an invariant.
    pub fn update(&self, key: &ScenarioKey, patch: ScenarioPatch) -> StateResult<ScenarioState> {
        let mut inner = self.inner.lock();
        let current = inner.entry(&self.defaults, key).clone();
        let next = apply_patch(key, current, patch, inner.profiles.get(key))?;
        inner.states.insert(key.clone(), next.clone());
        self.persist(&inner);
        Ok(next)
    }

    pub fn set_model_selection(
        &self,
        key: &ScenarioKey,
        sector: SectorName,
        model: ModelId,
    ) -> StateResult<ScenarioState> {
        let mut selections = ModelSelections::new();
        selections.insert(sector, model);
        self.update(key, ScenarioPatch::default().model_selections(selections))
    }

    /// Add `candidates` for sectors that have no model yet.
    ///
    /// Entries already present win, including ones written after the
    /// candidates were computed. Nothing is written when a candidate names
    /// a sector the scenario does not have.
    pub fn fill_model_selections(
        &self,
        key: &ScenarioKey,
        candidates: ModelSelections,
    ) -> StateResult<ScenarioState> {
        let mut inner = self.inner.lock();
        if let Some(profile) = inner.profiles.get(key)
            && let Some(sector) = candidates
                .keys()
                .find(|sector| !profile.sectors.contains(sector))
        {
            return Err(StateError::UnknownSector {
                scenario: key.clone(),
                sector: sector.clone(),
            });
        }

        let state = inner.entry(&self.defaults, key);
        let mut filled = 0;
        for (sector, model) in candidates {
            if let Entry::Vacant(slot) = state.model_selections.entry(sector) {
                slot.insert(model);
                filled += 1;
            }
        }
        let state = state.clone();
        if filled > 0 {
            self.persist(&inner);
        }
        Ok(state)
    }

    pub fn chart(&self, fingerprint: &ChartFingerprint) -> ChartInteraction {
        let mut inner = self.inner.lock();
        inner
            .entry(&self.defaults, &fingerprint.scenario)
            .chart_interaction
            .get(fingerprint)
            .cloned()
            .unwrap_or_default()
    }

    /// Mutate one chart's interaction state in place.
    pub fn update_chart<T>(
        &self,
        fingerprint: &ChartFingerprint,
        f: impl FnOnce(&mut ChartInteraction) -> T,
    ) -> T {
        let mut inner = self.inner.lock();
        let state = inner.entry(&self.defaults, &fingerprint.scenario);
        let out = f(state
            .chart_interaction
            .entry(fingerprint.clone())
            .or_default());
        self.persist(&inner);
        out
    }

    /// Returns true when the series is now hidden.
    pub fn toggle_series(&self, fingerprint: &ChartFingerprint, series: &str) -> bool {
        self.update_chart(fingerprint, |chart| chart.toggle_series(series))
    }

    pub fn set_zoom(&self, fingerprint: &ChartFingerprint, zoom: Option<ZoomRange>) {
        self.update_chart(fingerprint, |chart| chart.zoom_range = zoom);
    }

    pub fn reset_chart(&self, fingerprint: &ChartFingerprint) {
        self.update_chart(fingerprint, |chart| *chart = ChartInteraction::default());
    }

    pub fn active_scenario(&self) -> Option<ScenarioKey> {
        self.inner.lock().active.clone()
    }

    pub fn set_active_scenario(&self, key: Option<ScenarioKey>) {
        let mut inner = self.inner.lock();
        if inner.active == key {
            return;
        }
        inner.active = key;
        self.persist(&inner);
    }

    /// Scenarios with live or restored state.
    pub fn scenario_keys(&self) -> Vec<ScenarioKey> {
        let inner = self.inner.lock();
        let mut keys: Vec<ScenarioKey> = inner
            .persisted
            .keys()
            .chain(inner.states.keys())
            .cloned()
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.inner.lock().snapshot()
    }

    fn persist(&self, inner: &StoreInner) {
        let Some(sink) = &self.sink else {
            return;
        };
        if let Err(err) = sink.save(&inner.snapshot()) {
            tracing::warn!(error = %err, "store.persist_failed");
        }
    }
}

impl StoreInner {
    fn entry(&mut self, defaults: &StoreDefaults, key: &ScenarioKey) -> &mut ScenarioState {
        match self.states.entry(key.clone()) {
            Entry::Occupied(slot) => slot.into_mut(),
            Entry::Vacant(slot) => {
                let profile = self.profiles.get(key);
                let mut state = match self.persisted.get(key) {
                    Some(saved) => saved.clone(),
                    None => initial_state(defaults, profile),
                };
                if let Some(profile) = profile {
                    reconcile(key, &mut state, profile);
                }
                tracing::trace!(scenario = %key, "store.create_state");
                slot.insert(state)
            }
        }
    }

    fn snapshot(&self) -> StoreSnapshot {
        let mut scenarios = self.persisted.clone();
        scenarios.extend(
            self.states
                .iter()
                .map(|(key, state)| (key.clone(), state.clone())),
        );
        StoreSnapshot::new(self.active.clone(), scenarios)
    }
}

fn initial_state(defaults: &StoreDefaults, profile: Option<&ScenarioProfile>) -> ScenarioState {
    let max_year = profile.map(|p| p.max_year).unwrap_or(MAX_YEAR_SENTINEL);
    let end = defaults.default_end_year.min(max_year);
    let sectors = profile.map(|p| p.sectors.as_slice()).unwrap_or(&[]);
    ScenarioState {
        time_range: TimeRange {
            start: defaults.default_start_year.min(end),
            end,
        },
        unit: EnergyUnit::canonical(),
        active_selection: ActiveSelection::first_of(sectors),
        model_selections: ModelSelections::new(),
        demand_type: DemandType::Gross,
        comparison_target: None,
        chart_interaction: BTreeMap::new(),
    }
}

/// Bring `state` back within `profile`. Returns whether anything changed.
fn reconcile(key: &ScenarioKey, state: &mut ScenarioState, profile: &ScenarioProfile) -> bool {
    let mut changed = false;

    if state.time_range.end > profile.max_year {
        let clamped = state.time_range.clamped_to(profile.max_year);
        tracing::debug!(
            scenario = %key,
            from = state.time_range.end,
            to = clamped.end,
            "store.clamp_end_year"
        );
        state.time_range = clamped;
        changed = true;
    }

    if !state.active_selection.is_valid_for(&profile.sectors) {
        let reset = ActiveSelection::first_of(&profile.sectors);
        tracing::debug!(
            scenario = %key,
            from = %state.active_selection,
            to = %reset,
            "store.reset_selection"
        );
        state.active_selection = reset;
        changed = true;
    }

    let vanished: Vec<SectorName> = state
        .model_selections
        .keys()
        .filter(|sector| !profile.sectors.contains(sector))
        .cloned()
        .collect();
    if !vanished.is_empty() {
        tracing::warn!(scenario = %key, sectors = ?vanished, "store.prune_model_selections");
        for sector in &vanished {
            state.model_selections.remove(sector);
        }
        changed = true;
    }

    if state.comparison_target.as_ref() == Some(key) {
        state.comparison_target = None;
        changed = true;
    }

    changed
}

fn apply_patch(
    key: &ScenarioKey,
    mut state: ScenarioState,
    patch: ScenarioPatch,
    profile: Option<&ScenarioProfile>,
) -> StateResult<ScenarioState> {
    if let Some(range) = patch.time_range {
        let range = TimeRange::new(range.start, range.end)?;
        let max_year = profile.map(|p| p.max_year).unwrap_or(MAX_YEAR_SENTINEL);
        let clamped = range.clamped_to(max_year);
        if clamped != range {
            tracing::debug!(scenario = %key, requested = range.end, max_year, "store.clamp_end_year");
        }
        state.time_range = clamped;
    }

    if let Some(unit) = patch.unit {
        state.unit = unit;
    }

    if let Some(selection) = patch.active_selection {
        if let Some(profile) = profile
            && !selection.is_valid_for(&profile.sectors)
        {
            return Err(StateError::InvalidSelection {
                scenario: key.clone(),
                selection: selection.to_string(),
            });
        }
        state.active_selection = selection;
    }

    if let Some(selections) = patch.model_selections {
        if let Some(profile) = profile
            && let Some(sector) = selections
                .keys()
                .find(|sector| !profile.sectors.contains(sector))
        {
            return Err(StateError::UnknownSector {
                scenario: key.clone(),
                sector: sector.clone(),
            });
        }
        state.model_selections.extend(selections);
    }

    if let Some(demand_type) = patch.demand_type {
        state.demand_type = demand_type;
    }

    if let Some(target) = patch.comparison_target {
        if target.as_ref() == Some(key) {
            return Err(StateError::SelfComparison(key.clone()));
        }
        state.comparison_target = target;
    }

    if let Some(charts) = patch.chart_interaction {
        state.chart_interaction.extend(charts);
    }

    Ok(state)
}
