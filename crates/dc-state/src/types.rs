//! Scenario state data types.

use std::collections::{BTreeMap, BTreeSet};

use dc_core::{
    ActiveSelection, DemandType, EnergyUnit, MAX_YEAR_SENTINEL, ModelId, ScenarioKey, SectorName,
    TimeRange, Year,
};
use serde::{Deserialize, Serialize};

/// One model per sector used to build a consolidated projection.
pub type ModelSelections = BTreeMap<SectorName, ModelId>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChartKind {
    Line,
    Area,
    Bar,
    StackedBar,
    Pie,
    Table,
}

/// Identifies one chart's interaction state within one scenario.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChartFingerprint {
    pub kind: ChartKind,
    pub scenario: ScenarioKey,
}

impl ChartFingerprint {
    pub fn new(kind: ChartKind, scenario: impl Into<ScenarioKey>) -> Self {
        Self {
            kind,
            scenario: scenario.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomRange {
    pub min: f64,
    pub max: f64,
}

/// Series visibility and zoom of a chart.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChartInteraction {
    #[serde(default)]
    pub hidden_series: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom_range: Option<ZoomRange>,
}

impl ChartInteraction {
    /// Flip a series' visibility. Returns true when the series is now hidden.
    pub fn toggle_series(&mut self, series: &str) -> bool {
        if self.hidden_series.remove(series) {
            false
        } else {
            self.hidden_series.insert(series.to_string());
            true
        }
    }
}

/// Everything the dashboard remembers about one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioState {
    pub time_range: TimeRange,
    #[serde(default)]
    pub unit: EnergyUnit,
    pub active_selection: ActiveSelection,
    #[serde(default)]
    pub model_selections: ModelSelections,
    #[serde(default)]
    pub demand_type: DemandType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison_target: Option<ScenarioKey>,
    #[serde(default, with = "chart_entries")]
    pub chart_interaction: BTreeMap<ChartFingerprint, ChartInteraction>,
}

/// Sector list and horizon of a scenario as reported by the analysis service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioProfile {
    pub sectors: Vec<SectorName>,
    pub max_year: Year,
}

impl ScenarioProfile {
    pub fn new(sectors: Vec<SectorName>, target_year: Option<Year>) -> Self {
        Self {
            sectors,
            max_year: dc_core::scenario_max_year(target_year),
        }
    }

    /// Profile assumed before any metadata has been fetched.
    pub fn unknown() -> Self {
        Self {
            sectors: Vec::new(),
            max_year: MAX_YEAR_SENTINEL,
        }
    }
}

/// Partial update of a [`ScenarioState`].
///
/// Scalar fields replace the current value. Map fields are merged entry by
/// entry, so entries the patch does not mention are kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScenarioPatch {
    pub time_range: Option<TimeRange>,
    pub unit: Option<EnergyUnit>,
    pub active_selection: Option<ActiveSelection>,
    pub model_selections: Option<ModelSelections>,
    pub demand_type: Option<DemandType>,
    pub comparison_target: Option<Option<ScenarioKey>>,
    pub chart_interaction: Option<BTreeMap<ChartFingerprint, ChartInteraction>>,
}

impl ScenarioPatch {
    pub fn time_range(mut self, range: TimeRange) -> Self {
        self.time_range = Some(range);
        self
    }

    pub fn unit(mut self, unit: EnergyUnit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn active_selection(mut self, selection: ActiveSelection) -> Self {
        self.active_selection = Some(selection);
        self
    }

    pub fn model_selections(mut self, selections: ModelSelections) -> Self {
        self.model_selections = Some(selections);
        self
    }

    pub fn demand_type(mut self, demand_type: DemandType) -> Self {
        self.demand_type = Some(demand_type);
        self
    }

    pub fn comparison_target(mut self, target: Option<ScenarioKey>) -> Self {
        self.comparison_target = Some(target);
        self
    }

    pub fn chart(mut self, fingerprint: ChartFingerprint, interaction: ChartInteraction) -> Self {
        self.chart_interaction
            .get_or_insert_with(BTreeMap::new)
            .insert(fingerprint, interaction);
        self
    }
}

/// Chart interaction maps are keyed by a composite fingerprint, which JSON
/// objects cannot express, so they are stored as a list of entries.
mod chart_entries {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{ChartFingerprint, ChartInteraction};

    #[derive(Serialize)]
    struct EntryRef<'a> {
        fingerprint: &'a ChartFingerprint,
        state: &'a ChartInteraction,
    }

    #[derive(Deserialize)]
    struct Entry {
        fingerprint: ChartFingerprint,
        state: ChartInteraction,
    }

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<ChartFingerprint, ChartInteraction>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(
            map.iter()
                .map(|(fingerprint, state)| EntryRef { fingerprint, state }),
        )
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<ChartFingerprint, ChartInteraction>, D::Error> {
        let entries = Vec::<Entry>::deserialize(deserializer)?;
        Ok(entries
            .into_iter()
            .map(|entry| (entry.fingerprint, entry.state))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_series_flips_visibility() {
        let mut chart = ChartInteraction::default();
        assert!(chart.toggle_series("Solar"));
        assert!(chart.hidden_series.contains("Solar"));
        assert!(!chart.toggle_series("Solar"));
        assert!(chart.hidden_series.is_empty());
    }

    #[test]
    fn fingerprints_with_separator_characters_stay_distinct() {
        let a = ChartFingerprint::new(ChartKind::Line, "Base_2030");
        let b = ChartFingerprint::new(ChartKind::Line, "Base");
        assert_ne!(a, b);
        let mut map = BTreeMap::new();
        map.insert(a, ChartInteraction::default());
        map.insert(b, ChartInteraction::default());
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn patch_builder_accumulates_charts() {
        let patch = ScenarioPatch::default()
            .chart(
                ChartFingerprint::new(ChartKind::Line, "A"),
                ChartInteraction::default(),
            )
            .chart(
                ChartFingerprint::new(ChartKind::Area, "A"),
                ChartInteraction::default(),
            );
        assert_eq!(patch.chart_interaction.map(|m| m.len()), Some(2));
    }

    #[test]
    fn unknown_profile_uses_sentinel() {
        assert_eq!(ScenarioProfile::unknown().max_year, MAX_YEAR_SENTINEL);
        assert_eq!(ScenarioProfile::new(vec![], Some(2040)).max_year, 2040);
    }
}
