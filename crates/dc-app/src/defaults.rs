//! Default model selection per sector.

use std::sync::Arc;

use dc_client::AvailableModels;
use dc_core::{ModelId, ScenarioKey, SectorName};
use dc_state::{ModelSelections, ScenarioStore};

use crate::catalog::ScenarioCatalog;
use crate::error::{AppError, AppResult};

/// Derives and caches a complete model-per-sector map for a scenario.
pub struct ModelDefaults {
    catalog: Arc<ScenarioCatalog>,
    store: Arc<ScenarioStore>,
    preferred: Vec<ModelId>,
}

impl ModelDefaults {
    pub fn new(
        catalog: Arc<ScenarioCatalog>,
        store: Arc<ScenarioStore>,
        preferred: Vec<ModelId>,
    ) -> Self {
        Self {
            catalog,
            store,
            preferred,
        }
    }

    pub fn preferred(&self) -> &[ModelId] {
        &self.preferred
    }

    /// Return the scenario's model selections, deriving missing entries first.
    ///
    /// A map that already names a model for every sector is returned as is,
    /// without consulting the model listing. Otherwise each missing sector
    /// gets the first preferred model it offers, else its first model; entries
    /// already present are kept, including ones the user sets while the model
    /// listing is loading. The result is written to the store once. A sector
    /// offering no model fails the whole derivation and nothing is written.
    pub async fn ensure_model_selections(&self, key: &ScenarioKey) -> AppResult<ModelSelections> {
        let lock = self.catalog.derivation_lock(key);
        let _guard = lock.lock().await;

        let profile = self.catalog.profile(key).await?;
        let current = self.store.get(key).model_selections;
        if profile.sectors.is_empty() || is_complete(&current, &profile.sectors) {
            return Ok(current);
        }

        let available = self.catalog.models(key).await?;
        let derived = derive(key, &profile.sectors, &available, &current, &self.preferred)?;
        let state = self.store.fill_model_selections(key, derived)?;
        tracing::info!(
            scenario = %key,
            sectors = state.model_selections.len(),
            kept = current.len(),
            "defaults.derived"
        );
        Ok(state.model_selections)
    }
}

fn is_complete(selections: &ModelSelections, sectors: &[SectorName]) -> bool {
    !selections.is_empty() && sectors.iter().all(|sector| selections.contains_key(sector))
}

fn derive(
    key: &ScenarioKey,
    sectors: &[SectorName],
    available: &AvailableModels,
    current: &ModelSelections,
    preferred: &[ModelId],
) -> AppResult<ModelSelections> {
    let mut selections = ModelSelections::new();
    let mut without_models = Vec::new();

    for sector in sectors {
        if let Some(existing) = current.get(sector) {
            selections.insert(sector.clone(), existing.clone());
            continue;
        }
        let models = available.get(sector).map(Vec::as_slice).unwrap_or(&[]);
        let choice = preferred
            .iter()
            .find(|model| models.contains(model))
            .or_else(|| models.first());
        match choice {
            Some(model) => {
                selections.insert(sector.clone(), model.clone());
            }
            None => without_models.push(sector.clone()),
        }
    }

    if !without_models.is_empty() {
        tracing::warn!(scenario = %key, sectors = ?without_models, "defaults.no_models");
        return Err(AppError::NoModelsAvailable {
            scenario: key.clone(),
            sectors: without_models,
        });
    }
    Ok(selections)
}
