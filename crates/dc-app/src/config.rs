//! Dashboard configuration loaded from YAML.

use std::path::{Path, PathBuf};
use std::time::Duration;

use dc_core::{DEFAULT_END_YEAR, ModelId, Year};
use dc_dispatch::DispatcherConfig;
use dc_state::StoreDefaults;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub service: ServiceConfig,
    pub dispatcher: DispatcherSettings,
    pub state: StateConfig,
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: String,
    pub project_path: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            project_path: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherSettings {
    pub max_concurrent: usize,
    pub inter_dispatch_delay_ms: u64,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        let config = DispatcherConfig::default();
        Self {
            max_concurrent: config.max_concurrent,
            inter_dispatch_delay_ms: config.inter_dispatch_delay.as_millis() as u64,
        }
    }
}

impl DispatcherSettings {
    pub fn to_dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            max_concurrent: self.max_concurrent,
            inter_dispatch_delay: Duration::from_millis(self.inter_dispatch_delay_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Snapshot file; state is kept in memory only when absent.
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Models chosen for a sector when available, in order of preference.
    pub preferred_models: Vec<ModelId>,
    pub default_end_year: Year,
    pub default_start_year: Year,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        let store = StoreDefaults::default();
        Self {
            preferred_models: vec![ModelId::from("SLR")],
            default_end_year: DEFAULT_END_YEAR,
            default_start_year: store.default_start_year,
        }
    }
}

impl DefaultsConfig {
    pub fn store_defaults(&self) -> StoreDefaults {
        StoreDefaults {
            default_start_year: self.default_start_year,
            default_end_year: self.default_end_year,
        }
    }
}

impl DashboardConfig {
    pub fn from_yaml(text: &str) -> AppResult<Self> {
        let config: DashboardConfig = serde_yaml::from_str(text)
            .map_err(|e| AppError::Config(format!("Failed to parse config YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file.
    pub fn load(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AppError::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_yaml(&content)
    }

    /// Load `path` when it exists, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> AppResult<Self> {
        match path {
            Some(path) if path.exists() => Self::load(path),
            Some(path) => {
                tracing::debug!(path = %path.display(), "config.missing_using_defaults");
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.defaults.default_start_year > self.defaults.default_end_year {
            return Err(AppError::Config(format!(
                "default_start_year {} is after default_end_year {}",
                self.defaults.default_start_year, self.defaults.default_end_year
            )));
        }
        if self.service.base_url.trim().is_empty() {
            return Err(AppError::Config("service.base_url must not be empty".to_string()));
        }
        Ok(())
    }
}
