//! Application layer for the demandcast dashboard.
//!
//! Wires the analysis service, request dispatcher and scenario store into the
//! operations a frontend drives: default model derivation, consolidated and
//! per-sector data views (single and comparison mode) and forecast progress.

pub mod catalog;
pub mod config;
pub mod consolidated;
pub mod dashboard;
pub mod defaults;
pub mod error;
pub mod progress;
pub mod resources;
pub mod sector_data;

pub use catalog::ScenarioCatalog;
pub use config::{DashboardConfig, DefaultsConfig, DispatcherSettings, ServiceConfig, StateConfig};
pub use consolidated::{ConsolidatedOrchestrator, ViewMode};
pub use dashboard::{Dashboard, ViewSettings};
pub use defaults::ModelDefaults;
pub use error::{AppError, AppResult};
pub use progress::{FailureReason, ForecastJob, ForecastProgressConsumer, JobSnapshot, JobState, JobTally};
pub use resources::{ConsolidatedResource, SectorResource};
pub use sector_data::SectorDataView;
