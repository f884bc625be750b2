//! Error types for the dc-app layer.

use std::path::PathBuf;

use dc_client::ServiceError;
use dc_core::{CoreError, ScenarioKey, SectorName};
use dc_dispatch::{BindingError, BindingErrorKind};
use dc_state::StateError;

/// Application error wrapping the lower layers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Failed to read config file: {path}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Config(String),

    #[error(
        "No models are available for {} in scenario '{}'",
        join_names(.sectors),
        .scenario
    )]
    NoModelsAvailable {
        scenario: ScenarioKey,
        sectors: Vec<SectorName>,
    },

    #[error("Scenario '{0}' cannot be compared with itself")]
    SelfComparison(ScenarioKey),

    #[error("Not in comparison mode")]
    NotComparing,

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for dc-app operations.
pub type AppResult<T> = Result<T, AppError>;

fn join_names(sectors: &[SectorName]) -> String {
    sectors
        .iter()
        .map(SectorName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl AppError {
    /// How this error is surfaced on a binding that could not issue its request.
    pub fn to_binding_error(&self) -> BindingError {
        match self {
            AppError::Service(ServiceError::Transport(message))
            | AppError::Service(ServiceError::Decode(message)) => BindingError {
                kind: BindingErrorKind::Transport,
                message: format!("Could not reach the analysis service: {message}"),
            },
            AppError::Service(ServiceError::Application(message)) => BindingError {
                kind: BindingErrorKind::Application,
                message: message.clone(),
            },
            other => BindingError::blocked(other.to_string()),
        }
    }
}
