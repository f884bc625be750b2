//! dc-state: per-scenario dashboard state and its persisted snapshot.

pub mod snapshot;
pub mod store;
pub mod types;

pub use snapshot::{JsonFileSink, MemorySink, SNAPSHOT_VERSION, SnapshotSink, StoreSnapshot};
pub use store::{ScenarioStore, StoreDefaults};
pub use types::*;

use dc_core::{CoreError, ScenarioKey, SectorName};

pub type StateResult<T> = Result<T, StateError>;

#[derive(thiserror::Error, Debug)]
pub enum StateError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Snapshot version {found} does not match expected version {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("Scenario '{0}' cannot be compared with itself")]
    SelfComparison(ScenarioKey),

    #[error("Selection '{selection}' is not a sector of scenario '{scenario}'")]
    InvalidSelection {
        scenario: ScenarioKey,
        selection: String,
    },

    #[error("Sector '{sector}' does not exist in scenario '{scenario}'")]
    UnknownSector {
        scenario: ScenarioKey,
        sector: SectorName,
    },

    #[error(transparent)]
    Core(#[from] CoreError),
}
