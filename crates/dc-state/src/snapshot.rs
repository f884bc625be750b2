//! Persisted form of the scenario store.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use dc_core::ScenarioKey;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::ScenarioState;
use crate::{StateError, StateResult};

pub const SNAPSHOT_VERSION: u32 = 1;

/// Full keyed state map plus the last active scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub version: u32,
    pub saved_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_scenario: Option<ScenarioKey>,
    #[serde(default)]
    pub scenarios: BTreeMap<ScenarioKey, ScenarioState>,
}

#[derive(Deserialize)]
struct SnapshotHeader {
    version: u32,
}

impl StoreSnapshot {
    pub fn new(
        active_scenario: Option<ScenarioKey>,
        scenarios: BTreeMap<ScenarioKey, ScenarioState>,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: chrono::Utc::now().to_rfc3339(),
            active_scenario,
            scenarios,
        }
    }

    pub fn to_json(&self) -> StateResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a snapshot. Blobs written by another version are rejected
    /// before their body is interpreted.
    pub fn from_json(text: &str) -> StateResult<Self> {
        let header: SnapshotHeader = serde_json::from_str(text)?;
        if header.version != SNAPSHOT_VERSION {
            return Err(StateError::VersionMismatch {
                found: header.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        Ok(serde_json::from_str(text)?)
    }
}

/// Where a store keeps its snapshot between sessions.
pub trait SnapshotSink: Send + Sync {
    fn load(&self) -> StateResult<Option<StoreSnapshot>>;
    fn save(&self, snapshot: &StoreSnapshot) -> StateResult<()>;
}

/// Snapshot stored as a pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSink for JsonFileSink {
    fn load(&self) -> StateResult<Option<StoreSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        StoreSnapshot::from_json(&content).map(Some)
    }

    fn save(&self, snapshot: &StoreSnapshot) -> StateResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        // Readers only ever see a complete file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, snapshot.to_json()?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-memory sink holding the serialized blob.
#[derive(Debug, Default)]
pub struct MemorySink {
    blob: Mutex<Option<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(blob: impl Into<String>) -> Self {
        Self {
            blob: Mutex::new(Some(blob.into())),
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.blob.lock().clone()
    }
}

impl SnapshotSink for MemorySink {
    fn load(&self) -> StateResult<Option<StoreSnapshot>> {
        match self.blob.lock().as_deref() {
            Some(text) => StoreSnapshot::from_json(text).map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, snapshot: &StoreSnapshot) -> StateResult<()> {
        *self.blob.lock() = Some(snapshot.to_json()?);
        Ok(())
    }
}
