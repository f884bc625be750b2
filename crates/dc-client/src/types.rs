//! Request and response payloads of the analysis service.

use std::collections::BTreeMap;

use dc_core::{DemandType, EnergyUnit, ModelId, ScenarioKey, SectorName, TimeRange, Year};
use serde::{Deserialize, Serialize};

use crate::{ServiceError, ServiceResult};

/// Models the service can run, per sector, in preference-neutral order.
pub type AvailableModels = BTreeMap<SectorName, Vec<ModelId>>;

/// Standard response wrapper: `{ success, message?, data? }`.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn into_result(self) -> ServiceResult<T> {
        self.check()?;
        self.data
            .ok_or_else(|| ServiceError::Decode("response carried no data".to_string()))
    }

    /// Accept a response whose payload is irrelevant.
    pub fn into_ack(self) -> ServiceResult<()> {
        self.check()
    }

    fn check(&self) -> ServiceResult<()> {
        if self.success {
            return Ok(());
        }
        Err(ServiceError::Application(
            self.message
                .clone()
                .unwrap_or_else(|| "The analysis service reported a failure".to_string()),
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioMeta {
    #[serde(default)]
    pub target_year: Option<Year>,
}

/// Per-sector time series of one scenario.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorDataRequest {
    pub project_path: String,
    pub scenario: ScenarioKey,
    pub sector: SectorName,
    pub start_year: Year,
    pub end_year: Year,
}

impl SectorDataRequest {
    pub fn new(project: &str, scenario: ScenarioKey, sector: SectorName, range: TimeRange) -> Self {
        Self {
            project_path: project.to_string(),
            scenario,
            sector,
            start_year: range.start,
            end_year: range.end,
        }
    }
}

/// One year of a table whose remaining columns are numeric series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesRow {
    #[serde(alias = "Year")]
    pub year: Year,
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

impl SeriesRow {
    fn scaled(&self, from: EnergyUnit, to: EnergyUnit) -> Self {
        Self {
            year: self.year,
            values: self
                .values
                .iter()
                .map(|(series, value)| (series.clone(), from.convert(*value, to)))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorDataset {
    pub rows: Vec<SeriesRow>,
    /// First projected year; earlier rows are historical.
    #[serde(default)]
    pub forecast_start_year: Option<Year>,
    #[serde(default)]
    pub unit: EnergyUnit,
}

impl SectorDataset {
    /// Historical rows and projected rows. Without a marker every row is historical.
    pub fn split_at_forecast_start(&self) -> (&[SeriesRow], &[SeriesRow]) {
        let Some(start) = self.forecast_start_year else {
            return (&self.rows, &[]);
        };
        let split = self
            .rows
            .iter()
            .position(|row| row.year >= start)
            .unwrap_or(self.rows.len());
        self.rows.split_at(split)
    }

    pub fn in_unit(&self, unit: EnergyUnit) -> Self {
        Self {
            rows: self.rows.iter().map(|row| row.scaled(self.unit, unit)).collect(),
            forecast_start_year: self.forecast_start_year,
            unit,
        }
    }
}

/// Write-style request combining one model per sector into a system series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedRequest {
    pub project_path: String,
    pub scenario: ScenarioKey,
    pub start_year: Year,
    pub end_year: Year,
    pub selected_models: BTreeMap<SectorName, ModelId>,
    pub demand_type: DemandType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedDataset {
    pub rows: Vec<SeriesRow>,
    #[serde(default)]
    pub unit: EnergyUnit,
}

impl ConsolidatedDataset {
    pub fn in_unit(&self, unit: EnergyUnit) -> Self {
        Self {
            rows: self.rows.iter().map(|row| row.scaled(self.unit, unit)).collect(),
            unit,
        }
    }

    /// Sum of one series over all rows.
    pub fn total(&self, series: &str) -> f64 {
        self.rows
            .iter()
            .filter_map(|row| row.values.get(series))
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastRequest {
    pub project_path: String,
    pub scenario: ScenarioKey,
    /// Sectors to run; empty means all.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sectors: Vec<SectorName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_year: Option<Year>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub percent: f64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub sector: Option<SectorName>,
    #[serde(default)]
    pub total_sectors: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndStatus {
    Completed,
    Failed,
}

/// Server-reported outcome of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub successful_sectors: usize,
    pub failed_sectors: usize,
    pub total_sectors: usize,
}

impl JobResult {
    pub fn is_consistent(&self) -> bool {
        self.successful_sectors + self.failed_sectors == self.total_sectors
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEnd {
    pub status: EndStatus,
    #[serde(default)]
    pub result: Option<JobResult>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct SectorPayload {
    sector: SectorName,
    #[serde(default, alias = "error")]
    reason: Option<String>,
}

/// One message of the forecast progress channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Progress(ProgressUpdate),
    SectorCompleted { sector: SectorName },
    SectorFailed { sector: SectorName, reason: String },
    End(JobEnd),
}

impl ProgressEvent {
    /// Decode a channel message from its event name and JSON body.
    ///
    /// Unknown event names (heartbeats and the like) yield `None`.
    pub fn decode(event: &str, data: &str) -> ServiceResult<Option<Self>> {
        let decoded = match event {
            "progress" => ProgressEvent::Progress(serde_json::from_str(data)?),
            "sector_completed" => {
                let payload: SectorPayload = serde_json::from_str(data)?;
                ProgressEvent::SectorCompleted {
                    sector: payload.sector,
                }
            }
            "sector_failed" => {
                let payload: SectorPayload = serde_json::from_str(data)?;
                ProgressEvent::SectorFailed {
                    sector: payload.sector,
                    reason: payload.reason.unwrap_or_else(|| "unknown error".to_string()),
                }
            }
            "end" => ProgressEvent::End(serde_json::from_str(data)?),
            other => {
                tracing::trace!(event = other, "progress.ignored_event");
                return Ok(None);
            }
        };
        Ok(Some(decoded))
    }
}
