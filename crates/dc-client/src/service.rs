use async_trait::async_trait;
use dc_core::{ScenarioKey, SectorName};
use tokio::sync::mpsc;

use crate::ServiceResult;
use crate::types::{
    AvailableModels, ConsolidatedDataset, ConsolidatedRequest, ForecastRequest, ProgressEvent,
    ScenarioMeta, SectorDataRequest, SectorDataset,
};

/// Events of one progress channel. The channel closes when the service
/// ends the stream or the connection drops.
pub type ProgressReceiver = mpsc::Receiver<ServiceResult<ProgressEvent>>;

/// Operations offered by the analysis service.
///
/// Every read is keyed by the project path so one client can serve several
/// projects.
#[async_trait]
pub trait AnalysisService: Send + Sync + 'static {
    async fn list_scenarios(&self, project: &str) -> ServiceResult<Vec<ScenarioKey>>;

    async fn list_sectors(&self, project: &str, scenario: &ScenarioKey)
    -> ServiceResult<Vec<SectorName>>;

    /// Available models of every sector of a scenario, in one call.
    async fn list_models(&self, project: &str, scenario: &ScenarioKey)
    -> ServiceResult<AvailableModels>;

    async fn scenario_meta(&self, project: &str, scenario: &ScenarioKey)
    -> ServiceResult<ScenarioMeta>;

    async fn fetch_sector_data(&self, request: &SectorDataRequest) -> ServiceResult<SectorDataset>;

    async fn fetch_consolidated(
        &self,
        request: &ConsolidatedRequest,
    ) -> ServiceResult<ConsolidatedDataset>;

    /// Start a forecast run. Progress is reported on the progress channel only.
    async fn submit_forecast(&self, request: &ForecastRequest) -> ServiceResult<()>;

    async fn open_progress_channel(&self, project: &str) -> ServiceResult<ProgressReceiver>;
}
