//! Analysis-service resources loaded through fetch bindings.

use std::sync::Arc;

use async_trait::async_trait;
use dc_client::{
    AnalysisService, ConsolidatedDataset, ConsolidatedRequest, SectorDataRequest, SectorDataset,
    ServiceError,
};
use dc_dispatch::{FetchError, Resource};
use tokio_util::sync::CancellationToken;

fn fetch_error(err: ServiceError) -> FetchError {
    match err {
        ServiceError::Transport(message) | ServiceError::Decode(message) => {
            FetchError::Transport(message)
        }
        ServiceError::Application(message) => FetchError::Application(message),
    }
}

/// Consolidated projection of one scenario.
pub struct ConsolidatedResource {
    service: Arc<dyn AnalysisService>,
}

impl ConsolidatedResource {
    pub fn new(service: Arc<dyn AnalysisService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Resource for ConsolidatedResource {
    type Params = ConsolidatedRequest;
    type Output = ConsolidatedDataset;

    fn name(&self) -> &'static str {
        "consolidated"
    }

    async fn fetch(
        &self,
        params: ConsolidatedRequest,
        cancel: CancellationToken,
    ) -> Result<ConsolidatedDataset, FetchError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = self.service.fetch_consolidated(&params) => result.map_err(fetch_error),
        }
    }
}

/// Time series of one sector.
pub struct SectorResource {
    service: Arc<dyn AnalysisService>,
}

impl SectorResource {
    pub fn new(service: Arc<dyn AnalysisService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Resource for SectorResource {
    type Params = SectorDataRequest;
    type Output = SectorDataset;

    fn name(&self) -> &'static str {
        "sector_data"
    }

    async fn fetch(
        &self,
        params: SectorDataRequest,
        cancel: CancellationToken,
    ) -> Result<SectorDataset, FetchError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = self.service.fetch_sector_data(&params) => result.map_err(fetch_error),
        }
    }
}
