//! reqwest-backed [`AnalysisService`].

use async_trait::async_trait;
use dc_core::{ScenarioKey, SectorName};
use reqwest::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;

use crate::service::{AnalysisService, ProgressReceiver};
use crate::sse::SseDecoder;
use crate::types::{
    AvailableModels, ConsolidatedDataset, ConsolidatedRequest, Envelope, ForecastRequest,
    ProgressEvent, ScenarioMeta, SectorDataRequest, SectorDataset,
};
use crate::{ServiceError, ServiceResult};

const PROGRESS_BUFFER: usize = 64;

/// Client for the analysis service's JSON API.
pub struct HttpAnalysisService {
    client: Client,
    base_url: String,
}

impl HttpAnalysisService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> ServiceResult<T> {
        tracing::debug!(path, "http.get");
        let response = self.client.get(self.url(path)).query(query).send().await?;
        read_envelope::<T>(response).await?.into_result()
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> ServiceResult<Envelope<T>>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        tracing::debug!(path, "http.post");
        let response = self.client.post(self.url(path)).json(body).send().await?;
        read_envelope(response).await
    }
}

async fn read_envelope<T: DeserializeOwned>(response: Response) -> ServiceResult<Envelope<T>> {
    let status = response.status();
    let body = response.text().await?;
    match serde_json::from_str::<Envelope<T>>(&body) {
        Ok(envelope) => Ok(envelope),
        Err(err) if status.is_success() => Err(ServiceError::Decode(err.to_string())),
        Err(_) => Err(ServiceError::Transport(format!("HTTP {status}"))),
    }
}

#[async_trait]
impl AnalysisService for HttpAnalysisService {
    async fn list_scenarios(&self, project: &str) -> ServiceResult<Vec<ScenarioKey>> {
        self.get("project/scenarios", &[("projectPath", project)])
            .await
    }

    async fn list_sectors(
        &self,
        project: &str,
        scenario: &ScenarioKey,
    ) -> ServiceResult<Vec<SectorName>> {
        self.get(
            "project/sectors",
            &[("projectPath", project), ("scenario", scenario.as_str())],
        )
        .await
    }

    async fn list_models(
        &self,
        project: &str,
        scenario: &ScenarioKey,
    ) -> ServiceResult<AvailableModels> {
        self.get(
            "project/models",
            &[("projectPath", project), ("scenario", scenario.as_str())],
        )
        .await
    }

    async fn scenario_meta(
        &self,
        project: &str,
        scenario: &ScenarioKey,
    ) -> ServiceResult<ScenarioMeta> {
        self.get(
            "project/scenario-meta",
            &[("projectPath", project), ("scenario", scenario.as_str())],
        )
        .await
    }

    async fn fetch_sector_data(&self, request: &SectorDataRequest) -> ServiceResult<SectorDataset> {
        let start = request.start_year.to_string();
        let end = request.end_year.to_string();
        self.get(
            "project/sector-data",
            &[
                ("projectPath", request.project_path.as_str()),
                ("scenario", request.scenario.as_str()),
                ("sector", request.sector.as_str()),
                ("startYear", start.as_str()),
                ("endYear", end.as_str()),
            ],
        )
        .await
    }

    async fn fetch_consolidated(
        &self,
        request: &ConsolidatedRequest,
    ) -> ServiceResult<ConsolidatedDataset> {
        self.post("project/consolidated", request)
            .await?
            .into_result()
    }

    async fn submit_forecast(&self, request: &ForecastRequest) -> ServiceResult<()> {
        self.post::<_, serde_json::Value>("project/forecast", request)
            .await?
            .into_ack()
    }

    async fn open_progress_channel(&self, project: &str) -> ServiceResult<ProgressReceiver> {
        let response = self
            .client
            .get(self.url("project/forecast/progress"))
            .query(&[("projectPath", project)])
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ServiceError::Transport(format!(
                "progress channel refused: HTTP {}",
                response.status()
            )));
        }

        let (tx, rx) = mpsc::channel(PROGRESS_BUFFER);
        tokio::spawn(pump_progress(response, tx));
        Ok(rx)
    }
}

/// Forward decoded events until the stream ends or the receiver goes away.
async fn pump_progress(
    mut response: Response,
    tx: mpsc::Sender<ServiceResult<ProgressEvent>>,
) {
    let mut decoder = SseDecoder::new();
    loop {
        let chunk = match response.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => {
                tracing::debug!(pending = decoder.pending(), "progress.stream_closed");
                return;
            }
            Err(err) => {
                let _ = tx.send(Err(ServiceError::from(err))).await;
                return;
            }
        };

        let frames = match decoder.push(&chunk) {
            Ok(frames) => frames,
            Err(err) => {
                tracing::warn!(error = %err, "progress.oversized_frame");
                let _ = tx.send(Err(err)).await;
                return;
            }
        };
        for frame in frames {
            let event = match ProgressEvent::decode(&frame.event, &frame.data) {
                Ok(Some(event)) => event,
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(event = %frame.event, error = %err, "progress.malformed_event");
                    continue;
                }
            };
            if tx.send(Ok(event)).await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slash() {
        let service = HttpAnalysisService::new("http://127.0.0.1:5000/");
        assert_eq!(
            service.url("project/models"),
            "http://127.0.0.1:5000/project/models"
        );
    }
}
