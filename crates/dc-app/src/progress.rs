use std::sync::Arc;

use chrono::{DateTime, Utc};
use dc_client::{AnalysisService, EndStatus, ForecastRequest, JobEnd, JobResult, ProgressEvent};
use dc_core::{ScenarioKey, SectorName};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The progress channel could not be opened or broke before `end`.
    Connectivity(String),
    /// The service ended the run as failed, or refused the submission.
    Server(String),
    /// The service reported counts that do not add up.
    InconsistentResult(JobResult),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Connectivity(message) => {
                write!(f, "Lost connection to the analysis service: {message}")
            }
            FailureReason::Server(message) => write!(f, "Forecast failed: {message}"),
            FailureReason::InconsistentResult(result) => write!(
                f,
                "Inconsistent result: {} succeeded + {} failed != {} total",
                result.successful_sectors, result.failed_sectors, result.total_sectors
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Running,
    Completed,
    Failed(FailureReason),
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed(_))
    }
}

/// Sectors reported on the channel so far.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobTally {
    pub total_sectors: Option<usize>,
    pub completed: Vec<SectorName>,
    pub failed: Vec<(SectorName, String)>,
}

impl JobTally {
    fn contains(&self, sector: &SectorName) -> bool {
        self.completed.contains(sector) || self.failed.iter().any(|(s, _)| s == sector)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    pub id: Uuid,
    pub scenario: ScenarioKey,
    pub state: JobState,
    pub percent: f64,
    pub message: String,
    pub current_sector: Option<SectorName>,
    pub tally: JobTally,
    pub result: Option<JobResult>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// State machine of one forecast run: `Idle -> Running -> Completed | Failed`.
///
/// Events are only applied while running. Each sector is counted once; a
/// repeated report for it is ignored.
#[derive(Debug, Clone)]
pub struct ForecastJob {
    id: Uuid,
    scenario: ScenarioKey,
    state: JobState,
    percent: f64,
    message: String,
    current_sector: Option<SectorName>,
    tally: JobTally,
    result: Option<JobResult>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl ForecastJob {
    pub fn new(scenario: ScenarioKey) -> Self {
        Self {
            id: Uuid::new_v4(),
            scenario,
            state: JobState::Idle,
            percent: 0.0,
            message: String::new(),
            current_sector: None,
            tally: JobTally::default(),
            result: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn start(&mut self) {
        if self.state == JobState::Idle {
            self.state = JobState::Running;
            self.started_at = Some(Utc::now());
            tracing::info!(job = %self.id, scenario = %self.scenario, "forecast.running");
        }
    }

    /// Apply one channel event. Returns whether it changed the job.
    pub fn apply(&mut self, event: ProgressEvent) -> bool {
        if self.state != JobState::Running {
            tracing::debug!(job = %self.id, state = ?self.state, "forecast.event_ignored");
            return false;
        }
        match event {
            ProgressEvent::Progress(update) => {
                self.percent = update.percent.clamp(0.0, 100.0);
                self.message = update.message;
                if update.sector.is_some() {
                    self.current_sector = update.sector;
                }
                if update.total_sectors.is_some() {
                    self.tally.total_sectors = update.total_sectors;
                }
            }
            ProgressEvent::SectorCompleted { sector } => {
                if self.tally.contains(&sector) {
                    tracing::warn!(job = %self.id, sector = %sector, "forecast.duplicate_sector");
                    return false;
                }
                self.tally.completed.push(sector);
            }
            ProgressEvent::SectorFailed { sector, reason } => {
                if self.tally.contains(&sector) {
                    tracing::warn!(job = %self.id, sector = %sector, "forecast.duplicate_sector");
                    return false;
                }
                tracing::warn!(job = %self.id, sector = %sector, %reason, "forecast.sector_failed");
                self.tally.failed.push((sector, reason));
            }
            ProgressEvent::End(end) => self.finish(end),
        }
        true
    }

    /// The channel failed or closed before `end`.
    pub fn channel_failed(&mut self, message: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.fail(FailureReason::Connectivity(message.into()));
    }

    fn finish(&mut self, end: JobEnd) {
        match end.status {
            EndStatus::Failed => {
                let message = end
                    .message
                    .unwrap_or_else(|| "the analysis service reported a failure".to_string());
                self.result = end.result;
                self.fail(FailureReason::Server(message));
            }
            EndStatus::Completed => {
                let result = end.result.unwrap_or_else(|| self.tally_result());
                self.result = Some(result);
                if !result.is_consistent() {
                    tracing::warn!(job = %self.id, ?result, "forecast.inconsistent_result");
                    self.fail(FailureReason::InconsistentResult(result));
                    return;
                }
                if result.successful_sectors != self.tally.completed.len()
                    || result.failed_sectors != self.tally.failed.len()
                {
                    tracing::warn!(
                        job = %self.id,
                        ?result,
                        completed = self.tally.completed.len(),
                        failed = self.tally.failed.len(),
                        "forecast.tally_mismatch"
                    );
                }
                self.percent = 100.0;
                self.state = JobState::Completed;
                self.finished_at = Some(Utc::now());
                tracing::info!(
                    job = %self.id,
                    successful = result.successful_sectors,
                    failed = result.failed_sectors,
                    "forecast.completed"
                );
            }
        }
    }

    fn tally_result(&self) -> JobResult {
        let successful = self.tally.completed.len();
        let failed = self.tally.failed.len();
        JobResult {
            successful_sectors: successful,
            failed_sectors: failed,
            total_sectors: self.tally.total_sectors.unwrap_or(successful + failed),
        }
    }

    fn fail(&mut self, reason: FailureReason) {
        tracing::info!(job = %self.id, %reason, "forecast.failed");
        self.state = JobState::Failed(reason);
        self.finished_at = Some(Utc::now());
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            scenario: self.scenario.clone(),
            state: self.state.clone(),
            percent: self.percent,
            message: self.message.clone(),
            current_sector: self.current_sector.clone(),
            tally: self.tally.clone(),
            result: self.result,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

/// Submits forecast runs and follows them on the progress channel.
pub struct ForecastProgressConsumer {
    service: Arc<dyn AnalysisService>,
    project: String,
}

impl ForecastProgressConsumer {
    pub fn new(service: Arc<dyn AnalysisService>, project: impl Into<String>) -> Self {
        Self {
            service,
            project: project.into(),
        }
    }

    /// Run a forecast for `scenario` to a terminal state.
    ///
    /// The channel is opened before submission so no event is missed, and
    /// dropped as soon as the job is terminal.
    pub async fn run(
        &self,
        scenario: &ScenarioKey,
        sectors: Vec<SectorName>,
        mut progress_cb: Option<&mut dyn FnMut(&JobSnapshot)>,
    ) -> JobSnapshot {
        let mut job = ForecastJob::new(scenario.clone());
        let mut emit = |job: &ForecastJob| {
            if let Some(cb) = progress_cb.as_deref_mut() {
                cb(&job.snapshot());
            }
        };

        let mut channel = match self.service.open_progress_channel(&self.project).await {
            Ok(channel) => channel,
            Err(err) => {
                job.start();
                job.channel_failed(err.to_string());
                emit(&job);
                return job.snapshot();
            }
        };

        let request = ForecastRequest {
            project_path: self.project.clone(),
            scenario: scenario.clone(),
            sectors,
            target_year: None,
        };
        job.start();
        if let Err(err) = self.service.submit_forecast(&request).await {
            job.fail(FailureReason::Server(err.to_string()));
            emit(&job);
            return job.snapshot();
        }
        emit(&job);

        while !job.is_terminal() {
            match channel.recv().await {
                Some(Ok(event)) => {
                    if job.apply(event) {
                        emit(&job);
                    }
                }
                Some(Err(err)) => {
                    job.channel_failed(err.to_string());
                    emit(&job);
                }
                None => {
                    job.channel_failed("progress channel closed before the run ended");
                    emit(&job);
                }
            }
        }
        drop(channel);
        job.snapshot()
    }
}
