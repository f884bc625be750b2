//! dc-client: access to the external analysis service.
//!
//! Contains:
//! - service (the `AnalysisService` seam every other crate talks through)
//! - types (request and response payloads)
//! - sse (decoder for the forecast progress channel)
//! - http (reqwest implementation)

pub mod http;
pub mod service;
pub mod sse;
pub mod types;

pub use http::HttpAnalysisService;
pub use service::{AnalysisService, ProgressReceiver};
pub use sse::{MAX_PENDING, SseDecoder, SseFrame};
pub use types::*;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The service could not be reached or the connection broke.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The service answered with `success: false`.
    #[error("{0}")]
    Application(String),

    /// The response did not have the expected shape.
    #[error("Malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ServiceError::Decode(err.to_string())
        } else {
            ServiceError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Decode(err.to_string())
    }
}
