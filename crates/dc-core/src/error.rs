use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid time range: start {start} is after end {end}")]
    InvertedRange { start: i32, end: i32 },

    #[error("Unknown energy unit: {0}")]
    UnknownUnit(String),

    #[error("Unknown demand type: {0}")]
    UnknownDemandType(String),
}
