//! Error types for playback aggregation

use thiserror::Error;
use uuid::Uuid;

/// Result type for aggregation operations
pub type Result<T> = std::result::Result<T, AggregationError>;

/// Errors surfaced by the aggregation engine and its collaborators
#[derive(Error, Debug)]
pub enum AggregationError {
    /// The stream has no playback events in the requested window
    #[error("no data for stream {stream_id}")]
    NoData { stream_id: Uuid },

    /// Event source failed to return data
    #[error("Event source unavailable: {0}")]
    SourceUnavailable(String),

    /// Stats store rejected the write
    #[error("Stats store failure: {0}")]
    SinkFailure(String),

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AggregationError {
    pub fn is_no_data(&self) -> bool {
        matches!(self, AggregationError::NoData { .. })
    }

    /// Check if the caller may retry the aggregation
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AggregationError::SourceUnavailable(_) | AggregationError::SinkFailure(_)
        )
    }

    /// Label used for the outcome metric
    pub(crate) fn outcome(&self) -> &'static str {
        match self {
            AggregationError::NoData { .. } => "no_data",
            AggregationError::SourceUnavailable(_) => "source_error",
            AggregationError::SinkFailure(_) => "sink_error",
            AggregationError::InvalidConfig(_) => "config_error",
        }
    }
}

impl From<envy::Error> for AggregationError {
    fn from(err: envy::Error) -> Self {
        AggregationError::InvalidConfig(err.to_string())
    }
}
