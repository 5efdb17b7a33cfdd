use crate::sink::batch::Batch;
use async_trait::async_trait;

/// A time-series backend that accepts batches of points.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Submit one batch; exactly one backend write per call.
    async fn write(&self, batch: &Batch) -> Result<(), SinkError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("sink rejected write with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to encode batch: {0}")]
    Encode(String),

    #[error("sink error: {0}")]
    Generic(String),
}

impl SinkError {
    /// Whether the same batch has a chance of succeeding on a later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            SinkError::Http(_) | SinkError::Generic(_) => true,
            SinkError::Rejected { status, .. } => *status >= 500 || *status == 429,
            SinkError::Encode(_) => false,
        }
    }
}
