// Error types for the media provider layer

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    /// Request is missing a required field or is malformed
    #[error("{0}")]
    InvalidRequest(String),

    /// yt-dlp failed, timed out or returned nothing.
    /// Carries the upstream text unchanged so operators can see the real cause.
    #[error("{0}")]
    ExtractionFailed(String),

    /// The provider finished but no output file matches the predicted name
    #[error("Downloaded file not found at expected path: {}", .0.display())]
    OutputNotFound(PathBuf),

    /// yt-dlp binary could not be started
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// True for errors the caller can fix by changing the request
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidRequest(_))
    }
}
