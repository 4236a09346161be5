//! Error types for Estuary.

use thiserror::Error;

/// Primary error type for all Estuary operations.
#[derive(Error, Debug)]
pub enum EstuaryError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Image decode error: {0}")]
    ImageDecode(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Download error: {0}")]
    Download(String),

    #[error("Run canceled")]
    Canceled,

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl EstuaryError {
    /// Create a stream error from any displayable source.
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream(message.into())
    }

    /// Whether the failure came from the chunk source itself (run-fatal)
    /// rather than an optional finalization step.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            Self::Stream(_) | Self::Io(_) | Self::Canceled | Self::InvalidState(_)
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, EstuaryError>;
