//! Error types for mixscan

use thiserror::Error;

use crate::models::track::TrackValidationError;

/// Common result type for mixscan operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for a mix-identification run
///
/// Per-segment failures (provider errors, cache corruption, unreadable
/// segments) are recovered inside the orchestration loop and never surface
/// here; this type only carries run-fatal conditions.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Track construction rejected by validation
    #[error("Invalid track: {0}")]
    InvalidTrack(#[from] TrackValidationError),

    /// Track identification failed, carrying the root cause
    #[error("Track identification failed: {context}")]
    Identification {
        context: String,
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Output rendering or file writing error
    #[error("Output error: {0}")]
    Output(String),

    /// The run completed but no track cleared identification
    #[error("No tracks identified")]
    NoTracksIdentified,
}

impl Error {
    /// Wrap a root cause into an identification failure
    pub fn identification(
        context: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::Identification {
            context: context.into(),
            cause: Box::new(cause),
        }
    }
}
