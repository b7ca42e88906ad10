//! Error taxonomy for the scheduling core.
//!
//! Only failures with no safe default reach callers as `CoreError`. Resolution and
//! playback problems are absorbed by their fallback chains and never show up here
//! except as `AudioLoad`, which the firing handler consumes internally.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Coordinates outside the valid range, or a location/date where the sun never
    /// rises or sets so prayer times are undefined.
    #[error("invalid location ({latitude:.4}, {longitude:.4}): {reason}")]
    InvalidLocation {
        latitude: f64,
        longitude: f64,
        reason: String,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed to write {}: {source}", path.display())]
    StorageWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {}: {reason}", path.display())]
    StorageRead { path: PathBuf, reason: String },

    #[error("network failure for {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("could not load audio from {source_ref}: {reason}")]
    AudioLoad { source_ref: String, reason: String },

    #[error("alarm {0} is not pending")]
    AlarmNotFound(String),
}

impl CoreError {
    pub fn invalid_location(latitude: f64, longitude: f64, reason: impl Into<String>) -> Self {
        Self::InvalidLocation {
            latitude,
            longitude,
            reason: reason.into(),
        }
    }

    pub fn storage_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StorageWrite {
            path: path.into(),
            source,
        }
    }

    pub fn network(url: &str, reason: impl ToString) -> Self {
        Self::Network {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
