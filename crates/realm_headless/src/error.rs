//! Error types for the headless runner.

use std::path::PathBuf;

use realm_core::error::RealmError;
use thiserror::Error;

/// Result type alias using [`HeadlessError`].
pub type Result<T> = std::result::Result<T, HeadlessError>;

/// Errors raised while loading scenarios or running episodes.
#[derive(Debug, Error)]
pub enum HeadlessError {
    /// The engine rejected a configuration, terrain or step.
    #[error(transparent)]
    Realm(#[from] RealmError),

    /// Reading or writing a file failed.
    #[error("IO error on '{path}': {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A scenario file is not valid RON.
    #[error("Failed to parse scenario '{path}': {source}")]
    Ron {
        /// Scenario file.
        path: PathBuf,
        /// Parser error with position.
        #[source]
        source: ron::error::SpannedError,
    },

    /// Summary encoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Verification needs at least one run.
    #[error("Verification needs at least one run")]
    NoRuns,
}

impl HeadlessError {
    /// Wrap an IO error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
