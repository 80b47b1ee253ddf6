use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Failures surfaced by the telemetry pipeline.
///
/// Only `ProviderUnavailable` and `Assembly` end a run. Everything else is
/// scoped to a single series and turned into a skipped triple by the driver.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("metrics provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("no data returned for {0}")]
    NoData(String),

    #[error("malformed series {} (line {line}): {reason}", path.display())]
    MalformedSeries {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("artifact i/o error on {}: {source}", path.display())]
    ArtifactIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not write report {}: {source}", path.display())]
    Assembly {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl TelemetryError {
    pub fn artifact_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        TelemetryError::ArtifactIo {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        TelemetryError::MalformedSeries {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }

    /// True when the whole run has to stop.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TelemetryError::ProviderUnavailable(_) | TelemetryError::Assembly { .. }
        )
    }
}
