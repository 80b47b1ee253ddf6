use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::debug;

use super::{Observation, Result, SeriesKey, TelemetryError};

pub const TIMESTAMP_HEADER: &str = "Timestamp";
pub const UNIT_HEADER: &str = "Unit";
/// `2024-03-01 10:00:00 +0000 UTC`, fraction only when non-zero.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f %z UTC";

/// A raw series persisted on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesArtifact {
    pub key: SeriesKey,
    pub path: PathBuf,
    pub rows: usize,
}

impl SeriesArtifact {
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn record(fields: [&str; 3]) -> String {
    format!("\"{}\";\"{}\";\"{}\";\r\n", fields[0], fields[1], fields[2])
}

/// Writes `observations` as `<root>/<key layout>.csv`, replacing any earlier file.
///
/// Directories are created as needed. The header always exists, so an empty
/// slice still yields a valid (header-only) artifact.
pub fn persist(root: &Path, key: &SeriesKey, observations: &[Observation]) -> Result<SeriesArtifact> {
    let path = key.csv_path(root);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| TelemetryError::artifact_io(parent, e))?;
    }

    let file = File::create(&path).map_err(|e| TelemetryError::artifact_io(&path, e))?;
    let mut out = BufWriter::new(file);
    let io_err = |e| TelemetryError::artifact_io(&path, e);

    out.write_all(record([TIMESTAMP_HEADER, key.statistic.as_str(), UNIT_HEADER]).as_bytes())
        .map_err(io_err)?;
    for obs in observations {
        let line = record([
            &format_timestamp(obs.timestamp),
            &format!("{:.6}", obs.value),
            &obs.unit,
        ]);
        out.write_all(line.as_bytes()).map_err(io_err)?;
    }
    out.flush().map_err(io_err)?;

    debug!("Wrote {} rows to {}", observations.len(), path.display());
    Ok(SeriesArtifact {
        key: key.clone(),
        path,
        rows: observations.len(),
    })
}
