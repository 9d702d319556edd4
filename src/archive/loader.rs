//! Measurement loader.
//!
//! Reads the measurement files referenced by filtered index entries. A
//! missing or corrupt file is logged and dropped; the rest of the batch
//! still loads.

use crate::error::TimegraphError;
use crate::models::{IndexEntry, Measurement, SkippedRecord};
use indicatif::ProgressBar;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Measurements that loaded, plus the files that did not.
#[derive(Debug, Clone, Default)]
pub struct LoadOutcome {
    /// Sorted by ascending timestamp.
    pub measurements: Vec<Measurement>,
    pub skipped: Vec<SkippedRecord>,
}

/// Load every entry's measurement file from `marker_dir`.
///
/// The result is sorted by timestamp whatever order the entries came in.
pub fn load_measurements(
    marker_dir: &Path,
    entries: &[IndexEntry],
    progress: &ProgressBar,
) -> LoadOutcome {
    let mut outcome = LoadOutcome::default();
    progress.set_length(entries.len() as u64);

    for entry in entries {
        match load_record(marker_dir, entry) {
            Ok(measurement) => outcome.measurements.push(measurement),
            Err(err) => {
                warn!("{}", err);
                let reason = match err {
                    TimegraphError::RecordUnreadable { reason, .. } => reason,
                    other => other.to_string(),
                };
                outcome.skipped.push(SkippedRecord {
                    file: entry.file.clone(),
                    reason,
                });
            }
        }
        progress.inc(1);
    }

    outcome.measurements.sort_by_key(|m| m.timestamp);

    debug!(
        "Loaded {} measurements, skipped {}",
        outcome.measurements.len(),
        outcome.skipped.len()
    );

    outcome
}

/// Read and parse a single measurement file.
fn load_record(marker_dir: &Path, entry: &IndexEntry) -> Result<Measurement, TimegraphError> {
    let path = resolve_record_path(marker_dir, &entry.file)?;

    let content = std::fs::read_to_string(&path).map_err(|e| unreadable(&path, e))?;
    let measurement: Measurement =
        serde_json::from_str(&content).map_err(|e| unreadable(&path, e))?;

    if measurement.timestamp != entry.timestamp {
        debug!(
            "Timestamp in {} ({}) differs from its index entry ({})",
            path.display(),
            measurement.timestamp,
            entry.timestamp
        );
    }

    Ok(measurement)
}

/// Join a manifest file reference onto the marker directory, refusing
/// references that would leave it.
fn resolve_record_path(marker_dir: &Path, file: &str) -> Result<PathBuf, TimegraphError> {
    let relative = Path::new(file);
    let stays_inside = !file.is_empty()
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));

    if !stays_inside {
        return Err(TimegraphError::RecordUnreadable {
            path: PathBuf::from(file),
            reason: "file reference points outside the marker directory".to_string(),
        });
    }

    Ok(marker_dir.join(relative))
}

fn unreadable(path: &Path, err: impl std::fmt::Display) -> TimegraphError {
    TimegraphError::RecordUnreadable {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}
