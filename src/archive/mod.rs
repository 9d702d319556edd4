//! File-based measurement archive.
//!
//! Layout: `<root>/<subject>/<module>/<marker>/index.json` plus one JSON
//! file per measurement next to it. The archive is read-only from here.

pub mod index;
pub mod loader;

pub use index::{ArchiveIndex, INDEX_FILE};
pub use loader::{load_measurements, LoadOutcome};

use crate::error::TimegraphResult;
use crate::models::{ArchiveScope, TimeWindow};
use anyhow::Result;
use indicatif::ProgressBar;
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Read the measurements of one scope inside a window.
///
/// Fails only on scope or manifest problems; unreadable measurement files
/// are reported in the outcome.
pub fn read_timeseries(
    archive_root: &Path,
    scope: &ArchiveScope,
    window: &TimeWindow,
    progress: &ProgressBar,
) -> TimegraphResult<LoadOutcome> {
    let index = ArchiveIndex::load(archive_root, scope)?;
    let entries = index.filter(window);

    info!(
        "{} of {} index entries for {} fall inside the window",
        entries.len(),
        index.entries().len(),
        scope
    );

    Ok(load_measurements(index.marker_dir(), &entries, progress))
}

/// Subject directories directly under the archive root, sorted.
///
/// A missing root is an empty archive.
pub fn list_subjects(archive_root: &Path) -> Result<Vec<String>> {
    if !archive_root.is_dir() {
        debug!("Archive root {} does not exist", archive_root.display());
        return Ok(Vec::new());
    }

    let mut subjects = Vec::new();
    for entry in std::fs::read_dir(archive_root)?.flatten() {
        if entry.path().is_dir() {
            subjects.push(entry.file_name().to_string_lossy().to_string());
        }
    }

    subjects.sort();
    Ok(subjects)
}

/// Every scope in the archive that has a manifest, sorted.
pub fn list_scopes(archive_root: &Path) -> Vec<ArchiveScope> {
    let mut scopes: Vec<ArchiveScope> = WalkDir::new(archive_root)
        .min_depth(4)
        .max_depth(4)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name() == INDEX_FILE)
        .filter_map(|e| {
            let rel = e.path().strip_prefix(archive_root).ok()?;
            let parts: Vec<String> = rel
                .iter()
                .map(|p| p.to_string_lossy().to_string())
                .collect();
            match parts.as_slice() {
                [subject, module, marker, _] => ArchiveScope::new(subject, module, marker).ok(),
                _ => None,
            }
        })
        .collect();

    scopes.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
    scopes
}
