//! Archive index reader.
//!
//! Each scope owns an `index.json` manifest listing its measurement files
//! with their timestamps. The manifest is trusted metadata: a malformed
//! row fails the whole read, unlike individual measurement files.

use crate::error::{TimegraphError, TimegraphResult};
use crate::models::{parse_utc, ArchiveScope, IndexEntry, TimeWindow};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the per-scope manifest.
pub const INDEX_FILE: &str = "index.json";

/// Manifest as written by the ingestion process.
///
/// Older archives store a bare list of entries instead of the wrapped form.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawManifest {
    Wrapped { entries: Vec<RawEntry> },
    Bare(Vec<RawEntry>),
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    timestamp: String,
    file: String,
}

/// A scope's manifest, loaded from disk.
#[derive(Debug, Clone)]
pub struct ArchiveIndex {
    marker_dir: PathBuf,
    entries: Vec<IndexEntry>,
}

impl ArchiveIndex {
    /// Directory holding the scope's manifest and measurement files.
    pub fn marker_dir_for(archive_root: &Path, scope: &ArchiveScope) -> PathBuf {
        archive_root
            .join(&scope.subject_id)
            .join(&scope.module_id)
            .join(&scope.marker_id)
    }

    /// Load the manifest for a scope.
    pub fn load(archive_root: &Path, scope: &ArchiveScope) -> TimegraphResult<Self> {
        let marker_dir = Self::marker_dir_for(archive_root, scope);
        let index_path = marker_dir.join(INDEX_FILE);

        if !index_path.is_file() {
            return Err(TimegraphError::ScopeNotFound {
                scope: scope.clone(),
                path: index_path,
            });
        }

        let content =
            std::fs::read_to_string(&index_path).map_err(|e| TimegraphError::MalformedIndex {
                path: index_path.clone(),
                reason: e.to_string(),
            })?;

        let entries = parse_manifest(&content).map_err(|reason| TimegraphError::MalformedIndex {
            path: index_path.clone(),
            reason,
        })?;

        debug!("Loaded {} index entries from {}", entries.len(), index_path.display());

        Ok(Self {
            marker_dir,
            entries,
        })
    }

    pub fn marker_dir(&self) -> &Path {
        &self.marker_dir
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Entries inside the window, in manifest order.
    pub fn filter(&self, window: &TimeWindow) -> Vec<IndexEntry> {
        filter_entries(&self.entries, window)
    }
}

/// Parse manifest JSON into typed entries.
fn parse_manifest(content: &str) -> Result<Vec<IndexEntry>, String> {
    let raw: RawManifest = serde_json::from_str(content)
        .map_err(|e| format!("expected {{\"entries\": [...]}} or a list of entries: {}", e))?;

    let raw_entries = match raw {
        RawManifest::Wrapped { entries } => entries,
        RawManifest::Bare(entries) => entries,
    };

    raw_entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let timestamp = parse_utc(&entry.timestamp).map_err(|e| {
                format!("entry {} has invalid timestamp '{}': {}", i, entry.timestamp, e)
            })?;
            Ok(IndexEntry {
                timestamp,
                file: entry.file,
            })
        })
        .collect()
}

/// Keep the entries whose timestamp lies in the window.
///
/// Does not assume the entries are sorted.
pub fn filter_entries(entries: &[IndexEntry], window: &TimeWindow) -> Vec<IndexEntry> {
    entries
        .iter()
        .filter(|entry| window.contains(&entry.timestamp))
        .cloned()
        .collect()
}
