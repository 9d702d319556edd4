//! Error taxonomy for the trajectory pipeline.
//!
//! Request-level failures are distinguishable so the caller can render
//! an accurate message and pick the right exit code. Per-record failures
//! (`RecordUnreadable`) are only ever logged and collected, never returned
//! from a request.

use crate::models::ArchiveScope;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the archive reader, loader and trajectory engine.
#[derive(Debug, Error)]
pub enum TimegraphError {
    /// No manifest exists for the requested scope.
    #[error("no index.json found at {path}; check that subject '{}', module '{}' and marker '{}' exist in the archive", .scope.subject_id, .scope.module_id, .scope.marker_id)]
    ScopeNotFound { scope: ArchiveScope, path: PathBuf },

    /// The scope exists but the window holds no usable measurements.
    #[error("no data points found in the requested timeframe")]
    EmptySeries,

    /// A single measurement file could not be used.
    #[error("skipping data point file '{path}': {reason}")]
    RecordUnreadable { path: PathBuf, reason: String },

    /// The requested degree cannot be supported by the series.
    #[error("polynomial degree {degree} requires more than {degree} distinct time offsets, found {distinct_offsets}")]
    FitUnderdetermined {
        degree: usize,
        distinct_offsets: usize,
    },

    /// The manifest itself is corrupt.
    #[error("malformed index at {path}: {reason}")]
    MalformedIndex { path: PathBuf, reason: String },

    /// Request input failed validation.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
}

/// Coarse classification used to pick the caller-facing response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidParameters,
    Internal,
}

impl ErrorKind {
    /// Process exit code for this kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::Internal => 1,
            ErrorKind::InvalidParameters => 2,
            ErrorKind::NotFound => 3,
        }
    }
}

impl TimegraphError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TimegraphError::ScopeNotFound { .. } | TimegraphError::EmptySeries => {
                ErrorKind::NotFound
            }
            TimegraphError::FitUnderdetermined { .. } | TimegraphError::InvalidParameters(_) => {
                ErrorKind::InvalidParameters
            }
            TimegraphError::MalformedIndex { .. } | TimegraphError::RecordUnreadable { .. } => {
                ErrorKind::Internal
            }
        }
    }
}

pub type TimegraphResult<T> = std::result::Result<T, TimegraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> ArchiveScope {
        ArchiveScope::new("subject_001", "vtf_stress_test", "vo2max").unwrap()
    }

    #[test]
    fn test_not_found_kinds() {
        let err = TimegraphError::ScopeNotFound {
            scope: scope(),
            path: PathBuf::from("x/index.json"),
        };
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.kind().exit_code(), 3);

        let err = TimegraphError::EmptySeries;
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("no data points"));
    }

    #[test]
    fn test_invalid_parameter_kinds() {
        let err = TimegraphError::FitUnderdetermined {
            degree: 3,
            distinct_offsets: 2,
        };
        assert_eq!(err.kind(), ErrorKind::InvalidParameters);
        assert_eq!(err.kind().exit_code(), 2);
    }

    #[test]
    fn test_malformed_index_is_internal() {
        let err = TimegraphError::MalformedIndex {
            path: PathBuf::from("index.json"),
            reason: "expected value".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.kind().exit_code(), 1);
    }

    #[test]
    fn test_scope_not_found_message_names_scope() {
        let err = TimegraphError::ScopeNotFound {
            scope: scope(),
            path: PathBuf::from("archive/subject_001/vtf_stress_test/vo2max/index.json"),
        };
        let msg = err.to_string();
        assert!(msg.contains("subject_001"));
        assert!(msg.contains("vo2max"));
    }
}
