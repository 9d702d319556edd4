//! Report and metadata persistence.
//!
//! Reports are written as one JSON file each; subjects and the report
//! index live in a small SQLite database.

use crate::models::TimegraphReport;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Destination for full report records.
pub trait ReportStore {
    /// Persist the report and return where it was written.
    fn save(&self, report: &TimegraphReport) -> Result<PathBuf>;
}

/// Subject bookkeeping and report index.
pub trait MetadataStore {
    /// Insert the subject if it is not known yet. Returns true when a row was added.
    fn ensure_subject(&self, subject_id: &str, created_at: DateTime<Utc>) -> Result<bool>;

    /// Record that a report exists at `location`.
    fn record_report(&self, report: &TimegraphReport, location: &Path) -> Result<()>;
}

/// Writes `<root>/<subject_id>/<report_id>.json`.
#[derive(Debug, Clone)]
pub struct FileReportStore {
    root: PathBuf,
}

impl FileReportStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, report: &TimegraphReport) -> PathBuf {
        self.root
            .join(&report.subject_id)
            .join(format!("{}.json", report.report_id))
    }
}

impl ReportStore for FileReportStore {
    fn save(&self, report: &TimegraphReport) -> Result<PathBuf> {
        let path = self.path_for(report);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create report directory {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(report)?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;

        debug!("Wrote report {} to {}", report.report_id, path.display());
        Ok(path)
    }
}

/// A row of the report index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportIndexRow {
    pub report_id: String,
    pub subject_id: String,
    pub module_id: String,
    pub marker_id: String,
    pub requested_at: String,
    pub report_path: String,
}

/// SQLite-backed metadata store. Opens a connection per call.
#[derive(Debug, Clone)]
pub struct SqliteMetadataStore {
    db_path: PathBuf,
}

impl SqliteMetadataStore {
    /// Open (and create if needed) the database and its tables.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory {}", parent.display())
            })?;
        }

        let store = Self { db_path };
        let conn = store.connect()?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS subjects (
                subject_id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL
            );
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS reports (
                report_id TEXT PRIMARY KEY,
                subject_id TEXT NOT NULL,
                module_id TEXT NOT NULL,
                marker_id TEXT NOT NULL,
                requested_at TEXT NOT NULL,
                report_path TEXT NOT NULL
            );
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_reports_subject ON reports(subject_id);",
            [],
        )?;

        Ok(store)
    }

    fn connect(&self) -> Result<Connection> {
        Connection::open(&self.db_path)
            .with_context(|| format!("Failed to open database {}", self.db_path.display()))
    }

    /// Reports recorded for a subject, oldest first.
    pub fn reports_for(&self, subject_id: &str) -> Result<Vec<ReportIndexRow>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT report_id, subject_id, module_id, marker_id, requested_at, report_path
             FROM reports WHERE subject_id = ?1 ORDER BY requested_at, report_id",
        )?;
        let rows = stmt.query_map(params![subject_id], |row| {
            Ok(ReportIndexRow {
                report_id: row.get(0)?,
                subject_id: row.get(1)?,
                module_id: row.get(2)?,
                marker_id: row.get(3)?,
                requested_at: row.get(4)?,
                report_path: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

impl MetadataStore for SqliteMetadataStore {
    fn ensure_subject(&self, subject_id: &str, created_at: DateTime<Utc>) -> Result<bool> {
        let conn = self.connect()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO subjects (subject_id, created_at) VALUES (?1, ?2)",
            params![subject_id, created_at.to_rfc3339()],
        )?;
        Ok(inserted > 0)
    }

    fn record_report(&self, report: &TimegraphReport, location: &Path) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO reports (report_id, subject_id, module_id, marker_id, requested_at, report_path)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                report.report_id.to_string(),
                report.subject_id,
                report.module_id,
                report.marker_id,
                report.requested_at.to_rfc3339(),
                location.to_string_lossy().to_string(),
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn subjects(store: &SqliteMetadataStore) -> Vec<String> {
        let conn = store.connect().unwrap();
        let mut stmt = conn
            .prepare("SELECT subject_id FROM subjects ORDER BY subject_id")
            .unwrap();
        let rows = stmt.query_map([], |row| row.get(0)).unwrap();
        rows.collect::<rusqlite::Result<Vec<String>>>().unwrap()
    }

    #[test]
    fn test_ensure_subject_is_insert_if_absent() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteMetadataStore::open(tmp.path().join("db/timegraph.db")).unwrap();

        assert!(store.ensure_subject("subject_001", Utc::now()).unwrap());
        assert!(!store.ensure_subject("subject_001", Utc::now()).unwrap());
        assert!(store.ensure_subject("subject_000", Utc::now()).unwrap());

        assert_eq!(subjects(&store), vec!["subject_000", "subject_001"]);
    }

    #[test]
    fn test_open_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("timegraph.db");
        let store = SqliteMetadataStore::open(&path).unwrap();
        store.ensure_subject("s", Utc::now()).unwrap();

        let reopened = SqliteMetadataStore::open(&path).unwrap();
        assert_eq!(subjects(&reopened), vec!["s"]);
    }
}
