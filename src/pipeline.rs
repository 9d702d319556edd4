//! Request orchestration.
//!
//! Runs one trajectory request end to end: archive read, fit, report.
//! All process-wide settings arrive through [`PipelineContext`]; nothing
//! here holds state between requests.

use crate::analysis::{compute_trajectory, TrendPolicy};
use crate::archive::{read_timeseries, LoadOutcome};
use crate::error::TimegraphError;
use crate::models::{ArchiveScope, FitSpec, TimeWindow, ZoneBoundaries};
use crate::registry::ModuleRegistry;
use crate::report::{
    AssembledReport, FileReportStore, ReportAssembler, ReportContext, SqliteMetadataStore,
};
use anyhow::Result;
use chrono::Utc;
use indicatif::ProgressBar;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// Settings shared by every request of the process.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub archive_root: PathBuf,
    pub reports_root: PathBuf,
    pub database_path: PathBuf,
    /// Only needed when requests omit zone boundaries.
    pub registry: Option<ModuleRegistry>,
    pub trend_policy: TrendPolicy,
}

/// One trajectory request.
#[derive(Debug, Clone)]
pub struct TimegraphRequest {
    pub scope: ArchiveScope,
    pub window: TimeWindow,
    /// Falls back to the registry defaults for the marker when absent.
    pub zone_boundaries: Option<ZoneBoundaries>,
    pub fit_spec: FitSpec,
}

impl PipelineContext {
    /// Boundaries to use for a request.
    pub fn resolve_boundaries(
        &self,
        request: &TimegraphRequest,
    ) -> Result<ZoneBoundaries, TimegraphError> {
        if let Some(boundaries) = request.zone_boundaries {
            boundaries.validate()?;
            return Ok(boundaries);
        }

        self.registry
            .as_ref()
            .and_then(|r| r.default_boundaries(&request.scope.module_id, &request.scope.marker_id))
            .ok_or_else(|| {
                TimegraphError::InvalidParameters(format!(
                    "no zone boundaries given and the registry has no defaults for {}/{}",
                    request.scope.module_id, request.scope.marker_id
                ))
            })
    }

    /// Read the request's measurements without fitting anything.
    pub fn retrieve(
        &self,
        request: &TimegraphRequest,
        progress: &ProgressBar,
    ) -> Result<LoadOutcome, TimegraphError> {
        read_timeseries(&self.archive_root, &request.scope, &request.window, progress)
    }

    /// Run the full pipeline and persist the report.
    ///
    /// Taxonomy failures surface as [`TimegraphError`] inside the
    /// returned error; persistence failures carry their own context.
    pub fn run(&self, request: TimegraphRequest, progress: &ProgressBar) -> Result<AssembledReport> {
        let started = Instant::now();
        let requested_at = Utc::now();

        let zone_boundaries = self.resolve_boundaries(&request)?;

        let outcome = self.retrieve(&request, progress)?;
        if outcome.measurements.is_empty() {
            return Err(TimegraphError::EmptySeries.into());
        }

        info!(
            "Fitting degree {} trend to {} points",
            request.fit_spec.polynomial_degree,
            outcome.measurements.len()
        );

        let trajectory = compute_trajectory(
            outcome.measurements,
            &zone_boundaries,
            &request.fit_spec,
            &self.trend_policy,
        )?;

        let context = ReportContext {
            scope: request.scope,
            window: request.window,
            zone_boundaries,
            fit_spec: request.fit_spec,
            requested_at,
            duration_ms: started.elapsed().as_millis() as u64,
            skipped_records: outcome.skipped,
        };

        let reports = FileReportStore::new(&self.reports_root);
        let metadata = SqliteMetadataStore::open(&self.database_path)?;
        ReportAssembler::new(&reports, &metadata).assemble(context, trajectory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{ArchiveIndex, INDEX_FILE};
    use crate::error::ErrorKind;
    use crate::models::{Trend, Zone};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn scope() -> ArchiveScope {
        ArchiveScope::new("subject_001", "vtf_stress_test", "vo2max").unwrap()
    }

    /// Five hourly points, manifest deliberately out of order.
    fn build_archive(root: &Path, values: &[f64]) {
        let dir = ArchiveIndex::marker_dir_for(root, &scope());
        fs::create_dir_all(&dir).unwrap();

        let mut entries = Vec::new();
        for (i, value) in values.iter().enumerate() {
            let ts = format!("2026-01-05T{:02}:00:00Z", 8 + i);
            let file = format!("2026-01-05T{:02}-00-00Z.json", 8 + i);
            fs::write(
                dir.join(&file),
                serde_json::json!({"timestamp": ts, "value": value, "source": "treadmill"})
                    .to_string(),
            )
            .unwrap();
            entries.push(serde_json::json!({"timestamp": ts, "file": file}));
        }
        entries.reverse();

        fs::write(
            dir.join(INDEX_FILE),
            serde_json::json!({ "entries": entries }).to_string(),
        )
        .unwrap();
    }

    fn context(tmp: &TempDir) -> PipelineContext {
        PipelineContext {
            archive_root: tmp.path().join("archive"),
            reports_root: tmp.path().join("reports"),
            database_path: tmp.path().join("timegraph.db"),
            registry: None,
            trend_policy: TrendPolicy::default(),
        }
    }

    fn request(degree: usize) -> TimegraphRequest {
        TimegraphRequest {
            scope: scope(),
            window: TimeWindow::parse("2026-01-05T00:00:00Z", "2026-01-05T23:59:59Z").unwrap(),
            zone_boundaries: Some(ZoneBoundaries::new(0.0, 20.0, 5.0).unwrap()),
            fit_spec: FitSpec {
                polynomial_degree: degree,
            },
        }
    }

    fn kind_of(err: &anyhow::Error) -> Option<ErrorKind> {
        err.downcast_ref::<TimegraphError>().map(|e| e.kind())
    }

    #[test]
    fn test_end_to_end_linear_scenario() {
        let tmp = TempDir::new().unwrap();
        build_archive(&tmp.path().join("archive"), &[10.0, 12.0, 14.0, 16.0, 18.0]);
        let ctx = context(&tmp);

        let assembled = ctx.run(request(1), &ProgressBar::hidden()).unwrap();
        let trajectory = &assembled.report.trajectory;

        assert_eq!(trajectory.data_points.len(), 5);
        assert!(trajectory.data_points.iter().all(|p| p.zone == Zone::Healthy));
        assert!(trajectory
            .data_points
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp));
        assert!(trajectory.fit_metadata.coefficients[1] > 0.0);
        assert_eq!(trajectory.fit_metadata.trend, Trend::Improving);
        assert_eq!(
            trajectory.data_points[0].extra.get("source"),
            Some(&serde_json::Value::from("treadmill"))
        );

        assert!(assembled.location.exists());
        let metadata = SqliteMetadataStore::open(&ctx.database_path).unwrap();
        let rows = metadata.reports_for("subject_001").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].report_id, assembled.report.report_id.to_string());
    }

    #[test]
    fn test_corrupt_file_is_dropped_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("archive");
        build_archive(&archive, &[10.0, 12.0, 14.0, 16.0, 18.0]);
        let dir = ArchiveIndex::marker_dir_for(&archive, &scope());
        fs::write(dir.join("2026-01-05T10-00-00Z.json"), "{\"timestamp\": ").unwrap();

        let assembled = context(&tmp).run(request(1), &ProgressBar::hidden()).unwrap();
        assert_eq!(assembled.report.trajectory.data_points.len(), 4);
        assert_eq!(assembled.report.skipped_records.len(), 1);
    }

    #[test]
    fn test_unknown_scope_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = context(&tmp).run(request(1), &ProgressBar::hidden()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TimegraphError>(),
            Some(TimegraphError::ScopeNotFound { .. })
        ));
        assert_eq!(kind_of(&err), Some(ErrorKind::NotFound));
    }

    #[test]
    fn test_empty_window_is_empty_series() {
        let tmp = TempDir::new().unwrap();
        build_archive(&tmp.path().join("archive"), &[1.0, 2.0]);
        let mut req = request(0);
        req.window = TimeWindow::parse("2025-01-01T00:00:00Z", "2025-01-02T00:00:00Z").unwrap();

        let ctx = context(&tmp);
        let err = ctx.run(req, &ProgressBar::hidden()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TimegraphError>(),
            Some(TimegraphError::EmptySeries)
        ));
        assert!(!ctx.database_path.exists());
    }

    #[test]
    fn test_underdetermined_fit_persists_nothing() {
        let tmp = TempDir::new().unwrap();
        build_archive(&tmp.path().join("archive"), &[1.0, 2.0, 3.0]);
        let ctx = context(&tmp);

        let err = ctx.run(request(3), &ProgressBar::hidden()).unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::InvalidParameters));
        assert!(!ctx.reports_root.exists());
        assert!(!ctx.database_path.exists());
    }

    #[test]
    fn test_boundaries_from_registry() {
        let tmp = TempDir::new().unwrap();
        build_archive(&tmp.path().join("archive"), &[40.0, 42.0, 44.0]);

        let registry: ModuleRegistry = serde_json::from_str(
            r#"{"modules": [{"module_id": "vtf_stress_test", "markers": [
                {"marker_id": "vo2max", "zone_boundaries": {"healthy_min": 35, "healthy_max": 60, "vulnerability_margin": 5}}
            ]}]}"#,
        )
        .unwrap();
        let mut ctx = context(&tmp);
        let mut req = request(1);
        req.zone_boundaries = None;

        let err = ctx.run(req.clone(), &ProgressBar::hidden()).unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::InvalidParameters));

        ctx.registry = Some(registry);
        let assembled = ctx.run(req, &ProgressBar::hidden()).unwrap();
        assert_eq!(assembled.report.zone_boundaries.healthy_min, 35.0);
    }
}
