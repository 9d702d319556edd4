//! Report assembly.
//!
//! Packages a trajectory result with its request context into a report
//! record, stores it, and registers the subject. Every call mints a new
//! report id, so repeated identical requests leave separate audit entries.

use super::store::{MetadataStore, ReportStore};
use crate::models::{
    ArchiveScope, FitSpec, SkippedRecord, TimeWindow, TimegraphReport, TrajectoryResult,
    ZoneBoundaries,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

/// Request context recorded alongside the trajectory.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub scope: ArchiveScope,
    pub window: TimeWindow,
    pub zone_boundaries: ZoneBoundaries,
    pub fit_spec: FitSpec,
    pub requested_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub skipped_records: Vec<SkippedRecord>,
}

/// A stored report and where it went.
#[derive(Debug, Clone)]
pub struct AssembledReport {
    pub report: TimegraphReport,
    pub location: PathBuf,
}

/// Build the report record. Mints a fresh id.
pub fn build_report(context: ReportContext, trajectory: TrajectoryResult) -> TimegraphReport {
    let ReportContext {
        scope,
        window,
        zone_boundaries,
        fit_spec,
        requested_at,
        duration_ms,
        skipped_records,
    } = context;

    TimegraphReport {
        report_id: Uuid::new_v4(),
        subject_id: scope.subject_id,
        module_id: scope.module_id,
        marker_id: scope.marker_id,
        requested_at,
        timeframe: window,
        zone_boundaries,
        fitting: fit_spec,
        duration_ms,
        skipped_records,
        trajectory,
    }
}

/// Stores reports and keeps the metadata store in step.
pub struct ReportAssembler<'a> {
    reports: &'a dyn ReportStore,
    metadata: &'a dyn MetadataStore,
}

impl<'a> ReportAssembler<'a> {
    pub fn new(reports: &'a dyn ReportStore, metadata: &'a dyn MetadataStore) -> Self {
        Self { reports, metadata }
    }

    /// Build, store and index a report.
    ///
    /// The report file is written before any metadata, so a failed write
    /// leaves the database untouched.
    pub fn assemble(
        &self,
        context: ReportContext,
        trajectory: TrajectoryResult,
    ) -> Result<AssembledReport> {
        let report = build_report(context, trajectory);
        let location = self.reports.save(&report)?;

        if self
            .metadata
            .ensure_subject(&report.subject_id, report.requested_at)?
        {
            info!("Registered new subject {}", report.subject_id);
        }
        self.metadata.record_report(&report, &location)?;

        info!("Report {} saved to {}", report.report_id, location.display());

        Ok(AssembledReport { report, location })
    }
}
