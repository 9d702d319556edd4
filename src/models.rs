//! Data models for the trajectory pipeline.
//!
//! This module contains the request inputs (scope, window, boundaries,
//! fit settings), the archive records, and the engine and report outputs.

use crate::error::{TimegraphError, TimegraphResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Parse an ISO-8601 / RFC 3339 timestamp carrying a zone designator
/// (`Z` or a numeric offset) and normalize it to UTC.
pub fn parse_utc(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw.trim()).map(|dt| dt.with_timezone(&Utc))
}

/// Identifies one logical series location in the archive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArchiveScope {
    pub subject_id: String,
    pub module_id: String,
    pub marker_id: String,
}

impl ArchiveScope {
    /// Build a scope, rejecting ids that are not plain path segments.
    pub fn new(subject_id: &str, module_id: &str, marker_id: &str) -> TimegraphResult<Self> {
        for (label, id) in [
            ("subject_id", subject_id),
            ("module_id", module_id),
            ("marker_id", marker_id),
        ] {
            if !is_plain_segment(id) {
                return Err(TimegraphError::InvalidParameters(format!(
                    "{} '{}' must be a single archive path segment",
                    label, id
                )));
            }
        }

        Ok(Self {
            subject_id: subject_id.to_string(),
            module_id: module_id.to_string(),
            marker_id: marker_id.to_string(),
        })
    }
}

impl fmt::Display for ArchiveScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.subject_id, self.module_id, self.marker_id)
    }
}

fn is_plain_segment(id: &str) -> bool {
    !id.is_empty() && id != "." && id != ".." && !id.contains(['/', '\\'])
}

/// One manifest row: when a measurement was taken and which file holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub timestamp: DateTime<Utc>,
    pub file: String,
}

/// Inclusive time window. An inverted window matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(rename = "from")]
    pub start: DateTime<Utc>,
    #[serde(rename = "to")]
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Parse both bounds from their string form.
    pub fn parse(start: &str, end: &str) -> TimegraphResult<Self> {
        let parse = |raw: &str| {
            parse_utc(raw).map_err(|e| {
                TimegraphError::InvalidParameters(format!(
                    "invalid timeframe timestamp '{}': {}",
                    raw, e
                ))
            })
        };
        Ok(Self::new(parse(start)?, parse(end)?))
    }

    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        self.start <= *instant && *instant <= self.end
    }
}

/// A single archived measurement.
///
/// `timestamp` and `value` are the fields the engine needs; everything
/// else in the source file is kept in `extra` and written back out as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Health zone of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Healthy,
    Vulnerable,
    Critical,
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::Healthy => write!(f, "Healthy"),
            Zone::Vulnerable => write!(f, "Vulnerable"),
            Zone::Critical => write!(f, "Critical"),
        }
    }
}

impl Zone {
    /// Returns an emoji representation of the zone.
    pub fn emoji(&self) -> &'static str {
        match self {
            Zone::Healthy => "🟢",
            Zone::Vulnerable => "🟡",
            Zone::Critical => "🔴",
        }
    }
}

/// Direction of the fitted curve over the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Improving => write!(f, "improving"),
            Trend::Stable => write!(f, "stable"),
            Trend::Declining => write!(f, "declining"),
        }
    }
}

/// Healthy band plus the vulnerability margin around it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneBoundaries {
    pub healthy_min: f64,
    pub healthy_max: f64,
    pub vulnerability_margin: f64,
}

impl ZoneBoundaries {
    pub fn new(healthy_min: f64, healthy_max: f64, vulnerability_margin: f64) -> TimegraphResult<Self> {
        let boundaries = Self {
            healthy_min,
            healthy_max,
            vulnerability_margin,
        };
        boundaries.validate()?;
        Ok(boundaries)
    }

    /// Check the band invariants.
    pub fn validate(&self) -> TimegraphResult<()> {
        if !(self.healthy_min.is_finite()
            && self.healthy_max.is_finite()
            && self.vulnerability_margin.is_finite())
        {
            return Err(TimegraphError::InvalidParameters(
                "zone boundaries must be finite numbers".to_string(),
            ));
        }
        if self.healthy_min > self.healthy_max {
            return Err(TimegraphError::InvalidParameters(format!(
                "healthy_min ({}) must not exceed healthy_max ({})",
                self.healthy_min, self.healthy_max
            )));
        }
        if self.vulnerability_margin < 0.0 {
            return Err(TimegraphError::InvalidParameters(format!(
                "vulnerability_margin ({}) must not be negative",
                self.vulnerability_margin
            )));
        }
        Ok(())
    }

    /// Width of the healthy band.
    pub fn healthy_width(&self) -> f64 {
        self.healthy_max - self.healthy_min
    }
}

/// Polynomial fit settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitSpec {
    pub polynomial_degree: usize,
}

/// A measurement with its classification and fitted value attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    /// Hours elapsed since the earliest point of the series.
    pub offset_hours: f64,
    pub zone: Zone,
    pub fitted_value: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Number of points per zone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneSummary {
    pub healthy: usize,
    pub vulnerable: usize,
    pub critical: usize,
}

impl ZoneSummary {
    pub fn from_points(points: &[EnrichedPoint]) -> Self {
        let mut summary = Self::default();

        for point in points {
            match point.zone {
                Zone::Healthy => summary.healthy += 1,
                Zone::Vulnerable => summary.vulnerable += 1,
                Zone::Critical => summary.critical += 1,
            }
        }

        summary
    }

    pub fn total(&self) -> usize {
        self.healthy + self.vulnerable + self.critical
    }
}

/// Description of the fitted curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitMetadata {
    pub degree: usize,
    /// Ascending powers of `offset_hours`: `c0 + c1*t + c2*t^2 + ...`.
    pub coefficients: Vec<f64>,
    /// The instant `offset_hours == 0` refers to.
    pub domain_start: DateTime<Utc>,
    pub r_squared: f64,
    pub trend: Trend,
    /// Zone of the fitted value at the last point.
    pub projected_zone: Zone,
    pub zone_summary: ZoneSummary,
}

/// Output of the trajectory engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryResult {
    pub data_points: Vec<EnrichedPoint>,
    pub fit_metadata: FitMetadata,
}

/// A measurement file that was dropped during loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub file: String,
    pub reason: String,
}

/// The durable report record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimegraphReport {
    pub report_id: Uuid,
    pub subject_id: String,
    pub module_id: String,
    pub marker_id: String,
    pub requested_at: DateTime<Utc>,
    pub timeframe: TimeWindow,
    pub zone_boundaries: ZoneBoundaries,
    pub fitting: FitSpec,
    /// Wall-clock time spent retrieving and fitting, in milliseconds.
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_records: Vec<SkippedRecord>,
    pub trajectory: TrajectoryResult,
}

impl TimegraphReport {
    pub fn scope(&self) -> ArchiveScope {
        ArchiveScope {
            subject_id: self.subject_id.clone(),
            module_id: self.module_id.clone(),
            marker_id: self.marker_id.clone(),
        }
    }
}
