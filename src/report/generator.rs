//! Markdown and JSON report rendering.

use crate::models::{FitMetadata, SkippedRecord, TimegraphReport, Zone, ZoneBoundaries};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &TimegraphReport) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "# Trajectory Report: {} / {} / {}\n\n",
        report.subject_id, report.module_id, report.marker_id
    ));

    output.push_str(&generate_metadata_section(report));
    output.push_str(&generate_boundaries_section(&report.zone_boundaries));
    output.push_str(&generate_fit_section(&report.trajectory.fit_metadata));
    output.push_str(&generate_points_section(report));
    output.push_str(&generate_skipped_section(&report.skipped_records));
    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(report: &TimegraphReport) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Report ID:** `{}`\n", report.report_id));
    section.push_str(&format!(
        "- **Requested At:** {}\n",
        report.requested_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Timeframe:** {} → {}\n",
        report.timeframe.start.to_rfc3339(),
        report.timeframe.end.to_rfc3339()
    ));
    section.push_str(&format!(
        "- **Data Points:** {}\n",
        report.trajectory.data_points.len()
    ));
    if !report.skipped_records.is_empty() {
        section.push_str(&format!(
            "- **Skipped Files:** {}\n",
            report.skipped_records.len()
        ));
    }
    section.push_str(&format!("- **Duration:** {} ms\n", report.duration_ms));
    section.push('\n');

    section
}

fn generate_boundaries_section(boundaries: &ZoneBoundaries) -> String {
    let margin = boundaries.vulnerability_margin;
    let mut section = String::new();

    section.push_str("## Zone Boundaries\n\n");
    section.push_str("| Zone | Range |\n");
    section.push_str("|:---|:---|\n");
    section.push_str(&format!(
        "| {} Healthy | [{}, {}] |\n",
        Zone::Healthy.emoji(),
        boundaries.healthy_min,
        boundaries.healthy_max
    ));
    section.push_str(&format!(
        "| {} Vulnerable | [{}, {}) ∪ ({}, {}] |\n",
        Zone::Vulnerable.emoji(),
        boundaries.healthy_min - margin,
        boundaries.healthy_min,
        boundaries.healthy_max,
        boundaries.healthy_max + margin
    ));
    section.push_str(&format!(
        "| {} Critical | below {} or above {} |\n\n",
        Zone::Critical.emoji(),
        boundaries.healthy_min - margin,
        boundaries.healthy_max + margin
    ));

    section
}

fn generate_fit_section(fit: &FitMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Fitted Trend\n\n");
    section.push_str(&format!("- **Degree:** {}\n", fit.degree));
    section.push_str(&format!("- **Curve:** `{}`\n", format_polynomial(&fit.coefficients)));
    section.push_str(&format!(
        "- **Time Origin:** {} (t in hours)\n",
        fit.domain_start.to_rfc3339()
    ));
    section.push_str(&format!("- **R²:** {:.4}\n", fit.r_squared));
    section.push_str(&format!("- **Trend:** {}\n", fit.trend));
    section.push_str(&format!(
        "- **Projected Zone:** {} {}\n\n",
        fit.projected_zone.emoji(),
        fit.projected_zone
    ));

    section.push_str("### Zone Summary\n\n");
    section.push_str(&format!(
        "| {} Healthy | {} Vulnerable | {} Critical | **Total** |\n",
        Zone::Healthy.emoji(),
        Zone::Vulnerable.emoji(),
        Zone::Critical.emoji()
    ));
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | **{}** |\n\n",
        fit.zone_summary.healthy,
        fit.zone_summary.vulnerable,
        fit.zone_summary.critical,
        fit.zone_summary.total()
    ));

    section
}

fn generate_points_section(report: &TimegraphReport) -> String {
    let mut section = String::new();

    section.push_str("## Data Points\n\n");

    if report.trajectory.data_points.is_empty() {
        section.push_str("No data points.\n\n");
        return section;
    }

    section.push_str("| Timestamp | t (h) | Value | Fitted | Zone |\n");
    section.push_str("|:---|---:|---:|---:|:---|\n");

    for point in &report.trajectory.data_points {
        section.push_str(&format!(
            "| {} | {:.2} | {} | {:.3} | {} {} |\n",
            point.timestamp.to_rfc3339(),
            point.offset_hours,
            point.value,
            point.fitted_value,
            point.zone.emoji(),
            point.zone
        ));
    }
    section.push('\n');

    section
}

fn generate_skipped_section(skipped: &[SkippedRecord]) -> String {
    if skipped.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Skipped Files\n\n");
    for record in skipped {
        section.push_str(&format!("- `{}`: {}\n", record.file, record.reason));
    }
    section.push('\n');

    section
}

fn generate_footer() -> String {
    "---\n\n*Report generated by timegraph*\n".to_string()
}

/// Render coefficients as `c0 + c1·t + c2·t^2`.
fn format_polynomial(coefficients: &[f64]) -> String {
    coefficients
        .iter()
        .enumerate()
        .map(|(power, c)| match power {
            0 => format!("{:.6}", c),
            1 => format!("{:.6}·t", c),
            _ => format!("{:.6}·t^{}", c, power),
        })
        .collect::<Vec<_>>()
        .join(" + ")
}

/// Generate a JSON report.
pub fn generate_json_report(report: &TimegraphReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
