//! Trajectory engine.
//!
//! Fits a polynomial trend to a measurement series, classifies every raw
//! value into a health zone, and summarizes the direction of the fitted
//! curve. Pure: no I/O, no shared state.

use super::polyfit;
use super::zones::classify;
use crate::error::{TimegraphError, TimegraphResult};
use crate::models::{
    EnrichedPoint, FitMetadata, FitSpec, Measurement, TrajectoryResult, Trend, ZoneBoundaries,
    ZoneSummary,
};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Seconds per offset unit.
const SECONDS_PER_HOUR: f64 = 3600.0;

/// Fields the engine adds to every point. Pass-through fields with the
/// same names are dropped so the output stays unambiguous.
const COMPUTED_FIELDS: [&str; 3] = ["offset_hours", "zone", "fitted_value"];

/// How the overall trend is classified.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendPolicy {
    /// Changes of the fitted curve no larger than this fraction of the
    /// healthy band width count as stable.
    pub stable_tolerance: f64,
}

impl Default for TrendPolicy {
    fn default() -> Self {
        Self {
            stable_tolerance: 0.01,
        }
    }
}

impl TrendPolicy {
    /// Classify the change of the fitted curve across the window.
    ///
    /// Monotone in `delta`: a larger rise never yields a lower class.
    pub fn classify(&self, delta: f64, boundaries: &ZoneBoundaries) -> Trend {
        let width = boundaries.healthy_width();
        let tolerance = if width > 0.0 {
            self.stable_tolerance * width
        } else {
            self.stable_tolerance
        };

        if delta.abs() <= tolerance {
            Trend::Stable
        } else if delta > 0.0 {
            Trend::Improving
        } else {
            Trend::Declining
        }
    }
}

/// Elapsed time in fractional hours, at full nanosecond resolution.
///
/// Spans too long for i64 nanoseconds (about 292 years) fall back to
/// microseconds, then milliseconds.
fn offset_hours(elapsed: TimeDelta) -> f64 {
    let seconds = match elapsed.num_nanoseconds() {
        Some(nanos) => nanos as f64 / 1e9,
        None => match elapsed.num_microseconds() {
            Some(micros) => micros as f64 / 1e6,
            None => elapsed.num_milliseconds() as f64 / 1e3,
        },
    };
    seconds / SECONDS_PER_HOUR
}

/// Run the engine over an ascending series.
///
/// The output keeps the input order.
pub fn compute_trajectory(
    measurements: Vec<Measurement>,
    boundaries: &ZoneBoundaries,
    fit_spec: &FitSpec,
    policy: &TrendPolicy,
) -> TimegraphResult<TrajectoryResult> {
    let Some(domain_start) = measurements.iter().map(|m| m.timestamp).min() else {
        return Err(TimegraphError::EmptySeries);
    };

    let offsets: Vec<f64> = measurements
        .iter()
        .map(|m| offset_hours(m.timestamp - domain_start))
        .collect();

    let degree = fit_spec.polynomial_degree;
    let values: Vec<f64> = measurements.iter().map(|m| m.value).collect();
    let polynomial = polyfit::fit(&offsets, &values, degree)?;

    let fitted: Vec<f64> = offsets.iter().map(|&x| polynomial.evaluate(x)).collect();
    let r_squared = polyfit::r_squared(&values, &fitted);

    let data_points: Vec<EnrichedPoint> = measurements
        .into_iter()
        .zip(offsets.iter().zip(&fitted))
        .map(|(measurement, (&offset_hours, &fitted_value))| {
            let mut extra = measurement.extra;
            for field in COMPUTED_FIELDS {
                if extra.remove(field).is_some() {
                    debug!("Dropping pass-through field '{}' shadowed by engine output", field);
                }
            }

            EnrichedPoint {
                timestamp: measurement.timestamp,
                value: measurement.value,
                offset_hours,
                zone: classify(measurement.value, boundaries),
                fitted_value,
                extra,
            }
        })
        .collect();

    let last_offset = offsets.iter().copied().fold(0.0, f64::max);
    let start_value = polynomial.evaluate(0.0);
    let end_value = polynomial.evaluate(last_offset);
    let trend = policy.classify(end_value - start_value, boundaries);

    debug!(
        "Fitted degree {} over {} points: r2={:.4}, trend={}",
        degree,
        data_points.len(),
        r_squared,
        trend
    );

    let fit_metadata = FitMetadata {
        degree: polynomial.degree(),
        coefficients: polynomial.coefficients().to_vec(),
        domain_start,
        r_squared,
        trend,
        projected_zone: classify(end_value, boundaries),
        zone_summary: ZoneSummary::from_points(&data_points),
    };

    Ok(TrajectoryResult {
        data_points,
        fit_metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Zone;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn measurement(timestamp: DateTime<Utc>, value: f64) -> Measurement {
        Measurement {
            timestamp,
            value,
            extra: serde_json::Map::new(),
        }
    }

    fn ts(hour: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap() + Duration::hours(hour)
    }

    fn series(values: &[f64]) -> Vec<Measurement> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| measurement(ts(i as i64), v))
            .collect()
    }

    fn boundaries() -> ZoneBoundaries {
        ZoneBoundaries::new(0.0, 20.0, 5.0).unwrap()
    }

    fn degree(d: usize) -> FitSpec {
        FitSpec {
            polynomial_degree: d,
        }
    }

    #[test]
    fn test_linear_scenario() {
        let result = compute_trajectory(
            series(&[10.0, 12.0, 14.0, 16.0, 18.0]),
            &boundaries(),
            &degree(1),
            &TrendPolicy::default(),
        )
        .unwrap();

        assert_eq!(result.data_points.len(), 5);
        assert!(result.data_points.iter().all(|p| p.zone == Zone::Healthy));
        for (point, expected) in result.data_points.iter().zip([10.0, 12.0, 14.0, 16.0, 18.0]) {
            assert!((point.fitted_value - expected).abs() < 1e-9);
        }
        let meta = &result.fit_metadata;
        assert_eq!(meta.degree, 1);
        assert!(meta.coefficients[1] > 0.0);
        assert!((meta.coefficients[1] - 2.0).abs() < 1e-9);
        assert!((meta.r_squared - 1.0).abs() < 1e-9);
        assert_eq!(meta.trend, Trend::Improving);
        assert_eq!(meta.domain_start, ts(0));
        assert_eq!(meta.zone_summary.healthy, 5);
        assert_eq!(meta.projected_zone, Zone::Healthy);
    }

    #[test]
    fn test_offsets_are_hours_from_earliest() {
        let measurements = vec![
            measurement(ts(0), 1.0),
            measurement(ts(0) + Duration::minutes(90), 2.0),
            measurement(ts(24), 3.0),
        ];
        let result =
            compute_trajectory(measurements, &boundaries(), &degree(0), &TrendPolicy::default())
                .unwrap();
        let offsets: Vec<f64> = result.data_points.iter().map(|p| p.offset_hours).collect();
        assert_eq!(offsets, vec![0.0, 1.5, 24.0]);
    }

    #[test]
    fn test_sub_millisecond_offsets_stay_distinct() {
        let measurements = vec![
            measurement(ts(0), 1.0),
            measurement(ts(0) + Duration::microseconds(500), 2.0),
        ];
        let result =
            compute_trajectory(measurements, &boundaries(), &degree(1), &TrendPolicy::default())
                .unwrap();

        let second = &result.data_points[1];
        assert!((second.offset_hours - 0.0005 / 3600.0).abs() < 1e-15);
        assert!((result.data_points[0].fitted_value - 1.0).abs() < 1e-6);
        assert!((second.fitted_value - 2.0).abs() < 1e-6);
        assert_eq!(result.fit_metadata.trend, Trend::Improving);
    }

    #[test]
    fn test_offset_hours_keeps_nanoseconds() {
        assert_eq!(offset_hours(Duration::hours(36)), 36.0);
        assert!((offset_hours(Duration::nanoseconds(1)) - 1e-9 / 3600.0).abs() < 1e-24);
        assert!(offset_hours(Duration::days(200 * 365 * 2)) > 0.0);
    }

    #[test]
    fn test_degree_zero_is_mean_everywhere() {
        let result = compute_trajectory(
            series(&[3.0, 9.0, 6.0, 2.0]),
            &boundaries(),
            &degree(0),
            &TrendPolicy::default(),
        )
        .unwrap();
        assert!(result
            .data_points
            .iter()
            .all(|p| (p.fitted_value - 5.0).abs() < 1e-12));
        assert_eq!(result.fit_metadata.trend, Trend::Stable);
    }

    #[test]
    fn test_empty_series() {
        let err = compute_trajectory(Vec::new(), &boundaries(), &degree(1), &TrendPolicy::default())
            .unwrap_err();
        assert!(matches!(err, TimegraphError::EmptySeries));
    }

    #[test]
    fn test_degree_at_distinct_offsets_is_rejected() {
        let err = compute_trajectory(
            series(&[1.0, 2.0, 3.0]),
            &boundaries(),
            &degree(3),
            &TrendPolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TimegraphError::FitUnderdetermined {
                degree: 3,
                distinct_offsets: 3
            }
        ));

        let same_instant = vec![measurement(ts(0), 1.0), measurement(ts(0), 2.0)];
        let err =
            compute_trajectory(same_instant, &boundaries(), &degree(1), &TrendPolicy::default())
                .unwrap_err();
        assert!(matches!(err, TimegraphError::FitUnderdetermined { .. }));
    }

    #[test]
    fn test_single_point_degree_zero() {
        let result = compute_trajectory(
            series(&[21.0]),
            &boundaries(),
            &degree(0),
            &TrendPolicy::default(),
        )
        .unwrap();
        assert_eq!(result.data_points[0].zone, Zone::Vulnerable);
        assert_eq!(result.data_points[0].fitted_value, 21.0);
        assert_eq!(result.fit_metadata.r_squared, 1.0);
    }

    #[test]
    fn test_declining_and_zone_mix() {
        let result = compute_trajectory(
            series(&[30.0, 22.0, 15.0, 5.0, -2.0, -8.0]),
            &boundaries(),
            &degree(1),
            &TrendPolicy::default(),
        )
        .unwrap();
        let zones: Vec<Zone> = result.data_points.iter().map(|p| p.zone).collect();
        assert_eq!(
            zones,
            vec![
                Zone::Critical,
                Zone::Vulnerable,
                Zone::Healthy,
                Zone::Healthy,
                Zone::Vulnerable,
                Zone::Critical
            ]
        );
        assert_eq!(result.fit_metadata.trend, Trend::Declining);
        assert_eq!(result.fit_metadata.zone_summary.vulnerable, 2);
        assert_eq!(result.fit_metadata.zone_summary.critical, 2);
    }

    #[test]
    fn test_extra_fields_pass_through() {
        let mut m = measurement(ts(0), 4.0);
        m.extra.insert("unit".into(), "mmol/L".into());
        m.extra.insert("zone".into(), "stale".into());
        let result =
            compute_trajectory(vec![m], &boundaries(), &degree(0), &TrendPolicy::default())
                .unwrap();
        let point = &result.data_points[0];
        assert_eq!(point.extra.get("unit"), Some(&serde_json::Value::from("mmol/L")));
        assert!(!point.extra.contains_key("zone"));

        let json = serde_json::to_value(point).unwrap();
        assert_eq!(json["zone"], "healthy");
        assert_eq!(json["unit"], "mmol/L");
    }

    #[test]
    fn test_trend_policy_is_monotone() {
        let policy = TrendPolicy::default();
        let b = boundaries();
        assert_eq!(policy.classify(0.19, &b), Trend::Stable);
        assert_eq!(policy.classify(-0.19, &b), Trend::Stable);
        assert_eq!(policy.classify(0.21, &b), Trend::Improving);
        assert_eq!(policy.classify(-0.21, &b), Trend::Declining);

        let narrow = ZoneBoundaries::new(5.0, 5.0, 1.0).unwrap();
        assert_eq!(policy.classify(0.005, &narrow), Trend::Stable);
        assert_eq!(policy.classify(0.02, &narrow), Trend::Improving);
    }

    #[test]
    fn test_is_deterministic() {
        let run = || {
            compute_trajectory(
                series(&[4.0, 7.0, 5.0, 9.0, 8.0, 12.0]),
                &boundaries(),
                &degree(2),
                &TrendPolicy::default(),
            )
            .unwrap()
        };
        assert_eq!(run(), run());
    }
}
