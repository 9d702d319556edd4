//! Zone classification against boundary settings.

use crate::models::{Zone, ZoneBoundaries};

/// Classify a value into its health zone.
///
/// The healthy band is closed, so `healthy_min` and `healthy_max` are
/// Healthy. The vulnerable band is closed on its outer edge, so
/// `healthy_max + margin` is still Vulnerable.
pub fn classify(value: f64, boundaries: &ZoneBoundaries) -> Zone {
    let lower = boundaries.healthy_min;
    let upper = boundaries.healthy_max;
    let margin = boundaries.vulnerability_margin;

    if (lower..=upper).contains(&value) {
        Zone::Healthy
    } else if (lower - margin..=upper + margin).contains(&value) {
        Zone::Vulnerable
    } else {
        Zone::Critical
    }
}
