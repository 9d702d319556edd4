//! Least-squares polynomial fitting.
//!
//! Solves the Vandermonde system with Householder QR rather than the
//! normal equations, which square the condition number.

use crate::error::{TimegraphError, TimegraphResult};

/// Relative pivot size below which the system is treated as rank deficient.
const RANK_TOLERANCE: f64 = 1e-10;

/// Residual sum of squares below this (relative to the data scale) counts as zero.
const PERFECT_FIT_TOLERANCE: f64 = 1e-12;

/// A fitted polynomial in ascending powers of `x`.
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    coefficients: Vec<f64>,
}

impl Polynomial {
    pub fn new(coefficients: Vec<f64>) -> Self {
        Self { coefficients }
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Horner evaluation.
    pub fn evaluate(&self, x: f64) -> f64 {
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, &c| acc * x + c)
    }
}

/// Number of distinct x values.
pub fn distinct_count(xs: &[f64]) -> usize {
    let mut sorted = xs.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted.dedup();
    sorted.len()
}

/// Fit a polynomial of `degree` to the points by least squares.
///
/// Fails with `FitUnderdetermined` when there are not more distinct x
/// values than the degree, before doing any work.
pub fn fit(xs: &[f64], ys: &[f64], degree: usize) -> TimegraphResult<Polynomial> {
    debug_assert_eq!(xs.len(), ys.len());

    let distinct_offsets = distinct_count(xs);
    if degree >= distinct_offsets {
        return Err(TimegraphError::FitUnderdetermined {
            degree,
            distinct_offsets,
        });
    }

    if degree == 0 {
        let mean = ys.iter().sum::<f64>() / ys.len() as f64;
        return Ok(Polynomial::new(vec![mean]));
    }

    let cols = degree + 1;
    let rows = xs.len();

    // Row-major Vandermonde matrix: a[i][j] = x_i^j
    let mut a: Vec<Vec<f64>> = xs
        .iter()
        .map(|&x| {
            let mut row = Vec::with_capacity(cols);
            let mut power = 1.0;
            for _ in 0..cols {
                row.push(power);
                power *= x;
            }
            row
        })
        .collect();
    let mut b = ys.to_vec();

    let mut r_diag = vec![0.0; cols];

    for k in 0..cols {
        let norm = (k..rows).map(|i| a[i][k] * a[i][k]).sum::<f64>().sqrt();
        let column_scale = (0..rows).map(|i| a[i][k].abs()).fold(0.0, f64::max);

        if norm <= RANK_TOLERANCE * column_scale.max(1.0) {
            return Err(TimegraphError::FitUnderdetermined {
                degree,
                distinct_offsets,
            });
        }

        let alpha = if a[k][k] > 0.0 { -norm } else { norm };

        // Householder vector v = x - alpha*e1, stored in place.
        a[k][k] -= alpha;
        let v_norm_sq = (k..rows).map(|i| a[i][k] * a[i][k]).sum::<f64>();

        if v_norm_sq > 0.0 {
            for j in (k + 1)..cols {
                let dot = (k..rows).map(|i| a[i][k] * a[i][j]).sum::<f64>();
                let factor = 2.0 * dot / v_norm_sq;
                for i in k..rows {
                    a[i][j] -= factor * a[i][k];
                }
            }

            let dot = (k..rows).map(|i| a[i][k] * b[i]).sum::<f64>();
            let factor = 2.0 * dot / v_norm_sq;
            for i in k..rows {
                b[i] -= factor * a[i][k];
            }
        }

        r_diag[k] = alpha;
    }

    // Back substitution on R (diagonal in r_diag, upper part in a).
    let mut coefficients = vec![0.0; cols];
    for k in (0..cols).rev() {
        let tail: f64 = ((k + 1)..cols).map(|j| a[k][j] * coefficients[j]).sum();
        coefficients[k] = (b[k] - tail) / r_diag[k];
    }

    if coefficients.iter().any(|c| !c.is_finite()) {
        return Err(TimegraphError::FitUnderdetermined {
            degree,
            distinct_offsets,
        });
    }

    Ok(Polynomial::new(coefficients))
}

/// Coefficient of determination of `fitted` against `actual`.
///
/// A constant series has no variance to explain: it scores 1.0 when the
/// fit reproduces it and 0.0 otherwise.
pub fn r_squared(actual: &[f64], fitted: &[f64]) -> f64 {
    let n = actual.len() as f64;
    if actual.is_empty() {
        return 0.0;
    }

    let mean = actual.iter().sum::<f64>() / n;
    let ss_tot: f64 = actual.iter().map(|y| (y - mean).powi(2)).sum();
    let ss_res: f64 = actual
        .iter()
        .zip(fitted)
        .map(|(y, f)| (y - f).powi(2))
        .sum();

    let scale = actual.iter().map(|y| y * y).sum::<f64>().max(1.0);

    if ss_tot <= PERFECT_FIT_TOLERANCE * scale {
        if ss_res <= PERFECT_FIT_TOLERANCE * scale {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - ss_res / ss_tot
    }
}
