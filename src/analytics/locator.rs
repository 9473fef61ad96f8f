//! Percentile → standard normal position.
//!
//! A "top X%" figure is turned into the cumulative probability `p = 1 - X/100`
//! and then into `z = Φ⁻¹(p)` using Acklam's rational approximation
//! (relative error ≈ 1.15e-9). The result places the subject's marker on a
//! bell curve; callers clamp `z` into the display range themselves or use
//! [`PercentilePlacement`].

use serde::{Deserialize, Serialize};

use crate::config::{DISPLAY_Z_MAX, DISPLAY_Z_MIN, PROBABILITY_EPSILON};

// Central region numerator / denominator.
const A: [f64; 6] = [
    -39.69683028665376,
    220.9460984245205,
    -275.9285104469687,
    138.357751867269,
    -30.66479806614716,
    2.506628277459239,
];
const B: [f64; 5] = [
    -54.47609879822406,
    161.5858368580409,
    -155.6989798598866,
    66.80131188771972,
    -13.28068155288572,
];

// Tail regions numerator / denominator.
const C: [f64; 6] = [
    -0.007784894002430293,
    -0.3223964580411365,
    -2.400758277161838,
    -2.549732539343734,
    4.374664141464968,
    2.938163982698783,
];
const D: [f64; 4] = [
    0.007784695709041462,
    0.3224671290700398,
    2.445134137142996,
    3.754408661907416,
];

const P_LOW: f64 = 0.02425;
const P_HIGH: f64 = 1.0 - P_LOW;

/// Clamp a probability into `[ε, 1 - ε]`. NaN maps to the median.
pub fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() {
        return 0.5;
    }
    p.clamp(PROBABILITY_EPSILON, 1.0 - PROBABILITY_EPSILON)
}

/// Inverse of the standard normal CDF.
///
/// Total: the input is clamped first, so the result is always finite.
pub fn inv_norm(p: f64) -> f64 {
    let p = clamp_probability(p);

    if p < P_LOW {
        return tail(p);
    }
    if p > P_HIGH {
        return -tail(1.0 - p);
    }

    let q = p - 0.5;
    let r = q * q;
    (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
        / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
}

/// Lower-tail rational approximation; `p < P_LOW`.
fn tail(p: f64) -> f64 {
    let q = (-2.0 * p.ln()).sqrt();
    (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
        / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
}

/// Complementary error function (Chebyshev fit, fractional error < 1.2e-7).
fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let ans = t
        * (-z * z - 1.26551223
            + t * (1.00002368
                + t * (0.37409196
                    + t * (0.09678418
                        + t * (-0.18628806
                            + t * (0.27886807
                                + t * (-1.13520398
                                    + t * (1.48851587 + t * (-0.82215223 + t * 0.17087277)))))))))
            .exp();
    if x >= 0.0 {
        ans
    } else {
        2.0 - ans
    }
}

/// Standard normal CDF Φ(z).
pub fn normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z / std::f64::consts::SQRT_2)
}

/// Standard normal density φ(z).
pub fn normal_pdf(z: f64) -> f64 {
    (-0.5 * z * z).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

/// `z` for a subject in the top `top_percentage`% (smaller is better).
pub fn top_percent_to_z(top_percentage: f64) -> f64 {
    inv_norm(1.0 - top_percentage / 100.0)
}

/// Where a subject's marker sits on the bell curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentilePlacement {
    pub top_percent: f64,
    pub z: f64,
    /// `z` clamped to the drawable range.
    pub display_z: f64,
}

impl PercentilePlacement {
    pub fn from_top_percent(top_percent: f64) -> Self {
        let z = top_percent_to_z(top_percent);
        Self {
            top_percent,
            z,
            display_z: z.clamp(DISPLAY_Z_MIN, DISPLAY_Z_MAX),
        }
    }

    /// Fraction of the way across the display range, 0.0 (left) to 1.0 (right).
    pub fn display_fraction(&self) -> f64 {
        (self.display_z - DISPLAY_Z_MIN) / (DISPLAY_Z_MAX - DISPLAY_Z_MIN)
    }
}

/// Evenly spaced `(x, φ(x))` samples across `[min_z, max_z]`.
pub fn bell_curve(points: usize, min_z: f64, max_z: f64) -> Vec<(f64, f64)> {
    match points {
        0 => Vec::new(),
        1 => vec![(min_z, normal_pdf(min_z))],
        n => {
            let step = (max_z - min_z) / (n - 1) as f64;
            (0..n)
                .map(|i| {
                    let x = min_z + step * i as f64;
                    (x, normal_pdf(x))
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cdf_of_inverse_returns_probability() {
        for p in [0.001, 0.01, 0.5, 0.99, 0.999] {
            let z = inv_norm(p);
            let back = normal_cdf(z);
            assert!((back - p).abs() < 1e-6, "p={p} z={z} cdf={back}");
        }
    }

    #[test]
    fn symmetric_about_median() {
        let mut p = 0.0005;
        while p < 1.0 {
            let lhs = inv_norm(p);
            let rhs = -inv_norm(1.0 - p);
            assert!((lhs - rhs).abs() < 1e-8, "p={p}: {lhs} vs {rhs}");
            p += 0.0125;
        }
        assert_eq!(inv_norm(0.5), 0.0);
    }

    #[test]
    fn strictly_increasing() {
        let mut prev = inv_norm(1e-6);
        for i in 1..=1000 {
            let p = i as f64 / 1001.0;
            let z = inv_norm(p);
            assert!(z > prev, "not increasing at p={p}");
            prev = z;
        }
        assert!(inv_norm(1.0 - 1e-6) > prev);
    }

    #[test]
    fn known_quantiles() {
        assert!((inv_norm(0.975) - 1.959964).abs() < 1e-5);
        assert!((inv_norm(0.01) + 2.326348).abs() < 1e-5);
        // lower and upper tails
        assert!((inv_norm(0.001) + 3.090232).abs() < 1e-5);
        assert!((inv_norm(0.9999) - 3.719016).abs() < 1e-5);
    }

    #[test]
    fn edges_are_clamped_and_finite() {
        let lo = inv_norm(0.0);
        let hi = inv_norm(1.0);
        assert!(lo.is_finite() && hi.is_finite());
        assert_eq!(lo, inv_norm(1e-6));
        assert_eq!(hi, inv_norm(1.0 - 1e-6));
        assert!((lo + 4.753424).abs() < 1e-4, "lo={lo}");
        assert!(inv_norm(-3.0).is_finite());
        assert_eq!(inv_norm(f64::NAN), 0.0);
    }

    #[test]
    fn top_one_percent_sits_near_two_point_three() {
        let z = top_percent_to_z(1.0);
        assert!((z - 2.326).abs() < 1e-3, "z={z}");
    }

    #[test]
    fn top_hundred_percent_is_clamped_not_infinite() {
        let placement = PercentilePlacement::from_top_percent(100.0);
        assert!(placement.z.is_finite());
        assert_eq!(placement.display_z, DISPLAY_Z_MIN);
        assert_eq!(placement.display_fraction(), 0.0);
    }

    #[test]
    fn median_placement_is_centered() {
        let placement = PercentilePlacement::from_top_percent(50.0);
        assert!(placement.z.abs() < 1e-12);
        assert!((placement.display_fraction() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn bell_curve_peaks_at_zero() {
        let pts = bell_curve(221, -4.0, 4.0);
        assert_eq!(pts.len(), 221);
        assert_eq!(pts[0].0, -4.0);
        assert!((pts[220].0 - 4.0).abs() < 1e-12);
        let (x_peak, y_peak) = pts
            .iter()
            .copied()
            .fold((0.0, f64::MIN), |acc, p| if p.1 > acc.1 { p } else { acc });
        assert!(x_peak.abs() < 1e-9);
        assert!((y_peak - normal_pdf(0.0)).abs() < 1e-12);
        assert!(bell_curve(0, -4.0, 4.0).is_empty());
    }
}
