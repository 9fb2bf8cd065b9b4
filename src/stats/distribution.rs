//! Student-t and chi-square quantiles for the outlier tests, via `statrs`.

use statrs::distribution::{ChiSquared, ContinuousCDF as _, StudentsT};

/// Inverse CDF of the chi-square distribution with `k` degrees of freedom.
///
/// `None` for a non-positive `k`; `p` is clamped to `[0, 1]`.
pub fn chi_squared_quantile(p: f64, k: f64) -> Option<f64> {
    let dist = ChiSquared::new(k).ok()?;
    Some(dist.inverse_cdf(p.clamp(0.0, 1.0)))
}

/// Inverse CDF of Student's t with `df` degrees of freedom.
pub fn student_t_quantile(p: f64, df: f64) -> Option<f64> {
    let dist = StudentsT::new(0.0, 1.0, df).ok()?;
    Some(dist.inverse_cdf(p.clamp(0.0, 1.0)))
}

/// Two-sided Grubbs critical value for a sample of size `n` at level `alpha`.
///
/// `G = (n-1)/√n · √(t² / (n-2+t²))` with `t` the upper `alpha/(2n)` point of
/// Student's t on `n-2` degrees of freedom.
pub fn grubbs_critical_value(n: usize, alpha: f64) -> Option<f64> {
    if n < 3 {
        return None;
    }
    let nf = n as f64;
    let t = student_t_quantile(1.0 - alpha / (2.0 * nf), nf - 2.0)?;
    let t2 = t * t;
    Some((nf - 1.0) / nf.sqrt() * (t2 / (nf - 2.0 + t2)).sqrt())
}
