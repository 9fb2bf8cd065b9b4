//! Descriptive statistics over plain `f64` slices.
//!
//! Everything runs on Polars chunked arrays, so the conventions match column
//! statistics elsewhere: quantiles interpolate linearly, the standard deviation
//! is the sample one (`ddof = 1`), and skewness is the bias-corrected
//! Fisher-Pearson coefficient.

pub mod distribution;
pub mod matrix;

use polars::prelude::*;

fn chunked(values: &[f64]) -> Float64Chunked {
    Float64Chunked::from_slice(PlSmallStr::from_static("values"), values)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    chunked(values).mean()
}

/// Sample standard deviation; `None` below two values.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    chunked(values).std(1).filter(|s| s.is_finite())
}

/// Linearly interpolated quantile, `q` clamped to `[0, 1]`.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    chunked(values)
        .quantile(q.clamp(0.0, 1.0), QuantileMethod::Linear)
        .ok()
        .flatten()
}

pub fn median(values: &[f64]) -> Option<f64> {
    chunked(values).median()
}

/// Bias-corrected sample skewness.
///
/// Needs at least three values. A sample whose variance vanishes relative to
/// its mean has zero skew, whatever its scale.
pub fn skewness(values: &[f64]) -> Option<f64> {
    if values.len() < 3 {
        return None;
    }
    let skew = chunked(values).into_series().skew(false).ok().flatten()?;
    Some(if skew.is_nan() { 0.0 } else { skew })
}

/// Bias-corrected excess kurtosis; `None` below four values or when the
/// variance vanishes.
pub fn kurtosis(values: &[f64]) -> Option<f64> {
    if values.len() < 4 {
        return None;
    }
    chunked(values)
        .into_series()
        .kurtosis(true, false)
        .ok()
        .flatten()
        .filter(|k| k.is_finite())
}

/// Median absolute deviation (unscaled).
pub fn median_abs_deviation(values: &[f64]) -> Option<f64> {
    let med = median(values)?;
    let deviations: Vec<f64> = values.iter().map(|x| (x - med).abs()).collect();
    median(&deviations)
}
