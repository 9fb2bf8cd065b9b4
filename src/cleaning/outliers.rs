//! Outlier detection and remediation over numeric columns.
//!
//! Per-column methods (`iqr`, `zscore`, `percentile`, and `mcd` on a single
//! column) produce bounds and a flag per cell. Row-level methods (`mcd` on two
//! or more columns, `isolation_forest`, `lof`) score complete rows. Either way
//! the flags are unioned into one row mask before the action runs, so a row
//! flagged by several columns is handled once.

use super::grubbs::{GrubbsRemoval, iterative_grubbs};
use super::multivariate::{self, MultivariateSummary};
use crate::error::{CleanError, Result};
use crate::frame::{self, IS_OUTLIER};
use crate::report::{Shape, StepReport, round2};
use crate::stats::{self, distribution};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Complete rows needed before any row-level detector runs.
pub const MIN_MULTIVARIATE_ROWS: usize = 10;
const MODIFIED_ZSCORE_CUTOFF: f64 = 3.5;
const INDEX_PREVIEW: usize = 10;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierMethod {
    #[default]
    Iqr,
    Zscore,
    Percentile,
    Mcd,
    IsolationForest,
    #[serde(alias = "local_outlier_factor")]
    Lof,
    None,
}

impl OutlierMethod {
    fn is_row_level(self, columns: usize) -> bool {
        match self {
            Self::IsolationForest | Self::Lof => true,
            Self::Mcd => columns >= 2,
            _ => false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierAction {
    Remove,
    #[default]
    Flag,
    Cap,
    Winsorize,
}

impl std::str::FromStr for OutlierMethod {
    type Err = CleanError;

    fn from_str(s: &str) -> Result<Self> {
        super::parse_option(s, "outlier method")
    }
}

impl std::str::FromStr for OutlierAction {
    type Err = CleanError;

    fn from_str(s: &str) -> Result<Self> {
        super::parse_option(s, "outlier action")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    pub method: OutlierMethod,
    pub action: OutlierAction,
    /// |z| cutoff for `zscore`
    pub threshold: f64,
    pub iqr_factor: f64,
    /// Chi-square quantile used as the Mahalanobis cutoff for `mcd`
    pub mcd_threshold: f64,
    /// Union in the iterative Grubbs test on each column
    pub hypothesis_test: bool,
    pub significance_level: f64,
    /// Run isolation forest, LOF and elliptic envelope as diagnostics
    pub multivariate_methods: bool,
    /// Expected outlier share for the score-based detectors
    pub contamination: f64,
    pub random_state: u64,
    /// Lower and upper tail shares clipped by `winsorize`
    pub winsorize_limits: (f64, f64),
    /// Numeric columns to inspect; all numeric columns when unset
    pub columns: Option<Vec<String>>,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            method: OutlierMethod::Iqr,
            action: OutlierAction::Flag,
            threshold: 3.0,
            iqr_factor: 1.5,
            mcd_threshold: 0.975,
            hypothesis_test: false,
            significance_level: 0.05,
            multivariate_methods: false,
            contamination: 0.1,
            random_state: 42,
            winsorize_limits: (0.05, 0.05),
            columns: None,
        }
    }
}

impl OutlierConfig {
    pub fn validate(&self) -> Result<()> {
        if self.threshold.is_nan() || self.threshold <= 0.0 {
            return Err(CleanError::config("outlier threshold must be positive"));
        }
        if self.iqr_factor.is_nan() || self.iqr_factor < 0.0 {
            return Err(CleanError::config("iqr_factor must not be negative"));
        }
        if !(self.mcd_threshold > 0.0 && self.mcd_threshold < 1.0) {
            return Err(CleanError::config("mcd_threshold must lie in (0, 1)"));
        }
        if !(self.significance_level > 0.0 && self.significance_level < 1.0) {
            return Err(CleanError::config("significance_level must lie in (0, 1)"));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(CleanError::config("contamination must lie in (0, 0.5]"));
        }
        let (lo, hi) = self.winsorize_limits;
        if !((0.0..0.5).contains(&lo) && (0.0..0.5).contains(&hi)) {
            return Err(CleanError::config("winsorize limits must each lie in [0, 0.5)"));
        }
        if matches!(&self.columns, Some(cols) if cols.is_empty()) {
            return Err(CleanError::config("outlier columns must name at least one column"));
        }
        Ok(())
    }

    fn columns(&self, df: &DataFrame) -> Result<Vec<String>> {
        let numeric = frame::numeric_columns(df);
        match &self.columns {
            Some(cols) => {
                let bad: Vec<&String> = cols.iter().filter(|c| !numeric.contains(c)).collect();
                if bad.is_empty() {
                    Ok(cols.clone())
                } else {
                    Err(CleanError::config(format!(
                        "outlier columns missing or not numeric: {bad:?}"
                    )))
                }
            }
            None => Ok(numeric),
        }
    }
}

/// Per-column result of a cell-level method.
#[derive(Debug, Clone, Default, Serialize)]
struct ColumnOutliers {
    count: usize,
    percentage: f64,
    lower_bound: Option<f64>,
    upper_bound: Option<f64>,
    indices: Vec<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    grubbs: Vec<GrubbsRemoval>,
}

/// Descriptive statistics of one column, with counts under three common rules.
#[derive(Debug, Clone, Serialize)]
struct DetectionStats {
    mean: f64,
    std: f64,
    median: f64,
    min: f64,
    max: f64,
    q1: f64,
    q3: f64,
    iqr: f64,
    missing: usize,
    total: usize,
    zscore_outliers: usize,
    iqr_outliers: usize,
    modified_zscore_outliers: usize,
}

impl DetectionStats {
    fn of(values: &[Option<f64>], config: &OutlierConfig) -> Option<Self> {
        let present = frame::present(values);
        let ca = Float64Chunked::from_slice("values".into(), &present);
        let mean = ca.mean()?;
        let std = ca.std(1)?;
        let median = ca.median()?;
        let q1 = ca.quantile(0.25, QuantileMethod::Linear).ok()??;
        let q3 = ca.quantile(0.75, QuantileMethod::Linear).ok()??;
        let iqr = q3 - q1;
        let (low, high) = (q1 - config.iqr_factor * iqr, q3 + config.iqr_factor * iqr);
        let mad = stats::median_abs_deviation(&present).unwrap_or(0.0);

        let zscore_outliers = if std > 0.0 {
            present.iter().filter(|v| ((*v - mean) / std).abs() > config.threshold).count()
        } else {
            0
        };
        let modified_zscore_outliers = if mad > 0.0 {
            present
                .iter()
                .filter(|v| (0.6745 * (*v - median) / mad).abs() > MODIFIED_ZSCORE_CUTOFF)
                .count()
        } else {
            0
        };

        Some(Self {
            mean,
            std,
            median,
            min: ca.min()?,
            max: ca.max()?,
            q1,
            q3,
            iqr,
            missing: values.iter().filter(|v| v.is_none()).count(),
            total: values.len(),
            zscore_outliers,
            iqr_outliers: present.iter().filter(|v| **v < low || **v > high).count(),
            modified_zscore_outliers,
        })
    }
}

fn iqr_bounds(present: &[f64], factor: f64) -> Option<(f64, f64)> {
    let q1 = stats::quantile(present, 0.25)?;
    let q3 = stats::quantile(present, 0.75)?;
    let iqr = q3 - q1;
    Some((q1 - factor * iqr, q3 + factor * iqr))
}

/// Bounds of a cell-level method for one column.
fn column_bounds(present: &[f64], config: &OutlierConfig) -> Option<(f64, f64)> {
    match config.method {
        OutlierMethod::Iqr => iqr_bounds(present, config.iqr_factor),
        OutlierMethod::Zscore => {
            let mean = stats::mean(present)?;
            let std = stats::std_dev(present)?;
            Some((mean - config.threshold * std, mean + config.threshold * std))
        }
        OutlierMethod::Percentile => {
            Some((stats::quantile(present, 0.01)?, stats::quantile(present, 0.99)?))
        }
        OutlierMethod::Mcd => {
            let data = Array2::from_shape_vec((present.len(), 1), present.to_vec()).ok()?;
            let fit = multivariate::fast_mcd(&data, config.random_state)?;
            let scale = fit.covariance.get((0, 0)).copied()?.sqrt();
            let location = fit.location.get(0).copied()?;
            let reach = distribution::chi_squared_quantile(config.mcd_threshold, 1.0)?.sqrt() * scale;
            Some((location - reach, location + reach))
        }
        OutlierMethod::IsolationForest | OutlierMethod::Lof | OutlierMethod::None => None,
    }
}

/// Complete rows of `columns` as a matrix, with their row numbers.
fn complete_rows(columns: &[Vec<Option<f64>>], height: usize) -> (Array2<f64>, Vec<usize>) {
    let rows: Vec<usize> = (0..height)
        .filter(|&r| columns.iter().all(|c| matches!(c.get(r), Some(Some(v)) if v.is_finite())))
        .collect();
    let data = Array2::from_shape_fn((rows.len(), columns.len()), |(i, j)| {
        columns[j][rows[i]].unwrap_or(f64::NAN)
    });
    (data, rows)
}

/// Flags from a row-level detector over the complete rows.
fn row_level_flags(data: &Array2<f64>, config: &OutlierConfig) -> Option<Vec<bool>> {
    match config.method {
        OutlierMethod::Mcd => {
            let fit = multivariate::fast_mcd(data, config.random_state)?;
            let cutoff = distribution::chi_squared_quantile(config.mcd_threshold, data.ncols() as f64)?;
            Some(fit.distances(data).into_iter().map(|d| d > cutoff).collect())
        }
        OutlierMethod::IsolationForest => {
            let n = data.nrows();
            let scores = multivariate::isolation_forest_scores(data, 100, 256.min(n), config.random_state);
            Some(multivariate::flag_top(&scores, config.contamination))
        }
        OutlierMethod::Lof => {
            let k = 20.min(data.nrows().saturating_sub(1));
            Some(multivariate::flag_top(
                &multivariate::local_outlier_factor(data, k),
                config.contamination,
            ))
        }
        _ => None,
    }
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        round2(count as f64 / total as f64 * 100.0)
    }
}

/// What detection found, before any action.
struct Detection {
    row_mask: Vec<bool>,
    /// Per-column cell flags and bounds, used by `cap`
    cells: BTreeMap<String, (Vec<bool>, (f64, f64))>,
    details: BTreeMap<String, ColumnOutliers>,
}

fn detect(
    df: &DataFrame,
    columns: &[String],
    values: &[Vec<Option<f64>>],
    config: &OutlierConfig,
    report: &mut StepReport,
) -> Detection {
    let height = df.height();
    let mut detection = Detection {
        row_mask: vec![false; height],
        cells: BTreeMap::new(),
        details: BTreeMap::new(),
    };

    if config.method.is_row_level(columns.len()) {
        let (data, rows) = complete_rows(values, height);
        if rows.len() < MIN_MULTIVARIATE_ROWS {
            tracing::warn!(rows = rows.len(), "too few complete rows for row-level detection");
            report.note(format!(
                "{} complete rows; row-level detection needs at least {MIN_MULTIVARIATE_ROWS}",
                rows.len()
            ));
        } else if let Some(flags) = row_level_flags(&data, config) {
            for (row, flagged) in rows.iter().zip(flags) {
                if flagged {
                    detection.row_mask[*row] = true;
                }
            }
            let flagged: Vec<usize> = (0..height).filter(|r| detection.row_mask[*r]).collect();
            report.set(
                "row_level_detection",
                serde_json::json!({
                    "rows_used": rows.len(),
                    "rows_flagged": flagged.len(),
                    "indices": flagged.iter().take(INDEX_PREVIEW).collect::<Vec<_>>(),
                }),
            );
            // Capping still needs per-column bounds; use Tukey fences on the flagged rows
            for (name, column) in columns.iter().zip(values) {
                if let Some(bounds) = iqr_bounds(&frame::present(column), config.iqr_factor) {
                    detection.cells.insert(name.clone(), (detection.row_mask.clone(), bounds));
                }
            }
        } else {
            report.note("robust covariance fit was singular; no rows flagged");
        }
    } else {
        for (name, column) in columns.iter().zip(values) {
            let present: Vec<(usize, f64)> = column
                .iter()
                .enumerate()
                .filter_map(|(r, v)| v.map(|v| (r, v)))
                .collect();
            // Infinities are judged against bounds fitted on the finite values
            let finite: Vec<(usize, f64)> =
                present.iter().copied().filter(|(_, v)| v.is_finite()).collect();
            let sample: Vec<f64> = finite.iter().map(|(_, v)| *v).collect();
            if sample.len() < 3 {
                tracing::debug!(column = %name, "fewer than 3 values, skipped");
                report.note(format!("column '{name}' has fewer than 3 values; skipped"));
                continue;
            }
            if stats::std_dev(&sample).is_none_or(|s| s <= 0.0) {
                tracing::debug!(column = %name, "zero variance, skipped");
                report.note(format!("column '{name}' has zero variance; skipped"));
                continue;
            }
            let Some((lower, upper)) = column_bounds(&sample, config) else {
                report.note(format!("column '{name}': robust fit failed; skipped"));
                continue;
            };

            let mut flags = vec![false; height];
            for (row, v) in &present {
                if *v < lower || *v > upper {
                    flags[*row] = true;
                }
            }
            let grubbs = if config.hypothesis_test {
                iterative_grubbs(&finite, config.significance_level)
            } else {
                Vec::new()
            };
            for removal in &grubbs {
                flags[removal.row] = true;
            }

            let indices: Vec<usize> = (0..height).filter(|r| flags[*r]).collect();
            for &row in &indices {
                detection.row_mask[row] = true;
            }
            tracing::debug!(column = %name, count = indices.len(), lower, upper, "column checked");
            detection.details.insert(
                name.clone(),
                ColumnOutliers {
                    count: indices.len(),
                    percentage: percentage(indices.len(), present.len()),
                    lower_bound: Some(lower),
                    upper_bound: Some(upper),
                    indices: indices.into_iter().take(INDEX_PREVIEW).collect(),
                    grubbs,
                },
            );
            detection.cells.insert(name.clone(), (flags, (lower, upper)));
        }
    }

    detection
}

fn multivariate_diagnostics(
    values: &[Vec<Option<f64>>],
    height: usize,
    config: &OutlierConfig,
    report: &mut StepReport,
) -> Result<()> {
    if values.len() < 2 {
        report.note("multivariate diagnostics need at least 2 numeric columns");
        return Ok(());
    }
    let (data, rows) = complete_rows(values, height);
    if rows.len() < MIN_MULTIVARIATE_ROWS {
        report.note(format!(
            "multivariate diagnostics need at least {MIN_MULTIVARIATE_ROWS} complete rows"
        ));
        return Ok(());
    }
    let summary: MultivariateSummary =
        multivariate::diagnostics(&data, config.contamination, config.random_state);
    tracing::debug!(?summary, "multivariate diagnostics");
    report.set_serialized("multivariate_diagnostics", &summary)
}

fn apply_cap(
    df: &mut DataFrame,
    values: &[Vec<Option<f64>>],
    columns: &[String],
    cells: &BTreeMap<String, (Vec<bool>, (f64, f64))>,
) -> Result<usize> {
    let mut capped = 0;
    for (name, column) in columns.iter().zip(values) {
        let Some((flags, (lower, upper))) = cells.get(name) else {
            continue;
        };
        let new: Vec<Option<f64>> = column
            .iter()
            .zip(flags)
            .map(|(v, flagged)| match v {
                Some(x) if *flagged => {
                    let clamped = x.clamp(*lower, *upper);
                    if clamped != *x {
                        capped += 1;
                    }
                    Some(clamped)
                }
                other => *other,
            })
            .collect();
        frame::put_column(df, frame::float_series(name, new))?;
    }
    Ok(capped)
}

fn apply_winsorize(
    df: &mut DataFrame,
    values: &[Vec<Option<f64>>],
    columns: &[String],
    limits: (f64, f64),
) -> Result<(usize, serde_json::Value)> {
    let mut clipped = 0;
    let mut bounds = serde_json::Map::new();
    for (name, column) in columns.iter().zip(values) {
        let present = frame::present(column);
        let (Some(lower), Some(upper)) = (
            stats::quantile(&present, limits.0),
            stats::quantile(&present, 1.0 - limits.1),
        ) else {
            continue;
        };
        let new: Vec<Option<f64>> = column
            .iter()
            .map(|v| {
                v.map(|x| {
                    let c = x.clamp(lower, upper);
                    if c != x {
                        clipped += 1;
                    }
                    c
                })
            })
            .collect();
        bounds.insert(name.clone(), serde_json::json!({ "lower": lower, "upper": upper }));
        frame::put_column(df, frame::float_series(name, new))?;
    }
    Ok((clipped, serde_json::Value::Object(bounds)))
}

/// Runs the outlier step.
///
/// `cap` and `winsorize` rewrite the inspected columns as `Float64`.
pub fn handle_outliers(df: DataFrame, config: &OutlierConfig) -> Result<(DataFrame, StepReport)> {
    config.validate()?;
    if config.method == OutlierMethod::None {
        return Ok((
            df,
            StepReport::skipped("outlier_handling", "Outlier handling skipped (method = 'none')"),
        ));
    }
    let columns = config.columns(&df)?;

    let mut report = StepReport::new("outlier_handling");
    report.set("method", super::option_name(&config.method));
    report.set("action", super::option_name(&config.action));
    report.set_serialized("columns_analyzed", &columns)?;

    let initial = Shape::of(&df);
    if columns.is_empty() || df.height() == 0 {
        tracing::warn!("outlier step found no numeric data");
        report.note("no numeric columns or no rows; nothing to inspect");
        report.set("n_outliers_detected", 0);
        return Ok((df, report));
    }

    let mut values = Vec::with_capacity(columns.len());
    for name in &columns {
        values.push(frame::numeric_values(frame::series(&df, name)?)?);
    }

    let mut statistics = BTreeMap::new();
    for (name, column) in columns.iter().zip(&values) {
        if let Some(s) = DetectionStats::of(column, config) {
            statistics.insert(name.clone(), s);
        }
    }
    report.set_serialized("detection_statistics", &statistics)?;

    let detection = detect(&df, &columns, &values, config, &mut report);
    if config.multivariate_methods {
        multivariate_diagnostics(&values, df.height(), config, &mut report)?;
    }

    let flagged = detection.row_mask.iter().filter(|f| **f).count();
    report.set("n_outliers_detected", flagged);
    report.set_serialized("outlier_details", &detection.details)?;
    report.set("outlier_proportion", percentage(flagged, initial.rows));

    let mut df = df;
    match config.action {
        OutlierAction::Remove => {
            if flagged > 0 {
                let keep: Vec<bool> = detection.row_mask.iter().map(|f| !f).collect();
                df = frame::filter_rows(&df, &keep)?;
            }
            report.set("rows_removed", initial.rows - df.height());
        }
        OutlierAction::Flag => {
            frame::put_column(&mut df, Series::new(IS_OUTLIER.into(), detection.row_mask))?;
            report.set("rows_flagged", flagged);
        }
        OutlierAction::Cap => {
            let capped = apply_cap(&mut df, &values, &columns, &detection.cells)?;
            report.set("values_capped", capped);
        }
        OutlierAction::Winsorize => {
            let (clipped, bounds) = apply_winsorize(&mut df, &values, &columns, config.winsorize_limits)?;
            report.set("values_winsorized", clipped);
            report.set("winsorize_bounds", bounds);
        }
    }
    report.set_serialized("final_shape", &Shape::of(&df))?;

    tracing::info!(
        method = %super::option_name(&config.method),
        flagged,
        rows = df.height(),
        "outliers handled"
    );
    Ok((df, report))
}
