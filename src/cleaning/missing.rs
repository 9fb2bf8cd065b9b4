//! Missing-value resolution.
//!
//! Columns that are entirely missing are dropped first, whatever the strategy
//! (except `none`, which leaves the dataset untouched). Then one of:
//!
//! - `drop`: named columns, or columns above `drop_columns_threshold` followed
//!   by rows above `drop_rows_threshold` measured on the remaining columns.
//! - `impute`: per-column fill. Numeric `auto` picks the median when
//!   `|skewness| > skew_threshold`, otherwise the mean.
//! - `advanced`: categorical columns by mode, numeric columns jointly by
//!   nearest neighbours or round-robin regression.

use super::imputers::{self, ImputeOutcome};
use crate::error::{CleanError, Result};
use crate::frame::{self, ColumnKind};
use crate::report::{StepReport, round2};
use crate::stats;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Fill used by the `unknown` categorical method.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingStrategy {
    Drop,
    #[default]
    Impute,
    Advanced,
    None,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericMethod {
    Mean,
    Median,
    #[default]
    Auto,
    Constant,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalMethod {
    #[default]
    Mode,
    Constant,
    Unknown,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvancedMethod {
    #[default]
    Knn,
    Iterative,
}

impl std::str::FromStr for MissingStrategy {
    type Err = CleanError;

    fn from_str(s: &str) -> Result<Self> {
        super::parse_option(s, "missing-value strategy")
    }
}

impl std::str::FromStr for NumericMethod {
    type Err = CleanError;

    fn from_str(s: &str) -> Result<Self> {
        super::parse_option(s, "numeric method")
    }
}

impl std::str::FromStr for CategoricalMethod {
    type Err = CleanError;

    fn from_str(s: &str) -> Result<Self> {
        super::parse_option(s, "categorical method")
    }
}

impl std::str::FromStr for AdvancedMethod {
    type Err = CleanError;

    fn from_str(s: &str) -> Result<Self> {
        super::parse_option(s, "advanced method")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissingConfig {
    pub strategy: MissingStrategy,
    pub numeric_method: NumericMethod,
    pub categorical_method: CategoricalMethod,

    /// Fill for `categorical_method = constant`
    pub constant_value: Option<String>,

    /// Fill for `numeric_method = constant`
    pub numeric_constant: Option<f64>,

    pub skew_threshold: f64,

    /// Drop columns whose missing fraction exceeds this
    pub drop_columns_threshold: f64,

    /// Drop rows whose missing fraction exceeds this
    pub drop_rows_threshold: f64,

    /// With `drop`, remove exactly these columns instead of thresholding
    pub drop_specific_columns: Vec<String>,

    pub advanced_method: AdvancedMethod,
    pub knn_neighbors: usize,
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for MissingConfig {
    fn default() -> Self {
        Self {
            strategy: MissingStrategy::Impute,
            numeric_method: NumericMethod::Auto,
            categorical_method: CategoricalMethod::Mode,
            constant_value: None,
            numeric_constant: None,
            skew_threshold: 1.0,
            drop_columns_threshold: 0.05,
            drop_rows_threshold: 0.05,
            drop_specific_columns: Vec::new(),
            advanced_method: AdvancedMethod::Knn,
            knn_neighbors: 5,
            max_iter: 10,
            tol: 1e-3,
        }
    }
}

impl MissingConfig {
    /// Checks option combinations that cannot be applied.
    pub fn validate(&self) -> Result<()> {
        if self.strategy == MissingStrategy::None {
            return Ok(());
        }
        // Constant fills are only read by per-column imputation
        if self.strategy == MissingStrategy::Impute {
            if self.categorical_method == CategoricalMethod::Constant && self.constant_value.is_none() {
                return Err(CleanError::config(
                    "constant_value is required when categorical_method is 'constant'",
                ));
            }
            if self.numeric_method == NumericMethod::Constant && self.numeric_constant.is_none() {
                return Err(CleanError::config(
                    "numeric_constant is required when numeric_method is 'constant'",
                ));
            }
        }
        for (name, value) in [
            ("drop_columns_threshold", self.drop_columns_threshold),
            ("drop_rows_threshold", self.drop_rows_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(CleanError::config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if !self.skew_threshold.is_finite() || self.skew_threshold < 0.0 {
            return Err(CleanError::config("skew_threshold must be a non-negative number"));
        }
        if self.knn_neighbors == 0 {
            return Err(CleanError::config("knn_neighbors must be at least 1"));
        }
        if self.max_iter == 0 {
            return Err(CleanError::config("max_iter must be at least 1"));
        }
        Ok(())
    }
}

/// How one column was filled.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnImputation {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skewness: Option<f64>,
    pub cells_affected: usize,
}

fn per_column_missing(df: &DataFrame) -> Result<BTreeMap<String, (usize, f64)>> {
    let rows = df.height();
    let mut out = BTreeMap::new();
    for col in df.get_columns() {
        let count = frame::missing_count(col.as_materialized_series())?;
        let pct = if rows == 0 { 0.0 } else { count as f64 / rows as f64 * 100.0 };
        out.insert(col.name().to_string(), (count, round2(pct)));
    }
    Ok(out)
}

fn record_missing(report: &mut StepReport, prefix: &str, df: &DataFrame) -> Result<f64> {
    let per_column = per_column_missing(df)?;
    let counts: BTreeMap<&str, usize> = per_column.iter().map(|(k, v)| (k.as_str(), v.0)).collect();
    let pcts: BTreeMap<&str, f64> = per_column.iter().map(|(k, v)| (k.as_str(), v.1)).collect();
    report.set_serialized(&format!("{prefix}_missing_count"), &counts)?;
    report.set_serialized(&format!("{prefix}_missing_percentage"), &pcts)?;
    let total = frame::missing_percentage(df)?;
    report.set(&format!("{prefix}_total_missing_percentage"), round2(total));
    Ok(total)
}

fn fully_missing_columns(df: &DataFrame) -> Result<Vec<String>> {
    if df.height() == 0 {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for col in df.get_columns() {
        if frame::missing_count(col.as_materialized_series())? == df.height() {
            names.push(col.name().to_string());
        }
    }
    Ok(names)
}

fn drop_by_threshold(df: DataFrame, config: &MissingConfig, report: &mut StepReport) -> Result<DataFrame> {
    let rows = df.height();
    let mut dropped_columns = Vec::new();
    for col in df.get_columns() {
        let missing = frame::missing_count(col.as_materialized_series())?;
        if rows > 0 && missing as f64 / rows as f64 > config.drop_columns_threshold {
            dropped_columns.push(col.name().to_string());
        }
    }
    let df = frame::drop_columns(df, &dropped_columns)?;

    // Row fractions are measured against the reduced column set
    let width = df.width();
    let mut missing_per_row = vec![0usize; df.height()];
    for col in df.get_columns() {
        for (count, missing) in missing_per_row
            .iter_mut()
            .zip(frame::missing_mask(col.as_materialized_series())?)
        {
            *count += usize::from(missing);
        }
    }
    let keep: Vec<bool> = missing_per_row
        .iter()
        .map(|m| width == 0 || (*m as f64 / width as f64) <= config.drop_rows_threshold)
        .collect();
    let dropped_rows = keep.iter().filter(|k| !**k).count();
    let df = if dropped_rows > 0 { frame::filter_rows(&df, &keep)? } else { df };

    tracing::debug!(columns = dropped_columns.len(), rows = dropped_rows, "threshold drop applied");
    report.set_serialized("dropped_columns", &dropped_columns)?;
    report.set("dropped_rows_count", dropped_rows);
    Ok(df)
}

fn numeric_fill(
    present: &[f64],
    config: &MissingConfig,
) -> (Option<f64>, &'static str, Option<f64>) {
    match config.numeric_method {
        NumericMethod::Mean => (stats::mean(present), "mean", None),
        NumericMethod::Median => (stats::median(present), "median", None),
        NumericMethod::Constant => (config.numeric_constant, "constant", None),
        NumericMethod::Auto => {
            let skew = stats::skewness(present);
            match skew {
                Some(s) if s.abs() > config.skew_threshold => {
                    (stats::median(present), "median (skewness detected)", skew)
                }
                _ => (stats::mean(present), "mean (approximately normal)", skew),
            }
        }
    }
}

fn impute_numeric(
    df: &mut DataFrame,
    name: &str,
    config: &MissingConfig,
) -> Result<Option<ColumnImputation>> {
    let values = frame::numeric_values(frame::series(df, name)?)?;
    let missing = values.iter().filter(|v| v.is_none()).count();
    if missing == 0 {
        return Ok(None);
    }
    let present = frame::present(&values);
    let (fill, method, skewness) = numeric_fill(&present, config);
    let Some(fill) = fill else {
        return Ok(None);
    };

    let filled: Vec<Option<f64>> = values.into_iter().map(|v| Some(v.unwrap_or(fill))).collect();
    frame::put_column(df, frame::float_series(name, filled))?;
    tracing::debug!(column = name, method, fill, missing, "numeric column imputed");
    Ok(Some(ColumnImputation {
        method: method.to_owned(),
        fill_value: Some(fill),
        category: None,
        skewness,
        cells_affected: missing,
    }))
}

/// Most frequent non-null rendering; ties go to the value seen first.
/// Returns the value and the row where it first occurs.
fn mode_of(values: &[Option<String>]) -> Option<(String, usize)> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (row, value) in values.iter().enumerate() {
        if let Some(v) = value {
            counts.entry(v.as_str()).or_insert((0, row)).0 += 1;
        }
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.0.cmp(&b.1.0).then(b.1.1.cmp(&a.1.1)))
        .map(|(v, (_, first_row))| (v.to_owned(), first_row))
}

fn impute_categorical(
    df: &mut DataFrame,
    name: &str,
    method: CategoricalMethod,
    constant: Option<&str>,
    report: &mut StepReport,
) -> Result<Option<ColumnImputation>> {
    let series = frame::series(df, name)?.clone();
    let mask = frame::missing_mask(&series)?;
    let missing = mask.iter().filter(|m| **m).count();
    if missing == 0 {
        return Ok(None);
    }

    let fill_text = match method {
        CategoricalMethod::Constant => constant.map(str::to_owned),
        CategoricalMethod::Unknown => Some(UNKNOWN_CATEGORY.to_owned()),
        CategoricalMethod::Mode => None,
    };

    if let Some(text) = fill_text {
        if ColumnKind::of(series.dtype()) == ColumnKind::Text {
            let values = frame::string_values(&series)?;
            let filled: Vec<Option<String>> = values
                .into_iter()
                .map(|v| Some(v.unwrap_or_else(|| text.clone())))
                .collect();
            frame::put_column(df, frame::text_series(name, filled, series.dtype())?)?;
            return Ok(Some(ColumnImputation {
                method: super::option_name(&method),
                fill_value: None,
                category: Some(text),
                skewness: None,
                cells_affected: missing,
            }));
        }
        tracing::debug!(column = name, "constant fill needs a text column; using mode");
        report.note(format!(
            "column '{name}' has type {}; '{}' fill needs text, filled by mode instead",
            series.dtype(),
            super::option_name(&method)
        ));
    }

    let rendered = frame::string_values(&series)?;
    let Some((category, source_row)) = mode_of(&rendered) else {
        return Ok(None);
    };
    let indices: Vec<IdxSize> = mask
        .iter()
        .enumerate()
        .map(|(row, m)| (if *m { source_row } else { row }) as IdxSize)
        .collect();
    let filled = series.take(&IdxCa::from_vec(name.into(), indices))?;
    frame::put_column(df, filled)?;
    Ok(Some(ColumnImputation {
        method: "mode".to_owned(),
        fill_value: None,
        category: Some(category),
        skewness: None,
        cells_affected: missing,
    }))
}

fn categorical_columns(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|c| {
            ColumnKind::of(c.dtype()) != ColumnKind::Numeric && !frame::is_helper_column(c.name())
        })
        .map(|c| c.name().to_string())
        .collect()
}

fn impute_advanced_numeric(
    df: &mut DataFrame,
    config: &MissingConfig,
    per_column: &mut BTreeMap<String, ColumnImputation>,
    report: &mut StepReport,
) -> Result<()> {
    let names = frame::numeric_columns(df);
    let mut block = Vec::with_capacity(names.len());
    for name in &names {
        block.push(frame::numeric_values(frame::series(df, name)?)?);
    }
    let missing: Vec<usize> = block
        .iter()
        .map(|c| c.iter().filter(|v| v.is_none()).count())
        .collect();
    if missing.iter().all(|m| *m == 0) {
        return Ok(());
    }

    let (method, ImputeOutcome { columns, iterations, converged, notes }) = match config.advanced_method {
        AdvancedMethod::Knn => ("knn", imputers::knn_impute(&block, config.knn_neighbors)),
        AdvancedMethod::Iterative => (
            "iterative",
            imputers::iterative_impute(&block, config.max_iter, config.tol),
        ),
    };
    for note in notes {
        report.note(note);
    }
    report.set("advanced_iterations", iterations);
    report.set("advanced_converged", converged);

    for ((name, values), count) in names.iter().zip(columns).zip(missing) {
        if count == 0 {
            continue;
        }
        let filled: Vec<Option<f64>> = values.into_iter().map(Some).collect();
        frame::put_column(df, frame::float_series(name, filled))?;
        per_column.insert(
            name.clone(),
            ColumnImputation {
                method: method.to_owned(),
                fill_value: None,
                category: None,
                skewness: None,
                cells_affected: count,
            },
        );
    }
    Ok(())
}

/// Runs the missing-value step.
///
/// # Errors
///
/// Configuration errors (missing constant, unknown drop column, thresholds out of
/// range) are raised before the dataset is modified.
pub fn handle_missing(df: DataFrame, config: &MissingConfig) -> Result<(DataFrame, StepReport)> {
    config.validate()?;
    if config.strategy == MissingStrategy::None {
        return Ok((
            df,
            StepReport::skipped(
                "missing_value_handling",
                "Missing value handling skipped (strategy = 'none')",
            ),
        ));
    }
    if config.strategy == MissingStrategy::Drop {
        let unknown: Vec<&String> = config
            .drop_specific_columns
            .iter()
            .filter(|c| df.column(c).is_err())
            .collect();
        if !unknown.is_empty() {
            return Err(CleanError::config(format!(
                "drop_specific_columns not in dataset: {unknown:?}"
            )));
        }
    }

    let mut report = StepReport::new("missing_value_handling");
    report.set("strategy", super::option_name(&config.strategy));
    let initial = record_missing(&mut report, "initial", &df)?;

    if df.height() == 0 || df.width() == 0 {
        tracing::warn!("missing-value step received an empty dataset");
        report.note("dataset is empty; nothing to resolve");
        report.set_serialized("dropped_100_missing_columns", &Vec::<String>::new())?;
        record_missing(&mut report, "final", &df)?;
        report.set("improvement", 0.0);
        return Ok((df, report));
    }

    let fully_missing = fully_missing_columns(&df)?;
    if !fully_missing.is_empty() {
        tracing::info!(columns = ?fully_missing, "dropping columns with no values");
    }
    let mut df = frame::drop_columns(df, &fully_missing)?;
    report.set_serialized("dropped_100_missing_columns", &fully_missing)?;

    let mut per_column: BTreeMap<String, ColumnImputation> = BTreeMap::new();
    match config.strategy {
        MissingStrategy::Drop => {
            if config.drop_specific_columns.is_empty() {
                df = drop_by_threshold(df, config, &mut report)?;
            } else {
                let present: Vec<String> = config
                    .drop_specific_columns
                    .iter()
                    .filter(|c| df.column(c).is_ok())
                    .cloned()
                    .collect();
                df = frame::drop_columns(df, &present)?;
                report.set_serialized("dropped_columns", &config.drop_specific_columns)?;
            }
        }
        MissingStrategy::Impute => {
            for name in frame::numeric_columns(&df) {
                if let Some(entry) = impute_numeric(&mut df, &name, config)? {
                    per_column.insert(name, entry);
                }
            }
            for name in categorical_columns(&df) {
                let constant = config.constant_value.as_deref();
                if let Some(entry) =
                    impute_categorical(&mut df, &name, config.categorical_method, constant, &mut report)?
                {
                    per_column.insert(name, entry);
                }
            }
        }
        MissingStrategy::Advanced => {
            for name in categorical_columns(&df) {
                if let Some(entry) =
                    impute_categorical(&mut df, &name, CategoricalMethod::Mode, None, &mut report)?
                {
                    per_column.insert(name, entry);
                }
            }
            impute_advanced_numeric(&mut df, config, &mut per_column, &mut report)?;
        }
        MissingStrategy::None => {}
    }

    report.set_serialized("columns", &per_column)?;
    let final_pct = record_missing(&mut report, "final", &df)?;
    report.set("improvement", round2(initial - final_pct));
    tracing::info!(
        strategy = %super::option_name(&config.strategy),
        before = round2(initial),
        after = round2(final_pct),
        "missing values handled"
    );
    Ok((df, report))
}
