//! The `inconsistent` step: column names plus cell-level formatting.
//!
//! Order: names, whitespace trimming, Unicode NFKD normalization, empty
//! strings to null, string case, datetime parsing, numeric coercion, and last
//! the conversion of low-cardinality text columns to the categorical dtype.

use super::schema::{NameConfig, NameMapping, mapping_report, rename_columns};
use crate::error::{CleanError, Result};
use crate::frame::{self, ColumnKind};
use crate::report::{Shape, StepReport};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization as _;

/// Cells that count as numbers during coercion.
const NUMERIC_PATTERN: &str = r"^[+-]?\d+(\.\d+)?$";

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
];

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y", "%d-%b-%Y"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormattingStrategy {
    #[default]
    Standard,
    None,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringCase {
    #[default]
    Lower,
    Upper,
    None,
}

impl std::str::FromStr for FormattingStrategy {
    type Err = CleanError;

    fn from_str(s: &str) -> Result<Self> {
        super::parse_option(s, "formatting strategy")
    }
}

impl std::str::FromStr for StringCase {
    type Err = CleanError;

    fn from_str(s: &str) -> Result<Self> {
        super::parse_option(s, "string case")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormattingConfig {
    pub strategy: FormattingStrategy,

    /// Rename columns with the settings in `names`
    pub clean_names: bool,

    #[serde(flatten)]
    pub names: NameConfig,

    pub string_case: StringCase,
    pub trim_whitespace: bool,

    /// Apply compatibility decomposition (NFKD) to text cells
    pub normalize_unicode: bool,

    pub replace_empty_with_null: bool,

    /// Convert text columns whose cells look numeric
    pub numeric_cleaning: bool,

    /// Share of numeric-looking non-null cells needed before a column is converted
    pub min_numeric_ratio: f64,

    /// Columns to parse as datetimes (original or cleaned names)
    pub datetime_columns: Vec<String>,

    /// Cast text columns with few distinct values to the categorical dtype
    pub convert_categorical: bool,
}

impl Default for FormattingConfig {
    fn default() -> Self {
        Self {
            strategy: FormattingStrategy::Standard,
            clean_names: true,
            names: NameConfig::default(),
            string_case: StringCase::Lower,
            trim_whitespace: true,
            normalize_unicode: true,
            replace_empty_with_null: true,
            numeric_cleaning: true,
            min_numeric_ratio: 0.5,
            datetime_columns: Vec::new(),
            convert_categorical: true,
        }
    }
}

impl FormattingConfig {
    pub fn validate(&self) -> Result<()> {
        self.names.validate()?;
        if !(0.0..=1.0).contains(&self.min_numeric_ratio) {
            return Err(CleanError::config(format!(
                "min_numeric_ratio must be within [0, 1], got {}",
                self.min_numeric_ratio
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct NumericConversion {
    column: String,
    converted_cells: usize,
    newly_missing: usize,
}

#[derive(Debug, Serialize)]
struct DatetimeFailure {
    column: String,
    error: String,
}

#[derive(Debug, Default, Serialize)]
struct DatetimeReport {
    successful: Vec<String>,
    failed: Vec<DatetimeFailure>,
    unparsed_cells: usize,
}

fn text_columns(df: &DataFrame) -> Vec<String> {
    frame::columns_of_kind(df, ColumnKind::Text)
}

/// Applies `f` to every non-null cell of the text columns; returns the
/// affected columns and the number of cells changed.
fn map_text_cells(
    df: &mut DataFrame,
    f: impl Fn(&str) -> Option<String>,
) -> Result<(Vec<String>, usize)> {
    let mut touched = Vec::new();
    let mut total = 0;
    for name in text_columns(df) {
        let series = frame::series(df, &name)?;
        let dtype = series.dtype().clone();
        let values = frame::string_values(series)?;
        let mut changed = 0;
        let mapped: Vec<Option<String>> = values
            .into_iter()
            .map(|cell| {
                let cell = cell?;
                let next = f(&cell);
                if next.as_deref() != Some(cell.as_str()) {
                    changed += 1;
                }
                next
            })
            .collect();
        if changed > 0 {
            frame::put_column(df, frame::text_series(&name, mapped, &dtype)?)?;
            touched.push(name);
            total += changed;
        }
    }
    Ok((touched, total))
}

fn parse_datetime(cell: &str) -> Option<NaiveDateTime> {
    let cell = cell.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(cell) {
        return Some(dt.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(cell, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(cell, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn convert_datetimes(
    df: &mut DataFrame,
    requested: &[String],
    mapping: Option<&NameMapping>,
) -> Result<DatetimeReport> {
    let mut report = DatetimeReport::default();
    for requested_name in requested {
        let name = if df.column(requested_name).is_ok() {
            requested_name.clone()
        } else if let Some(cleaned) = mapping.and_then(|m| m.cleaned_name(requested_name)) {
            cleaned.to_owned()
        } else {
            report.failed.push(DatetimeFailure {
                column: requested_name.clone(),
                error: "column not found".to_owned(),
            });
            continue;
        };

        match frame::kind_of(df, &name)? {
            ColumnKind::Temporal => {
                tracing::debug!(column = %name, "already a datetime column");
                continue;
            }
            ColumnKind::Text => {}
            other => {
                report.failed.push(DatetimeFailure {
                    column: name,
                    error: format!("cannot parse datetimes from a {} column", other.as_str()),
                });
                continue;
            }
        }

        let values = frame::string_values(frame::series(df, &name)?)?;
        let mut unparsed = 0;
        let millis: Vec<Option<i64>> = values
            .iter()
            .map(|cell| {
                let cell = cell.as_deref()?;
                let parsed = parse_datetime(cell).map(|dt| dt.and_utc().timestamp_millis());
                if parsed.is_none() {
                    unparsed += 1;
                }
                parsed
            })
            .collect();
        let series = Series::new(name.as_str().into(), millis)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
        frame::put_column(df, series)?;
        report.unparsed_cells += unparsed;
        report.successful.push(name);
    }
    Ok(report)
}

fn coerce_numeric(
    df: &mut DataFrame,
    min_ratio: f64,
    skip: &HashSet<String>,
) -> Result<Vec<NumericConversion>> {
    let pattern = Regex::new(NUMERIC_PATTERN).map_err(|e| CleanError::Other(e.to_string()))?;
    let mut conversions = Vec::new();

    for name in text_columns(df) {
        if skip.contains(&name) {
            continue;
        }
        let values = frame::string_values(frame::series(df, &name)?)?;
        let present = values.iter().flatten().count();
        if present == 0 {
            continue;
        }
        let parsed: Vec<Option<f64>> = values
            .iter()
            .map(|cell| {
                cell.as_deref()
                    .map(str::trim)
                    .filter(|c| pattern.is_match(c))
                    .and_then(|c| c.parse::<f64>().ok())
            })
            .collect();
        let converted = parsed.iter().flatten().count();
        if converted == 0 || (converted as f64) < min_ratio * present as f64 {
            continue;
        }

        frame::put_column(df, frame::float_series(&name, parsed))?;
        tracing::debug!(column = %name, converted, "text column converted to numeric");
        conversions.push(NumericConversion {
            column: name,
            converted_cells: converted,
            newly_missing: present - converted,
        });
    }
    Ok(conversions)
}

/// Plain string columns with fewer distinct values than half the rows.
fn convert_to_categorical(df: &mut DataFrame, columns: &[String]) -> Result<()> {
    for name in columns {
        let cast = frame::series(df, name)?
            .cast(&DataType::Categorical(None, Default::default()))?;
        frame::put_column(df, cast)?;
    }
    Ok(())
}

fn categorical_candidates(df: &DataFrame) -> Result<Vec<String>> {
    let mut candidates = Vec::new();
    let rows = df.height() as f64;
    for name in text_columns(df) {
        if frame::series(df, &name)?.dtype() != &DataType::String {
            continue;
        }
        let values = frame::string_values(frame::series(df, &name)?)?;
        let distinct: HashSet<&str> = values.iter().flatten().map(String::as_str).collect();
        if !distinct.is_empty() && (distinct.len() as f64) < 0.5 * rows {
            candidates.push(name);
        }
    }
    Ok(candidates)
}

/// Runs the `inconsistent` step.
pub fn clean_inconsistent_formatting(
    df: DataFrame,
    config: &FormattingConfig,
) -> Result<(DataFrame, StepReport)> {
    config.validate()?;
    if config.strategy == FormattingStrategy::None {
        return Ok((
            df,
            StepReport::skipped(
                "inconsistent_formatting_cleaning",
                "Formatting cleanup skipped (strategy = 'none')",
            ),
        ));
    }

    let mut report = StepReport::new("inconsistent_formatting_cleaning");
    report.set("columns_processed", df.width());

    let (mut df, mapping) = if config.clean_names {
        let (df, mapping) = rename_columns(df, &config.names)?;
        report.set_serialized("column_names", &mapping_report(&mapping, &config.names)?)?;
        (df, Some(mapping))
    } else {
        (df, None)
    };

    if config.trim_whitespace {
        let (columns, cells) = map_text_cells(&mut df, |c| Some(c.trim().to_owned()))?;
        report.set(
            "whitespace_trimmed",
            serde_json::json!({ "columns": columns, "cells": cells }),
        );
    }

    if config.normalize_unicode {
        let (columns, cells) = map_text_cells(&mut df, |c| Some(c.nfkd().collect()))?;
        report.set(
            "unicode_normalized",
            serde_json::json!({ "columns": columns, "count": cells }),
        );
    }

    if config.replace_empty_with_null {
        let (columns, cells) = map_text_cells(&mut df, |c| {
            if c.is_empty() { None } else { Some(c.to_owned()) }
        })?;
        report.set(
            "empty_strings_replaced",
            serde_json::json!({ "columns": columns, "replaced": cells }),
        );
    }

    match config.string_case {
        StringCase::Lower => {
            let (columns, cells) = map_text_cells(&mut df, |c| Some(c.to_lowercase()))?;
            report.set(
                "string_case_normalized",
                serde_json::json!({ "case": "lower", "columns": columns, "cells": cells }),
            );
        }
        StringCase::Upper => {
            let (columns, cells) = map_text_cells(&mut df, |c| Some(c.to_uppercase()))?;
            report.set(
                "string_case_normalized",
                serde_json::json!({ "case": "upper", "columns": columns, "cells": cells }),
            );
        }
        StringCase::None => {}
    }

    let mut skip_numeric = HashSet::new();
    if !config.datetime_columns.is_empty() {
        let datetimes = convert_datetimes(&mut df, &config.datetime_columns, mapping.as_ref())?;
        skip_numeric.extend(datetimes.successful.iter().cloned());
        if !datetimes.failed.is_empty() {
            tracing::warn!(failed = datetimes.failed.len(), "some datetime columns were not converted");
        }
        report.set_serialized("datetime_converted", &datetimes)?;
    }

    if config.numeric_cleaning {
        let conversions = coerce_numeric(&mut df, config.min_numeric_ratio, &skip_numeric)?;
        let newly_missing: usize = conversions.iter().map(|c| c.newly_missing).sum();
        report.set("numeric_newly_missing", newly_missing);
        report.set_serialized("numeric_cleaned_columns", &conversions)?;
    }

    if config.convert_categorical {
        let columns = categorical_candidates(&df)?;
        convert_to_categorical(&mut df, &columns)?;
        let count = columns.len();
        tracing::debug!(?columns, "low-cardinality columns cast to categorical");
        report.set(
            "converted_to_category",
            serde_json::json!({ "columns": columns, "count": count }),
        );
    }

    report.set_serialized("final_shape", &Shape::of(&df))?;
    tracing::info!(columns = df.width(), rows = df.height(), "formatting cleaned");
    Ok((df, report))
}
