//! Per-column dataset profile attached to quality assessments.
//!
//! Numeric columns get location, spread and shape statistics computed over
//! their finite values. Every other column is profiled as categorical: the
//! number of distinct values and the most frequent ones.

use super::duplicates;
use crate::error::Result;
use crate::frame::{self, ColumnKind};
use crate::report::round2;
use crate::stats;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Most frequent values listed per categorical column.
const TOP_CATEGORIES: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericProfile {
    pub count: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub q1: Option<f64>,
    pub q3: Option<f64>,
    pub skewness: Option<f64>,
    pub kurtosis: Option<f64>,
    pub missing_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoricalProfile {
    pub num_unique: usize,
    pub top_categories: Vec<CategoryCount>,
    pub missing_percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetProfile {
    pub rows: usize,
    pub columns: usize,
    pub data_types: BTreeMap<String, String>,
    pub missing_values: BTreeMap<String, usize>,
    pub duplicate_rows: usize,
    pub numeric: BTreeMap<String, NumericProfile>,
    pub categorical: BTreeMap<String, CategoricalProfile>,
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round2(part as f64 / whole as f64 * 100.0)
    }
}

fn numeric_profile(series: &Series, missing: usize) -> Result<NumericProfile> {
    let values = frame::present(&frame::numeric_values(series)?);
    let ca = Float64Chunked::from_slice(series.name().clone(), &values);
    let quartile = |q| ca.quantile(q, QuantileMethod::Linear).ok().flatten();
    Ok(NumericProfile {
        count: values.len(),
        mean: ca.mean(),
        median: ca.median(),
        std: stats::std_dev(&values),
        min: ca.min(),
        max: ca.max(),
        q1: quartile(0.25),
        q3: quartile(0.75),
        skewness: stats::skewness(&values),
        kurtosis: stats::kurtosis(&values),
        missing_percentage: percent(missing, series.len()),
    })
}

fn categorical_profile(series: &Series, missing: usize) -> Result<CategoricalProfile> {
    let observed = series.drop_nulls().with_name("value".into());
    let counts = observed.value_counts(false, false, "count".into(), false)?;
    let values = frame::string_values(frame::series(&counts, "value")?)?;
    let tallies = frame::numeric_values(frame::series(&counts, "count")?)?;

    let mut categories: Vec<CategoryCount> = values
        .into_iter()
        .zip(tallies)
        .filter_map(|(value, count)| {
            Some(CategoryCount {
                value: value?,
                count: count? as usize,
            })
        })
        .collect();
    let num_unique = categories.len();
    categories.sort_by(|a, b| {
        Reverse(a.count)
            .cmp(&Reverse(b.count))
            .then_with(|| a.value.cmp(&b.value))
    });
    categories.truncate(TOP_CATEGORIES);

    Ok(CategoricalProfile {
        num_unique,
        top_categories: categories,
        missing_percentage: percent(missing, series.len()),
    })
}

/// Profiles every column of `df`, helper columns included.
pub fn profile_dataset(df: &DataFrame) -> Result<DatasetProfile> {
    let mut profile = DatasetProfile {
        rows: df.height(),
        columns: df.width(),
        duplicate_rows: duplicates::duplicate_rows(df)?,
        ..DatasetProfile::default()
    };

    for column in df.get_columns() {
        let series = column.as_materialized_series();
        let name = series.name().to_string();
        let missing = frame::missing_count(series)?;
        profile.data_types.insert(name.clone(), series.dtype().to_string());
        profile.missing_values.insert(name.clone(), missing);

        if ColumnKind::of(series.dtype()) == ColumnKind::Numeric {
            profile.numeric.insert(name, numeric_profile(series, missing)?);
        } else {
            profile
                .categorical
                .insert(name, categorical_profile(series, missing)?);
        }
    }

    tracing::debug!(
        numeric = profile.numeric.len(),
        categorical = profile.categorical.len(),
        "dataset profiled"
    );
    Ok(profile)
}
