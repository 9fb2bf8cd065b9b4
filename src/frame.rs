//! Helpers over `polars::DataFrame`, the dataset type every step works on.
//!
//! Polars columns are reference counted, so passing a `DataFrame` by value and
//! returning a modified one never deep-copies untouched columns. Row removal is
//! always expressed as a keep-mask over the current rows.

use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Column added by the duplicate step in `flag`/`mark` mode.
pub const IS_DUPLICATE: &str = "is_duplicate";
/// Column added by the duplicate step in `mark` mode.
pub const DUPLICATE_GROUP_ID: &str = "duplicate_group_id";
/// Column added by the outlier step in `flag` mode.
pub const IS_OUTLIER: &str = "is_outlier";

/// Columns the engine adds itself; they are never treated as data.
pub const HELPER_COLUMNS: [&str; 3] = [IS_DUPLICATE, DUPLICATE_GROUP_ID, IS_OUTLIER];

/// Broad type family of a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Numeric,
    Text,
    Boolean,
    Temporal,
    Other,
}

impl ColumnKind {
    pub fn of(dtype: &DataType) -> Self {
        match dtype {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64 => Self::Numeric,
            DataType::String | DataType::Categorical(_, _) => Self::Text,
            DataType::Boolean => Self::Boolean,
            DataType::Date | DataType::Datetime(_, _) => Self::Temporal,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Text => "text",
            Self::Boolean => "boolean",
            Self::Temporal => "temporal",
            Self::Other => "other",
        }
    }
}

pub fn is_helper_column(name: &str) -> bool {
    HELPER_COLUMNS.contains(&name)
}

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect()
}

pub fn series<'a>(df: &'a DataFrame, name: &str) -> PolarsResult<&'a Series> {
    Ok(df.column(name)?.as_materialized_series())
}

pub fn kind_of(df: &DataFrame, name: &str) -> PolarsResult<ColumnKind> {
    Ok(ColumnKind::of(df.column(name)?.dtype()))
}

/// Data columns (helper columns excluded) of the given kind, in frame order.
pub fn columns_of_kind(df: &DataFrame, kind: ColumnKind) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|c| ColumnKind::of(c.dtype()) == kind && !is_helper_column(c.name()))
        .map(|c| c.name().to_string())
        .collect()
}

pub fn numeric_columns(df: &DataFrame) -> Vec<String> {
    columns_of_kind(df, ColumnKind::Numeric)
}

/// Per-cell missing flags. Nulls are missing, and so is NaN in float columns.
pub fn missing_mask(series: &Series) -> PolarsResult<Vec<bool>> {
    if matches!(series.dtype(), DataType::Float32 | DataType::Float64) {
        let cast = series.cast(&DataType::Float64)?;
        Ok(cast
            .f64()?
            .into_iter()
            .map(|v| v.is_none_or(f64::is_nan))
            .collect())
    } else {
        Ok(series
            .is_null()
            .into_iter()
            .map(|v| v.unwrap_or(true))
            .collect())
    }
}

pub fn missing_count(series: &Series) -> PolarsResult<usize> {
    Ok(missing_mask(series)?.into_iter().filter(|m| *m).count())
}

pub fn total_missing(df: &DataFrame) -> PolarsResult<usize> {
    let mut total = 0;
    for col in df.get_columns() {
        total += missing_count(col.as_materialized_series())?;
    }
    Ok(total)
}

/// Share of missing cells over the whole frame, in percent.
pub fn missing_percentage(df: &DataFrame) -> PolarsResult<f64> {
    let cells = df.height() * df.width();
    if cells == 0 {
        return Ok(0.0);
    }
    Ok(total_missing(df)? as f64 / cells as f64 * 100.0)
}

/// Values of a numeric column as `f64`, with NaN folded into `None`.
pub fn numeric_values(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    let cast = series.cast(&DataType::Float64)?;
    Ok(cast
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

/// Finite values only; statistics never see nulls or infinities.
pub fn present(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().flatten().copied().filter(|v| v.is_finite()).collect()
}

pub fn float_series(name: &str, values: Vec<Option<f64>>) -> Series {
    Series::new(name.into(), values)
}

/// Text view of any column; nulls stay `None`.
pub fn string_values(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let cast = series.cast(&DataType::String)?;
    Ok(cast
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_owned))
        .collect())
}

/// Text cells as a column of `dtype`, so categorical columns stay categorical.
pub fn text_series(name: &str, values: Vec<Option<String>>, dtype: &DataType) -> PolarsResult<Series> {
    let series = Series::new(name.into(), values);
    if dtype == &DataType::String {
        Ok(series)
    } else {
        series.cast(dtype)
    }
}

/// Replaces (same name) or appends a column.
pub fn put_column(df: &mut DataFrame, series: Series) -> PolarsResult<()> {
    df.with_column(series)?;
    Ok(())
}

/// Keeps the rows whose flag is `true`.
pub fn filter_rows(df: &DataFrame, keep: &[bool]) -> PolarsResult<DataFrame> {
    let mask = BooleanChunked::from_slice("keep".into(), keep);
    df.filter(&mask)
}

pub fn drop_columns(df: DataFrame, names: &[String]) -> PolarsResult<DataFrame> {
    let mut df = df;
    for name in names {
        df = df.drop(name)?;
    }
    Ok(df)
}

/// Key frame for row comparison; float keys fold `-0.0` into `0.0`.
fn comparison_keys(df: &DataFrame, columns: &[String]) -> PolarsResult<DataFrame> {
    let mut keys: Vec<Column> = Vec::with_capacity(columns.len());
    for name in columns {
        if keys.iter().any(|k| k.name().as_str() == name) {
            continue;
        }
        let s = series(df, name)?;
        let key = if s.dtype().is_float() {
            s.cast(&DataType::Float64)?
                .f64()?
                .apply_values(|v| v + 0.0)
                .into_series()
        } else {
            s.clone()
        };
        keys.push(Column::from(key));
    }
    DataFrame::new(keys)
}

/// Rows grouped by equal values on `columns`, groups in order of first
/// appearance and rows ascending within a group.
///
/// Nulls equal nulls and NaN equals NaN. Without columns every row is its own
/// group.
pub fn row_groups(df: &DataFrame, columns: &[String]) -> PolarsResult<Vec<Vec<usize>>> {
    if columns.is_empty() || df.height() == 0 {
        return Ok((0..df.height()).map(|r| vec![r]).collect());
    }
    let keys = comparison_keys(df, columns)?;
    let names: Vec<PlSmallStr> = keys.get_column_names_owned();
    let grouped = keys.group_by_stable(names)?;
    let mut groups: Vec<Vec<usize>> = grouped
        .get_groups()
        .iter()
        .map(|group| match group {
            GroupsIndicator::Idx((_, rows)) => rows.iter().map(|&r| r as usize).collect(),
            GroupsIndicator::Slice([first, len]) => (first..first + len).map(|r| r as usize).collect(),
        })
        .collect();
    for group in &mut groups {
        group.sort_unstable();
    }
    groups.sort_by_key(|g| g.first().copied());
    Ok(groups)
}
