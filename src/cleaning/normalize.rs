//! Rescaling of numeric columns.

use crate::error::{CleanError, Result};
use crate::frame;
use crate::report::StepReport;
use crate::stats;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Normalization method for numeric columns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalisationMethod {
    #[default]
    None,
    /// Rescale to `[0, 1]`
    MinMax,
    /// Centre on the mean, divide by the sample standard deviation
    ZScore,
}

impl std::str::FromStr for NormalisationMethod {
    type Err = CleanError;

    fn from_str(s: &str) -> Result<Self> {
        super::parse_option(s, "normalisation method")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    pub method: NormalisationMethod,
    /// Numeric columns to rescale; all numeric columns when unset
    pub columns: Option<Vec<String>>,
}

impl NormalizeConfig {
    fn columns(&self, df: &DataFrame) -> Result<Vec<String>> {
        let numeric = frame::numeric_columns(df);
        let Some(cols) = &self.columns else {
            return Ok(numeric);
        };
        let bad: Vec<&String> = cols.iter().filter(|c| !numeric.contains(c)).collect();
        if bad.is_empty() {
            Ok(cols.clone())
        } else {
            Err(CleanError::config(format!(
                "normalize columns missing or not numeric: {bad:?}"
            )))
        }
    }
}

/// Returns `(offset, scale)` so that `(x - offset) / scale` is the rescaled value.
fn parameters(values: &[f64], method: NormalisationMethod) -> Option<(f64, f64)> {
    match method {
        NormalisationMethod::None => None,
        NormalisationMethod::MinMax => {
            let min = values.iter().copied().reduce(f64::min)?;
            let max = values.iter().copied().reduce(f64::max)?;
            Some((min, max - min))
        }
        NormalisationMethod::ZScore => Some((stats::mean(values)?, stats::std_dev(values)?)),
    }
}

/// Runs the normalize step. Rescaled columns become `Float64`; nulls stay null.
pub fn normalize_columns(df: DataFrame, config: &NormalizeConfig) -> Result<(DataFrame, StepReport)> {
    let columns = config.columns(&df)?;
    if config.method == NormalisationMethod::None {
        return Ok((
            df,
            StepReport::skipped("normalization", "Normalization skipped (method = 'none')"),
        ));
    }

    let mut report = StepReport::new("normalization");
    report.set("method", super::option_name(&config.method));

    let mut df = df;
    let mut normalized = Vec::new();
    let mut parameters_used = serde_json::Map::new();
    for name in &columns {
        let values = frame::numeric_values(frame::series(&df, name)?)?;
        let present = frame::present(&values);
        let Some((offset, scale)) = parameters(&present, config.method) else {
            report.note(format!("column '{name}' has too few values; skipped"));
            continue;
        };
        if !(scale.is_finite() && scale > 0.0) {
            tracing::debug!(column = %name, "constant column left as is");
            report.note(format!("column '{name}' is constant; skipped"));
            continue;
        }
        let rescaled: Vec<Option<f64>> = values
            .iter()
            .map(|v| v.map(|x| (x - offset) / scale))
            .collect();
        frame::put_column(&mut df, frame::float_series(name, rescaled))?;
        parameters_used.insert(
            name.clone(),
            serde_json::json!({ "offset": offset, "scale": scale }),
        );
        normalized.push(name.clone());
    }

    tracing::info!(columns = normalized.len(), "columns normalized");
    report.set_serialized("columns_normalized", &normalized)?;
    report.set("parameters", serde_json::Value::Object(parameters_used));
    Ok((df, report))
}
