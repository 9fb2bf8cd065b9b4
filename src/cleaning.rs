//! Cleaning components.
//!
//! Each component takes ownership of a `DataFrame` plus its typed config and
//! returns the transformed frame with a [`StepReport`](crate::report::StepReport):
//!
//! - [`formatting`] (`inconsistent` step) with the column-name rules in [`schema`]
//! - [`missing`] with the multivariate fillers in [`imputers`]
//! - [`duplicates`]
//! - [`outliers`], backed by [`grubbs`] and [`multivariate`]
//! - [`normalize`]
//! - [`quality`], the final score, with the column statistics of [`profile`]
//!
//! Configs are validated before the frame is touched, so a configuration error
//! never leaves a half-applied step behind.

pub mod duplicates;
pub mod formatting;
pub mod grubbs;
pub mod imputers;
pub mod missing;
pub mod multivariate;
pub mod normalize;
pub mod outliers;
pub mod profile;
pub mod quality;
pub mod schema;

pub use duplicates::{DuplicateConfig, DuplicateMethod, KeepPolicy, handle_duplicates};
pub use formatting::{FormattingConfig, FormattingStrategy, StringCase, clean_inconsistent_formatting};
pub use missing::{
    AdvancedMethod, CategoricalMethod, MissingConfig, MissingStrategy, NumericMethod,
    handle_missing,
};
pub use normalize::{NormalisationMethod, NormalizeConfig, normalize_columns};
pub use outliers::{OutlierAction, OutlierConfig, OutlierMethod, handle_outliers};
pub use profile::{DatasetProfile, profile_dataset};
pub use quality::{QualityAssessment, assess_quality, quality_score};
pub use schema::{NameConfig, NameMapping, clean_column_names, clean_names};

use crate::error::{CleanError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Parses an option name (`"median"`, `"keep_first"`...) into its enum through
/// the same serde names the JSON config uses.
pub(crate) fn parse_option<T: DeserializeOwned>(name: &str, what: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(name.trim().to_owned()))
        .map_err(|_| CleanError::config(format!("unknown {what} '{name}'")))
}

/// The serde name of an option, for reports and log lines.
pub(crate) fn option_name<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => String::new(),
    }
}
