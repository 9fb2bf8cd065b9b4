//! Pipeline specification and execution.
//!
//! A pipeline is a versioned JSON document naming the steps to run and the
//! settings of each step. The same document can be built in code:
//!
//! ```no_run
//! use tidyframe::pipeline::{DataCleaner, PipelineSpec};
//! use tidyframe::cleaning::OutlierAction;
//! use polars::prelude::*;
//!
//! let mut spec = PipelineSpec::new("Customer cleanup")
//!     .with_steps(["inconsistent", "missing", "duplicates", "outliers"]);
//! spec.outlier_kwargs.action = OutlierAction::Remove;
//!
//! let df = df!("Customer ID" => [1, 2, 2], "spend" => [10.0, 12.5, 12.5])?;
//! let output = DataCleaner::new(spec).clean_all(df)?;
//! println!("{}", output.summary());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Steps
//!
//! - `missing`: drop or fill missing values ([`crate::cleaning::missing`])
//! - `duplicates`: remove, flag or group repeated rows ([`crate::cleaning::duplicates`])
//! - `outliers`: detect and remove, flag, cap or winsorize ([`crate::cleaning::outliers`])
//! - `inconsistent`: column names and cell formatting ([`crate::cleaning::formatting`])
//! - `normalize`: min-max or z-score scaling ([`crate::cleaning::normalize`])
//!
//! Any other step name is skipped with a warning and listed in
//! [`PipelineReport::skipped_steps`](crate::report::PipelineReport::skipped_steps).

pub mod executor;
pub mod spec;
pub mod validation;

pub use executor::{DataCleaner, PipelineOutput, PipelineState, check_pipeline, clean_all};
pub use spec::{DEFAULT_STEPS, PipelineSpec, SPEC_VERSION, StepKind};
pub use validation::{ValidationError, validate_columns, validate_pipeline};
