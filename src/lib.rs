//! # tidyframe - Tabular Data-Quality Remediation
//!
//! tidyframe takes a dataset that has already been loaded into a Polars
//! `DataFrame` and repairs the usual problems of real-world tables: missing
//! values, repeated rows, outliers, and inconsistent names and formatting.
//! Every step returns a JSON-friendly report, and a run ends with a 0-100
//! quality score.
//!
//! ## Quick Start
//!
//! ```no_run
//! use polars::prelude::*;
//! use tidyframe::pipeline::{PipelineSpec, clean_all};
//!
//! let df = df!(
//!     "Order ID" => [Some(1), Some(2), Some(2), Some(3)],
//!     "amount" => [Some(10.0), None, None, Some(9000.0)],
//! )?;
//!
//! let spec = PipelineSpec::from_json(r#"{"outlier_kwargs": {"action": "cap"}}"#)?;
//! let output = clean_all(df, &spec)?;
//!
//! println!("{}", output.summary());
//! println!("{}", output.report.to_json()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Core Modules
//!
//! - [`cleaning`]: the individual steps (missing values, duplicates, outliers,
//!   formatting, normalization), the quality score and the dataset profile
//! - [`pipeline`]: JSON pipeline specs, validation, and the orchestrator
//! - [`report`]: step and run reports
//! - [`stats`]: descriptive statistics, distributions and small matrix helpers
//! - [`frame`]: `DataFrame` helpers shared by the steps
//! - [`error`]: error types and handling utilities
//! - [`logging`]: `tracing` subscriber setup for host applications
//!
//! ## Key Concepts
//!
//! ### Configuration errors vs. degenerate data
//!
//! A misconfigured step (an unknown method name, a constant fill without a
//! value) fails before it touches the dataset. Awkward data (a constant column,
//! a column with two values, an empty table) is not an error: the step records
//! a note in its report and carries on.
//!
//! ### One evolving dataset
//!
//! Steps take the `DataFrame` by value and hand back the next one. Polars
//! columns are reference counted, so untouched columns are never copied.

#![warn(clippy::all, rust_2018_idioms)]

pub mod cleaning;
pub mod error;
pub mod frame;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod stats;

pub use error::{CleanError, Result};
pub use pipeline::{DataCleaner, PipelineOutput, PipelineSpec, clean_all};
pub use report::{PipelineReport, StepReport};
