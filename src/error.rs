//! Error handling for the remediation engine.
//!
//! Two kinds of problems exist in this crate:
//!
//! - **Caller mistakes** (an unknown strategy name, a missing constant, a subset
//!   column that is not in the dataset). These surface as
//!   [`CleanError::Configuration`] before the step touches the dataset.
//! - **Degenerate input** (zero variance, fewer than three values for a Grubbs
//!   test, an empty dataset). These are *not* errors: the step records a note in
//!   its report and moves on.
//!
//! Everything else (Polars failures, JSON problems) is propagated unchanged.
//!
//! ```
//! use tidyframe::error::CleanError;
//!
//! fn describe(err: &CleanError) -> &'static str {
//!     match err {
//!         CleanError::Configuration(_) => "fix the pipeline config",
//!         CleanError::Step { .. } => "a pipeline step failed",
//!         _ => "unexpected failure",
//!     }
//! }
//! ```

use std::fmt;

/// Main error type for tidyframe operations.
#[derive(Debug)]
pub enum CleanError {
    /// Unrecognised option name or a required parameter is missing
    Configuration(String),

    /// Data processing errors raised by Polars
    DataProcessing(String),

    /// JSON (de)serialisation errors
    Json(String),

    /// I/O errors while reading a pipeline spec
    Io(std::io::Error),

    /// A pipeline step failed; `step` names it
    Step {
        step: String,
        source: Box<CleanError>,
    },

    /// Generic error with context
    Other(String),
}

impl CleanError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// True when this error (or the step error it wraps) is a configuration problem.
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Configuration(_) => true,
            Self::Step { source, .. } => source.is_configuration(),
            _ => false,
        }
    }
}

impl fmt::Display for CleanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            Self::DataProcessing(msg) => write!(f, "Data processing error: {msg}"),
            Self::Json(msg) => write!(f, "JSON error: {msg}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Step { step, source } => write!(f, "Step '{step}' failed: {source}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for CleanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Step { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CleanError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<anyhow::Error> for CleanError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<serde_json::Error> for CleanError {
    fn from(err: serde_json::Error) -> Self {
        // serde reports unknown enum variants as data errors; those are config mistakes
        if err.is_data() {
            Self::Configuration(err.to_string())
        } else {
            Self::Json(err.to_string())
        }
    }
}

impl From<polars::error::PolarsError> for CleanError {
    fn from(err: polars::error::PolarsError) -> Self {
        Self::DataProcessing(err.to_string())
    }
}

/// Result type alias for tidyframe operations.
pub type Result<T> = std::result::Result<T, CleanError>;

/// Extension trait to add context to results.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add context using a closure (lazy evaluation).
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<CleanError>,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err: CleanError = e.into();
            CleanError::Other(format!("{}: {}", msg.into(), err))
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err: CleanError = e.into();
            CleanError::Other(format!("{}: {}", f(), err))
        })
    }
}
