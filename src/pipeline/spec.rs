//! Pipeline specification data structures.
//!
//! A spec is an ordered list of step names plus one typed config per step kind.
//! Every field has a default, so `{}` is a valid spec that runs the default
//! steps with default settings.

use crate::cleaning::{
    DuplicateConfig, FormattingConfig, MissingConfig, NormalizeConfig, OutlierConfig,
};
use crate::error::{Result, ResultExt as _};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current pipeline spec version
pub const SPEC_VERSION: &str = "0.1";

/// Steps run when a spec does not list any.
pub const DEFAULT_STEPS: [&str; 4] = ["missing", "duplicates", "outliers", "inconsistent"];

/// Step names the orchestrator knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    Missing,
    Duplicates,
    Outliers,
    Inconsistent,
    Normalize,
}

impl StepKind {
    pub const ALL: [Self; 5] = [
        Self::Missing,
        Self::Duplicates,
        Self::Outliers,
        Self::Inconsistent,
        Self::Normalize,
    ];

    /// Looks up a step by name; `None` for names the orchestrator skips.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name.trim())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Duplicates => "duplicates",
            Self::Outliers => "outliers",
            Self::Inconsistent => "inconsistent",
            Self::Normalize => "normalize",
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Root pipeline specification structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// Specification version for future migrations
    #[serde(default = "default_version")]
    pub version: String,

    /// Human-readable pipeline name
    #[serde(default)]
    pub name: String,

    /// Step names in execution order
    #[serde(default = "default_steps")]
    pub steps: Vec<String>,

    #[serde(default)]
    pub missing_kwargs: MissingConfig,

    #[serde(default)]
    pub duplicate_kwargs: DuplicateConfig,

    #[serde(default)]
    pub outlier_kwargs: OutlierConfig,

    #[serde(default)]
    pub inconsistent_kwargs: FormattingConfig,

    #[serde(default)]
    pub normalize_kwargs: NormalizeConfig,
}

impl Default for PipelineSpec {
    fn default() -> Self {
        Self::new("")
    }
}

impl PipelineSpec {
    /// Create a new pipeline spec with default settings
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: default_version(),
            name: name.into(),
            steps: default_steps(),
            missing_kwargs: MissingConfig::default(),
            duplicate_kwargs: DuplicateConfig::default(),
            outlier_kwargs: OutlierConfig::default(),
            inconsistent_kwargs: FormattingConfig::default(),
            normalize_kwargs: NormalizeConfig::default(),
        }
    }

    /// Replaces the step list.
    pub fn with_steps<S: Into<String>>(mut self, steps: impl IntoIterator<Item = S>) -> Self {
        self.steps = steps.into_iter().map(Into::into).collect();
        self
    }

    /// Load a pipeline spec from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline spec file {}", path.display()))?;
        Self::from_json(&content)
    }

    /// Parse a pipeline spec from JSON string
    ///
    /// An unknown option name anywhere in the document is a configuration error.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Save pipeline spec to a JSON file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = self.to_json()?;
        std::fs::write(path.as_ref(), json).context("Failed to write pipeline spec file")
    }

    /// Serialize pipeline spec to JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Known steps in order, with the unknown names left out.
    pub fn known_steps(&self) -> Vec<StepKind> {
        self.steps.iter().filter_map(|s| StepKind::parse(s)).collect()
    }

    /// Step names the orchestrator will skip.
    pub fn unknown_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| StepKind::parse(s).is_none())
            .map(String::as_str)
            .collect()
    }
}

fn default_version() -> String {
    SPEC_VERSION.to_owned()
}

fn default_steps() -> Vec<String> {
    DEFAULT_STEPS.iter().map(|s| (*s).to_owned()).collect()
}
