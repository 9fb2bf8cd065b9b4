//! Structured reports produced by each cleaning step.
//!
//! A [`StepReport`] is a flat JSON object (metric name → value). The
//! orchestrator collects one per executed step into a [`PipelineReport`] keyed by
//! step name. Reports only ever hold JSON-native values, so the whole structure
//! serialises with `serde_json` without custom handling.

use crate::cleaning::profile::DatasetProfile;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Rows × columns of a dataset at some point of the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape {
    pub rows: usize,
    pub columns: usize,
}

impl Shape {
    pub fn of(df: &polars::prelude::DataFrame) -> Self {
        Self {
            rows: df.height(),
            columns: df.width(),
        }
    }

    pub fn cells(&self) -> usize {
        self.rows * self.columns
    }
}

/// Metrics emitted by a single step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepReport(Map<String, Value>);

impl StepReport {
    pub fn new(operation: &str) -> Self {
        let mut report = Self::default();
        report.set("operation", operation);
        report
    }

    /// A report for a step that did nothing on purpose.
    pub fn skipped(operation: &str, message: impl Into<String>) -> Self {
        let mut report = Self::new(operation);
        report.set("skipped", true);
        report.set("message", message.into());
        report
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_owned(), value.into());
    }

    /// Stores any serialisable value (per-column breakdowns, typed summaries).
    pub fn set_serialized<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        self.0.insert(key.to_owned(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Appends a human-readable note about degenerate input that was skipped.
    pub fn note(&mut self, message: impl Into<String>) {
        let entry = self
            .0
            .entry("notes".to_owned())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(items) = entry {
            items.push(Value::String(message.into()));
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    pub fn is_skipped(&self) -> bool {
        self.0
            .get("skipped")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn notes(&self) -> Vec<&str> {
        match self.0.get("notes") {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Reports of a whole run, keyed by step name.
///
/// Entries are never overwritten: if the same step runs twice the second
/// report is stored as `<step>_2`, and so on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Step reports keyed by (possibly suffixed) step name
    pub steps: BTreeMap<String, StepReport>,

    /// Keys of `steps` in execution order
    pub order: Vec<String>,

    /// Step names that were requested but not recognised
    pub skipped_steps: Vec<String>,

    /// Run-level summary, filled once all steps completed
    pub overall_improvement: Option<OverallImprovement>,
}

impl PipelineReport {
    /// Records a step report and returns the key it was stored under.
    pub fn insert(&mut self, step: &str, report: StepReport) -> String {
        let mut key = step.to_owned();
        let mut n = 1;
        while self.steps.contains_key(&key) {
            n += 1;
            key = format!("{step}_{n}");
        }
        self.steps.insert(key.clone(), report);
        self.order.push(key.clone());
        key
    }

    pub fn step(&self, key: &str) -> Option<&StepReport> {
        self.steps.get(key)
    }

    /// Reports in the order the steps ran.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StepReport)> {
        self.order
            .iter()
            .filter_map(|key| self.steps.get(key).map(|r| (key.as_str(), r)))
    }

    pub fn all_skipped(&self) -> bool {
        self.steps.values().all(StepReport::is_skipped)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Summary of what a run changed, plus the final quality score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallImprovement {
    pub data_quality_score: f64,
    pub initial_shape: Shape,
    pub final_shape: Shape,
    pub rows_removed: i64,
    pub columns_removed: i64,
    pub rows_reduction_percentage: f64,
    pub initial_missing_percentage: f64,
    pub final_missing_percentage: f64,
    pub initial_duplicate_percentage: f64,
    pub final_duplicate_percentage: f64,
    pub risks: Vec<String>,
    /// Column statistics of the cleaned dataset
    #[serde(default)]
    pub final_profile: DatasetProfile,
}

/// Rounds to two decimals, matching the precision used in reports.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
