//! Pipeline execution engine.
//!
//! Runs the steps of a [`PipelineSpec`] in order against one evolving dataset,
//! collecting a [`PipelineReport`] and finishing with the quality score.
//!
//! A [`DataCleaner`] owns the state of one run at a time. Callers that clean
//! several datasets concurrently need one cleaner each.

use super::spec::{PipelineSpec, StepKind};
use super::validation::{ValidationError, validate_columns, validate_pipeline};
use crate::cleaning::{
    assess_quality, clean_inconsistent_formatting, handle_duplicates, handle_missing,
    handle_outliers, normalize_columns,
};
use crate::error::{CleanError, Result};
use crate::report::{OverallImprovement, PipelineReport, Shape, StepReport, round2};
use polars::prelude::*;
use std::time::{Duration, Instant};

/// Where a cleaner is in its current run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PipelineState {
    #[default]
    NotStarted,
    Running {
        step: String,
    },
    Completed,
    Failed {
        step: String,
        message: String,
    },
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// The cleaned dataset
    pub data: DataFrame,

    /// Step reports plus the run summary
    pub report: PipelineReport,

    /// Time taken for execution
    pub duration: Duration,
}

impl PipelineOutput {
    /// Final quality score, 0 to 100.
    pub fn quality_score(&self) -> f64 {
        self.report
            .overall_improvement
            .as_ref()
            .map_or(0.0, |o| o.data_quality_score)
    }

    /// Create a summary message
    pub fn summary(&self) -> String {
        let Some(overall) = &self.report.overall_improvement else {
            return "Pipeline produced no summary".to_owned();
        };
        format!(
            "Pipeline completed: rows {} → {}, columns {} → {}, {} steps ({} skipped), quality {:.2}, {:.2}s",
            overall.initial_shape.rows,
            overall.final_shape.rows,
            overall.initial_shape.columns,
            overall.final_shape.columns,
            self.report.steps.len(),
            self.report.skipped_steps.len(),
            overall.data_quality_score,
            self.duration.as_secs_f64()
        )
    }
}

/// Runs pipeline specs.
///
/// A failed run leaves the dataset as of the last completed step available via
/// [`DataCleaner::last_completed`], together with the reports gathered so far.
#[derive(Debug)]
pub struct DataCleaner {
    spec: PipelineSpec,
    state: PipelineState,
    report: PipelineReport,
    last_completed: Option<DataFrame>,
}

impl DataCleaner {
    pub fn new(spec: PipelineSpec) -> Self {
        Self {
            spec,
            state: PipelineState::NotStarted,
            report: PipelineReport::default(),
            last_completed: None,
        }
    }

    pub fn spec(&self) -> &PipelineSpec {
        &self.spec
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Reports of the current (or last) run, complete or not.
    pub fn report(&self) -> &PipelineReport {
        &self.report
    }

    /// Dataset after the last step that finished, if any step ran.
    pub fn last_completed(&self) -> Option<&DataFrame> {
        self.last_completed.as_ref()
    }

    /// Runs every step of the spec.
    ///
    /// Problems found by validation fail the run before any step starts. A step
    /// error stops the run; the error names the failing step.
    pub fn clean_all(&mut self, df: DataFrame) -> Result<PipelineOutput> {
        let start = Instant::now();
        self.report = PipelineReport::default();
        self.last_completed = None;
        self.state = PipelineState::NotStarted;

        self.check(&df)?;

        let initial_shape = Shape::of(&df);
        let initial = assess_quality(&df)?;
        tracing::info!(
            pipeline = %self.spec.name,
            rows = initial_shape.rows,
            columns = initial_shape.columns,
            "Starting cleaning pipeline"
        );

        let mut current = df;
        for name in self.spec.steps.clone() {
            let Some(kind) = StepKind::parse(&name) else {
                tracing::warn!(step = %name, "Unknown step, skipping");
                self.report.skipped_steps.push(name);
                continue;
            };

            self.state = PipelineState::Running {
                step: kind.to_string(),
            };
            tracing::info!(step = %kind, "Running step");

            // Columns are reference counted, so this keeps the pre-step dataset
            // around without copying it
            let input = current.clone();
            match self.run_step(kind, input) {
                Ok((next, step_report)) => {
                    tracing::info!(
                        step = %kind,
                        rows = next.height(),
                        columns = next.width(),
                        "Step finished"
                    );
                    self.report.insert(kind.as_str(), step_report);
                    current = next;
                    self.last_completed = Some(current.clone());
                }
                Err(e) => {
                    tracing::error!(step = %kind, error = %e, "Step failed");
                    return Err(self.fail(kind.as_str(), e));
                }
            }
        }

        let final_shape = Shape::of(&current);
        let fin = assess_quality(&current)?;
        let rows_removed = signed(initial_shape.rows) - signed(final_shape.rows);
        let rows_reduction_percentage = if initial_shape.rows == 0 {
            0.0
        } else {
            round2(rows_removed as f64 / initial_shape.rows as f64 * 100.0)
        };
        self.report.overall_improvement = Some(OverallImprovement {
            data_quality_score: fin.score,
            initial_shape,
            final_shape,
            rows_removed,
            columns_removed: signed(initial_shape.columns) - signed(final_shape.columns),
            rows_reduction_percentage,
            initial_missing_percentage: initial.missing_percentage,
            final_missing_percentage: fin.missing_percentage,
            initial_duplicate_percentage: initial.duplicate_percentage,
            final_duplicate_percentage: fin.duplicate_percentage,
            risks: fin.risks,
            final_profile: fin.profile,
        });
        self.state = PipelineState::Completed;

        let duration = start.elapsed();
        tracing::info!(
            score = fin.score,
            rows_removed,
            skipped = self.report.skipped_steps.len(),
            "Cleaning pipeline completed in {:.2}s",
            duration.as_secs_f64()
        );

        Ok(PipelineOutput {
            data: current,
            report: self.report.clone(),
            duration,
        })
    }

    fn check(&mut self, df: &DataFrame) -> Result<()> {
        let mut errors = validate_pipeline(&self.spec);
        errors.extend(validate_columns(&self.spec, df.schema()));
        let Some(first) = errors.first() else {
            return Ok(());
        };

        let message = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");
        tracing::error!(problems = errors.len(), "Pipeline validation failed");
        let err = CleanError::config(format!("Pipeline validation failed:\n{message}"));
        let step = first
            .step
            .map_or_else(|| "validation".to_owned(), |s| s.to_string());
        Err(self.fail(&step, err))
    }

    fn fail(&mut self, step: &str, err: CleanError) -> CleanError {
        self.state = PipelineState::Failed {
            step: step.to_owned(),
            message: err.to_string(),
        };
        CleanError::Step {
            step: step.to_owned(),
            source: Box::new(err),
        }
    }

    fn run_step(&self, kind: StepKind, df: DataFrame) -> Result<(DataFrame, StepReport)> {
        let spec = &self.spec;
        match kind {
            StepKind::Missing => handle_missing(df, &spec.missing_kwargs),
            StepKind::Duplicates => handle_duplicates(df, &spec.duplicate_kwargs),
            StepKind::Outliers => handle_outliers(df, &spec.outlier_kwargs),
            StepKind::Inconsistent => clean_inconsistent_formatting(df, &spec.inconsistent_kwargs),
            StepKind::Normalize => normalize_columns(df, &spec.normalize_kwargs),
        }
    }
}

/// Runs `spec` against `df` with a fresh [`DataCleaner`].
pub fn clean_all(df: DataFrame, spec: &PipelineSpec) -> Result<PipelineOutput> {
    DataCleaner::new(spec.clone()).clean_all(df)
}

/// Validation problems for `spec` against `df`, without running anything.
pub fn check_pipeline(spec: &PipelineSpec, df: &DataFrame) -> Vec<ValidationError> {
    let mut errors = validate_pipeline(spec);
    errors.extend(validate_columns(spec, df.schema()));
    errors
}

fn signed(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
