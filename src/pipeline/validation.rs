//! Pipeline specification validation.
//!
//! Checks a spec before execution so every problem is reported at once instead
//! of one failed step at a time. Unknown step names are not problems: the
//! orchestrator skips them with a warning.

use super::spec::{PipelineSpec, SPEC_VERSION, StepKind};
use crate::cleaning::schema::clean_names;
use polars::prelude::*;

/// Validation error with helpful context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Step the problem belongs to; `None` for spec-level problems
    pub step: Option<StepKind>,
    pub message: String,
}

impl ValidationError {
    fn new(step: Option<StepKind>, message: impl Into<String>) -> Self {
        Self {
            step,
            message: message.into(),
        }
    }

    fn step(step: StepKind, message: impl Into<String>) -> Self {
        Self::new(Some(step), message)
    }

    fn spec(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(step) = self.step {
            write!(f, "Step '{step}': {}", self.message)
        } else {
            write!(f, "Spec: {}", self.message)
        }
    }
}

/// Validate the option combinations of every step the spec will run
pub fn validate_pipeline(spec: &PipelineSpec) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if spec.version != SPEC_VERSION {
        errors.push(ValidationError::spec(format!(
            "Unsupported spec version '{}', expected '{SPEC_VERSION}'",
            spec.version
        )));
    }

    let mut seen = Vec::new();
    for kind in spec.known_steps() {
        // Steps share one config, so checking it once is enough
        if seen.contains(&kind) {
            continue;
        }
        seen.push(kind);
        let result = match kind {
            StepKind::Missing => spec.missing_kwargs.validate(),
            StepKind::Duplicates => spec.duplicate_kwargs.validate(),
            StepKind::Outliers => spec.outlier_kwargs.validate(),
            StepKind::Inconsistent => spec.inconsistent_kwargs.validate(),
            StepKind::Normalize => Ok(()),
        };
        if let Err(e) = result {
            errors.push(ValidationError::step(kind, e.to_string()));
        }
    }

    errors
}

/// Validate the column names a spec refers to against an input schema.
///
/// Walks the steps in order and tracks how the column list changes (explicit
/// drops and renaming in the `inconsistent` step), so a column referenced after
/// renaming must use its cleaned name. Columns removed for being entirely
/// missing depend on the data and are not predicted.
pub fn validate_columns(spec: &PipelineSpec, input_schema: &Schema) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut columns: Vec<String> = input_schema
        .iter_names()
        .map(|s| s.as_str().to_owned())
        .collect();

    for kind in spec.known_steps() {
        match kind {
            StepKind::Missing => {
                let dropping = &spec.missing_kwargs.drop_specific_columns;
                if spec.missing_kwargs.strategy == crate::cleaning::MissingStrategy::Drop {
                    check_exist(kind, dropping, &columns, &mut errors);
                    columns.retain(|c| !dropping.contains(c));
                }
            }
            StepKind::Duplicates => {
                if let Some(subset) = &spec.duplicate_kwargs.subset {
                    check_exist(kind, subset, &columns, &mut errors);
                }
            }
            StepKind::Outliers => {
                if let Some(cols) = &spec.outlier_kwargs.columns {
                    check_exist(kind, cols, &columns, &mut errors);
                }
            }
            StepKind::Normalize => {
                if let Some(cols) = &spec.normalize_kwargs.columns {
                    check_exist(kind, cols, &columns, &mut errors);
                }
            }
            StepKind::Inconsistent => {
                let config = &spec.inconsistent_kwargs;
                if config.strategy == crate::cleaning::FormattingStrategy::None || !config.clean_names {
                    continue;
                }
                match clean_names(&columns, &config.names) {
                    Ok(mapping) => columns = mapping.cleaned,
                    Err(e) => errors.push(ValidationError::step(kind, e.to_string())),
                }
            }
        }
    }

    errors
}

fn check_exist(kind: StepKind, wanted: &[String], columns: &[String], errors: &mut Vec<ValidationError>) {
    for col in wanted {
        if !columns.contains(col) {
            errors.push(ValidationError::step(
                kind,
                format!("column '{col}' does not exist at this point"),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaning::{CategoricalMethod, MissingStrategy};

    fn create_test_schema() -> Schema {
        Schema::from_iter(vec![
            Field::new("Customer ID".into(), DataType::Int64),
            Field::new("name".into(), DataType::String),
            Field::new("age".into(), DataType::Int64),
        ])
    }

    #[test]
    fn test_valid_pipeline() {
        let spec = PipelineSpec::new("ok");
        assert!(validate_pipeline(&spec).is_empty());
        assert!(validate_columns(&spec, &create_test_schema()).is_empty());
    }

    #[test]
    fn test_missing_constant_reported_for_its_step() {
        let mut spec = PipelineSpec::new("bad").with_steps(["missing", "missing", "outliers"]);
        spec.missing_kwargs.categorical_method = CategoricalMethod::Constant;
        spec.outlier_kwargs.contamination = 0.9;

        let errors = validate_pipeline(&spec);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].step, Some(StepKind::Missing));
        assert_eq!(errors[1].step, Some(StepKind::Outliers));
    }

    #[test]
    fn test_config_of_unlisted_step_ignored() {
        let mut spec = PipelineSpec::new("x").with_steps(["duplicates"]);
        spec.outlier_kwargs.contamination = 0.9;
        assert!(validate_pipeline(&spec).is_empty());
    }

    #[test]
    fn test_columns_tracked_through_renaming() {
        let mut spec = PipelineSpec::new("x").with_steps(["inconsistent", "duplicates"]);
        spec.duplicate_kwargs.subset = Some(vec!["customer_id".to_owned()]);
        assert!(validate_columns(&spec, &create_test_schema()).is_empty());

        spec.duplicate_kwargs.subset = Some(vec!["Customer ID".to_owned()]);
        let errors = validate_columns(&spec, &create_test_schema());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Customer ID"));
    }

    #[test]
    fn test_dropped_column_cannot_be_used_later() {
        let mut spec = PipelineSpec::new("x").with_steps(["missing", "outliers"]);
        spec.missing_kwargs.strategy = MissingStrategy::Drop;
        spec.missing_kwargs.drop_specific_columns = vec!["age".to_owned()];
        spec.outlier_kwargs.columns = Some(vec!["age".to_owned()]);

        let errors = validate_columns(&spec, &create_test_schema());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].step, Some(StepKind::Outliers));
        assert_eq!(
            errors[0].to_string(),
            "Step 'outliers': column 'age' does not exist at this point"
        );
    }
}
