//! Integration tests for full cleaning runs
//!
//! These tests run complete pipelines on small in-memory datasets and check
//! the end-to-end results and reports.

#![expect(clippy::unwrap_used)]

use anyhow::Result;
use polars::prelude::*;
use std::path::PathBuf;
use tidyframe::CleanError;
use tidyframe::frame::IS_OUTLIER;
use tidyframe::pipeline::{DataCleaner, PipelineSpec, PipelineState, clean_all};

fn customers() -> Result<DataFrame> {
    Ok(df!(
        "Customer ID" => [1i64, 2, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
        "Name" => ["Ann", "Bob", "Bob", "Cy", "Di", "Ed", "Flo", "Gus", "Hal", "Ivy", "Jo", "Kim"],
        "Spend" => [
            Some(10.0), Some(12.0), Some(12.0), None, Some(11.0), Some(13.0),
            Some(9.0), Some(10.5), Some(12.5), Some(11.5), Some(10.0), Some(5000.0),
        ],
    )?)
}

fn column_f64(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = df.column(name)?.as_materialized_series().cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}

#[test]
fn test_all_none_round_trip() -> Result<()> {
    let spec = PipelineSpec::from_json(
        r#"{
            "steps": ["missing", "duplicates", "outliers", "inconsistent", "normalize"],
            "missing_kwargs": {"strategy": "none"},
            "duplicate_kwargs": {"method": "none"},
            "outlier_kwargs": {"method": "none"},
            "inconsistent_kwargs": {"strategy": "none"},
            "normalize_kwargs": {"method": "none"}
        }"#,
    )?;
    let input = customers()?;
    let output = clean_all(input.clone(), &spec)?;

    assert!(output.data.equals_missing(&input), "data should be untouched");
    assert_eq!(output.report.steps.len(), 5);
    assert!(output.report.all_skipped(), "every step should report skipped");

    let overall = output.report.overall_improvement.unwrap();
    assert_eq!(overall.initial_shape, overall.final_shape);
    assert_eq!(overall.rows_removed, 0);
    Ok(())
}

#[test]
fn test_default_pipeline_on_messy_customers() -> Result<()> {
    let output = clean_all(customers()?, &PipelineSpec::default())?;

    assert_eq!(
        output.report.order,
        vec!["missing", "duplicates", "outliers", "inconsistent"]
    );
    assert_eq!(output.data.height(), 11, "one repeated customer removed");

    let names: Vec<&str> = output
        .data
        .get_column_names()
        .into_iter()
        .map(|s| s.as_str())
        .collect();
    assert!(names.contains(&"customer_id"));
    assert!(names.contains(&"spend"));

    let flagged = output
        .data
        .column(IS_OUTLIER)?
        .as_materialized_series()
        .bool()?
        .into_iter()
        .filter(|f| *f == Some(true))
        .count();
    assert_eq!(flagged, 1, "only the 5000 spend is an outlier");

    let overall = output.report.overall_improvement.as_ref().unwrap();
    assert_eq!(overall.rows_removed, 1);
    assert!(overall.initial_missing_percentage > 0.0);
    assert!(overall.initial_duplicate_percentage > 0.0);
    assert!(overall.final_missing_percentage.abs() < f64::EPSILON);
    assert!((output.quality_score() - 100.0).abs() < f64::EPSILON);
    assert_eq!(overall.final_profile.rows, 11);
    assert_eq!(overall.final_profile.numeric["spend"].count, 11);
    assert_eq!(overall.final_profile.categorical["name"].num_unique, 11);

    let json = output.report.to_json()?;
    assert!(json.contains("\"overall_improvement\""));
    assert!(json.contains("\"final_profile\""));
    Ok(())
}

#[test]
fn test_unknown_step_is_skipped_not_fatal() -> Result<()> {
    let spec = PipelineSpec::new("typo").with_steps(["missing", "dedupe"]);
    let output = clean_all(customers()?, &spec)?;
    assert_eq!(output.report.skipped_steps, vec!["dedupe"]);
    assert_eq!(output.report.order, vec!["missing"]);
    Ok(())
}

#[test]
fn test_configuration_error_names_the_step() -> Result<()> {
    let spec = PipelineSpec::from_json(
        r#"{"steps": ["duplicates"], "duplicate_kwargs": {"subset": ["email"]}}"#,
    )?;
    let mut cleaner = DataCleaner::new(spec);
    let err = cleaner.clean_all(customers()?).unwrap_err();

    assert!(err.is_configuration(), "unexpected error: {err}");
    assert!(matches!(&err, CleanError::Step { step, .. } if step == "duplicates"));
    assert!(matches!(cleaner.state(), PipelineState::Failed { .. }));
    Ok(())
}

#[test]
fn test_spec_loaded_from_file() -> Result<()> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("customer_pipeline.json");
    let spec = PipelineSpec::from_file(&path)?;
    assert_eq!(spec.name, "Customer dedupe and scaling");

    let df = df!(
        "Customer ID" => [1i64, 1, 2],
        "Spend" => [10.0, 20.0, 30.0],
    )?;
    let output = clean_all(df, &spec)?;

    assert_eq!(output.data.height(), 2);
    assert_eq!(column_f64(&output.data, "spend")?, vec![Some(0.0), Some(1.0)]);
    Ok(())
}

#[test]
fn test_missing_spec_file_is_not_a_configuration_error() {
    let err = PipelineSpec::from_file("does/not/exist.json").unwrap_err();
    assert!(!err.is_configuration());
}
