use super::frame_of;
use crate::cleaning::quality::{assess_quality, quality_score};
use crate::frame::IS_OUTLIER;
use anyhow::Result;
use polars::prelude::*;
use proptest::prelude::*;

#[test]
fn test_score_formula() {
    assert!((quality_score(10.0, 5.0) - 75.0).abs() < 1e-12);
    assert!((quality_score(0.0, 0.0) - 100.0).abs() < 1e-12);
    assert!(quality_score(60.0, 0.0).abs() < 1e-12);
    assert!(quality_score(f64::NAN, 0.0).abs() < 1e-12);
}

#[test]
fn test_assessment_of_dataset() -> Result<()> {
    let df = frame_of(vec![
        Series::new("a".into(), vec![Some(1.0), Some(1.0), None, Some(4.0)]),
        Series::new("b".into(), vec!["x", "x", "y", "z"]),
    ])?;
    let quality = assess_quality(&df)?;
    // 1 of 8 cells missing, 1 of 4 rows repeats an earlier one
    assert!((quality.missing_percentage - 12.5).abs() < 1e-9);
    assert!((quality.duplicate_percentage - 25.0).abs() < 1e-9);
    assert!((quality.score - 50.0).abs() < 1e-9);
    assert_eq!(quality.risks.len(), 2);
    Ok(())
}

#[test]
fn test_helper_columns_do_not_change_the_score() -> Result<()> {
    let plain = frame_of(vec![Series::new("a".into(), vec![1.0, 2.0, 3.0])])?;
    let mut flagged = plain.clone();
    flagged.with_column(Series::new(IS_OUTLIER.into(), vec![false, false, true]))?;
    assert_eq!(assess_quality(&plain)?, assess_quality(&flagged)?);
    Ok(())
}

#[test]
fn test_empty_dataset_scores_full_marks() -> Result<()> {
    let quality = assess_quality(&DataFrame::empty())?;
    assert!((quality.score - 100.0).abs() < 1e-12);
    assert!(quality.risks.is_empty());
    Ok(())
}

proptest! {
    #[test]
    fn prop_score_stays_in_range(missing in 0.0f64..=100.0, duplicates in 0.0f64..=100.0) {
        let score = quality_score(missing, duplicates);
        prop_assert!((0.0..=100.0).contains(&score));
    }

    #[test]
    fn prop_assessed_score_stays_in_range(
        cells in prop::collection::vec(prop::option::of(0i32..3), 1..40),
    ) {
        let df = DataFrame::new(vec![Column::from(Series::new("v".into(), cells))]).unwrap();
        let quality = assess_quality(&df).unwrap();
        prop_assert!((0.0..=100.0).contains(&quality.score));
    }
}
