use super::{floats, frame_of};
use crate::cleaning::normalize::{NormalisationMethod, NormalizeConfig, normalize_columns};
use anyhow::Result;
use polars::prelude::*;

#[test]
fn test_min_max_maps_to_unit_interval() -> Result<()> {
    let df = frame_of(vec![Series::new("v".into(), vec![Some(2.0), Some(4.0), None, Some(6.0)])])?;
    let config = NormalizeConfig {
        method: NormalisationMethod::MinMax,
        columns: None,
    };
    let (df, report) = normalize_columns(df, &config)?;
    assert_eq!(floats(&df, "v")?, vec![Some(0.0), Some(0.5), None, Some(1.0)]);
    assert_eq!(report.get("columns_normalized"), Some(&serde_json::json!(["v"])));
    Ok(())
}

#[test]
fn test_z_score_uses_sample_deviation() -> Result<()> {
    let df = frame_of(vec![Series::new("v".into(), vec![1.0, 2.0, 3.0])])?;
    let config = NormalizeConfig {
        method: NormalisationMethod::ZScore,
        columns: None,
    };
    let (df, _) = normalize_columns(df, &config)?;
    assert_eq!(floats(&df, "v")?, vec![Some(-1.0), Some(0.0), Some(1.0)]);
    Ok(())
}

#[test]
fn test_constant_column_skipped_with_note() -> Result<()> {
    let df = frame_of(vec![
        Series::new("flat".into(), vec![3.0, 3.0, 3.0]),
        Series::new("v".into(), vec![0.0, 5.0, 10.0]),
    ])?;
    let config = NormalizeConfig {
        method: NormalisationMethod::MinMax,
        columns: Some(vec!["flat".to_owned()]),
    };
    let (df, report) = normalize_columns(df, &config)?;
    assert_eq!(floats(&df, "flat")?, vec![Some(3.0); 3]);
    assert_eq!(floats(&df, "v")?, vec![Some(0.0), Some(5.0), Some(10.0)]);
    assert_eq!(report.notes().len(), 1);
    Ok(())
}

#[test]
fn test_text_column_cannot_be_normalized() {
    let df = frame_of(vec![Series::new("t".into(), vec!["a"])]).unwrap();
    let config = NormalizeConfig {
        method: NormalisationMethod::ZScore,
        columns: Some(vec!["t".to_owned()]),
    };
    assert!(normalize_columns(df, &config).unwrap_err().is_configuration());
}
