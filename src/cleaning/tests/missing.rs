use super::{floats, frame_of, names, texts};
use crate::cleaning::missing::{
    AdvancedMethod, CategoricalMethod, MissingConfig, MissingStrategy, NumericMethod,
    UNKNOWN_CATEGORY, handle_missing,
};
use crate::frame;
use anyhow::Result;
use polars::prelude::*;
use proptest::prelude::*;

#[test]
fn test_auto_picks_median_for_skewed_column() -> Result<()> {
    let mut values: Vec<Option<f64>> = vec![Some(1.0); 9];
    values.push(Some(1000.0));
    values.push(None);
    let df = frame_of(vec![Series::new("x".into(), values)])?;
    let config = MissingConfig {
        numeric_method: NumericMethod::Auto,
        skew_threshold: 1.0,
        ..MissingConfig::default()
    };
    let (df, report) = handle_missing(df, &config)?;

    assert_eq!(floats(&df, "x")?[10], Some(1.0));
    let column = &report.get("columns").unwrap()["x"];
    assert_eq!(column["method"], "median (skewness detected)");
    assert_eq!(column["fill_value"], 1.0);
    assert!(column["skewness"].as_f64().unwrap() > 1.0);
    Ok(())
}

#[test]
fn test_auto_skew_detection_ignores_value_scale() -> Result<()> {
    let mut values: Vec<Option<f64>> = vec![Some(1e-12); 9];
    values.push(Some(1e-9));
    values.push(None);
    let df = frame_of(vec![Series::new("x".into(), values)])?;
    let (df, report) = handle_missing(df, &MissingConfig::default())?;

    assert_eq!(floats(&df, "x")?[10], Some(1e-12));
    let column = &report.get("columns").unwrap()["x"];
    assert_eq!(column["method"], "median (skewness detected)");
    assert!(column["skewness"].as_f64().unwrap() > 3.0);
    Ok(())
}

#[test]
fn test_auto_picks_mean_for_symmetric_column() -> Result<()> {
    let df = frame_of(vec![Series::new(
        "x".into(),
        vec![Some(1.0), Some(2.0), None, Some(4.0), Some(5.0)],
    )])?;
    let (df, report) = handle_missing(df, &MissingConfig::default())?;
    assert_eq!(floats(&df, "x")?[2], Some(3.0));
    assert_eq!(
        report.get("columns").unwrap()["x"]["method"],
        "mean (approximately normal)"
    );
    Ok(())
}

#[test]
fn test_impute_leaves_no_missing_and_drops_empty_columns() -> Result<()> {
    let df = frame_of(vec![
        Series::new("a".into(), vec![Some(1.0), None, Some(3.0), Some(f64::NAN)]),
        Series::new("b".into(), vec![None::<f64>, None, None, None]),
        Series::new("c".into(), vec![Some("x"), None, Some("y"), Some("x")]),
        Series::new("d".into(), vec![Some(true), None, Some(true), Some(false)]),
    ])?;
    let (df, report) = handle_missing(df, &MissingConfig::default())?;

    assert_eq!(names(&df), vec!["a", "c", "d"]);
    assert_eq!(frame::total_missing(&df)?, 0);
    assert_eq!(
        report.get("dropped_100_missing_columns").unwrap(),
        &serde_json::json!(["b"])
    );
    assert_eq!(texts(&df, "c")?[1].as_deref(), Some("x"));
    assert_eq!(df.column("d")?.dtype(), &DataType::Boolean);
    assert!(report.get_f64("improvement").unwrap() > 0.0);
    Ok(())
}

#[test]
fn test_mode_ties_go_to_first_seen() -> Result<()> {
    let df = frame_of(vec![Series::new(
        "k".into(),
        vec![Some("y"), Some("x"), Some("x"), Some("y"), None],
    )])?;
    let (df, _) = handle_missing(df, &MissingConfig::default())?;
    assert_eq!(texts(&df, "k")?[4].as_deref(), Some("y"));
    Ok(())
}

#[test]
fn test_constant_and_unknown_categories() -> Result<()> {
    let df = frame_of(vec![Series::new("k".into(), vec![Some("a"), None])])?;
    let constant = MissingConfig {
        categorical_method: CategoricalMethod::Constant,
        constant_value: Some("n/a".to_owned()),
        ..MissingConfig::default()
    };
    let (filled, _) = handle_missing(df.clone(), &constant)?;
    assert_eq!(texts(&filled, "k")?[1].as_deref(), Some("n/a"));

    let unknown = MissingConfig {
        categorical_method: CategoricalMethod::Unknown,
        ..MissingConfig::default()
    };
    let (filled, _) = handle_missing(df, &unknown)?;
    assert_eq!(texts(&filled, "k")?[1].as_deref(), Some(UNKNOWN_CATEGORY));
    Ok(())
}

#[test]
fn test_unknown_category_added_to_categorical_column() -> Result<()> {
    let tier = Series::new("tier".into(), vec![Some("gold"), None, Some("gold")])
        .cast(&DataType::Categorical(None, Default::default()))?;
    let config = MissingConfig {
        categorical_method: CategoricalMethod::Unknown,
        ..MissingConfig::default()
    };
    let (filled, report) = handle_missing(frame_of(vec![tier])?, &config)?;

    assert!(matches!(filled.column("tier")?.dtype(), DataType::Categorical(_, _)));
    assert_eq!(texts(&filled, "tier")?[1].as_deref(), Some(UNKNOWN_CATEGORY));
    assert!(report.notes().is_empty());
    Ok(())
}

#[test]
fn test_constant_without_value_fails_before_mutation() {
    let df = frame_of(vec![Series::new("k".into(), vec![Some("a"), None])]).unwrap();
    let config = MissingConfig {
        categorical_method: CategoricalMethod::Constant,
        ..MissingConfig::default()
    };
    let err = handle_missing(df, &config).unwrap_err();
    assert!(err.is_configuration(), "unexpected error: {err}");
}

#[test]
fn test_missing_constant_ignored_outside_impute() -> Result<()> {
    let df = frame_of(vec![
        Series::new("k".into(), vec![Some("a"), None, Some("b")]),
        Series::new("x".into(), vec![Some(1.0), Some(2.0), Some(3.0)]),
    ])?;
    let config = MissingConfig {
        strategy: MissingStrategy::Drop,
        categorical_method: CategoricalMethod::Constant,
        numeric_method: NumericMethod::Constant,
        drop_specific_columns: vec!["k".to_owned()],
        ..MissingConfig::default()
    };
    config.validate()?;
    let (df, _) = handle_missing(df, &config)?;
    assert_eq!(names(&df), vec!["x"]);

    let advanced = MissingConfig {
        strategy: MissingStrategy::Advanced,
        ..config
    };
    assert!(advanced.validate().is_ok());
    Ok(())
}

#[test]
fn test_constant_fill_on_non_text_column_falls_back_to_mode_with_note() -> Result<()> {
    let df = frame_of(vec![Series::new(
        "flag".into(),
        vec![Some(true), None, Some(true), Some(false)],
    )])?;
    let config = MissingConfig {
        categorical_method: CategoricalMethod::Constant,
        constant_value: Some("n/a".to_owned()),
        ..MissingConfig::default()
    };
    let (df, report) = handle_missing(df, &config)?;

    assert_eq!(
        frame::series(&df, "flag")?.bool()?.get(1),
        Some(true)
    );
    assert_eq!(report.get("columns").unwrap()["flag"]["method"], "mode");
    let notes = report.notes();
    assert_eq!(notes.len(), 1);
    assert!(notes[0].contains("'flag'"), "unexpected note: {}", notes[0]);
    assert!(notes[0].contains("filled by mode"));
    Ok(())
}

#[test]
fn test_numeric_constant_fill() -> Result<()> {
    let df = frame_of(vec![Series::new("x".into(), vec![Some(1.0), None])])?;
    let config = MissingConfig {
        numeric_method: NumericMethod::Constant,
        numeric_constant: Some(-1.0),
        ..MissingConfig::default()
    };
    let (df, _) = handle_missing(df, &config)?;
    assert_eq!(floats(&df, "x")?, vec![Some(1.0), Some(-1.0)]);
    Ok(())
}

#[test]
fn test_drop_evaluates_columns_before_rows() -> Result<()> {
    let df = frame_of(vec![
        Series::new("a".into(), vec![Some(1.0), None, None, Some(4.0)]),
        Series::new("b".into(), vec![Some(1.0), Some(2.0), Some(3.0), None]),
        Series::new("c".into(), vec![1.0, 2.0, 3.0, 4.0]),
    ])?;
    let config = MissingConfig {
        strategy: MissingStrategy::Drop,
        drop_columns_threshold: 0.3,
        drop_rows_threshold: 0.4,
        ..MissingConfig::default()
    };
    let (df, report) = handle_missing(df, &config)?;

    // Row 3 is 1/3 missing against the original columns but 1/2 against b and c
    assert_eq!(names(&df), vec!["b", "c"]);
    assert_eq!(df.height(), 3);
    assert_eq!(report.get_u64("dropped_rows_count"), Some(1));
    Ok(())
}

#[test]
fn test_drop_specific_columns() -> Result<()> {
    let df = frame_of(vec![
        Series::new("a".into(), vec![Some(1.0), None]),
        Series::new("b".into(), vec![1.0, 2.0]),
    ])?;
    let config = MissingConfig {
        strategy: MissingStrategy::Drop,
        drop_specific_columns: vec!["b".to_owned()],
        ..MissingConfig::default()
    };
    let (out, _) = handle_missing(df.clone(), &config)?;
    assert_eq!(names(&out), vec!["a"]);

    let unknown = MissingConfig {
        drop_specific_columns: vec!["zzz".to_owned()],
        ..config
    };
    assert!(handle_missing(df, &unknown).unwrap_err().is_configuration());
    Ok(())
}

#[test]
fn test_advanced_fills_numeric_jointly_and_categories_by_mode() -> Result<()> {
    let df = frame_of(vec![
        Series::new("a".into(), vec![Some(1.0), Some(1.1), Some(10.0), Some(1.05)]),
        Series::new("b".into(), vec![Some(2.0), Some(2.2), Some(20.0), None]),
        Series::new("g".into(), vec![Some("u"), Some("u"), Some("v"), None]),
    ])?;
    let config = MissingConfig {
        strategy: MissingStrategy::Advanced,
        advanced_method: AdvancedMethod::Knn,
        knn_neighbors: 2,
        ..MissingConfig::default()
    };
    let (df, report) = handle_missing(df, &config)?;

    assert!((floats(&df, "b")?[3].unwrap() - 2.1).abs() < 1e-9);
    assert_eq!(texts(&df, "g")?[3].as_deref(), Some("u"));
    assert_eq!(report.get("columns").unwrap()["b"]["method"], "knn");
    assert_eq!(frame::total_missing(&df)?, 0);
    Ok(())
}

#[test]
fn test_advanced_iterative_converges() -> Result<()> {
    let a: Vec<Option<f64>> = (0..12).map(|i| Some(f64::from(i))).collect();
    let mut b: Vec<Option<f64>> = (0..12).map(|i| Some(3.0 * f64::from(i) - 2.0)).collect();
    b[5] = None;
    let df = frame_of(vec![Series::new("a".into(), a), Series::new("b".into(), b)])?;
    let config = MissingConfig {
        strategy: MissingStrategy::Advanced,
        advanced_method: AdvancedMethod::Iterative,
        ..MissingConfig::default()
    };
    let (df, report) = handle_missing(df, &config)?;
    assert!((floats(&df, "b")?[5].unwrap() - 13.0).abs() < 1e-6);
    assert_eq!(report.get("advanced_converged"), Some(&serde_json::json!(true)));
    Ok(())
}

#[test]
fn test_strategy_none_is_a_no_op() -> Result<()> {
    let df = frame_of(vec![
        Series::new("a".into(), vec![None::<f64>, None]),
        Series::new("b".into(), vec![Some("x"), None]),
    ])?;
    let config = MissingConfig {
        strategy: MissingStrategy::None,
        ..MissingConfig::default()
    };
    let (out, report) = handle_missing(df.clone(), &config)?;
    assert!(out.equals_missing(&df));
    assert!(report.is_skipped());
    Ok(())
}

#[test]
fn test_empty_dataset_gets_a_note() -> Result<()> {
    let df = frame_of(vec![Series::new("a".into(), Vec::<f64>::new())])?;
    let (out, report) = handle_missing(df, &MissingConfig::default())?;
    assert_eq!(out.height(), 0);
    assert_eq!(report.notes().len(), 1);
    Ok(())
}

fn numeric_methods() -> impl Strategy<Value = NumericMethod> {
    prop_oneof![
        Just(NumericMethod::Mean),
        Just(NumericMethod::Median),
        Just(NumericMethod::Auto),
        Just(NumericMethod::Constant),
    ]
}

fn categorical_methods() -> impl Strategy<Value = CategoricalMethod> {
    prop_oneof![
        Just(CategoricalMethod::Mode),
        Just(CategoricalMethod::Constant),
        Just(CategoricalMethod::Unknown),
    ]
}

fn random_frame() -> impl Strategy<Value = DataFrame> {
    (1usize..30).prop_flat_map(|rows| {
        (
            prop::collection::vec(prop::option::of(-1e6f64..1e6), rows),
            prop::collection::vec(prop::option::of(0i64..5), rows),
            prop::collection::vec(prop::option::of(prop::sample::select(vec!["a", "b", "c"])), rows),
            prop::collection::vec(prop::option::of(any::<bool>()), rows),
        )
            .prop_map(|(floats, ints, labels, flags)| {
                frame_of(vec![
                    Series::new("f".into(), floats),
                    Series::new("i".into(), ints),
                    Series::new("s".into(), labels),
                    Series::new("b".into(), flags),
                ])
                .unwrap()
            })
    })
}

proptest! {
    #[test]
    fn prop_impute_leaves_no_missing_in_retained_columns(
        df in random_frame(),
        numeric_method in numeric_methods(),
        categorical_method in categorical_methods(),
    ) {
        let config = MissingConfig {
            numeric_method,
            categorical_method,
            numeric_constant: Some(0.0),
            constant_value: Some("filled".to_owned()),
            ..MissingConfig::default()
        };
        let rows = df.height();
        let (out, _) = handle_missing(df, &config).unwrap();
        prop_assert_eq!(out.height(), rows);
        prop_assert_eq!(frame::total_missing(&out).unwrap(), 0);
    }
}
