use super::{frame_of, names};
use crate::cleaning::schema::{NameConfig, clean_column_names, clean_names};
use anyhow::Result;
use polars::prelude::*;
use proptest::prelude::*;

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| (*n).to_owned()).collect()
}

#[test]
fn test_names_are_normalised() -> Result<()> {
    let mapping = clean_names(
        &owned(&[" First Name ", "Last-Name", "Email@Address", "Total  Sales ($)"]),
        &NameConfig::default(),
    )?;
    assert_eq!(mapping.cleaned, vec!["first_name", "last-name", "email_address", "total_sales"]);
    assert_eq!(mapping.changes_made.len(), 4);
    assert!(mapping.duplicates_fixed.is_empty());
    Ok(())
}

#[test]
fn test_uppercase_names() -> Result<()> {
    let config = NameConfig {
        uppercase: true,
        ..NameConfig::default()
    };
    let mapping = clean_names(&owned(&["First Name", "first name", "id"]), &config)?;
    assert_eq!(mapping.cleaned, vec!["FIRST_NAME", "FIRST_NAME_1", "ID"]);
    Ok(())
}

#[test]
fn test_collisions_get_occurrence_suffix() -> Result<()> {
    let mapping = clean_names(&owned(&["Name", "name", "NAME "]), &NameConfig::default())?;
    assert_eq!(mapping.cleaned, vec!["name", "name_1", "name_2"]);
    assert_eq!(mapping.duplicates_fixed.len(), 2);
    assert_eq!(mapping.duplicates_fixed[1].renamed_to, "name_2");
    assert_eq!(mapping.duplicates_fixed[1].duplicate_of, "name");
    Ok(())
}

#[test]
fn test_suffix_skips_names_already_taken() -> Result<()> {
    let mapping = clean_names(&owned(&["a_1", "a", "A"]), &NameConfig::default())?;
    assert_eq!(mapping.cleaned, vec!["a_1", "a", "a_2"]);
    Ok(())
}

#[test]
fn test_second_pass_changes_nothing() -> Result<()> {
    let config = NameConfig {
        max_length: Some(8),
        prefix: Some("p_".to_owned()),
        ..NameConfig::default()
    };
    let first = clean_names(
        &owned(&["Customer Identifier", "customer identifier", "x", "  "]),
        &config,
    )?;
    assert!(first.cleaned.iter().all(|n| n.starts_with("p_")));
    let second = clean_names(&first.cleaned, &config)?;
    assert!(second.is_unchanged(), "second pass changed: {:?}", second.changes_made);
    assert_eq!(second.cleaned, first.cleaned);
    Ok(())
}

#[test]
fn test_truncation_leaves_room_for_suffix() -> Result<()> {
    let config = NameConfig {
        max_length: Some(5),
        ..NameConfig::default()
    };
    let mapping = clean_names(&owned(&["abcdefgh", "abcdefgh"]), &config)?;
    assert_eq!(mapping.cleaned, vec!["abcde", "abc_1"]);
    Ok(())
}

#[test]
fn test_empty_name_gets_placeholder() -> Result<()> {
    let mapping = clean_names(&owned(&["???", ""]), &NameConfig::default())?;
    assert_eq!(mapping.cleaned, vec!["col", "col_1"]);
    Ok(())
}

#[test]
fn test_collision_without_ensure_unique_fails() {
    let config = NameConfig {
        ensure_unique: false,
        ..NameConfig::default()
    };
    let err = clean_names(&owned(&["A", "a"]), &config).unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn test_zero_max_length_is_rejected() {
    let config = NameConfig {
        max_length: Some(0),
        ..NameConfig::default()
    };
    assert!(clean_names(&owned(&["a"]), &config).is_err());
}

#[test]
fn test_dataset_columns_renamed_with_report() -> Result<()> {
    let df = frame_of(vec![
        Series::new("Order ID".into(), vec![1, 2]),
        Series::new("order_id".into(), vec![3, 4]),
    ])?;
    let (df, report) = clean_column_names(df, &NameConfig::default())?;
    assert_eq!(names(&df), vec!["order_id", "order_id_1"]);
    assert_eq!(report.get_u64("columns_changed"), Some(2));
    assert_eq!(report.get_u64("total_columns"), Some(2));

    let (again, report) = clean_column_names(df.clone(), &NameConfig::default())?;
    assert_eq!(names(&again), names(&df));
    assert_eq!(report.get_u64("columns_changed"), Some(0));
    Ok(())
}

proptest! {
    #[test]
    fn prop_name_cleaning_is_idempotent(
        raw in prop::collection::vec("[ A-Za-z0-9_#$.-]{0,12}", 1..8),
        max_length in prop::option::of(4usize..16),
    ) {
        let config = NameConfig { max_length, ..NameConfig::default() };
        let first = clean_names(&raw, &config).unwrap();
        let second = clean_names(&first.cleaned, &config).unwrap();
        prop_assert!(second.is_unchanged());
        prop_assert_eq!(second.cleaned, first.cleaned);
    }
}
