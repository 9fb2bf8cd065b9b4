//! Duplicate rows: detection by equality on a column subset, then removal,
//! flagging or group marking.

use crate::error::{CleanError, Result};
use crate::frame::{self, DUPLICATE_GROUP_ID, IS_DUPLICATE};
use crate::report::{Shape, StepReport, round2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateMethod {
    #[default]
    Remove,
    Flag,
    Mark,
    None,
}

/// Which member of a duplicate group is *not* a duplicate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeepPolicy {
    #[default]
    First,
    Last,
    /// Every member of a group larger than one is a duplicate
    None,
}

impl std::str::FromStr for DuplicateMethod {
    type Err = CleanError;

    fn from_str(s: &str) -> Result<Self> {
        super::parse_option(s, "duplicate method")
    }
}

impl std::str::FromStr for KeepPolicy {
    type Err = CleanError;

    fn from_str(s: &str) -> Result<Self> {
        super::parse_option(s, "keep policy")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicateConfig {
    /// Columns compared for equality; all data columns when unset
    pub subset: Option<Vec<String>>,
    pub keep: KeepPolicy,
    pub method: DuplicateMethod,
}

impl DuplicateConfig {
    pub fn validate(&self) -> Result<()> {
        if matches!(&self.subset, Some(cols) if cols.is_empty()) {
            return Err(CleanError::config("subset must name at least one column"));
        }
        Ok(())
    }

    fn columns(&self, df: &DataFrame) -> Result<Vec<String>> {
        match &self.subset {
            Some(cols) => {
                let unknown: Vec<&String> = cols.iter().filter(|c| df.column(c).is_err()).collect();
                if unknown.is_empty() {
                    Ok(cols.clone())
                } else {
                    Err(CleanError::config(format!(
                        "duplicate subset columns not in dataset: {unknown:?}"
                    )))
                }
            }
            None => Ok(frame::column_names(df)
                .into_iter()
                .filter(|c| !frame::is_helper_column(c))
                .collect()),
        }
    }
}

/// Rows grouped by equal keys; groups are numbered in order of first appearance.
#[derive(Debug, Clone)]
pub struct DuplicateGroups {
    pub group_of_row: Vec<u32>,
    pub members: Vec<Vec<usize>>,
}

impl DuplicateGroups {
    pub fn of(df: &DataFrame, columns: &[String]) -> Result<Self> {
        let members = frame::row_groups(df, columns)?;
        let mut group_of_row = vec![0u32; df.height()];
        for (id, rows) in members.iter().enumerate() {
            for &row in rows {
                if let Some(slot) = group_of_row.get_mut(row) {
                    *slot = id as u32;
                }
            }
        }
        Ok(Self { group_of_row, members })
    }

    /// Per-row duplicate flags under `keep`.
    pub fn mask(&self, keep: KeepPolicy) -> Vec<bool> {
        let mut mask = vec![false; self.group_of_row.len()];
        for group in self.members.iter().filter(|g| g.len() > 1) {
            let survivor = match keep {
                KeepPolicy::First => group.first().copied(),
                KeepPolicy::Last => group.last().copied(),
                KeepPolicy::None => None,
            };
            for &row in group {
                if Some(row) != survivor {
                    if let Some(flag) = mask.get_mut(row) {
                        *flag = true;
                    }
                }
            }
        }
        mask
    }

    /// Groups with more than one member.
    pub fn duplicate_groups(&self) -> impl Iterator<Item = &Vec<usize>> {
        self.members.iter().filter(|g| g.len() > 1)
    }
}

/// Rows that repeat an earlier row across all data columns.
pub fn duplicate_rows(df: &DataFrame) -> Result<usize> {
    let columns: Vec<String> = frame::column_names(df)
        .into_iter()
        .filter(|c| !frame::is_helper_column(c))
        .collect();
    if df.height() == 0 || columns.is_empty() {
        return Ok(0);
    }
    let groups = DuplicateGroups::of(df, &columns)?;
    Ok(groups.mask(KeepPolicy::First).iter().filter(|d| **d).count())
}

/// Runs the duplicate step.
pub fn handle_duplicates(df: DataFrame, config: &DuplicateConfig) -> Result<(DataFrame, StepReport)> {
    config.validate()?;
    let columns = config.columns(&df)?;
    if config.method == DuplicateMethod::None {
        return Ok((
            df,
            StepReport::skipped("duplicate_handling", "Duplicate handling skipped (method = 'none')"),
        ));
    }

    let mut report = StepReport::new("duplicate_handling");
    match &config.subset {
        Some(cols) => report.set_serialized("subset_columns", cols)?,
        None => report.set("subset_columns", "all_columns"),
    }
    report.set("keep_strategy", super::option_name(&config.keep));
    report.set("action", super::option_name(&config.method));

    let initial = Shape::of(&df);
    if columns.is_empty() || df.height() == 0 {
        tracing::warn!("duplicate step received an empty dataset");
        report.note("dataset is empty; nothing to compare");
    }

    let groups = DuplicateGroups::of(&df, &columns)?;
    let mask = if columns.is_empty() {
        vec![false; df.height()]
    } else {
        groups.mask(config.keep)
    };
    let before = mask.iter().filter(|d| **d).count();
    let before_pct = if df.height() > 0 {
        before as f64 / df.height() as f64 * 100.0
    } else {
        0.0
    };
    report.set("duplicate_count_before", before);
    report.set("duplicate_percentage_before", round2(before_pct));

    let dup_groups: Vec<&Vec<usize>> = if columns.is_empty() {
        Vec::new()
    } else {
        groups.duplicate_groups().collect()
    };
    report.set("duplicate_groups", dup_groups.len());
    report.set(
        "max_duplicates_in_group",
        dup_groups.iter().map(|g| g.len()).max().unwrap_or(0),
    );

    let (df, after) = match config.method {
        DuplicateMethod::Remove => {
            let keep: Vec<bool> = mask.iter().map(|d| !d).collect();
            let cleaned = if before > 0 { frame::filter_rows(&df, &keep)? } else { df };
            let remaining = if columns.is_empty() {
                0
            } else {
                DuplicateGroups::of(&cleaned, &columns)?
                    .mask(KeepPolicy::None)
                    .iter()
                    .filter(|d| **d)
                    .count()
            };
            report.set("action_taken", "removed");
            report.set("rows_removed", initial.rows - cleaned.height());
            (cleaned, remaining)
        }
        DuplicateMethod::Flag => {
            let mut flagged = df;
            frame::put_column(&mut flagged, Series::new(IS_DUPLICATE.into(), mask))?;
            report.set("action_taken", "flagged");
            report.set("rows_flagged", before);
            (flagged, before)
        }
        DuplicateMethod::Mark => {
            let mut marked = df;
            frame::put_column(
                &mut marked,
                Series::new(DUPLICATE_GROUP_ID.into(), groups.group_of_row.clone()),
            )?;
            frame::put_column(&mut marked, Series::new(IS_DUPLICATE.into(), mask))?;
            report.set("action_taken", "marked_with_group_id");
            report.set("rows_marked", before);
            (marked, before)
        }
        DuplicateMethod::None => (df, before),
    };

    report.set("duplicate_count_after", after);
    report.set("duplicates_removed", before.saturating_sub(after));
    let improvement = if before > 0 {
        before.saturating_sub(after) as f64 / before as f64 * 100.0
    } else {
        0.0
    };
    report.set("improvement_percentage", round2(improvement));

    let final_shape = Shape::of(&df);
    report.set_serialized("final_shape", &final_shape)?;
    report.set(
        "shape_change",
        serde_json::json!({
            "rows_removed": initial.rows - final_shape.rows,
            "columns_added": final_shape.columns as i64 - initial.columns as i64,
        }),
    );

    tracing::info!(
        duplicates = before,
        groups = dup_groups.len(),
        rows = final_shape.rows,
        "duplicates handled"
    );
    Ok((df, report))
}
