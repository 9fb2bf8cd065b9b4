//! Column-name normalisation.
//!
//! Every name goes through the same pipeline: strip surrounding whitespace,
//! fold case (lower by default, upper when asked), replace characters outside `[A-Za-z0-9_-]`, collapse runs of
//! spaces and underscores, trim underscores at both ends, truncate, then wrap in
//! the configured prefix and suffix. Collisions get `_<n>` appended to the core
//! name (before the suffix) so the result is stable when cleaned again.

use crate::error::{CleanError, Result};
use crate::report::StepReport;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Name used when cleaning leaves nothing behind.
const EMPTY_NAME: &str = "col";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NameConfig {
    pub lowercase: bool,
    /// Takes precedence over `lowercase`
    pub uppercase: bool,
    pub replace_spaces: bool,
    pub replace_special: bool,
    pub ensure_unique: bool,
    pub max_length: Option<usize>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
}

impl Default for NameConfig {
    fn default() -> Self {
        Self {
            lowercase: true,
            uppercase: false,
            replace_spaces: true,
            replace_special: true,
            ensure_unique: true,
            max_length: None,
            prefix: None,
            suffix: None,
        }
    }
}

impl NameConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_length == Some(0) {
            return Err(CleanError::config("max_length must be at least 1"));
        }
        Ok(())
    }

    fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or_default()
    }

    fn suffix(&self) -> &str {
        self.suffix.as_deref().unwrap_or_default()
    }

    fn truncate(&self, name: &str, reserve: usize) -> String {
        match self.max_length {
            Some(max) if name.chars().count() + reserve > max => {
                let keep = max.saturating_sub(reserve).max(1);
                let cut: String = name.chars().take(keep).collect();
                cut.trim_matches(|c: char| c == '_' || c.is_whitespace())
                    .to_owned()
            }
            _ => name.to_owned(),
        }
    }
}

/// One name that collided with an earlier one and was renamed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateFix {
    pub original: String,
    pub duplicate_of: String,
    pub renamed_to: String,
}

/// Result of cleaning a list of names.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameMapping {
    pub original: Vec<String>,
    pub cleaned: Vec<String>,
    /// `"old -> new"` for every name that changed
    pub changes_made: Vec<String>,
    pub duplicates_fixed: Vec<DuplicateFix>,
}

impl NameMapping {
    pub fn is_unchanged(&self) -> bool {
        self.changes_made.is_empty() && self.duplicates_fixed.is_empty()
    }

    pub fn cleaned_name(&self, original: &str) -> Option<&str> {
        self.original
            .iter()
            .position(|o| o == original)
            .and_then(|i| self.cleaned.get(i))
            .map(String::as_str)
    }
}

fn is_kept(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Replaces characters outside `[A-Za-z0-9_-]`; whitespace is left for the
/// separator pass when `keep_spaces` is set.
fn replace_special(name: &str, keep_spaces: bool) -> String {
    name.chars()
        .map(|c| {
            if is_kept(c) || (keep_spaces && c.is_whitespace()) {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Collapses runs of spaces and underscores into one underscore.
fn collapse_separators(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut last_was_separator = false;
    for c in name.chars() {
        if c == '_' || c.is_whitespace() {
            if !last_was_separator {
                result.push('_');
                last_was_separator = true;
            }
        } else {
            result.push(c);
            last_was_separator = false;
        }
    }
    result
}

/// Core of a name: everything between the prefix and the suffix, cleaned.
fn clean_core(name: &str, config: &NameConfig) -> String {
    let mut core = name;
    if !config.prefix().is_empty() {
        core = core.strip_prefix(config.prefix()).unwrap_or(core);
    }
    if !config.suffix().is_empty() {
        core = core.strip_suffix(config.suffix()).unwrap_or(core);
    }

    let mut clean = core.trim().to_owned();
    if config.uppercase {
        clean = clean.to_uppercase();
    } else if config.lowercase {
        clean = clean.to_lowercase();
    }
    if config.replace_special {
        clean = replace_special(&clean, config.replace_spaces);
    }
    if config.replace_spaces {
        clean = collapse_separators(&clean);
    }
    if config.replace_spaces || config.replace_special {
        clean = clean.trim_matches('_').to_owned();
    }
    clean = config.truncate(&clean, 0);
    if clean.is_empty() {
        EMPTY_NAME.to_owned()
    } else {
        clean
    }
}

/// Cleans `names` and resolves collisions.
///
/// # Errors
///
/// Fails with a configuration error when `ensure_unique` is off and two
/// cleaned names collide, since a dataset cannot hold both.
pub fn clean_names(names: &[String], config: &NameConfig) -> Result<NameMapping> {
    config.validate()?;
    let cores: Vec<String> = names.iter().map(|n| clean_core(n, config)).collect();

    let mut used: HashSet<String> = HashSet::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut mapping = NameMapping::default();

    for (original, core) in names.iter().zip(cores) {
        let wrap = |c: &str| format!("{}{c}{}", config.prefix(), config.suffix());
        let mut final_core = core.clone();

        if used.contains(&core) {
            if !config.ensure_unique {
                return Err(CleanError::config(format!(
                    "cleaned column name '{}' is not unique and ensure_unique is off",
                    wrap(&core)
                )));
            }
            let count = seen.entry(core.clone()).or_insert(0);
            loop {
                *count += 1;
                let tag = format!("_{count}");
                let candidate = format!("{}{tag}", config.truncate(&core, tag.len()));
                if !used.contains(&candidate) {
                    final_core = candidate;
                    break;
                }
            }
            mapping.duplicates_fixed.push(DuplicateFix {
                original: original.clone(),
                duplicate_of: wrap(&core),
                renamed_to: wrap(&final_core),
            });
        }

        used.insert(final_core.clone());
        let cleaned = wrap(&final_core);
        if cleaned != *original {
            mapping.changes_made.push(format!("{original} -> {cleaned}"));
        }
        mapping.original.push(original.clone());
        mapping.cleaned.push(cleaned);
    }

    Ok(mapping)
}

/// Renames the dataset's columns; returns the frame and the mapping applied.
pub fn rename_columns(df: DataFrame, config: &NameConfig) -> Result<(DataFrame, NameMapping)> {
    let names = crate::frame::column_names(&df);
    let mapping = clean_names(&names, config)?;
    if mapping.is_unchanged() {
        return Ok((df, mapping));
    }

    let columns: Vec<Column> = df
        .get_columns()
        .iter()
        .zip(&mapping.cleaned)
        .map(|(c, name)| {
            Column::from(
                c.as_materialized_series()
                    .clone()
                    .with_name(name.as_str().into()),
            )
        })
        .collect();
    tracing::debug!(
        changed = mapping.changes_made.len(),
        duplicates = mapping.duplicates_fixed.len(),
        "column names cleaned"
    );
    Ok((DataFrame::new(columns)?, mapping))
}

pub fn mapping_report(mapping: &NameMapping, config: &NameConfig) -> Result<StepReport> {
    let mut report = StepReport::new("column_name_cleaning");
    report.set("total_columns", mapping.original.len());
    report.set("columns_changed", mapping.changes_made.len());
    let original_to_cleaned: serde_json::Map<String, serde_json::Value> = mapping
        .original
        .iter()
        .zip(&mapping.cleaned)
        .map(|(o, c)| (o.clone(), serde_json::Value::String(c.clone())))
        .collect();
    report.set("original_to_cleaned", original_to_cleaned);
    report.set_serialized("changes_made", &mapping.changes_made)?;
    report.set_serialized("duplicates_fixed", &mapping.duplicates_fixed)?;
    report.set_serialized("settings", config)?;
    Ok(report)
}

/// Renames the dataset's columns and reports the mapping.
pub fn clean_column_names(df: DataFrame, config: &NameConfig) -> Result<(DataFrame, StepReport)> {
    let (df, mapping) = rename_columns(df, config)?;
    let report = mapping_report(&mapping, config)?;
    Ok((df, report))
}
