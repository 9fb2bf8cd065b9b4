//! Final data-quality score.

use super::profile::{DatasetProfile, profile_dataset};
use crate::error::Result;
use crate::frame;
use crate::report::round2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Columns missing more than this share (percent) are called out as risks.
const COLUMN_MISSING_RISK: f64 = 15.0;

/// Weighted-penalty score: `100 - 2 * missing% - duplicate%`, clamped to `[0, 100]`.
pub fn quality_score(missing_percentage: f64, duplicate_percentage: f64) -> f64 {
    let score = 100.0 - 2.0 * missing_percentage - duplicate_percentage;
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 100.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub score: f64,
    pub missing_percentage: f64,
    pub duplicate_percentage: f64,
    pub risks: Vec<String>,
    pub profile: DatasetProfile,
}

/// Scores a dataset, lists what holds the score down and profiles its columns.
///
/// Helper columns added by earlier steps are ignored, so flagging duplicates or
/// outliers does not change the score.
pub fn assess_quality(df: &DataFrame) -> Result<QualityAssessment> {
    let data_columns: Vec<String> = frame::column_names(df)
        .into_iter()
        .filter(|c| !frame::is_helper_column(c))
        .collect();
    let data = df.select(data_columns)?;

    let missing_percentage = frame::missing_percentage(&data)?;
    let profile = profile_dataset(&data)?;
    let duplicate_percentage = if data.height() == 0 {
        0.0
    } else {
        profile.duplicate_rows as f64 / data.height() as f64 * 100.0
    };

    let mut risks = Vec::new();
    if data.height() > 0 {
        for name in frame::column_names(&data) {
            let missing = profile.missing_values.get(&name).copied().unwrap_or_default();
            let pct = missing as f64 / data.height() as f64 * 100.0;
            if pct > COLUMN_MISSING_RISK {
                risks.push(format!(
                    "Column '{name}' has significant missing data ({pct:.1}%)."
                ));
            }
        }
    }
    if duplicate_percentage > 0.0 {
        risks.push(format!(
            "{duplicate_percentage:.1}% of rows repeat an earlier row."
        ));
    }

    let score = quality_score(missing_percentage, duplicate_percentage);
    tracing::debug!(score, missing_percentage, duplicate_percentage, "quality assessed");
    Ok(QualityAssessment {
        score: round2(score),
        missing_percentage: round2(missing_percentage),
        duplicate_percentage: round2(duplicate_percentage),
        risks,
        profile,
    })
}
