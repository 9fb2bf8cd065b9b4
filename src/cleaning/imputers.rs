//! Joint imputation of numeric columns for the `advanced` missing-value strategy.
//!
//! Both fillers take the numeric block column-major (`columns[j][row]`) and
//! return it fully populated.

use crate::stats;
use linfa::prelude::*;
use linfa_linear::LinearRegression;
use ndarray::{Array1, Array2};

/// Output of a joint fill plus anything worth telling the caller.
#[derive(Debug, Clone, Default)]
pub struct ImputeOutcome {
    pub columns: Vec<Vec<f64>>,
    pub iterations: usize,
    pub converged: bool,
    pub notes: Vec<String>,
}

fn column_means(columns: &[Vec<Option<f64>>]) -> Vec<f64> {
    columns
        .iter()
        .map(|c| stats::mean(&c.iter().flatten().copied().collect::<Vec<_>>()).unwrap_or(0.0))
        .collect()
}

fn mean_filled(columns: &[Vec<Option<f64>>], means: &[f64]) -> Vec<Vec<f64>> {
    columns
        .iter()
        .zip(means)
        .map(|(c, m)| c.iter().map(|v| v.unwrap_or(*m)).collect())
        .collect()
}

/// Euclidean distance over the coordinates both rows have, scaled up by
/// `total / shared` so rows with fewer shared values are not favoured.
fn nan_euclidean(columns: &[Vec<Option<f64>>], a: usize, b: usize) -> Option<f64> {
    let mut sum = 0.0;
    let mut shared = 0usize;
    for col in columns {
        if let (Some(Some(x)), Some(Some(y))) = (col.get(a), col.get(b)) {
            sum += (x - y).powi(2);
            shared += 1;
        }
    }
    if shared == 0 {
        return None;
    }
    Some((columns.len() as f64 / shared as f64 * sum).sqrt())
}

/// Nearest-neighbour fill: each missing cell becomes the mean of that column
/// over the `k` closest rows that have it. Ties keep row order. A cell with no
/// usable neighbour takes the column mean.
pub fn knn_impute(columns: &[Vec<Option<f64>>], k: usize) -> ImputeOutcome {
    let means = column_means(columns);
    let mut filled = mean_filled(columns, &means);
    let rows = columns.first().map_or(0, Vec::len);
    let k = k.max(1);
    let mut fallbacks = 0usize;

    for row in 0..rows {
        let missing: Vec<usize> = (0..columns.len())
            .filter(|&j| matches!(columns[j].get(row), Some(None)))
            .collect();
        if missing.is_empty() {
            continue;
        }

        let mut neighbours: Vec<(usize, f64)> = (0..rows)
            .filter(|&other| other != row)
            .filter_map(|other| nan_euclidean(columns, row, other).map(|d| (other, d)))
            .collect();
        neighbours.sort_by(|a, b| a.1.total_cmp(&b.1));

        for j in missing {
            let donors: Vec<f64> = neighbours
                .iter()
                .filter_map(|(other, _)| columns[j].get(*other).copied().flatten())
                .take(k)
                .collect();
            match stats::mean(&donors) {
                Some(v) => filled[j][row] = v,
                None => fallbacks += 1,
            }
        }
    }

    let mut outcome = ImputeOutcome {
        columns: filled,
        iterations: 1,
        converged: true,
        notes: Vec::new(),
    };
    if fallbacks > 0 {
        outcome
            .notes
            .push(format!("{fallbacks} cells had no neighbour and took the column mean"));
    }
    outcome
}

fn design_matrix(filled: &[Vec<f64>], target: usize, rows: &[usize]) -> Array2<f64> {
    let features: Vec<&Vec<f64>> = filled
        .iter()
        .enumerate()
        .filter(|(j, _)| *j != target)
        .map(|(_, c)| c)
        .collect();
    Array2::from_shape_fn((rows.len(), features.len()), |(i, f)| {
        features[f][rows[i]]
    })
}

/// Round-robin regression fill.
///
/// Starts from the column means, then repeatedly regresses each incomplete
/// column on all the others (ascending by missing count) and overwrites its
/// missing cells with the predictions. Stops after `max_iter` rounds or once the
/// largest change in a round falls below `tol` times the largest observed
/// magnitude.
pub fn iterative_impute(columns: &[Vec<Option<f64>>], max_iter: usize, tol: f64) -> ImputeOutcome {
    let means = column_means(columns);
    let mut filled = mean_filled(columns, &means);
    let mut outcome = ImputeOutcome::default();

    if columns.len() < 2 {
        outcome
            .notes
            .push("fewer than two numeric columns; mean fill used".to_owned());
        outcome.columns = filled;
        return outcome;
    }

    let mut order: Vec<(usize, usize)> = columns
        .iter()
        .enumerate()
        .map(|(j, c)| (j, c.iter().filter(|v| v.is_none()).count()))
        .filter(|(_, missing)| *missing > 0)
        .collect();
    order.sort_by_key(|(_, missing)| *missing);

    let scale = columns
        .iter()
        .flatten()
        .flatten()
        .fold(0.0_f64, |m, v| m.max(v.abs()));
    let threshold = tol * scale;

    for iteration in 1..=max_iter.max(1) {
        let mut max_change = 0.0_f64;
        for &(j, _) in &order {
            let observed: Vec<usize> = (0..columns[j].len())
                .filter(|&r| columns[j][r].is_some())
                .collect();
            let missing: Vec<usize> = (0..columns[j].len())
                .filter(|&r| columns[j][r].is_none())
                .collect();
            if observed.len() < 2 {
                continue;
            }

            let y: Array1<f64> = observed.iter().filter_map(|&r| columns[j][r]).collect();
            let dataset = Dataset::new(design_matrix(&filled, j, &observed), y);
            let model = match LinearRegression::default().fit(&dataset) {
                Ok(model) => model,
                Err(e) => {
                    if iteration == 1 {
                        outcome
                            .notes
                            .push(format!("regression for column #{j} failed ({e}); mean fill kept"));
                    }
                    continue;
                }
            };

            let predictions = model.predict(&design_matrix(&filled, j, &missing));
            for (row, predicted) in missing.iter().zip(predictions.iter()) {
                if predicted.is_finite() {
                    max_change = max_change.max((predicted - filled[j][*row]).abs());
                    filled[j][*row] = *predicted;
                }
            }
        }

        outcome.iterations = iteration;
        if max_change < threshold {
            outcome.converged = true;
            break;
        }
    }

    tracing::debug!(
        iterations = outcome.iterations,
        converged = outcome.converged,
        "iterative imputation finished"
    );
    outcome.columns = filled;
    outcome
}
