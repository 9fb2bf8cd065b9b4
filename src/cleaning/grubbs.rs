//! Iterative two-sided Grubbs' test.

use crate::stats::{self, distribution};
use serde::{Deserialize, Serialize};

/// One point peeled off by the test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrubbsRemoval {
    pub iteration: usize,
    pub row: usize,
    pub value: f64,
    pub statistic: f64,
    pub critical_value: f64,
}

/// Peels outliers one at a time.
///
/// Each round recomputes the mean, sample standard deviation and critical value
/// on the points still in the sample, then removes the point furthest from the
/// mean if its statistic exceeds the critical value. Ties keep the earlier row.
/// Stops when nothing exceeds the critical value, the deviation is zero, or
/// fewer than three points remain.
///
/// `values` are `(row, value)` pairs; removed rows are returned in peel order.
pub fn iterative_grubbs(values: &[(usize, f64)], alpha: f64) -> Vec<GrubbsRemoval> {
    let mut working: Vec<(usize, f64)> = values.to_vec();
    let mut removed = Vec::new();

    while working.len() >= 3 {
        let sample: Vec<f64> = working.iter().map(|(_, v)| *v).collect();
        let (Some(mean), Some(std)) = (stats::mean(&sample), stats::std_dev(&sample)) else {
            break;
        };
        if std <= 0.0 {
            break;
        }

        let mut candidate: Option<(usize, f64)> = None;
        for (pos, (_, v)) in working.iter().enumerate() {
            let g = (v - mean).abs() / std;
            if candidate.is_none_or(|(_, best)| g > best) {
                candidate = Some((pos, g));
            }
        }
        let Some((pos, statistic)) = candidate else {
            break;
        };
        let Some(critical_value) = distribution::grubbs_critical_value(working.len(), alpha) else {
            break;
        };
        if statistic <= critical_value {
            break;
        }

        let (row, value) = working.remove(pos);
        tracing::debug!(row, value, statistic, critical_value, "grubbs removed a point");
        removed.push(GrubbsRemoval {
            iteration: removed.len() + 1,
            row,
            value,
            statistic,
            critical_value,
        });
    }

    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indexed(values: &[f64]) -> Vec<(usize, f64)> {
        values.iter().copied().enumerate().collect()
    }

    #[test]
    fn test_planted_value_is_the_only_removal() {
        let sample = [9.8, 10.1, 10.0, 9.9, 10.2, 10.05, 9.95, 10.15, 9.85, 50.0];
        let removed = iterative_grubbs(&indexed(&sample), 0.05);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].row, 9);
        assert!(removed[0].statistic > removed[0].critical_value);
    }

    #[test]
    fn test_peels_two_extremes_in_order() {
        let mut sample: Vec<f64> = (0..20).map(|i| 10.0 + f64::from(i % 5) * 0.1).collect();
        sample.push(100.0);
        sample.push(40.0);
        let removed = iterative_grubbs(&indexed(&sample), 0.05);
        let rows: Vec<usize> = removed.iter().map(|r| r.row).collect();
        assert_eq!(rows, vec![20, 21]);
    }

    #[test]
    fn test_small_or_constant_samples_are_left_alone() {
        assert!(iterative_grubbs(&indexed(&[1.0, 100.0]), 0.05).is_empty());
        assert!(iterative_grubbs(&indexed(&[5.0; 8]), 0.05).is_empty());
    }
}
