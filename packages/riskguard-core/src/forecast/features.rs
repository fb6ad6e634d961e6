//! Lag, rolling and calendar features for the boosted-tree forecaster.

use crate::stats::{mean, std_dev};
use crate::types::Series;
use chrono::{Datelike, NaiveDate};

/// Rolling windows considered for mean/std features.
pub const ROLLING_WINDOWS: [usize; 3] = [5, 10, 20];

/// Number of lag features for a history of `n` points: `min(30, max(5, n/4))`.
pub fn max_lag_for(n: usize) -> usize {
    (n / 4).clamp(5, 30)
}

/// Supervised training set built from one series.
///
/// Columns are laid out as `lag_1..lag_L`, then `(mean_w, std_w)` for each
/// included window, then day-of-week (Monday = 0), day-of-month and month.
/// Rolling statistics at row `t` use the `w` observations before `t`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    pub max_lag: usize,
    pub windows: Vec<usize>,
    pub rows: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

impl FeatureSet {
    /// Build the training rows for `series`.
    ///
    /// A window is included only when `n > w + max_lag`. Rows that would
    /// need observations before the start of the series are left out, so
    /// the set is empty for short histories.
    pub fn build(series: &Series) -> Self {
        let values = series.values();
        let n = values.len();
        let max_lag = max_lag_for(n);
        let windows: Vec<usize> = ROLLING_WINDOWS
            .iter()
            .copied()
            .filter(|w| n > w + max_lag)
            .collect();

        let first = windows.iter().copied().fold(max_lag, usize::max);
        let (rows, targets) = (first..n)
            .map(|t| {
                let row = feature_row(values, t, max_lag, &windows, series.dates()[t]);
                (row, values[t])
            })
            .unzip();

        Self {
            max_lag,
            windows,
            rows,
            targets,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Width of a feature row.
    pub fn width(&self) -> usize {
        self.max_lag + 2 * self.windows.len() + 3
    }

    /// Feature row for the first step past the end of `series`.
    ///
    /// Lags come from the final observations; rolling and calendar
    /// features describe the last observed day and are held fixed for the
    /// rest of the rollout.
    pub fn rollout_row(&self, series: &Series) -> Option<Vec<f64>> {
        let (last_date, _) = series.last()?;
        let n = series.len();
        if n < self.max_lag {
            return None;
        }
        Some(feature_row(
            series.values(),
            n,
            self.max_lag,
            &self.windows,
            last_date,
        ))
    }

    /// Shift the lag block one step and place `prediction` in `lag_1`.
    pub fn advance(&self, row: &mut [f64], prediction: f64) {
        row[..self.max_lag].rotate_right(1);
        row[0] = prediction;
    }
}

/// Features describing the target at position `t` (which may be one past
/// the end of `values`).
fn feature_row(
    values: &[f64],
    t: usize,
    max_lag: usize,
    windows: &[usize],
    date: NaiveDate,
) -> Vec<f64> {
    let mut row = Vec::with_capacity(max_lag + 2 * windows.len() + 3);
    row.extend((1..=max_lag).map(|k| values[t - k]));
    for &w in windows {
        let window = &values[t - w..t];
        row.push(mean(window));
        row.push(std_dev(window));
    }
    row.push(date.weekday().num_days_from_monday() as f64);
    row.push(date.day() as f64);
    row.push(date.month() as f64);
    row
}
