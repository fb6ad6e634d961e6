//! Gradient-boosted regression trees with squared-error and pinball loss,
//! and the quantile forecaster built on them.

use super::features::FeatureSet;
use super::ForecastStrategy;
use crate::stats::{mean, quantile};
use crate::types::{ForecastResult, Series};
use crate::{Error, Result};
use chrono::NaiveDate;

/// Loss minimised by the booster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Loss {
    SquaredError,
    /// Pinball loss at the given quantile.
    Quantile(f64),
}

impl Loss {
    fn initial(&self, y: &[f64]) -> f64 {
        match self {
            Loss::SquaredError => mean(y),
            Loss::Quantile(q) => quantile(y, *q),
        }
    }

    fn negative_gradient(&self, y: f64, fitted: f64) -> f64 {
        match self {
            Loss::SquaredError => y - fitted,
            Loss::Quantile(q) => {
                if y > fitted {
                    *q
                } else {
                    q - 1.0
                }
            }
        }
    }

    /// Leaf value minimising the loss over the residuals `y - fitted`.
    fn leaf_value(&self, residuals: &[f64]) -> f64 {
        match self {
            Loss::SquaredError => mean(residuals),
            Loss::Quantile(q) => quantile(residuals, *q),
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn predict(&self, row: &[f64]) -> f64 {
        match self {
            Node::Leaf(value) => *value,
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if row[*feature] <= *threshold {
                    left.predict(row)
                } else {
                    right.predict(row)
                }
            }
        }
    }
}

/// Best variance-reducing split of `idx` on `target`, if any.
fn best_split(x: &[Vec<f64>], target: &[f64], idx: &[usize]) -> Option<(usize, f64)> {
    let n = idx.len();
    if n < 2 {
        return None;
    }
    let width = x[idx[0]].len();
    let total: f64 = idx.iter().map(|&i| target[i]).sum();

    let mut best: Option<(usize, f64, f64)> = None;
    let mut order = idx.to_vec();

    for feature in 0..width {
        order.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

        let mut left_sum = 0.0;
        for split in 1..n {
            left_sum += target[order[split - 1]];
            let lo = x[order[split - 1]][feature];
            let hi = x[order[split]][feature];
            if lo == hi {
                continue;
            }

            let (nl, nr) = (split as f64, (n - split) as f64);
            let diff = left_sum / nl - (total - left_sum) / nr;
            let gain = nl * nr / (nl + nr) * diff * diff;

            if best.map_or(true, |(_, _, g)| gain > g) {
                // Between neighbouring floats the midpoint can round up to `hi`.
                let mid = lo + (hi - lo) / 2.0;
                let threshold = if mid < hi { mid } else { lo };
                best = Some((feature, threshold, gain));
            }
        }
    }

    best.filter(|(_, _, g)| *g > 0.0).map(|(f, t, _)| (f, t))
}

/// Grow a tree on `gradient`, with leaves set by `leaf` over the samples
/// that reach them.
fn grow<F>(x: &[Vec<f64>], gradient: &[f64], idx: Vec<usize>, depth: usize, leaf: &F) -> Node
where
    F: Fn(&[usize]) -> f64,
{
    if depth == 0 {
        return Node::Leaf(leaf(&idx));
    }
    let Some((feature, threshold)) = best_split(x, gradient, &idx) else {
        return Node::Leaf(leaf(&idx));
    };

    let (left, right): (Vec<usize>, Vec<usize>) =
        idx.into_iter().partition(|&i| x[i][feature] <= threshold);
    if left.is_empty() || right.is_empty() {
        let all: Vec<usize> = left.into_iter().chain(right).collect();
        return Node::Leaf(leaf(&all));
    }

    Node::Split {
        feature,
        threshold,
        left: Box::new(grow(x, gradient, left, depth - 1, leaf)),
        right: Box::new(grow(x, gradient, right, depth - 1, leaf)),
    }
}

/// Boosted ensemble of shallow regression trees.
#[derive(Debug, Clone)]
pub struct GradientBoostedTrees {
    loss: Loss,
    learning_rate: f64,
    init: f64,
    trees: Vec<Node>,
}

impl GradientBoostedTrees {
    pub const N_ESTIMATORS: usize = 100;
    pub const MAX_DEPTH: usize = 3;
    pub const LEARNING_RATE: f64 = 0.1;

    /// Fit with the default 100 trees of depth 3 and learning rate 0.1.
    pub fn fit(x: &[Vec<f64>], y: &[f64], loss: Loss) -> Result<Self> {
        Self::fit_with(x, y, loss, Self::N_ESTIMATORS, Self::MAX_DEPTH, Self::LEARNING_RATE)
    }

    pub fn fit_with(
        x: &[Vec<f64>],
        y: &[f64],
        loss: Loss,
        n_estimators: usize,
        max_depth: usize,
        learning_rate: f64,
    ) -> Result<Self> {
        if x.is_empty() || x.len() != y.len() {
            return Err(Error::ModelUnavailable(
                "Empty or mismatched training set".to_string(),
            ));
        }
        if y.iter().chain(x.iter().flatten()).any(|v| !v.is_finite()) {
            return Err(Error::ModelFailure(
                "Training data contains non-finite values".to_string(),
            ));
        }

        let init = loss.initial(y);
        let mut fitted = vec![init; y.len()];
        let mut trees = Vec::with_capacity(n_estimators);

        for _ in 0..n_estimators {
            let gradient: Vec<f64> = y
                .iter()
                .zip(&fitted)
                .map(|(yi, fi)| loss.negative_gradient(*yi, *fi))
                .collect();

            let leaf = |idx: &[usize]| {
                let residuals: Vec<f64> = idx.iter().map(|&i| y[i] - fitted[i]).collect();
                loss.leaf_value(&residuals)
            };
            let tree = grow(x, &gradient, (0..y.len()).collect(), max_depth, &leaf);

            for (row, f) in x.iter().zip(fitted.iter_mut()) {
                *f += learning_rate * tree.predict(row);
            }
            trees.push(tree);
        }

        Ok(Self {
            loss,
            learning_rate,
            init,
            trees,
        })
    }

    pub fn loss(&self) -> Loss {
        self.loss
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        self.init
            + self.learning_rate * self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
    }
}

/// Point model plus lower/upper quantile models over lag features.
///
/// The rollout feeds the point prediction back into `lag_1` for all three
/// models.
#[derive(Debug, Clone, Copy, Default)]
pub struct GbmQuantileStrategy;

impl ForecastStrategy for GbmQuantileStrategy {
    fn name(&self) -> &'static str {
        "gbm"
    }

    fn forecast(
        &self,
        series: &Series,
        future: &[NaiveDate],
        alpha: f64,
    ) -> Result<ForecastResult> {
        let features = FeatureSet::build(series);
        if features.is_empty() {
            return Err(Error::ModelUnavailable(format!(
                "{} points is too short for {} lags",
                series.len(),
                features.max_lag
            )));
        }

        let q_lo = (1.0 - alpha) / 2.0;
        let q_hi = 1.0 - q_lo;
        let fit = |loss| GradientBoostedTrees::fit(&features.rows, &features.targets, loss);
        let point = fit(Loss::SquaredError)?;
        let lower = fit(Loss::Quantile(q_lo))?;
        let upper = fit(Loss::Quantile(q_hi))?;

        let mut row = features
            .rollout_row(series)
            .ok_or_else(|| Error::ModelUnavailable("No rollout row".to_string()))?;

        let mut preds = Vec::with_capacity(future.len());
        let mut lo = Vec::with_capacity(future.len());
        let mut hi = Vec::with_capacity(future.len());
        for _ in future {
            let p = point.predict(&row);
            preds.push(p);
            lo.push(lower.predict(&row));
            hi.push(upper.predict(&row));
            features.advance(&mut row, p);
        }

        let pair = |values: Vec<f64>| -> Series { future.iter().copied().zip(values).collect() };
        Ok(ForecastResult {
            forecast: pair(preds),
            lower: Some(pair(lo)),
            upper: Some(pair(hi)),
            method: format!("GBM Quantile ({}%)", (alpha * 100.0).floor() as i64),
        })
    }
}
