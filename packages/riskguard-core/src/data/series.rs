//! Daily close series: adjusted-close reconciliation and outlier repair.

use super::provider::PriceHistoryProvider;
use crate::stats::rolling_median_centered;
use crate::types::{DailyCloseSeries, PriceBar, PriceSeries, Series};
use std::borrow::Cow;

/// Gap-filling steps applied in order: carry the last value forward, then
/// carry the next value backward, then substitute a constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillPolicy {
    pub forward: bool,
    pub backward: bool,
    pub default: Option<f64>,
}

impl FillPolicy {
    /// Policy for adjustment factors: a bar with no usable factor borrows
    /// its neighbour's, and a series with none at all is unadjusted.
    pub const ADJUSTMENT_FACTOR: Self = Self {
        forward: true,
        backward: true,
        default: Some(1.0),
    };

    pub fn apply(&self, values: &[Option<f64>]) -> Vec<Option<f64>> {
        let mut out = values.to_vec();

        if self.forward {
            let mut carry = None;
            for slot in out.iter_mut() {
                match slot {
                    Some(v) => carry = Some(*v),
                    None => *slot = carry,
                }
            }
        }

        if self.backward {
            let mut carry = None;
            for slot in out.iter_mut().rev() {
                match slot {
                    Some(v) => carry = Some(*v),
                    None => *slot = carry,
                }
            }
        }

        if let Some(default) = self.default {
            for slot in out.iter_mut().filter(|s| s.is_none()) {
                *slot = Some(default);
            }
        }

        out
    }
}

/// Derive the adjusted daily close series from raw bars.
///
/// The ratio `adj_close / close` is taken per bar, gaps in the ratio are
/// filled with [`FillPolicy::ADJUSTMENT_FACTOR`], and close is scaled by
/// the result. This keeps a stale or zero vendor adjusted close from
/// opening a discontinuity. When no adjusted value survives the raw close
/// is used instead. Multiple bars on one day collapse to the last.
pub fn daily_close_from_raw(series: &PriceSeries) -> DailyCloseSeries {
    if series.is_empty() {
        return Series::new();
    }

    let mut bars: Vec<&PriceBar> = series.iter().collect();
    bars.sort_by_key(|bar| bar.timestamp);

    let ratios: Vec<Option<f64>> = bars
        .iter()
        .map(|bar| Some(bar.adj_close / bar.close).filter(|f| f.is_finite()))
        .collect();
    let factors = FillPolicy::ADJUSTMENT_FACTOR.apply(&ratios);

    let adjusted: Vec<_> = bars
        .iter()
        .zip(factors)
        .map(|(bar, factor)| (bar.date(), bar.close * factor.unwrap_or(1.0)))
        .filter(|(_, v)| v.is_finite())
        .collect();

    if !adjusted.is_empty() {
        return Series::from_pairs(adjusted);
    }

    Series::from_pairs(
        bars.iter()
            .map(|bar| (bar.date(), bar.close))
            .filter(|(_, v)| v.is_finite()),
    )
}

const MIN_POINTS: usize = 5;
const WINDOW: usize = 21;
const MIN_PERIODS: usize = 8;
const Z_THRESHOLD: f64 = 8.0;

/// Replace isolated one-day price glitches with the mean of their neighbours.
///
/// A return is flagged when it exceeds `max_jump` in absolute terms and
/// sits more than 8 robust z-scores (rolling median / MAD over a centered
/// 21-day window) from its neighbourhood. A price point is a glitch
/// candidate when its incoming and outgoing returns are both flagged with
/// opposite signs, or when it is the last point and its incoming return is
/// flagged. Only candidates whose neighbours are not candidates are patched.
///
/// A sustained move produces a single flagged return and is never touched,
/// and neither are two back-to-back glitches. When nothing is patched the
/// input is returned borrowed.
pub fn patch_outliers(series: &Series, max_jump: f64) -> Cow<'_, Series> {
    let n = series.len();
    if n < MIN_POINTS {
        return Cow::Borrowed(series);
    }

    let values = series.values();
    let returns: Vec<f64> = (0..n)
        .map(|i| {
            if i == 0 {
                f64::NAN
            } else {
                values[i] / values[i - 1] - 1.0
            }
        })
        .collect();

    // Short series cannot fill the minimum window; screen them with what exists.
    let valid = returns.iter().filter(|r| !r.is_nan()).count();
    let min_periods = MIN_PERIODS.min(valid).max(1);

    let med = rolling_median_centered(&returns, WINDOW, min_periods);
    let deviation: Vec<f64> = returns.iter().zip(&med).map(|(r, m)| (r - m).abs()).collect();
    let mad = rolling_median_centered(&deviation, WINDOW, min_periods);

    let flagged: Vec<bool> = (0..n)
        .map(|i| {
            let z = if mad[i] == 0.0 {
                f64::NAN
            } else {
                (returns[i] - med[i]) / mad[i]
            };
            returns[i].abs() > max_jump && z.abs() > Z_THRESHOLD
        })
        .collect();

    let candidate: Vec<bool> = (0..n)
        .map(|i| match i {
            0 => false,
            i if i == n - 1 => flagged[i],
            i => flagged[i] && flagged[i + 1] && returns[i] * returns[i + 1] < 0.0,
        })
        .collect();

    let isolated: Vec<usize> = (0..n)
        .filter(|&i| {
            candidate[i]
                && !(i > 0 && candidate[i - 1])
                && !(i + 1 < n && candidate[i + 1])
        })
        .collect();

    if isolated.is_empty() {
        return Cow::Borrowed(series);
    }

    tracing::debug!("Patching {} isolated outlier(s)", isolated.len());

    let mut patched = series.clone();
    let out = patched.values_mut();
    for i in isolated {
        let prev = (i > 0).then(|| values[i - 1]);
        let next = (i + 1 < n).then(|| values[i + 1]);
        out[i] = match (prev, next) {
            (Some(p), Some(q)) => (p + q) / 2.0,
            (Some(p), None) => p,
            (None, Some(q)) => q,
            (None, None) => values[i],
        };
    }
    Cow::Owned(patched)
}

/// Adjusted, glitch-repaired daily closes for `symbol`.
pub fn daily_price_series<P>(provider: &P, symbol: &str, max_jump: f64) -> DailyCloseSeries
where
    P: PriceHistoryProvider + ?Sized,
{
    let raw = provider.price_series(symbol);
    if raw.is_empty() {
        return Series::new();
    }
    let closes = daily_close_from_raw(&raw);
    patch_outliers(&closes, max_jump).into_owned()
}
