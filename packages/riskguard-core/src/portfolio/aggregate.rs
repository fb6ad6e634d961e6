//! Weighted portfolio returns with a coverage gate, and worst-window stats.

use crate::stats::argmin;
use crate::types::{ReturnSeries, Series};
use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Combine per-symbol daily closes into one portfolio return series.
///
/// Each symbol contributes its own day-over-day returns. On every date of
/// the union, the return is the weight-averaged return of the symbols that
/// actually traded, with weights renormalised to those symbols. When the
/// total weight is positive, dates where the traded weight is below
/// `min_coverage` of the total are dropped. Symbols missing from
/// `weights` count as weight zero.
pub fn portfolio_returns(
    price_map: &BTreeMap<String, Series>,
    weights: &HashMap<String, f64>,
    min_coverage: f64,
) -> ReturnSeries {
    let returns: Vec<(ReturnSeries, f64)> = price_map
        .iter()
        .filter(|(_, prices)| prices.len() > 1)
        .map(|(symbol, prices)| {
            let weight = weights.get(symbol).copied().unwrap_or(0.0);
            (prices.pct_change(), weight)
        })
        .collect();

    if returns.is_empty() {
        return Series::new();
    }

    let total_weight: f64 = returns.iter().map(|(_, w)| w).sum();
    let gate = total_weight.is_finite() && total_weight > 0.0;

    let dates: BTreeSet<NaiveDate> = returns
        .iter()
        .flat_map(|(r, _)| r.dates().iter().copied())
        .collect();

    dates
        .into_iter()
        .filter_map(|date| {
            let traded: Vec<(f64, f64)> = returns
                .iter()
                .filter(|(_, w)| *w != 0.0)
                .filter_map(|(r, w)| r.get(date).map(|v| (v, *w)))
                .collect();
            let in_play: f64 = traded.iter().map(|(_, w)| w).sum();

            if in_play == 0.0 {
                return None;
            }
            if gate && in_play / total_weight < min_coverage {
                return None;
            }

            // A lone symbol passes its return through untouched.
            let value = match traded.as_slice() {
                [(v, _)] => *v,
                _ => traded.iter().map(|(v, w)| v * w).sum::<f64>() / in_play,
            };
            value.is_finite().then_some((date, value))
        })
        .collect()
}

/// The worst compounded return over any run of consecutive observations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorstWindow {
    pub window_days: usize,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Compounded return over the window (e.g. -0.12)
    pub ret: f64,
}

/// Find the `window`-observation stretch with the lowest compounded return.
///
/// `None` with fewer than `window + 1` observations. Ties resolve to the
/// earliest window; the start date is `window - 1` business days before the
/// end.
pub fn worst_window_stats(returns: &Series, window: usize) -> Option<WorstWindow> {
    if window == 0 || returns.len() < window + 1 {
        return None;
    }

    let compounded: Vec<f64> = returns
        .values()
        .windows(window)
        .map(|w| w.iter().map(|r| 1.0 + r).product::<f64>() - 1.0)
        .collect();

    let idx = argmin(&compounded)?;
    let end = returns.dates()[idx + window - 1];

    Some(WorstWindow {
        window_days: window,
        start: business_days_before(end, window - 1),
        end,
        ret: compounded[idx],
    })
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Step back `n` Monday-to-Friday days. From a weekend the first step lands
/// on the preceding Friday.
pub fn business_days_before(date: NaiveDate, n: usize) -> NaiveDate {
    let mut current = date;
    for _ in 0..n {
        current = current - Days::new(1);
        while is_weekend(current) {
            current = current - Days::new(1);
        }
    }
    current
}
