//! Portfolio risk metrics calculation.
//!
//! Provides VaR/ES (parametric and historical), buy-and-hold metrics, Sharpe
//! ratio, max drawdown, volatility and the rolling/cross-sectional views
//! used by the risk panel.
//!
//! Every function here is total: inputs too short or degenerate to say
//! anything produce NaN or `None`, never an error.

use crate::stats::{correlation, mean, quantile, rolling_std, std_dev};
use crate::types::{ReturnSeries, Series};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, ContinuousCDF, Normal};
use std::collections::BTreeMap;

/// Trading days per year.
pub const TRADING_DAYS: f64 = 252.0;

/// Standard normal quantiles used when the inverse CDF gives nothing usable.
const Z_TABLE: [(f64, f64); 3] = [(0.90, -1.2816), (0.95, -1.6449), (0.99, -2.3263)];

fn z_from_table(alpha: f64) -> f64 {
    let rounded = (alpha * 100.0).round() / 100.0;
    Z_TABLE
        .iter()
        .find(|(a, _)| (a - rounded).abs() < 1e-9)
        .map(|(_, z)| *z)
        .unwrap_or(-1.6449)
}

/// Calculate parametric (normal) Value at Risk and Expected Shortfall.
///
/// # Arguments
///
/// * `returns` - Daily returns (e.g., 0.01 for 1%)
/// * `alpha` - Confidence level (e.g., 0.95)
///
/// # Returns
///
/// `(var, es)` as positive fractions of value, clamped at zero. Both NaN
/// for empty input or a zero/non-finite standard deviation.
pub fn parametric_var_es(returns: &[f64], alpha: f64) -> (f64, f64) {
    if returns.is_empty() {
        return (f64::NAN, f64::NAN);
    }

    let mu = mean(returns);
    let sd = std_dev(returns);
    if !sd.is_finite() || sd == 0.0 {
        return (f64::NAN, f64::NAN);
    }

    let q = 1.0 - alpha;
    let normal = Normal::new(0.0, 1.0).ok().filter(|_| q > 0.0 && q < 1.0);
    let z = normal.as_ref().map(|n| n.inverse_cdf(q));

    let (var, es) = match (normal, z) {
        (Some(n), Some(z)) if z.is_finite() => {
            let var = -(mu + sd * z);
            let es = -(mu - sd * n.pdf(z) / q);
            (var, es)
        }
        _ => {
            let z = z_from_table(alpha);
            let var = -(mu + sd * z);
            (var, 1.25 * var)
        }
    };

    (var.max(0.0), es.max(0.0))
}

/// Calculate historical Value at Risk and Expected Shortfall.
///
/// VaR is the empirical `1 - alpha` quantile of returns; ES is the mean of
/// every return at or below it. Both reported as absolute values.
pub fn historical_var_es(returns: &[f64], alpha: f64) -> (f64, f64) {
    if returns.is_empty() {
        return (f64::NAN, f64::NAN);
    }

    let q = quantile(returns, 1.0 - alpha);
    let tail: Vec<f64> = returns.iter().copied().filter(|r| *r <= q).collect();
    (q.abs(), mean(&tail).abs())
}

/// Summary of a buy-and-hold equity curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuyHoldMetrics {
    /// Compound annual growth rate
    pub cagr: f64,
    /// Annualized volatility
    pub ann_vol: f64,
    /// Annualized Sharpe ratio (zero risk-free rate)
    pub sharpe: f64,
    /// Deepest peak-to-trough fall, as a non-positive fraction
    pub max_drawdown: f64,
}

/// Calculate buy-and-hold metrics from daily returns. `None` when empty.
pub fn buy_hold_metrics(returns: &[f64]) -> Option<BuyHoldMetrics> {
    if returns.is_empty() {
        return None;
    }

    let n = returns.len() as f64;
    let final_equity: f64 = returns.iter().map(|r| 1.0 + r).product();

    Some(BuyHoldMetrics {
        cagr: final_equity.powf(TRADING_DAYS / n) - 1.0,
        ann_vol: annualized_volatility(returns),
        sharpe: sharpe_ratio(returns),
        max_drawdown: max_drawdown(returns),
    })
}

/// Annualized volatility: sample standard deviation times sqrt(252).
pub fn annualized_volatility(returns: &[f64]) -> f64 {
    std_dev(returns) * TRADING_DAYS.sqrt()
}

/// Annualized Sharpe ratio with a zero risk-free rate.
///
/// NaN when the standard deviation is zero or undefined.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    let sd = std_dev(returns);
    if !sd.is_finite() || sd == 0.0 {
        return f64::NAN;
    }
    mean(returns) / sd * TRADING_DAYS.sqrt()
}

/// Calculate maximum drawdown from a series of returns.
///
/// Returns the minimum of `equity / running_max - 1`, so a 15% fall is
/// `-0.15`. Zero for an empty or monotonically rising series.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut equity = 1.0;
    let mut running_max = f64::NEG_INFINITY;
    let mut worst: f64 = 0.0;

    for r in returns {
        equity *= 1.0 + r;
        running_max = running_max.max(equity);
        worst = worst.min(equity / running_max - 1.0);
    }

    worst
}

/// Cumulative growth of the returns, indexed so the curve starts at `base`.
///
/// The first point is `base * (1 + r0)`, matching how the curves are drawn
/// from the first return date.
pub fn equity_curve(returns: &ReturnSeries, base: f64) -> Series {
    returns.compound(base)
}

/// Trailing annualized volatility over `window` returns.
///
/// Dates before the first full window are omitted.
pub fn rolling_volatility(returns: &ReturnSeries, window: usize) -> Series {
    let rolled = rolling_std(returns.values(), window);
    returns
        .dates()
        .iter()
        .zip(rolled)
        .filter(|(_, v)| v.is_finite())
        .map(|(d, v)| (*d, v * TRADING_DAYS.sqrt()))
        .collect()
}

/// Pairwise correlation of asset returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub symbols: Vec<String>,
    /// Row-major, `symbols.len()` squared entries; NaN where undefined
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.symbols.iter().position(|s| s == a)?;
        let j = self.symbols.iter().position(|s| s == b)?;
        Some(self.values[i][j])
    }
}

/// Correlation of each pair of assets' daily returns, restricted to `dates`
/// (normally the portfolio return dates).
///
/// Each pair uses the dates where both assets have a return.
pub fn correlation_matrix(
    price_map: &BTreeMap<String, Series>,
    dates: &[NaiveDate],
) -> CorrelationMatrix {
    let symbols: Vec<String> = price_map.keys().cloned().collect();
    let aligned: Vec<Vec<f64>> = price_map
        .values()
        .map(|prices| {
            let returns = prices.pct_change();
            dates
                .iter()
                .map(|d| returns.get(*d).unwrap_or(f64::NAN))
                .collect()
        })
        .collect();

    let values = aligned
        .iter()
        .map(|a| aligned.iter().map(|b| correlation(a, b)).collect())
        .collect();

    CorrelationMatrix { symbols, values }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn sample_returns() -> Vec<f64> {
        vec![
            0.01, -0.005, 0.008, -0.003, 0.012, -0.007, 0.005, 0.002, -0.004, 0.006, 0.003, -0.002,
            0.007, -0.001, 0.004,
        ]
    }

    #[test]
    fn test_parametric_var_es() {
        let returns = sample_returns();
        let (var, es) = parametric_var_es(&returns, 0.95);

        let mu = mean(&returns);
        let sd = std_dev(&returns);
        assert_relative_eq!(var, -(mu - 1.6448536269514729 * sd), epsilon = 1e-9);
        // ES sits deeper in the tail than VaR
        assert!(es > var);
    }

    #[test]
    fn test_parametric_degenerate() {
        let (var, es) = parametric_var_es(&[], 0.95);
        assert!(var.is_nan() && es.is_nan());

        let (var, es) = parametric_var_es(&[0.25, 0.25, 0.25], 0.95);
        assert!(var.is_nan() && es.is_nan());

        let (var, _) = parametric_var_es(&[0.01], 0.95);
        assert!(var.is_nan());
    }

    #[test]
    fn test_parametric_clamps_at_zero() {
        // Strongly positive drift: the 5% quantile is still a gain
        let returns = [0.10, 0.11, 0.10, 0.11];
        let (var, es) = parametric_var_es(&returns, 0.95);
        assert_eq!(var, 0.0);
        assert_eq!(es, 0.0);
    }

    #[test]
    fn test_parametric_table_fallback() {
        // alpha = 1 leaves no tail for the inverse CDF
        let returns = [-0.02, 0.01, -0.01, 0.02];
        let (var, es) = parametric_var_es(&returns, 1.0);
        let sd = std_dev(&returns);
        assert_relative_eq!(var, 1.6449 * sd, epsilon = 1e-12);
        assert_relative_eq!(es, 1.25 * var, epsilon = 1e-12);
        assert_eq!(z_from_table(0.899), -1.2816);
        assert_eq!(z_from_table(0.5), -1.6449);
    }

    #[test]
    fn test_historical_var_es() {
        let returns: Vec<f64> = (1..=20).map(|i| i as f64 / 100.0 - 0.10).collect();
        let (var, es) = historical_var_es(&returns, 0.95);

        // 0.05 * 19 = 0.95 of the way from -0.09 to -0.08
        assert_relative_eq!(var, 0.0805, epsilon = 1e-12);
        assert_relative_eq!(es, 0.09, epsilon = 1e-12);
        let (var, es) = historical_var_es(&[], 0.95);
        assert!(var.is_nan() && es.is_nan());
    }

    #[test]
    fn test_buy_hold_metrics() {
        assert!(buy_hold_metrics(&[]).is_none());

        let returns = vec![0.10, 0.05, -0.15, -0.10, 0.05];
        let metrics = buy_hold_metrics(&returns).unwrap();

        // Peak 1.155, trough 1.155 * 0.85 * 0.90
        assert_relative_eq!(metrics.max_drawdown, 0.85 * 0.90 - 1.0, epsilon = 1e-12);
        assert!(metrics.ann_vol > 0.0);
        assert!(metrics.cagr.is_finite());
    }

    #[test]
    fn test_sharpe_ratio() {
        let returns = sample_returns();
        let expected = mean(&returns) / std_dev(&returns) * 252.0_f64.sqrt();
        assert_relative_eq!(sharpe_ratio(&returns), expected);

        let flat: Vec<f64> = (0..100).map(|_| 0.125).collect();
        assert!(sharpe_ratio(&flat).is_nan());
        assert!(buy_hold_metrics(&flat).unwrap().sharpe.is_nan());
    }

    #[test]
    fn test_max_drawdown_no_loss() {
        assert_eq!(max_drawdown(&[0.01, 0.02, 0.03]), 0.0);
        assert_eq!(max_drawdown(&[]), 0.0);
        assert_relative_eq!(max_drawdown(&[0.1, -0.5, 0.2]), -0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_rolling_volatility() {
        let returns: Series = (1..=5)
            .map(|d| (day(d), if d % 2 == 0 { 0.01 } else { -0.01 }))
            .collect();
        let vol = rolling_volatility(&returns, 3);

        assert_eq!(vol.dates(), &[day(3), day(4), day(5)]);
        let expected = std_dev(&[-0.01, 0.01, -0.01]) * 252.0_f64.sqrt();
        assert_relative_eq!(vol.values()[0], expected, epsilon = 1e-12);
    }

    #[test]
    fn test_correlation_matrix() {
        let a: Series = vec![(day(1), 100.0), (day(2), 101.0), (day(3), 99.0), (day(4), 102.0)]
            .into_iter()
            .collect();
        let b: Series = a.iter().map(|(d, v)| (d, v * 2.0)).collect();
        let c: Series = vec![(day(1), 10.0), (day(2), 9.0), (day(3), 11.0), (day(4), 8.0)]
            .into_iter()
            .collect();

        let mut prices = BTreeMap::new();
        prices.insert("A".to_string(), a);
        prices.insert("B".to_string(), b);
        prices.insert("C".to_string(), c);

        let matrix = correlation_matrix(&prices, &[day(2), day(3), day(4)]);
        assert_eq!(matrix.symbols, vec!["A", "B", "C"]);
        assert_relative_eq!(matrix.get("A", "B").unwrap(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(matrix.get("C", "C").unwrap(), 1.0, epsilon = 1e-9);
        assert!(matrix.get("A", "C").unwrap() < 0.0);
        assert!(matrix.get("A", "Z").is_none());
    }

    #[test]
    fn test_equity_curve() {
        let returns: Series = vec![(day(2), 0.10), (day(3), -0.10)].into_iter().collect();
        let curve = equity_curve(&returns, 100.0);
        assert_relative_eq!(curve.values()[1], 99.0, epsilon = 1e-9);
    }
}
