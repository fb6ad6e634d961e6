//! Buy-and-hold backtest of the current weights against a benchmark.

use super::Holdings;
use crate::config::EngineConfig;
use crate::data::{daily_price_series, PriceHistoryProvider};
use crate::portfolio::{buy_hold_metrics, equity_curve, BuyHoldMetrics, PositionProvider};
use crate::types::Series;
use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Fewest overlapping return days a backtest will report on.
const MIN_OBSERVATIONS: usize = 5;

/// Outcome of a buy-and-hold backtest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    /// Start date the caller asked for, if any
    pub requested_start: Option<NaiveDate>,
    /// First return date actually used
    pub start: NaiveDate,
    /// True when the requested start predates the common history
    pub start_adjusted: bool,
    pub benchmark: String,
    pub observations: usize,
    pub metrics: BuyHoldMetrics,
    /// Portfolio growth of 100
    pub portfolio_curve: Series,
    /// Benchmark growth of 100
    pub benchmark_curve: Series,
}

impl BacktestReport {
    /// Caption for the start date, mentioning any adjustment.
    pub fn note(&self) -> String {
        match self.requested_start {
            Some(requested) if self.start_adjusted => format!(
                "Start date {} (adjusted from {} to earliest overlap {})",
                self.start, requested, self.start
            ),
            _ => format!("Start date {}", self.start),
        }
    }
}

/// Backtest the current market-value weights from `start`.
///
/// History is fetched for every held symbol and the benchmark first. The
/// portfolio and benchmark returns are restricted to the dates both have,
/// on or after the later of `start` and the first common date. With no
/// `start` the whole common history is used.
pub fn run_backtest<Q, P>(
    positions: &Q,
    provider: &mut P,
    config: &EngineConfig,
    start: Option<NaiveDate>,
) -> Result<BacktestReport>
where
    Q: PositionProvider + ?Sized,
    P: PriceHistoryProvider + ?Sized,
{
    let symbols: Vec<String> = positions
        .list_positions()
        .into_iter()
        .map(|p| p.symbol)
        .collect();
    provider.ensure_history(&config.with_benchmark(&symbols))?;

    let holdings = Holdings::load(positions, &*provider, config)?;
    let port_ret = holdings.returns(config.min_coverage);

    let bench_prices = daily_price_series(&*provider, &config.benchmark, config.outlier_max_jump);
    if bench_prices.is_empty() {
        return Err(Error::InsufficientData(format!(
            "No history for benchmark {}",
            config.benchmark
        )));
    }
    let bench_ret = bench_prices.pct_change();

    let common: Vec<NaiveDate> = port_ret
        .dates()
        .iter()
        .copied()
        .filter(|d| bench_ret.get(*d).is_some())
        .collect();
    let Some(&first_common) = common.first() else {
        return Err(Error::InsufficientData(
            "No overlap between portfolio and benchmark dates".to_string(),
        ));
    };

    let effective = start.map_or(first_common, |s| s.max(first_common));
    let in_window = |d: NaiveDate, _: f64| d >= effective && common.binary_search(&d).is_ok();
    let port_ret = port_ret.filter(in_window);
    let bench_ret = bench_ret.filter(in_window);

    if port_ret.len() < MIN_OBSERVATIONS || bench_ret.len() < MIN_OBSERVATIONS {
        return Err(Error::InsufficientData(format!(
            "{} overlapping days from {}, need {}",
            port_ret.len(),
            effective,
            MIN_OBSERVATIONS
        )));
    }

    let metrics = buy_hold_metrics(port_ret.values())
        .ok_or_else(|| Error::InsufficientData("No portfolio returns".to_string()))?;
    let start_adjusted = start.is_some_and(|s| s < effective);
    if start_adjusted {
        tracing::debug!("Backtest start moved to first common date {}", effective);
    }

    Ok(BacktestReport {
        requested_start: start,
        start: port_ret.first().map_or(effective, |(d, _)| d),
        start_adjusted,
        benchmark: config.benchmark.clone(),
        observations: port_ret.len(),
        metrics,
        portfolio_curve: equity_curve(&port_ret, 100.0),
        benchmark_curve: equity_curve(&bench_ret, 100.0),
    })
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{bars, business_days, monday, store, wiggle};
    use super::*;
    use crate::data::MemoryPriceStore;
    use crate::types::{Position, PriceSeries};
    use approx::assert_relative_eq;

    fn holdings() -> Vec<Position> {
        vec![Position::new("AAPL", 10.0, 90.0)]
    }

    #[test]
    fn test_full_history_backtest() {
        let aapl = wiggle(100.0, 12, 0.01);
        let spy = wiggle(400.0, 12, 0.002);
        let mut store = store(&[("AAPL", &aapl), ("SPY", &spy)]);

        let report =
            run_backtest(&holdings(), &mut store, &EngineConfig::default(), None).unwrap();

        let days = business_days(monday(), 12);
        assert_eq!(report.start, days[1]);
        assert!(!report.start_adjusted);
        assert_eq!(report.observations, 11);
        assert_eq!(report.benchmark, "SPY");
        assert_eq!(report.note(), format!("Start date {}", days[1]));

        let (_, last) = report.portfolio_curve.last().unwrap();
        assert_relative_eq!(last, 100.0 * aapl[11] / aapl[0], epsilon = 1e-9);
        let (_, last) = report.benchmark_curve.last().unwrap();
        assert_relative_eq!(last, 100.0 * spy[11] / spy[0], epsilon = 1e-9);
        assert!(report.metrics.max_drawdown <= 0.0);
    }

    #[test]
    fn test_early_start_is_adjusted() {
        let mut store = store(&[
            ("AAPL", &wiggle(100.0, 10, 0.01)),
            ("SPY", &wiggle(400.0, 10, 0.0)),
        ]);
        let requested = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();

        let report =
            run_backtest(&holdings(), &mut store, &EngineConfig::default(), Some(requested))
                .unwrap();

        assert!(report.start_adjusted);
        assert_eq!(report.start, business_days(monday(), 2)[1]);
        assert!(report.note().contains("adjusted from 2023-06-01"));
    }

    #[test]
    fn test_late_start_leaves_too_few_days() {
        let mut store = store(&[
            ("AAPL", &wiggle(100.0, 10, 0.01)),
            ("SPY", &wiggle(400.0, 10, 0.0)),
        ]);
        let days = business_days(monday(), 10);

        // Days 6..=9 leave four returns
        let result = run_backtest(&holdings(), &mut store, &EngineConfig::default(), Some(days[6]));
        assert!(matches!(result, Err(Error::InsufficientData(_))));

        let report =
            run_backtest(&holdings(), &mut store, &EngineConfig::default(), Some(days[5]))
                .unwrap();
        assert_eq!(report.observations, 5);
        assert!(!report.start_adjusted);
    }

    #[test]
    fn test_benchmark_history_is_fetched() {
        let mut store = store(&[("AAPL", &wiggle(100.0, 8, 0.01))]).with_fetcher(
            |symbol: &str| -> Result<PriceSeries> {
                assert_eq!(symbol, "SPY");
                Ok(bars(monday(), &wiggle(400.0, 8, 0.0)))
            },
        );

        let report = run_backtest(&holdings(), &mut store, &EngineConfig::default(), None).unwrap();
        assert_eq!(report.observations, 7);
    }

    #[test]
    fn test_missing_benchmark_and_empty_portfolio() {
        let config = EngineConfig::default();
        let mut store = store(&[("AAPL", &wiggle(100.0, 8, 0.01))]);
        assert!(matches!(
            run_backtest(&holdings(), &mut store, &config, None),
            Err(Error::InsufficientData(_))
        ));

        let mut empty_store = MemoryPriceStore::new();
        let none: Vec<Position> = Vec::new();
        assert!(matches!(
            run_backtest(&none, &mut empty_store, &config, None),
            Err(Error::DegenerateInput(_))
        ));
    }

    #[test]
    fn test_disjoint_dates_have_no_overlap() {
        let mut store = MemoryPriceStore::new();
        store
            .upsert_prices("AAPL", &bars(monday(), &wiggle(100.0, 6, 0.01)))
            .unwrap();
        let later = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        store
            .upsert_prices("SPY", &bars(later, &wiggle(400.0, 6, 0.0)))
            .unwrap();

        let result = run_backtest(&holdings(), &mut store, &EngineConfig::default(), None);
        assert!(matches!(result, Err(Error::InsufficientData(msg)) if msg.contains("overlap")));
    }
}
