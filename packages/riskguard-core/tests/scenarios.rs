//! End-to-end scenarios through the public API.

use approx::assert_relative_eq;
use chrono::{Datelike, Days, NaiveDate, Weekday};
use riskguard_core::data::{
    daily_price_series, normalize, Cell, ColumnHeader, MemoryPriceStore, PriceHistoryProvider,
    RawFrame,
};
use riskguard_core::portfolio::PortfolioTracker;
use riskguard_core::scenario::{risk_view, run_backtest, run_stress, StressShock, VarMethod};
use riskguard_core::{
    forecast, parametric_var_es, patch_outliers, portfolio_returns, EngineConfig, Error, Series,
};
use std::collections::{BTreeMap, HashMap};
use tempfile::tempdir;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

fn weekdays(n: usize) -> Vec<NaiveDate> {
    let mut out = Vec::with_capacity(n);
    let mut current = day(1);
    while out.len() < n {
        if !matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            out.push(current);
        }
        current = current + Days::new(1);
    }
    out
}

/// Vendor-style frame with lowercase headers and text cells.
fn vendor_frame(closes: &[f64]) -> RawFrame {
    let mut frame = RawFrame::new(vec![
        ColumnHeader::from("date_ignored"),
        ColumnHeader::from("close"),
        ColumnHeader::Nested(vec!["X".to_string(), "Adj Close".to_string()]),
    ]);
    for (d, c) in weekdays(closes.len()).into_iter().zip(closes) {
        frame.push_row(
            d,
            vec![
                Cell::Missing,
                Cell::Text(format!("{}", c)),
                Cell::Number(*c),
            ],
        );
    }
    frame
}

fn closes(n: usize, base: f64, step: f64) -> Vec<f64> {
    (0..n)
        .map(|i| base + step * i as f64 + if i % 3 == 0 { 0.4 } else { -0.2 })
        .collect()
}

#[test]
fn glitch_is_replaced_by_neighbour_mean() {
    let series: Series = [100.0, 101.0, 99.0, 102.0, 40.0, 103.0, 104.0]
        .iter()
        .enumerate()
        .map(|(i, v)| (day(1 + i as u32), *v))
        .collect();

    let patched = patch_outliers(&series, 0.18);
    assert_eq!(
        patched.values(),
        &[100.0, 101.0, 99.0, 102.0, 102.5, 103.0, 104.0]
    );
}

#[test]
fn thin_coverage_days_are_dropped() {
    let mut prices = BTreeMap::new();
    // A returns 0.01, 0.02 on days 2 and 3
    prices.insert(
        "A".to_string(),
        Series::from_pairs(vec![(day(1), 100.0), (day(2), 101.0), (day(3), 103.02)]),
    );
    // B returns 0.03 on day 2, then 0.01 on day 4
    prices.insert(
        "B".to_string(),
        Series::from_pairs(vec![(day(1), 100.0), (day(2), 103.0), (day(4), 104.03)]),
    );
    let weights: HashMap<String, f64> = [("A".to_string(), 0.5), ("B".to_string(), 0.5)]
        .into_iter()
        .collect();

    let returns = portfolio_returns(&prices, &weights, 0.7);
    assert_eq!(returns.dates(), &[day(2)]);
    assert_relative_eq!(returns.values()[0], 0.02, epsilon = 1e-12);
}

#[test]
fn forecast_covers_the_horizon() {
    let history: Series = weekdays(60)
        .into_iter()
        .zip(closes(60, 50.0, 0.1))
        .collect();
    let last = history.last().unwrap().0;

    let result = forecast(&history, 15, 0.9);
    assert_eq!(result.forecast.len(), 15);
    assert!(result.forecast.dates().iter().all(|d| *d > last));
    assert!(result.forecast.values().iter().all(|v| v.is_finite()));

    let single: Series = vec![(day(3), 12.5)].into_iter().collect();
    let flat = forecast(&single, 6, 0.95);
    assert_eq!(flat.forecast.values(), &[12.5; 6]);
    assert!(!flat.has_band());
}

#[test]
fn zero_variance_has_no_parametric_risk() {
    let (var, es) = parametric_var_es(&[0.25; 8], 0.95);
    assert!(var.is_nan() && es.is_nan());

    let (var, es) = parametric_var_es(&[], 0.95);
    assert!(var.is_nan() && es.is_nan());
}

#[test]
fn imported_prices_drive_the_risk_drivers() {
    let dir = tempdir().unwrap();
    let mut tracker = PortfolioTracker::with_path(dir.path().join("portfolio.json")).unwrap();
    tracker.add_position("aapl", 10.0, 95.0);
    tracker.set_position("MSFT", 4.0, 200.0).unwrap();
    tracker.save().unwrap();
    let tracker = PortfolioTracker::with_path(dir.path().join("portfolio.json")).unwrap();

    let mut store = MemoryPriceStore::new();
    for (symbol, base, step) in [("AAPL", 100.0, 0.3), ("MSFT", 250.0, 0.5), ("SPY", 470.0, 0.4)] {
        let bars = normalize(&vendor_frame(&closes(45, base, step)));
        assert_eq!(bars.len(), 45);
        store.upsert_prices(symbol, &bars).unwrap();
    }

    let snapshot = dir.path().join("prices.json");
    store.save_snapshot(&snapshot).unwrap();
    let mut store = MemoryPriceStore::load_snapshot(&snapshot).unwrap();

    let config = EngineConfig::default();
    let aapl_last = daily_price_series(&store, "AAPL", config.outlier_max_jump)
        .last()
        .unwrap()
        .1;
    let msft_last = daily_price_series(&store, "MSFT", config.outlier_max_jump)
        .last()
        .unwrap()
        .1;
    let value = 10.0 * aapl_last + 4.0 * msft_last;

    let stress = run_stress(&tracker, &store, &config, StressShock::Down20).unwrap();
    assert_relative_eq!(stress.pnl, -0.2 * value, epsilon = 1e-6);
    assert!(stress.worst_window.is_some());

    let report = run_backtest(&tracker, &mut store, &config, Some(day(1))).unwrap();
    assert!(report.start_adjusted);
    assert_eq!(report.start, day(2));
    assert_eq!(report.observations, 44);
    assert_eq!(report.portfolio_curve.len(), report.benchmark_curve.len());

    let view = risk_view(&tracker, &store, &config, 0.95, VarMethod::Historical).unwrap();
    assert_eq!(view.observations, 44);
    assert_eq!(view.correlation.symbols, vec!["AAPL", "MSFT"]);
    assert!(view.var >= 0.0 && view.es >= 0.0);
}

#[test]
fn drivers_explain_empty_portfolios() {
    let tracker = PortfolioTracker::in_memory();
    let mut store = MemoryPriceStore::new();
    let config = EngineConfig::default();

    let result = run_stress(&tracker, &store, &config, StressShock::Down5);
    assert!(matches!(result, Err(Error::DegenerateInput(_))));

    let result = run_backtest(&tracker, &mut store, &config, None);
    assert!(matches!(result, Err(Error::DegenerateInput(_))));

    // Held but never priced
    let mut tracker = PortfolioTracker::in_memory();
    tracker.add_position("NOPE", 5.0, 10.0);
    let result = risk_view(&tracker, &store, &config, 0.95, VarMethod::Parametric);
    assert!(matches!(result, Err(Error::DegenerateInput(_))));
}
