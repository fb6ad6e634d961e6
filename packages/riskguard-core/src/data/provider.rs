//! Price-history collaborators.
//!
//! The engine never fetches or stores prices itself. It reads through
//! [`PriceHistoryProvider`]; the fetch layer sits behind [`HistoryFetcher`].
//! [`MemoryPriceStore`] is the in-process provider used by the CLI and tests.

use crate::config::EngineConfig;
use crate::types::{PriceBar, PriceSeries};
use crate::Result;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

/// Source of per-symbol price history.
pub trait PriceHistoryProvider {
    /// Bars for `symbol` in timestamp order. Empty when unknown.
    fn price_series(&self, symbol: &str) -> PriceSeries;

    /// Insert or overwrite bars; returns how many were written.
    fn upsert_prices(&mut self, symbol: &str, bars: &PriceSeries) -> Result<usize>;

    /// Make sure every symbol has history before analytics run.
    fn ensure_history(&mut self, symbols: &[String]) -> Result<()>;
}

/// External fetch layer (vendor API, simulation, fixtures).
pub trait HistoryFetcher {
    /// Full normalized history for `symbol`.
    fn fetch_history(&self, symbol: &str) -> Result<PriceSeries>;
}

impl<F> HistoryFetcher for F
where
    F: Fn(&str) -> Result<PriceSeries>,
{
    fn fetch_history(&self, symbol: &str) -> Result<PriceSeries> {
        self(symbol)
    }
}

/// Warm `provider` with the configured default tickers and the benchmark.
///
/// Returns the symbols that still have no history afterwards.
pub fn bootstrap<P>(provider: &mut P, config: &EngineConfig) -> Result<Vec<String>>
where
    P: PriceHistoryProvider + ?Sized,
{
    let symbols = config.with_benchmark(&config.default_tickers);
    provider.ensure_history(&symbols)?;

    let missing: Vec<String> = symbols
        .into_iter()
        .filter(|symbol| provider.price_series(symbol).is_empty())
        .collect();
    if !missing.is_empty() {
        tracing::warn!("No history after bootstrap for {}", missing.join(", "));
    }
    Ok(missing)
}

/// Decide whether a freshly fetched bar may be stored.
///
/// Rejects the bar when its close moves more than `max_jump` relative to the
/// last stored close, which is how a bad tick usually shows up.
pub fn accept_latest_bar(history: &PriceSeries, candidate: &PriceBar, max_jump: f64) -> bool {
    let Some(last) = history.last() else {
        return true;
    };

    if last.close.is_finite() && last.close > 0.0 {
        let jump = (candidate.close / last.close - 1.0).abs();
        if jump > max_jump {
            tracing::warn!(
                "Skipping suspicious bar: {:.4} -> {:.4} ({:.1}%)",
                last.close,
                candidate.close,
                100.0 * jump
            );
            return false;
        }
    }

    true
}

fn symbol_key(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// In-memory price store keyed by upper-cased symbol.
///
/// Writes are "latest wins" per timestamp and fill missing fields with
/// [`PriceBar::filled`].
#[derive(Default)]
pub struct MemoryPriceStore {
    prices: BTreeMap<String, BTreeMap<NaiveDateTime, PriceBar>>,
    fetcher: Option<Box<dyn HistoryFetcher>>,
}

impl fmt::Debug for MemoryPriceStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryPriceStore")
            .field("symbols", &self.prices.keys().collect::<Vec<_>>())
            .field("fetcher", &self.fetcher.is_some())
            .finish()
    }
}

impl MemoryPriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a fetcher used by `ensure_history`.
    pub fn with_fetcher(mut self, fetcher: impl HistoryFetcher + 'static) -> Self {
        self.fetcher = Some(Box::new(fetcher));
        self
    }

    /// Symbols with at least one stored bar.
    pub fn symbols(&self) -> Vec<String> {
        self.prices
            .iter()
            .filter(|(_, bars)| !bars.is_empty())
            .map(|(symbol, _)| symbol.clone())
            .collect()
    }

    pub fn has_history(&self, symbol: &str) -> bool {
        self.prices
            .get(&symbol_key(symbol))
            .is_some_and(|bars| !bars.is_empty())
    }

    /// Store the newest bar of `bars` unless it fails the jump guard.
    ///
    /// Returns whether the bar was written.
    pub fn apply_latest(
        &mut self,
        symbol: &str,
        bars: &PriceSeries,
        max_jump: f64,
    ) -> Result<bool> {
        let Some(latest) = bars.iter().max_by_key(|bar| bar.timestamp) else {
            return Ok(false);
        };

        let history = self.price_series(symbol);
        if !accept_latest_bar(&history, latest, max_jump) {
            return Ok(false);
        }

        self.upsert_prices(symbol, &vec![*latest])?;
        Ok(true)
    }

    /// Load a JSON snapshot (`{"SYMBOL": [bars...]}`).
    pub fn load_snapshot(path: &Path) -> Result<Self> {
        let mut store = Self::new();
        if !path.exists() {
            return Ok(store);
        }

        let content = fs::read_to_string(path)?;
        let data: BTreeMap<String, PriceSeries> = serde_json::from_str(&content)?;
        for (symbol, bars) in data {
            store.upsert_prices(&symbol, &bars)?;
        }
        Ok(store)
    }

    /// Write a JSON snapshot of every stored series.
    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let data: BTreeMap<&String, Vec<&PriceBar>> = self
            .prices
            .iter()
            .map(|(symbol, bars)| (symbol, bars.values().collect()))
            .collect();
        fs::write(path, serde_json::to_string_pretty(&data)?)?;
        Ok(())
    }
}

impl PriceHistoryProvider for MemoryPriceStore {
    fn price_series(&self, symbol: &str) -> PriceSeries {
        self.prices
            .get(&symbol_key(symbol))
            .map(|bars| bars.values().copied().collect())
            .unwrap_or_default()
    }

    fn upsert_prices(&mut self, symbol: &str, bars: &PriceSeries) -> Result<usize> {
        let entry = self.prices.entry(symbol_key(symbol)).or_default();
        let mut written = 0;
        for bar in bars.iter().filter(|bar| bar.close.is_finite()) {
            entry.insert(bar.timestamp, bar.filled());
            written += 1;
        }
        Ok(written)
    }

    fn ensure_history(&mut self, symbols: &[String]) -> Result<()> {
        for symbol in symbols {
            if self.has_history(symbol) {
                continue;
            }
            let Some(fetcher) = &self.fetcher else {
                tracing::debug!("No fetcher configured, {} stays empty", symbol);
                continue;
            };

            match fetcher.fetch_history(symbol) {
                Ok(bars) if !bars.is_empty() => {
                    tracing::info!("Fetched {} bars for {}", bars.len(), symbol);
                    self.upsert_prices(symbol, &bars)?;
                }
                Ok(_) => tracing::info!("Fetch returned no history for {}", symbol),
                Err(e) => tracing::info!("History fetch failed {}: {}", symbol, e),
            }
        }
        Ok(())
    }
}
