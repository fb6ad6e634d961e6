//! Engine configuration.
//!
//! Loaded from TOML. Every key is optional; missing keys take the defaults
//! below.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Tunables shared by the drivers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Daily return above which a close is screened as a possible glitch
    pub outlier_max_jump: f64,
    /// Reject an incoming bar whose close moves more than this from the last stored close
    pub update_skip_jump: f64,
    /// Minimum weight coverage for a date to enter the portfolio return series
    pub min_coverage: f64,
    /// Benchmark symbol for backtests
    pub benchmark: String,
    /// Symbols to keep populated when nothing else is requested
    pub default_tickers: Vec<String>,
    /// Confidence level for VaR/ES and forecast bands
    pub alpha: f64,
    /// Default forecast horizon in steps
    pub forecast_horizon: usize,
    /// Worst-window length in trading days
    pub worst_window: usize,
    /// Rolling volatility window in trading days
    pub rolling_vol_window: usize,
    /// Capacity of the symbol search cache
    pub search_cache_capacity: usize,
    /// Default backtest start, in calendar days before today
    pub backtest_lookback_days: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            outlier_max_jump: 0.18,
            update_skip_jump: 0.15,
            min_coverage: 0.7,
            benchmark: "SPY".to_string(),
            default_tickers: vec!["AAPL".into(), "MSFT".into(), "SPY".into()],
            alpha: 0.95,
            forecast_horizon: 30,
            worst_window: 20,
            rolling_vol_window: 21,
            search_cache_capacity: 512,
            backtest_lookback_days: 365,
        }
    }
}

impl EngineConfig {
    /// Load from the default path, falling back to defaults if it does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::default_path())
    }

    /// Get the default config file path.
    ///
    /// Default path: `~/.riskguard/config.toml`
    /// Can be overridden with `RISKGUARD_CONFIG` environment variable.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = env::var("RISKGUARD_CONFIG") {
            return PathBuf::from(path);
        }

        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".riskguard/config.toml"))
            .unwrap_or_else(|| PathBuf::from("riskguard.toml"))
    }

    /// Load from a specific path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Symbols to populate before a backtest: the given ones plus the benchmark.
    pub fn with_benchmark(&self, symbols: &[String]) -> Vec<String> {
        let mut all: Vec<String> = symbols.to_vec();
        if !all.iter().any(|s| s.eq_ignore_ascii_case(&self.benchmark)) {
            all.push(self.benchmark.clone());
        }
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.outlier_max_jump, 0.18);
        assert_eq!(config.min_coverage, 0.7);
        assert_eq!(config.benchmark, "SPY");
        assert_eq!(config.search_cache_capacity, 512);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = EngineConfig::from_toml("benchmark = \"QQQ\"\nalpha = 0.99\n").unwrap();
        assert_eq!(config.benchmark, "QQQ");
        assert_eq!(config.alpha, 0.99);
        assert_eq!(config.worst_window, 20);
    }

    #[test]
    fn test_invalid_toml() {
        let result = EngineConfig::from_toml("alpha = \"high\"");
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = EngineConfig::load_from_path(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "min_coverage = 0.5\ndefault_tickers = [\"TLT\"]\n").unwrap();

        let config = EngineConfig::load_from_path(&path).unwrap();
        assert_eq!(config.min_coverage, 0.5);
        assert_eq!(config.default_tickers, vec!["TLT".to_string()]);
    }

    #[test]
    fn test_with_benchmark() {
        let config = EngineConfig::default();
        let symbols = config.with_benchmark(&["AAPL".to_string()]);
        assert_eq!(symbols, vec!["AAPL".to_string(), "SPY".to_string()]);

        let symbols = config.with_benchmark(&["spy".to_string()]);
        assert_eq!(symbols.len(), 1);
    }
}
