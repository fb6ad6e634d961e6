//! RiskGuard Core - Portfolio risk and forecasting analytics.
//!
//! This crate provides the analytics engine behind the RiskGuard dashboard:
//!
//! - **Price data**: vendor frame normalization, adjusted-close reconciliation, glitch repair
//! - **Portfolio tracking**: JSON-backed positions, valuation, market-value weights
//! - **Risk metrics**: VaR/ES (parametric and historical), Sharpe ratio, max drawdown,
//!   rolling volatility
//! - **Forecasting**: boosted-tree quantiles, ARIMA(1,1,1) and drift, tried in that order
//! - **Scenarios**: buy-and-hold backtest, stress shocks, the risk panel
//!
//! Prices come in through a [`data::PriceHistoryProvider`]; the crate does
//! no network I/O of its own.
//!
//! # Example
//!
//! ```rust
//! use riskguard_core::data::MemoryPriceStore;
//! use riskguard_core::portfolio::PortfolioTracker;
//! use riskguard_core::scenario::{run_stress, StressShock};
//! use riskguard_core::EngineConfig;
//!
//! let mut tracker = PortfolioTracker::in_memory();
//! tracker.add_position("AAPL", 10.0, 150.0);
//!
//! // No history yet, so there is nothing to value
//! let store = MemoryPriceStore::new();
//! let result = run_stress(&tracker, &store, &EngineConfig::default(), StressShock::Down10);
//! assert!(result.is_err());
//! ```

pub mod config;
pub mod data;
pub mod forecast;
pub mod portfolio;
pub mod scenario;
pub mod search;
pub mod stats;
pub mod types;

// Re-export commonly used types
pub use config::EngineConfig;
pub use types::{
    ApiResponse, DailyCloseSeries, ForecastResult, Portfolio, Position, PriceBar, PriceSeries,
    ReturnSeries, Series,
};

// Re-export main functionality
pub use data::{
    daily_price_series, normalize, patch_outliers, HistoryFetcher, Lookback, MemoryPriceStore,
    PriceHistoryProvider,
};
pub use forecast::{forecast, ForecastEngine, ForecastStrategy};
pub use portfolio::{
    historical_var_es, max_drawdown, parametric_var_es, portfolio_returns, sharpe_ratio,
    worst_window_stats, PortfolioPerformance, PortfolioTracker, PositionProvider,
};
pub use scenario::{
    risk_view, run_backtest, run_stress, BacktestReport, RiskView, StressReport, StressShock,
    VarMethod,
};
pub use search::{SymbolSearch, SymbolSource};

/// Error types for riskguard-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Position not found: {0}")]
    PositionNotFound(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Model failure: {0}")]
    ModelFailure(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),
}

/// Result type for riskguard-core operations.
pub type Result<T> = std::result::Result<T, Error>;
