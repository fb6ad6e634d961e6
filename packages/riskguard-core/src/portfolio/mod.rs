//! Portfolio management module.
//!
//! Provides position tracking, valuation, return aggregation and risk metrics.

mod aggregate;
mod performance;
mod risk;
mod tracker;

pub use aggregate::{business_days_before, portfolio_returns, worst_window_stats, WorstWindow};
pub use performance::{
    market_value_weights, position_valuations, total_market_value, PortfolioPerformance,
};
pub use risk::{
    annualized_volatility, buy_hold_metrics, correlation_matrix, equity_curve, historical_var_es,
    max_drawdown, parametric_var_es, rolling_volatility, sharpe_ratio, BuyHoldMetrics,
    CorrelationMatrix, TRADING_DAYS,
};
pub use tracker::{PortfolioTracker, PositionProvider, CURRENT_VERSION, SEED_POSITIONS};
