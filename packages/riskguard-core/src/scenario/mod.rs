//! Portfolio-level drivers: backtest, stress shock and the risk panel.
//!
//! Each driver values the current holdings, pulls repaired daily closes
//! for every held symbol and aggregates them into one return series before
//! computing its report. Unlike the analytics underneath, drivers return
//! `Result` so the caller can explain why nothing could be shown.

mod backtest;
mod risk_view;
mod stress;

pub use backtest::{run_backtest, BacktestReport};
pub use risk_view::{risk_view, RiskView, VarMethod};
pub use stress::{run_stress, StressReport, StressShock};

use crate::config::EngineConfig;
use crate::data::{daily_price_series, PriceHistoryProvider};
use crate::portfolio::{
    market_value_weights, portfolio_returns, position_valuations, total_market_value,
    PositionProvider,
};
use crate::types::{ReturnSeries, Series};
use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap};

/// Valued holdings with their price history.
#[derive(Debug, Clone)]
pub(crate) struct Holdings {
    pub total_value: f64,
    pub weights: HashMap<String, f64>,
    /// Repaired daily closes, only for symbols that have any
    pub prices: BTreeMap<String, Series>,
}

impl Holdings {
    /// Value `positions` against `provider` and collect their closes.
    pub fn load<Q, P>(positions: &Q, provider: &P, config: &EngineConfig) -> Result<Self>
    where
        Q: PositionProvider + ?Sized,
        P: PriceHistoryProvider + ?Sized,
    {
        let listed = positions.list_positions();
        if listed.is_empty() {
            return Err(Error::DegenerateInput("No positions in portfolio".to_string()));
        }

        let valued = position_valuations(&listed, provider, config.outlier_max_jump);
        let total_value = total_market_value(&valued);
        if !total_value.is_finite() || total_value <= 0.0 {
            return Err(Error::DegenerateInput(format!(
                "Portfolio value is {:.2}",
                total_value
            )));
        }

        let prices: BTreeMap<String, Series> = valued
            .iter()
            .map(|p| {
                let closes = daily_price_series(provider, &p.symbol, config.outlier_max_jump);
                (p.symbol.clone(), closes)
            })
            .filter(|(_, closes)| !closes.is_empty())
            .collect();
        if prices.is_empty() {
            return Err(Error::DegenerateInput(
                "No price history for any position".to_string(),
            ));
        }

        Ok(Self {
            weights: market_value_weights(&valued),
            total_value,
            prices,
        })
    }

    /// Coverage-gated weighted daily returns.
    pub fn returns(&self, min_coverage: f64) -> ReturnSeries {
        portfolio_returns(&self.prices, &self.weights, min_coverage)
    }
}
