//! Position valuation and portfolio summary.

use crate::data::{daily_price_series, PriceHistoryProvider};
use crate::types::{Portfolio, Position};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Price each position at its last repaired daily close.
///
/// Positions with no history come back unpriced (valuation fields `None`).
pub fn position_valuations<P>(positions: &[Position], provider: &P, max_jump: f64) -> Vec<Position>
where
    P: PriceHistoryProvider + ?Sized,
{
    positions
        .iter()
        .map(|position| {
            let closes = daily_price_series(provider, &position.symbol, max_jump);
            match closes.last() {
                Some((_, price)) => position.with_price(price),
                None => position.clone(),
            }
        })
        .collect()
}

/// Total market value of priced positions.
pub fn total_market_value(positions: &[Position]) -> f64 {
    positions
        .iter()
        .filter_map(|p| p.market_value)
        .filter(|v| v.is_finite())
        .sum()
}

/// Market-value weight per symbol.
///
/// Unpriced positions get weight zero. Empty when the total value is not
/// positive.
pub fn market_value_weights(positions: &[Position]) -> HashMap<String, f64> {
    let total_value = total_market_value(positions);
    if total_value <= 0.0 {
        return HashMap::new();
    }

    positions
        .iter()
        .map(|p| {
            let weight = p
                .market_value
                .filter(|v| v.is_finite())
                .map(|mv| mv / total_value)
                .unwrap_or(0.0);
            (p.symbol.clone(), weight)
        })
        .collect()
}

/// Portfolio performance summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioPerformance {
    /// Total cost basis of all positions
    pub total_cost: f64,
    /// Total market value (requires current prices)
    pub total_market_value: f64,
    /// Total unrealized gain/loss in dollars
    pub total_gain_loss: f64,
    /// Total unrealized gain/loss percentage, `None` when cost is zero
    pub total_gain_loss_percent: Option<f64>,
    /// Number of positions
    pub position_count: usize,
    /// Number of positions with gains
    pub positions_in_profit: usize,
    /// Number of positions with losses
    pub positions_in_loss: usize,
}

impl PortfolioPerformance {
    /// Summarise a portfolio whose positions have been valued.
    ///
    /// Gain/loss only counts positions that carry a price.
    pub fn from_portfolio(portfolio: &Portfolio) -> Self {
        let priced: Vec<&Position> = portfolio
            .positions
            .iter()
            .filter(|p| p.market_value.is_some())
            .collect();

        let priced_cost: f64 = priced.iter().map(|p| p.total_cost()).sum();
        let total_gain_loss: f64 = priced.iter().filter_map(|p| p.gain_loss).sum();
        let total_gain_loss_percent =
            (priced_cost > 0.0).then(|| total_gain_loss / priced_cost * 100.0);

        Self {
            total_cost: portfolio.total_cost(),
            total_market_value: portfolio.total_market_value(),
            total_gain_loss,
            total_gain_loss_percent,
            position_count: portfolio.position_count(),
            positions_in_profit: priced
                .iter()
                .filter(|p| p.gain_loss.is_some_and(|g| g > 0.0))
                .count(),
            positions_in_loss: priced
                .iter()
                .filter(|p| p.gain_loss.is_some_and(|g| g < 0.0))
                .count(),
        }
    }
}
