//! Instant market shock applied to the whole portfolio.

use super::Holdings;
use crate::config::EngineConfig;
use crate::data::PriceHistoryProvider;
use crate::portfolio::{worst_window_stats, PositionProvider, WorstWindow};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Uniform price shock applied to every holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StressShock {
    Down5,
    Down10,
    Down20,
}

impl StressShock {
    /// Shocks in button order.
    pub const ALL: [StressShock; 3] = [
        StressShock::Down5,
        StressShock::Down10,
        StressShock::Down20,
    ];

    /// Signed return of the shock.
    pub fn fraction(&self) -> f64 {
        match self {
            StressShock::Down5 => -0.05,
            StressShock::Down10 => -0.10,
            StressShock::Down20 => -0.20,
        }
    }

    /// Pick the shock whose button was pressed most often.
    ///
    /// Counts are in [`StressShock::ALL`] order. Ties go to the first shock;
    /// `None` when nothing was pressed.
    pub fn from_click_counts(counts: [u32; 3]) -> Option<Self> {
        let max = counts.iter().copied().max()?;
        if max == 0 {
            return None;
        }
        counts
            .iter()
            .position(|c| *c == max)
            .map(|idx| Self::ALL[idx])
    }
}

impl fmt::Display for StressShock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", (self.fraction() * 100.0).round() as i64)
    }
}

impl FromStr for StressShock {
    type Err = Error;

    /// Accepts "5", "-10", "20%" and the like.
    fn from_str(s: &str) -> Result<Self> {
        let magnitude = s.trim().trim_end_matches('%').trim_start_matches(['-', '+']);
        match magnitude {
            "5" => Ok(StressShock::Down5),
            "10" => Ok(StressShock::Down10),
            "20" => Ok(StressShock::Down20),
            _ => Err(Error::InvalidOperation(format!(
                "Unknown shock '{}', expected 5, 10 or 20",
                s
            ))),
        }
    }
}

/// Estimated impact of a shock plus the worst historical stretch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressReport {
    pub shock: StressShock,
    pub total_value: f64,
    /// Estimated P/L as a fraction of value (equal to the shock)
    pub pnl_percent: f64,
    /// Estimated P/L in currency
    pub pnl: f64,
    /// Worst compounded run of `config.worst_window` days, when the history is long enough
    pub worst_window: Option<WorstWindow>,
}

impl StressReport {
    /// One-line summary of the shock.
    pub fn summary(&self) -> String {
        format!(
            "Shock {} => Estimated P/L: {:.2}% (~${:.0})",
            self.shock,
            self.pnl_percent * 100.0,
            self.pnl
        )
    }
}

/// Apply `shock` to the current market value.
pub fn run_stress<Q, P>(
    positions: &Q,
    provider: &P,
    config: &EngineConfig,
    shock: StressShock,
) -> Result<StressReport>
where
    Q: PositionProvider + ?Sized,
    P: PriceHistoryProvider + ?Sized,
{
    let holdings = Holdings::load(positions, provider, config)?;
    let port_ret = holdings.returns(config.min_coverage);
    if port_ret.is_empty() {
        return Err(Error::InsufficientData(
            "Insufficient history for stress test".to_string(),
        ));
    }

    let worst_window = worst_window_stats(&port_ret, config.worst_window);
    if worst_window.is_none() {
        tracing::debug!(
            "{} returns, not enough for a {}-day window",
            port_ret.len(),
            config.worst_window
        );
    }

    Ok(StressReport {
        shock,
        total_value: holdings.total_value,
        pnl_percent: shock.fraction(),
        pnl: holdings.total_value * shock.fraction(),
        worst_window,
    })
}
