//! Lookback windows ("6M", "1Y", "MAX") for charts and tables.

use crate::types::Series;
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// How far back from the newest observation to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lookback {
    Months(u32),
    Years(u32),
    Max,
}

impl Default for Lookback {
    fn default() -> Self {
        Lookback::Months(12)
    }
}

impl FromStr for Lookback {
    type Err = Infallible;

    /// Unrecognised labels fall back to twelve months.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim().to_uppercase();
        if label == "MAX" {
            return Ok(Lookback::Max);
        }

        let parsed = if let Some(n) = label.strip_suffix('M') {
            n.parse().ok().map(Lookback::Months)
        } else if let Some(n) = label.strip_suffix('Y') {
            n.parse().ok().map(Lookback::Years)
        } else {
            None
        };
        Ok(parsed.unwrap_or_default())
    }
}

impl fmt::Display for Lookback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookback::Months(n) => write!(f, "{}M", n),
            Lookback::Years(n) => write!(f, "{}Y", n),
            Lookback::Max => write!(f, "MAX"),
        }
    }
}

impl Lookback {
    /// First date kept when the newest observation is `end`.
    ///
    /// `None` means no cutoff. Month arithmetic clamps to the end of
    /// shorter months (Mar 31 minus 1M is Feb 29 in a leap year).
    pub fn start_from(&self, end: NaiveDate) -> Option<NaiveDate> {
        let months = match self {
            Lookback::Months(n) => *n,
            Lookback::Years(n) => n.saturating_mul(12),
            Lookback::Max => return None,
        };
        end.checked_sub_months(Months::new(months))
    }

    /// Keep points on or after `end - offset`, where `end` is the last date.
    pub fn apply(&self, series: &Series) -> Series {
        let Some((end, _)) = series.last() else {
            return Series::new();
        };
        match self.start_from(end) {
            Some(start) => series.since(start),
            None => series.clone(),
        }
    }
}
