//! Core data types for the riskguard analytics engine.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV observation for a symbol.
///
/// `close` is always finite. Straight out of the normalizer the other price
/// fields may be NaN, meaning the vendor did not supply them; see
/// [`PriceBar::filled`] for the defaults a store applies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PriceBar {
    /// Bar timestamp (timezone-naive wall time)
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Vendor adjusted close (splits/dividends)
    pub adj_close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// Canonical column order of a normalized price table.
    pub const COLUMNS: [&'static str; 6] = ["Open", "High", "Low", "Close", "AdjClose", "Volume"];

    /// Create a bar where every price field equals `close`.
    pub fn from_close(timestamp: NaiveDateTime, close: f64) -> Self {
        Self {
            timestamp,
            open: close,
            high: close,
            low: close,
            close,
            adj_close: close,
            volume: 0.0,
        }
    }

    /// Calendar day of the bar.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// Values in [`PriceBar::COLUMNS`] order.
    pub fn values(&self) -> [f64; 6] {
        [
            self.open,
            self.high,
            self.low,
            self.close,
            self.adj_close,
            self.volume,
        ]
    }

    /// Replace missing fields with store defaults: prices fall back to
    /// `close`, volume to zero.
    pub fn filled(&self) -> Self {
        let or_close = |v: f64| if v.is_finite() { v } else { self.close };
        Self {
            open: or_close(self.open),
            high: or_close(self.high),
            low: or_close(self.low),
            adj_close: or_close(self.adj_close),
            volume: if self.volume.is_finite() {
                self.volume
            } else {
                0.0
            },
            ..*self
        }
    }
}

/// Date-ordered bars for one symbol. A transient view, rebuilt per query.
pub type PriceSeries = Vec<PriceBar>;

/// A date-indexed numeric series with strictly increasing, unique dates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SeriesColumns")]
pub struct Series {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

/// Wire form of [`Series`]; ordering and length are checked on the way in.
#[derive(Deserialize)]
struct SeriesColumns {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl TryFrom<SeriesColumns> for Series {
    type Error = String;

    fn try_from(columns: SeriesColumns) -> std::result::Result<Self, Self::Error> {
        if columns.dates.len() != columns.values.len() {
            return Err(format!(
                "series has {} dates but {} values",
                columns.dates.len(),
                columns.values.len()
            ));
        }
        Ok(Self::from_pairs(columns.dates.into_iter().zip(columns.values)))
    }
}

/// Adjusted daily closes keyed by calendar day.
pub type DailyCloseSeries = Series;

/// Simple returns keyed by calendar day.
pub type ReturnSeries = Series;

impl Series {
    /// Create an empty series.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a series from unordered pairs.
    ///
    /// Pairs are sorted by date; when a day appears more than once the
    /// value that came last in the input wins.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        let mut pairs: Vec<(NaiveDate, f64)> = pairs.into_iter().collect();
        // Stable sort keeps input order within a day.
        pairs.sort_by_key(|(date, _)| *date);

        let mut series = Self::default();
        for (date, value) in pairs {
            if series.dates.last() == Some(&date) {
                if let Some(last) = series.values.last_mut() {
                    *last = value;
                }
            } else {
                series.dates.push(date);
                series.values.push(value);
            }
        }
        series
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Mutable access to the values; dates stay fixed.
    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// Iterate `(date, value)` pairs in date order.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.dates.iter().copied().zip(self.values.iter().copied())
    }

    /// Value on `date`, if observed.
    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.dates
            .binary_search(&date)
            .ok()
            .map(|idx| self.values[idx])
    }

    pub fn first(&self) -> Option<(NaiveDate, f64)> {
        self.iter().next()
    }

    pub fn last(&self) -> Option<(NaiveDate, f64)> {
        self.dates
            .last()
            .copied()
            .zip(self.values.last().copied())
    }

    /// Keep only the points matching `keep`.
    pub fn filter<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(NaiveDate, f64) -> bool,
    {
        let (dates, values) = self.iter().filter(|&(d, v)| keep(d, v)).unzip();
        Self { dates, values }
    }

    /// Points on or after `start`.
    pub fn since(&self, start: NaiveDate) -> Self {
        self.filter(|d, _| d >= start)
    }

    /// Day-over-day simple returns.
    ///
    /// The first date has no predecessor and is absent; so is any date
    /// whose return is not finite (a zero or missing previous price).
    pub fn pct_change(&self) -> ReturnSeries {
        let (dates, values) = self
            .values
            .windows(2)
            .zip(self.dates.iter().skip(1))
            .map(|(w, d)| (*d, w[1] / w[0] - 1.0))
            .filter(|(_, r)| r.is_finite())
            .unzip();
        Self { dates, values }
    }

    /// Cumulative growth of 1 + r, scaled so the curve starts from `base`.
    pub fn compound(&self, base: f64) -> Self {
        let mut equity = 1.0;
        let values = self
            .values
            .iter()
            .map(|r| {
                equity *= 1.0 + r;
                equity * base
            })
            .collect();
        Self {
            dates: self.dates.clone(),
            values,
        }
    }
}

impl FromIterator<(NaiveDate, f64)> for Series {
    fn from_iter<T: IntoIterator<Item = (NaiveDate, f64)>>(iter: T) -> Self {
        Self::from_pairs(iter)
    }
}

/// A holding in the portfolio.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    /// Ticker symbol (uppercase)
    pub symbol: String,
    /// Number of units held
    #[serde(alias = "shares")]
    pub quantity: f64,
    /// Average cost per unit
    pub cost_basis: f64,
    /// Last daily close (if available)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_price: Option<f64>,
    /// quantity * current_price
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_value: Option<f64>,
    /// Unrealized P/L in currency
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gain_loss: Option<f64>,
    /// Unrealized P/L percentage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gain_loss_percent: Option<f64>,
}

impl Position {
    /// Create a new position with the given symbol, quantity, and cost basis.
    pub fn new(symbol: &str, quantity: f64, cost_basis: f64) -> Self {
        Self {
            symbol: symbol.trim().to_uppercase(),
            quantity,
            cost_basis,
            current_price: None,
            market_value: None,
            gain_loss: None,
            gain_loss_percent: None,
        }
    }

    /// Calculate the total cost of this position.
    pub fn total_cost(&self) -> f64 {
        self.quantity * self.cost_basis
    }

    /// Value the position at `current_price`.
    ///
    /// P/L percentage is left unset when the cost is not positive.
    pub fn with_price(&self, current_price: f64) -> Self {
        let market_value = self.quantity * current_price;
        let total_cost = self.total_cost();
        let gain_loss = (current_price - self.cost_basis) * self.quantity;
        let gain_loss_percent = (total_cost > 0.0).then(|| gain_loss / total_cost * 100.0);

        Self {
            current_price: Some(current_price),
            market_value: Some(market_value),
            gain_loss: Some(gain_loss),
            gain_loss_percent,
            ..self.clone()
        }
    }
}

/// The set of positions tracked by the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Portfolio {
    /// File schema version, see `PortfolioTracker`
    #[serde(default)]
    pub version: u32,
    /// List of positions
    pub positions: Vec<Position>,
    /// When the portfolio was created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// When the portfolio was last updated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Portfolio {
    /// Create a new empty portfolio.
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculate total cost basis of all positions.
    pub fn total_cost(&self) -> f64 {
        self.positions.iter().map(|p| p.total_cost()).sum()
    }

    /// Total market value of positions that have been priced.
    pub fn total_market_value(&self) -> f64 {
        self.positions.iter().filter_map(|p| p.market_value).sum()
    }

    /// Get the number of positions.
    pub fn position_count(&self) -> usize {
        self.positions.len()
    }
}

/// Point forecast with optional confidence band.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastResult {
    /// Predicted values on future dates
    pub forecast: Series,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower: Option<Series>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper: Option<Series>,
    /// Human-readable model label
    pub method: String,
}

impl ForecastResult {
    /// Result for an empty input series.
    pub fn no_data() -> Self {
        Self {
            forecast: Series::new(),
            lower: None,
            upper: None,
            method: "No data".to_string(),
        }
    }

    pub fn has_band(&self) -> bool {
        self.lower.is_some() && self.upper.is_some()
    }
}

/// JSON envelope used by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response.
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.into()),
        }
    }
}
