//! Canonicalization of vendor OHLCV tables.

use crate::types::{PriceBar, PriceSeries};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A column header as delivered by a vendor: either a plain name or a
/// multi-level header such as `("Adj Close", "AAPL")`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnHeader {
    Flat(String),
    Nested(Vec<String>),
}

impl ColumnHeader {
    /// Collapse the header to one name.
    ///
    /// Nested headers keep their last level.
    pub fn flatten(&self) -> String {
        match self {
            Self::Flat(name) => name.clone(),
            Self::Nested(levels) => levels.last().cloned().unwrap_or_default(),
        }
    }
}

impl From<&str> for ColumnHeader {
    fn from(name: &str) -> Self {
        Self::Flat(name.to_string())
    }
}

/// A raw table cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
    Missing,
}

impl Cell {
    /// Numeric coercion: unparsable text and missing cells become NaN.
    pub fn to_f64(&self) -> f64 {
        match self {
            Self::Number(v) => *v,
            Self::Text(s) => s.trim().parse().unwrap_or(f64::NAN),
            Self::Missing => f64::NAN,
        }
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

/// A raw row label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Text(String),
    #[serde(skip)]
    Naive(NaiveDateTime),
    #[serde(skip)]
    Zoned(DateTime<chrono::FixedOffset>),
}

impl RawTimestamp {
    /// Coerce to a timezone-naive timestamp.
    ///
    /// Offsets are dropped keeping the local wall time. Returns `None` for
    /// anything unparsable.
    pub fn parse(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Naive(ts) => Some(*ts),
            Self::Zoned(ts) => Some(ts.naive_local()),
            Self::Text(s) => parse_timestamp(s.trim()),
        }
    }
}

impl From<&str> for RawTimestamp {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<NaiveDateTime> for RawTimestamp {
    fn from(ts: NaiveDateTime) -> Self {
        Self::Naive(ts)
    }
}

impl From<NaiveDate> for RawTimestamp {
    fn from(date: NaiveDate) -> Self {
        Self::Naive(date.and_time(NaiveTime::MIN))
    }
}

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.naive_local());
    }
    if let Ok(ts) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(ts.naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

/// Heterogeneous OHLCV table straight from a vendor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFrame {
    pub columns: Vec<ColumnHeader>,
    pub index: Vec<RawTimestamp>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawFrame {
    pub fn new(columns: Vec<ColumnHeader>) -> Self {
        Self {
            columns,
            ..Default::default()
        }
    }

    /// Append a row. Short rows are padded with missing cells on read.
    pub fn push_row(&mut self, ts: impl Into<RawTimestamp>, cells: Vec<Cell>) {
        self.index.push(ts.into());
        self.rows.push(cells);
    }

    /// Builder form of [`RawFrame::push_row`].
    pub fn with_row(mut self, ts: impl Into<RawTimestamp>, cells: Vec<Cell>) -> Self {
        self.push_row(ts, cells);
        self
    }

    /// A frame in canonical layout holding `series`.
    pub fn from_series(series: &PriceSeries) -> Self {
        let mut frame = Self::new(PriceBar::COLUMNS.iter().map(|&c| c.into()).collect());
        for bar in series {
            frame.push_row(bar.timestamp, bar.values().iter().map(|&v| v.into()).collect());
        }
        frame
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Canonical OHLCV fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Open,
    High,
    Low,
    Close,
    AdjClose,
    Volume,
}

impl Field {
    fn from_alias(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "open" => Some(Self::Open),
            "high" => Some(Self::High),
            "low" => Some(Self::Low),
            "close" => Some(Self::Close),
            "adj close" | "adjclose" | "adj_close" => Some(Self::AdjClose),
            "volume" => Some(Self::Volume),
            _ => None,
        }
    }
}

/// Column positions of the canonical fields found in a frame.
#[derive(Debug, Default)]
struct Layout {
    open: Option<usize>,
    high: Option<usize>,
    low: Option<usize>,
    close: Option<usize>,
    adj_close: Option<usize>,
    volume: Option<usize>,
}

impl Layout {
    fn of(frame: &RawFrame) -> Self {
        let mut layout = Self::default();
        for (idx, header) in frame.columns.iter().enumerate() {
            let slot = match Field::from_alias(&header.flatten()) {
                Some(Field::Open) => &mut layout.open,
                Some(Field::High) => &mut layout.high,
                Some(Field::Low) => &mut layout.low,
                Some(Field::Close) => &mut layout.close,
                Some(Field::AdjClose) => &mut layout.adj_close,
                Some(Field::Volume) => &mut layout.volume,
                None => continue,
            };
            slot.get_or_insert(idx);
        }
        layout
    }
}

/// Canonicalize a vendor table into a date-ordered [`PriceSeries`].
///
/// Rows with unparsable timestamps are dropped, duplicate timestamps keep
/// the last row, and rows without a finite close are dropped after
/// deduplication. Open/High/Low fall back to Close when their column is
/// absent; AdjClose does too. An absent or missing volume is zero.
pub fn normalize(frame: &RawFrame) -> PriceSeries {
    if frame.is_empty() {
        return PriceSeries::new();
    }

    let layout = Layout::of(frame);
    let mut by_ts: BTreeMap<NaiveDateTime, PriceBar> = BTreeMap::new();
    let mut dropped = 0usize;

    for (raw_ts, row) in frame.index.iter().zip(&frame.rows) {
        let Some(timestamp) = raw_ts.parse() else {
            dropped += 1;
            continue;
        };
        let cell = |col: Option<usize>| {
            col.and_then(|idx| row.get(idx))
                .map(Cell::to_f64)
                .unwrap_or(f64::NAN)
        };

        let close = cell(layout.close);
        let or_close = |col: Option<usize>| if col.is_some() { cell(col) } else { close };

        // Later rows overwrite earlier ones with the same timestamp.
        by_ts.insert(
            timestamp,
            PriceBar {
                timestamp,
                open: or_close(layout.open),
                high: or_close(layout.high),
                low: or_close(layout.low),
                close,
                adj_close: or_close(layout.adj_close),
                volume: cell(layout.volume),
            },
        );
    }

    if dropped > 0 {
        tracing::debug!("Dropped {} rows with invalid timestamps", dropped);
    }

    by_ts
        .into_values()
        .filter(|bar| bar.close.is_finite())
        .map(|mut bar| {
            if bar.volume.is_nan() {
                bar.volume = 0.0;
            }
            bar
        })
        .collect()
}

/// Collapse intraday bars to one bar per calendar day.
///
/// Open is the first value of the day, High the max, Low the min,
/// Close/AdjClose the last, Volume the sum; missing values are skipped.
/// Days without a finite close are dropped.
pub fn resample_to_daily(series: &PriceSeries) -> PriceSeries {
    let mut days: BTreeMap<NaiveDate, Vec<&PriceBar>> = BTreeMap::new();
    for bar in series {
        days.entry(bar.date()).or_default().push(bar);
    }

    days.into_iter()
        .filter_map(|(date, mut bars)| {
            bars.sort_by_key(|bar| bar.timestamp);
            let first = |f: fn(&PriceBar) -> f64| {
                bars.iter().map(|b| f(b)).find(|v| !v.is_nan()).unwrap_or(f64::NAN)
            };
            let last = |f: fn(&PriceBar) -> f64| {
                bars.iter().rev().map(|b| f(b)).find(|v| !v.is_nan()).unwrap_or(f64::NAN)
            };
            let valid = |f: fn(&PriceBar) -> f64| {
                bars.iter().map(move |b| f(b)).filter(|v| !v.is_nan())
            };

            let close = last(|b| b.close);
            if !close.is_finite() {
                return None;
            }

            Some(PriceBar {
                timestamp: date.and_time(NaiveTime::MIN),
                open: first(|b| b.open),
                high: valid(|b| b.high).fold(f64::NAN, f64::max),
                low: valid(|b| b.low).fold(f64::NAN, f64::min),
                close,
                adj_close: last(|b| b.adj_close),
                volume: valid(|b| b.volume).sum(),
            })
        })
        .collect()
}
