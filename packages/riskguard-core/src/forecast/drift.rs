//! Straight-line drift, the fallback that always succeeds.

use super::ForecastStrategy;
use crate::types::{ForecastResult, Series};
use crate::{Error, Result};
use chrono::NaiveDate;

/// Extend the average step `(last - first) / n` from the last value.
///
/// A single observation is repeated. No band.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriftStrategy;

impl ForecastStrategy for DriftStrategy {
    fn name(&self) -> &'static str {
        "drift"
    }

    fn forecast(
        &self,
        series: &Series,
        future: &[NaiveDate],
        _alpha: f64,
    ) -> Result<ForecastResult> {
        let (Some((_, first)), Some((_, last))) = (series.first(), series.last()) else {
            return Err(Error::InsufficientData("Drift needs one observation".to_string()));
        };

        let slope = if series.len() > 1 {
            (last - first) / series.len() as f64
        } else {
            0.0
        };

        Ok(ForecastResult {
            forecast: future
                .iter()
                .enumerate()
                .map(|(i, d)| (*d, last + slope * (i + 1) as f64))
                .collect(),
            lower: None,
            upper: None,
            method: "Drift".to_string(),
        })
    }
}
