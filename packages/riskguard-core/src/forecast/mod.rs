//! Price forecasting with a fallback cascade.
//!
//! [`ForecastEngine`] holds an ordered list of strategies and returns the
//! first one that succeeds. The default list is boosted-tree quantile
//! regression, then ARIMA(1,1,1), then linear drift; the first two sit
//! behind the `gbm` and `arima` cargo features.
//!
//! # Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use riskguard_core::forecast::forecast;
//! use riskguard_core::types::Series;
//!
//! let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let closes: Series = (0..3)
//!     .map(|i| (start + chrono::Days::new(i), 100.0 + i as f64))
//!     .collect();
//!
//! let result = forecast(&closes, 5, 0.95);
//! assert_eq!(result.forecast.len(), 5);
//! ```

#[cfg(feature = "arima")]
pub mod arima;
pub mod drift;
pub mod features;
#[cfg(feature = "gbm")]
pub mod gbm;

use crate::types::{ForecastResult, Series};
use crate::Result;
use chrono::{Datelike, Days, Months, NaiveDate, Weekday};

pub use drift::DriftStrategy;

/// One forecasting model in the cascade.
pub trait ForecastStrategy {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether the strategy can run in this build.
    fn is_available(&self) -> bool {
        true
    }

    /// Forecast one value per date in `future`.
    fn forecast(&self, series: &Series, future: &[NaiveDate], alpha: f64) -> Result<ForecastResult>;
}

/// Spacing of a date index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    BusinessDay,
    /// Fixed step of this many calendar days
    Days(u64),
    /// Same day of the following month, clamped to the month end
    Monthly,
}

impl Frequency {
    /// Infer the spacing of `dates`.
    ///
    /// Equal gaps give `Daily` or `Days(k)`. Otherwise the lower median gap
    /// decides: 28 to 31 days is `Monthly`, five or more is `Days(median)`,
    /// anything shorter is business days. Fewer than three dates are
    /// treated as business days.
    pub fn infer(dates: &[NaiveDate]) -> Self {
        if dates.len() < 3 {
            return Frequency::BusinessDay;
        }

        let mut gaps: Vec<i64> = dates
            .windows(2)
            .map(|w| (w[1] - w[0]).num_days())
            .collect();
        let first_gap = gaps[0];
        if gaps.iter().all(|g| *g == first_gap) {
            return match first_gap {
                1 => Frequency::Daily,
                k if k > 1 => Frequency::Days(k as u64),
                _ => Frequency::BusinessDay,
            };
        }

        gaps.sort_unstable();
        match gaps[(gaps.len() - 1) / 2] {
            28..=31 => Frequency::Monthly,
            k if k >= 5 => Frequency::Days(k as u64),
            _ => Frequency::BusinessDay,
        }
    }

    /// The next date after `date` at this frequency.
    pub fn step(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Frequency::Daily => date + Days::new(1),
            Frequency::Days(k) => date + Days::new(*k),
            Frequency::Monthly => month_after(date, 1),
            Frequency::BusinessDay => {
                let mut next = date + Days::new(1);
                while matches!(next.weekday(), Weekday::Sat | Weekday::Sun) {
                    next = next + Days::new(1);
                }
                next
            }
        }
    }

    /// `steps` dates strictly after `last`.
    pub fn dates_after(&self, last: NaiveDate, steps: usize) -> Vec<NaiveDate> {
        if let Frequency::Monthly = self {
            // Anchor on `last` so a month-end start does not creep earlier.
            return (1..=steps as u32).map(|i| month_after(last, i)).collect();
        }

        let mut dates = Vec::with_capacity(steps);
        let mut current = last;
        for _ in 0..steps {
            current = self.step(current);
            dates.push(current);
        }
        dates
    }
}

fn month_after(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months))
        .unwrap_or(date + Days::new(30 * u64::from(months)))
}

/// Ordered list of strategies tried until one succeeds.
pub struct ForecastEngine {
    strategies: Vec<Box<dyn ForecastStrategy>>,
}

impl Default for ForecastEngine {
    fn default() -> Self {
        let mut strategies: Vec<Box<dyn ForecastStrategy>> = Vec::new();
        #[cfg(feature = "gbm")]
        strategies.push(Box::new(gbm::GbmQuantileStrategy));
        #[cfg(feature = "arima")]
        strategies.push(Box::new(arima::ArimaStrategy));
        strategies.push(Box::new(DriftStrategy));
        Self { strategies }
    }
}

impl ForecastEngine {
    /// Engine over a custom cascade. Drift is appended when absent so
    /// that a forecast always exists.
    pub fn new(mut strategies: Vec<Box<dyn ForecastStrategy>>) -> Self {
        if !strategies.iter().any(|s| s.name() == "drift") {
            strategies.push(Box::new(DriftStrategy));
        }
        Self { strategies }
    }

    /// Names of the strategies in cascade order.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Forecast `steps` points past the end of `series`.
    ///
    /// An empty series yields an empty forecast labelled "No data".
    pub fn forecast(&self, series: &Series, steps: usize, alpha: f64) -> ForecastResult {
        let clean = series.filter(|_, v| v.is_finite());
        let Some((last, last_value)) = clean.last() else {
            return ForecastResult::no_data();
        };

        let future = Frequency::infer(clean.dates()).dates_after(last, steps);

        for strategy in self.strategies.iter().filter(|s| s.is_available()) {
            match strategy.forecast(&clean, &future, alpha) {
                Ok(result) => return result,
                Err(e) => tracing::debug!("Forecast strategy {} failed: {}", strategy.name(), e),
            }
        }

        // Unreachable with drift in the list; keep a flat line regardless.
        ForecastResult {
            forecast: future.iter().map(|d| (*d, last_value)).collect(),
            lower: None,
            upper: None,
            method: "Drift".to_string(),
        }
    }
}

/// Forecast with the default cascade.
pub fn forecast(series: &Series, steps: usize, alpha: f64) -> ForecastResult {
    ForecastEngine::default().forecast(series, steps, alpha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct Failing;

    impl ForecastStrategy for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn forecast(&self, _: &Series, _: &[NaiveDate], _: f64) -> Result<ForecastResult> {
            Err(Error::ModelFailure("always".to_string()))
        }
    }

    struct Disabled;

    impl ForecastStrategy for Disabled {
        fn name(&self) -> &'static str {
            "disabled"
        }

        fn is_available(&self) -> bool {
            false
        }

        fn forecast(&self, _: &Series, _: &[NaiveDate], _: f64) -> Result<ForecastResult> {
            unreachable!("never called when unavailable")
        }
    }

    #[test]
    fn test_infer_frequency() {
        let daily = [date(2024, 1, 1), date(2024, 1, 2), date(2024, 1, 3)];
        assert_eq!(Frequency::infer(&daily), Frequency::Daily);

        let weekly = [date(2024, 1, 1), date(2024, 1, 8), date(2024, 1, 15)];
        assert_eq!(Frequency::infer(&weekly), Frequency::Days(7));

        // Fri -> Mon -> Tue is business-day spacing
        let business = [date(2024, 1, 5), date(2024, 1, 8), date(2024, 1, 9)];
        assert_eq!(Frequency::infer(&business), Frequency::BusinessDay);

        assert_eq!(Frequency::infer(&daily[..2]), Frequency::BusinessDay);
    }

    #[test]
    fn test_infer_uneven_spacing_from_median_gap() {
        let month_ends = [
            date(2023, 10, 31),
            date(2023, 11, 30),
            date(2023, 12, 29),
            date(2024, 1, 31),
            date(2024, 2, 29),
        ];
        assert_eq!(Frequency::infer(&month_ends), Frequency::Monthly);

        // Weekly with one holiday shift
        let weekly = [
            date(2024, 1, 5),
            date(2024, 1, 12),
            date(2024, 1, 18),
            date(2024, 1, 26),
            date(2024, 2, 2),
        ];
        assert_eq!(Frequency::infer(&weekly), Frequency::Days(7));
    }

    #[test]
    fn test_monthly_dates_stay_on_month_end() {
        let dates = Frequency::Monthly.dates_after(date(2024, 1, 31), 3);
        assert_eq!(dates, vec![date(2024, 2, 29), date(2024, 3, 31), date(2024, 4, 30)]);

        let start = date(2023, 1, 15);
        let monthly: Series = (0..12)
            .map(|i| (month_after(start, i), 100.0 + i as f64))
            .collect();
        let result = forecast(&monthly, 2, 0.95);
        assert_eq!(
            result.forecast.dates(),
            &[date(2024, 1, 15), date(2024, 2, 15)]
        );
    }

    #[test]
    fn test_business_days_after_friday() {
        let dates = Frequency::BusinessDay.dates_after(date(2024, 1, 5), 3);
        assert_eq!(dates, vec![date(2024, 1, 8), date(2024, 1, 9), date(2024, 1, 10)]);

        let dates = Frequency::Days(7).dates_after(date(2024, 1, 5), 2);
        assert_eq!(dates, vec![date(2024, 1, 12), date(2024, 1, 19)]);
    }

    #[test]
    fn test_empty_series_has_no_data() {
        let result = forecast(&Series::new(), 10, 0.95);
        assert!(result.forecast.is_empty());
        assert!(!result.has_band());
        assert_eq!(result.method, "No data");
    }

    #[test]
    fn test_cascade_falls_through_to_drift() {
        let engine = ForecastEngine::new(vec![Box::new(Disabled), Box::new(Failing)]);
        assert_eq!(engine.strategy_names(), vec!["disabled", "failing", "drift"]);

        let series: Series = vec![(date(2024, 1, 1), 10.0), (date(2024, 1, 2), 11.0)]
            .into_iter()
            .collect();
        let result = engine.forecast(&series, 3, 0.95);
        assert_eq!(result.method, "Drift");
        // Two points: business-day stepping from Tue Jan 2
        assert_eq!(result.forecast.dates()[0], date(2024, 1, 3));
        assert_eq!(result.forecast.len(), 3);
    }

    #[test]
    fn test_single_point_uses_drift() {
        let series: Series = vec![(date(2024, 1, 5), 42.0)].into_iter().collect();
        let result = forecast(&series, 4, 0.95);

        assert_eq!(result.method, "Drift");
        assert_eq!(result.forecast.values(), &[42.0; 4]);
        assert_eq!(result.forecast.dates()[0], date(2024, 1, 8));
    }

    #[test]
    fn test_dates_strictly_after_last() {
        let start = date(2024, 1, 1);
        let series: Series = (0..40)
            .map(|i| (start + Days::new(i), 100.0 + (i % 5) as f64))
            .collect();
        let result = forecast(&series, 7, 0.9);

        assert_eq!(result.forecast.len(), 7);
        let last = series.last().unwrap().0;
        assert!(result.forecast.dates().iter().all(|d| *d > last));
        assert_eq!(result.forecast.dates()[0], last + Days::new(1));
    }
}
