//! ARIMA(1,1,1) fitted by conditional sum of squares.

use super::ForecastStrategy;
use crate::types::{ForecastResult, Series};
use crate::{Error, Result};
use chrono::NaiveDate;
use statrs::distribution::{ContinuousCDF, Normal};

/// Fitted ARIMA(1,1,1) without a constant term.
///
/// On the first difference `d`: `d[t] = phi * d[t-1] + e[t] + theta * e[t-1]`.
/// Parameters are unconstrained: neither stationarity nor invertibility is
/// enforced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arima111 {
    pub phi: f64,
    pub theta: f64,
    /// Innovation variance
    pub sigma2: f64,
    last_level: f64,
    last_diff: f64,
    last_resid: f64,
}

/// One-step residuals under `(phi, theta)`, with the pre-sample error at zero.
fn residuals(diffs: &[f64], phi: f64, theta: f64) -> Vec<f64> {
    let mut resid = vec![0.0; diffs.len()];
    for t in 1..diffs.len() {
        resid[t] = diffs[t] - phi * diffs[t - 1] - theta * resid[t - 1];
    }
    resid
}

fn css(diffs: &[f64], params: [f64; 2]) -> f64 {
    let sse: f64 = residuals(diffs, params[0], params[1])[1..]
        .iter()
        .map(|e| e * e)
        .sum();
    if sse.is_finite() {
        sse
    } else {
        f64::INFINITY
    }
}

/// Minimise `f` over two parameters with the Nelder-Mead simplex.
fn nelder_mead<F>(f: F, start: [f64; 2], step: f64, max_iter: usize, tol: f64) -> [f64; 2]
where
    F: Fn([f64; 2]) -> f64,
{
    let mut simplex = [
        start,
        [start[0] + step, start[1]],
        [start[0], start[1] + step],
    ];
    let mut scores = simplex.map(&f);

    let lerp = |a: [f64; 2], b: [f64; 2], t: f64| {
        [a[0] + t * (b[0] - a[0]), a[1] + t * (b[1] - a[1])]
    };

    for _ in 0..max_iter {
        let mut order = [0, 1, 2];
        order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));
        simplex = order.map(|i| simplex[i]);
        scores = order.map(|i| scores[i]);

        if (scores[2] - scores[0]).abs() <= tol * (1.0 + scores[0].abs()) {
            break;
        }

        let centroid = lerp(simplex[0], simplex[1], 0.5);
        let reflected = lerp(centroid, simplex[2], -1.0);
        let fr = f(reflected);

        if fr < scores[0] {
            let expanded = lerp(centroid, simplex[2], -2.0);
            let fe = f(expanded);
            if fe < fr {
                simplex[2] = expanded;
                scores[2] = fe;
            } else {
                simplex[2] = reflected;
                scores[2] = fr;
            }
        } else if fr < scores[1] {
            simplex[2] = reflected;
            scores[2] = fr;
        } else {
            let contracted = if fr < scores[2] {
                lerp(centroid, reflected, 0.5)
            } else {
                lerp(centroid, simplex[2], 0.5)
            };
            let fc = f(contracted);
            if fc < scores[2].min(fr) {
                simplex[2] = contracted;
                scores[2] = fc;
            } else {
                for i in 1..3 {
                    simplex[i] = lerp(simplex[0], simplex[i], 0.5);
                    scores[i] = f(simplex[i]);
                }
            }
        }
    }

    let best = (0..3)
        .min_by(|&a, &b| scores[a].total_cmp(&scores[b]))
        .unwrap_or(0);
    simplex[best]
}

impl Arima111 {
    /// Fit on levels. Needs at least four observations.
    pub fn fit(levels: &[f64]) -> Result<Self> {
        if levels.len() < 4 {
            return Err(Error::ModelFailure(format!(
                "ARIMA(1,1,1) needs 4 observations, got {}",
                levels.len()
            )));
        }
        let diffs: Vec<f64> = levels.windows(2).map(|w| w[1] - w[0]).collect();
        if diffs.iter().any(|d| !d.is_finite()) {
            return Err(Error::ModelFailure("Non-finite differences".to_string()));
        }

        let [phi, theta] = nelder_mead(|p| css(&diffs, p), [0.0, 0.0], 0.1, 500, 1e-10);
        let resid = residuals(&diffs, phi, theta);
        let sse: f64 = resid[1..].iter().map(|e| e * e).sum();
        let sigma2 = sse / (diffs.len() - 1) as f64;

        if !(phi.is_finite() && theta.is_finite() && sigma2.is_finite()) {
            return Err(Error::ModelFailure("CSS fit diverged".to_string()));
        }

        Ok(Self {
            phi,
            theta,
            sigma2,
            last_level: levels[levels.len() - 1],
            last_diff: diffs[diffs.len() - 1],
            last_resid: resid[resid.len() - 1],
        })
    }

    /// Level forecasts and their standard errors for `steps` ahead.
    pub fn predict(&self, steps: usize) -> (Vec<f64>, Vec<f64>) {
        let mut levels = Vec::with_capacity(steps);
        let mut level = self.last_level;
        let mut diff = self.last_diff;
        for h in 0..steps {
            diff = if h == 0 {
                self.phi * diff + self.theta * self.last_resid
            } else {
                self.phi * diff
            };
            level += diff;
            levels.push(level);
        }

        // psi weights of the differenced ARMA, integrated to levels
        let mut std_errs = Vec::with_capacity(steps);
        let mut psi_d = 1.0;
        let mut psi_y = 0.0;
        let mut acc = 0.0;
        for j in 0..steps {
            if j == 1 {
                psi_d = self.phi + self.theta;
            } else if j > 1 {
                psi_d *= self.phi;
            }
            psi_y += psi_d;
            acc += psi_y * psi_y;
            std_errs.push((self.sigma2 * acc).sqrt());
        }

        (levels, std_errs)
    }
}

/// ARIMA(1,1,1) forecast with a normal confidence band.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArimaStrategy;

impl ForecastStrategy for ArimaStrategy {
    fn name(&self) -> &'static str {
        "arima"
    }

    fn forecast(
        &self,
        series: &Series,
        future: &[NaiveDate],
        alpha: f64,
    ) -> Result<ForecastResult> {
        if !(0.0..1.0).contains(&alpha) {
            return Err(Error::ModelFailure(format!("No interval at alpha {}", alpha)));
        }
        let model = Arima111::fit(series.values())?;
        let (levels, std_errs) = model.predict(future.len());
        if levels.iter().any(|v| !v.is_finite()) {
            return Err(Error::ModelFailure("Forecast is not finite".to_string()));
        }

        let z = Normal::new(0.0, 1.0)
            .map_err(|e| Error::ModelFailure(e.to_string()))?
            .inverse_cdf((1.0 + alpha) / 2.0);

        let band = |sign: f64| -> Series {
            future
                .iter()
                .zip(levels.iter().zip(&std_errs))
                .map(|(d, (v, se))| (*d, v + sign * z * se))
                .collect()
        };

        Ok(ForecastResult {
            forecast: future.iter().copied().zip(levels.iter().copied()).collect(),
            lower: Some(band(-1.0)),
            upper: Some(band(1.0)),
            method: "SARIMAX(1,1,1)".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Days;

    /// AR(1) differences with a deterministic innovation sequence.
    fn ar_levels(phi: f64, n: usize) -> Vec<f64> {
        let shocks = [0.5, -0.3, 0.8, -0.6, 0.1, -0.9, 0.4, 0.2, -0.4, 0.7, -0.2];
        let mut levels = vec![100.0];
        let mut d = 0.0;
        for i in 0..n {
            d = phi * d + shocks[(i * 7) % shocks.len()];
            let next = levels[levels.len() - 1] + d;
            levels.push(next);
        }
        levels
    }

    #[test]
    fn test_nelder_mead_quadratic() {
        let min = nelder_mead(
            |p| (p[0] - 1.5).powi(2) + 2.0 * (p[1] + 0.5).powi(2),
            [0.0, 0.0],
            0.1,
            1000,
            1e-14,
        );
        assert_relative_eq!(min[0], 1.5, epsilon = 1e-4);
        assert_relative_eq!(min[1], -0.5, epsilon = 1e-4);
    }

    #[test]
    fn test_fit_recovers_ar_coefficient() {
        let model = Arima111::fit(&ar_levels(0.6, 400)).unwrap();
        // phi and theta trade off on short samples; their sum is well identified
        assert!((model.phi + model.theta - 0.6).abs() < 0.3);
        assert!(model.sigma2 > 0.0);
    }

    #[test]
    fn test_predict_widens() {
        let model = Arima111::fit(&ar_levels(0.3, 200)).unwrap();
        let (levels, std_errs) = model.predict(10);
        assert_eq!(levels.len(), 10);
        assert!(std_errs.windows(2).all(|w| w[1] >= w[0]));
        assert_relative_eq!(std_errs[0], model.sigma2.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_too_short_fails() {
        assert!(matches!(
            Arima111::fit(&[1.0, 2.0, 3.0]),
            Err(Error::ModelFailure(_))
        ));
    }

    #[test]
    fn test_strategy_band_contains_forecast() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let series: Series = ar_levels(0.2, 60)
            .into_iter()
            .enumerate()
            .map(|(i, v)| (start + Days::new(i as u64), v))
            .collect();
        let future: Vec<NaiveDate> = (0..5).map(|i| start + Days::new(100 + i)).collect();

        let result = ArimaStrategy.forecast(&series, &future, 0.95).unwrap();
        assert_eq!(result.method, "SARIMAX(1,1,1)");
        let (lo, hi) = (result.lower.unwrap(), result.upper.unwrap());
        for i in 0..5 {
            let v = result.forecast.values()[i];
            assert!(lo.values()[i] < v && v < hi.values()[i]);
        }
    }
}
