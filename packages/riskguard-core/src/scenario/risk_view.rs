//! Risk panel: headline metrics, rolling volatility and correlations.

use super::Holdings;
use crate::config::EngineConfig;
use crate::data::PriceHistoryProvider;
use crate::portfolio::{
    annualized_volatility, correlation_matrix, historical_var_es, max_drawdown,
    parametric_var_es, rolling_volatility, sharpe_ratio, CorrelationMatrix, PositionProvider,
};
use crate::types::Series;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// VaR/ES estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarMethod {
    #[default]
    Parametric,
    Historical,
}

impl VarMethod {
    fn short_label(&self) -> &'static str {
        match self {
            VarMethod::Parametric => "Param",
            VarMethod::Historical => "Hist",
        }
    }

    /// Estimate `(var, es)` from daily returns.
    pub fn var_es(&self, returns: &[f64], alpha: f64) -> (f64, f64) {
        match self {
            VarMethod::Parametric => parametric_var_es(returns, alpha),
            VarMethod::Historical => historical_var_es(returns, alpha),
        }
    }
}

impl FromStr for VarMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "param" | "parametric" => Ok(VarMethod::Parametric),
            "hist" | "historical" => Ok(VarMethod::Historical),
            other => Err(Error::InvalidOperation(format!("Unknown VaR method '{}'", other))),
        }
    }
}

/// Everything the risk panel shows. Undefined metrics are NaN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskView {
    pub alpha: f64,
    pub method: VarMethod,
    pub observations: usize,
    pub ann_vol: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub var: f64,
    pub es: f64,
    /// Trailing annualized volatility
    pub rolling_vol: Series,
    /// Asset return correlations on the portfolio return dates
    pub correlation: CorrelationMatrix,
}

impl RiskView {
    /// Card labels such as `("VaR 95% (Param)", "ES 95% (Param)")`.
    pub fn labels(&self) -> (String, String) {
        let pct = (self.alpha * 100.0).floor() as i64;
        let tag = self.method.short_label();
        (
            format!("VaR {}% ({})", pct, tag),
            format!("ES {}% ({})", pct, tag),
        )
    }
}

/// Compute the risk panel for the current holdings.
pub fn risk_view<Q, P>(
    positions: &Q,
    provider: &P,
    config: &EngineConfig,
    alpha: f64,
    method: VarMethod,
) -> Result<RiskView>
where
    Q: PositionProvider + ?Sized,
    P: PriceHistoryProvider + ?Sized,
{
    let holdings = Holdings::load(positions, provider, config)?;
    let port_ret = holdings.returns(config.min_coverage);
    let returns = port_ret.values();

    let (var, es) = method.var_es(returns, alpha);
    let max_dd = if returns.is_empty() {
        f64::NAN
    } else {
        max_drawdown(returns)
    };

    Ok(RiskView {
        alpha,
        method,
        observations: returns.len(),
        ann_vol: annualized_volatility(returns),
        sharpe: sharpe_ratio(returns),
        max_drawdown: max_dd,
        var,
        es,
        rolling_vol: rolling_volatility(&port_ret, config.rolling_vol_window),
        correlation: correlation_matrix(&holdings.prices, port_ret.dates()),
    })
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{store, wiggle};
    use super::*;
    use crate::types::Position;
    use approx::assert_relative_eq;

    fn positions() -> Vec<Position> {
        vec![Position::new("AAPL", 10.0, 90.0), Position::new("MSFT", 20.0, 45.0)]
    }

    #[test]
    fn test_method_parse() {
        assert_eq!("param".parse::<VarMethod>().unwrap(), VarMethod::Parametric);
        assert_eq!("Historical".parse::<VarMethod>().unwrap(), VarMethod::Historical);
        assert!("monte-carlo".parse::<VarMethod>().is_err());
    }

    #[test]
    fn test_risk_view_panel() {
        let aapl = wiggle(100.0, 40, 0.002);
        let msft = wiggle(50.0, 40, 0.001);
        let store = store(&[("AAPL", &aapl), ("MSFT", &msft)]);
        let config = EngineConfig::default();

        let view = risk_view(&positions(), &store, &config, 0.95, VarMethod::Historical).unwrap();

        assert_eq!(view.observations, 39);
        assert!(view.ann_vol > 0.0);
        assert!(view.var > 0.0 && view.es >= view.var);
        assert!(view.max_drawdown <= 0.0);
        // 39 returns, first full 21-day window ends on the 21st
        assert_eq!(view.rolling_vol.len(), 19);
        assert_eq!(view.correlation.symbols, vec!["AAPL", "MSFT"]);
        assert_relative_eq!(view.correlation.get("AAPL", "AAPL").unwrap(), 1.0, epsilon = 1e-12);
        // Both alternate in step, so they move together
        assert!(view.correlation.get("AAPL", "MSFT").unwrap() > 0.9);

        let (var_label, es_label) = view.labels();
        assert_eq!(var_label, "VaR 95% (Hist)");
        assert_eq!(es_label, "ES 95% (Hist)");
    }

    #[test]
    fn test_parametric_matches_estimator() {
        let store = store(&[("AAPL", &wiggle(100.0, 30, 0.003))]);
        let positions = vec![Position::new("AAPL", 1.0, 100.0)];
        let config = EngineConfig::default();

        let view = risk_view(&positions, &store, &config, 0.99, VarMethod::Parametric).unwrap();
        let holdings = Holdings::load(&positions, &store, &config).unwrap();
        let (var, es) = parametric_var_es(holdings.returns(0.7).values(), 0.99);

        assert_relative_eq!(view.var, var, epsilon = 1e-12);
        assert_relative_eq!(view.es, es, epsilon = 1e-12);
        assert_eq!(view.labels().0, "VaR 99% (Param)");
    }

    #[test]
    fn test_no_returns_gives_nan_metrics() {
        let store = store(&[("AAPL", &[100.0])]);
        let positions = vec![Position::new("AAPL", 1.0, 100.0)];

        let view = risk_view(
            &positions,
            &store,
            &EngineConfig::default(),
            0.95,
            VarMethod::Parametric,
        )
        .unwrap();
        assert_eq!(view.observations, 0);
        assert!(view.max_drawdown.is_nan());
        assert!(view.var.is_nan());
        assert!(view.rolling_vol.is_empty());
    }
}
