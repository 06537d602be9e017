//! # Linear Trend Fallback
//!
//! $$
//! y_t=a+bt+\varepsilon_t,\qquad
//! \operatorname{Var}(\hat y_{n+h}-y_{n+h})=\hat\sigma^2\left(1+\frac1n+\frac{(t_{n+h}-\bar t)^2}{S_{tt}}\right)
//! $$
//!
//! Degraded strategy: a least-squares line through the target. Exogenous
//! regressors and the requested orders are ignored.

use tracing::debug;

use super::order::SarimaOrder;
use super::sarimax::difference_volatility;
use super::sarimax::gaussian_aic;
use super::sarimax::Coefficients;
use super::sarimax::Dynamics;
use super::sarimax::Estimator;
use super::sarimax::EstimatorKind;
use super::sarimax::FitMetrics;
use super::sarimax::FittedModel;
use super::sarimax::ModelInput;
use crate::error::FolioError;
use crate::error::Result;
use crate::stats::ols::ols;

#[derive(Clone, Copy, Debug, Default)]
pub struct LinearTrendFallbackEstimator;

#[derive(Clone, Debug)]
pub(crate) struct TrendDynamics {
  intercept: f64,
  slope: f64,
  n: usize,
  t_mean: f64,
  stt: f64,
}

impl TrendDynamics {
  pub(crate) fn point_forecast(&self, horizon: usize) -> Vec<f64> {
    (1..=horizon)
      .map(|h| self.intercept + self.slope * (self.n - 1 + h) as f64)
      .collect()
  }

  pub(crate) fn variance(&self, sigma2: f64, horizon: usize) -> Vec<f64> {
    let n = self.n as f64;
    (1..=horizon)
      .map(|h| {
        let t = (self.n - 1 + h) as f64;
        sigma2 * (1.0 + 1.0 / n + (t - self.t_mean).powi(2) / self.stt)
      })
      .collect()
  }
}

impl Estimator for LinearTrendFallbackEstimator {
  fn kind(&self) -> EstimatorKind {
    EstimatorKind::LinearTrendFallback
  }

  fn fit(&self, input: &ModelInput, order: &SarimaOrder) -> Result<FittedModel> {
    let n = input.n_obs();
    if n < 3 {
      return Err(FolioError::InsufficientData(format!(
        "linear trend needs at least 3 observations, got {n}"
      )));
    }
    if input.n_exog() > 0 {
      debug!(regressors = input.n_exog(), "linear trend ignores exogenous regressors");
    }

    let design: Vec<Vec<f64>> = (0..n).map(|t| vec![1.0, t as f64]).collect();
    let fit = ols(&input.target, &design)?;
    let (intercept, slope) = (fit.beta[0], fit.beta[1]);

    let fitted: Vec<f64> = design.iter().map(|row| fit.predict(row)).collect();
    let metrics = FitMetrics::new(gaussian_aic(fit.sse, n, 2), &input.target, &fitted);

    let t_mean = (n - 1) as f64 / 2.0;
    let stt = (0..n).map(|t| (t as f64 - t_mean).powi(2)).sum::<f64>();

    Ok(FittedModel {
      order: *order,
      method: EstimatorKind::LinearTrendFallback,
      coefficients: Coefficients {
        intercept: Some(intercept),
        trend: Some(slope),
        ..Coefficients::default()
      },
      exog_names: Vec::new(),
      sigma2: Some(fit.sigma2),
      metrics,
      n_obs: n,
      last_date: input.last_date(),
      last_value: input.target[n - 1],
      volatility: difference_volatility(&input.target),
      dynamics: Dynamics::LinearTrend(TrendDynamics {
        intercept,
        slope,
        n,
        t_mean,
        stt,
      }),
    })
  }
}
