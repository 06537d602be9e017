//! # Forecast Intervals
//!
//! $$
//! \hat y_{T+h} \pm z_{(1+c)/2}\,\sqrt{\operatorname{Var}_h},\qquad
//! \operatorname{Var}_h=\sigma^2\sum_{j<h}\psi_j^2
//! $$
//!
//! When `σ²` cannot be estimated the half-width falls back to
//! `z · 2 · vol · √h` with `vol` the volatility of the target's first
//! differences, and the result is flagged `interval_degraded`.

use chrono::NaiveDate;
use serde::Deserialize;
use serde::Serialize;
use statrs::distribution::ContinuousCDF;
use statrs::distribution::Normal;
use tracing::warn;

use super::sarimax::EstimatorKind;
use super::sarimax::FitMetrics;
use super::sarimax::FittedModel;
use crate::data::Interval;
use crate::error::FolioError;
use crate::error::Result;

/// Scale of the fallback half-width when even the volatility is unknown.
const LEVEL_FRACTION: f64 = 0.1;
/// Longest horizon a builder accepts unless configured otherwise.
pub const DEFAULT_MAX_HORIZON: i64 = 1000;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
  pub dates: Vec<NaiveDate>,
  pub point_forecast: Vec<f64>,
  pub lower_bound: Vec<f64>,
  pub upper_bound: Vec<f64>,
  pub confidence: f64,
  pub fit_metrics: FitMetrics,
  pub interval_degraded: bool,
  pub method: EstimatorKind,
}

impl ForecastResult {
  pub fn horizon(&self) -> usize {
    self.point_forecast.len()
  }
}

#[derive(Clone, Copy, Debug)]
pub struct ForecastIntervalBuilder {
  confidence: f64,
  z: f64,
  interval: Interval,
  max_horizon: i64,
}

impl ForecastIntervalBuilder {
  pub fn new(confidence: f64, interval: Interval) -> Result<Self> {
    if !(confidence > 0.0 && confidence < 1.0) {
      return Err(FolioError::InvalidParameter(format!(
        "confidence must be in (0, 1), got {confidence}"
      )));
    }
    let normal = Normal::new(0.0, 1.0).map_err(|e| FolioError::InvalidParameter(e.to_string()))?;
    let z = normal.inverse_cdf((1.0 + confidence) / 2.0);
    Ok(Self {
      confidence,
      z,
      interval,
      max_horizon: DEFAULT_MAX_HORIZON,
    })
  }

  /// Horizons above `max_horizon` are rejected with `InvalidHorizon`.
  pub fn with_max_horizon(mut self, max_horizon: i64) -> Self {
    self.max_horizon = max_horizon;
    self
  }

  pub fn z(&self) -> f64 {
    self.z
  }

  pub fn build(&self, model: &FittedModel, horizon: i64) -> Result<ForecastResult> {
    if horizon <= 0 || horizon > self.max_horizon {
      return Err(FolioError::InvalidHorizon(horizon));
    }
    let h = usize::try_from(horizon).map_err(|_| FolioError::InvalidHorizon(horizon))?;

    let point = model.point_forecast(h);
    if point.len() != h || point.iter().any(|v| !v.is_finite()) {
      return Err(FolioError::Convergence(format!(
        "{} produced non-finite point forecasts",
        model.order()
      )));
    }

    let variance = model
      .forecast_variance(h)
      .filter(|v| v.len() == h && v.iter().all(|x| x.is_finite() && *x >= 0.0));

    let (half_width, degraded): (Vec<f64>, bool) = match variance {
      Some(v) => (v.iter().map(|var| self.z * var.sqrt()).collect(), false),
      None => {
        let scale = model
          .volatility()
          .filter(|v| v.is_finite())
          .map(|v| 2.0 * v)
          .unwrap_or_else(|| LEVEL_FRACTION * model.last_value().abs());
        warn!(
          order = %model.order(),
          scale,
          "residual variance unavailable, using volatility-scaled interval"
        );
        (
          (1..=h)
            .map(|step| self.z * scale * (step as f64).sqrt())
            .collect(),
          true,
        )
      }
    };

    let lower_bound = point.iter().zip(&half_width).map(|(p, w)| p - w).collect();
    let upper_bound = point.iter().zip(&half_width).map(|(p, w)| p + w).collect();

    let dates = match model.last_date() {
      Some(last) => self.interval.future_dates(last, h),
      None => Vec::new(),
    };
    if dates.len() != h {
      return Err(FolioError::InsufficientData(
        "cannot derive forecast dates without a last observation date".into(),
      ));
    }

    Ok(ForecastResult {
      dates,
      point_forecast: point,
      lower_bound,
      upper_bound,
      confidence: self.confidence,
      fit_metrics: *model.metrics(),
      interval_degraded: degraded || model.is_degraded(),
      method: model.method(),
    })
  }
}
