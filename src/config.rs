//! # Configuration
//!
//! Runtime knobs for both pipelines. Every section has a [`Default`] and is
//! deserializable from partial JSON, so callers only spell out what they change.

use std::time::Duration;
use std::time::Instant;

use serde::Deserialize;
use serde::Serialize;

use crate::data::AlignmentMode;
use crate::error::FolioError;
use crate::error::Result;
use crate::forecast::evaluation::DEFAULT_HOLDOUT_FRACTION;
use crate::forecast::interval::DEFAULT_MAX_HORIZON;
use crate::forecast::EstimatorKind;
use crate::forecast::SearchSpace;
use crate::forecast::SearchStrategy;

/// Top-level configuration shared by [`crate::PortfolioEngine`] and [`crate::ForecastEngine`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FolioConfig {
  pub data: DataConfig,
  pub frontier: FrontierConfig,
  pub forecast: ForecastConfig,
}

impl FolioConfig {
  pub fn from_json_str(raw: &str) -> Result<Self> {
    let cfg: Self = serde_json::from_str(raw)
      .map_err(|e| FolioError::InvalidParameter(format!("config: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
  }

  pub fn validate(&self) -> Result<()> {
    self.frontier.validate()?;
    self.forecast.validate()
  }
}

/// Market data retrieval and alignment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
  /// How non-reference tickers are mapped onto the reference calendar.
  pub alignment: AlignmentMode,
  /// Extra attempts per ticker after a failed fetch.
  pub fetch_retries: usize,
}

impl Default for DataConfig {
  fn default() -> Self {
    Self {
      alignment: AlignmentMode::ByDate,
      fetch_retries: 2,
    }
  }
}

/// Efficient frontier sweep.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontierConfig {
  /// Number of sampled frontier points.
  pub resolution: usize,
  /// Initial diagonal ridge, relative to the mean variance of the assets.
  pub ridge: f64,
  /// Active-set iteration cap per quadratic program.
  pub max_qp_iterations: usize,
  /// Wall-clock budget of a whole sweep.
  pub timeout_ms: Option<u64>,
}

impl Default for FrontierConfig {
  fn default() -> Self {
    Self {
      resolution: 50,
      ridge: 1e-8,
      max_qp_iterations: 500,
      timeout_ms: None,
    }
  }
}

impl FrontierConfig {
  pub fn validate(&self) -> Result<()> {
    if self.resolution < 2 {
      return Err(FolioError::InvalidParameter(format!(
        "frontier resolution must be at least 2, got {}",
        self.resolution
      )));
    }
    if !(self.ridge > 0.0 && self.ridge.is_finite()) {
      return Err(FolioError::InvalidParameter(format!(
        "ridge must be positive, got {}",
        self.ridge
      )));
    }
    if self.max_qp_iterations == 0 {
      return Err(FolioError::InvalidParameter(
        "max_qp_iterations must be positive".into(),
      ));
    }
    Ok(())
  }
}

/// Automatic order selection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
  pub strategy: SearchStrategy,
  pub space: SearchSpace,
}

/// SARIMAX fitting and forecasting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
  pub estimator: EstimatorKind,
  /// Default two-sided confidence level of the bands.
  pub confidence: f64,
  /// Default number of forecast periods.
  pub horizon: i64,
  /// Longest horizon a request may ask for.
  pub max_horizon: i64,
  pub search: SearchConfig,
  /// Nelder-Mead iteration cap per fit.
  pub max_fit_iterations: u64,
  /// Wall-clock budget of one order search.
  pub timeout_ms: Option<u64>,
  /// Minimum overlap (rows) between target and an exogenous series.
  pub min_exog_overlap: usize,
  /// Share of the sample scored out of sample; `0` skips the evaluation.
  pub holdout_fraction: f64,
}

impl Default for ForecastConfig {
  fn default() -> Self {
    Self {
      estimator: EstimatorKind::FullSarimax,
      confidence: 0.95,
      horizon: 15,
      max_horizon: DEFAULT_MAX_HORIZON,
      search: SearchConfig::default(),
      max_fit_iterations: 5000,
      timeout_ms: None,
      min_exog_overlap: 10,
      holdout_fraction: DEFAULT_HOLDOUT_FRACTION,
    }
  }
}

impl ForecastConfig {
  pub fn validate(&self) -> Result<()> {
    if !(self.confidence > 0.0 && self.confidence < 1.0) {
      return Err(FolioError::InvalidParameter(format!(
        "confidence must be in (0, 1), got {}",
        self.confidence
      )));
    }
    if self.max_horizon <= 0 {
      return Err(FolioError::InvalidParameter(format!(
        "max_horizon must be positive, got {}",
        self.max_horizon
      )));
    }
    if self.horizon <= 0 || self.horizon > self.max_horizon {
      return Err(FolioError::InvalidHorizon(self.horizon));
    }
    if !(0.0..=0.5).contains(&self.holdout_fraction) {
      return Err(FolioError::InvalidParameter(format!(
        "holdout_fraction must be in [0, 0.5], got {}",
        self.holdout_fraction
      )));
    }
    if self.max_fit_iterations == 0 {
      return Err(FolioError::InvalidParameter(
        "max_fit_iterations must be positive".into(),
      ));
    }
    Ok(())
  }
}

/// Cooperative wall-clock budget, checked between units of work.
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
  start: Instant,
  limit: Option<Duration>,
}

impl Deadline {
  pub fn new(timeout_ms: Option<u64>) -> Self {
    Self {
      start: Instant::now(),
      limit: timeout_ms.map(Duration::from_millis),
    }
  }

  pub fn unbounded() -> Self {
    Self::new(None)
  }

  pub fn is_expired(&self) -> bool {
    self
      .limit
      .is_some_and(|limit| self.start.elapsed() >= limit)
  }

  pub fn check(&self, operation: &str) -> Result<()> {
    match self.limit {
      Some(limit) if self.start.elapsed() >= limit => Err(FolioError::timeout(
        operation,
        format!("{}ms", limit.as_millis()),
      )),
      _ => Ok(()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_json_keeps_defaults() {
    let cfg = FolioConfig::from_json_str(r#"{"frontier": {"resolution": 80}}"#).unwrap();
    assert_eq!(cfg.frontier.resolution, 80);
    assert_eq!(cfg.frontier.max_qp_iterations, 500);
    assert_eq!(cfg.forecast.horizon, 15);
    assert_eq!(cfg.data.alignment, AlignmentMode::ByDate);
  }

  #[test]
  fn rejects_bad_confidence() {
    let err = FolioConfig::from_json_str(r#"{"forecast": {"confidence": 1.5}}"#).unwrap_err();
    assert!(matches!(err, FolioError::InvalidParameter(_)));
  }

  #[test]
  fn holdout_fraction_is_bounded() {
    let err = FolioConfig::from_json_str(r#"{"forecast": {"holdout_fraction": 0.9}}"#).unwrap_err();
    assert!(matches!(err, FolioError::InvalidParameter(_)));
    let off = FolioConfig::from_json_str(r#"{"forecast": {"holdout_fraction": 0.0}}"#).unwrap();
    assert_eq!(off.forecast.holdout_fraction, 0.0);
  }

  #[test]
  fn default_horizon_must_fit_under_the_cap() {
    let err = FolioConfig::from_json_str(r#"{"forecast": {"horizon": 30, "max_horizon": 20}}"#)
      .unwrap_err();
    assert!(matches!(err, FolioError::InvalidHorizon(30)));
  }

  #[test]
  fn zero_budget_deadline_expires() {
    let deadline = Deadline::new(Some(0));
    assert!(deadline.is_expired());
    assert!(matches!(
      deadline.check("sweep"),
      Err(FolioError::ComputationTimeout { .. })
    ));
    assert!(Deadline::unbounded().check("sweep").is_ok());
  }
}
