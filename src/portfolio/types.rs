//! # Portfolio Types
//!
//! $$
//! \mathbf{w}^\*=\arg\max_{\mathbf{w}} \frac{\mathbb E[R_p]-r_f}{\sigma_p}
//! $$
//!
//! Request and response containers of an optimization run.

use serde::Deserialize;
use serde::Serialize;

use super::frontier::FrontierPoint;
use crate::data::Interval;
use crate::data::Period;
use crate::data::TickerError;

fn default_risk_free_rate() -> f64 {
  0.03
}

/// Optimization request as received from a caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRequest {
  pub tickers: Vec<String>,
  /// Annualized, as a decimal.
  #[serde(default = "default_risk_free_rate")]
  pub risk_free_rate: f64,
  #[serde(default)]
  pub period: Period,
  #[serde(default)]
  pub interval: Interval,
}

impl OptimizationRequest {
  pub fn new(tickers: Vec<String>) -> Self {
    Self {
      tickers,
      risk_free_rate: default_risk_free_rate(),
      period: Period::default(),
      interval: Interval::default(),
    }
  }
}

/// Annualized per-asset statistics, in percent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssetStats {
  pub ticker: String,
  #[serde(rename = "return")]
  pub annual_return: f64,
  pub volatility: f64,
}

/// Successful optimization result. `weights` of every point follow `tickers`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResponse {
  pub tickers: Vec<String>,
  pub frontier: Vec<FrontierPoint>,
  pub optimal: FrontierPoint,
  pub min_variance: FrontierPoint,
  pub asset_stats: Vec<AssetStats>,
  /// Diagonal ridge added to the covariance, when regularization was needed.
  pub ridge_applied: Option<f64>,
  /// Number of aligned return observations.
  pub observations: usize,
  pub errors: Vec<TickerError>,
}
