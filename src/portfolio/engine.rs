//! # Portfolio Engine
//!
//! $$
//! \text{prices}\ \to\ (\hat\mu,\hat\Sigma)\ \to\ \{(\sigma_k, r_k, \mathbf{w}_k)\}_{k}\ \to\ \mathbf{w}^\*
//! $$
//!
//! Request-level orchestration: fetch, align, estimate, sweep.

use tracing::info;

use super::frontier::EfficientFrontierSolver;
use super::returns::ReturnsEstimator;
use super::types::OptimizationRequest;
use super::types::OptimizationResponse;
use crate::config::Deadline;
use crate::config::FolioConfig;
use crate::data::fetch_all;
use crate::data::AlignedPrices;
use crate::data::MarketDataProvider;
use crate::data::PriceSeriesAligner;
use crate::error::FolioError;
use crate::error::Result;

/// Stateless entry point for optimization requests.
#[derive(Clone, Debug, Default)]
pub struct PortfolioEngine {
  config: FolioConfig,
}

impl PortfolioEngine {
  /// Construct a new engine with explicit configuration.
  pub fn new(config: FolioConfig) -> Self {
    Self { config }
  }

  /// Borrow engine configuration.
  pub fn config(&self) -> &FolioConfig {
    &self.config
  }

  /// Fetches every ticker, aligns on the first one that resolved and sweeps
  /// the frontier. Tickers that fail are reported in `errors`.
  pub fn optimize<P: MarketDataProvider + ?Sized>(
    &self,
    provider: &P,
    request: &OptimizationRequest,
  ) -> Result<OptimizationResponse> {
    if request.tickers.len() < 2 {
      return Err(FolioError::InfeasibleConstraint(format!(
        "optimization needs at least 2 tickers, got {}",
        request.tickers.len()
      )));
    }

    let outcome = fetch_all(
      provider,
      &request.tickers,
      request.period,
      request.interval,
      self.config.data.fetch_retries,
    );
    if outcome.series.len() < 2 {
      return Err(FolioError::InfeasibleConstraint(format!(
        "only {} of {} tickers returned data",
        outcome.series.len(),
        request.tickers.len()
      )));
    }

    let reference = outcome.series[0].ticker.clone();
    let aligned = PriceSeriesAligner::new(self.config.data.alignment).align(
      &reference,
      &outcome.series,
      outcome.errors,
    )?;
    self.optimize_aligned(&aligned, request)
  }

  /// Runs the numerical pipeline on already aligned prices.
  pub fn optimize_aligned(
    &self,
    aligned: &AlignedPrices,
    request: &OptimizationRequest,
  ) -> Result<OptimizationResponse> {
    if aligned.n_assets() < 2 {
      return Err(FolioError::InfeasibleConstraint(format!(
        "{} asset(s) survived alignment",
        aligned.n_assets()
      )));
    }

    let (dates, prices) = aligned.complete_rows();
    let estimate = ReturnsEstimator::new(request.interval).estimate(&prices)?;
    let deadline = Deadline::new(self.config.frontier.timeout_ms);
    let frontier = EfficientFrontierSolver::new(self.config.frontier.clone(), request.risk_free_rate)
      .solve(&estimate, &deadline)?;

    info!(
      assets = aligned.n_assets(),
      observations = dates.len(),
      dropped = aligned.errors.len(),
      "optimization finished"
    );

    Ok(OptimizationResponse {
      tickers: aligned.tickers.clone(),
      asset_stats: estimate.asset_stats(&aligned.tickers),
      frontier: frontier.points,
      optimal: frontier.optimal,
      min_variance: frontier.min_variance,
      ridge_applied: frontier.ridge_applied,
      observations: estimate.n_periods(),
      errors: aligned.errors.clone(),
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;
  use crate::data::InMemoryProvider;
  use crate::data::Interval;
  use crate::data::Period;
  use crate::data::PricePoint;

  fn path(start: f64, drift: f64, wiggle: f64, phase: f64, n: usize) -> Vec<PricePoint> {
    let d0 = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    Interval::Daily
      .future_dates(d0, n)
      .into_iter()
      .enumerate()
      .map(|(t, d)| {
        let x = t as f64;
        PricePoint::new(d, start * (1.0 + drift * x + wiggle * (x * 0.7 + phase).sin()))
      })
      .collect()
  }

  fn provider() -> InMemoryProvider {
    InMemoryProvider::new()
      .with_series("AAA", path(100.0, 0.001, 0.02, 0.0, 120))
      .with_series("BBB", path(50.0, 0.0005, 0.03, 1.3, 120))
      .with_series("CCC", path(20.0, 0.0002, 0.01, 2.1, 120))
  }

  #[test]
  fn optimize_reports_frontier_and_stats() {
    let engine = PortfolioEngine::default();
    let request = OptimizationRequest {
      tickers: vec!["AAA".into(), "BBB".into(), "CCC".into()],
      risk_free_rate: 0.03,
      period: Period::Max,
      interval: Interval::Daily,
    };
    let res = engine.optimize(&provider(), &request).unwrap();
    assert_eq!(res.tickers, request.tickers);
    assert_eq!(res.frontier.len(), engine.config().frontier.resolution);
    assert_eq!(res.asset_stats.len(), 3);
    assert_eq!(res.observations, 119);
    assert!(res.errors.is_empty());
    assert_eq!(res.optimal.weights.len(), 3);
  }

  #[test]
  fn single_surviving_ticker_is_infeasible() {
    let engine = PortfolioEngine::default();
    let request = OptimizationRequest::new(vec!["AAA".into(), "NOPE".into()]);
    let err = engine.optimize(&provider(), &request).unwrap_err();
    assert!(matches!(err, FolioError::InfeasibleConstraint(_)));
  }

  #[test]
  fn response_serializes_with_wire_names() {
    let engine = PortfolioEngine::default();
    let request = OptimizationRequest {
      period: Period::Max,
      ..OptimizationRequest::new(vec!["AAA".into(), "BBB".into()])
    };
    let res = engine.optimize(&provider(), &request).unwrap();
    let json = serde_json::to_value(&res).unwrap();
    assert!(json["optimal"]["return"].is_number());
    assert!(json["frontier"][0]["risk"].is_number());
    assert!(json["asset_stats"][0]["volatility"].is_number());
  }
}
