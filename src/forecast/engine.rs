//! # Forecast Engine
//!
//! $$
//! \text{prices}\ \to\ (y_t,\ x_{t-1})\ \to\ \hat{\mathcal M}\ \to\ \{\hat y_{T+h} \pm z\sqrt{\operatorname{Var}_h}\}_{h=1}^{H}
//! $$
//!
//! Request-level orchestration of the forecaster.

use chrono::NaiveDate;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::evaluation::evaluate_holdout;
use super::evaluation::HoldoutMetrics;
use super::interval::ForecastIntervalBuilder;
use super::order::SarimaOrder;
use super::sarimax::EstimatorKind;
use super::sarimax::FitMetrics;
use super::sarimax::ModelInput;
use super::search::OrderSearch;
use super::search::OrderSearchOutcome;
use crate::config::Deadline;
use crate::config::FolioConfig;
use crate::data::fetch_all;
use crate::data::AlignedPrices;
use crate::data::Interval;
use crate::data::MarketDataProvider;
use crate::data::Period;
use crate::data::PricePoint;
use crate::data::PriceSeriesAligner;
use crate::data::TickerError;
use crate::error::FolioError;
use crate::error::Result;

fn one() -> usize {
  1
}

fn twelve() -> usize {
  12
}

/// Forecast request as received from a caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForecastRequest {
  pub ticker: String,
  #[serde(default)]
  pub exog_tickers: Vec<String>,
  /// Select the order automatically instead of using `p, d, q, P, D, Q`.
  #[serde(default)]
  pub auto_fit: bool,
  #[serde(default = "one")]
  pub p: usize,
  #[serde(default = "one")]
  pub d: usize,
  #[serde(default = "one")]
  pub q: usize,
  #[serde(rename = "P", default)]
  pub seasonal_p: usize,
  #[serde(rename = "D", default = "one")]
  pub seasonal_d: usize,
  #[serde(rename = "Q", default = "one")]
  pub seasonal_q: usize,
  #[serde(default = "twelve")]
  pub s: usize,
  #[serde(default)]
  pub period: Period,
  #[serde(default)]
  pub interval: Interval,
  /// Falls back to the configured horizon.
  #[serde(default)]
  pub horizon: Option<i64>,
  /// Falls back to the configured confidence.
  #[serde(default)]
  pub confidence: Option<f64>,
}

impl ForecastRequest {
  pub fn new(ticker: impl Into<String>) -> Self {
    let order = SarimaOrder::default();
    Self {
      ticker: ticker.into(),
      exog_tickers: Vec::new(),
      auto_fit: false,
      p: order.p,
      d: order.d,
      q: order.q,
      seasonal_p: order.seasonal_p,
      seasonal_d: order.seasonal_d,
      seasonal_q: order.seasonal_q,
      s: order.s,
      period: Period::default(),
      interval: Interval::default(),
      horizon: None,
      confidence: None,
    }
  }

  pub fn with_order(mut self, order: SarimaOrder) -> Self {
    self.p = order.p;
    self.d = order.d;
    self.q = order.q;
    self.seasonal_p = order.seasonal_p;
    self.seasonal_d = order.seasonal_d;
    self.seasonal_q = order.seasonal_q;
    self.s = order.s;
    self
  }

  pub fn order(&self) -> SarimaOrder {
    SarimaOrder::new(
      self.p,
      self.d,
      self.q,
      self.seasonal_p,
      self.seasonal_d,
      self.seasonal_q,
      self.s,
    )
  }
}

/// Model actually used for the forecast.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForecastParams {
  pub order: [usize; 3],
  pub seasonal_order: [usize; 4],
  pub method: EstimatorKind,
  pub exog: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForecastResponse {
  pub ticker: String,
  pub history: Vec<PricePoint>,
  pub dates: Vec<NaiveDate>,
  pub forecast: Vec<f64>,
  pub upper_ci: Vec<f64>,
  pub lower_ci: Vec<f64>,
  pub metrics: FitMetrics,
  pub params: ForecastParams,
  pub confidence: f64,
  pub interval_degraded: bool,
  #[serde(skip_serializing_if = "Option::is_none", default)]
  pub search: Option<OrderSearchOutcome>,
  /// Out-of-sample scores of the chosen order on the latest rows.
  #[serde(skip_serializing_if = "Option::is_none", default)]
  pub holdout: Option<HoldoutMetrics>,
  pub errors: Vec<TickerError>,
}

/// Stateless entry point for forecast requests.
#[derive(Clone, Debug, Default)]
pub struct ForecastEngine {
  config: FolioConfig,
}

impl ForecastEngine {
  pub fn new(config: FolioConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &FolioConfig {
    &self.config
  }

  /// Fetches the target and its regressors, fits and forecasts.
  ///
  /// The target failing to resolve is fatal; a failing regressor is dropped
  /// and reported in `errors`.
  pub fn forecast<P: MarketDataProvider + ?Sized>(
    &self,
    provider: &P,
    request: &ForecastRequest,
  ) -> Result<ForecastResponse> {
    let cfg = &self.config.forecast;
    let horizon = request.horizon.unwrap_or(cfg.horizon);
    if horizon <= 0 || horizon > cfg.max_horizon {
      return Err(FolioError::InvalidHorizon(horizon));
    }
    let builder = ForecastIntervalBuilder::new(
      request.confidence.unwrap_or(cfg.confidence),
      request.interval,
    )?
    .with_max_horizon(cfg.max_horizon);

    let mut tickers = vec![request.ticker.clone()];
    tickers.extend(
      request
        .exog_tickers
        .iter()
        .filter(|t| **t != request.ticker)
        .cloned(),
    );
    let outcome = fetch_all(
      provider,
      &tickers,
      request.period,
      request.interval,
      self.config.data.fetch_retries,
    );
    if outcome.get(&request.ticker).is_none() {
      let reason = outcome
        .errors
        .iter()
        .find(|e| e.ticker == request.ticker)
        .map(|e| e.error.clone())
        .unwrap_or_else(|| "no price history".into());
      return Err(FolioError::DataUnavailable {
        ticker: request.ticker.clone(),
        reason,
      });
    }

    let aligned = PriceSeriesAligner::new(self.config.data.alignment).align(
      &request.ticker,
      &outcome.series,
      outcome.errors,
    )?;
    self.forecast_aligned(aligned, request, &builder, horizon)
  }

  fn forecast_aligned(
    &self,
    mut aligned: AlignedPrices,
    request: &ForecastRequest,
    builder: &ForecastIntervalBuilder,
    horizon: i64,
  ) -> Result<ForecastResponse> {
    let cfg = &self.config.forecast;

    let history: Vec<PricePoint> = aligned
      .dates
      .iter()
      .zip(&aligned.columns[0])
      .filter_map(|(d, p)| p.map(|p| PricePoint::new(*d, p)))
      .collect();

    // regressors need enough shared rows with the target
    let mut kept = Vec::new();
    for (ticker, column) in aligned.tickers.iter().zip(&aligned.columns).skip(1) {
      let overlap = column.iter().filter(|v| v.is_some()).count();
      if overlap < cfg.min_exog_overlap {
        let err = FolioError::InsufficientData(format!(
          "{overlap} overlapping observations, need {}",
          cfg.min_exog_overlap
        ));
        warn!(ticker = %ticker, overlap, "dropping regressor");
        aligned.errors.push(TickerError::new(ticker.clone(), &err));
      } else {
        kept.push((ticker.clone(), column.clone()));
      }
    }

    let rows: Vec<usize> = (0..aligned.dates.len())
      .filter(|&k| aligned.columns[0][k].is_some() && kept.iter().all(|(_, c)| c[k].is_some()))
      .collect();
    let dates: Vec<NaiveDate> = rows.iter().map(|&k| aligned.dates[k]).collect();
    let target: Vec<f64> = rows.iter().filter_map(|&k| aligned.columns[0][k]).collect();
    let exog: Vec<(String, Vec<f64>)> = kept
      .into_iter()
      .map(|(name, c)| (name, rows.iter().filter_map(|&k| c[k]).collect()))
      .collect();
    let input = ModelInput::lagged(dates, target, exog)?;

    let estimator = cfg.estimator.estimator(cfg.max_fit_iterations);
    let (model, search) = if request.auto_fit && estimator.kind() == EstimatorKind::FullSarimax {
      let deadline = Deadline::new(cfg.timeout_ms);
      let (model, outcome) =
        OrderSearch::new(estimator.as_ref(), &cfg.search, deadline).run(&input, request.s)?;
      (model, Some(outcome))
    } else {
      let order = request.order();
      order.validate()?;
      (estimator.fit(&input, &order)?, None)
    };

    let result = builder.build(&model, horizon)?;
    let holdout = if cfg.holdout_fraction > 0.0 {
      evaluate_holdout(estimator.as_ref(), &input, model.order(), cfg.holdout_fraction)
        .map_err(|err| debug!(error = %err, "holdout evaluation skipped"))
        .ok()
    } else {
      None
    };
    info!(
      ticker = %request.ticker,
      order = %model.order(),
      method = ?model.method(),
      horizon,
      degraded = result.interval_degraded,
      "forecast finished"
    );

    Ok(ForecastResponse {
      ticker: request.ticker.clone(),
      history,
      dates: result.dates,
      forecast: result.point_forecast,
      upper_ci: result.upper_bound,
      lower_ci: result.lower_bound,
      metrics: result.fit_metrics,
      params: ForecastParams {
        order: model.order().order(),
        seasonal_order: model.order().seasonal_order(),
        method: model.method(),
        exog: model.exog_names().to_vec(),
      },
      confidence: result.confidence,
      interval_degraded: result.interval_degraded,
      search,
      holdout,
      errors: aligned.errors,
    })
  }
}
