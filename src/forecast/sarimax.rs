//! # SARIMAX Estimation
//!
//! $$
//! y_t=\mathbf{x}_{t-1}^\top\beta+u_t,\qquad
//! \phi(B)\Phi(B^s)\left[\nabla^d\nabla_s^D u_t-c\right]=\theta(B)\Theta(B^s)\,\varepsilon_t
//! $$
//!
//! Regression with seasonal ARIMA errors, fitted by conditional sum of squares
//!
//! $$
//! \mathrm{CSS}(\vartheta)=\sum_{t>t_0}\varepsilon_t(\vartheta)^2,\qquad
//! \ell=-\tfrac{n}{2}\left(\ln 2\pi\hat\sigma^2+1\right),\qquad
//! \mathrm{AIC}=-2\ell+2k
//! $$
//!
//! with pre-sample innovations set to zero. The objective is minimized with
//! Nelder-Mead; the intercept `c` is estimated only when `d + D = 0`.

use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::core::TerminationReason;
use argmin::core::TerminationStatus;
use argmin::solver::neldermead::NelderMead;
use chrono::NaiveDate;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use super::differencing::apply_differencing;
use super::evaluation::ModelQuality;
use super::differencing::Differenced;
use super::order::SarimaOrder;
use super::polynomial::ar_polynomial;
use super::polynomial::difference_polynomial;
use super::polynomial::is_stationary;
use super::polynomial::ma_polynomial;
use super::polynomial::poly_mul;
use super::polynomial::psi_weights;
use super::trend::LinearTrendFallbackEstimator;
use super::trend::TrendDynamics;
use crate::error::FolioError;
use crate::error::Result;
use crate::stats::loss::mae;
use crate::stats::loss::mape;
use crate::stats::loss::rmse;
use crate::stats::ols::ols;

/// Target series with its lagged regressors.
#[derive(Clone, Debug)]
pub struct ModelInput {
  pub dates: Vec<NaiveDate>,
  pub target: Vec<f64>,
  /// Regressor columns; row `t` holds the exogenous value observed at `t-1`.
  pub exog: Vec<Vec<f64>>,
  pub exog_names: Vec<String>,
  /// Latest exogenous observations: the regressors of the first forecast
  /// period, held constant for later ones.
  pub next_exog: Vec<f64>,
}

impl ModelInput {
  pub fn univariate(dates: Vec<NaiveDate>, target: Vec<f64>) -> Result<Self> {
    let input = Self {
      dates,
      target,
      exog: Vec::new(),
      exog_names: Vec::new(),
      next_exog: Vec::new(),
    };
    input.validate()?;
    Ok(input)
  }

  /// Pairs `target[t]` with `exog[t-1]`; the first row has no lagged
  /// regressor and is dropped.
  pub fn lagged(
    dates: Vec<NaiveDate>,
    target: Vec<f64>,
    exog: Vec<(String, Vec<f64>)>,
  ) -> Result<Self> {
    let n = target.len();
    if dates.len() != n {
      return Err(FolioError::InvalidParameter(format!(
        "{} dates for {n} observations",
        dates.len()
      )));
    }
    if exog.is_empty() {
      return Self::univariate(dates, target);
    }
    if n < 2 {
      return Err(FolioError::InsufficientData(
        "lagged regressors need at least 2 observations".into(),
      ));
    }

    let mut names = Vec::with_capacity(exog.len());
    let mut columns = Vec::with_capacity(exog.len());
    let mut next = Vec::with_capacity(exog.len());
    for (name, col) in exog {
      if col.len() != n {
        return Err(FolioError::InvalidParameter(format!(
          "regressor {name} has {} values for {n} observations",
          col.len()
        )));
      }
      next.push(col[n - 1]);
      columns.push(col[..n - 1].to_vec());
      names.push(name);
    }

    let input = Self {
      dates: dates[1..].to_vec(),
      target: target[1..].to_vec(),
      exog: columns,
      exog_names: names,
      next_exog: next,
    };
    input.validate()?;
    Ok(input)
  }

  pub fn n_obs(&self) -> usize {
    self.target.len()
  }

  pub fn n_exog(&self) -> usize {
    self.exog.len()
  }

  pub fn last_date(&self) -> Option<NaiveDate> {
    self.dates.last().copied()
  }

  /// The first `k` rows as an input of their own, and the targets after them.
  ///
  /// Row `k` holds the regressors observed at `k-1`, which become the next
  /// exogenous values of the head.
  pub fn split_at(&self, k: usize) -> Result<(ModelInput, Vec<f64>)> {
    let n = self.n_obs();
    if k == 0 || k >= n {
      return Err(FolioError::InsufficientData(format!(
        "cannot split {n} observations at {k}"
      )));
    }
    let head = Self {
      dates: self.dates[..k].to_vec(),
      target: self.target[..k].to_vec(),
      exog: self.exog.iter().map(|c| c[..k].to_vec()).collect(),
      exog_names: self.exog_names.clone(),
      next_exog: self.exog.iter().map(|c| c[k]).collect(),
    };
    Ok((head, self.target[k..].to_vec()))
  }

  fn validate(&self) -> Result<()> {
    let n = self.target.len();
    if self.dates.len() != n {
      return Err(FolioError::InvalidParameter(format!(
        "{} dates for {n} observations",
        self.dates.len()
      )));
    }
    if self.exog.len() != self.next_exog.len() || self.exog.iter().any(|c| c.len() != n) {
      return Err(FolioError::InvalidParameter(
        "regressor columns must match the target length".into(),
      ));
    }
    let finite = self
      .target
      .iter()
      .chain(self.exog.iter().flatten())
      .chain(self.next_exog.iter())
      .all(|v| v.is_finite());
    if !finite {
      return Err(FolioError::InvalidParameter(
        "model input contains non-finite values".into(),
      ));
    }
    Ok(())
  }
}

/// In-sample quality of one-step-ahead fitted values.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FitMetrics {
  pub aic: f64,
  pub mae: f64,
  /// Percent.
  pub mape: f64,
  pub rmse: f64,
  pub quality: ModelQuality,
}

impl FitMetrics {
  pub fn new(aic: f64, actual: &[f64], fitted: &[f64]) -> Self {
    let pct = mape(actual, fitted);
    Self {
      aic,
      mae: mae(actual, fitted),
      mape: pct,
      rmse: rmse(actual, fitted),
      quality: ModelQuality::from_mape(pct),
    }
  }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Coefficients {
  pub ar: Vec<f64>,
  pub ma: Vec<f64>,
  pub seasonal_ar: Vec<f64>,
  pub seasonal_ma: Vec<f64>,
  pub exog: Vec<f64>,
  pub intercept: Option<f64>,
  /// Slope per period of the linear-trend fallback.
  pub trend: Option<f64>,
}

/// Estimation strategy, chosen by configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorKind {
  #[default]
  FullSarimax,
  /// Least-squares line through the target; results are flagged degraded.
  LinearTrendFallback,
}

impl EstimatorKind {
  pub fn estimator(self, max_iterations: u64) -> Box<dyn Estimator> {
    match self {
      Self::FullSarimax => Box::new(FullSarimaxEstimator::new(max_iterations)),
      Self::LinearTrendFallback => Box::new(LinearTrendFallbackEstimator),
    }
  }

  pub fn is_degraded(self) -> bool {
    matches!(self, Self::LinearTrendFallback)
  }
}

/// A way of turning a [`ModelInput`] into a [`FittedModel`].
pub trait Estimator: Send + Sync {
  fn kind(&self) -> EstimatorKind;

  fn fit(&self, input: &ModelInput, order: &SarimaOrder) -> Result<FittedModel>;
}

/// Immutable result of a successful fit; consumed by forecasting.
#[derive(Clone, Debug)]
pub struct FittedModel {
  pub(crate) order: SarimaOrder,
  pub(crate) method: EstimatorKind,
  pub(crate) coefficients: Coefficients,
  pub(crate) exog_names: Vec<String>,
  pub(crate) sigma2: Option<f64>,
  pub(crate) metrics: FitMetrics,
  pub(crate) n_obs: usize,
  pub(crate) last_date: Option<NaiveDate>,
  pub(crate) last_value: f64,
  pub(crate) volatility: Option<f64>,
  pub(crate) dynamics: Dynamics,
}

#[derive(Clone, Debug)]
pub(crate) enum Dynamics {
  Sarimax(SarimaxDynamics),
  LinearTrend(TrendDynamics),
}

#[derive(Clone, Debug)]
pub(crate) struct SarimaxDynamics {
  ar: Vec<f64>,
  ma: Vec<f64>,
  integrated_ar: Vec<f64>,
  intercept: f64,
  beta: Vec<f64>,
  next_exog: Vec<f64>,
  errors: Vec<f64>,
  innovations: Vec<f64>,
  levels: Differenced,
}

impl SarimaxDynamics {
  fn point_forecast(&self, horizon: usize) -> Vec<f64> {
    let n = self.errors.len();
    let mut e = self.errors.clone();
    let mut eps = self.innovations.clone();
    for _ in 0..horizon {
      let t = e.len();
      let mut v = 0.0;
      for (i, a) in self.ar.iter().enumerate().skip(1) {
        if t >= i {
          v -= a * e[t - i];
        }
      }
      for (j, m) in self.ma.iter().enumerate().skip(1) {
        if t >= j {
          v += m * eps[t - j];
        }
      }
      e.push(v);
      eps.push(0.0);
    }

    let dz: Vec<f64> = e[n..].iter().map(|v| v + self.intercept).collect();
    let xb: f64 = self.beta.iter().zip(&self.next_exog).map(|(b, x)| b * x).sum();
    self
      .levels
      .integrate_forecast(&dz)
      .into_iter()
      .map(|z| z + xb)
      .collect()
  }

  fn variance(&self, sigma2: f64, horizon: usize) -> Vec<f64> {
    let psi = psi_weights(&self.integrated_ar, &self.ma, horizon);
    let mut acc = 0.0;
    psi
      .iter()
      .map(|p| {
        acc += p * p;
        sigma2 * acc
      })
      .collect()
  }
}

impl FittedModel {
  pub fn order(&self) -> &SarimaOrder {
    &self.order
  }

  pub fn method(&self) -> EstimatorKind {
    self.method
  }

  pub fn coefficients(&self) -> &Coefficients {
    &self.coefficients
  }

  pub fn exog_names(&self) -> &[String] {
    &self.exog_names
  }

  /// Innovation variance, `None` with fewer than two residuals.
  pub fn sigma2(&self) -> Option<f64> {
    self.sigma2
  }

  pub fn aic(&self) -> f64 {
    self.metrics.aic
  }

  pub fn metrics(&self) -> &FitMetrics {
    &self.metrics
  }

  pub fn n_obs(&self) -> usize {
    self.n_obs
  }

  pub fn last_date(&self) -> Option<NaiveDate> {
    self.last_date
  }

  pub fn last_value(&self) -> f64 {
    self.last_value
  }

  /// Sample volatility of the target's first differences.
  pub fn volatility(&self) -> Option<f64> {
    self.volatility
  }

  pub fn is_degraded(&self) -> bool {
    self.method.is_degraded()
  }

  /// Multi-step point forecasts on the level scale.
  pub fn point_forecast(&self, horizon: usize) -> Vec<f64> {
    match &self.dynamics {
      Dynamics::Sarimax(dynamics) => dynamics.point_forecast(horizon),
      Dynamics::LinearTrend(dynamics) => dynamics.point_forecast(horizon),
    }
  }

  /// Forecast error variance per step; `None` when `sigma2` is unknown.
  pub fn forecast_variance(&self, horizon: usize) -> Option<Vec<f64>> {
    let sigma2 = self.sigma2.filter(|s| s.is_finite() && *s >= 0.0)?;
    Some(match &self.dynamics {
      Dynamics::Sarimax(dynamics) => dynamics.variance(sigma2, horizon),
      Dynamics::LinearTrend(dynamics) => dynamics.variance(sigma2, horizon),
    })
  }
}

/// Life cycle of a [`SarimaxEstimator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FitState {
  Unfitted,
  Fitting,
  Fitted,
  FitFailed,
}

/// Single-use SARIMAX estimator: one instance fits at most once.
#[derive(Clone, Debug)]
pub struct SarimaxEstimator {
  order: SarimaOrder,
  max_iterations: u64,
  state: FitState,
}

impl SarimaxEstimator {
  pub fn new(order: SarimaOrder, max_iterations: u64) -> Self {
    Self {
      order,
      max_iterations,
      state: FitState::Unfitted,
    }
  }

  pub fn state(&self) -> FitState {
    self.state
  }

  pub fn order(&self) -> &SarimaOrder {
    &self.order
  }

  pub fn fit(&mut self, input: &ModelInput) -> Result<FittedModel> {
    if self.state != FitState::Unfitted {
      return Err(FolioError::InvalidParameter(format!(
        "estimator for {} is {:?}; create a new instance to refit",
        self.order, self.state
      )));
    }
    self.state = FitState::Fitting;
    match fit_css(&self.order, input, self.max_iterations) {
      Ok(model) => {
        self.state = FitState::Fitted;
        Ok(model)
      }
      Err(err) => {
        debug!(order = %self.order, error = %err, "fit failed");
        self.state = FitState::FitFailed;
        Err(err)
      }
    }
  }
}

/// [`Estimator`] strategy running a fresh [`SarimaxEstimator`] per fit.
#[derive(Clone, Copy, Debug)]
pub struct FullSarimaxEstimator {
  max_iterations: u64,
}

impl FullSarimaxEstimator {
  pub fn new(max_iterations: u64) -> Self {
    Self { max_iterations }
  }
}

impl Estimator for FullSarimaxEstimator {
  fn kind(&self) -> EstimatorKind {
    EstimatorKind::FullSarimax
  }

  fn fit(&self, input: &ModelInput, order: &SarimaOrder) -> Result<FittedModel> {
    SarimaxEstimator::new(*order, self.max_iterations).fit(input)
  }
}

/// Sample standard deviation of first differences.
pub(crate) fn difference_volatility(x: &[f64]) -> Option<f64> {
  let diffs: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
  sample_std(&diffs)
}

pub(crate) fn sample_std(x: &[f64]) -> Option<f64> {
  if x.len() < 2 {
    return None;
  }
  let mean = x.iter().sum::<f64>() / x.len() as f64;
  let var = x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (x.len() - 1) as f64;
  Some(var.sqrt()).filter(|v| v.is_finite())
}

/// Gaussian conditional AIC with `k` estimated parameters besides `σ²`.
pub(crate) fn gaussian_aic(sse: f64, n: usize, k: usize) -> f64 {
  let n_f = n as f64;
  let sigma2 = (sse / n_f).max(f64::MIN_POSITIVE);
  n_f * ((2.0 * std::f64::consts::PI * sigma2).ln() + 1.0) + 2.0 * (k + 1) as f64
}

/// Relative spread of simplex costs at which Nelder-Mead stops.
const SD_TOLERANCE: f64 = 1e-9;

/// Objective of the conditional-sum-of-squares fit on the differenced scale.
#[derive(Clone, Debug)]
struct CssProblem {
  order: SarimaOrder,
  w: Vec<f64>,
  xd: Vec<Vec<f64>>,
  intercept: bool,
  /// Divides the sum of squares so the optimizer sees costs near one.
  scale: f64,
}

struct Unpacked {
  ar: Vec<f64>,
  ma: Vec<f64>,
  sar: Vec<f64>,
  sma: Vec<f64>,
  beta: Vec<f64>,
  c: f64,
}

struct Residuals {
  errors: Vec<f64>,
  innovations: Vec<f64>,
  ar: Vec<f64>,
  ma: Vec<f64>,
  css: f64,
  start: usize,
}

impl CssProblem {
  fn n_params(&self) -> usize {
    self.order.n_arma_params() + self.xd.len() + usize::from(self.intercept)
  }

  fn unpack(&self, params: &[f64]) -> Unpacked {
    let o = &self.order;
    let mut at = 0;
    let mut take = |k: usize| {
      let out = params[at..at + k].to_vec();
      at += k;
      out
    };
    let ar = take(o.p);
    let ma = take(o.q);
    let sar = take(o.seasonal_p);
    let sma = take(o.seasonal_q);
    let beta = take(self.xd.len());
    let c = if self.intercept { take(1)[0] } else { 0.0 };
    Unpacked {
      ar,
      ma,
      sar,
      sma,
      beta,
      c,
    }
  }

  fn residuals(&self, params: &[f64]) -> Residuals {
    let u = self.unpack(params);
    let s = self.order.season();
    let ar = poly_mul(&ar_polynomial(&u.ar, 1), &ar_polynomial(&u.sar, s));
    let ma = poly_mul(&ma_polynomial(&u.ma, 1), &ma_polynomial(&u.sma, s));

    let n = self.w.len();
    let errors: Vec<f64> = (0..n)
      .map(|t| {
        let xb: f64 = self.xd.iter().zip(&u.beta).map(|(col, b)| col[t] * b).sum();
        self.w[t] - xb - u.c
      })
      .collect();

    let start = (ar.len() - 1).min(n);
    let mut innovations = vec![0.0; n];
    let mut css = 0.0;
    for t in start..n {
      let mut v = 0.0;
      for (i, a) in ar.iter().enumerate() {
        v += a * errors[t - i];
      }
      for (j, m) in ma.iter().enumerate().skip(1) {
        if t >= j {
          v -= m * innovations[t - j];
        }
      }
      innovations[t] = v;
      css += v * v;
    }

    Residuals {
      errors,
      innovations,
      ar,
      ma,
      css,
      start,
    }
  }

  fn is_invertible(&self, params: &[f64]) -> bool {
    let u = self.unpack(params);
    let neg = |v: &[f64]| v.iter().map(|x| -x).collect::<Vec<f64>>();
    is_stationary(&neg(&u.ma)) && is_stationary(&neg(&u.sma))
  }
}

impl CostFunction for CssProblem {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
    if !self.is_invertible(x) {
      return Ok(f64::INFINITY);
    }
    let css = self.residuals(x).css / self.scale;
    Ok(if css.is_finite() { css } else { f64::INFINITY })
  }
}

fn initial_params(problem: &CssProblem) -> Vec<f64> {
  let n_arma = problem.order.n_arma_params();
  let mut x0 = vec![0.0; n_arma];
  let w = &problem.w;

  if !problem.xd.is_empty() {
    let rows: Vec<Vec<f64>> = (0..w.len())
      .map(|t| {
        let mut row: Vec<f64> = problem.xd.iter().map(|c| c[t]).collect();
        if problem.intercept {
          row.push(1.0);
        }
        row
      })
      .collect();
    match ols(w, &rows) {
      Ok(fit) => x0.extend(fit.beta),
      Err(err) => {
        debug!(error = %err, "regression start values unavailable, starting at zero");
        x0.extend(vec![0.0; problem.xd.len()]);
        if problem.intercept {
          x0.push(w.iter().sum::<f64>() / w.len().max(1) as f64);
        }
      }
    }
  } else if problem.intercept {
    x0.push(w.iter().sum::<f64>() / w.len().max(1) as f64);
  }
  x0
}

fn initial_simplex(problem: &CssProblem, x0: &[f64]) -> Vec<Vec<f64>> {
  let n_arma = problem.order.n_arma_params();
  let w_sd = sample_std(&problem.w).filter(|v| *v > 0.0).unwrap_or(1.0);
  let mut simplex = Vec::with_capacity(x0.len() + 1);
  simplex.push(x0.to_vec());
  for i in 0..x0.len() {
    let delta = if i < n_arma {
      0.1
    } else if x0[i].abs() > 1e-8 {
      0.1 * x0[i].abs()
    } else if let Some(col) = problem.xd.get(i - n_arma) {
      0.1 * w_sd / sample_std(col).filter(|v| *v > 1e-12).unwrap_or(1.0)
    } else {
      0.1 * w_sd
    };
    let mut vertex = x0.to_vec();
    vertex[i] += delta;
    simplex.push(vertex);
  }
  simplex
}

/// Nelder-Mead on the normalized sum of squares. A final pass that stops at
/// the iteration cap is a failed fit, not a converged one.
fn minimize(problem: &CssProblem, max_iterations: u64) -> Result<Vec<f64>> {
  let mut best = initial_params(problem);
  if best.is_empty() {
    return Ok(best);
  }
  let css0 = problem.residuals(&best).css;
  let problem = CssProblem {
    scale: if css0.is_finite() && css0 > 0.0 { css0 } else { 1.0 },
    ..problem.clone()
  };

  // A second pass from the first optimum escapes a collapsed simplex.
  let mut reason = None;
  for _ in 0..2 {
    let simplex = initial_simplex(&problem, &best);
    let solver = NelderMead::new(simplex)
      .with_sd_tolerance(SD_TOLERANCE)
      .map_err(|e| FolioError::Convergence(e.to_string()))?;
    let res = Executor::new(problem.clone(), solver)
      .configure(|state| state.max_iters(max_iterations))
      .run()
      .map_err(|e| FolioError::Convergence(e.to_string()))?;
    if let TerminationStatus::Terminated(r) = res.state.termination_status {
      reason = Some(r);
    }
    if let Some(param) = res.state.best_param {
      best = param;
    }
  }

  match reason {
    Some(TerminationReason::SolverConverged | TerminationReason::TargetCostReached) => Ok(best),
    Some(TerminationReason::MaxItersReached) => Err(FolioError::Convergence(format!(
      "{} did not converge within {max_iterations} iterations",
      problem.order
    ))),
    Some(other) => Err(FolioError::Convergence(format!(
      "{} optimizer stopped early: {}",
      problem.order,
      other.text()
    ))),
    None => Err(FolioError::Convergence(format!(
      "{} optimizer reported no termination",
      problem.order
    ))),
  }
}

pub(crate) fn fit_css(order: &SarimaOrder, input: &ModelInput, max_iterations: u64) -> Result<FittedModel> {
  order.validate()?;
  input.validate()?;

  let n = input.n_obs();
  let n_exog = input.n_exog();
  let required = order.min_observations(n_exog);
  if n < required {
    return Err(FolioError::InsufficientData(format!(
      "{order} with {n_exog} regressor(s) needs {required} observations, got {n}"
    )));
  }

  let s = order.season();
  let diffed = apply_differencing(&input.target, order.d, order.seasonal_d, s);
  let lost = diffed.lost();
  let xd: Vec<Vec<f64>> = input
    .exog
    .iter()
    .map(|col| apply_differencing(col, order.d, order.seasonal_d, s).values)
    .collect();

  let problem = CssProblem {
    order: *order,
    w: diffed.values,
    xd,
    intercept: order.has_intercept(),
    scale: 1.0,
  };

  let params = minimize(&problem, max_iterations)?;
  if params.iter().any(|v| !v.is_finite()) {
    return Err(FolioError::Convergence(format!(
      "{order} produced non-finite coefficients"
    )));
  }

  let res = problem.residuals(&params);
  if !res.css.is_finite() {
    return Err(FolioError::Convergence(format!(
      "{order} conditional sum of squares diverged"
    )));
  }

  let u = problem.unpack(&params);
  if !is_stationary(&u.ar) || !is_stationary(&u.sar) {
    return Err(FolioError::NonStationary(format!(
      "{order} fitted an AR polynomial with a root on or inside the unit circle; more differencing is needed"
    )));
  }

  let n_eff = problem.w.len() - res.start;
  if n_eff == 0 {
    return Err(FolioError::InsufficientData(format!(
      "{order} leaves no residuals after conditioning"
    )));
  }
  let sigma2 = (n_eff >= 2).then(|| res.css / n_eff as f64);
  let aic = gaussian_aic(res.css, n_eff, problem.n_params());

  let actual = &input.target[lost + res.start..];
  let fitted: Vec<f64> = actual
    .iter()
    .zip(&res.innovations[res.start..])
    .map(|(y, e)| y - e)
    .collect();
  let metrics = FitMetrics::new(aic, actual, &fitted);

  let z: Vec<f64> = (0..n)
    .map(|t| {
      let xb: f64 = input.exog.iter().zip(&u.beta).map(|(c, b)| c[t] * b).sum();
      input.target[t] - xb
    })
    .collect();
  let levels = apply_differencing(&z, order.d, order.seasonal_d, s);
  let integrated_ar = poly_mul(&res.ar, &difference_polynomial(order.d, order.seasonal_d, s));

  debug!(order = %order, aic, css = res.css, n_eff, "fitted");

  let coefficients = Coefficients {
    ar: u.ar,
    ma: u.ma,
    seasonal_ar: u.sar,
    seasonal_ma: u.sma,
    exog: u.beta.clone(),
    intercept: problem.intercept.then_some(u.c),
    trend: None,
  };

  Ok(FittedModel {
    order: *order,
    method: EstimatorKind::FullSarimax,
    coefficients,
    exog_names: input.exog_names.clone(),
    sigma2,
    metrics,
    n_obs: n,
    last_date: input.last_date(),
    last_value: input.target[n - 1],
    volatility: difference_volatility(&input.target),
    dynamics: Dynamics::Sarimax(SarimaxDynamics {
      ar: res.ar,
      ma: res.ma,
      integrated_ar,
      intercept: u.c,
      beta: u.beta,
      next_exog: input.next_exog.clone(),
      errors: res.errors,
      innovations: res.innovations,
      levels,
    }),
  })
}
