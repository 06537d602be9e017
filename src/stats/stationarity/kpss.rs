//! # KPSS
//!
//! $$
//! \eta=\frac{1}{n^2\,\hat\lambda^2}\sum_{t=1}^{n}S_t^2,\qquad S_t=\sum_{i\le t}\hat u_i
//! $$
//!
//! Stationarity is the null hypothesis, so a large `η` is evidence for a
//! unit root. [`ndiffs`] differences until the test stops rejecting.

use super::common::newey_west_long_run_variance;
use super::common::regress_on_deterministics;
use super::common::schwert_max_lags;
use super::common::validate_series;
use crate::error::FolioError;
use crate::error::Result;

/// Shortest series [`Kpss::statistic`] accepts.
pub const KPSS_MIN_OBS: usize = 20;

/// `(alpha, critical value)` for a level-stationary null, loosest first.
const LEVEL_CRITICAL: [(f64, f64); 4] = [(0.10, 0.347), (0.05, 0.463), (0.025, 0.574), (0.01, 0.739)];
const TREND_CRITICAL: [(f64, f64); 4] = [(0.10, 0.119), (0.05, 0.146), (0.025, 0.176), (0.01, 0.216)];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KpssNull {
  /// Stationary around a constant.
  #[default]
  Level,
  /// Stationary around a linear trend.
  Trend,
}

impl KpssNull {
  fn table(self) -> &'static [(f64, f64); 4] {
    match self {
      Self::Level => &LEVEL_CRITICAL,
      Self::Trend => &TREND_CRITICAL,
    }
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Kpss {
  null: KpssNull,
  lags: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KpssStatistic {
  pub value: f64,
  pub lags: usize,
  pub null: KpssNull,
}

impl KpssStatistic {
  /// Critical value at the smallest tabulated level that is at least `alpha`.
  pub fn critical_value(&self, alpha: f64) -> f64 {
    let table = self.null.table();
    table
      .iter()
      .rev()
      .find(|(level, _)| *level >= alpha)
      .unwrap_or(&table[0])
      .1
  }

  pub fn rejects(&self, alpha: f64) -> bool {
    self.value > self.critical_value(alpha)
  }
}

impl Kpss {
  pub fn new(null: KpssNull) -> Self {
    Self { null, lags: None }
  }

  /// Fixed Bartlett bandwidth instead of the Schwert rule.
  pub fn with_lags(mut self, lags: usize) -> Self {
    self.lags = Some(lags);
    self
  }

  pub fn statistic(&self, y: &[f64]) -> Result<KpssStatistic> {
    validate_series(y, KPSS_MIN_OBS)?;
    let fit = regress_on_deterministics(y, self.null == KpssNull::Trend)?;
    let n = fit.residuals.len() as f64;

    let partial_sums_sq: f64 = fit
      .residuals
      .iter()
      .scan(0.0, |s, u| {
        *s += u;
        Some(*s * *s)
      })
      .sum();

    let lags = self.lags.unwrap_or_else(|| schwert_max_lags(fit.residuals.len()));
    let lambda2 = newey_west_long_run_variance(&fit.residuals, lags).max(1e-12);

    Ok(KpssStatistic {
      value: partial_sums_sq / (n * n * lambda2),
      lags,
      null: self.null,
    })
  }
}

/// Number of first differences `d <= max_d` after which a level KPSS test at
/// `alpha` no longer rejects. Stops early on constant or too-short series.
pub fn ndiffs(y: &[f64], max_d: usize, alpha: f64) -> Result<usize> {
  if !(alpha > 0.0 && alpha < 1.0) {
    return Err(FolioError::InvalidParameter(format!(
      "alpha must be in (0, 1), got {alpha}"
    )));
  }
  let test = Kpss::new(KpssNull::Level);

  let mut x = y.to_vec();
  for d in 0..max_d {
    let constant = x.windows(2).all(|w| (w[1] - w[0]).abs() < 1e-12);
    if x.len() < KPSS_MIN_OBS || constant || !test.statistic(&x)?.rejects(alpha) {
      return Ok(d);
    }
    x = x.windows(2).map(|w| w[1] - w[0]).collect();
  }
  Ok(max_d)
}
