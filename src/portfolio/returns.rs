//! # Returns Estimator
//!
//! $$
//! r_{t,i}=\frac{p_{t,i}}{p_{t-1,i}}-1,\qquad
//! \hat\mu_i=\frac1T\sum_t r_{t,i},\qquad
//! \hat\Sigma=\frac{1}{T-1}\sum_t (r_t-\hat\mu)(r_t-\hat\mu)^\top
//! $$
//!
//! Periodic sample moments of aligned prices. Annualization multiplies the
//! mean and the covariance by the same factor so Sharpe ratios stay unbiased.

use nalgebra::DMatrix;
use nalgebra::DVector;

use super::types::AssetStats;
use crate::data::Interval;
use crate::error::FolioError;
use crate::error::Result;

/// Sample moments of one aligned price matrix.
#[derive(Clone, Debug)]
pub struct ReturnsEstimate {
  /// `(T-1) x N` simple returns.
  pub returns: DMatrix<f64>,
  /// Per-period mean return.
  pub mean: DVector<f64>,
  /// Per-period Bessel-corrected covariance.
  pub covariance: DMatrix<f64>,
  pub periods_per_year: f64,
}

impl ReturnsEstimate {
  pub fn n_assets(&self) -> usize {
    self.mean.len()
  }

  pub fn n_periods(&self) -> usize {
    self.returns.nrows()
  }

  pub fn annualized_mean(&self) -> DVector<f64> {
    &self.mean * self.periods_per_year
  }

  pub fn annualized_covariance(&self) -> DMatrix<f64> {
    &self.covariance * self.periods_per_year
  }

  pub fn correlation(&self) -> DMatrix<f64> {
    corr_from_cov(&self.covariance)
  }

  /// Annualized return and volatility per asset, in percent.
  pub fn asset_stats(&self, tickers: &[String]) -> Vec<AssetStats> {
    tickers
      .iter()
      .enumerate()
      .take(self.n_assets())
      .map(|(i, ticker)| AssetStats {
        ticker: ticker.clone(),
        annual_return: self.mean[i] * self.periods_per_year * 100.0,
        volatility: (self.covariance[(i, i)].max(0.0) * self.periods_per_year).sqrt() * 100.0,
      })
      .collect()
  }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ReturnsEstimator {
  interval: Interval,
}

impl ReturnsEstimator {
  pub fn new(interval: Interval) -> Self {
    Self { interval }
  }

  /// Moments of a `T x N` price matrix, `T >= 3`, `N >= 2`.
  pub fn estimate(&self, prices: &DMatrix<f64>) -> Result<ReturnsEstimate> {
    let (t, n) = prices.shape();
    if t < 3 {
      return Err(FolioError::InsufficientData(format!(
        "need at least 3 aligned prices, got {t}"
      )));
    }
    if n < 2 {
      return Err(FolioError::InsufficientData(format!(
        "need at least 2 assets, got {n}"
      )));
    }
    if let Some(bad) = prices.iter().find(|p| !(p.is_finite() && **p > 0.0)) {
      return Err(FolioError::InvalidParameter(format!(
        "prices must be positive and finite, found {bad}"
      )));
    }

    let columns: Vec<DVector<f64>> = prices
      .column_iter()
      .map(|col| {
        let series: Vec<f64> = col.iter().copied().collect();
        DVector::from_vec(simple_returns(&series))
      })
      .collect();
    let returns = DMatrix::from_columns(&columns);
    let periods = (t - 1) as f64;
    let mean = DVector::from_fn(n, |c, _| returns.column(c).sum() / periods);

    let mut centered = returns.clone();
    for c in 0..n {
      let m = mean[c];
      centered.column_mut(c).add_scalar_mut(-m);
    }
    let raw = centered.transpose() * &centered / (periods - 1.0);
    let covariance = (&raw + raw.transpose()) * 0.5;

    Ok(ReturnsEstimate {
      returns,
      mean,
      covariance,
      periods_per_year: self.interval.periods_per_year(),
    })
  }
}

/// Simple returns of one price series, skipping non-positive prices.
pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
  prices
    .windows(2)
    .filter(|w| w[0] > 0.0 && w[1] > 0.0)
    .map(|w| w[1] / w[0] - 1.0)
    .collect()
}

pub(crate) fn corr_from_cov(cov: &DMatrix<f64>) -> DMatrix<f64> {
  let n = cov.nrows();
  let sd: Vec<f64> = (0..n).map(|i| cov[(i, i)].max(0.0).sqrt()).collect();
  DMatrix::from_fn(n, n, |i, j| {
    if i == j {
      1.0
    } else {
      let denom = sd[i] * sd[j];
      if denom < 1e-15 {
        0.0
      } else {
        (cov[(i, j)] / denom).clamp(-1.0, 1.0)
      }
    }
  })
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  fn prices() -> DMatrix<f64> {
    DMatrix::from_row_slice(
      4,
      2,
      &[
        100.0, 50.0, //
        110.0, 49.0, //
        99.0, 51.0, //
        108.9, 52.0,
      ],
    )
  }

  #[test]
  fn simple_returns_and_moments() {
    let est = ReturnsEstimator::new(Interval::Daily).estimate(&prices()).unwrap();
    assert_eq!(est.returns.shape(), (3, 2));
    assert_abs_diff_eq!(est.returns[(0, 0)], 0.1, epsilon = 1e-12);
    assert_abs_diff_eq!(est.returns[(1, 0)], -0.1, epsilon = 1e-12);
    assert_abs_diff_eq!(est.mean[0], 0.1 / 3.0, epsilon = 1e-12);

    let r: Vec<f64> = est.returns.column(0).iter().copied().collect();
    let m = est.mean[0];
    let var = r.iter().map(|x| (x - m).powi(2)).sum::<f64>() / 2.0;
    assert_abs_diff_eq!(est.covariance[(0, 0)], var, epsilon = 1e-14);
    assert_abs_diff_eq!(est.covariance[(0, 1)], est.covariance[(1, 0)], epsilon = 0.0);
    assert_eq!(est.periods_per_year, 252.0);
  }

  #[test]
  fn annualization_follows_interval() {
    let est = ReturnsEstimator::new(Interval::Monthly).estimate(&prices()).unwrap();
    assert_abs_diff_eq!(est.annualized_mean()[0], est.mean[0] * 12.0, epsilon = 1e-14);
    let stats = est.asset_stats(&["A".to_string(), "B".to_string()]);
    assert_abs_diff_eq!(stats[0].annual_return, est.mean[0] * 1200.0, epsilon = 1e-10);
  }

  #[test]
  fn identical_columns_have_unit_correlation() {
    let p = DMatrix::from_row_slice(4, 2, &[1.0, 1.0, 1.1, 1.1, 1.05, 1.05, 1.2, 1.2]);
    let est = ReturnsEstimator::default().estimate(&p).unwrap();
    assert_abs_diff_eq!(est.correlation()[(0, 1)], 1.0, epsilon = 1e-12);
  }

  #[test]
  fn too_short_or_narrow_is_insufficient() {
    let short = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.1, 1.2]);
    assert!(matches!(
      ReturnsEstimator::default().estimate(&short),
      Err(FolioError::InsufficientData(_))
    ));
    let narrow = DMatrix::from_row_slice(3, 1, &[1.0, 1.1, 1.2]);
    assert!(matches!(
      ReturnsEstimator::default().estimate(&narrow),
      Err(FolioError::InsufficientData(_))
    ));
  }

  #[test]
  fn simple_returns_of_series() {
    let r = simple_returns(&[100.0, 110.0, 0.0, 121.0]);
    assert_eq!(r.len(), 1);
    assert_abs_diff_eq!(r[0], 0.1, epsilon = 1e-12);
  }
}
