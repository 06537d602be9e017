//! # Holdout Evaluation
//!
//! $$
//! \mathrm{RMSE}_{\%}=\frac{100}{\bar y_{\text{test}}}\sqrt{\frac1m\sum_{h=1}^{m}\big(y_{T+h}-\hat y_{T+h\mid T}\big)^2}
//! $$
//!
//! The leading share of the sample trains the chosen order, the rest is
//! forecast from it in one pass and scored out of sample.

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use super::order::SarimaOrder;
use super::sarimax::Estimator;
use super::sarimax::ModelInput;
use crate::error::FolioError;
use crate::error::Result;
use crate::stats::loss::mae;
use crate::stats::loss::mape;
use crate::stats::loss::rmse;

/// Share of the sample held out by default.
pub const DEFAULT_HOLDOUT_FRACTION: f64 = 0.2;

/// Grade of a model by its mean absolute percentage error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelQuality {
  Excellent,
  Good,
  Acceptable,
  Fair,
  Poor,
  NoData,
}

impl ModelQuality {
  /// Tiers break at 10, 20, 30 and 50 percent.
  pub fn from_mape(mape: f64) -> Self {
    match mape {
      m if !m.is_finite() => Self::NoData,
      m if m < 10.0 => Self::Excellent,
      m if m < 20.0 => Self::Good,
      m if m < 30.0 => Self::Acceptable,
      m if m < 50.0 => Self::Fair,
      _ => Self::Poor,
    }
  }
}

/// Out-of-sample errors of a multi-step forecast over the held-out tail.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HoldoutMetrics {
  pub train_size: usize,
  pub test_size: usize,
  pub rmse: f64,
  pub mae: f64,
  /// Percent.
  pub mape: f64,
  /// RMSE relative to the mean held-out value, in percent. `None` when that
  /// mean is zero.
  pub rmse_percent: Option<f64>,
  pub mae_percent: Option<f64>,
  pub quality: ModelQuality,
}

/// Fits `order` on the first `1 - fraction` of `input` and scores the
/// forecast of the remaining rows.
pub fn evaluate_holdout(
  estimator: &dyn Estimator,
  input: &ModelInput,
  order: &SarimaOrder,
  fraction: f64,
) -> Result<HoldoutMetrics> {
  if !(fraction > 0.0 && fraction < 1.0) {
    return Err(FolioError::InvalidParameter(format!(
      "holdout fraction must be in (0, 1), got {fraction}"
    )));
  }
  let n = input.n_obs();
  let train_size = (n as f64 * (1.0 - fraction)).floor() as usize;
  let (train, actual) = input.split_at(train_size)?;
  let test_size = actual.len();

  let model = estimator.fit(&train, order)?;
  let predicted = model.point_forecast(test_size);
  if predicted.len() != test_size || predicted.iter().any(|v| !v.is_finite()) {
    return Err(FolioError::Convergence(format!(
      "{order} produced non-finite holdout forecasts"
    )));
  }

  let rmse = rmse(&actual, &predicted);
  let mae = mae(&actual, &predicted);
  let mape = mape(&actual, &predicted);
  let level = actual.iter().sum::<f64>() / test_size as f64;
  let relative = |v: f64| (level.abs() > f64::EPSILON).then(|| v / level * 100.0);
  debug!(order = %order, train_size, test_size, rmse, mape, "holdout evaluated");

  Ok(HoldoutMetrics {
    train_size,
    test_size,
    rmse,
    mae,
    mape,
    rmse_percent: relative(rmse),
    mae_percent: relative(mae),
    quality: ModelQuality::from_mape(mape),
  })
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use chrono::NaiveDate;

  use super::*;
  use crate::data::Interval;
  use crate::forecast::sarimax::FullSarimaxEstimator;
  use crate::forecast::trend::LinearTrendFallbackEstimator;

  fn dates(n: usize) -> Vec<NaiveDate> {
    Interval::Daily.future_dates(NaiveDate::from_ymd_opt(2022, 3, 1).unwrap(), n)
  }

  fn wavy_line(n: usize) -> Vec<f64> {
    (0..n).map(|t| 10.0 + 0.5 * t as f64 + 0.01 * (t as f64).sin()).collect()
  }

  #[test]
  fn quality_tiers() {
    assert_eq!(ModelQuality::from_mape(0.0), ModelQuality::Excellent);
    assert_eq!(ModelQuality::from_mape(9.99), ModelQuality::Excellent);
    assert_eq!(ModelQuality::from_mape(10.0), ModelQuality::Good);
    assert_eq!(ModelQuality::from_mape(25.0), ModelQuality::Acceptable);
    assert_eq!(ModelQuality::from_mape(49.9), ModelQuality::Fair);
    assert_eq!(ModelQuality::from_mape(50.0), ModelQuality::Poor);
    assert_eq!(ModelQuality::from_mape(f64::NAN), ModelQuality::NoData);
    assert_eq!(
      serde_json::to_string(&ModelQuality::NoData).unwrap(),
      "\"no_data\""
    );
  }

  #[test]
  fn trend_holdout_on_a_line_is_excellent() {
    let input = ModelInput::univariate(dates(100), wavy_line(100)).unwrap();
    let m = evaluate_holdout(
      &LinearTrendFallbackEstimator,
      &input,
      &SarimaOrder::default(),
      DEFAULT_HOLDOUT_FRACTION,
    )
    .unwrap();
    assert_eq!((m.train_size, m.test_size), (80, 20));
    assert!(m.rmse < 0.05, "rmse {}", m.rmse);
    assert!(m.mae <= m.rmse + 1e-12);
    assert_eq!(m.quality, ModelQuality::Excellent);

    let level = wavy_line(100)[80..].iter().sum::<f64>() / 20.0;
    assert_abs_diff_eq!(m.rmse_percent.unwrap(), m.rmse / level * 100.0, epsilon = 1e-12);
  }

  #[test]
  fn random_walk_holdout_scores_the_tail() {
    let mut level = 50.0;
    let y: Vec<f64> = (0..150)
      .map(|t| {
        level += 0.2 * ((t * 7 % 11) as f64 - 5.0);
        level
      })
      .collect();
    let input = ModelInput::univariate(dates(150), y.clone()).unwrap();
    let m = evaluate_holdout(
      &FullSarimaxEstimator::new(5000),
      &input,
      &SarimaOrder::arima(0, 1, 0),
      0.2,
    )
    .unwrap();
    // A random walk forecasts its last training value.
    let last = y[119];
    let expected = y[120..].iter().map(|v| (v - last).abs()).sum::<f64>() / 30.0;
    assert_eq!(m.test_size, 30);
    assert_abs_diff_eq!(m.mae, expected, epsilon = 1e-9);
  }

  #[test]
  fn split_carries_the_next_regressor() {
    let x: Vec<f64> = (0..40).map(|t| t as f64).collect();
    let input = ModelInput::lagged(dates(40), wavy_line(40), vec![("X".into(), x)]).unwrap();
    let (head, tail) = input.split_at(30).unwrap();
    assert_eq!(head.n_obs(), 30);
    assert_eq!(tail.len(), 9);
    assert_eq!(head.next_exog, vec![input.exog[0][30]]);
    assert!(input.split_at(39).is_err());
  }

  #[test]
  fn bad_fraction_or_short_sample_is_rejected() {
    let input = ModelInput::univariate(dates(4), wavy_line(4)).unwrap();
    let trend = LinearTrendFallbackEstimator;
    let order = SarimaOrder::default();
    assert!(matches!(
      evaluate_holdout(&trend, &input, &order, 1.0),
      Err(FolioError::InvalidParameter(_))
    ));
    assert!(matches!(
      evaluate_holdout(&trend, &input, &order, 0.5),
      Err(FolioError::InsufficientData(_))
    ));
  }
}
