//! # Loss
//!
//! $$
//! L=\frac1n\sum_{i=1}^n \ell(y_i,\hat y_i)
//! $$
//!
//! In-sample fit metrics. Empty inputs yield `NaN`.

/// Mean Absolute Error: MAE = (1/N) Σ|actual_i - fitted_i|
pub fn mae(actual: &[f64], fitted: &[f64]) -> f64 {
  let n = actual.len().min(fitted.len());
  if n == 0 {
    return f64::NAN;
  }
  actual
    .iter()
    .zip(fitted.iter())
    .map(|(a, f)| (a - f).abs())
    .sum::<f64>()
    / n as f64
}

/// Mean Squared Error: MSE = (1/N) Σ(actual_i - fitted_i)²
pub fn mse(actual: &[f64], fitted: &[f64]) -> f64 {
  let n = actual.len().min(fitted.len());
  if n == 0 {
    return f64::NAN;
  }
  actual
    .iter()
    .zip(fitted.iter())
    .map(|(a, f)| (a - f).powi(2))
    .sum::<f64>()
    / n as f64
}

/// Root Mean Squared Error: RMSE = √MSE
pub fn rmse(actual: &[f64], fitted: &[f64]) -> f64 {
  mse(actual, fitted).sqrt()
}

/// Mean Absolute Percentage Error (in %): MAPE = (100/N) Σ|(actual_i - fitted_i) / actual_i|
///
/// Observations with a zero actual are skipped.
pub fn mape(actual: &[f64], fitted: &[f64]) -> f64 {
  let (sum, count) = actual
    .iter()
    .zip(fitted.iter())
    .filter(|(a, _)| a.abs() >= f64::EPSILON)
    .fold((0.0, 0usize), |(s, c), (a, f)| (s + ((a - f) / a).abs(), c + 1));
  if count == 0 {
    f64::NAN
  } else {
    sum / count as f64 * 100.0
  }
}
