use crate::error::FolioError;
use crate::error::Result;
use crate::stats::ols::ols;
use crate::stats::ols::OlsResult;

pub fn validate_series(y: &[f64], min_n: usize) -> Result<()> {
  if y.len() < min_n {
    return Err(FolioError::InsufficientData(format!(
      "series must have at least {min_n} observations, got {}",
      y.len()
    )));
  }
  if !y.iter().all(|v| v.is_finite()) {
    return Err(FolioError::InvalidParameter(
      "series must contain only finite values".into(),
    ));
  }
  Ok(())
}

pub fn schwert_max_lags(n: usize) -> usize {
  if n <= 1 {
    return 0;
  }
  (12.0 * (n as f64 / 100.0).powf(0.25)).floor() as usize
}

/// Bartlett-kernel long-run variance, floored at the plain variance when the
/// estimate is not positive.
pub fn newey_west_long_run_variance(u: &[f64], lags: usize) -> f64 {
  let n = u.len();
  if n == 0 {
    return 0.0;
  }
  let n_f = n as f64;

  let gamma0 = u.iter().map(|v| v * v).sum::<f64>() / n_f;
  let mut lr_var = gamma0;

  for j in 1..=lags {
    if j >= n {
      break;
    }
    let weight = 1.0 - (j as f64) / (lags as f64 + 1.0);
    let cov = (j..n).map(|t| u[t] * u[t - j]).sum::<f64>() / n_f;
    lr_var += 2.0 * weight * cov;
  }

  if lr_var <= 0.0 || !lr_var.is_finite() {
    gamma0.max(1e-12)
  } else {
    lr_var
  }
}

/// Regress on a constant, and a linear trend when `include_trend`.
pub fn regress_on_deterministics(y: &[f64], include_trend: bool) -> Result<OlsResult> {
  validate_series(y, if include_trend { 3 } else { 2 })?;
  let x: Vec<Vec<f64>> = (0..y.len())
    .map(|t| {
      if include_trend {
        vec![1.0, (t + 1) as f64]
      } else {
        vec![1.0]
      }
    })
    .collect();
  ols(y, &x)
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  #[test]
  fn white_noise_long_run_variance_is_close_to_variance() {
    let u = [1.0, -1.0, 1.0, -1.0];
    // gamma0 = 1, gamma1 = -3/4 with weight 1/2
    assert_abs_diff_eq!(newey_west_long_run_variance(&u, 1), 0.25, epsilon = 1e-12);
    assert_abs_diff_eq!(newey_west_long_run_variance(&u, 0), 1.0, epsilon = 1e-12);
  }

  #[test]
  fn schwert_rule() {
    assert_eq!(schwert_max_lags(100), 12);
    assert_eq!(schwert_max_lags(1), 0);
  }

  #[test]
  fn rejects_non_finite() {
    assert!(validate_series(&[1.0, f64::NAN, 2.0], 2).is_err());
  }
}
