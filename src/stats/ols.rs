//! # Ordinary Least Squares
//!
//! $$
//! \hat\beta = (X^\top X)^{-1} X^\top y,\qquad \hat\sigma^2 = \frac{\lVert y - X\hat\beta \rVert^2}{n-k}
//! $$
//!

use nalgebra::DMatrix;
use nalgebra::DVector;

use crate::error::FolioError;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct OlsResult {
  pub beta: Vec<f64>,
  pub std_err: Vec<f64>,
  pub residuals: Vec<f64>,
  pub sse: f64,
  pub sigma2: f64,
  pub nobs: usize,
  pub k: usize,
}

impl OlsResult {
  /// Fitted value for one design row.
  pub fn predict(&self, row: &[f64]) -> f64 {
    self.beta.iter().zip(row).map(|(b, x)| b * x).sum()
  }
}

/// OLS with rows of `x` as observations.
pub fn ols(y: &[f64], x: &[Vec<f64>]) -> Result<OlsResult> {
  if y.is_empty() || y.len() != x.len() {
    return Err(FolioError::InvalidParameter(format!(
      "OLS needs matching non-empty y/x, got {} and {} rows",
      y.len(),
      x.len()
    )));
  }
  let n = y.len();
  let k = x[0].len();
  if k == 0 || x.iter().any(|row| row.len() != k) {
    return Err(FolioError::InvalidParameter(
      "OLS design matrix must be rectangular with at least one regressor".into(),
    ));
  }
  if n <= k {
    return Err(FolioError::InsufficientData(format!(
      "OLS needs more observations ({n}) than regressors ({k})"
    )));
  }

  let mut flat_x = Vec::with_capacity(n * k);
  for row in x {
    flat_x.extend_from_slice(row);
  }

  let x_mat = DMatrix::from_row_slice(n, k, &flat_x);
  let y_vec = DVector::from_row_slice(y);

  let xtx = x_mat.transpose() * &x_mat;
  let Some(xtx_inv) = xtx.try_inverse() else {
    return Err(FolioError::InvalidParameter(
      "OLS failed: singular design matrix".into(),
    ));
  };

  let beta = &xtx_inv * x_mat.transpose() * &y_vec;
  let fitted = &x_mat * &beta;
  let residuals_vec = y_vec - fitted;

  let residuals: Vec<f64> = residuals_vec.iter().copied().collect();
  let sse = residuals.iter().map(|u| u * u).sum::<f64>();
  let dof = (n - k) as f64;
  let sigma2 = (sse / dof).max(0.0);

  let cov = xtx_inv * sigma2;
  let std_err = (0..k).map(|i| cov[(i, i)].max(0.0).sqrt()).collect();

  Ok(OlsResult {
    beta: beta.iter().copied().collect(),
    std_err,
    residuals,
    sse,
    sigma2,
    nobs: n,
    k,
  })
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  #[test]
  fn recovers_exact_line() {
    let y: Vec<f64> = (0..10).map(|t| 2.0 + 0.5 * t as f64).collect();
    let x: Vec<Vec<f64>> = (0..10).map(|t| vec![1.0, t as f64]).collect();
    let fit = ols(&y, &x).unwrap();
    assert_abs_diff_eq!(fit.beta[0], 2.0, epsilon = 1e-10);
    assert_abs_diff_eq!(fit.beta[1], 0.5, epsilon = 1e-10);
    assert_abs_diff_eq!(fit.sse, 0.0, epsilon = 1e-18);
    assert_abs_diff_eq!(fit.predict(&[1.0, 20.0]), 12.0, epsilon = 1e-9);
  }

  #[test]
  fn collinear_design_is_an_error() {
    let y = vec![1.0, 2.0, 3.0, 4.0];
    let x: Vec<Vec<f64>> = (0..4).map(|t| vec![t as f64, 2.0 * t as f64]).collect();
    assert!(ols(&y, &x).is_err());
  }

  #[test]
  fn too_few_rows_is_insufficient_data() {
    let err = ols(&[1.0], &[vec![1.0]]).unwrap_err();
    assert!(matches!(err, FolioError::InsufficientData(_)));
  }
}
