//! # Lag Polynomials
//!
//! $$
//! \phi(B)=1-\sum_{i=1}^p\phi_iB^i,\qquad \theta(B)=1+\sum_{j=1}^q\theta_jB^j,\qquad
//! \psi(B)=\frac{\theta(B)\Theta(B^s)}{\phi(B)\Phi(B^s)(1-B)^d(1-B^s)^D}
//! $$
//!
//! Polynomials are coefficient vectors in ascending powers of `B`.

pub fn poly_mul(a: &[f64], b: &[f64]) -> Vec<f64> {
  if a.is_empty() || b.is_empty() {
    return Vec::new();
  }
  let mut out = vec![0.0; a.len() + b.len() - 1];
  for (i, x) in a.iter().enumerate() {
    for (j, y) in b.iter().enumerate() {
      out[i + j] += x * y;
    }
  }
  out
}

/// `1 - Σ φ_i B^{i·step}`.
pub fn ar_polynomial(phi: &[f64], step: usize) -> Vec<f64> {
  lag_polynomial(phi, step, -1.0)
}

/// `1 + Σ θ_j B^{j·step}`.
pub fn ma_polynomial(theta: &[f64], step: usize) -> Vec<f64> {
  lag_polynomial(theta, step, 1.0)
}

fn lag_polynomial(coefs: &[f64], step: usize, sign: f64) -> Vec<f64> {
  let step = step.max(1);
  let mut out = vec![0.0; coefs.len() * step + 1];
  out[0] = 1.0;
  for (i, c) in coefs.iter().enumerate() {
    out[(i + 1) * step] = sign * c;
  }
  out
}

/// `(1-B)^d (1-B^s)^D`.
pub fn difference_polynomial(d: usize, seasonal_d: usize, s: usize) -> Vec<f64> {
  let mut out = vec![1.0];
  for _ in 0..d {
    out = poly_mul(&out, &[1.0, -1.0]);
  }
  if s > 0 {
    let mut seasonal = vec![0.0; s + 1];
    seasonal[0] = 1.0;
    seasonal[s] = -1.0;
    for _ in 0..seasonal_d {
      out = poly_mul(&out, &seasonal);
    }
  }
  out
}

/// First `n` coefficients of `ma(B) / ar(B)`; both polynomials start with 1.
pub fn psi_weights(ar: &[f64], ma: &[f64], n: usize) -> Vec<f64> {
  let mut psi = vec![0.0; n];
  for j in 0..n {
    let mut v = ma.get(j).copied().unwrap_or(if j == 0 { 1.0 } else { 0.0 });
    for i in 1..=j.min(ar.len().saturating_sub(1)) {
      v -= ar[i] * psi[j - i];
    }
    psi[j] = v;
  }
  psi
}

/// Whether `1 - Σ φ_i z^i` has every root outside the unit circle, via the
/// Levinson step-down recursion on the implied partial autocorrelations.
pub fn is_stationary(phi: &[f64]) -> bool {
  if phi.iter().any(|v| !v.is_finite()) {
    return false;
  }
  let mut a = phi.to_vec();
  while let Some(&kappa) = a.last() {
    if kappa.abs() >= 1.0 - 1e-10 {
      return false;
    }
    let k = a.len();
    let denom = 1.0 - kappa * kappa;
    a = (0..k - 1)
      .map(|j| (a[j] + kappa * a[k - 2 - j]) / denom)
      .collect();
  }
  true
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  #[test]
  fn seasonal_polynomials_expand() {
    let ar = poly_mul(&ar_polynomial(&[0.5], 1), &ar_polynomial(&[0.3], 4));
    assert_eq!(ar, vec![1.0, -0.5, 0.0, 0.0, -0.3, 0.15]);
    assert_eq!(ma_polynomial(&[0.4], 2), vec![1.0, 0.0, 0.4]);
    assert_eq!(difference_polynomial(1, 1, 3), vec![1.0, -1.0, 0.0, -1.0, 1.0]);
    assert_eq!(difference_polynomial(0, 1, 0), vec![1.0]);
  }

  #[test]
  fn psi_weights_of_ar1_and_random_walk() {
    let psi = psi_weights(&ar_polynomial(&[0.5], 1), &[1.0], 4);
    assert_eq!(psi, vec![1.0, 0.5, 0.25, 0.125]);

    // ARIMA(0,1,1): ψ_j = 1 + θ for j >= 1.
    let psi = psi_weights(&difference_polynomial(1, 0, 0), &ma_polynomial(&[0.4], 1), 4);
    for (a, b) in psi.iter().zip([1.0, 1.4, 1.4, 1.4]) {
      assert_abs_diff_eq!(*a, b, epsilon = 1e-12);
    }
  }

  #[test]
  fn stationarity_region() {
    assert!(is_stationary(&[]));
    assert!(is_stationary(&[0.9]));
    assert!(!is_stationary(&[1.0]));
    assert!(!is_stationary(&[-1.2]));
    assert!(is_stationary(&[0.5, 0.3]));
    assert!(!is_stationary(&[1.2, -0.1]));
    assert!(!is_stationary(&[0.5, 0.6]));
    assert!(is_stationary(&[1.5, -0.75]));
  }
}
