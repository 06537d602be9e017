//! # SARIMA Order
//!
//! $$
//! \Phi(B^s)\,\phi(B)\,(1-B)^d(1-B^s)^D\,y_t=\Theta(B^s)\,\theta(B)\,\varepsilon_t
//! $$
//!

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::error::FolioError;
use crate::error::Result;

/// Orders `(p, d, q)(P, D, Q, s)` of a seasonal ARIMA model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SarimaOrder {
  pub p: usize,
  pub d: usize,
  pub q: usize,
  #[serde(rename = "P")]
  pub seasonal_p: usize,
  #[serde(rename = "D")]
  pub seasonal_d: usize,
  #[serde(rename = "Q")]
  pub seasonal_q: usize,
  pub s: usize,
}

impl Default for SarimaOrder {
  fn default() -> Self {
    Self::new(1, 1, 1, 0, 1, 1, 12)
  }
}

impl SarimaOrder {
  #[allow(clippy::too_many_arguments)]
  pub fn new(
    p: usize,
    d: usize,
    q: usize,
    seasonal_p: usize,
    seasonal_d: usize,
    seasonal_q: usize,
    s: usize,
  ) -> Self {
    Self {
      p,
      d,
      q,
      seasonal_p,
      seasonal_d,
      seasonal_q,
      s,
    }
  }

  /// Plain ARIMA(p, d, q).
  pub fn arima(p: usize, d: usize, q: usize) -> Self {
    Self::new(p, d, q, 0, 0, 0, 0)
  }

  pub fn has_seasonal_terms(&self) -> bool {
    self.seasonal_p + self.seasonal_d + self.seasonal_q > 0
  }

  /// Seasonal lag actually used; zero when the model has no seasonal terms.
  pub fn season(&self) -> usize {
    if self.has_seasonal_terms() {
      self.s
    } else {
      0
    }
  }

  pub fn n_arma_params(&self) -> usize {
    self.p + self.q + self.seasonal_p + self.seasonal_q
  }

  /// An intercept is estimated only for undifferenced models.
  pub fn has_intercept(&self) -> bool {
    self.d + self.seasonal_d == 0
  }

  /// Estimated coefficients for `n_exog` regressors, excluding the innovation variance.
  pub fn n_params(&self, n_exog: usize) -> usize {
    self.n_arma_params() + n_exog + usize::from(self.has_intercept())
  }

  /// Observations consumed by differencing.
  pub fn differencing_loss(&self) -> usize {
    self.d + self.seasonal_d * self.season()
  }

  /// Longest AR lag of the expanded model polynomial.
  pub fn max_ar_lag(&self) -> usize {
    self.p + self.seasonal_p * self.season()
  }

  /// Smallest sample that leaves every coefficient identifiable:
  /// `max(p,q) + s·max(P,Q) + d + s·D + 1 + n_params`.
  pub fn min_observations(&self, n_exog: usize) -> usize {
    let s = self.season();
    self.p.max(self.q)
      + s * self.seasonal_p.max(self.seasonal_q)
      + self.differencing_loss()
      + 1
      + self.n_params(n_exog)
  }

  pub fn validate(&self) -> Result<()> {
    if self.has_seasonal_terms() && self.s < 2 {
      return Err(FolioError::InvalidParameter(format!(
        "seasonal terms need a season length of at least 2, got s = {}",
        self.s
      )));
    }
    if self.p + self.q + self.seasonal_p + self.seasonal_q > 12 {
      return Err(FolioError::InvalidParameter(format!(
        "{self} has too many ARMA terms"
      )));
    }
    if self.d > 3 || self.seasonal_d > 2 {
      return Err(FolioError::InvalidParameter(format!(
        "{self} differences more than supported (d <= 3, D <= 2)"
      )));
    }
    Ok(())
  }

  pub fn order(&self) -> [usize; 3] {
    [self.p, self.d, self.q]
  }

  pub fn seasonal_order(&self) -> [usize; 4] {
    [self.seasonal_p, self.seasonal_d, self.seasonal_q, self.s]
  }
}

impl fmt::Display for SarimaOrder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "SARIMAX({},{},{})({},{},{},{})",
      self.p, self.d, self.q, self.seasonal_p, self.seasonal_d, self.seasonal_q, self.s
    )
  }
}
