//! # Differencing
//!
//! $$
//! \nabla^d\nabla_s^D y_t=(1-B)^d(1-B^s)^D y_t
//! $$
//!
//! Every stage keeps its input series, so integration reuses exactly the seed
//! values that differencing removed.

use crate::error::FolioError;
use crate::error::Result;

/// `d`-th order first differences.
pub fn difference(x: &[f64], d: usize) -> Vec<f64> {
  let mut out = x.to_vec();
  for _ in 0..d {
    out = lag_difference(&out, 1);
  }
  out
}

/// `D`-th order seasonal differences at lag `s`.
pub fn seasonal_difference(x: &[f64], s: usize, seasonal_d: usize) -> Vec<f64> {
  let mut out = x.to_vec();
  for _ in 0..seasonal_d {
    out = lag_difference(&out, s);
  }
  out
}

fn lag_difference(x: &[f64], lag: usize) -> Vec<f64> {
  if x.len() <= lag {
    return Vec::new();
  }
  (lag..x.len()).map(|t| x[t] - x[t - lag]).collect()
}

/// Inverts [`difference`]: returns `original[d..]` rebuilt from `diffed`
/// by cumulative summation seeded with the first values of `original`.
pub fn integrate(diffed: &[f64], original: &[f64], d: usize) -> Result<Vec<f64>> {
  if original.len() != diffed.len() + d {
    return Err(FolioError::InvalidParameter(format!(
      "integration needs {} original values, got {}",
      diffed.len() + d,
      original.len()
    )));
  }
  Ok(apply_differencing(original, d, 0, 0).integrate(diffed))
}

#[derive(Clone, Debug)]
struct Stage {
  lag: usize,
  input: Vec<f64>,
}

/// A differenced series together with the history needed to undo it.
#[derive(Clone, Debug)]
pub struct Differenced {
  pub values: Vec<f64>,
  stages: Vec<Stage>,
}

/// Applies `(1-B^s)^D` and then `(1-B)^d`.
pub fn apply_differencing(x: &[f64], d: usize, seasonal_d: usize, s: usize) -> Differenced {
  let mut stages = Vec::with_capacity(d + seasonal_d);
  let mut cur = x.to_vec();
  let lags = std::iter::repeat(s)
    .take(if s > 0 { seasonal_d } else { 0 })
    .chain(std::iter::repeat(1).take(d));
  for lag in lags {
    let next = lag_difference(&cur, lag);
    stages.push(Stage { lag, input: cur });
    cur = next;
  }
  Differenced {
    values: cur,
    stages,
  }
}

impl Differenced {
  /// Leading observations lost to differencing.
  pub fn lost(&self) -> usize {
    self.stages.iter().map(|s| s.lag).sum()
  }

  /// Rebuilds the levels aligned with `values` from a replacement series of
  /// the same length. `integrate(&self.values)` returns `x[lost..]`.
  pub fn integrate(&self, values: &[f64]) -> Vec<f64> {
    let mut cur = values.to_vec();
    for stage in self.stages.iter().rev() {
      let lag = stage.lag;
      let mut full: Vec<f64> = stage.input.iter().take(lag).copied().collect();
      full.reserve(cur.len());
      for (t, v) in cur.iter().enumerate() {
        let prev = full[t];
        full.push(v + prev);
      }
      cur = full;
    }
    let lost = self.lost();
    cur.split_off(lost.min(cur.len()))
  }

  /// Extends the original series with `future` values given on the
  /// differenced scale.
  pub fn integrate_forecast(&self, future: &[f64]) -> Vec<f64> {
    let mut cur = future.to_vec();
    for stage in self.stages.iter().rev() {
      let lag = stage.lag;
      let mut ext = stage.input.clone();
      let base = ext.len();
      for v in &cur {
        let prev = ext.len().checked_sub(lag).map_or(0.0, |i| ext[i]);
        ext.push(v + prev);
      }
      cur = ext.split_off(base);
    }
    cur
  }
}
