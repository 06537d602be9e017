//! # Simplex Quadratic Program
//!
//! $$
//! \min_{\mathbf{w}} \ \tfrac12 \mathbf{w}^\top \Sigma \mathbf{w}
//! \quad \text{s.t.}\quad \mathbf{1}^\top\mathbf{w}=1,\ \ \mu^\top\mathbf{w}=r^\*,\ \ \mathbf{w}\ge 0
//! $$
//!
//! Primal active-set method. Each iteration solves the equality-constrained
//! KKT system on the free coordinates
//!
//! $$
//! \begin{bmatrix}\Sigma_{FF} & A_F^\top \\ A_F & 0\end{bmatrix}
//! \begin{bmatrix}\mathbf{p}_F \\ \mathbf{y}\end{bmatrix}
//! =\begin{bmatrix}-\Sigma_{F\cdot}\mathbf{w} \\ 0\end{bmatrix}
//! $$
//!
//! with an SVD least-squares solve, so linearly dependent constraint rows
//! (equal means among the free assets) do not break the iteration. Starting
//! points are deterministic, hence so is the result.
//!
//! The iteration runs on a copy rescaled to unit mean variance with means
//! mapped onto `[0, 1]`, so tolerances do not depend on the return frequency.
//! Bounds are released lowest index first. A bound that blocks a zero-length
//! step is not released again until the objective decreases, which rules out
//! cycling at degenerate vertices.

use nalgebra::DMatrix;
use nalgebra::DVector;
use tracing::trace;

use crate::error::FolioError;
use crate::error::Result;

/// Steps below this are treated as zero, in weight units.
const STEP_TOL: f64 = 1e-10;
/// Smallest descent component that can block a step.
const PIVOT_TOL: f64 = 1e-12;
/// Bound multipliers above `-(MULTIPLIER_TOL * |g|_max + MULTIPLIER_FLOOR)`
/// count as optimal, in units of the mean asset variance.
const MULTIPLIER_TOL: f64 = 1e-9;
const MULTIPLIER_FLOOR: f64 = 1e-13;
const SVD_RCOND: f64 = 1e-13;

#[derive(Clone, Debug)]
pub struct QpSolution {
  /// Long-only weights summing to one.
  pub weights: DVector<f64>,
  /// Per-period portfolio variance `wᵀΣw`.
  pub variance: f64,
  pub iterations: usize,
}

/// Long-only, fully invested minimum-variance problem.
pub struct SimplexQp<'a> {
  covariance: &'a DMatrix<f64>,
  mean: &'a DVector<f64>,
  max_iterations: usize,
}

/// The problem rescaled so that the mean variance is one and the means span
/// `[0, 1]`, with the starting point and working set.
struct Working {
  covariance: DMatrix<f64>,
  /// `None` when the return row is implied by the budget row.
  mean: Option<DVector<f64>>,
  w: DVector<f64>,
  active: Vec<bool>,
}

impl<'a> SimplexQp<'a> {
  pub fn new(covariance: &'a DMatrix<f64>, mean: &'a DVector<f64>, max_iterations: usize) -> Self {
    Self {
      covariance,
      mean,
      max_iterations,
    }
  }

  /// Global minimum-variance portfolio.
  pub fn min_variance(&self) -> Result<QpSolution> {
    self.solve(None)
  }

  /// Minimum-variance portfolio with `μᵀw = target`.
  pub fn with_target(&self, target: f64) -> Result<QpSolution> {
    self.solve(Some(target))
  }

  fn start(&self, target: Option<f64>) -> Result<Working> {
    let n = self.mean.len();
    let unit = self.covariance.trace() / n as f64;
    let unit = if unit.is_finite() && unit > 0.0 { unit } else { 1.0 };
    let covariance = self.covariance.unscale(unit);
    let equal = Working {
      covariance: covariance.clone(),
      mean: None,
      w: DVector::from_element(n, 1.0 / n as f64),
      active: vec![false; n],
    };
    let Some(target) = target else {
      return Ok(equal);
    };

    let (lo, mu_lo) = self
      .mean
      .iter()
      .enumerate()
      .fold((0, f64::INFINITY), |acc, (i, &m)| if m < acc.1 { (i, m) } else { acc });
    let (hi, mu_hi) = self
      .mean
      .iter()
      .enumerate()
      .fold((0, f64::NEG_INFINITY), |acc, (i, &m)| if m > acc.1 { (i, m) } else { acc });

    let span = mu_hi - mu_lo;
    let tol = 1e-12 * mu_hi.abs().max(mu_lo.abs()).max(1e-300);
    if target < mu_lo - tol || target > mu_hi + tol {
      return Err(FolioError::InfeasibleConstraint(format!(
        "target return {target:e} outside attainable range [{mu_lo:e}, {mu_hi:e}]"
      )));
    }

    // Equal means meet every attainable target.
    if span <= tol {
      return Ok(equal);
    }

    let lambda = ((target - mu_lo) / span).clamp(0.0, 1.0);
    let mut w = DVector::zeros(n);
    w[lo] = 1.0 - lambda;
    w[hi] = lambda;
    // Both end assets stay free, even at zero weight, so the working
    // constraints start linearly independent.
    let active = (0..n).map(|i| i != lo && i != hi).collect();
    Ok(Working {
      covariance,
      mean: Some(self.mean.map(|m| (m - mu_lo) / span)),
      w,
      active,
    })
  }

  fn solve(&self, target: Option<f64>) -> Result<QpSolution> {
    let n = self.mean.len();
    if n == 0 || self.covariance.shape() != (n, n) {
      return Err(FolioError::InvalidParameter(format!(
        "covariance shape {:?} does not match {n} means",
        self.covariance.shape()
      )));
    }

    let Working {
      covariance: cov,
      mean,
      mut w,
      mut active,
    } = self.start(target)?;
    let rows = if mean.is_some() { 2 } else { 1 };
    let mean_of = |i: usize| mean.as_ref().map_or(0.0, |m| m[i]);
    // Bounds that may not be released again until the objective decreases.
    let mut tabu = vec![false; n];
    let mut at_minimizer = false;

    for iter in 0..self.max_iterations {
      let free: Vec<usize> = (0..n).filter(|&i| !active[i]).collect();
      if free.is_empty() {
        return Err(FolioError::InfeasibleConstraint(
          "every weight is bound at zero".into(),
        ));
      }

      let g = &cov * &w;
      let k = free.len();
      let dim = k + rows;
      let mut kkt = DMatrix::zeros(dim, dim);
      let mut rhs = DVector::zeros(dim);
      for (a, &i) in free.iter().enumerate() {
        for (b, &j) in free.iter().enumerate() {
          kkt[(a, b)] = cov[(i, j)];
        }
        kkt[(a, k)] = 1.0;
        kkt[(k, a)] = 1.0;
        if rows == 2 {
          kkt[(a, k + 1)] = mean_of(i);
          kkt[(k + 1, a)] = mean_of(i);
        }
        rhs[a] = -g[i];
      }

      let sol = solve_kkt(&kkt, &rhs)?;
      let y_sum = sol[k];
      let y_ret = if rows == 2 { sol[k + 1] } else { 0.0 };
      let step_norm = (0..k).map(|a| sol[a].abs()).fold(0.0, f64::max);

      if at_minimizer || step_norm <= STEP_TOL {
        let tol = MULTIPLIER_TOL * g.amax() + MULTIPLIER_FLOOR;
        // Lowest index first among negative bound multipliers (Bland).
        let release = (0..n)
          .find(|&i| active[i] && !tabu[i] && g[i] + y_sum + y_ret * mean_of(i) < -tol);
        match release {
          Some(i) => {
            trace!(asset = i, iteration = iter, "releasing bound");
            active[i] = false;
            tabu[i] = true;
            at_minimizer = false;
            continue;
          }
          None => return Ok(self.finish(w, iter + 1)),
        }
      }

      // Ties go to the lowest index.
      let mut alpha = 1.0;
      let mut blocking = None;
      for (a, &i) in free.iter().enumerate() {
        let p = sol[a];
        if p < -PIVOT_TOL {
          let ratio = (w[i] / -p).max(0.0);
          if ratio < alpha {
            alpha = ratio;
            blocking = Some(i);
          }
        }
      }

      for (a, &i) in free.iter().enumerate() {
        w[i] += alpha * sol[a];
      }
      match blocking {
        Some(i) => {
          w[i] = 0.0;
          active[i] = true;
          if alpha > STEP_TOL {
            tabu.fill(false);
          } else {
            tabu[i] = true;
          }
          at_minimizer = false;
        }
        None => {
          tabu.fill(false);
          at_minimizer = true;
        }
      }
    }

    Err(FolioError::timeout(
      "active-set QP",
      format!("{} iterations", self.max_iterations),
    ))
  }

  fn finish(&self, mut w: DVector<f64>, iterations: usize) -> QpSolution {
    w.iter_mut().for_each(|x| *x = x.max(0.0));
    let total = w.sum();
    if total > 0.0 {
      w /= total;
    }
    let variance = (w.transpose() * self.covariance * &w)[(0, 0)];
    QpSolution {
      weights: w,
      variance,
      iterations,
    }
  }
}

/// SVD least-squares solve followed by one pass of iterative refinement.
fn solve_kkt(kkt: &DMatrix<f64>, rhs: &DVector<f64>) -> Result<DVector<f64>> {
  let svd = kkt.clone().svd(true, true);
  let eps = svd.singular_values.max() * SVD_RCOND;
  let failed = |e: &str| FolioError::Convergence(format!("KKT solve failed: {e}"));
  let mut sol = svd.solve(rhs, eps).map_err(failed)?;
  let residual = rhs - kkt * &sol;
  sol += svd.solve(&residual, eps).map_err(failed)?;
  Ok(sol)
}
