//! # Efficient Frontier
//!
//! $$
//! \sigma(r^\*)=\min_{\mathbf{w}\ge0,\ \mathbf{1}^\top\mathbf{w}=1,\ \mu^\top\mathbf{w}=r^\*}\sqrt{\mathbf{w}^\top\Sigma\mathbf{w}},
//! \qquad r^\* \in [\mu_{\mathrm{mv}},\ \max_i \mu_i]
//! $$
//!
//! The sweep starts at the global minimum-variance portfolio and runs evenly
//! spaced return targets up to the best single-asset mean. The maximum-Sharpe
//! portfolio is picked from the sampled points only.

use nalgebra::DMatrix;
use nalgebra::DVector;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::qp::QpSolution;
use super::qp::SimplexQp;
use super::returns::ReturnsEstimate;
use crate::config::Deadline;
use crate::config::FrontierConfig;
use crate::error::FolioError;
use crate::error::Result;

/// Below this annualized volatility a point has no Sharpe ratio.
pub const MIN_RISK: f64 = 1e-12;
const PIVOT_RATIO: f64 = 1e-12;
const RIDGE_ATTEMPTS: usize = 3;
const RIDGE_GROWTH: f64 = 100.0;

/// One sampled portfolio, annualized and in percent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrontierPoint {
  pub risk: f64,
  #[serde(rename = "return")]
  pub expected_return: f64,
  /// `None` when `risk` is not strictly positive.
  pub sharpe: Option<f64>,
  pub weights: Vec<f64>,
}

#[derive(Clone, Debug)]
pub struct Frontier {
  pub points: Vec<FrontierPoint>,
  pub min_variance: FrontierPoint,
  pub optimal: FrontierPoint,
  /// Absolute diagonal ridge added before solving, if any.
  pub ridge_applied: Option<f64>,
}

#[derive(Clone, Debug)]
pub struct EfficientFrontierSolver {
  config: FrontierConfig,
  risk_free: f64,
}

impl EfficientFrontierSolver {
  pub fn new(config: FrontierConfig, risk_free: f64) -> Self {
    Self { config, risk_free }
  }

  pub fn solve(&self, estimate: &ReturnsEstimate, deadline: &Deadline) -> Result<Frontier> {
    self.solve_moments(
      &estimate.mean,
      &estimate.covariance,
      estimate.periods_per_year,
      deadline,
    )
  }

  /// Sweeps the frontier for per-period moments annualized by `periods_per_year`.
  pub fn solve_moments(
    &self,
    mean: &DVector<f64>,
    covariance: &DMatrix<f64>,
    periods_per_year: f64,
    deadline: &Deadline,
  ) -> Result<Frontier> {
    self.config.validate()?;
    let n = mean.len();
    if n < 2 {
      return Err(FolioError::InfeasibleConstraint(format!(
        "efficient frontier needs at least 2 assets, got {n}"
      )));
    }
    if covariance.shape() != (n, n) {
      return Err(FolioError::InvalidParameter(format!(
        "covariance shape {:?} does not match {n} assets",
        covariance.shape()
      )));
    }
    if !self.risk_free.is_finite() {
      return Err(FolioError::InvalidParameter("risk-free rate must be finite".into()));
    }
    if mean.iter().chain(covariance.iter()).any(|v| !v.is_finite()) {
      return Err(FolioError::InvalidParameter(
        "moments contain non-finite values".into(),
      ));
    }

    let (cov, ridge_applied) = self.condition(covariance)?;
    let qp = SimplexQp::new(&cov, mean, self.config.max_qp_iterations);

    deadline.check("efficient frontier sweep")?;
    let mv = qp.min_variance()?;
    let mu_mv = mv.weights.dot(mean);
    let mu_max = mean.max();
    debug!(mu_mv, mu_max, iterations = mv.iterations, "minimum-variance portfolio");

    let resolution = self.config.resolution;
    // Equal means collapse every target onto the minimum-variance point.
    let flat = mu_max - mu_mv <= 1e-15 * mu_max.abs().max(1.0);
    let mut solutions: Vec<QpSolution> = Vec::with_capacity(resolution);
    solutions.push(mv);
    for k in 1..resolution {
      deadline.check("efficient frontier sweep")?;
      if flat {
        solutions.push(solutions[0].clone());
        continue;
      }
      let target = if k == resolution - 1 {
        mu_max
      } else {
        mu_mv + (mu_max - mu_mv) * k as f64 / (resolution - 1) as f64
      };
      solutions.push(qp.with_target(target)?);
    }

    let points: Vec<FrontierPoint> = solutions
      .iter()
      .map(|s| self.point(s, mean, periods_per_year))
      .collect();

    let min_variance = points
      .iter()
      .min_by(|a, b| a.risk.total_cmp(&b.risk))
      .cloned()
      .ok_or_else(|| FolioError::InsufficientData("empty frontier".into()))?;

    let optimal = points
      .iter()
      .filter(|p| p.sharpe.is_some())
      .fold(None::<&FrontierPoint>, |best, p| match best {
        Some(b) if b.sharpe >= p.sharpe => Some(b),
        _ => Some(p),
      })
      .cloned()
      .ok_or_else(|| {
        FolioError::InsufficientData("no frontier point has positive risk for a Sharpe ratio".into())
      })?;

    info!(
      points = points.len(),
      optimal_sharpe = optimal.sharpe,
      min_risk = min_variance.risk,
      ridge = ridge_applied,
      "efficient frontier solved"
    );

    Ok(Frontier {
      points,
      min_variance,
      optimal,
      ridge_applied,
    })
  }

  /// Returns a covariance that factors cleanly, adding an escalating ridge
  /// when the sample matrix is singular to working precision.
  fn condition(&self, covariance: &DMatrix<f64>) -> Result<(DMatrix<f64>, Option<f64>)> {
    let sym = (covariance + covariance.transpose()) * 0.5;
    if is_well_conditioned(&sym) {
      return Ok((sym, None));
    }

    let n = sym.nrows();
    let mean_var = sym.trace() / n as f64;
    if !(mean_var > 0.0) {
      return Err(FolioError::SingularCovariance { ridge: 0.0 });
    }
    let mut relative = self.config.ridge;
    for _ in 0..RIDGE_ATTEMPTS {
      let ridge = relative * mean_var;
      let regularized = &sym + DMatrix::identity(n, n) * ridge;
      if is_well_conditioned(&regularized) {
        warn!(ridge, "covariance is singular, solving with ridge-regularized diagonal");
        return Ok((regularized, Some(ridge)));
      }
      relative *= RIDGE_GROWTH;
    }

    Err(FolioError::SingularCovariance {
      ridge: relative / RIDGE_GROWTH * mean_var,
    })
  }

  fn point(&self, solution: &QpSolution, mean: &DVector<f64>, periods_per_year: f64) -> FrontierPoint {
    let ret = solution.weights.dot(mean) * periods_per_year;
    let risk = (solution.variance.max(0.0) * periods_per_year).sqrt();
    let sharpe = (risk > MIN_RISK).then(|| (ret - self.risk_free) / risk);
    FrontierPoint {
      risk: risk * 100.0,
      expected_return: ret * 100.0,
      sharpe,
      weights: solution.weights.iter().copied().collect(),
    }
  }
}

/// Cholesky exists and the smallest pivot is not negligible against the largest.
fn is_well_conditioned(cov: &DMatrix<f64>) -> bool {
  let Some(chol) = cov.clone().cholesky() else {
    return false;
  };
  let l = chol.l();
  let pivots: Vec<f64> = (0..l.nrows()).map(|i| l[(i, i)] * l[(i, i)]).collect();
  let max = pivots.iter().cloned().fold(0.0, f64::max);
  let min = pivots.iter().cloned().fold(f64::INFINITY, f64::min);
  max.is_finite() && max > 0.0 && min >= PIVOT_RATIO * max
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use rand_distr::Distribution;
  use rand_distr::Normal;

  use super::*;
  use crate::portfolio::returns::ReturnsEstimator;
  use crate::Interval;

  fn config(resolution: usize) -> FrontierConfig {
    FrontierConfig {
      resolution,
      ..FrontierConfig::default()
    }
  }

  fn three_assets() -> (DVector<f64>, DMatrix<f64>) {
    let mean = DVector::from_vec(vec![0.0004, 0.0006, 0.0002]);
    let cov = DMatrix::from_row_slice(
      3,
      3,
      &[
        1.6e-4, 2.0e-5, 1.0e-5, //
        2.0e-5, 3.6e-4, 3.0e-5, //
        1.0e-5, 3.0e-5, 8.0e-5,
      ],
    );
    (mean, cov)
  }

  #[test]
  fn frontier_points_are_long_only_and_fully_invested() {
    let (mean, cov) = three_assets();
    let frontier = EfficientFrontierSolver::new(config(40), 0.03)
      .solve_moments(&mean, &cov, 252.0, &Deadline::unbounded())
      .unwrap();

    assert_eq!(frontier.points.len(), 40);
    assert!(frontier.ridge_applied.is_none());
    for p in &frontier.points {
      assert_abs_diff_eq!(p.weights.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
      assert!(p.weights.iter().all(|w| *w >= -1e-12));
    }

    for p in &frontier.points {
      assert!(frontier.min_variance.risk <= p.risk + 1e-9);
      if p.risk > 1e-9 {
        assert!(frontier.optimal.sharpe.unwrap() >= p.sharpe.unwrap() - 1e-12);
      }
    }
    assert_eq!(frontier.min_variance, frontier.points[0]);
    // The last grid point is the best single asset.
    let last = frontier.points.last().unwrap();
    assert_abs_diff_eq!(last.weights[1], 1.0, epsilon = 1e-9);
  }

  #[test]
  fn returns_increase_along_the_sweep() {
    let (mean, cov) = three_assets();
    let frontier = EfficientFrontierSolver::new(config(20), 0.0)
      .solve_moments(&mean, &cov, 252.0, &Deadline::unbounded())
      .unwrap();
    for w in frontier.points.windows(2) {
      assert!(w[1].expected_return >= w[0].expected_return - 1e-9);
      assert!(w[1].risk >= w[0].risk - 1e-9);
    }
  }

  #[test]
  fn duplicated_asset_is_regularized_and_flagged() {
    let mean = DVector::from_vec(vec![0.0005, 0.0005, 0.0003]);
    let cov = DMatrix::from_row_slice(
      3,
      3,
      &[
        2.0e-4, 2.0e-4, 1.0e-5, //
        2.0e-4, 2.0e-4, 1.0e-5, //
        1.0e-5, 1.0e-5, 1.0e-4,
      ],
    );
    let frontier = EfficientFrontierSolver::new(config(10), 0.03)
      .solve_moments(&mean, &cov, 252.0, &Deadline::unbounded())
      .unwrap();
    assert!(frontier.ridge_applied.is_some());
    for p in &frontier.points {
      assert_abs_diff_eq!(p.weights.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
    }
  }

  #[test]
  fn zero_covariance_is_singular() {
    let mean = DVector::from_vec(vec![0.0, 0.0]);
    let cov = DMatrix::zeros(2, 2);
    let err = EfficientFrontierSolver::new(config(5), 0.03)
      .solve_moments(&mean, &cov, 252.0, &Deadline::unbounded())
      .unwrap_err();
    // A zero matrix cannot be regularized relative to its own scale.
    assert!(matches!(err, FolioError::SingularCovariance { .. }));
  }

  #[test]
  fn riskless_point_has_no_sharpe() {
    let solver = EfficientFrontierSolver::new(config(5), 0.03);
    let mean = DVector::from_vec(vec![0.001, 0.002]);
    let riskless = QpSolution {
      weights: DVector::from_vec(vec![1.0, 0.0]),
      variance: 0.0,
      iterations: 1,
    };
    let point = solver.point(&riskless, &mean, 252.0);
    assert!(point.sharpe.is_none());
    assert_abs_diff_eq!(point.expected_return, 25.2, epsilon = 1e-9);
  }

  #[test]
  fn single_asset_is_infeasible() {
    let mean = DVector::from_vec(vec![0.001]);
    let cov = DMatrix::from_element(1, 1, 1e-4);
    let err = EfficientFrontierSolver::new(config(5), 0.03)
      .solve_moments(&mean, &cov, 252.0, &Deadline::unbounded())
      .unwrap_err();
    assert!(matches!(err, FolioError::InfeasibleConstraint(_)));
  }

  #[test]
  fn expired_deadline_times_out() {
    let (mean, cov) = three_assets();
    let err = EfficientFrontierSolver::new(config(5), 0.03)
      .solve_moments(&mean, &cov, 252.0, &Deadline::new(Some(0)))
      .unwrap_err();
    assert!(matches!(err, FolioError::ComputationTimeout { .. }));
  }

  #[test]
  fn ridge_conditioned_sweep_has_non_decreasing_risk() {
    let step = Normal::new(0.0, 0.02).unwrap();
    for seed in 0..10 {
      // Three prices on seven assets leave a rank-one sample covariance.
      let mut rng = StdRng::seed_from_u64(seed);
      let prices = DMatrix::from_fn(3, 7, |r, c| {
        100.0 + 5.0 * c as f64 + 10.0 * r as f64 * step.sample(&mut rng)
      });
      let estimate = ReturnsEstimator::new(Interval::Daily).estimate(&prices).unwrap();
      let frontier = EfficientFrontierSolver::new(config(30), 0.0)
        .solve(&estimate, &Deadline::unbounded())
        .unwrap_or_else(|e| panic!("seed {seed}: {e}"));

      assert!(frontier.ridge_applied.is_some());
      let max_risk = frontier.points.iter().map(|p| p.risk).fold(0.0, f64::max);
      for w in frontier.points.windows(2) {
        assert!(
          w[1].risk >= w[0].risk - 1e-6 * max_risk,
          "seed {seed}: risk fell from {} to {}",
          w[0].risk,
          w[1].risk
        );
      }
    }
  }
}
