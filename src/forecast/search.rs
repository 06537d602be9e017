//! # Order Search
//!
//! $$
//! (p,d,q)(P,D,Q)^\*=\arg\min_{\text{evaluated orders}}\ \mathrm{AIC}
//! $$
//!
//! Two strategies over a bounded [`SearchSpace`]:
//!
//! - `Grid` (default) fits every order of the space, in parallel, so the
//!   selection is the minimum-AIC order of the whole space.
//! - `Stepwise` picks `d` by repeated KPSS tests, fixes `D` and hill-climbs
//!   from a few starting models through `±1` moves of `p, q, P, Q`. It visits
//!   far fewer orders and only guarantees the minimum over those it visited.
//!
//! Failed candidates are recorded and skipped. Ties keep the earlier candidate,
//! so the selection is deterministic.

use std::collections::HashSet;

use rayon::prelude::*;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;

use super::differencing::seasonal_difference;
use super::order::SarimaOrder;
use super::sarimax::Estimator;
use super::sarimax::FittedModel;
use super::sarimax::ModelInput;
use crate::config::Deadline;
use crate::config::SearchConfig;
use crate::error::FolioError;
use crate::error::Result;
use crate::stats::ndiffs;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
  #[default]
  Grid,
  Stepwise,
}

/// Inclusive upper bounds of the searched orders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSpace {
  pub max_p: usize,
  pub max_d: usize,
  pub max_q: usize,
  pub max_seasonal_p: usize,
  pub max_seasonal_d: usize,
  pub max_seasonal_q: usize,
}

impl Default for SearchSpace {
  fn default() -> Self {
    Self {
      max_p: 2,
      max_d: 1,
      max_q: 2,
      max_seasonal_p: 1,
      max_seasonal_d: 1,
      max_seasonal_q: 1,
    }
  }
}

impl SearchSpace {
  fn seasonal_bounds(&self, s: usize) -> (usize, usize, usize) {
    if s >= 2 {
      (self.max_seasonal_p, self.max_seasonal_d, self.max_seasonal_q)
    } else {
      (0, 0, 0)
    }
  }

  /// Every order of the space, `p` varying slowest.
  pub fn candidates(&self, s: usize) -> Vec<SarimaOrder> {
    let (max_sp, max_sd, max_sq) = self.seasonal_bounds(s);
    let mut out = Vec::new();
    for p in 0..=self.max_p {
      for d in 0..=self.max_d {
        for q in 0..=self.max_q {
          for sp in 0..=max_sp {
            for sd in 0..=max_sd {
              for sq in 0..=max_sq {
                out.push(SarimaOrder::new(p, d, q, sp, sd, sq, s));
              }
            }
          }
        }
      }
    }
    out
  }

  pub fn contains(&self, order: &SarimaOrder) -> bool {
    let (max_sp, max_sd, max_sq) = self.seasonal_bounds(order.s);
    order.p <= self.max_p
      && order.d <= self.max_d
      && order.q <= self.max_q
      && order.seasonal_p <= max_sp
      && order.seasonal_d <= max_sd
      && order.seasonal_q <= max_sq
  }
}

/// One evaluated order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
  pub order: SarimaOrder,
  pub aic: Option<f64>,
  pub error: Option<String>,
}

/// Search report: the chosen order and every order that was tried.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderSearchOutcome {
  pub strategy: SearchStrategy,
  pub best: SarimaOrder,
  pub best_aic: f64,
  /// Every order of the space was evaluated.
  pub exhaustive: bool,
  pub evaluated: Vec<Candidate>,
}

pub struct OrderSearch<'a> {
  estimator: &'a dyn Estimator,
  config: &'a SearchConfig,
  deadline: Deadline,
}

struct Tracker {
  evaluated: Vec<Candidate>,
  seen: HashSet<SarimaOrder>,
  best: Option<(FittedModel, f64)>,
}

impl Tracker {
  fn new() -> Self {
    Self {
      evaluated: Vec::new(),
      seen: HashSet::new(),
      best: None,
    }
  }

  /// Records results in candidate order; returns whether the best improved.
  fn absorb(&mut self, results: Vec<(SarimaOrder, Result<FittedModel>)>) -> Result<bool> {
    let mut improved = false;
    for (order, res) in results {
      match res {
        Ok(model) => {
          let aic = model.aic();
          self.evaluated.push(Candidate {
            order,
            aic: Some(aic),
            error: None,
          });
          let better = aic.is_finite() && self.best.as_ref().map_or(true, |(_, best)| aic < *best);
          if better {
            self.best = Some((model, aic));
            improved = true;
          }
        }
        Err(err @ FolioError::ComputationTimeout { .. }) => return Err(err),
        Err(err) => self.evaluated.push(Candidate {
          order,
          aic: None,
          error: Some(err.to_string()),
        }),
      }
    }
    Ok(improved)
  }
}

impl<'a> OrderSearch<'a> {
  pub fn new(estimator: &'a dyn Estimator, config: &'a SearchConfig, deadline: Deadline) -> Self {
    Self {
      estimator,
      config,
      deadline,
    }
  }

  /// Runs the configured strategy with season length `s`.
  pub fn run(&self, input: &ModelInput, s: usize) -> Result<(FittedModel, OrderSearchOutcome)> {
    let mut tracker = Tracker::new();
    match self.config.strategy {
      SearchStrategy::Grid => self.grid(input, s, &mut tracker)?,
      SearchStrategy::Stepwise => self.stepwise(input, s, &mut tracker)?,
    }

    let evaluated = tracker.evaluated;
    let Some((model, best_aic)) = tracker.best else {
      let reason = evaluated
        .last()
        .and_then(|c| c.error.clone())
        .unwrap_or_else(|| "no candidate orders".into());
      return Err(FolioError::Convergence(format!(
        "none of {} candidate orders could be fitted; last error: {reason}",
        evaluated.len()
      )));
    };

    info!(
      best = %model.order(),
      aic = best_aic,
      evaluated = evaluated.len(),
      "order search finished"
    );

    let outcome = OrderSearchOutcome {
      strategy: self.config.strategy,
      best: *model.order(),
      best_aic,
      exhaustive: self.config.strategy == SearchStrategy::Grid,
      evaluated,
    };
    Ok((model, outcome))
  }

  fn evaluate(&self, input: &ModelInput, orders: Vec<SarimaOrder>) -> Vec<(SarimaOrder, Result<FittedModel>)> {
    orders
      .into_par_iter()
      .map(|order| {
        let res = self
          .deadline
          .check("order search")
          .and_then(|_| self.estimator.fit(input, &order));
        (order, res)
      })
      .collect()
  }

  fn grid(&self, input: &ModelInput, s: usize, tracker: &mut Tracker) -> Result<()> {
    let orders = self.config.space.candidates(s);
    debug!(candidates = orders.len(), "grid order search");
    tracker.seen.extend(orders.iter().copied());
    let results = self.evaluate(input, orders);
    tracker.absorb(results)?;
    Ok(())
  }

  fn stepwise(&self, input: &ModelInput, s: usize, tracker: &mut Tracker) -> Result<()> {
    let space = &self.config.space;
    let (max_sp, max_sd, max_sq) = space.seasonal_bounds(s);

    let seasonal_d = if max_sd > 0 && input.n_obs() >= 3 * s { max_sd } else { 0 };
    let seasonal = seasonal_difference(&input.target, s, seasonal_d);
    let d = ndiffs(&seasonal, space.max_d, 0.05)?;
    debug!(d, seasonal_d, "stepwise differencing orders");

    let clip = |p: usize, q: usize, sp: usize, sq: usize| {
      SarimaOrder::new(
        p.min(space.max_p),
        d,
        q.min(space.max_q),
        sp.min(max_sp),
        seasonal_d,
        sq.min(max_sq),
        s,
      )
    };
    let starts = vec![clip(2, 2, 1, 1), clip(0, 0, 0, 0), clip(1, 0, 1, 0), clip(0, 1, 0, 1)];
    self.step(input, starts, tracker)?;

    loop {
      self.deadline.check("order search")?;
      let Some((best, _)) = tracker.best.as_ref() else {
        return Ok(());
      };
      let o = *best.order();
      let mut moves = Vec::new();
      for (dp, dq, dsp, dsq) in [
        (-1, 0, 0, 0),
        (1, 0, 0, 0),
        (0, -1, 0, 0),
        (0, 1, 0, 0),
        (-1, -1, 0, 0),
        (1, 1, 0, 0),
        (0, 0, -1, 0),
        (0, 0, 1, 0),
        (0, 0, 0, -1),
        (0, 0, 0, 1),
      ] {
        let shift = |v: usize, by: i32| usize::try_from(v as i64 + by as i64).ok();
        if let (Some(p), Some(q), Some(sp), Some(sq)) = (
          shift(o.p, dp),
          shift(o.q, dq),
          shift(o.seasonal_p, dsp),
          shift(o.seasonal_q, dsq),
        ) {
          let cand = SarimaOrder::new(p, d, q, sp, seasonal_d, sq, s);
          if space.contains(&cand) {
            moves.push(cand);
          }
        }
      }
      if !self.step(input, moves, tracker)? {
        return Ok(());
      }
    }
  }

  /// Evaluates the unseen orders of `orders`; returns whether the best improved.
  fn step(&self, input: &ModelInput, orders: Vec<SarimaOrder>, tracker: &mut Tracker) -> Result<bool> {
    let fresh: Vec<SarimaOrder> = orders
      .into_iter()
      .filter(|o| tracker.seen.insert(*o))
      .collect();
    if fresh.is_empty() {
      return Ok(false);
    }
    let results = self.evaluate(input, fresh);
    tracker.absorb(results)
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;
  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use rand_distr::Distribution;
  use rand_distr::Normal;

  use super::*;
  use crate::data::Interval;
  use crate::forecast::sarimax::FullSarimaxEstimator;

  fn ar1_walk(n: usize) -> ModelInput {
    let dist = Normal::new(0.0, 1.0).unwrap();
    let mut rng = StdRng::seed_from_u64(17);
    let mut level = 100.0;
    let mut prev = 0.0;
    let y: Vec<f64> = (0..n)
      .map(|_| {
        prev = 0.5 * prev + dist.sample(&mut rng);
        level += prev;
        level
      })
      .collect();
    let start = NaiveDate::from_ymd_opt(2020, 1, 6).unwrap();
    ModelInput::univariate(Interval::Daily.future_dates(start, n), y).unwrap()
  }

  fn small_space() -> SearchSpace {
    SearchSpace {
      max_p: 2,
      max_d: 1,
      max_q: 1,
      max_seasonal_p: 0,
      max_seasonal_d: 0,
      max_seasonal_q: 0,
    }
  }

  #[test]
  fn space_enumeration() {
    assert_eq!(SearchSpace::default().candidates(12).len(), 3 * 2 * 3 * 2 * 2 * 2);
    assert_eq!(SearchSpace::default().candidates(0).len(), 3 * 2 * 3);
    assert!(!SearchSpace::default().contains(&SarimaOrder::arima(3, 0, 0)));
    assert!(SearchSpace::default().contains(&SarimaOrder::default()));
  }

  #[test]
  fn grid_selects_minimum_aic_over_the_whole_space() {
    let input = ar1_walk(300);
    let estimator = FullSarimaxEstimator::new(5000);
    let config = SearchConfig {
      strategy: SearchStrategy::Grid,
      space: small_space(),
    };
    let (model, outcome) = OrderSearch::new(&estimator, &config, Deadline::unbounded())
      .run(&input, 0)
      .unwrap();

    assert_eq!(outcome.evaluated.len(), small_space().candidates(0).len());
    for c in outcome.evaluated.iter().filter_map(|c| c.aic) {
      assert!(outcome.best_aic <= c);
    }
    assert_eq!(outcome.best, *model.order());
  }

  #[test]
  fn stepwise_never_reports_a_better_unselected_order() {
    let input = ar1_walk(300);
    let estimator = FullSarimaxEstimator::new(5000);
    let config = SearchConfig {
      strategy: SearchStrategy::Stepwise,
      space: small_space(),
    };
    let (_, outcome) = OrderSearch::new(&estimator, &config, Deadline::unbounded())
      .run(&input, 0)
      .unwrap();
    assert!(!outcome.evaluated.is_empty());
    let mut orders: Vec<_> = outcome.evaluated.iter().map(|c| c.order).collect();
    let before = orders.len();
    orders.dedup();
    assert_eq!(orders.len(), before);
    for c in outcome.evaluated.iter().filter_map(|c| c.aic) {
      assert!(outcome.best_aic <= c);
    }
    assert!(outcome.evaluated.iter().all(|c| c.order.d == outcome.best.d));
  }

  #[test]
  fn expired_deadline_aborts_the_search() {
    let input = ar1_walk(100);
    let estimator = FullSarimaxEstimator::new(100);
    let config = SearchConfig {
      strategy: SearchStrategy::Grid,
      space: small_space(),
    };
    let err = OrderSearch::new(&estimator, &config, Deadline::new(Some(0)))
      .run(&input, 0)
      .unwrap_err();
    assert!(matches!(err, FolioError::ComputationTimeout { .. }));
  }

  #[test]
  fn default_search_matches_exhaustive_minimum() {
    let input = ar1_walk(300);
    let estimator = FullSarimaxEstimator::new(5000);
    let config = SearchConfig::default();
    let (model, outcome) = OrderSearch::new(&estimator, &config, Deadline::unbounded())
      .run(&input, 0)
      .unwrap();
    assert!(outcome.exhaustive);

    let mut best: Option<(SarimaOrder, f64)> = None;
    for order in config.space.candidates(0) {
      if let Ok(fit) = estimator.fit(&input, &order) {
        if fit.aic().is_finite() && best.map_or(true, |(_, aic)| fit.aic() < aic) {
          best = Some((order, fit.aic()));
        }
      }
    }
    let (order, aic) = best.unwrap();
    assert_eq!(outcome.best, order);
    assert_eq!(outcome.best_aic, aic);
    assert_eq!(*model.order(), order);
  }
}
