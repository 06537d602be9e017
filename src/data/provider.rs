//! # Market Data Provider
//!
//! The opaque price-history collaborator and per-ticker fetching with
//! partial-failure semantics: a failing ticker is reported, never fatal here.

use std::collections::HashMap;

use chrono::Months;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

use super::types::AssetSeries;
use super::types::Interval;
use super::types::Period;
use super::types::PricePoint;
use crate::error::ErrorKind;
use crate::error::FolioError;
use crate::error::Result;

/// Source of per-ticker price histories.
pub trait MarketDataProvider: Send + Sync {
  fn fetch(&self, ticker: &str, period: Period, interval: Interval) -> Result<Vec<PricePoint>>;
}

/// A ticker that was dropped from a run, with the reason.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TickerError {
  pub ticker: String,
  pub kind: ErrorKind,
  pub error: String,
}

impl TickerError {
  pub fn new(ticker: impl Into<String>, err: &FolioError) -> Self {
    Self {
      ticker: ticker.into(),
      kind: err.kind(),
      error: err.to_string(),
    }
  }
}

/// Resolved series in request order plus the tickers that failed.
#[derive(Clone, Debug, Default)]
pub struct FetchOutcome {
  pub series: Vec<AssetSeries>,
  pub errors: Vec<TickerError>,
}

impl FetchOutcome {
  pub fn get(&self, ticker: &str) -> Option<&AssetSeries> {
    self.series.iter().find(|s| s.ticker == ticker)
  }
}

/// Fetches every ticker independently, retrying each one up to `retries`
/// extra times. Empty or fully invalid histories count as `DataUnavailable`.
pub fn fetch_all<P: MarketDataProvider + ?Sized>(
  provider: &P,
  tickers: &[String],
  period: Period,
  interval: Interval,
  retries: usize,
) -> FetchOutcome {
  let mut outcome = FetchOutcome::default();

  for ticker in tickers {
    if outcome.get(ticker).is_some() {
      debug!(ticker = %ticker, "duplicate ticker in request, fetched once");
      continue;
    }

    let mut last_err = None;
    for attempt in 0..=retries {
      match provider.fetch(ticker, period, interval) {
        Ok(points) => {
          let series = AssetSeries::new(ticker.clone(), points);
          if series.is_empty() {
            last_err = Some(FolioError::DataUnavailable {
              ticker: ticker.clone(),
              reason: "provider returned no valid prices".into(),
            });
            break;
          }
          debug!(ticker = %ticker, points = series.len(), "fetched price history");
          outcome.series.push(series);
          last_err = None;
          break;
        }
        Err(err) => {
          let retry = err.is_recoverable() && attempt < retries;
          warn!(ticker = %ticker, attempt, retry, error = %err, "price fetch failed");
          last_err = Some(err);
          if !retry {
            break;
          }
        }
      }
    }

    if let Some(err) = last_err {
      let err = match err {
        FolioError::DataUnavailable { .. } => err,
        other => FolioError::DataUnavailable {
          ticker: ticker.clone(),
          reason: other.to_string(),
        },
      };
      outcome.errors.push(TickerError::new(ticker.clone(), &err));
    }
  }

  outcome
}

/// Provider backed by preloaded histories, honouring the requested period
/// relative to each series' last observation.
#[derive(Clone, Debug, Default)]
pub struct InMemoryProvider {
  series: HashMap<String, Vec<PricePoint>>,
}

impl InMemoryProvider {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_series(mut self, ticker: impl Into<String>, points: Vec<PricePoint>) -> Self {
    self.insert(ticker, points);
    self
  }

  pub fn insert(&mut self, ticker: impl Into<String>, points: Vec<PricePoint>) {
    self.series.insert(ticker.into(), points);
  }

  pub fn tickers(&self) -> Vec<String> {
    let mut out: Vec<String> = self.series.keys().cloned().collect();
    out.sort();
    out
  }

  /// Loads `{"TICKER": [{"date": "2024-01-02", "price": 10.0}, ...]}`.
  pub fn from_json_str(raw: &str) -> Result<Self> {
    let series: HashMap<String, Vec<PricePoint>> =
      serde_json::from_str(raw).map_err(|e| FolioError::Provider(format!("fixture: {e}")))?;
    Ok(Self { series })
  }
}

impl MarketDataProvider for InMemoryProvider {
  fn fetch(&self, ticker: &str, period: Period, _interval: Interval) -> Result<Vec<PricePoint>> {
    let points = self
      .series
      .get(ticker)
      .ok_or_else(|| FolioError::DataUnavailable {
        ticker: ticker.to_string(),
        reason: "unknown symbol".into(),
      })?;

    let last = points.iter().map(|p| p.date).max();
    let cutoff = match (period.months(), last) {
      (Some(m), Some(last)) => last.checked_sub_months(Months::new(m)),
      _ => None,
    };

    Ok(
      points
        .iter()
        .filter(|p| cutoff.map_or(true, |c| p.date > c))
        .copied()
        .collect(),
    )
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::AtomicUsize;
  use std::sync::atomic::Ordering;

  use chrono::NaiveDate;
  use tracing_test::traced_test;

  use super::*;

  fn points(n: usize) -> Vec<PricePoint> {
    let start = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
    Interval::Daily
      .future_dates(start, n)
      .into_iter()
      .enumerate()
      .map(|(i, d)| PricePoint::new(d, 100.0 + i as f64))
      .collect()
  }

  struct Flaky {
    failures: AtomicUsize,
  }

  impl MarketDataProvider for Flaky {
    fn fetch(&self, _ticker: &str, _p: Period, _i: Interval) -> Result<Vec<PricePoint>> {
      if self.failures.fetch_sub(1, Ordering::SeqCst) > 0 {
        Err(FolioError::Provider("503".into()))
      } else {
        Ok(points(5))
      }
    }
  }

  #[test]
  fn unknown_ticker_is_reported_not_fatal() {
    let provider = InMemoryProvider::new().with_series("AAA", points(30));
    let tickers = vec!["AAA".to_string(), "ZZZZINVALID".to_string()];
    let out = fetch_all(&provider, &tickers, Period::Max, Interval::Daily, 0);
    assert_eq!(out.series.len(), 1);
    assert_eq!(out.errors.len(), 1);
    assert_eq!(out.errors[0].ticker, "ZZZZINVALID");
    assert_eq!(out.errors[0].kind, ErrorKind::DataUnavailable);
  }

  #[test]
  fn period_filters_from_last_observation() {
    let provider = InMemoryProvider::new().with_series("AAA", points(400));
    let got = provider.fetch("AAA", Period::OneMonth, Interval::Daily).unwrap();
    assert!(got.len() > 15 && got.len() < 25, "got {}", got.len());
    let all = provider.fetch("AAA", Period::Max, Interval::Daily).unwrap();
    assert_eq!(all.len(), 400);
  }

  #[test]
  #[traced_test]
  fn transient_failures_are_retried() {
    let provider = Flaky {
      failures: AtomicUsize::new(2),
    };
    let tickers = vec!["AAA".to_string()];
    let out = fetch_all(&provider, &tickers, Period::Max, Interval::Daily, 2);
    assert_eq!(out.series.len(), 1);
    assert!(out.errors.is_empty());
    assert!(logs_contain("price fetch failed"));
  }

  #[test]
  fn fixture_json_round_trips_into_provider() {
    let raw = r#"{"AAA": [{"date": "2024-01-02", "price": 10.0}, {"date": "2024-01-03", "price": 10.5}]}"#;
    let provider = InMemoryProvider::from_json_str(raw).unwrap();
    assert_eq!(provider.tickers(), vec!["AAA".to_string()]);
    assert_eq!(provider.fetch("AAA", Period::Max, Interval::Daily).unwrap().len(), 2);
  }
}
