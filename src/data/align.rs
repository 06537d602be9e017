//! # Price Series Alignment
//!
//! $$
//! \tilde p^{(i)}_k = p^{(i)}(t^{\text{ref}}_k) \ \text{or missing}
//! $$
//!
//! Maps every ticker onto the reference ticker's calendar. Missing values stay
//! missing; they are never defaulted to zero.

use std::collections::HashMap;

use chrono::NaiveDate;
use nalgebra::DMatrix;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

use super::provider::TickerError;
use super::types::AssetSeries;
use crate::error::FolioError;
use crate::error::Result;

/// Strategy for mapping a ticker onto the reference calendar.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentMode {
  /// Join on the calendar date.
  #[default]
  ByDate,
  /// Pair observations by position counted back from the most recent one.
  /// Only correct when every ticker trades on the reference calendar.
  Positional,
}

/// Per-ticker columns indexed like `dates`.
#[derive(Clone, Debug)]
pub struct AlignedPrices {
  pub dates: Vec<NaiveDate>,
  pub tickers: Vec<String>,
  pub columns: Vec<Vec<Option<f64>>>,
  pub errors: Vec<TickerError>,
}

impl AlignedPrices {
  pub fn n_assets(&self) -> usize {
    self.tickers.len()
  }

  pub fn column(&self, ticker: &str) -> Option<&[Option<f64>]> {
    self
      .tickers
      .iter()
      .position(|t| t == ticker)
      .map(|i| self.columns[i].as_slice())
  }

  /// Rows where every ticker has a price, as a `T x N` matrix.
  pub fn complete_rows(&self) -> (Vec<NaiveDate>, DMatrix<f64>) {
    let n = self.tickers.len();
    let mut dates = Vec::with_capacity(self.dates.len());
    let mut flat = Vec::with_capacity(self.dates.len() * n);

    for (k, date) in self.dates.iter().enumerate() {
      let row: Option<Vec<f64>> = self.columns.iter().map(|c| c[k]).collect();
      if let Some(row) = row {
        dates.push(*date);
        flat.extend(row);
      }
    }

    let t = dates.len();
    (dates, DMatrix::from_row_slice(t, n, &flat))
  }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PriceSeriesAligner {
  mode: AlignmentMode,
}

impl PriceSeriesAligner {
  pub fn new(mode: AlignmentMode) -> Self {
    Self { mode }
  }

  pub fn mode(&self) -> AlignmentMode {
    self.mode
  }

  /// Aligns `series` onto the calendar of `reference`.
  ///
  /// A missing or empty reference is fatal. Any other ticker that resolves to
  /// no point at all is dropped and appended to `errors`.
  pub fn align(
    &self,
    reference: &str,
    series: &[AssetSeries],
    mut errors: Vec<TickerError>,
  ) -> Result<AlignedPrices> {
    let reference_series = series
      .iter()
      .find(|s| s.ticker == reference)
      .filter(|s| !s.is_empty())
      .ok_or_else(|| FolioError::DataUnavailable {
        ticker: reference.to_string(),
        reason: "reference series could not be resolved".into(),
      })?;

    let dates = reference_series.dates();
    let mut tickers = Vec::with_capacity(series.len());
    let mut columns = Vec::with_capacity(series.len());

    for s in series {
      let column: Vec<Option<f64>> = if s.ticker == reference {
        s.points.iter().map(|p| Some(p.price)).collect()
      } else {
        match self.mode {
          AlignmentMode::ByDate => by_date(&dates, s),
          AlignmentMode::Positional => positional(dates.len(), s),
        }
      };

      let resolved = column.iter().filter(|v| v.is_some()).count();
      if resolved == 0 {
        let err = FolioError::DataUnavailable {
          ticker: s.ticker.clone(),
          reason: format!("no observations on the {reference} calendar"),
        };
        warn!(ticker = %s.ticker, reference, "dropping ticker with no aligned prices");
        errors.push(TickerError::new(s.ticker.clone(), &err));
        continue;
      }

      debug!(
        ticker = %s.ticker,
        resolved,
        missing = dates.len() - resolved,
        "aligned series"
      );
      tickers.push(s.ticker.clone());
      columns.push(column);
    }

    Ok(AlignedPrices {
      dates,
      tickers,
      columns,
      errors,
    })
  }
}

fn by_date(dates: &[NaiveDate], s: &AssetSeries) -> Vec<Option<f64>> {
  let lookup: HashMap<NaiveDate, f64> = s.points.iter().map(|p| (p.date, p.price)).collect();
  dates.iter().map(|d| lookup.get(d).copied()).collect()
}

fn positional(len: usize, s: &AssetSeries) -> Vec<Option<f64>> {
  let prices = s.prices();
  let offset = len as isize - prices.len() as isize;
  (0..len)
    .map(|k| {
      let idx = k as isize - offset;
      if idx >= 0 {
        prices.get(idx as usize).copied()
      } else {
        None
      }
    })
    .collect()
}
