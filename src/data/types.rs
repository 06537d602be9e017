//! # Price Series Types
//!
//! Dated prices, lookback periods and sampling intervals.

use std::fmt;
use std::str::FromStr;

use chrono::Datelike;
use chrono::Days;
use chrono::Months;
use chrono::NaiveDate;
use chrono::Weekday;
use serde::Deserialize;
use serde::Serialize;

use crate::error::FolioError;

/// One observed closing price.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
  pub date: NaiveDate,
  pub price: f64,
}

impl PricePoint {
  pub fn new(date: NaiveDate, price: f64) -> Self {
    Self { date, price }
  }
}

/// Ordered price history of one ticker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssetSeries {
  pub ticker: String,
  pub points: Vec<PricePoint>,
}

impl AssetSeries {
  /// Sorts by date, drops non-finite or non-positive prices and keeps the
  /// last observation of a duplicated date.
  pub fn new(ticker: impl Into<String>, mut points: Vec<PricePoint>) -> Self {
    points.retain(|p| p.price.is_finite() && p.price > 0.0);
    points.sort_by_key(|p| p.date);

    let mut cleaned: Vec<PricePoint> = Vec::with_capacity(points.len());
    for p in points {
      match cleaned.last_mut() {
        Some(last) if last.date == p.date => *last = p,
        _ => cleaned.push(p),
      }
    }

    Self {
      ticker: ticker.into(),
      points: cleaned,
    }
  }

  pub fn len(&self) -> usize {
    self.points.len()
  }

  pub fn is_empty(&self) -> bool {
    self.points.is_empty()
  }

  pub fn dates(&self) -> Vec<NaiveDate> {
    self.points.iter().map(|p| p.date).collect()
  }

  pub fn prices(&self) -> Vec<f64> {
    self.points.iter().map(|p| p.price).collect()
  }

  pub fn last_date(&self) -> Option<NaiveDate> {
    self.points.last().map(|p| p.date)
  }
}

/// Lookback window requested from the provider.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
  #[serde(rename = "1mo")]
  OneMonth,
  #[serde(rename = "3mo")]
  ThreeMonths,
  #[serde(rename = "6mo")]
  SixMonths,
  #[serde(rename = "1y")]
  OneYear,
  #[default]
  #[serde(rename = "2y")]
  TwoYears,
  #[serde(rename = "5y")]
  FiveYears,
  #[serde(rename = "10y")]
  TenYears,
  #[serde(rename = "max")]
  Max,
}

impl Period {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::OneMonth => "1mo",
      Self::ThreeMonths => "3mo",
      Self::SixMonths => "6mo",
      Self::OneYear => "1y",
      Self::TwoYears => "2y",
      Self::FiveYears => "5y",
      Self::TenYears => "10y",
      Self::Max => "max",
    }
  }

  /// Calendar span in months, `None` for the full history.
  pub fn months(self) -> Option<u32> {
    match self {
      Self::OneMonth => Some(1),
      Self::ThreeMonths => Some(3),
      Self::SixMonths => Some(6),
      Self::OneYear => Some(12),
      Self::TwoYears => Some(24),
      Self::FiveYears => Some(60),
      Self::TenYears => Some(120),
      Self::Max => None,
    }
  }
}

impl fmt::Display for Period {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Period {
  type Err = FolioError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "1mo" => Ok(Self::OneMonth),
      "3mo" => Ok(Self::ThreeMonths),
      "6mo" => Ok(Self::SixMonths),
      "1y" => Ok(Self::OneYear),
      "2y" => Ok(Self::TwoYears),
      "5y" => Ok(Self::FiveYears),
      "10y" => Ok(Self::TenYears),
      "max" => Ok(Self::Max),
      other => Err(FolioError::InvalidParameter(format!("unknown period '{other}'"))),
    }
  }
}

/// Sampling interval of a price series.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
  #[default]
  #[serde(rename = "1d")]
  Daily,
  #[serde(rename = "1wk")]
  Weekly,
  #[serde(rename = "1mo")]
  Monthly,
}

impl Interval {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Daily => "1d",
      Self::Weekly => "1wk",
      Self::Monthly => "1mo",
    }
  }

  /// Annualization factor for means and variances.
  pub fn periods_per_year(self) -> f64 {
    match self {
      Self::Daily => 252.0,
      Self::Weekly => 52.0,
      Self::Monthly => 12.0,
    }
  }

  /// Next sampling date after `date`; daily steps skip weekends.
  pub fn next_date(self, date: NaiveDate) -> Option<NaiveDate> {
    match self {
      Self::Daily => {
        let mut next = date.checked_add_days(Days::new(1))?;
        while matches!(next.weekday(), Weekday::Sat | Weekday::Sun) {
          next = next.checked_add_days(Days::new(1))?;
        }
        Some(next)
      }
      Self::Weekly => date.checked_add_days(Days::new(7)),
      Self::Monthly => date.checked_add_months(Months::new(1)),
    }
  }

  /// The `n` sampling dates following `date`.
  pub fn future_dates(self, date: NaiveDate, n: usize) -> Vec<NaiveDate> {
    let mut out = Vec::with_capacity(n);
    let mut cur = date;
    for _ in 0..n {
      match self.next_date(cur) {
        Some(next) => {
          out.push(next);
          cur = next;
        }
        None => break,
      }
    }
    out
  }
}

impl fmt::Display for Interval {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Interval {
  type Err = FolioError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "1d" | "d" | "daily" => Ok(Self::Daily),
      "1wk" | "w" | "weekly" => Ok(Self::Weekly),
      "1mo" | "m" | "monthly" => Ok(Self::Monthly),
      other => Err(FolioError::InvalidParameter(format!(
        "unknown interval '{other}'"
      ))),
    }
  }
}
