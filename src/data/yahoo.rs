//! # Yahoo Finance Provider
//!
//! Adjusted close prices from Yahoo Finance, compiled in with the `yahoo` feature.

use chrono::DateTime;
use yahoo_finance_api::YahooConnector;

use super::provider::MarketDataProvider;
use super::types::Interval;
use super::types::Period;
use super::types::PricePoint;
use crate::error::FolioError;
use crate::error::Result;

pub struct YahooProvider {
  connector: YahooConnector,
}

impl YahooProvider {
  pub fn new() -> Result<Self> {
    let connector = YahooConnector::new().map_err(|e| FolioError::Provider(e.to_string()))?;
    Ok(Self { connector })
  }
}

impl MarketDataProvider for YahooProvider {
  fn fetch(&self, ticker: &str, period: Period, interval: Interval) -> Result<Vec<PricePoint>> {
    let response = self
      .connector
      .get_quote_range(ticker, interval.as_str(), period.as_str())
      .map_err(|e| FolioError::Provider(format!("{ticker}: {e}")))?;
    let quotes = response
      .quotes()
      .map_err(|e| FolioError::DataUnavailable {
        ticker: ticker.to_string(),
        reason: e.to_string(),
      })?;

    Ok(
      quotes
        .into_iter()
        .filter_map(|q| {
          let date = DateTime::from_timestamp(q.timestamp as i64, 0)?.date_naive();
          Some(PricePoint::new(date, q.adjclose))
        })
        .collect(),
    )
  }
}
