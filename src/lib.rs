//! # folio-rs
//!
//! $$
//! \min_{\mathbf w}\ \mathbf w^\top\Sigma\mathbf w\quad\text{s.t.}\quad \mathbf 1^\top\mathbf w=1,\ \mu^\top\mathbf w=r,\ \mathbf w\ge 0
//! $$
//!
//! Two numerical pipelines over market price histories:
//!
//! - [`PortfolioEngine`] estimates annualized return moments, sweeps the
//!   long-only Markowitz efficient frontier and picks the maximum-Sharpe
//!   allocation.
//! - [`ForecastEngine`] fits a regression with seasonal ARIMA errors (SARIMAX)
//!   by conditional least squares and projects it forward with confidence
//!   bands.
//!
//! Price histories come from a [`MarketDataProvider`]; [`InMemoryProvider`]
//! serves fixtures and `YahooProvider` is available with the `yahoo` feature.

pub mod config;
pub mod data;
pub mod error;
pub mod forecast;
pub mod portfolio;
pub mod stats;

pub use config::FolioConfig;
pub use data::InMemoryProvider;
pub use data::Interval;
pub use data::MarketDataProvider;
pub use data::Period;
pub use error::ErrorPayload;
pub use error::FolioError;
pub use error::Result;
pub use forecast::ForecastEngine;
pub use forecast::ForecastRequest;
pub use forecast::ForecastResponse;
pub use portfolio::OptimizationRequest;
pub use portfolio::OptimizationResponse;
pub use portfolio::PortfolioEngine;
