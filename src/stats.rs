//! # Stats
//!
//! $$
//! \hat\beta = (X^\top X)^{-1} X^\top y
//! $$
//!
//! Regression, stationarity testing and fit-quality metrics used by the forecaster.

pub mod loss;
pub mod ols;
pub mod stationarity;

pub use ols::ols;
pub use ols::OlsResult;
pub use stationarity::kpss::ndiffs;
pub use stationarity::kpss::Kpss;
pub use stationarity::kpss::KpssNull;
pub use stationarity::kpss::KpssStatistic;
