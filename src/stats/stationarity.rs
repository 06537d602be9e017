//! Stationarity testing and differencing-order selection.

mod common;

pub mod kpss;
