//! # Forecast
//!
//! $$
//! \Phi(B^s)\phi(B)\nabla^d\nabla_s^D\Big(y_t-\sum_j\beta_j x_{j,t-1}-c\Big)=\Theta(B^s)\theta(B)\varepsilon_t
//! $$
//!
//! Regression with seasonal ARIMA errors: order handling, differencing,
//! conditional least squares fitting, order search and forecast intervals.

pub mod differencing;
pub mod engine;
pub mod evaluation;
pub mod interval;
pub mod order;
pub mod polynomial;
pub mod sarimax;
pub mod search;
pub mod trend;

pub use engine::ForecastEngine;
pub use engine::ForecastParams;
pub use engine::ForecastRequest;
pub use engine::ForecastResponse;
pub use evaluation::evaluate_holdout;
pub use evaluation::HoldoutMetrics;
pub use evaluation::ModelQuality;
pub use interval::ForecastIntervalBuilder;
pub use interval::ForecastResult;
pub use order::SarimaOrder;
pub use sarimax::Coefficients;
pub use sarimax::Estimator;
pub use sarimax::EstimatorKind;
pub use sarimax::FitMetrics;
pub use sarimax::FitState;
pub use sarimax::FittedModel;
pub use sarimax::FullSarimaxEstimator;
pub use sarimax::ModelInput;
pub use sarimax::SarimaxEstimator;
pub use search::Candidate;
pub use search::OrderSearch;
pub use search::OrderSearchOutcome;
pub use search::SearchSpace;
pub use search::SearchStrategy;
pub use trend::LinearTrendFallbackEstimator;
