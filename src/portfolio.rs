//! # Portfolio
//!
//! $$
//! \sigma_p^2 = \mathbf{w}^\top \Sigma \mathbf{w}
//! $$
//!
//! Long-only Markowitz efficient frontier and maximum-Sharpe allocation.

pub mod engine;
pub mod frontier;
pub mod qp;
pub mod returns;
pub mod types;

pub use engine::PortfolioEngine;
pub use frontier::EfficientFrontierSolver;
pub use frontier::Frontier;
pub use frontier::FrontierPoint;
pub use qp::QpSolution;
pub use qp::SimplexQp;
pub use returns::ReturnsEstimate;
pub use returns::ReturnsEstimator;
pub use types::AssetStats;
pub use types::OptimizationRequest;
pub use types::OptimizationResponse;
