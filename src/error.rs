//! # Errors
//!
//! Typed failures of the optimization and forecasting pipelines.
//!
//! Per-ticker data problems are collected next to successful results as
//! [`crate::data::TickerError`] entries; every other variant aborts the single
//! computation that raised it.

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FolioError {
  #[error("no price history for {ticker}: {reason}")]
  DataUnavailable { ticker: String, reason: String },

  #[error("insufficient data: {0}")]
  InsufficientData(String),

  #[error("covariance matrix is singular (ridge tried: {ridge:e})")]
  SingularCovariance { ridge: f64 },

  #[error("infeasible constraint: {0}")]
  InfeasibleConstraint(String),

  #[error("model fit did not converge: {0}")]
  Convergence(String),

  #[error("non-stationary model: {0}")]
  NonStationary(String),

  #[error("forecast horizon must be positive, got {0}")]
  InvalidHorizon(i64),

  #[error("{operation} exceeded its budget of {limit}")]
  ComputationTimeout { operation: String, limit: String },

  #[error("invalid parameter: {0}")]
  InvalidParameter(String),

  #[error("market data provider error: {0}")]
  Provider(String),
}

/// Stable, serializable discriminant of [`FolioError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  DataUnavailable,
  InsufficientData,
  SingularCovariance,
  InfeasibleConstraint,
  Convergence,
  NonStationary,
  InvalidHorizon,
  ComputationTimeout,
  InvalidParameter,
  Provider,
}

impl FolioError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::DataUnavailable { .. } => ErrorKind::DataUnavailable,
      Self::InsufficientData(_) => ErrorKind::InsufficientData,
      Self::SingularCovariance { .. } => ErrorKind::SingularCovariance,
      Self::InfeasibleConstraint(_) => ErrorKind::InfeasibleConstraint,
      Self::Convergence(_) => ErrorKind::Convergence,
      Self::NonStationary(_) => ErrorKind::NonStationary,
      Self::InvalidHorizon(_) => ErrorKind::InvalidHorizon,
      Self::ComputationTimeout { .. } => ErrorKind::ComputationTimeout,
      Self::InvalidParameter(_) => ErrorKind::InvalidParameter,
      Self::Provider(_) => ErrorKind::Provider,
    }
  }

  /// Whether another attempt (different order, regularized covariance, retry
  /// of the provider) can succeed where this one failed.
  pub fn is_recoverable(&self) -> bool {
    matches!(
      self,
      Self::SingularCovariance { .. }
        | Self::Convergence(_)
        | Self::NonStationary(_)
        | Self::Provider(_)
    )
  }

  pub fn timeout(operation: impl Into<String>, limit: impl Into<String>) -> Self {
    Self::ComputationTimeout {
      operation: operation.into(),
      limit: limit.into(),
    }
  }
}

/// Structured error result returned to callers instead of a response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
  pub kind: ErrorKind,
  pub error: String,
}

impl From<&FolioError> for ErrorPayload {
  fn from(err: &FolioError) -> Self {
    Self {
      kind: err.kind(),
      error: err.to_string(),
    }
  }
}

impl From<FolioError> for ErrorPayload {
  fn from(err: FolioError) -> Self {
    Self::from(&err)
  }
}

pub type Result<T> = std::result::Result<T, FolioError>;
