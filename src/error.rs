//! Error types for a planning run.
//!
//! Only genuine failures are errors. Unplaced units, unassignable supplier
//! groups and unmet demand are regular outcomes carried in the result types.

use thiserror::Error;

use crate::assignment::AssignmentError;
use crate::solver::SolverError;

/// Validation error for input data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),

    #[error("Invalid weight: {0}")]
    InvalidWeight(String),

    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Unknown reference: {0}")]
    UnknownReference(String),

    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Errors that abort a planning run.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("supply assignment failed: {0}")]
    Assignment(#[from] AssignmentError),

    #[error("cargo packing failed: {0}")]
    Packing(#[from] SolverError),
}

/// Result type alias for planning operations.
pub type Result<T> = std::result::Result<T, PlanError>;
