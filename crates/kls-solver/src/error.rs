//! Error taxonomy for the shell solver.
//!
//! - precondition failures (`InvalidParameter`, `InvalidGeometry`) are raised
//!   before any time step is taken
//! - convergence failures (`NotConverged`, `Diverged`) are reported per step
//!   and left to the caller to handle
//! - numerical degeneracy (`DegenerateMetric`, `Backend`) is surfaced as is

use thiserror::Error;

use crate::backend::BackendError;

pub type Result<T> = std::result::Result<T, SolverError>;

#[derive(Error, Debug)]
pub enum SolverError {
    #[error("invalid parameter {name} = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("degenerate metric in element {element} (det = {determinant:.3e})")]
    DegenerateMetric { element: usize, determinant: f64 },

    #[error("linear solve failed: {0}")]
    Backend(#[from] BackendError),

    #[error(
        "Newton-Raphson failed to converge in {iterations} iterations (relative residual = {relative_norm:.3e})"
    )]
    NotConverged { iterations: usize, relative_norm: f64 },

    #[error("Newton-Raphson diverged at iteration {iteration} (non-finite residual)")]
    Diverged { iteration: usize },

    #[error(transparent)]
    Output(#[from] kls_io::IoError),
}

impl SolverError {
    /// True for failures the caller may retry with a smaller time step.
    pub fn is_convergence_failure(&self) -> bool {
        matches!(
            self,
            SolverError::NotConverged { .. } | SolverError::Diverged { .. }
        )
    }
}

/// Fail with `InvalidParameter` unless `value` is finite and `ok(value)` holds.
pub(crate) fn require(
    name: &'static str,
    value: f64,
    ok: impl Fn(f64) -> bool,
    reason: &'static str,
) -> Result<()> {
    if value.is_finite() && ok(value) {
        Ok(())
    } else {
        Err(SolverError::InvalidParameter {
            name,
            value,
            reason,
        })
    }
}
