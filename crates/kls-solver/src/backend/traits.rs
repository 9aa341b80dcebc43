//! Backend trait definitions for the linear solve of each Newton iteration.

use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use thiserror::Error;

/// Error type for backend operations.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct BackendError(pub String);

impl From<String> for BackendError {
    fn from(s: String) -> Self {
        BackendError(s)
    }
}

impl From<&str> for BackendError {
    fn from(s: &str) -> Self {
        BackendError(s.to_string())
    }
}

/// Sparse matrix in COO (coordinate/triplet) format.
///
/// Duplicate entries are summed by consumers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseTripletsF64 {
    pub nrows: usize,
    pub ncols: usize,
    pub row_indices: Vec<usize>,
    pub col_indices: Vec<usize>,
    pub values: Vec<f64>,
}

impl SparseTripletsF64 {
    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }
}

impl From<&CsrMatrix<f64>> for SparseTripletsF64 {
    fn from(csr: &CsrMatrix<f64>) -> Self {
        let mut triplets = SparseTripletsF64 {
            nrows: csr.nrows(),
            ncols: csr.ncols(),
            row_indices: Vec::with_capacity(csr.nnz()),
            col_indices: Vec::with_capacity(csr.nnz()),
            values: Vec::with_capacity(csr.nnz()),
        };
        for (r, c, &v) in csr.triplet_iter() {
            triplets.row_indices.push(r);
            triplets.col_indices.push(c);
            triplets.values.push(v);
        }
        triplets
    }
}

/// A linear system ready for solving: `J Δd = rhs`.
///
/// Boundary conditions are already applied to both sides.
#[derive(Debug, Clone)]
pub struct LinearSystemData {
    /// Tangent matrix in COO triplet format
    pub tangent: SparseTripletsF64,
    /// Right-hand side (the negated residual)
    pub rhs: DVector<f64>,
    /// Total number of degrees of freedom
    pub num_dofs: usize,
    /// Indices of constrained DOFs (for diagnostics)
    pub constrained_dofs: Vec<usize>,
}

/// Solver diagnostic info.
#[derive(Debug, Clone)]
pub struct SolveInfo {
    /// Number of iterations (1 for direct solvers)
    pub iterations: usize,
    /// Final residual norm (if available)
    pub residual_norm: Option<f64>,
    /// Human-readable solver name (e.g., "nalgebra-LU")
    pub solver_name: String,
}

/// Trait for a linear solver backend.
pub trait LinearSolver: Send + Sync {
    /// Solve `J x = rhs` for the assembled system.
    fn solve_linear(
        &self,
        system: &LinearSystemData,
    ) -> Result<(DVector<f64>, SolveInfo), BackendError>;

    /// Human-readable name of this backend.
    fn name(&self) -> &str;
}
