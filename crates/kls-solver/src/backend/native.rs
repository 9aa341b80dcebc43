//! Native backend using nalgebra.
//!
//! Dense LU decomposition of the tangent, suitable for the small-to-medium
//! control nets the solver is exercised with.

use super::traits::*;
use nalgebra::{DMatrix, DVector};

/// Native solver backend using nalgebra dense LU.
pub struct NativeBackend;

impl LinearSolver for NativeBackend {
    fn solve_linear(
        &self,
        system: &LinearSystemData,
    ) -> Result<(DVector<f64>, SolveInfo), BackendError> {
        let n = system.num_dofs;
        if system.rhs.len() != n || system.tangent.nrows != n || system.tangent.ncols != n {
            return Err(BackendError(format!(
                "system size mismatch: {} dofs, rhs {}, tangent {}x{}",
                n,
                system.rhs.len(),
                system.tangent.nrows,
                system.tangent.ncols
            )));
        }

        // Reconstruct dense matrix from COO triplets
        let mut k = DMatrix::zeros(n, n);
        for i in 0..system.tangent.nnz() {
            let r = system.tangent.row_indices[i];
            let c = system.tangent.col_indices[i];
            k[(r, c)] += system.tangent.values[i];
        }

        let x = k
            .lu()
            .solve(&system.rhs)
            .ok_or(BackendError("Singular matrix in LU decomposition".into()))?;
        if x.iter().any(|v| !v.is_finite()) {
            return Err("Non-finite solution from LU decomposition".into());
        }

        Ok((
            x,
            SolveInfo {
                iterations: 1,
                residual_norm: None,
                solver_name: "nalgebra-LU".to_string(),
            },
        ))
    }

    fn name(&self) -> &str {
        "native-nalgebra"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system(n: usize, entries: &[(usize, usize, f64)], rhs: Vec<f64>) -> LinearSystemData {
        LinearSystemData {
            tangent: SparseTripletsF64 {
                nrows: n,
                ncols: n,
                row_indices: entries.iter().map(|e| e.0).collect(),
                col_indices: entries.iter().map(|e| e.1).collect(),
                values: entries.iter().map(|e| e.2).collect(),
            },
            rhs: DVector::from_vec(rhs),
            num_dofs: n,
            constrained_dofs: vec![],
        }
    }

    #[test]
    fn native_linear_solve_trivial() {
        // Solve: [2 0; 0 3] * [x; y] = [4; 9]
        let backend = NativeBackend;
        let sys = system(2, &[(0, 0, 2.0), (1, 1, 3.0)], vec![4.0, 9.0]);

        let (u, info) = backend.solve_linear(&sys).unwrap();
        assert!((u[0] - 2.0).abs() < 1e-12);
        assert!((u[1] - 3.0).abs() < 1e-12);
        assert_eq!(info.solver_name, "nalgebra-LU");
    }

    #[test]
    fn duplicate_triplets_are_summed() {
        // Nonsymmetric K = [4 -1 0; -2 4 -1; 0 -1 4] with (1,1) split in two
        let backend = NativeBackend;
        let sys = system(
            3,
            &[
                (0, 0, 4.0),
                (0, 1, -1.0),
                (1, 0, -2.0),
                (1, 1, 1.5),
                (1, 1, 2.5),
                (1, 2, -1.0),
                (2, 1, -1.0),
                (2, 2, 4.0),
            ],
            vec![1.0, 2.0, 1.0],
        );

        let (u, _) = backend.solve_linear(&sys).unwrap();
        let k = DMatrix::from_row_slice(3, 3, &[4.0, -1.0, 0.0, -2.0, 4.0, -1.0, 0.0, -1.0, 4.0]);
        let f_check = &k * &u;
        for i in 0..3 {
            assert!(
                (f_check[i] - sys.rhs[i]).abs() < 1e-10,
                "Residual too large at DOF {}",
                i
            );
        }
    }

    #[test]
    fn singular_system_is_an_error() {
        let backend = NativeBackend;
        let sys = system(2, &[(0, 0, 1.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 1.0)], vec![1.0, 0.0]);
        assert!(backend.solve_linear(&sys).is_err());
    }

    #[test]
    fn size_mismatch_is_an_error() {
        let backend = NativeBackend;
        let sys = system(2, &[(0, 0, 1.0)], vec![1.0]);
        assert!(backend.solve_linear(&sys).is_err());
    }
}
