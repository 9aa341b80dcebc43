//! Newton-Raphson solution of one generalized-α time step.
//!
//! The unknown is the end-of-step displacement `d_{n+1}` held by the
//! integrator. Each iteration
//!
//! 1. assembles `R` and the consistent tangent `J = ∂R/∂d_{n+1}` at the
//!    α-level state implied by the current iterate,
//! 2. checks `‖R‖ / ‖R₀‖ < tol` (with `R₀` the residual of the first
//!    iteration; a zero `R₀` counts as converged),
//! 3. solves `J Δd = −R` through the linear backend and updates
//!    `d_{n+1} ← d_{n+1} + Δd`.
//!
//! # Example
//!
//! ```no_run
//! use kls_solver::{
//!     BoundaryConditions, ContactPenalty, GeneralizedAlphaIntegrator, NonlinearConfig,
//!     NonlinearSolver, ResidualAssembler, ShellMaterial, SplineGeometry, spline,
//! };
//!
//! # fn example() -> kls_solver::Result<()> {
//! let plate = spline::flat_square(1.0, 2, 4, 6, 0.1)?;
//! let bcs = BoundaryConditions::none(plate.num_dofs());
//! let assembler = ResidualAssembler::new(
//!     &plate,
//!     ShellMaterial::default(),
//!     ContactPenalty::default(),
//!     bcs,
//! )?;
//! let mut integrator = GeneralizedAlphaIntegrator::new(0.5, 1e-3, plate.num_dofs())?;
//! let solver = NonlinearSolver::new(NonlinearConfig::default());
//!
//! let results = solver.solve_step(&assembler, &mut integrator)?;
//! println!("Converged in {} iterations", results.iterations);
//! integrator.advance();
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};

use crate::backend::{LinearSolver, default_backend};
use crate::error::{Result, SolverError, require};
use crate::generalized_alpha::GeneralizedAlphaIntegrator;
use crate::residual::ResidualAssembler;

/// Nonlinear solver configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NonlinearConfig {
    /// Relative residual tolerance `‖R‖/‖R₀‖`
    pub relative_tolerance: f64,
    /// Maximum number of iterations
    pub max_iterations: usize,
}

impl Default for NonlinearConfig {
    fn default() -> Self {
        Self {
            relative_tolerance: 1e-3,
            max_iterations: 100,
        }
    }
}

impl NonlinearConfig {
    pub fn validate(&self) -> Result<()> {
        require(
            "relative_tolerance",
            self.relative_tolerance,
            |tol| tol > 0.0,
            "must be positive",
        )
    }
}

/// Newton iteration state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewtonState {
    Initialized,
    Iterating,
    Converged,
    Failed,
}

/// Outcome of a converged Newton solve
#[derive(Debug, Clone)]
pub struct NonlinearResults {
    /// Number of residual evaluations, including the converged one
    pub iterations: usize,
    /// Final absolute residual norm
    pub residual_norm: f64,
    /// Residual norm of the first iteration (R₀)
    pub initial_residual_norm: f64,
    /// Final relative residual norm
    pub relative_norm: f64,
    pub state: NewtonState,
    /// Absolute residual norm at every iteration
    pub iteration_history: Vec<f64>,
}

/// Newton-Raphson solver over a pluggable linear backend
pub struct NonlinearSolver {
    config: NonlinearConfig,
    backend: Box<dyn LinearSolver>,
}

impl NonlinearSolver {
    /// Solver using the default backend
    pub fn new(config: NonlinearConfig) -> Self {
        Self::with_backend(config, default_backend())
    }

    pub fn with_backend(config: NonlinearConfig, backend: Box<dyn LinearSolver>) -> Self {
        Self { config, backend }
    }

    pub fn config(&self) -> &NonlinearConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Drive the integrator's displacement iterate to equilibrium.
    ///
    /// On success the integrator holds the converged `d_{n+1}`; advancing it
    /// is left to the caller. On failure the iterate is left where the
    /// iteration stopped.
    ///
    /// # Errors
    /// - `NotConverged` if the iteration budget is exhausted
    /// - `Diverged` if the residual becomes non-finite
    /// - `Backend` if the tangent cannot be solved
    pub fn solve_step(
        &self,
        assembler: &ResidualAssembler,
        integrator: &mut GeneralizedAlphaIntegrator,
    ) -> Result<NonlinearResults> {
        self.config.validate()?;
        if integrator.num_dofs() != assembler.num_dofs() {
            return Err(SolverError::InvalidGeometry(format!(
                "integrator has {} dofs, assembler {}",
                integrator.num_dofs(),
                assembler.num_dofs()
            )));
        }

        let tol = self.config.relative_tolerance;
        let mut state = NewtonState::Initialized;
        let mut initial_norm = 0.0;
        let mut relative_norm = f64::INFINITY;
        let mut iteration_history = Vec::new();

        for iter in 0..self.config.max_iterations {
            let system = assembler.assemble(&integrator.alpha_level())?;
            let norm = system.residual_norm();
            iteration_history.push(norm);

            if !norm.is_finite() {
                state = NewtonState::Failed;
                tracing::warn!(iteration = iter + 1, ?state, "non-finite residual");
                return Err(SolverError::Diverged { iteration: iter + 1 });
            }
            if state == NewtonState::Initialized {
                initial_norm = norm;
                state = NewtonState::Iterating;
            }
            relative_norm = if initial_norm > 0.0 {
                norm / initial_norm
            } else {
                0.0
            };

            tracing::debug!(
                iteration = iter + 1,
                residual = norm,
                relative = relative_norm,
                "Newton iteration"
            );

            if relative_norm < tol {
                return Ok(NonlinearResults {
                    iterations: iter + 1,
                    residual_norm: norm,
                    initial_residual_norm: initial_norm,
                    relative_norm,
                    state: NewtonState::Converged,
                    iteration_history,
                });
            }

            let (increment, _info) = self.backend.solve_linear(&system.to_linear_system_data())?;
            *integrator.displacement_mut() += increment;
        }

        state = NewtonState::Failed;
        tracing::warn!(
            iterations = self.config.max_iterations,
            relative = relative_norm,
            ?state,
            "Newton-Raphson did not converge"
        );
        Err(SolverError::NotConverged {
            iterations: self.config.max_iterations,
            relative_norm,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary_conditions::BoundaryConditions;
    use crate::contact::ContactPenalty;
    use crate::geometry::SplineGeometry;
    use crate::materials::ShellMaterial;
    use crate::spline::flat_square;

    fn plate_problem(height: f64) -> (ResidualAssembler, GeneralizedAlphaIntegrator) {
        let plate = flat_square(1.0, 2, 1, 4, height).unwrap();
        let bcs = BoundaryConditions::from_predicate(&plate, |p, _| p[0] < 1e-12);
        let assembler = ResidualAssembler::new(
            &plate,
            ShellMaterial::default(),
            ContactPenalty::new(1.0e3, 0.0),
            bcs,
        )
        .unwrap();
        let integrator = GeneralizedAlphaIntegrator::new(0.5, 1e-2, plate.num_dofs()).unwrap();
        (assembler, integrator)
    }

    #[test]
    fn equilibrium_converges_in_one_iteration() {
        let (assembler, mut integrator) = plate_problem(0.5);
        let solver = NonlinearSolver::new(NonlinearConfig::default());
        let results = solver.solve_step(&assembler, &mut integrator).unwrap();
        assert_eq!(results.iterations, 1);
        assert_eq!(results.state, NewtonState::Converged);
        assert_eq!(results.relative_norm, 0.0);
        assert!(integrator.displacement().amax() < 1e-14);
    }

    #[test]
    fn zero_iteration_budget_is_not_converged() {
        let (assembler, mut integrator) = plate_problem(0.5);
        let solver = NonlinearSolver::new(NonlinearConfig {
            max_iterations: 0,
            ..NonlinearConfig::default()
        });
        let err = solver.solve_step(&assembler, &mut integrator).unwrap_err();
        assert!(matches!(err, SolverError::NotConverged { iterations: 0, .. }));
        assert!(err.is_convergence_failure());
    }

    #[test]
    fn contact_pushes_penetrating_plate_upwards() {
        // Plate starts below the plane with no velocity; the penalty force
        // accelerates the free dofs upward over the step.
        let (assembler, mut integrator) = plate_problem(-0.01);
        let solver = NonlinearSolver::new(NonlinearConfig {
            relative_tolerance: 1e-10,
            max_iterations: 30,
        });
        let results = solver.solve_step(&assembler, &mut integrator).unwrap();
        assert!(results.iterations >= 2);
        assert!(results.relative_norm < 1e-10);
        let d = integrator.displacement();
        let free_z = (0..d.len())
            .filter(|&i| i % 3 == 2 && !assembler.boundary_conditions().is_fixed(i))
            .map(|i| d[i]);
        for dz in free_z {
            assert!(dz > 0.0);
        }
    }

    #[test]
    fn nonpositive_tolerance_is_rejected() {
        let (assembler, mut integrator) = plate_problem(0.5);
        let solver = NonlinearSolver::new(NonlinearConfig {
            relative_tolerance: 0.0,
            max_iterations: 10,
        });
        assert!(matches!(
            solver.solve_step(&assembler, &mut integrator),
            Err(SolverError::InvalidParameter { .. })
        ));
    }
}
