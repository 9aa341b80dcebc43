//! Time-step driver.
//!
//! [`ShellSimulation`] owns the geometry, the precomputed residual assembler,
//! the generalized-α integrator and the Newton solver. Each [`step`] solves
//! one time step to convergence and then advances the integrator; a step that
//! fails to converge halts the run with the solver's error and leaves the
//! last converged state untouched.
//!
//! [`step`]: ShellSimulation::step

use std::collections::BTreeMap;

use nalgebra::DVector;

use kls_io::{ControlNet, PointData, RESTART_SCHEMA_VERSION, RestartState};

use crate::boundary_conditions::BoundaryConditions;
use crate::config::SimulationConfig;
use crate::error::{Result, SolverError};
use crate::generalized_alpha::{GeneralizedAlphaIntegrator, ShellState};
use crate::geometry::{SplineGeometry, dof_index};
use crate::nonlinear_solver::{NonlinearResults, NonlinearSolver};
use crate::rational::{homogeneous_from_physical, physical_control_values};
use crate::residual::ResidualAssembler;
use crate::spline::NurbsSurface;

/// Summary of one converged time step
#[derive(Debug, Clone)]
pub struct StepReport {
    /// 1-based index of the completed step
    pub step: usize,
    /// Time at the end of the step
    pub time: f64,
    pub newton: NonlinearResults,
    pub elastic_energy: f64,
    pub kinetic_energy: f64,
}

impl StepReport {
    pub fn total_energy(&self) -> f64 {
        self.elastic_energy + self.kinetic_energy
    }
}

/// Shell dynamics run over a spline geometry
pub struct ShellSimulation<G: SplineGeometry> {
    geometry: G,
    rho_inf: f64,
    assembler: ResidualAssembler,
    integrator: GeneralizedAlphaIntegrator,
    solver: NonlinearSolver,
    step: usize,
}

impl ShellSimulation<NurbsSurface> {
    /// Build the configured geometry and everything that runs on it
    pub fn from_config(config: &SimulationConfig) -> Result<Self> {
        config.validate()?;
        let geometry = config.geometry.build(config.quadrature_degree)?;
        Self::new(geometry, config)
    }
}

impl<G: SplineGeometry> ShellSimulation<G> {
    /// Set up a run on `geometry`.
    ///
    /// Dofs below `config.fix_below` are fixed and the configured uniform
    /// initial velocity is assigned before the first step.
    pub fn new(geometry: G, config: &SimulationConfig) -> Result<Self> {
        config.validate()?;
        let bcs = match config.fix_below {
            Some(z) => BoundaryConditions::below_height(&geometry, z),
            None => BoundaryConditions::none(geometry.num_dofs()),
        };
        let assembler = ResidualAssembler::new(&geometry, config.material, config.contact, bcs)?;
        let integrator = GeneralizedAlphaIntegrator::new(
            config.time.rho_inf,
            config.time.dt,
            geometry.num_dofs(),
        )?;
        let mut simulation = Self {
            geometry,
            rho_inf: config.time.rho_inf,
            assembler,
            integrator,
            solver: NonlinearSolver::new(config.newton),
            step: 0,
        };
        let v0 = config.initial_velocity;
        simulation.set_initial_velocity(|_| v0)?;

        tracing::info!(
            basis = simulation.geometry.num_basis(),
            elements = simulation.geometry.num_elements(),
            dofs = simulation.num_dofs(),
            fixed = simulation.assembler.boundary_conditions().num_fixed(),
            backend = simulation.solver.backend_name(),
            "shell simulation initialized"
        );
        Ok(simulation)
    }

    /// Replace the Newton solver, e.g. to plug in another linear backend
    pub fn with_solver(mut self, solver: NonlinearSolver) -> Self {
        self.solver = solver;
        self
    }

    /// Assign a physical initial velocity field sampled at the control
    /// points; fixed dofs stay at rest.
    pub fn set_initial_velocity(
        &mut self,
        velocity: impl Fn([f64; 3]) -> [f64; 3],
    ) -> Result<()> {
        let mut v = homogeneous_from_physical(&self.geometry, velocity);
        self.assembler.boundary_conditions().zero_fixed(&mut v);
        self.integrator.set_initial_velocity(v)
    }

    pub fn geometry(&self) -> &G {
        &self.geometry
    }

    pub fn assembler(&self) -> &ResidualAssembler {
        &self.assembler
    }

    pub fn integrator(&self) -> &GeneralizedAlphaIntegrator {
        &self.integrator
    }

    pub fn num_dofs(&self) -> usize {
        self.assembler.num_dofs()
    }

    /// Number of completed steps
    pub fn steps_taken(&self) -> usize {
        self.step
    }

    pub fn time(&self) -> f64 {
        self.integrator.time()
    }

    /// Converged state of the last completed step (homogeneous coefficients)
    pub fn state(&self) -> &ShellState {
        self.integrator.old_state()
    }

    /// Solve one time step and advance the integrator.
    ///
    /// # Errors
    /// Convergence failures of the Newton solve are returned unchanged; the
    /// integrator is not advanced.
    pub fn step(&mut self) -> Result<StepReport> {
        let newton = self.solver.solve_step(&self.assembler, &mut self.integrator)?;
        self.integrator.advance();
        self.step += 1;

        let state = self.integrator.old_state();
        let elastic_energy = self.assembler.elastic_energy(&state.displacement);
        let kinetic_energy = self.assembler.kinetic_energy(&state.velocity);
        tracing::info!(
            step = self.step,
            time = self.integrator.time(),
            iterations = newton.iterations,
            relative = newton.relative_norm,
            elastic = elastic_energy,
            kinetic = kinetic_energy,
            "time step converged"
        );

        Ok(StepReport {
            step: self.step,
            time: self.integrator.time(),
            newton,
            elastic_energy,
            kinetic_energy,
        })
    }

    /// Take `num_steps` steps, handing every report to `observer`.
    ///
    /// The run stops at the first failing step or observer error.
    pub fn run(
        &mut self,
        num_steps: usize,
        mut observer: impl FnMut(&Self, &StepReport) -> Result<()>,
    ) -> Result<Vec<StepReport>> {
        let mut reports = Vec::with_capacity(num_steps);
        for _ in 0..num_steps {
            let report = self.step()?;
            observer(&*self, &report)?;
            reports.push(report);
        }
        Ok(reports)
    }

    /// Physical displacement `ŷ_i / w_i` of every control point
    pub fn physical_displacement(&self) -> Vec<[f64; 3]> {
        physical_control_values(&self.geometry, &self.state().displacement)
    }

    /// Deformed physical control net
    pub fn control_net(&self) -> ControlNet {
        let points = self
            .physical_displacement()
            .into_iter()
            .enumerate()
            .map(|(i, u)| {
                let p = self.geometry.control_point(i);
                [p[0] + u[0], p[1] + u[1], p[2] + u[2]]
            })
            .collect();
        match self.geometry.control_net_dims() {
            Some(dims) => ControlNet::structured(dims, points),
            None => ControlNet::unstructured(points),
        }
    }

    /// Per-control-point output fields.
    ///
    /// `d0..d2` are the homogeneous displacement components, `F0..F2` the
    /// homogeneous reference coordinates `w_i P_i` and `F3` the weights.
    pub fn point_data(&self) -> Vec<PointData> {
        let n = self.geometry.num_basis();
        let d = &self.state().displacement;
        let mut fields = Vec::with_capacity(8);
        for c in 0..3 {
            fields.push(PointData::scalars(
                format!("d{c}"),
                (0..n).map(|i| d[dof_index(i, c)]).collect(),
            ));
        }
        for c in 0..3 {
            fields.push(PointData::scalars(
                format!("F{c}"),
                (0..n)
                    .map(|i| self.geometry.weight(i) * self.geometry.control_point(i)[c])
                    .collect(),
            ));
        }
        fields.push(PointData::scalars(
            "F3",
            (0..n).map(|i| self.geometry.weight(i)).collect(),
        ));
        fields.push(PointData::vectors(
            "displacement",
            self.physical_displacement(),
        ));
        fields
    }

    /// Snapshot of the last converged state
    pub fn restart_state(&self) -> RestartState {
        let state = self.state();
        let mut metadata = BTreeMap::new();
        metadata.insert("rho_inf".to_string(), self.rho_inf.to_string());
        metadata.insert("dt".to_string(), self.integrator.dt().to_string());
        RestartState {
            schema_version: RESTART_SCHEMA_VERSION,
            step: self.step,
            time: self.integrator.time(),
            displacement: state.displacement.as_slice().to_vec(),
            velocity: state.velocity.as_slice().to_vec(),
            acceleration: state.acceleration.as_slice().to_vec(),
            metadata,
        }
    }

    /// Continue from a snapshot taken on the same geometry
    pub fn resume(&mut self, restart: &RestartState) -> Result<()> {
        restart.validate()?;
        if restart.displacement.len() != self.num_dofs() {
            return Err(SolverError::InvalidGeometry(format!(
                "restart has {} dofs, geometry {}",
                restart.displacement.len(),
                self.num_dofs()
            )));
        }
        let state = ShellState {
            displacement: DVector::from_column_slice(&restart.displacement),
            velocity: DVector::from_column_slice(&restart.velocity),
            acceleration: DVector::from_column_slice(&restart.acceleration),
        };
        self.integrator = GeneralizedAlphaIntegrator::from_state(
            self.rho_inf,
            self.integrator.dt(),
            restart.time,
            state,
        )?;
        self.step = restart.step;
        tracing::info!(step = self.step, time = restart.time, "resumed from restart");
        Ok(())
    }
}
