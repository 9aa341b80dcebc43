//! Isogeometric Kirchhoff-Love thin-shell dynamics.
//!
//! The midsurface is a spline (NURBS) surface; displacements live in the
//! same rational basis as the geometry and are stored homogeneously. Each
//! time step is advanced with the generalized-α method and solved by
//! Newton-Raphson on a residual that combines inertia, the St. Venant-Kirchhoff
//! membrane and bending energy, and a penalty contact against a horizontal
//! plane.
//!
//! The pieces, bottom up:
//! - [`kinematics`] and [`materials`]: pointwise shell strains and energy
//! - [`contact`]: the penalty plane
//! - [`generalized_alpha`]: time integration and the alpha-level state
//! - [`geometry`], [`rational`], [`spline`], [`quadrature`]: the
//!   spline discretization
//! - [`residual`]: element integration and global assembly
//! - [`nonlinear_solver`] over a pluggable linear [`backend`]
//! - [`simulation`]: the time-step driver used by the `kls-solver` binary

pub mod backend;
pub mod boundary_conditions;
pub mod config;
pub mod contact;
pub mod dual;
pub mod error;
pub mod generalized_alpha;
pub mod geometry;
pub mod kinematics;
pub mod materials;
pub mod nonlinear_solver;
pub mod quadrature;
pub mod rational;
pub mod residual;
pub mod simulation;
pub mod spline;

pub use backend::{
    BackendError, LinearSolver, LinearSystemData, NativeBackend, SolveInfo, SparseTripletsF64,
    default_backend,
};
pub use boundary_conditions::{BoundaryConditions, DofId};
pub use config::{GeometryConfig, OutputConfig, SimulationConfig, TimeIntegrationConfig};
pub use contact::ContactPenalty;
pub use dual::{HyperDual, Real};
pub use error::{Result, SolverError};
pub use generalized_alpha::{AlphaCoefficients, AlphaLevel, GeneralizedAlphaIntegrator, ShellState};
pub use geometry::{BasisEvaluation, QuadraturePoint, SplineGeometry, dof_index};
pub use kinematics::{LocalCartesianFrame, ReferenceGeometry, ShellGeometry, SurfaceDerivatives};
pub use materials::ShellMaterial;
pub use nonlinear_solver::{NewtonState, NonlinearConfig, NonlinearResults, NonlinearSolver};
pub use quadrature::GaussLegendre;
pub use rational::RationalBasis;
pub use residual::{AssembledSystem, ElementContribution, ResidualAssembler};
pub use simulation::{ShellSimulation, StepReport};
pub use spline::{Direction, KnotVector, NurbsSurface};
