//! Linear-system provider abstraction.
//!
//! The Newton solver hands each fully reduced tangent system to a backend
//! through the [`LinearSolver`] trait and never depends on a concrete linear
//! algebra library. The tangent travels as COO triplets, the interchange
//! format any sparse or distributed solver can consume.
//!
//! ```text
//! Per-element contributions (rayon map)
//!         │
//!         ▼
//! ResidualAssembler::reduce (COO → CSR, BCs applied)
//!         │
//!         ▼
//! LinearSystemData (triplets + rhs)
//!         │
//!         ▼
//! LinearSolver backend (native dense LU)
//! ```

pub mod native;
pub mod traits;

pub use native::NativeBackend;
pub use traits::*;

/// Returns the default linear solver backend.
pub fn default_backend() -> Box<dyn LinearSolver> {
    Box::new(NativeBackend)
}
