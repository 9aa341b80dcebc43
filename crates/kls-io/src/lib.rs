//! I/O support for the Kirchhoff-Love shell solver.
//!
//! This crate provides:
//! - **JSON configuration** loading and saving
//! - **JSON restart** snapshots of the converged time-integration state
//! - **VTK export** of spline control nets with per-step fields, plus the
//!   ParaView `.pvd` collection that turns the snapshots into a time series

pub mod error;
mod json;
mod restart;
pub mod vtk_writer;

pub use error::{IoError, Result};
pub use json::{load_config, save_config};
pub use restart::{RESTART_SCHEMA_VERSION, RestartState, load_restart, save_restart};
pub use vtk_writer::{ControlNet, PointData, TimeSeriesWriter, VtkWriter};
