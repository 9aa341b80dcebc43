//! Simulation configuration.
//!
//! Every option of a run lives in one serde-serializable [`SimulationConfig`];
//! missing JSON fields fall back to the defaults of the sphere-drop demo
//! (ρ∞ = 0.5, Δt = 1e-3, quadrature degree 6, h = 0.03, E = 3e4, ν = 0.3,
//! ρ = 10, penalty 1e8 at z = 0, relative tolerance 1e-3, 100 Newton
//! iterations, initial velocity (0, 0, −10), 50 steps).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::contact::ContactPenalty;
use crate::error::{Result, require};
use crate::generalized_alpha::AlphaCoefficients;
use crate::materials::ShellMaterial;
use crate::nonlinear_solver::NonlinearConfig;
use crate::spline::{self, NurbsSurface};

/// Time-integration parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeIntegrationConfig {
    /// Spectral radius at infinite frequency
    pub rho_inf: f64,
    pub dt: f64,
    pub num_steps: usize,
}

impl Default for TimeIntegrationConfig {
    fn default() -> Self {
        Self {
            rho_inf: 0.5,
            dt: 1e-3,
            num_steps: 50,
        }
    }
}

/// Built-in geometries
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeometryConfig {
    FlatSquare {
        side: f64,
        degree: usize,
        num_elements: usize,
        height: f64,
    },
    CylindricalPanel {
        radius: f64,
        length: f64,
        height: f64,
        num_elements: usize,
    },
}

impl Default for GeometryConfig {
    fn default() -> Self {
        GeometryConfig::CylindricalPanel {
            radius: 1.0,
            length: 2.0,
            height: 0.05,
            num_elements: 4,
        }
    }
}

impl GeometryConfig {
    /// Build the surface with the given quadrature degree
    pub fn build(&self, quadrature_degree: usize) -> Result<NurbsSurface> {
        match *self {
            GeometryConfig::FlatSquare {
                side,
                degree,
                num_elements,
                height,
            } => spline::flat_square(side, degree, num_elements, quadrature_degree, height),
            GeometryConfig::CylindricalPanel {
                radius,
                length,
                height,
                num_elements,
            } => spline::cylindrical_panel(radius, length, height, num_elements, quadrature_degree),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GeometryConfig::FlatSquare { .. } => "flat_square",
            GeometryConfig::CylindricalPanel { .. } => "cylindrical_panel",
        }
    }
}

/// Per-step output options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Write a snapshot every `interval` steps (0 disables snapshots)
    pub interval: usize,
    /// File name prefix of snapshots and the collection file
    pub prefix: String,
    /// Write a restart file after the last step
    pub write_restart: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            interval: 1,
            prefix: "shell".to_string(),
            write_restart: true,
        }
    }
}

/// Complete configuration of a shell dynamics run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub geometry: GeometryConfig,
    pub material: ShellMaterial,
    pub time: TimeIntegrationConfig,
    pub contact: ContactPenalty,
    pub newton: NonlinearConfig,
    pub quadrature_degree: usize,
    /// Uniform physical initial velocity
    pub initial_velocity: [f64; 3],
    /// Fix every dof whose control point lies strictly below this height
    pub fix_below: Option<f64>,
    pub output: OutputConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            geometry: GeometryConfig::default(),
            material: ShellMaterial::default(),
            time: TimeIntegrationConfig::default(),
            contact: ContactPenalty::default(),
            newton: NonlinearConfig::default(),
            quadrature_degree: 6,
            initial_velocity: [0.0, 0.0, -10.0],
            fix_below: None,
            output: OutputConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Check every precondition before any step is taken
    pub fn validate(&self) -> Result<()> {
        self.material.validate()?;
        AlphaCoefficients::from_spectral_radius(self.time.rho_inf)?;
        require("dt", self.time.dt, |dt| dt > 0.0, "time step must be positive")?;
        self.contact.validate()?;
        self.newton.validate()?;
        require(
            "quadrature_degree",
            self.quadrature_degree as f64,
            |d| d >= 1.0,
            "must be at least 1",
        )?;
        for v in self.initial_velocity {
            require("initial_velocity", v, |_| true, "must be finite")?;
        }
        if let Some(z) = self.fix_below {
            require("fix_below", z, |_| true, "must be finite")?;
        }
        Ok(())
    }

    /// Load a JSON configuration and validate it
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = kls_io::load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        kls_io::save_config(path, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SolverError;

    #[test]
    fn defaults_match_demo_parameters() {
        let config = SimulationConfig::default();
        assert_eq!(config.time.rho_inf, 0.5);
        assert_eq!(config.time.dt, 1e-3);
        assert_eq!(config.quadrature_degree, 6);
        assert_eq!(config.material.thickness, 0.03);
        assert_eq!(config.material.youngs_modulus, 3e4);
        assert_eq!(config.material.poissons_ratio, 0.3);
        assert_eq!(config.material.density, 10.0);
        assert_eq!(config.contact.stiffness, 1e8);
        assert_eq!(config.contact.plane_height, 0.0);
        assert_eq!(config.newton.relative_tolerance, 1e-3);
        assert_eq!(config.newton.max_iterations, 100);
        assert_eq!(config.initial_velocity, [0.0, 0.0, -10.0]);
        assert_eq!(config.time.num_steps, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn json_roundtrip_and_partial_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = SimulationConfig::default();
        config.geometry = GeometryConfig::FlatSquare {
            side: 1.0,
            degree: 2,
            num_elements: 3,
            height: 0.2,
        };
        config.fix_below = Some(1e-9);
        config.save(&path).unwrap();
        assert_eq!(SimulationConfig::load(&path).unwrap(), config);

        let partial = dir.path().join("partial.json");
        std::fs::write(&partial, r#"{ "time": { "dt": 0.01 }, "quadrature_degree": 4 }"#).unwrap();
        let loaded = SimulationConfig::load(&partial).unwrap();
        assert_eq!(loaded.time.dt, 0.01);
        assert_eq!(loaded.time.rho_inf, 0.5);
        assert_eq!(loaded.quadrature_degree, 4);
    }

    #[test]
    fn validation_reports_the_offending_parameter() {
        let mut config = SimulationConfig::default();
        config.time.rho_inf = 1.5;
        assert!(matches!(
            config.validate(),
            Err(SolverError::InvalidParameter { name: "rho_inf", .. })
        ));

        let mut config = SimulationConfig::default();
        config.contact.stiffness = 0.0;
        assert!(matches!(
            config.validate(),
            Err(SolverError::InvalidParameter { name: "contact_stiffness", .. })
        ));

        let mut config = SimulationConfig::default();
        config.quadrature_degree = 0;
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::default();
        config.newton.relative_tolerance = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_is_an_output_error() {
        let err = SimulationConfig::load("/nonexistent/kls/config.json").unwrap_err();
        assert!(matches!(err, SolverError::Output(kls_io::IoError::FileNotFound(_))));
    }

    #[test]
    fn geometry_config_builds_surfaces() {
        let square = GeometryConfig::FlatSquare {
            side: 1.0,
            degree: 2,
            num_elements: 2,
            height: 0.0,
        };
        assert_eq!(square.name(), "flat_square");
        assert!(square.build(4).is_ok());
        assert!(GeometryConfig::default().build(4).is_ok());
    }
}
