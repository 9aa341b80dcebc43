//! St. Venant-Kirchhoff material law for thin shells.

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use crate::dual::Real;
use crate::error::{Result, require};

/// Isotropic linear-elastic shell material
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShellMaterial {
    /// Shell thickness (h)
    pub thickness: f64,
    /// Young's modulus (E)
    pub youngs_modulus: f64,
    /// Poisson's ratio (ν) [-]
    pub poissons_ratio: f64,
    /// Mass density per unit volume (ρ)
    pub density: f64,
}

impl Default for ShellMaterial {
    fn default() -> Self {
        Self {
            thickness: 0.03,
            youngs_modulus: 3.0e4,
            poissons_ratio: 0.3,
            density: 10.0,
        }
    }
}

impl ShellMaterial {
    pub fn new(thickness: f64, youngs_modulus: f64, poissons_ratio: f64, density: f64) -> Self {
        Self {
            thickness,
            youngs_modulus,
            poissons_ratio,
            density,
        }
    }

    /// Check physical admissibility: h > 0, E > 0, −1 < ν < ½, ρ ≥ 0
    pub fn validate(&self) -> Result<()> {
        require("thickness", self.thickness, |h| h > 0.0, "must be positive")?;
        require(
            "youngs_modulus",
            self.youngs_modulus,
            |e| e > 0.0,
            "must be positive",
        )?;
        require(
            "poissons_ratio",
            self.poissons_ratio,
            |nu| nu > -1.0 && nu < 0.5,
            "must lie in (-1, 0.5)",
        )?;
        require("density", self.density, |rho| rho >= 0.0, "must be non-negative")?;
        Ok(())
    }

    /// Get the shear modulus (G) from E and ν
    pub fn shear_modulus(&self) -> f64 {
        self.youngs_modulus / (2.0 * (1.0 + self.poissons_ratio))
    }

    /// Plane-stress elasticity matrix in Voigt notation
    ///
    /// ```text
    /// D = E/(1−ν²) [1 ν 0; ν 1 0; 0 0 (1−ν)/2]
    /// ```
    pub fn elasticity_matrix(&self) -> Matrix3<f64> {
        let nu = self.poissons_ratio;
        let c = self.youngs_modulus / (1.0 - nu * nu);
        Matrix3::new(
            c,
            c * nu,
            0.0,
            c * nu,
            c,
            0.0,
            0.0,
            0.0,
            c * 0.5 * (1.0 - nu),
        )
    }

    /// Mass per unit midsurface area (ρh)
    pub fn mass_per_area(&self) -> f64 {
        self.density * self.thickness
    }

    /// Membrane force resultant `n̄ = h D ε̄`
    pub fn membrane_resultant<T: Real>(&self, strain: &[T; 3]) -> [T; 3] {
        apply(&self.elasticity_matrix(), strain, self.thickness)
    }

    /// Bending moment resultant `m̄ = h³/12 D κ̄`
    pub fn bending_resultant<T: Real>(&self, curvature: &[T; 3]) -> [T; 3] {
        let h = self.thickness;
        apply(&self.elasticity_matrix(), curvature, h * h * h / 12.0)
    }

    /// Strain energy per unit parametric area `W = ½(ε̄·n̄ + κ̄·m̄)`
    pub fn energy_density<T: Real>(&self, strain: &[T; 3], curvature: &[T; 3]) -> T {
        let n = self.membrane_resultant(strain);
        let m = self.bending_resultant(curvature);
        let mut w = T::zero();
        for i in 0..3 {
            w = w + strain[i] * n[i] + curvature[i] * m[i];
        }
        w * 0.5
    }
}

fn apply<T: Real>(d: &Matrix3<f64>, v: &[T; 3], factor: f64) -> [T; 3] {
    std::array::from_fn(|i| (v[0] * d[(i, 0)] + v[1] * d[(i, 1)] + v[2] * d[(i, 2)]) * factor)
}
