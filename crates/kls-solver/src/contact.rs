//! Penalty contact against a rigid horizontal plane.
//!
//! Penetration below `z = plane_height` produces an upward force
//! `k · max(0, plane_height − z)` per unit area; above the plane the force
//! vanishes. The force is continuous in `z` but its derivative jumps from
//! `0` to `−k` at the plane.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::{Result, require};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactPenalty {
    /// Penalty stiffness (k)
    pub stiffness: f64,
    /// Height of the rigid plane
    pub plane_height: f64,
}

impl Default for ContactPenalty {
    fn default() -> Self {
        Self {
            stiffness: 1.0e8,
            plane_height: 0.0,
        }
    }
}

impl ContactPenalty {
    pub fn new(stiffness: f64, plane_height: f64) -> Self {
        Self {
            stiffness,
            plane_height,
        }
    }

    pub fn validate(&self) -> Result<()> {
        require(
            "contact_stiffness",
            self.stiffness,
            |k| k > 0.0,
            "must be positive",
        )?;
        require("plane_height", self.plane_height, |_| true, "must be finite")
    }

    /// Penetration depth `max(0, plane_height − z)`
    #[inline]
    pub fn gap(&self, z: f64) -> f64 {
        (self.plane_height - z).max(0.0)
    }

    #[inline]
    pub fn is_active(&self, z: f64) -> bool {
        z < self.plane_height
    }

    /// Vertical force per unit area at height `z`
    #[inline]
    pub fn force_z(&self, z: f64) -> f64 {
        self.stiffness * self.gap(z)
    }

    /// Contact traction `(0, 0, k·gap)` at a current position
    pub fn force(&self, position: &Vector3<f64>) -> Vector3<f64> {
        Vector3::new(0.0, 0.0, self.force_z(position.z))
    }

    /// `∂F_z/∂z`: `−k` in penetration, `0` otherwise
    #[inline]
    pub fn force_derivative(&self, z: f64) -> f64 {
        if self.is_active(z) {
            -self.stiffness
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn force_vanishes_above_plane() {
        let contact = ContactPenalty::new(100.0, 1.0);
        assert_eq!(contact.force(&Vector3::new(3.0, -2.0, 1.5)), Vector3::zeros());
        assert_eq!(contact.force_z(1.0), 0.0);
        assert_eq!(contact.force_derivative(1.0), 0.0);
        assert!(!contact.is_active(1.0));
    }

    #[test]
    fn force_is_linear_in_penetration() {
        let contact = ContactPenalty::new(100.0, 1.0);
        let f = contact.force(&Vector3::new(0.0, 0.0, 0.75));
        assert_eq!(f.x, 0.0);
        assert_eq!(f.y, 0.0);
        assert!((f.z - 25.0).abs() < 1e-12);
        assert_eq!(contact.force_derivative(0.75), -100.0);
    }

    #[test]
    fn nonpositive_stiffness_is_rejected() {
        assert!(ContactPenalty::new(-1.0, 0.0).validate().is_err());
        assert!(ContactPenalty::new(0.0, 0.0).validate().is_err());
        assert!(ContactPenalty::new(0.0, f64::INFINITY).validate().is_err());
        assert!(ContactPenalty::default().validate().is_ok());
    }
}
