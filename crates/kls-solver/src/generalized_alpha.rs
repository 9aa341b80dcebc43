//! Generalized-α time integration for second-order systems.
//!
//! The unknown of each step is the end-of-step displacement `d_{n+1}`;
//! acceleration and velocity follow from the Newmark relations
//!
//! ```text
//! a_{n+1} = (d_{n+1} − d_n − Δt v_n − Δt²(½ − β) a_n) / (β Δt²)
//! v_{n+1} = v_n + Δt ((1 − γ) a_n + γ a_{n+1})
//! ```
//!
//! and the equations of motion are enforced at the intermediate levels
//!
//! ```text
//! d_α = (1 − α_f) d_n + α_f d_{n+1}
//! v_α = (1 − α_f) v_n + α_f v_{n+1}
//! a_α = (1 − α_m) a_n + α_m a_{n+1}
//! ```
//!
//! The four parameters derive from the spectral radius at infinite frequency
//! `ρ∞ ∈ [0, 1]`:
//!
//! ```text
//! α_m = (2 − ρ∞)/(1 + ρ∞),  α_f = 1/(1 + ρ∞)
//! γ = ½ + α_m − α_f,        β = ¼ (1 + α_m − α_f)²
//! ```
//!
//! `ρ∞ = 1` gives the non-dissipative trapezoidal rule; smaller values damp
//! high-frequency content.
//!
//! # Example
//!
//! ```
//! use kls_solver::GeneralizedAlphaIntegrator;
//! use nalgebra::DVector;
//!
//! let mut integrator = GeneralizedAlphaIntegrator::new(0.5, 1e-3, 3).unwrap();
//! integrator.set_initial_velocity(DVector::from_vec(vec![0.0, 0.0, -10.0])).unwrap();
//! // ... solve for the new displacement, then
//! integrator.advance();
//! assert!((integrator.time() - 1e-3).abs() < 1e-15);
//! ```

use nalgebra::DVector;

use crate::error::{Result, SolverError, require};

/// Generalized-α parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlphaCoefficients {
    pub alpha_m: f64,
    pub alpha_f: f64,
    pub gamma: f64,
    pub beta: f64,
}

impl AlphaCoefficients {
    /// Parameters for spectral radius `rho_inf ∈ [0, 1]`
    pub fn from_spectral_radius(rho_inf: f64) -> Result<Self> {
        require(
            "rho_inf",
            rho_inf,
            |r| (0.0..=1.0).contains(&r),
            "spectral radius must lie in [0, 1]",
        )?;
        let alpha_m = (2.0 - rho_inf) / (1.0 + rho_inf);
        let alpha_f = 1.0 / (1.0 + rho_inf);
        let gamma = 0.5 + alpha_m - alpha_f;
        let shift = 1.0 + alpha_m - alpha_f;
        Ok(Self {
            alpha_m,
            alpha_f,
            gamma,
            beta: 0.25 * shift * shift,
        })
    }
}

/// Displacement, velocity and acceleration at one time level
#[derive(Debug, Clone, PartialEq)]
pub struct ShellState {
    pub displacement: DVector<f64>,
    pub velocity: DVector<f64>,
    pub acceleration: DVector<f64>,
}

impl ShellState {
    pub fn zeros(num_dofs: usize) -> Self {
        Self {
            displacement: DVector::zeros(num_dofs),
            velocity: DVector::zeros(num_dofs),
            acceleration: DVector::zeros(num_dofs),
        }
    }

    pub fn num_dofs(&self) -> usize {
        self.displacement.len()
    }
}

/// Fields the residual is evaluated at, with the sensitivities of the
/// α-level quantities to the unknown `d_{n+1}`.
#[derive(Debug, Clone)]
pub struct AlphaLevel {
    pub displacement: DVector<f64>,
    pub acceleration: DVector<f64>,
    /// `∂d_α/∂d_{n+1} = α_f`
    pub displacement_factor: f64,
    /// `∂a_α/∂d_{n+1} = α_m / (β Δt²)`
    pub acceleration_factor: f64,
}

/// Time-stepping state of a generalized-α integration.
///
/// Holds the converged state of the previous step and the current iterate of
/// the end-of-step displacement; all other end-of-step and α-level fields are
/// derived from these on demand.
#[derive(Debug, Clone)]
pub struct GeneralizedAlphaIntegrator {
    coefficients: AlphaCoefficients,
    dt: f64,
    time: f64,
    old: ShellState,
    displacement: DVector<f64>,
}

impl GeneralizedAlphaIntegrator {
    /// Start from rest at `t = 0`
    pub fn new(rho_inf: f64, dt: f64, num_dofs: usize) -> Result<Self> {
        Self::from_state(rho_inf, dt, 0.0, ShellState::zeros(num_dofs))
    }

    /// Resume from a converged state at time `time`
    pub fn from_state(rho_inf: f64, dt: f64, time: f64, state: ShellState) -> Result<Self> {
        let coefficients = AlphaCoefficients::from_spectral_radius(rho_inf)?;
        require("dt", dt, |dt| dt > 0.0, "time step must be positive")?;
        require("time", time, |_| true, "must be finite")?;
        let n = state.num_dofs();
        if state.velocity.len() != n || state.acceleration.len() != n {
            return Err(SolverError::InvalidGeometry(format!(
                "state vectors differ in length: d={}, v={}, a={}",
                n,
                state.velocity.len(),
                state.acceleration.len()
            )));
        }
        Ok(Self {
            coefficients,
            dt,
            time,
            displacement: state.displacement.clone(),
            old: state,
        })
    }

    /// Overwrite the previous-step velocity (initial condition)
    pub fn set_initial_velocity(&mut self, velocity: DVector<f64>) -> Result<()> {
        if velocity.len() != self.displacement.len() {
            return Err(SolverError::InvalidGeometry(format!(
                "initial velocity has {} entries, expected {}",
                velocity.len(),
                self.displacement.len()
            )));
        }
        self.old.velocity = velocity;
        Ok(())
    }

    pub fn coefficients(&self) -> &AlphaCoefficients {
        &self.coefficients
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Time of the last converged step
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn num_dofs(&self) -> usize {
        self.displacement.len()
    }

    pub fn old_state(&self) -> &ShellState {
        &self.old
    }

    /// Current iterate of `d_{n+1}`
    pub fn displacement(&self) -> &DVector<f64> {
        &self.displacement
    }

    pub fn displacement_mut(&mut self) -> &mut DVector<f64> {
        &mut self.displacement
    }

    /// `a_{n+1}` implied by the current displacement iterate
    pub fn acceleration(&self) -> DVector<f64> {
        let AlphaCoefficients { beta, .. } = self.coefficients;
        let dt = self.dt;
        let mut a = &self.displacement - &self.old.displacement;
        a.axpy(-dt, &self.old.velocity, 1.0);
        a.axpy(-dt * dt * (0.5 - beta), &self.old.acceleration, 1.0);
        a / (beta * dt * dt)
    }

    /// `v_{n+1}` implied by the current displacement iterate
    pub fn velocity(&self) -> DVector<f64> {
        self.velocity_from(&self.acceleration())
    }

    fn velocity_from(&self, acceleration: &DVector<f64>) -> DVector<f64> {
        let gamma = self.coefficients.gamma;
        let mut v = self.old.velocity.clone();
        v.axpy(self.dt * (1.0 - gamma), &self.old.acceleration, 1.0);
        v.axpy(self.dt * gamma, acceleration, 1.0);
        v
    }

    pub fn displacement_alpha(&self) -> DVector<f64> {
        blend(&self.old.displacement, &self.displacement, self.coefficients.alpha_f)
    }

    pub fn velocity_alpha(&self) -> DVector<f64> {
        blend(&self.old.velocity, &self.velocity(), self.coefficients.alpha_f)
    }

    pub fn acceleration_alpha(&self) -> DVector<f64> {
        blend(&self.old.acceleration, &self.acceleration(), self.coefficients.alpha_m)
    }

    /// Everything the residual needs at the current iterate
    pub fn alpha_level(&self) -> AlphaLevel {
        let AlphaCoefficients {
            alpha_m,
            alpha_f,
            beta,
            ..
        } = self.coefficients;
        AlphaLevel {
            displacement: self.displacement_alpha(),
            acceleration: self.acceleration_alpha(),
            displacement_factor: alpha_f,
            acceleration_factor: alpha_m / (beta * self.dt * self.dt),
        }
    }

    /// Accept the current iterate: `(d, v, a)_{n} ← (d, v, a)_{n+1}`, `t ← t + Δt`.
    ///
    /// The displacement iterate is left unchanged, so the next step's Newton
    /// iteration starts from the last converged displacement.
    pub fn advance(&mut self) {
        let acceleration = self.acceleration();
        let velocity = self.velocity_from(&acceleration);
        self.old = ShellState {
            displacement: self.displacement.clone(),
            velocity,
            acceleration,
        };
        self.time += self.dt;
    }

    /// Converged state of the last completed step
    pub fn state(&self) -> ShellState {
        self.old.clone()
    }
}

fn blend(old: &DVector<f64>, new: &DVector<f64>, alpha: f64) -> DVector<f64> {
    old * (1.0 - alpha) + new * alpha
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn coefficients_for_unit_spectral_radius() {
        let c = AlphaCoefficients::from_spectral_radius(1.0).unwrap();
        assert_relative_eq!(c.alpha_m, 0.5);
        assert_relative_eq!(c.alpha_f, 0.5);
        assert_relative_eq!(c.gamma, 0.5);
        assert_relative_eq!(c.beta, 0.25);
    }

    #[test]
    fn coefficients_for_zero_spectral_radius() {
        let c = AlphaCoefficients::from_spectral_radius(0.0).unwrap();
        assert_relative_eq!(c.alpha_m, 2.0);
        assert_relative_eq!(c.alpha_f, 1.0);
        assert_relative_eq!(c.gamma, 1.5);
        assert_relative_eq!(c.beta, 1.0);
    }

    #[test]
    fn second_order_accuracy_condition_holds() {
        for rho in [0.0, 0.25, 0.5, 0.8, 1.0] {
            let c = AlphaCoefficients::from_spectral_radius(rho).unwrap();
            assert_relative_eq!(c.gamma, 0.5 + c.alpha_m - c.alpha_f, epsilon = 1e-14);
            assert!(c.alpha_m >= c.alpha_f);
        }
    }

    #[test]
    fn rejects_out_of_range_parameters() {
        assert!(AlphaCoefficients::from_spectral_radius(1.5).is_err());
        assert!(AlphaCoefficients::from_spectral_radius(-0.1).is_err());
        assert!(GeneralizedAlphaIntegrator::new(0.5, 0.0, 3).is_err());
        assert!(GeneralizedAlphaIntegrator::new(0.5, f64::NAN, 3).is_err());
    }

    #[test]
    fn initial_velocity_of_wrong_length_is_rejected() {
        let mut integrator = GeneralizedAlphaIntegrator::new(0.5, 1e-3, 48).unwrap();
        let err = integrator
            .set_initial_velocity(DVector::from_vec(vec![0.0, 0.0, -10.0]))
            .unwrap_err();
        assert!(matches!(err, SolverError::InvalidGeometry(_)));
        assert_eq!(integrator.old_state().velocity.len(), 48);
        assert_eq!(integrator.acceleration().len(), 48);
    }

    #[test]
    fn free_flight_has_zero_acceleration() {
        let dt = 0.01;
        let mut integrator = GeneralizedAlphaIntegrator::new(0.5, dt, 3).unwrap();
        let v0 = DVector::from_vec(vec![1.0, 0.0, -10.0]);
        integrator.set_initial_velocity(v0.clone()).unwrap();

        for _ in 0..5 {
            // The force-free solution: a_α = 0 with a_n = 0 gives d_{n+1} = d_n + Δt v_n
            let next = &integrator.old_state().displacement + &integrator.old_state().velocity * dt;
            *integrator.displacement_mut() = next;
            assert!(integrator.acceleration().amax() < 1e-9);
            assert!(integrator.acceleration_alpha().amax() < 1e-9);
            integrator.advance();
        }

        assert_relative_eq!(integrator.time(), 5.0 * dt, epsilon = 1e-14);
        let state = integrator.state();
        assert!((&state.velocity - &v0).amax() < 1e-9);
        assert_relative_eq!(state.displacement[2], -10.0 * 5.0 * dt, epsilon = 1e-9);
    }

    #[test]
    fn alpha_level_blends_old_and_new() {
        let mut integrator = GeneralizedAlphaIntegrator::new(0.5, 0.1, 1).unwrap();
        integrator.displacement_mut()[0] = 3.0;
        let c = *integrator.coefficients();
        let level = integrator.alpha_level();

        assert_relative_eq!(level.displacement[0], c.alpha_f * 3.0);
        let a_new = 3.0 / (c.beta * 0.01);
        assert_relative_eq!(integrator.acceleration()[0], a_new, epsilon = 1e-9);
        assert_relative_eq!(level.acceleration[0], c.alpha_m * a_new, epsilon = 1e-9);
        assert_relative_eq!(level.acceleration_factor, c.alpha_m / (c.beta * 0.01));
        assert_relative_eq!(level.displacement_factor, c.alpha_f);
        assert_relative_eq!(
            integrator.velocity_alpha()[0],
            c.alpha_f * c.gamma * 0.1 * a_new,
            epsilon = 1e-9
        );
    }

    #[test]
    fn advance_preserves_displacement_iterate() {
        let mut integrator = GeneralizedAlphaIntegrator::new(1.0, 0.5, 2).unwrap();
        integrator.displacement_mut()[1] = 0.25;
        integrator.advance();
        assert_eq!(integrator.displacement()[1], 0.25);
        assert_eq!(integrator.old_state().displacement[1], 0.25);
        assert_relative_eq!(integrator.time(), 0.5);
    }
}
