//! Rational (homogeneous-coordinate) fields on a spline geometry.
//!
//! Fields are stored as homogeneous control values `ŷ_i` and recovered by
//! dividing the polynomial combination by the weight field:
//!
//! ```text
//! W = Σ N_i w_i,   y = (Σ N_i ŷ_i) / W = Σ φ_i ŷ_i,   φ_i = N_i / W
//! ```
//!
//! The derivatives of `φ_i` follow from the quotient rule,
//!
//! ```text
//! φ_a  = (N_a − φ W_a) / W
//! φ_ab = (N_ab − φ_a W_b − φ_b W_a − φ W_ab) / W
//! ```
//!
//! so every field derivative remains linear in the control values. The
//! reference midsurface is the homogeneous field with `ŷ_i = w_i P_i`.

use nalgebra::DVector;

use crate::geometry::{BasisEvaluation, SplineGeometry, dof_index};
use crate::kinematics::{NUM_COMPONENTS, NUM_SLOTS, SurfaceDerivatives};

/// Rational basis `φ_i = N_i / W` and its derivatives at one point
#[derive(Debug, Clone, PartialEq)]
pub struct RationalBasis {
    pub indices: Vec<usize>,
    pub values: Vec<f64>,
    /// Per local function, derivatives in slot order `[∂0, ∂1, ∂00, ∂01, ∂11]`
    pub derivatives: Vec<[f64; NUM_SLOTS]>,
    /// Weight field `W` at the point
    pub weight: f64,
}

impl RationalBasis {
    /// Apply the rational weighting to a polynomial basis evaluation
    pub fn new(basis: &BasisEvaluation, weight_of: impl Fn(usize) -> f64) -> Self {
        let n = basis.len();
        let mut w = 0.0;
        let mut dw = [0.0; NUM_SLOTS];
        for k in 0..n {
            let wk = weight_of(basis.indices[k]);
            w += basis.values[k] * wk;
            let slots = basis.slot_derivatives(k);
            for s in 0..NUM_SLOTS {
                dw[s] += slots[s] * wk;
            }
        }

        let inv_w = 1.0 / w;
        let mut values = Vec::with_capacity(n);
        let mut derivatives = Vec::with_capacity(n);
        for k in 0..n {
            let [n0, n1, n00, n01, n11] = basis.slot_derivatives(k);
            let phi = basis.values[k] * inv_w;
            let phi0 = (n0 - phi * dw[0]) * inv_w;
            let phi1 = (n1 - phi * dw[1]) * inv_w;
            let phi00 = (n00 - 2.0 * phi0 * dw[0] - phi * dw[2]) * inv_w;
            let phi01 = (n01 - phi0 * dw[1] - phi1 * dw[0] - phi * dw[3]) * inv_w;
            let phi11 = (n11 - 2.0 * phi1 * dw[1] - phi * dw[4]) * inv_w;
            values.push(phi);
            derivatives.push([phi0, phi1, phi00, phi01, phi11]);
        }

        Self {
            indices: basis.indices.clone(),
            values,
            derivatives,
            weight: w,
        }
    }

    /// Evaluate the rational basis of `geometry` at `xi` in `element`
    pub fn evaluate<G: SplineGeometry + ?Sized>(
        geometry: &G,
        element: usize,
        xi: [f64; 2],
    ) -> Self {
        let basis = geometry.evaluate_basis(element, xi);
        Self::new(&basis, |i| geometry.weight(i))
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Value of the field with homogeneous control values `coefficients`
    pub fn value(&self, coefficients: &DVector<f64>) -> [f64; 3] {
        let mut y = [0.0; 3];
        for (k, &i) in self.indices.iter().enumerate() {
            for (c, yc) in y.iter_mut().enumerate() {
                *yc += self.values[k] * coefficients[dof_index(i, c)];
            }
        }
        y
    }

    /// Parametric derivatives of the field with homogeneous control values
    pub fn derivatives(&self, coefficients: &DVector<f64>) -> SurfaceDerivatives<f64> {
        let mut flat = [0.0; NUM_COMPONENTS];
        for (k, &i) in self.indices.iter().enumerate() {
            for (s, &phi) in self.derivatives[k].iter().enumerate() {
                for c in 0..3 {
                    flat[3 * s + c] += phi * coefficients[dof_index(i, c)];
                }
            }
        }
        SurfaceDerivatives::from_components(&flat)
    }

    /// Parametric derivatives of the reference midsurface `X`
    pub fn reference_derivatives<G: SplineGeometry + ?Sized>(
        &self,
        geometry: &G,
    ) -> SurfaceDerivatives<f64> {
        let mut flat = [0.0; NUM_COMPONENTS];
        for (k, &i) in self.indices.iter().enumerate() {
            let p = geometry.control_point(i);
            let w = geometry.weight(i);
            for (s, &phi) in self.derivatives[k].iter().enumerate() {
                for c in 0..3 {
                    flat[3 * s + c] += phi * w * p[c];
                }
            }
        }
        SurfaceDerivatives::from_components(&flat)
    }

    /// Reference position `X`
    pub fn reference_position<G: SplineGeometry + ?Sized>(&self, geometry: &G) -> [f64; 3] {
        let mut x = [0.0; 3];
        for (k, &i) in self.indices.iter().enumerate() {
            let p = geometry.control_point(i);
            let w = geometry.weight(i);
            for c in 0..3 {
                x[c] += self.values[k] * w * p[c];
            }
        }
        x
    }
}

/// Homogeneous control values `ŷ_i = w_i f(P_i)` of a physical field `f`
/// sampled at the control points.
///
/// For a field that is constant, this reproduces it exactly.
pub fn homogeneous_from_physical<G: SplineGeometry + ?Sized>(
    geometry: &G,
    f: impl Fn([f64; 3]) -> [f64; 3],
) -> DVector<f64> {
    let mut values = DVector::zeros(geometry.num_dofs());
    for i in 0..geometry.num_basis() {
        let w = geometry.weight(i);
        let y = f(geometry.control_point(i));
        for c in 0..3 {
            values[dof_index(i, c)] = w * y[c];
        }
    }
    values
}

/// Physical control values `ŷ_i / w_i`
pub fn physical_control_values<G: SplineGeometry + ?Sized>(
    geometry: &G,
    homogeneous: &DVector<f64>,
) -> Vec<[f64; 3]> {
    (0..geometry.num_basis())
        .map(|i| {
            let w = geometry.weight(i);
            std::array::from_fn(|c| homogeneous[dof_index(i, c)] / w)
        })
        .collect()
}
