//! Differential geometry of the shell midsurface.
//!
//! For a midsurface configuration `x(ξ)` the covariant basis, unit normal,
//! metric and curvature tensors are
//!
//! ```text
//! a_α = ∂x/∂ξ_α,  a2 = (a0 × a1)/|a0 × a1|
//! a_αβ = ⟨a_α, a_β⟩,  b_αβ = −⟨a_α, ∂a2/∂ξ_β⟩
//! ```
//!
//! Strain and curvature change relative to the reference configuration are
//! `ε = ½(a − A)` and `κ = B − b`. Both are converted to an orthonormal frame
//! built from the reference covariant basis before entering the material law.
//!
//! Every function here is generic over [`Real`] so that the same code yields
//! values (`f64`) and exact derivatives ([`HyperDual`](crate::dual::HyperDual)).

use crate::dual::Real;

pub type Vec3<T> = [T; 3];
pub type Tensor2<T> = [[T; 2]; 2];

/// Number of scalar inputs the shell kinematics depend on at one point.
pub const NUM_COMPONENTS: usize = 15;

/// Number of parametric derivative slots (∂0, ∂1, ∂00, ∂01, ∂11).
pub const NUM_SLOTS: usize = 5;

/// First and second parametric derivatives of a midsurface position field.
///
/// Flattened layout is slot-major: component `c` of slot `s` sits at `3*s + c`,
/// with slots ordered `[∂0, ∂1, ∂00, ∂01, ∂11]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceDerivatives<T> {
    pub d0: Vec3<T>,
    pub d1: Vec3<T>,
    pub d00: Vec3<T>,
    pub d01: Vec3<T>,
    pub d11: Vec3<T>,
}

impl<T: Copy> SurfaceDerivatives<T> {
    pub fn from_components(c: &[T; NUM_COMPONENTS]) -> Self {
        let slot = |s: usize| [c[3 * s], c[3 * s + 1], c[3 * s + 2]];
        Self {
            d0: slot(0),
            d1: slot(1),
            d00: slot(2),
            d01: slot(3),
            d11: slot(4),
        }
    }

    pub fn to_components(&self) -> [T; NUM_COMPONENTS] {
        let slots = [self.d0, self.d1, self.d00, self.d01, self.d11];
        std::array::from_fn(|k| slots[k / 3][k % 3])
    }
}

impl SurfaceDerivatives<f64> {
    pub fn zeros() -> Self {
        Self::from_components(&[0.0; NUM_COMPONENTS])
    }
}

impl std::ops::Add for SurfaceDerivatives<f64> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        let a = self.to_components();
        let b = rhs.to_components();
        Self::from_components(&std::array::from_fn(|k| a[k] + b[k]))
    }
}

/// Covariant basis, unit normal, metric and curvature at one point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShellGeometry<T> {
    pub a0: Vec3<T>,
    pub a1: Vec3<T>,
    pub a2: Vec3<T>,
    pub metric: Tensor2<T>,
    pub curvature: Tensor2<T>,
}

#[inline]
pub fn dot<T: Real>(a: &Vec3<T>, b: &Vec3<T>) -> T {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn cross<T: Real>(a: &Vec3<T>, b: &Vec3<T>) -> Vec3<T> {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
fn add<T: Real>(a: &Vec3<T>, b: &Vec3<T>) -> Vec3<T> {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
fn sub<T: Real>(a: &Vec3<T>, b: &Vec3<T>) -> Vec3<T> {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
fn scale<T: Real>(a: &Vec3<T>, s: T) -> Vec3<T> {
    [a[0] * s, a[1] * s, a[2] * s]
}

#[inline]
fn unit<T: Real>(a: &Vec3<T>) -> Vec3<T> {
    let inv = T::from_f64(1.0) / dot(a, a).sqrt();
    scale(a, inv)
}

/// Compute the shell geometry of a configuration from its parametric derivatives.
///
/// The normal derivative is taken analytically:
/// `∂a2/∂ξ_β = (∂n/∂ξ_β − a2 ⟨a2, ∂n/∂ξ_β⟩) / |n|` with `n = a0 × a1`.
pub fn shell_geometry<T: Real>(x: &SurfaceDerivatives<T>) -> ShellGeometry<T> {
    let a0 = x.d0;
    let a1 = x.d1;
    let n = cross(&a0, &a1);
    let n_norm = dot(&n, &n).sqrt();
    let inv_norm = T::from_f64(1.0) / n_norm;
    let a2 = scale(&n, inv_norm);

    // ∂n/∂ξ_β = ∂a0/∂ξ_β × a1 + a0 × ∂a1/∂ξ_β
    let dn = [
        add(&cross(&x.d00, &a1), &cross(&a0, &x.d01)),
        add(&cross(&x.d01, &a1), &cross(&a0, &x.d11)),
    ];
    let da2 = dn.map(|dn_b| {
        let tangential = sub(&dn_b, &scale(&a2, dot(&a2, &dn_b)));
        scale(&tangential, inv_norm)
    });

    let basis = [a0, a1];
    let metric = [
        [dot(&a0, &a0), dot(&a0, &a1)],
        [dot(&a1, &a0), dot(&a1, &a1)],
    ];
    let curvature = std::array::from_fn(|i| std::array::from_fn(|j| -dot(&basis[i], &da2[j])));

    ShellGeometry {
        a0,
        a1,
        a2,
        metric,
        curvature,
    }
}

/// Membrane strain `ε = ½(a − A)`.
pub fn membrane_strain<T: Real>(current: &Tensor2<T>, reference: &Tensor2<f64>) -> Tensor2<T> {
    std::array::from_fn(|i| std::array::from_fn(|j| (current[i][j] - reference[i][j]) * 0.5))
}

/// Curvature change `κ = B − b`.
pub fn curvature_change<T: Real>(current: &Tensor2<T>, reference: &Tensor2<f64>) -> Tensor2<T> {
    std::array::from_fn(|i| std::array::from_fn(|j| -(current[i][j] - reference[i][j])))
}

/// Voigt form `[T11, T22, 2·T12]` of a symmetric 2×2 tensor (strain convention).
pub fn voigt<T: Real>(t: &Tensor2<T>) -> [T; 3] {
    [t[0][0], t[1][1], t[0][1] * 2.0]
}

/// Change of basis from the curvilinear frame to a local orthonormal one.
///
/// Built from the contravariant basis (inverse metric) and a Gram-Schmidt
/// orthonormalization `e0 = a0/|a0|`, `e1 ∝ a1 − ⟨a1, e0⟩e0`; a tensor
/// transforms as `T̄ = E T Eᵀ` with `E_ij = ⟨e_i, a^j⟩`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalCartesianFrame {
    pub ea: Tensor2<f64>,
}

impl LocalCartesianFrame {
    /// Relative tolerance below which the metric is treated as singular.
    pub const DEGENERACY_TOLERANCE: f64 = 1e-12;

    /// Returns `None` when the metric is singular or the basis vectors are parallel.
    pub fn new(metric: &Tensor2<f64>, a0: &Vec3<f64>, a1: &Vec3<f64>) -> Option<Self> {
        let det = metric_determinant(metric);
        let scale_sq = metric[0][0] * metric[1][1];
        if !(det > Self::DEGENERACY_TOLERANCE * scale_sq) {
            return None;
        }
        let inv = [
            [metric[1][1] / det, -metric[0][1] / det],
            [-metric[1][0] / det, metric[0][0] / det],
        ];
        let a0c = add(&scale(a0, inv[0][0]), &scale(a1, inv[0][1]));
        let a1c = add(&scale(a0, inv[1][0]), &scale(a1, inv[1][1]));

        let e0 = unit(a0);
        let e1_raw = sub(a1, &scale(&e0, dot(a1, &e0)));
        if dot(&e1_raw, &e1_raw) <= Self::DEGENERACY_TOLERANCE * dot(a1, a1) {
            return None;
        }
        let e1 = unit(&e1_raw);

        Some(Self {
            ea: [
                [dot(&e0, &a0c), dot(&e0, &a1c)],
                [dot(&e1, &a0c), dot(&e1, &a1c)],
            ],
        })
    }

    /// `E T Eᵀ`
    pub fn to_cartesian<T: Real>(&self, t: &Tensor2<T>) -> Tensor2<T> {
        let e = &self.ea;
        let et: Tensor2<T> = std::array::from_fn(|i| {
            std::array::from_fn(|j| t[0][j] * e[i][0] + t[1][j] * e[i][1])
        });
        std::array::from_fn(|i| std::array::from_fn(|j| et[i][0] * e[j][0] + et[i][1] * e[j][1]))
    }
}

pub fn metric_determinant(metric: &Tensor2<f64>) -> f64 {
    metric[0][0] * metric[1][1] - metric[0][1] * metric[1][0]
}

/// Reference-configuration quantities needed to measure deformation at a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceGeometry {
    pub metric: Tensor2<f64>,
    pub curvature: Tensor2<f64>,
    pub frame: LocalCartesianFrame,
}

impl ReferenceGeometry {
    /// `None` signals a degenerate parametrization at this point.
    pub fn new(x: &SurfaceDerivatives<f64>) -> Option<Self> {
        let geometry = shell_geometry(x);
        let frame = LocalCartesianFrame::new(&geometry.metric, &geometry.a0, &geometry.a1)?;
        Some(Self {
            metric: geometry.metric,
            curvature: geometry.curvature,
            frame,
        })
    }

    /// Local-Cartesian Voigt strain `ε̄` and curvature change `κ̄` of a current configuration.
    pub fn cartesian_strains<T: Real>(&self, current: &SurfaceDerivatives<T>) -> ([T; 3], [T; 3]) {
        let geometry = shell_geometry(current);
        let epsilon = membrane_strain(&geometry.metric, &self.metric);
        let kappa = curvature_change(&geometry.curvature, &self.curvature);
        (
            voigt(&self.frame.to_cartesian(&epsilon)),
            voigt(&self.frame.to_cartesian(&kappa)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Cylinder of radius r around the ξ1 axis: x = (r sin ξ0, ξ1, r cos ξ0)
    fn cylinder(r: f64, xi0: f64) -> SurfaceDerivatives<f64> {
        let (s, c) = xi0.sin_cos();
        SurfaceDerivatives {
            d0: [r * c, 0.0, -r * s],
            d1: [0.0, 1.0, 0.0],
            d00: [-r * s, 0.0, -r * c],
            d01: [0.0; 3],
            d11: [0.0; 3],
        }
    }

    fn skewed_plane() -> SurfaceDerivatives<f64> {
        SurfaceDerivatives {
            d0: [2.0, 0.0, 0.0],
            d1: [0.5, 1.5, 0.0],
            d00: [0.0; 3],
            d01: [0.0; 3],
            d11: [0.0; 3],
        }
    }

    #[test]
    fn flat_undeformed_configuration_has_zero_strain() {
        let x = skewed_plane();
        let reference = ReferenceGeometry::new(&x).expect("non-degenerate");
        let (eps, kappa) = reference.cartesian_strains(&x);
        assert_eq!(eps, [0.0; 3]);
        assert_eq!(kappa, [0.0; 3]);
    }

    #[test]
    fn cylinder_curvature_matches_radius() {
        let r = 2.5;
        let g = shell_geometry(&cylinder(r, 0.3));
        // a0 × a1 is the outward normal here, so b00 = −r
        assert_relative_eq!(g.metric[0][0], r * r, epsilon = 1e-12);
        assert_relative_eq!(g.metric[1][1], 1.0);
        assert_relative_eq!(g.metric[0][1], 0.0);
        assert_relative_eq!(g.curvature[0][0], -r, epsilon = 1e-12);
        assert_relative_eq!(g.curvature[1][1], 0.0);
        assert_relative_eq!(g.curvature[0][1], 0.0);
        assert_relative_eq!(dot(&g.a2, &g.a2), 1.0, epsilon = 1e-14);
    }

    #[test]
    fn uniform_stretch_gives_expected_cartesian_strain() {
        let reference_x = skewed_plane();
        let reference = ReferenceGeometry::new(&reference_x).expect("non-degenerate");
        // Stretch by λ along the global x axis: x' = diag(λ,1,1) x
        let lambda = 1.1;
        let mut current = reference_x;
        current.d0[0] *= lambda;
        current.d1[0] *= lambda;

        let (eps, kappa) = reference.cartesian_strains(&current);
        // e0 is aligned with global x, so Green-Lagrange strain ½(λ²−1) along e0 only
        assert_relative_eq!(eps[0], 0.5 * (lambda * lambda - 1.0), epsilon = 1e-12);
        assert_relative_eq!(eps[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(eps[2], 0.0, epsilon = 1e-12);
        assert_eq!(kappa, [0.0; 3]);
    }

    #[test]
    fn cartesian_transform_of_metric_is_identity() {
        let x = skewed_plane();
        let g = shell_geometry(&x);
        let frame = LocalCartesianFrame::new(&g.metric, &g.a0, &g.a1).expect("non-degenerate");
        let identity_cov = frame.to_cartesian(&g.metric);
        assert_relative_eq!(identity_cov[0][0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(identity_cov[1][1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(identity_cov[0][1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn degenerate_parametrization_is_rejected() {
        let x = SurfaceDerivatives {
            d1: [4.0, 0.0, 0.0],
            ..skewed_plane()
        };
        assert!(ReferenceGeometry::new(&x).is_none());
    }

    #[test]
    fn component_layout_roundtrips() {
        let x = cylinder(1.0, 0.7);
        let c = x.to_components();
        assert_eq!(c[3], x.d1[0]);
        assert_eq!(c[7], x.d00[1]);
        assert_eq!(SurfaceDerivatives::from_components(&c), x);
    }
}
