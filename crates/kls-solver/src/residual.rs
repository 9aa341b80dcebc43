//! Residual and consistent tangent of the dynamic shell problem.
//!
//! At the α-level configuration `x = X + y_α` the residual tested with the
//! rational basis function `φ_a` in direction `c` is
//!
//! ```text
//! r[3a+c] = ∫ ∂W/∂g_{3s+c} ∂_s φ_a        (internal, s over derivative slots)
//!         + ∫ ρh φ_a a_α,c                 (inertia)
//!         − ∫ k gap(z_α) φ_a δ_{c2}        (contact)
//! ```
//!
//! with `W` the strain energy density as a function of the 15 parametric
//! derivatives `g` of `x`, and integrals over the reference surface
//! `dA = √det A dξ`. Differentiating with respect to `d_{n+1}` gives the
//! tangent; every α-level quantity contributes its chain-rule factor
//! (`α_f` for displacement, `α_m/(βΔt²)` for acceleration).
//!
//! Assembly is split into a parallel map over elements producing dense
//! local contributions and a serial reduce into the global sparse system.

use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use rayon::prelude::*;

use crate::backend::{LinearSystemData, SparseTripletsF64};
use crate::boundary_conditions::BoundaryConditions;
use crate::contact::ContactPenalty;
use crate::dual::{self, Real};
use crate::error::{Result, SolverError};
use crate::generalized_alpha::AlphaLevel;
use crate::geometry::{SplineGeometry, dof_index};
use crate::kinematics::{
    NUM_COMPONENTS, NUM_SLOTS, ReferenceGeometry, SurfaceDerivatives, metric_determinant,
    shell_geometry,
};
use crate::materials::ShellMaterial;
use crate::rational::RationalBasis;

/// Reference data of one quadrature point, computed once.
#[derive(Debug, Clone)]
struct PointData {
    /// Quadrature weight times reference area element
    weight: f64,
    basis: RationalBasis,
    /// Position of each basis function in the element's basis list
    local: Vec<usize>,
    reference: ReferenceGeometry,
    reference_derivatives: SurfaceDerivatives<f64>,
    reference_position: [f64; 3],
}

#[derive(Debug, Clone)]
struct ElementData {
    /// Global basis functions supported on the element
    basis: Vec<usize>,
    points: Vec<PointData>,
}

/// Dense residual and tangent of one element.
#[derive(Debug, Clone)]
pub struct ElementContribution {
    /// Global dof indices of the local rows/columns
    pub dofs: Vec<usize>,
    pub residual: Vec<f64>,
    /// Row-major `dofs.len() × dofs.len()`
    pub tangent: Vec<f64>,
}

/// Globally assembled residual and tangent with boundary conditions applied.
#[derive(Debug, Clone)]
pub struct AssembledSystem {
    pub residual: DVector<f64>,
    pub tangent: CsrMatrix<f64>,
    pub constrained_dofs: Vec<usize>,
}

impl AssembledSystem {
    pub fn num_dofs(&self) -> usize {
        self.residual.len()
    }

    /// Euclidean norm of the residual
    pub fn residual_norm(&self) -> f64 {
        self.residual.norm()
    }

    /// Newton system `J Δd = −R` in backend form
    pub fn to_linear_system_data(&self) -> LinearSystemData {
        LinearSystemData {
            tangent: SparseTripletsF64::from(&self.tangent),
            rhs: -&self.residual,
            num_dofs: self.num_dofs(),
            constrained_dofs: self.constrained_dofs.clone(),
        }
    }

    /// Tangent-vector product `J v`
    pub fn tangent_mul(&self, v: &DVector<f64>) -> DVector<f64> {
        let mut out = DVector::zeros(self.tangent.nrows());
        for (row_idx, row) in self.tangent.row_iter().enumerate() {
            out[row_idx] = row
                .col_indices()
                .iter()
                .zip(row.values())
                .map(|(&c, &value)| value * v[c])
                .sum();
        }
        out
    }
}

/// Strain energy density of a current configuration relative to a reference point
fn strain_energy<T: Real>(
    material: &ShellMaterial,
    reference: &ReferenceGeometry,
    current: &SurfaceDerivatives<T>,
) -> T {
    let (strain, curvature) = reference.cartesian_strains(current);
    material.energy_density(&strain, &curvature)
}

/// Assembles residual and tangent of the shell problem over a spline geometry.
#[derive(Debug, Clone)]
pub struct ResidualAssembler {
    material: ShellMaterial,
    contact: ContactPenalty,
    bcs: BoundaryConditions,
    num_dofs: usize,
    elements: Vec<ElementData>,
}

impl ResidualAssembler {
    /// Validate the inputs and precompute reference geometry at every
    /// quadrature point.
    ///
    /// Fails with `DegenerateMetric` if the reference parametrization is
    /// singular anywhere.
    pub fn new<G: SplineGeometry + ?Sized>(
        geometry: &G,
        material: ShellMaterial,
        contact: ContactPenalty,
        bcs: BoundaryConditions,
    ) -> Result<Self> {
        material.validate()?;
        contact.validate()?;
        let num_dofs = geometry.num_dofs();
        if bcs.num_dofs() != num_dofs {
            return Err(SolverError::InvalidGeometry(format!(
                "boundary conditions cover {} dofs, geometry has {}",
                bcs.num_dofs(),
                num_dofs
            )));
        }
        if geometry.num_elements() == 0 {
            return Err(SolverError::InvalidGeometry(
                "geometry has no elements".to_string(),
            ));
        }

        let elements = (0..geometry.num_elements())
            .into_par_iter()
            .map(|element| precompute_element(geometry, element))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            elements = elements.len(),
            quadrature_points = elements.iter().map(|e| e.points.len()).sum::<usize>(),
            num_dofs,
            "residual assembler ready"
        );

        Ok(Self {
            material,
            contact,
            bcs,
            num_dofs,
            elements,
        })
    }

    pub fn num_dofs(&self) -> usize {
        self.num_dofs
    }

    pub fn material(&self) -> &ShellMaterial {
        &self.material
    }

    pub fn contact(&self) -> &ContactPenalty {
        &self.contact
    }

    pub fn boundary_conditions(&self) -> &BoundaryConditions {
        &self.bcs
    }

    /// Per-element residual and tangent at an α-level state (parallel map)
    pub fn contributions(&self, level: &AlphaLevel) -> Vec<ElementContribution> {
        self.elements
            .par_iter()
            .map(|element| self.element_contribution(element, level))
            .collect()
    }

    /// Sum element contributions into the global system and apply the
    /// zero-displacement conditions: fixed rows and columns of the tangent
    /// are dropped and replaced by a unit diagonal, fixed residual entries
    /// are zeroed.
    pub fn reduce(&self, contributions: &[ElementContribution]) -> Result<AssembledSystem> {
        let n = self.num_dofs;
        let mut residual = DVector::zeros(n);
        let mut coo = CooMatrix::new(n, n);

        for contribution in contributions {
            let m = contribution.dofs.len();
            if contribution.residual.len() != m || contribution.tangent.len() != m * m {
                return Err(SolverError::InvalidGeometry(format!(
                    "element contribution has {} dofs but {} residual and {} tangent entries",
                    m,
                    contribution.residual.len(),
                    contribution.tangent.len()
                )));
            }
            for (i, &gi) in contribution.dofs.iter().enumerate() {
                residual[gi] += contribution.residual[i];
                if self.bcs.is_fixed(gi) {
                    continue;
                }
                for (j, &gj) in contribution.dofs.iter().enumerate() {
                    if !self.bcs.is_fixed(gj) {
                        coo.push(gi, gj, contribution.tangent[i * m + j]);
                    }
                }
            }
        }

        let constrained_dofs = self.bcs.fixed_indices();
        for &i in &constrained_dofs {
            coo.push(i, i, 1.0);
        }
        self.bcs.zero_fixed(&mut residual);

        let tangent = CsrMatrix::from(&coo);
        tracing::trace!(num_dofs = n, nnz = tangent.nnz(), "global system reduced");

        Ok(AssembledSystem {
            residual,
            tangent,
            constrained_dofs,
        })
    }

    /// Residual and tangent at an α-level state
    pub fn assemble(&self, level: &AlphaLevel) -> Result<AssembledSystem> {
        let contributions = self.contributions(level);
        self.reduce(&contributions)
    }

    /// Total elastic energy `∫ W dA` of a displacement field (homogeneous coefficients)
    pub fn elastic_energy(&self, displacement: &DVector<f64>) -> f64 {
        self.elements
            .par_iter()
            .map(|element| {
                element
                    .points
                    .iter()
                    .map(|point| {
                        let x = point.reference_derivatives + point.basis.derivatives(displacement);
                        point.weight * strain_energy(&self.material, &point.reference, &x)
                    })
                    .sum::<f64>()
            })
            .sum()
    }

    /// Kinetic energy `½ ∫ ρh |v|² dA` of a velocity field (homogeneous coefficients)
    pub fn kinetic_energy(&self, velocity: &DVector<f64>) -> f64 {
        let rho_h = self.material.mass_per_area();
        0.5 * rho_h
            * self
                .elements
                .par_iter()
                .map(|element| {
                    element
                        .points
                        .iter()
                        .map(|point| {
                            let v = point.basis.value(velocity);
                            point.weight * (v[0] * v[0] + v[1] * v[1] + v[2] * v[2])
                        })
                        .sum::<f64>()
                })
                .sum::<f64>()
    }

    /// Gradient of the elastic energy with respect to the homogeneous
    /// displacement coefficients (no boundary conditions applied)
    pub fn internal_force(&self, displacement: &DVector<f64>) -> DVector<f64> {
        let partial: Vec<(Vec<usize>, Vec<f64>)> = self
            .elements
            .par_iter()
            .map(|element| {
                let dofs = element_dofs(element);
                let mut force = vec![0.0; dofs.len()];
                for point in &element.points {
                    let x = point.reference_derivatives + point.basis.derivatives(displacement);
                    let (_, grad) = dual::gradient(&x.to_components(), |g| {
                        strain_energy(
                            &self.material,
                            &point.reference,
                            &SurfaceDerivatives::from_components(g),
                        )
                    });
                    for (ka, &a) in point.local.iter().enumerate() {
                        let da = &point.basis.derivatives[ka];
                        for c in 0..3 {
                            let r: f64 = (0..NUM_SLOTS).map(|s| da[s] * grad[3 * s + c]).sum();
                            force[3 * a + c] += point.weight * r;
                        }
                    }
                }
                (dofs, force)
            })
            .collect();

        let mut global = DVector::zeros(self.num_dofs);
        for (dofs, force) in partial {
            for (i, gi) in dofs.into_iter().enumerate() {
                global[gi] += force[i];
            }
        }
        global
    }

    fn element_contribution(
        &self,
        element: &ElementData,
        level: &AlphaLevel,
    ) -> ElementContribution {
        let dofs = element_dofs(element);
        let m = dofs.len();
        let mut residual = vec![0.0; m];
        let mut tangent = vec![0.0; m * m];

        let alpha_f = level.displacement_factor;
        let rho_h = self.material.mass_per_area();
        let mass_factor = rho_h * level.acceleration_factor;

        for point in &element.points {
            let wq = point.weight;
            let basis = &point.basis;

            // Internal virtual work and its second variation
            let x = point.reference_derivatives + basis.derivatives(&level.displacement);
            let (_, grad, hess) = dual::gradient_and_hessian(&x.to_components(), |g| {
                strain_energy(
                    &self.material,
                    &point.reference,
                    &SurfaceDerivatives::from_components(g),
                )
            });
            add_internal(point, &grad, &hess, wq, alpha_f, m, &mut residual, &mut tangent);

            // Inertia
            if rho_h > 0.0 {
                let acceleration = basis.value(&level.acceleration);
                for (ka, &a) in point.local.iter().enumerate() {
                    let ra = basis.values[ka];
                    for c in 0..3 {
                        residual[3 * a + c] += wq * rho_h * ra * acceleration[c];
                    }
                    for (kb, &b) in point.local.iter().enumerate() {
                        let k = wq * mass_factor * ra * basis.values[kb];
                        for c in 0..3 {
                            tangent[(3 * a + c) * m + 3 * b + c] += k;
                        }
                    }
                }
            }

            // Contact on the vertical component
            let z = point.reference_position[2] + basis.value(&level.displacement)[2];
            if self.contact.is_active(z) {
                let force = self.contact.force_z(z);
                let stiffness = -self.contact.force_derivative(z) * alpha_f;
                for (ka, &a) in point.local.iter().enumerate() {
                    let ra = basis.values[ka];
                    residual[3 * a + 2] -= wq * force * ra;
                    for (kb, &b) in point.local.iter().enumerate() {
                        tangent[(3 * a + 2) * m + 3 * b + 2] +=
                            wq * stiffness * ra * basis.values[kb];
                    }
                }
            }
        }

        ElementContribution {
            dofs,
            residual,
            tangent,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn add_internal(
    point: &PointData,
    grad: &[f64; NUM_COMPONENTS],
    hess: &[[f64; NUM_COMPONENTS]; NUM_COMPONENTS],
    wq: f64,
    alpha_f: f64,
    m: usize,
    residual: &mut [f64],
    tangent: &mut [f64],
) {
    let derivatives = &point.basis.derivatives;
    for (ka, &a) in point.local.iter().enumerate() {
        let da = &derivatives[ka];
        for c in 0..3 {
            let row = 3 * a + c;
            let r: f64 = (0..NUM_SLOTS).map(|s| da[s] * grad[3 * s + c]).sum();
            residual[row] += wq * r;

            // H_a[t][d] = Σ_s ∂_s φ_a H[3s+c][3t+d]
            let mut ha = [0.0; NUM_COMPONENTS];
            for s in 0..NUM_SLOTS {
                let hrow = &hess[3 * s + c];
                for (k, h) in ha.iter_mut().enumerate() {
                    *h += da[s] * hrow[k];
                }
            }
            for (kb, &b) in point.local.iter().enumerate() {
                let db = &derivatives[kb];
                for d in 0..3 {
                    let k: f64 = (0..NUM_SLOTS).map(|t| ha[3 * t + d] * db[t]).sum();
                    tangent[row * m + 3 * b + d] += wq * alpha_f * k;
                }
            }
        }
    }
}

fn element_dofs(element: &ElementData) -> Vec<usize> {
    element
        .basis
        .iter()
        .flat_map(|&i| (0..3).map(move |c| dof_index(i, c)))
        .collect()
}

fn precompute_element<G: SplineGeometry + ?Sized>(
    geometry: &G,
    element: usize,
) -> Result<ElementData> {
    let quadrature = geometry.quadrature(element);
    let mut basis_list: Vec<usize> = Vec::new();
    let mut points = Vec::with_capacity(quadrature.len());

    for q in quadrature {
        let basis = RationalBasis::evaluate(geometry, element, q.xi);
        if basis.is_empty() {
            return Err(SolverError::InvalidGeometry(format!(
                "no basis functions at {:?} in element {}",
                q.xi, element
            )));
        }
        if !(basis.weight.is_finite() && basis.weight > 0.0) {
            return Err(SolverError::InvalidGeometry(format!(
                "non-positive weight field {} in element {}",
                basis.weight, element
            )));
        }

        let reference_derivatives = basis.reference_derivatives(geometry);
        let reference = ReferenceGeometry::new(&reference_derivatives).ok_or_else(|| {
            SolverError::DegenerateMetric {
                element,
                determinant: metric_determinant(&shell_geometry(&reference_derivatives).metric),
            }
        })?;
        let area = metric_determinant(&reference.metric).sqrt();

        let local = basis
            .indices
            .iter()
            .map(|&i| match basis_list.iter().position(|&b| b == i) {
                Some(k) => k,
                None => {
                    basis_list.push(i);
                    basis_list.len() - 1
                }
            })
            .collect();

        points.push(PointData {
            weight: q.weight * area,
            reference_position: basis.reference_position(geometry),
            basis,
            local,
            reference,
            reference_derivatives,
        });
    }

    Ok(ElementData {
        basis: basis_list,
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generalized_alpha::GeneralizedAlphaIntegrator;
    use crate::spline::flat_square;
    use approx::assert_relative_eq;

    fn plate_assembler(density: f64) -> (crate::spline::NurbsSurface, ResidualAssembler) {
        let plate = flat_square(2.0, 2, 1, 4, 1.0).unwrap();
        let material = ShellMaterial::new(0.05, 1.0e3, 0.3, density);
        let bcs = BoundaryConditions::none(plate.num_dofs());
        let assembler =
            ResidualAssembler::new(&plate, material, ContactPenalty::new(1.0e4, 0.0), bcs).unwrap();
        (plate, assembler)
    }

    #[test]
    fn undeformed_plate_at_rest_has_zero_residual() {
        let (plate, assembler) = plate_assembler(10.0);
        let integrator = GeneralizedAlphaIntegrator::new(0.5, 1e-3, plate.num_dofs()).unwrap();
        let system = assembler.assemble(&integrator.alpha_level()).unwrap();
        assert!(system.residual_norm() < 1e-14);
        assert_eq!(system.tangent.nrows(), plate.num_dofs());
    }

    #[test]
    fn zero_contact_stiffness_is_rejected() {
        let plate = flat_square(2.0, 2, 1, 4, 1.0).unwrap();
        let result = ResidualAssembler::new(
            &plate,
            ShellMaterial::default(),
            ContactPenalty::new(0.0, 0.0),
            BoundaryConditions::none(plate.num_dofs()),
        );
        assert!(matches!(
            result,
            Err(SolverError::InvalidParameter { name: "contact_stiffness", .. })
        ));
    }

    #[test]
    fn mass_matrix_integrates_total_mass() {
        let (plate, assembler) = plate_assembler(10.0);
        let n = plate.num_dofs();
        let level = AlphaLevel {
            displacement: DVector::zeros(n),
            acceleration: DVector::zeros(n),
            displacement_factor: 1.0,
            acceleration_factor: 1.0,
        };
        let system = assembler.assemble(&level).unwrap();
        // Flat undeformed plate: tangent is the consistent mass matrix plus a
        // singular stiffness with rigid modes; e_z · (J 1_z) = total mass
        let ones_z = DVector::from_fn(n, |i, _| if i % 3 == 2 { 1.0 } else { 0.0 });
        let total = ones_z.dot(&system.tangent_mul(&ones_z));
        let mass = 10.0 * 0.05 * 4.0;
        assert_relative_eq!(total, mass, epsilon = 1e-9);
    }

    #[test]
    fn kinetic_energy_of_uniform_velocity() {
        let (plate, assembler) = plate_assembler(10.0);
        let v = crate::rational::homogeneous_from_physical(&plate, |_| [0.0, 0.0, -2.0]);
        assert_relative_eq!(
            assembler.kinetic_energy(&v),
            0.5 * 10.0 * 0.05 * 4.0 * 4.0,
            epsilon = 1e-10
        );
    }

    #[test]
    fn rigid_translation_stores_no_elastic_energy() {
        let (plate, assembler) = plate_assembler(0.0);
        let d = crate::rational::homogeneous_from_physical(&plate, |_| [0.3, -0.2, 0.7]);
        assert!(assembler.elastic_energy(&d).abs() < 1e-18);
        assert!(assembler.internal_force(&d).amax() < 1e-12);
    }

    #[test]
    fn fixed_dofs_get_unit_diagonal_and_zero_residual() {
        let plate = flat_square(1.0, 2, 1, 4, 0.0).unwrap();
        let bcs = BoundaryConditions::from_predicate(&plate, |p, _| p[0] < 1e-12);
        let fixed = bcs.fixed_indices();
        let assembler = ResidualAssembler::new(
            &plate,
            ShellMaterial::default(),
            ContactPenalty::new(1.0e4, 0.5),
            bcs,
        )
        .unwrap();
        let integrator = GeneralizedAlphaIntegrator::new(0.5, 1e-3, plate.num_dofs()).unwrap();
        // Plate sits below the contact plane: contact pushes every z-dof
        let system = assembler.assemble(&integrator.alpha_level()).unwrap();
        for &i in &fixed {
            assert_eq!(system.residual[i], 0.0);
            let row = system.tangent.row(i);
            assert_eq!(row.col_indices(), &[i]);
            assert_eq!(row.values(), &[1.0]);
        }
        assert!(system.residual_norm() > 0.0);
    }

    #[test]
    fn mismatched_boundary_conditions_are_rejected() {
        let plate = flat_square(1.0, 2, 1, 4, 0.0).unwrap();
        let result = ResidualAssembler::new(
            &plate,
            ShellMaterial::default(),
            ContactPenalty::default(),
            BoundaryConditions::none(3),
        );
        assert!(matches!(result, Err(SolverError::InvalidGeometry(_))));
    }
}
