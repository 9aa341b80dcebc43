//! Homogeneous Dirichlet conditions on control-point degrees of freedom.
//!
//! A dof is fixed to zero displacement by a predicate over its control
//! point's physical coordinates and the displacement component. Fixed dofs
//! keep their value through the Newton iteration: their residual entries are
//! zeroed and their tangent rows and columns replaced by the identity.

use std::collections::BTreeSet;

use nalgebra::DVector;

use crate::geometry::{SplineGeometry, dof_index};

/// Degree of freedom index (0-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DofId {
    /// Basis function (control point) index
    pub basis: usize,
    /// Displacement component (0 = x, 1 = y, 2 = z)
    pub component: usize,
}

impl DofId {
    pub fn new(basis: usize, component: usize) -> Self {
        Self { basis, component }
    }

    /// Position in the global dof vector
    pub fn index(&self) -> usize {
        dof_index(self.basis, self.component)
    }
}

/// Set of dofs fixed to zero
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundaryConditions {
    num_dofs: usize,
    fixed: BTreeSet<usize>,
}

impl BoundaryConditions {
    /// No constraints on a system of `num_dofs` unknowns
    pub fn none(num_dofs: usize) -> Self {
        Self {
            num_dofs,
            fixed: BTreeSet::new(),
        }
    }

    /// Fix every dof whose control point and component satisfy `predicate`
    pub fn from_predicate<G: SplineGeometry + ?Sized>(
        geometry: &G,
        predicate: impl Fn(&[f64; 3], usize) -> bool,
    ) -> Self {
        let mut bcs = Self::none(geometry.num_dofs());
        for basis in 0..geometry.num_basis() {
            let point = geometry.control_point(basis);
            for component in 0..3 {
                if predicate(&point, component) {
                    bcs.fix(DofId::new(basis, component));
                }
            }
        }
        tracing::debug!(
            fixed = bcs.fixed.len(),
            total = bcs.num_dofs,
            "boundary conditions marked"
        );
        bcs
    }

    /// Fix all three components of every control point strictly below `z`
    pub fn below_height<G: SplineGeometry + ?Sized>(geometry: &G, z: f64) -> Self {
        Self::from_predicate(geometry, |p, _| p[2] < z)
    }

    pub fn fix(&mut self, dof: DofId) {
        let index = dof.index();
        if index < self.num_dofs {
            self.fixed.insert(index);
        }
    }

    pub fn is_fixed(&self, index: usize) -> bool {
        self.fixed.contains(&index)
    }

    pub fn num_fixed(&self) -> usize {
        self.fixed.len()
    }

    pub fn num_dofs(&self) -> usize {
        self.num_dofs
    }

    /// Fixed global indices in ascending order
    pub fn fixed_indices(&self) -> Vec<usize> {
        self.fixed.iter().copied().collect()
    }

    /// Zero the fixed entries of `values`
    pub fn zero_fixed(&self, values: &mut DVector<f64>) {
        for &i in &self.fixed {
            values[i] = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spline::flat_square;

    #[test]
    fn predicate_marks_edge_dofs() {
        let square = flat_square(1.0, 2, 2, 4, 0.0).unwrap();
        // x = 0 edge: 4 control points per edge for a 4x4 net
        let bcs = BoundaryConditions::from_predicate(&square, |p, _| p[0] < 1e-12);
        assert_eq!(bcs.num_dofs(), 48);
        assert_eq!(bcs.num_fixed(), 12);
        assert!(bcs.is_fixed(DofId::new(0, 2).index()));
        assert!(!bcs.is_fixed(DofId::new(1, 0).index()));
    }

    #[test]
    fn predicate_can_select_components() {
        let square = flat_square(1.0, 1, 1, 2, 0.0).unwrap();
        let bcs = BoundaryConditions::from_predicate(&square, |_, c| c == 2);
        assert_eq!(bcs.fixed_indices(), vec![2, 5, 8, 11]);
    }

    #[test]
    fn below_height_fixes_nothing_on_raised_plate() {
        let square = flat_square(1.0, 1, 1, 2, 0.1).unwrap();
        assert_eq!(BoundaryConditions::below_height(&square, 0.05).num_fixed(), 0);
        assert_eq!(BoundaryConditions::below_height(&square, 0.2).num_fixed(), 12);
    }

    #[test]
    fn zero_fixed_clears_only_constrained_entries() {
        let mut bcs = BoundaryConditions::none(6);
        bcs.fix(DofId::new(1, 0));
        bcs.fix(DofId::new(5, 0)); // out of range, ignored
        let mut v = DVector::from_element(6, 1.0);
        bcs.zero_fixed(&mut v);
        assert_eq!(v.as_slice(), &[1.0, 1.0, 1.0, 0.0, 1.0, 1.0]);
        assert_eq!(bcs.num_fixed(), 1);
    }
}
