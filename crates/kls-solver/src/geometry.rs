//! Abstract spline geometry consumed by the assembler.
//!
//! Any spline discretization that is at least C¹ (B-splines, NURBS or
//! T-splines through Bézier extraction) can drive the solver by
//! implementing [`SplineGeometry`]. The solver only needs, per element, a
//! quadrature rule in parametric coordinates and the *polynomial* (unweighted)
//! basis functions with their first and second parametric derivatives; the
//! rational weighting is applied in [`crate::rational`].

/// Integration point in parametric coordinates, weight including the
/// parametric element measure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadraturePoint {
    pub xi: [f64; 2],
    pub weight: f64,
}

/// Nonzero basis functions at one parametric point.
///
/// All vectors are parallel to `indices`: entry `k` belongs to the global
/// basis function `indices[k]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasisEvaluation {
    pub indices: Vec<usize>,
    pub values: Vec<f64>,
    pub d0: Vec<f64>,
    pub d1: Vec<f64>,
    pub d00: Vec<f64>,
    pub d01: Vec<f64>,
    pub d11: Vec<f64>,
}

impl BasisEvaluation {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            indices: Vec::with_capacity(n),
            values: Vec::with_capacity(n),
            d0: Vec::with_capacity(n),
            d1: Vec::with_capacity(n),
            d00: Vec::with_capacity(n),
            d01: Vec::with_capacity(n),
            d11: Vec::with_capacity(n),
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Derivative of local function `k` in slot order `[∂0, ∂1, ∂00, ∂01, ∂11]`
    pub fn slot_derivatives(&self, k: usize) -> [f64; 5] {
        [self.d0[k], self.d1[k], self.d00[k], self.d01[k], self.d11[k]]
    }
}

/// Spline geometry: control points, weights, elements and basis evaluation.
///
/// `Sync` so that elements can be integrated in parallel.
pub trait SplineGeometry: Sync {
    /// Number of global basis functions (= control points)
    fn num_basis(&self) -> usize;

    fn num_elements(&self) -> usize;

    /// Physical (Euclidean, not homogeneous) control point `P_i`
    fn control_point(&self, i: usize) -> [f64; 3];

    /// Rational weight `w_i > 0`
    fn weight(&self, i: usize) -> f64;

    /// Quadrature points of one element
    fn quadrature(&self, element: usize) -> Vec<QuadraturePoint>;

    /// Polynomial basis functions nonzero at `xi` within `element`
    fn evaluate_basis(&self, element: usize, xi: [f64; 2]) -> BasisEvaluation;

    /// Tensor-product dimensions of the control net, if it has one
    fn control_net_dims(&self) -> Option<[usize; 2]> {
        None
    }

    /// Degrees of freedom: three displacement components per basis function
    fn num_dofs(&self) -> usize {
        3 * self.num_basis()
    }
}

/// Global index of displacement component `component` of basis function `basis`
#[inline]
pub const fn dof_index(basis: usize, component: usize) -> usize {
    3 * basis + component
}
