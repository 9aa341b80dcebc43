//! Tensor-product NURBS surfaces.
//!
//! A concrete [`SplineGeometry`] built from two knot vectors, a control net
//! (first parametric direction fastest) and positive weights. Basis
//! functions and their first two derivatives are evaluated with the
//! Cox-de Boor recursion in the form of Piegl & Tiller, *The NURBS Book*,
//! algorithm A2.3. Knot insertion (algorithm A5.1, one knot at a time in
//! homogeneous coordinates) refines a surface without changing its shape.

use crate::error::{Result, SolverError, require};
use crate::geometry::{BasisEvaluation, QuadraturePoint, SplineGeometry};
use crate::quadrature::{GaussLegendre, rule_for_degree};
use crate::rational::RationalBasis;

/// Non-decreasing knot vector of a degree-`p` B-spline basis
#[derive(Debug, Clone, PartialEq)]
pub struct KnotVector {
    knots: Vec<f64>,
    degree: usize,
}

impl KnotVector {
    pub fn new(knots: Vec<f64>, degree: usize) -> Result<Self> {
        if degree == 0 {
            return Err(SolverError::InvalidGeometry(
                "spline degree must be at least 1".to_string(),
            ));
        }
        if knots.len() < 2 * (degree + 1) {
            return Err(SolverError::InvalidGeometry(format!(
                "degree {} needs at least {} knots, got {}",
                degree,
                2 * (degree + 1),
                knots.len()
            )));
        }
        if knots.iter().any(|k| !k.is_finite()) || knots.windows(2).any(|w| w[1] < w[0]) {
            return Err(SolverError::InvalidGeometry(
                "knot vector must be finite and non-decreasing".to_string(),
            ));
        }
        Ok(Self { knots, degree })
    }

    /// Open uniform knot vector on [0, 1] with `num_elements` equal spans
    pub fn open_uniform(degree: usize, num_elements: usize) -> Result<Self> {
        if num_elements == 0 {
            return Err(SolverError::InvalidGeometry(
                "at least one element is required".to_string(),
            ));
        }
        let mut knots = vec![0.0; degree + 1];
        knots.extend((1..num_elements).map(|i| i as f64 / num_elements as f64));
        knots.extend(std::iter::repeat_n(1.0, degree + 1));
        Self::new(knots, degree)
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    pub fn num_basis(&self) -> usize {
        self.knots.len() - self.degree - 1
    }

    /// Parametric domain `[U_p, U_{n+1}]`
    pub fn domain(&self) -> [f64; 2] {
        [self.knots[self.degree], self.knots[self.num_basis()]]
    }

    /// Index `k` with `U_k ≤ u < U_{k+1}`, clamped into the domain
    pub fn find_span(&self, u: f64) -> usize {
        let p = self.degree;
        let n = self.num_basis() - 1;
        if u >= self.knots[n + 1] {
            // last non-empty span
            let mut k = n;
            while k > p && self.knots[k] >= self.knots[n + 1] {
                k -= 1;
            }
            return k;
        }
        if u <= self.knots[p] {
            return p;
        }
        let (mut low, mut high) = (p, n + 1);
        let mut mid = (low + high) / 2;
        while u < self.knots[mid] || u >= self.knots[mid + 1] {
            if u < self.knots[mid] {
                high = mid;
            } else {
                low = mid;
            }
            mid = (low + high) / 2;
        }
        mid
    }

    /// Non-empty knot spans as `(span index, [u_start, u_end])`
    pub fn spans(&self) -> Vec<(usize, [f64; 2])> {
        (self.degree..self.num_basis())
            .filter(|&i| self.knots[i + 1] > self.knots[i])
            .map(|i| (i, [self.knots[i], self.knots[i + 1]]))
            .collect()
    }

    /// Greville abscissa of basis function `i`
    pub fn greville(&self, i: usize) -> f64 {
        let p = self.degree;
        self.knots[i + 1..=i + p].iter().sum::<f64>() / p as f64
    }

    /// Derivatives `0..=n` of the `p + 1` functions nonzero on `span`.
    ///
    /// Row `k` holds the `k`-th derivatives of `N_{span−p}, …, N_{span}`;
    /// derivatives above the degree are zero.
    pub fn basis_derivatives(&self, span: usize, u: f64, n: usize) -> Vec<Vec<f64>> {
        let p = self.degree;
        let knots = &self.knots;

        let mut ndu = vec![vec![0.0; p + 1]; p + 1];
        let mut left = vec![0.0; p + 1];
        let mut right = vec![0.0; p + 1];
        ndu[0][0] = 1.0;
        for j in 1..=p {
            left[j] = u - knots[span + 1 - j];
            right[j] = knots[span + j] - u;
            let mut saved = 0.0;
            for r in 0..j {
                ndu[j][r] = right[r + 1] + left[j - r];
                let temp = ndu[r][j - 1] / ndu[j][r];
                ndu[r][j] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }
            ndu[j][j] = saved;
        }

        let mut ders = vec![vec![0.0; p + 1]; n + 1];
        for j in 0..=p {
            ders[0][j] = ndu[j][p];
        }

        let nd = n.min(p);
        let mut a = [vec![0.0; p + 1], vec![0.0; p + 1]];
        for r in 0..=p {
            let (mut s1, mut s2) = (0, 1);
            a[0][0] = 1.0;
            for k in 1..=nd {
                let mut d = 0.0;
                let rk = r as isize - k as isize;
                let pk = p - k;
                if rk >= 0 {
                    a[s2][0] = a[s1][0] / ndu[pk + 1][rk as usize];
                    d = a[s2][0] * ndu[rk as usize][pk];
                }
                let j1 = if rk >= -1 { 1 } else { (-rk) as usize };
                let j2 = if r as isize - 1 <= pk as isize { k - 1 } else { p - r };
                for j in j1..=j2 {
                    let row = (rk + j as isize) as usize;
                    a[s2][j] = (a[s1][j] - a[s1][j - 1]) / ndu[pk + 1][row];
                    d += a[s2][j] * ndu[row][pk];
                }
                if r <= pk {
                    a[s2][k] = -a[s1][k - 1] / ndu[pk + 1][r];
                    d += a[s2][k] * ndu[r][pk];
                }
                ders[k][r] = d;
                std::mem::swap(&mut s1, &mut s2);
            }
        }

        let mut factor = p as f64;
        for (k, row) in ders.iter_mut().enumerate().take(nd + 1).skip(1) {
            for value in row.iter_mut() {
                *value *= factor;
            }
            factor *= (p - k) as f64;
        }
        ders
    }

    /// Insert `u` once; returns the refined knot vector and, for each new
    /// basis function, the blend `(i, α)` meaning `Q = α P_i + (1 − α) P_{i−1}`.
    fn insert(&self, u: f64) -> Result<(KnotVector, Vec<(usize, f64)>)> {
        let [start, end] = self.domain();
        if !(u > start && u < end) {
            return Err(SolverError::InvalidGeometry(format!(
                "knot {} lies outside the open domain ({}, {})",
                u, start, end
            )));
        }
        let p = self.degree;
        let k = self.find_span(u);
        let n = self.num_basis();
        let blends = (0..=n)
            .map(|i| {
                if i + p <= k {
                    (i, 1.0)
                } else if i > k {
                    (i - 1, 1.0)
                } else {
                    let alpha = (u - self.knots[i]) / (self.knots[i + p] - self.knots[i]);
                    (i, alpha)
                }
            })
            .collect();
        let mut knots = self.knots.clone();
        knots.insert(k + 1, u);
        Ok((Self::new(knots, p)?, blends))
    }
}

/// Parametric direction of a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    U,
    V,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ElementSpan {
    span: [usize; 2],
    u: [f64; 2],
    v: [f64; 2],
}

/// Tensor-product NURBS surface with a fixed Gauss rule per element
#[derive(Debug, Clone)]
pub struct NurbsSurface {
    knots_u: KnotVector,
    knots_v: KnotVector,
    points: Vec<[f64; 3]>,
    weights: Vec<f64>,
    quadrature_degree: usize,
    rule: GaussLegendre,
    elements: Vec<ElementSpan>,
}

impl NurbsSurface {
    /// Control points and weights are ordered with the `u` index fastest.
    pub fn new(
        knots_u: KnotVector,
        knots_v: KnotVector,
        points: Vec<[f64; 3]>,
        weights: Vec<f64>,
        quadrature_degree: usize,
    ) -> Result<Self> {
        let expected = knots_u.num_basis() * knots_v.num_basis();
        if points.len() != expected || weights.len() != expected {
            return Err(SolverError::InvalidGeometry(format!(
                "expected {} control points and weights, got {} and {}",
                expected,
                points.len(),
                weights.len()
            )));
        }
        if let Some(i) = weights.iter().position(|w| !(w.is_finite() && *w > 0.0)) {
            return Err(SolverError::InvalidGeometry(format!(
                "weight {} of control point {} must be positive",
                weights[i], i
            )));
        }
        if points.iter().flatten().any(|x| !x.is_finite()) {
            return Err(SolverError::InvalidGeometry(
                "control points must be finite".to_string(),
            ));
        }
        let rule = rule_for_degree(quadrature_degree)?;

        let spans_u = knots_u.spans();
        let elements = knots_v
            .spans()
            .into_iter()
            .flat_map(|(sv, v)| {
                spans_u.iter().map(move |&(su, u)| ElementSpan {
                    span: [su, sv],
                    u,
                    v,
                })
            })
            .collect();

        Ok(Self {
            knots_u,
            knots_v,
            points,
            weights,
            quadrature_degree,
            rule,
            elements,
        })
    }

    pub fn knots(&self, direction: Direction) -> &KnotVector {
        match direction {
            Direction::U => &self.knots_u,
            Direction::V => &self.knots_v,
        }
    }

    pub fn quadrature_degree(&self) -> usize {
        self.quadrature_degree
    }

    /// Element containing the parametric point
    pub fn locate(&self, xi: [f64; 2]) -> Option<usize> {
        let su = self.knots_u.find_span(xi[0]);
        let sv = self.knots_v.find_span(xi[1]);
        self.elements.iter().position(|e| e.span == [su, sv])
    }

    /// Physical point on the surface
    pub fn point(&self, xi: [f64; 2]) -> Option<[f64; 3]> {
        let element = self.locate(xi)?;
        Some(RationalBasis::evaluate(self, element, xi).reference_position(self))
    }

    /// Refine by inserting `values` (each once) in one parametric direction.
    /// The surface is geometrically and parametrically unchanged.
    pub fn insert_knots(&self, direction: Direction, values: &[f64]) -> Result<Self> {
        let (mut knots_u, mut knots_v) = (self.knots_u.clone(), self.knots_v.clone());
        let mut homogeneous: Vec<[f64; 4]> = self
            .points
            .iter()
            .zip(&self.weights)
            .map(|(p, &w)| [w * p[0], w * p[1], w * p[2], w])
            .collect();

        for &value in values {
            let nu = knots_u.num_basis();
            let nv = knots_v.num_basis();
            match direction {
                Direction::U => {
                    let (refined, blends) = knots_u.insert(value)?;
                    homogeneous = (0..nv)
                        .flat_map(|j| {
                            let row = &homogeneous[j * nu..(j + 1) * nu];
                            blends.iter().map(move |&(i, a)| blend_point(row, i, a))
                        })
                        .collect();
                    knots_u = refined;
                }
                Direction::V => {
                    let (refined, blends) = knots_v.insert(value)?;
                    let columns: Vec<Vec<[f64; 4]>> = (0..nu)
                        .map(|i| {
                            let column: Vec<[f64; 4]> =
                                (0..nv).map(|j| homogeneous[j * nu + i]).collect();
                            blends.iter().map(|&(j, a)| blend_point(&column, j, a)).collect()
                        })
                        .collect();
                    homogeneous = (0..nv + 1)
                        .flat_map(|j| columns.iter().map(move |c| c[j]))
                        .collect();
                    knots_v = refined;
                }
            }
        }

        let weights: Vec<f64> = homogeneous.iter().map(|h| h[3]).collect();
        let points = homogeneous
            .iter()
            .map(|h| [h[0] / h[3], h[1] / h[3], h[2] / h[3]])
            .collect();
        Self::new(knots_u, knots_v, points, weights, self.quadrature_degree)
    }
}

fn blend_point(points: &[[f64; 4]], i: usize, alpha: f64) -> [f64; 4] {
    if alpha == 1.0 {
        return points[i];
    }
    std::array::from_fn(|c| alpha * points[i][c] + (1.0 - alpha) * points[i - 1][c])
}

impl SplineGeometry for NurbsSurface {
    fn num_basis(&self) -> usize {
        self.points.len()
    }

    fn num_elements(&self) -> usize {
        self.elements.len()
    }

    fn control_point(&self, i: usize) -> [f64; 3] {
        self.points[i]
    }

    fn weight(&self, i: usize) -> f64 {
        self.weights[i]
    }

    fn quadrature(&self, element: usize) -> Vec<QuadraturePoint> {
        let e = &self.elements[element];
        self.rule.on_rectangle(e.u, e.v)
    }

    fn evaluate_basis(&self, element: usize, xi: [f64; 2]) -> BasisEvaluation {
        let e = &self.elements[element];
        let (p, q) = (self.knots_u.degree(), self.knots_v.degree());
        let nu = self.knots_u.num_basis();
        let du = self.knots_u.basis_derivatives(e.span[0], xi[0], 2);
        let dv = self.knots_v.basis_derivatives(e.span[1], xi[1], 2);

        let mut basis = BasisEvaluation::with_capacity((p + 1) * (q + 1));
        for b in 0..=q {
            for a in 0..=p {
                basis
                    .indices
                    .push((e.span[1] - q + b) * nu + (e.span[0] - p + a));
                basis.values.push(du[0][a] * dv[0][b]);
                basis.d0.push(du[1][a] * dv[0][b]);
                basis.d1.push(du[0][a] * dv[1][b]);
                basis.d00.push(du[2][a] * dv[0][b]);
                basis.d01.push(du[1][a] * dv[1][b]);
                basis.d11.push(du[0][a] * dv[2][b]);
            }
        }
        basis
    }

    fn control_net_dims(&self) -> Option<[usize; 2]> {
        Some([self.knots_u.num_basis(), self.knots_v.num_basis()])
    }
}

/// Flat `side × side` square in the plane `z = height`, degree `degree` in
/// both directions with `num_elements × num_elements` elements.
pub fn flat_square(
    side: f64,
    degree: usize,
    num_elements: usize,
    quadrature_degree: usize,
    height: f64,
) -> Result<NurbsSurface> {
    require("side", side, |s| s > 0.0, "must be positive")?;
    require("height", height, |_| true, "must be finite")?;
    let knots = KnotVector::open_uniform(degree, num_elements)?;
    let n = knots.num_basis();
    let abscissae: Vec<f64> = (0..n).map(|i| side * knots.greville(i)).collect();
    let mut points = Vec::with_capacity(n * n);
    for &y in &abscissae {
        for &x in &abscissae {
            points.push([x, y, height]);
        }
    }
    NurbsSurface::new(knots.clone(), knots, points, vec![1.0; n * n], quadrature_degree)
}

/// Quarter-circle cylindrical panel opening upwards, of `radius` and axial
/// `length` along `y`, whose lowest line sits at `z = height`.
///
/// The arc spans ±45° about the bottom of the cylinder and is exact
/// (rational quadratic, refined by knot insertion); both directions are
/// quadratic with `num_elements × num_elements` elements.
pub fn cylindrical_panel(
    radius: f64,
    length: f64,
    height: f64,
    num_elements: usize,
    quadrature_degree: usize,
) -> Result<NurbsSurface> {
    require("radius", radius, |r| r > 0.0, "must be positive")?;
    require("length", length, |l| l > 0.0, "must be positive")?;
    require("height", height, |_| true, "must be finite")?;

    let half = std::f64::consts::FRAC_1_SQRT_2;
    let axis_z = height + radius;
    let arc = [
        ([-radius * half, axis_z - radius * half], 1.0),
        ([0.0, axis_z - radius * std::f64::consts::SQRT_2], half),
        ([radius * half, axis_z - radius * half], 1.0),
    ];
    let knots_u = KnotVector::open_uniform(2, 1)?;
    let knots_v = KnotVector::open_uniform(2, num_elements)?;
    let nv = knots_v.num_basis();

    let mut points = Vec::with_capacity(3 * nv);
    let mut weights = Vec::with_capacity(3 * nv);
    for j in 0..nv {
        let y = length * knots_v.greville(j);
        for ([x, z], w) in arc {
            points.push([x, y, z]);
            weights.push(w);
        }
    }
    let coarse = NurbsSurface::new(knots_u, knots_v, points, weights, quadrature_degree)?;
    let interior: Vec<f64> = (1..num_elements)
        .map(|i| i as f64 / num_elements as f64)
        .collect();
    coarse.insert_knots(Direction::U, &interior)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn open_uniform_knots_and_spans() {
        let knots = KnotVector::open_uniform(2, 3).unwrap();
        assert_eq!(knots.num_basis(), 5);
        assert_eq!(knots.spans().len(), 3);
        assert_eq!(knots.find_span(0.0), 2);
        assert_eq!(knots.find_span(0.5), 3);
        assert_eq!(knots.find_span(1.0), 4);
        assert_relative_eq!(knots.greville(0), 0.0);
        assert_relative_eq!(knots.greville(4), 1.0);
        assert_relative_eq!(knots.greville(2), 0.5);
    }

    #[test]
    fn rejects_invalid_knot_vectors() {
        assert!(KnotVector::new(vec![0.0, 0.0, 1.0, 1.0], 0).is_err());
        assert!(KnotVector::new(vec![0.0, 0.0, 1.0], 1).is_err());
        assert!(KnotVector::new(vec![0.0, 0.0, 0.5, 0.2, 1.0, 1.0], 1).is_err());
        assert!(KnotVector::open_uniform(2, 0).is_err());
    }

    #[test]
    fn basis_derivatives_form_partition_of_unity() {
        let knots = KnotVector::open_uniform(3, 4).unwrap();
        for &u in &[0.0, 0.1, 0.37, 0.5, 0.99] {
            let span = knots.find_span(u);
            let ders = knots.basis_derivatives(span, u, 2);
            assert_relative_eq!(ders[0].iter().sum::<f64>(), 1.0, epsilon = 1e-14);
            assert!(ders[1].iter().sum::<f64>().abs() < 1e-12);
            assert!(ders[2].iter().sum::<f64>().abs() < 1e-10);
        }
    }

    #[test]
    fn quadratic_bernstein_derivatives() {
        // Single-span quadratic: N = [(1-u)², 2u(1-u), u²]
        let knots = KnotVector::open_uniform(2, 1).unwrap();
        let u = 0.3;
        let ders = knots.basis_derivatives(2, u, 2);
        assert_relative_eq!(ders[0][0], 0.49, epsilon = 1e-15);
        assert_relative_eq!(ders[0][1], 0.42, epsilon = 1e-15);
        assert_relative_eq!(ders[1][0], -1.4, epsilon = 1e-14);
        assert_relative_eq!(ders[1][1], 0.8, epsilon = 1e-14);
        assert_relative_eq!(ders[1][2], 0.6, epsilon = 1e-14);
        assert_relative_eq!(ders[2][0], 2.0, epsilon = 1e-12);
        assert_relative_eq!(ders[2][1], -4.0, epsilon = 1e-12);
        assert_relative_eq!(ders[2][2], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn derivatives_above_degree_vanish() {
        let knots = KnotVector::open_uniform(1, 2).unwrap();
        let ders = knots.basis_derivatives(1, 0.25, 2);
        assert_eq!(ders[2], vec![0.0, 0.0]);
        assert_relative_eq!(ders[1][0], -2.0);
        assert_relative_eq!(ders[1][1], 2.0);
    }

    #[test]
    fn flat_square_maps_parameters_linearly() {
        let square = flat_square(2.0, 2, 3, 4, 0.5).unwrap();
        assert_eq!(square.num_basis(), 25);
        assert_eq!(square.num_elements(), 9);
        assert_eq!(square.control_net_dims(), Some([5, 5]));
        let x = square.point([0.3, 0.8]).unwrap();
        assert_relative_eq!(x[0], 0.6, epsilon = 1e-14);
        assert_relative_eq!(x[1], 1.6, epsilon = 1e-14);
        assert_relative_eq!(x[2], 0.5, epsilon = 1e-14);
    }

    #[test]
    fn quadrature_covers_the_parametric_domain() {
        let square = flat_square(1.0, 2, 3, 4, 0.0).unwrap();
        let area: f64 = (0..square.num_elements())
            .flat_map(|e| square.quadrature(e))
            .map(|q| q.weight)
            .sum();
        assert_relative_eq!(area, 1.0, epsilon = 1e-13);
    }

    #[test]
    fn knot_insertion_preserves_the_surface() {
        let coarse = cylindrical_panel(1.0, 2.0, 0.0, 1, 4).unwrap();
        let fine = coarse.insert_knots(Direction::V, &[0.25, 0.6]).unwrap();
        assert_eq!(fine.control_net_dims(), Some([3, 5]));
        for xi in [[0.1, 0.2], [0.5, 0.5], [0.9, 0.7], [0.33, 0.99]] {
            let a = coarse.point(xi).unwrap();
            let b = fine.point(xi).unwrap();
            for c in 0..3 {
                assert_relative_eq!(a[c], b[c], epsilon = 1e-12);
            }
        }
        assert!(coarse.insert_knots(Direction::U, &[1.0]).is_err());
    }

    #[test]
    fn cylindrical_panel_has_expected_net_and_extent() {
        let panel = cylindrical_panel(2.0, 3.0, 0.5, 3, 4).unwrap();
        assert_eq!(panel.control_net_dims(), Some([5, 5]));
        assert_eq!(panel.num_elements(), 9);
        let bottom = panel.point([0.5, 0.5]).unwrap();
        assert_relative_eq!(bottom[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(bottom[1], 1.5, epsilon = 1e-12);
        assert_relative_eq!(bottom[2], 0.5, epsilon = 1e-12);
        let edge = panel.point([0.0, 0.0]).unwrap();
        assert_relative_eq!(edge[0], -2.0 * std::f64::consts::FRAC_1_SQRT_2, epsilon = 1e-12);
    }

    #[test]
    fn rejects_nonpositive_weights() {
        let knots = KnotVector::open_uniform(1, 1).unwrap();
        let result = NurbsSurface::new(
            knots.clone(),
            knots,
            vec![[0.0; 3]; 4],
            vec![1.0, 1.0, 0.0, 1.0],
            2,
        );
        assert!(matches!(result, Err(SolverError::InvalidGeometry(_))));
    }
}
