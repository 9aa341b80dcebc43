//! Gauss-Legendre quadrature on intervals and parametric rectangles.

use crate::error::{Result, require};
use crate::geometry::QuadraturePoint;

/// One-dimensional Gauss-Legendre rule on [-1, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct GaussLegendre {
    pub points: Vec<f64>,
    pub weights: Vec<f64>,
}

impl GaussLegendre {
    /// `n`-point rule, exact for polynomials up to degree `2n − 1`
    pub fn new(n: usize) -> Self {
        let mut points = vec![0.0; n];
        let mut weights = vec![0.0; n];
        let nf = n as f64;

        // Roots are symmetric; compute the upper half by Newton iteration.
        for i in 0..n.div_ceil(2) {
            let mut x = (std::f64::consts::PI * (i as f64 + 0.75) / (nf + 0.5)).cos();
            for _ in 0..100 {
                let (p, dp) = legendre(n, x);
                let dx = p / dp;
                x -= dx;
                if dx.abs() < 1e-15 {
                    break;
                }
            }
            let (_, dp) = legendre(n, x);
            let w = 2.0 / ((1.0 - x * x) * dp * dp);
            points[i] = -x;
            points[n - 1 - i] = x;
            weights[i] = w;
            weights[n - 1 - i] = w;
        }
        if n % 2 == 1 {
            points[n / 2] = 0.0;
        }
        Self { points, weights }
    }

    /// Fewest points integrating a polynomial of `degree` exactly
    pub fn for_degree(degree: usize) -> Self {
        Self::new(degree / 2 + 1)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points and weights mapped onto `[a, b]`
    pub fn on_interval(&self, a: f64, b: f64) -> Vec<(f64, f64)> {
        let half = 0.5 * (b - a);
        let mid = 0.5 * (a + b);
        self.points
            .iter()
            .zip(&self.weights)
            .map(|(&x, &w)| (mid + half * x, half * w))
            .collect()
    }

    /// Tensor-product rule on `[u0, u1] × [v0, v1]`, first coordinate fastest
    pub fn on_rectangle(&self, u: [f64; 2], v: [f64; 2]) -> Vec<QuadraturePoint> {
        let pu = self.on_interval(u[0], u[1]);
        let pv = self.on_interval(v[0], v[1]);
        pv.iter()
            .flat_map(|&(y, wy)| {
                pu.iter().map(move |&(x, wx)| QuadraturePoint {
                    xi: [x, y],
                    weight: wx * wy,
                })
            })
            .collect()
    }
}

/// Rule for the requested polynomial degree; degree 0 is rejected.
pub fn rule_for_degree(degree: usize) -> Result<GaussLegendre> {
    require(
        "quadrature_degree",
        degree as f64,
        |d| d >= 1.0,
        "must be at least 1",
    )?;
    Ok(GaussLegendre::for_degree(degree))
}

/// `P_n(x)` and `P_n'(x)` by the three-term recurrence
fn legendre(n: usize, x: f64) -> (f64, f64) {
    let mut p0 = 1.0;
    let mut p1 = x;
    if n == 0 {
        return (1.0, 0.0);
    }
    for k in 2..=n {
        let kf = k as f64;
        let p2 = ((2.0 * kf - 1.0) * x * p1 - (kf - 1.0) * p0) / kf;
        p0 = p1;
        p1 = p2;
    }
    let nf = n as f64;
    let dp = nf * (x * p1 - p0) / (x * x - 1.0);
    (p1, dp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn weights_sum_to_interval_length() {
        for n in 1..=8 {
            let rule = GaussLegendre::new(n);
            assert_eq!(rule.len(), n);
            assert_relative_eq!(rule.weights.iter().sum::<f64>(), 2.0, epsilon = 1e-13);
        }
    }

    #[test]
    fn three_point_rule_matches_tabulated_values() {
        let rule = GaussLegendre::new(3);
        let a = (3.0_f64 / 5.0).sqrt();
        assert_relative_eq!(rule.points[0], -a, epsilon = 1e-14);
        assert_relative_eq!(rule.points[1], 0.0);
        assert_relative_eq!(rule.points[2], a, epsilon = 1e-14);
        assert_relative_eq!(rule.weights[0], 5.0 / 9.0, epsilon = 1e-14);
        assert_relative_eq!(rule.weights[1], 8.0 / 9.0, epsilon = 1e-14);
    }

    #[test]
    fn integrates_polynomials_up_to_design_degree() {
        for degree in 1..=9 {
            let rule = GaussLegendre::for_degree(degree);
            let integral: f64 = rule
                .on_interval(0.0, 2.0)
                .iter()
                .map(|&(x, w)| w * x.powi(degree as i32))
                .sum();
            let exact = 2.0_f64.powi(degree as i32 + 1) / (degree as f64 + 1.0);
            assert_relative_eq!(integral, exact, epsilon = 1e-12 * exact);
        }
    }

    #[test]
    fn rectangle_rule_integrates_bilinear_monomial() {
        let rule = GaussLegendre::for_degree(2);
        let points = rule.on_rectangle([0.0, 1.0], [0.0, 0.5]);
        assert_eq!(points.len(), 4);
        let integral: f64 = points.iter().map(|q| q.weight * q.xi[0] * q.xi[1]).sum();
        assert_relative_eq!(integral, 0.5 * 0.125, epsilon = 1e-14);
    }

    #[test]
    fn zero_degree_is_rejected() {
        assert!(rule_for_degree(0).is_err());
        assert_eq!(rule_for_degree(6).unwrap().len(), 4);
    }
}
