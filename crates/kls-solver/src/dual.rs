//! Hyper-dual numbers for exact first and second derivatives.
//!
//! A hyper-dual number `a + b ε₁ + c ε₂ + d ε₁ε₂` with `ε₁² = ε₂² = 0`
//! propagates, through any composition of arithmetic and `sqrt`, the value,
//! the two directional derivatives along the seeded directions, and the mixed
//! second derivative. Seeding input `i` in `ε₁` and input `j` in `ε₂` yields
//! `∂f/∂xᵢ` in `e1` and `∂²f/∂xᵢ∂xⱼ` in `e12`, free of truncation error.
//!
//! Code that must be differentiated is written once, generically over
//! [`Real`], and evaluated either with `f64` or with [`HyperDual`].

use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Scalar operations needed by the shell kinematics and material law.
pub trait Real:
    Copy
    + Debug
    + Send
    + Sync
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + Mul<f64, Output = Self>
    + Add<f64, Output = Self>
    + Sub<f64, Output = Self>
{
    fn from_f64(value: f64) -> Self;

    /// Real part (the value with all perturbations dropped)
    fn re(self) -> f64;

    fn sqrt(self) -> Self;

    fn zero() -> Self {
        Self::from_f64(0.0)
    }
}

impl Real for f64 {
    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }

    #[inline]
    fn re(self) -> f64 {
        self
    }

    #[inline]
    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HyperDual {
    pub re: f64,
    pub e1: f64,
    pub e2: f64,
    pub e12: f64,
}

impl HyperDual {
    pub const fn constant(re: f64) -> Self {
        Self {
            re,
            e1: 0.0,
            e2: 0.0,
            e12: 0.0,
        }
    }

    /// Independent variable, seeded along `ε₁` and/or `ε₂`.
    pub fn variable(re: f64, seed_e1: bool, seed_e2: bool) -> Self {
        Self {
            re,
            e1: if seed_e1 { 1.0 } else { 0.0 },
            e2: if seed_e2 { 1.0 } else { 0.0 },
            e12: 0.0,
        }
    }

    /// Apply a scalar function given its value and first two derivatives at `re`.
    #[inline]
    fn chain(self, f0: f64, f1: f64, f2: f64) -> Self {
        Self {
            re: f0,
            e1: f1 * self.e1,
            e2: f1 * self.e2,
            e12: f1 * self.e12 + f2 * self.e1 * self.e2,
        }
    }

    #[inline]
    pub fn recip(self) -> Self {
        let inv = 1.0 / self.re;
        self.chain(inv, -inv * inv, 2.0 * inv * inv * inv)
    }
}

impl Real for HyperDual {
    #[inline]
    fn from_f64(value: f64) -> Self {
        Self::constant(value)
    }

    #[inline]
    fn re(self) -> f64 {
        self.re
    }

    #[inline]
    fn sqrt(self) -> Self {
        let s = self.re.sqrt();
        self.chain(s, 0.5 / s, -0.25 / (s * self.re))
    }
}

impl Add for HyperDual {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self {
            re: self.re + rhs.re,
            e1: self.e1 + rhs.e1,
            e2: self.e2 + rhs.e2,
            e12: self.e12 + rhs.e12,
        }
    }
}

impl Sub for HyperDual {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self {
            re: self.re - rhs.re,
            e1: self.e1 - rhs.e1,
            e2: self.e2 - rhs.e2,
            e12: self.e12 - rhs.e12,
        }
    }
}

impl Mul for HyperDual {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self {
            re: self.re * rhs.re,
            e1: self.re * rhs.e1 + self.e1 * rhs.re,
            e2: self.re * rhs.e2 + self.e2 * rhs.re,
            e12: self.re * rhs.e12 + self.e1 * rhs.e2 + self.e2 * rhs.e1 + self.e12 * rhs.re,
        }
    }
}

impl Div for HyperDual {
    type Output = Self;
    #[inline]
    #[allow(clippy::suspicious_arithmetic_impl)]
    fn div(self, rhs: Self) -> Self {
        self * rhs.recip()
    }
}

impl Neg for HyperDual {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self {
            re: -self.re,
            e1: -self.e1,
            e2: -self.e2,
            e12: -self.e12,
        }
    }
}

impl Mul<f64> for HyperDual {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: f64) -> Self {
        Self {
            re: self.re * rhs,
            e1: self.e1 * rhs,
            e2: self.e2 * rhs,
            e12: self.e12 * rhs,
        }
    }
}

impl Add<f64> for HyperDual {
    type Output = Self;
    #[inline]
    fn add(self, rhs: f64) -> Self {
        Self {
            re: self.re + rhs,
            ..self
        }
    }
}

impl Sub<f64> for HyperDual {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: f64) -> Self {
        Self {
            re: self.re - rhs,
            ..self
        }
    }
}

/// Value, gradient and Hessian of `f` at `x`, one hyper-dual pass per pair `i <= j`.
///
/// `N` is small (15 for the shell energy density), so the `N(N+1)/2` passes
/// are cheaper than maintaining a dense Hessian inside every operation.
pub fn gradient_and_hessian<const N: usize>(
    x: &[f64; N],
    f: impl Fn(&[HyperDual; N]) -> HyperDual,
) -> (f64, [f64; N], [[f64; N]; N]) {
    let mut value = 0.0;
    let mut gradient = [0.0; N];
    let mut hessian = [[0.0; N]; N];
    for i in 0..N {
        for j in i..N {
            let seeded: [HyperDual; N] =
                std::array::from_fn(|k| HyperDual::variable(x[k], k == i, k == j));
            let out = f(&seeded);
            if i == j {
                value = out.re;
                gradient[i] = out.e1;
            }
            hessian[i][j] = out.e12;
            hessian[j][i] = out.e12;
        }
    }
    (value, gradient, hessian)
}

/// Value and gradient of `f` at `x`, one pass per input.
pub fn gradient<const N: usize>(
    x: &[f64; N],
    f: impl Fn(&[HyperDual; N]) -> HyperDual,
) -> (f64, [f64; N]) {
    let mut value = 0.0;
    let mut gradient = [0.0; N];
    for i in 0..N {
        let seeded: [HyperDual; N] =
            std::array::from_fn(|k| HyperDual::variable(x[k], k == i, false));
        let out = f(&seeded);
        value = out.re;
        gradient[i] = out.e1;
    }
    (value, gradient)
}
