//! Vector-space interface the nonlinear and Krylov solvers are written against.

use crate::Real;
use crate::solver::state_vec::StateVector;

/// Operations an iterative solver needs from its unknown.
///
/// Binary operations require both operands to share layout; violations are
/// fatal, as in the concrete vector types.
pub trait SolverVector: Sized {
    /// Associated scalar type.
    type Scalar: Copy + PartialOrd + From<f64>;

    /// A defined vector with `self`'s layout and mask, values zeroed.
    fn new_like(&self) -> Self;
    /// Allocate with `other`'s layout.
    fn define_like(&mut self, other: &Self);
    /// Deep copy, defining `self` first if needed.
    fn copy_from(&mut self, src: &Self);
    /// `self ← a·x + b·y`.
    fn lin_comb(&mut self, a: Self::Scalar, x: &Self, b: Self::Scalar, y: &Self);
    /// `self ← self + a·x`.
    fn increment(&mut self, x: &Self, a: Self::Scalar);
    fn scale(&mut self, a: Self::Scalar);
    fn set_value(&mut self, v: Self::Scalar);
    fn zero(&mut self) {
        self.set_value(Self::Scalar::from(0.0));
    }
    /// Global inner product; collective.
    fn dot(&self, other: &Self) -> Self::Scalar;
    /// Compute ‖x‖₂; collective.
    fn norm2(&self) -> Self::Scalar;
}

impl SolverVector for StateVector {
    type Scalar = Real;

    fn new_like(&self) -> Self {
        let mut out = StateVector::with_config(*self.config());
        out.define_like(self);
        out
    }

    fn define_like(&mut self, other: &Self) {
        StateVector::define_like(self, other)
    }

    fn copy_from(&mut self, src: &Self) {
        StateVector::copy_from(self, src)
    }

    fn lin_comb(&mut self, a: Real, x: &Self, b: Real, y: &Self) {
        StateVector::lin_comb(self, a, x, b, y)
    }

    fn increment(&mut self, x: &Self, a: Real) {
        StateVector::increment(self, x, a)
    }

    fn scale(&mut self, a: Real) {
        StateVector::scale(self, a)
    }

    fn set_value(&mut self, v: Real) {
        StateVector::set_value(self, v)
    }

    fn zero(&mut self) {
        StateVector::zero(self)
    }

    fn dot(&self, other: &Self) -> Real {
        self.dot_product(other)
    }

    fn norm2(&self) -> Real {
        StateVector::norm2(self)
    }
}
