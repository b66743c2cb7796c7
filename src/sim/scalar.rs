//! Numeric abstraction shared by the plant models and the MPC problem.
//!
//! The zone balance and the fan curve are written once over [`Scalar`], so the
//! simulation evaluates them on `f64` and the optimizer differentiates the very
//! same expressions on forward-mode dual numbers.

use std::ops::{Add, Div, Mul, Neg, Sub};

use num_dual::Dual64;

pub trait Scalar:
    Copy
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    fn constant(value: f64) -> Self;

    /// Real part.
    fn value(&self) -> f64;

    fn exp(self) -> Self;

    /// `max(self, 0)`.
    fn positive_part(self) -> Self {
        if self.value() > 0.0 {
            self
        } else {
            Self::constant(0.0)
        }
    }
}

impl Scalar for f64 {
    fn constant(value: f64) -> Self {
        value
    }

    fn value(&self) -> f64 {
        *self
    }

    fn exp(self) -> Self {
        f64::exp(self)
    }
}

impl Scalar for Dual64 {
    fn constant(value: f64) -> Self {
        Dual64::from(value)
    }

    fn value(&self) -> f64 {
        self.re
    }

    fn exp(self) -> Self {
        let e = self.re.exp();
        Dual64::new(e, self.eps * e)
    }
}
