//! Utilities to approximate equality of floating point values.
//!
//! Used to compare layer outputs and gradients, where exact equality would
//! depend on summation order.

use crate::tensors::Tensor;

/// The max epsilon accepted on `f32`s.
pub const F32_MAX_ERROR: f32 = 1e-3;

/// The expected minimum epsilon accepted on `f32`s.
pub const F32_AVG_ERROR: f32 = 1e-5;

/// The best expected epsilon accepted on `f32`s.
pub const F32_MIN_ERROR: f32 = 1e-6;

/// The max epsilon accepted on `f64`s.
pub const F64_MAX_ERROR: f64 = 1e-3;

/// The expected minimum epsilon accepted on `f64`s.
pub const F64_AVG_ERROR: f64 = 1e-6;

/// The best expected epsilon accepted on `f64`s.
pub const F64_MIN_ERROR: f64 = 1e-13;

/// The approximated equality enumerated, from best to worst.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ApproxEquality {
    /// Very strong epsilon.
    Precise = 0,

    /// Good epsilon.
    Partial = 1,

    /// Acceptable epsilon
    Relative = 2,

    /// No relative equality.
    Scarce = 3,
}

/// Checks the distance between two values against fixed epsilons.
pub trait RelativeEq<Rhs: ?Sized> {
    /// Enumerates the equality of `self` and `rhs`.
    fn approx_eq(&self, rhs: &Rhs) -> ApproxEquality;
}

macro_rules! impl_relative_eq {
    ($t:ty, $min:expr, $avg:expr, $max:expr) => {
        impl RelativeEq<Self> for $t {
            fn approx_eq(&self, rhs: &Self) -> ApproxEquality {
                let dif = (self - rhs).abs();

                if dif < $min {
                    ApproxEquality::Precise
                } else if dif < $avg {
                    ApproxEquality::Partial
                } else if dif < $max {
                    ApproxEquality::Relative
                } else {
                    ApproxEquality::Scarce
                }
            }
        }
    };
}

impl_relative_eq!(f32, F32_MIN_ERROR, F32_AVG_ERROR, F32_MAX_ERROR);
impl_relative_eq!(f64, F64_MIN_ERROR, F64_AVG_ERROR, F64_MAX_ERROR);

impl<T: RelativeEq<U>, U> RelativeEq<[U]> for [T] {
    fn approx_eq(&self, rhs: &[U]) -> ApproxEquality {
        if self.len() != rhs.len() {
            return ApproxEquality::Scarce;
        }
        // the worst element decides
        self.iter()
            .zip(rhs)
            .map(|(a, b)| a.approx_eq(b))
            .max()
            .unwrap_or(ApproxEquality::Precise)
    }
}

impl<const N: usize, T: RelativeEq<U>, U> RelativeEq<[U; N]> for [T; N] {
    fn approx_eq(&self, rhs: &[U; N]) -> ApproxEquality {
        self.as_slice().approx_eq(rhs.as_slice())
    }
}

impl<T: RelativeEq<T>> RelativeEq<Self> for Tensor<T> {
    fn approx_eq(&self, rhs: &Self) -> ApproxEquality {
        if self.shape != rhs.shape {
            return ApproxEquality::Scarce;
        }
        self.data.as_slice().approx_eq(rhs.data.as_slice())
    }
}

/// Approximates equality based off the absolute difference.
///
/// # Example
/// ```rust
/// use briny_add::approx::approx_eq;
///
/// assert!(approx_eq(&(0.1 + 0.2), &0.3));
/// assert!(!approx_eq(&[1.0, 2.0][..], &[1.0][..]));
/// ```
pub fn approx_eq<A: RelativeEq<B> + ?Sized, B: ?Sized>(a: &A, b: &B) -> bool {
    a.approx_eq(b) == ApproxEquality::Precise
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worst_element_decides() {
        let a = [1.0f64, 2.0, 3.0];
        let b = [1.0f64, 2.5, 3.0];
        assert_eq!(a.approx_eq(&b), ApproxEquality::Scarce);
        assert_eq!(a.approx_eq(&a), ApproxEquality::Precise);
    }

    #[test]
    fn tensors_with_different_shapes_are_not_equal() {
        let a = Tensor::new(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]);
        let b = Tensor::new(vec![4], vec![1.0, 2.0, 3.0, 4.0]);
        assert!(!approx_eq(&a, &b));
        assert!(approx_eq(&a, &a.clone()));
    }
}
