//! Core tensor data structures and operations.
//!
//! # Core Tensor Utilities
//!
//! This module defines the minimal N-dimensional array the layers in this crate
//! operate on: a shape plus flat row-major storage, and the handful of in-place
//! operations a bias layer needs.
//!
//! It supports:
//! - Construction of N-dimensional tensors with shape and row-major data layout
//! - In-place copy, fill, resize, add, scaled add and element-wise maps
//! - Zero-copy reshaped views
//! - BLAS-style rank-1 (`addr`) and transposed matrix-vector (`addmv_t`) accumulation
//! - Compile-time tensor literals through the `tensor!` macro
//!
//! ## Design Highlights
//! - Tensors are generic over [`TensorFloat`] (`f32` or `f64`)
//! - Shape is stored as a `Vec<usize>` and enforced at runtime
//! - Every fallible operation checks shapes *before* writing, so a returned
//!   [`ShapeError`] means the destination is untouched
//! - `WithGrad<T>` pairs any value with its gradient
//!
//! ## Limitations
//! - Row-major only
//! - No implicit broadcasting; callers pick the broadcast explicitly
//!
//! ## Example
//!
//! ```rust
//! use briny_add::tensors::Tensor;
//! let t = Tensor::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
//! assert_eq!(t.shape, vec![2, 3]);
//! assert_eq!(t.size(1), 3);
//! ```

use crate::ops::cpu;
use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign, Mul, Sub};

/// Floating point element type usable in a [`Tensor`].
///
/// Implemented for `f32` and `f64`. Literals and scale factors enter the
/// element domain through [`TensorFloat::from_f64`].
pub trait TensorFloat:
    Copy
    + Send
    + Sync
    + Default
    + PartialOrd
    + fmt::Debug
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + AddAssign
    + Sum
    + 'static
{
    /// Additive identity.
    const ZERO: Self;
    /// Multiplicative identity.
    const ONE: Self;

    /// Converts an `f64` literal into the element type.
    fn from_f64(x: f64) -> Self;

    /// Widens the element to `f64`.
    fn to_f64(self) -> f64;
}

impl TensorFloat for f32 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;

    #[allow(clippy::cast_possible_truncation)]
    fn from_f64(x: f64) -> Self {
        x as Self
    }

    fn to_f64(self) -> f64 {
        f64::from(self)
    }
}

impl TensorFloat for f64 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;

    fn from_f64(x: f64) -> Self {
        x
    }

    fn to_f64(self) -> f64 {
        self
    }
}

/// Shape errors raised by tensor operations.
///
/// Every operation that can fail validates shapes before touching the
/// destination tensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    /// Two operands were required to have identical shapes.
    Mismatch {
        /// Shape of the destination / left operand.
        expected: Vec<usize>,
        /// Shape that was supplied.
        found: Vec<usize>,
    },
    /// A reshape or construction did not preserve the element count.
    ElementCount {
        /// Requested shape.
        shape: Vec<usize>,
        /// Number of elements actually available.
        len: usize,
    },
    /// An operation required a tensor of a specific rank.
    Rank {
        /// Required rank.
        expected: usize,
        /// Supplied rank.
        found: usize,
    },
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mismatch { expected, found } => {
                write!(f, "shape mismatch: expected {expected:?}, found {found:?}")
            }
            Self::ElementCount { shape, len } => {
                write!(f, "shape {shape:?} is incompatible with {len} data elements")
            }
            Self::Rank { expected, found } => {
                write!(f, "expected a rank-{expected} tensor, found rank {found}")
            }
        }
    }
}

impl std::error::Error for ShapeError {}

/// Represents an N-dimensional tensor with a shape and flat row-major data.
///
/// - All elements must be the same type (`T`).
/// - `shape` defines the structure, e.g., `[2, 3]` for a 2x3 matrix.
/// - `data` holds the flattened content in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    pub shape: Vec<usize>,
    pub data: Vec<T>,
}

/// Double precision tensor, the default element type of the crate.
pub type Ten64 = Tensor<f64>;

/// Single precision tensor.
pub type Ten32 = Tensor<f32>;

impl<T> Tensor<T> {
    /// Creates a new tensor with the given shape and flat data.
    ///
    /// # Panics
    /// Panics if the number of elements in `data` does not match the shape product.
    pub fn new(shape: impl Into<Vec<usize>>, data: Vec<T>) -> Self {
        let shape = shape.into();
        assert_eq!(
            shape.iter().product::<usize>(),
            data.len(),
            "shape {:?} is incompatible with {} data elements",
            shape,
            data.len()
        );
        Self { shape, data }
    }

    /// Fallible form of [`Tensor::new`].
    ///
    /// # Errors
    /// Returns [`ShapeError::ElementCount`] if `data` does not fill `shape`.
    pub fn try_new(shape: impl Into<Vec<usize>>, data: Vec<T>) -> Result<Self, ShapeError> {
        let shape = shape.into();
        if shape.iter().product::<usize>() != data.len() {
            return Err(ShapeError::ElementCount {
                shape,
                len: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// Creates a tensor with no elements and shape `[0]`.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            shape: vec![0],
            data: Vec::new(),
        }
    }

    /// Total element count.
    #[must_use]
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Whether the tensor holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of dimensions.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Size along dimension `dim`.
    ///
    /// # Panics
    /// Panics if `dim` is out of range.
    #[must_use]
    pub fn size(&self, dim: usize) -> usize {
        self.shape[dim]
    }

    /// Borrows the data under a different shape without copying.
    ///
    /// # Errors
    /// Returns [`ShapeError::ElementCount`] if `shape` does not hold exactly
    /// `numel()` elements.
    pub fn view(&self, shape: &[usize]) -> Result<TensorView<'_, T>, ShapeError> {
        if shape.iter().product::<usize>() != self.data.len() {
            return Err(ShapeError::ElementCount {
                shape: shape.to_vec(),
                len: self.data.len(),
            });
        }
        Ok(TensorView {
            shape: shape.to_vec(),
            data: &self.data,
        })
    }

    /// Mutable counterpart of [`Tensor::view`].
    ///
    /// # Errors
    /// Returns [`ShapeError::ElementCount`] if the element count differs.
    pub fn view_mut(&mut self, shape: &[usize]) -> Result<TensorViewMut<'_, T>, ShapeError> {
        if shape.iter().product::<usize>() != self.data.len() {
            return Err(ShapeError::ElementCount {
                shape: shape.to_vec(),
                len: self.data.len(),
            });
        }
        Ok(TensorViewMut {
            shape: shape.to_vec(),
            data: &mut self.data,
        })
    }

    fn check_same_shape(&self, other: &[usize]) -> Result<(), ShapeError> {
        if self.shape != other {
            return Err(ShapeError::Mismatch {
                expected: self.shape.clone(),
                found: other.to_vec(),
            });
        }
        Ok(())
    }
}

impl<T: TensorFloat> Tensor<T> {
    /// Creates a zero-filled tensor.
    pub fn zeros(shape: impl Into<Vec<usize>>) -> Self {
        Self::filled(shape, T::ZERO)
    }

    /// Creates a tensor with every element equal to `value`.
    pub fn filled(shape: impl Into<Vec<usize>>, value: T) -> Self {
        let shape = shape.into();
        let len = shape.iter().product();
        Self {
            shape,
            data: vec![value; len],
        }
    }

    /// Sets every element to `value`.
    pub fn fill(&mut self, value: T) {
        cpu::fill(&mut self.data, value);
    }

    /// Changes the shape, reallocating only when the element count differs.
    ///
    /// Surviving elements keep their values; new elements are zero.
    pub fn resize(&mut self, shape: &[usize]) {
        let len = shape.iter().product();
        if len != self.data.len() {
            self.data.resize(len, T::ZERO);
        }
        if self.shape != shape {
            self.shape = shape.to_vec();
        }
    }

    /// Resizes to `src`'s shape and copies its data.
    pub fn copy_from(&mut self, src: &Tensor<T>) {
        self.resize(&src.shape);
        self.data.copy_from_slice(&src.data);
    }

    /// `self += other`, element-wise.
    ///
    /// # Errors
    /// Returns [`ShapeError::Mismatch`] unless both shapes are identical.
    pub fn add_assign(&mut self, other: &Tensor<T>) -> Result<(), ShapeError> {
        self.scaled_add_assign(T::ONE, other)
    }

    /// `self += alpha * other`, element-wise.
    ///
    /// # Errors
    /// Returns [`ShapeError::Mismatch`] unless both shapes are identical.
    pub fn scaled_add_assign(&mut self, alpha: T, other: &Tensor<T>) -> Result<(), ShapeError> {
        self.check_same_shape(&other.shape)?;
        cpu::axpy(alpha, &other.data, &mut self.data);
        Ok(())
    }

    /// Applies `f` to every element in place.
    pub fn map_inplace<F>(&mut self, f: F)
    where
        F: Fn(T) -> T + Sync + Send,
    {
        cpu::map_inplace(&mut self.data, f);
    }

    /// Sum of every element.
    #[must_use]
    pub fn sum(&self) -> T {
        cpu::sum(&self.data)
    }

    /// Rank-1 update of a matrix: `self += alpha * u vᵀ`.
    ///
    /// `self` must be `[u.len(), v.len()]`.
    ///
    /// # Errors
    /// - [`ShapeError::Rank`] if `self`, `u` or `v` has the wrong rank
    /// - [`ShapeError::Mismatch`] if the outer product does not fit `self`
    pub fn addr(&mut self, alpha: T, u: &Tensor<T>, v: &Tensor<T>) -> Result<(), ShapeError> {
        let shape = self.shape.clone();
        self.view_mut(&shape)?.addr(alpha, u, v)
    }

    /// Transposed matrix-vector accumulation: `self += alpha * mᵀ x`.
    ///
    /// `m` is `[rows, cols]`, `x` is `[rows]`, `self` is `[cols]`.
    ///
    /// # Errors
    /// - [`ShapeError::Rank`] if an operand has the wrong rank
    /// - [`ShapeError::Mismatch`] if dimensions do not line up
    pub fn addmv_t(
        &mut self,
        alpha: T,
        m: &TensorView<'_, T>,
        x: &Tensor<T>,
    ) -> Result<(), ShapeError> {
        if self.rank() != 1 {
            return Err(ShapeError::Rank {
                expected: 1,
                found: self.rank(),
            });
        }
        if m.shape.len() != 2 {
            return Err(ShapeError::Rank {
                expected: 2,
                found: m.shape.len(),
            });
        }
        if x.rank() != 1 {
            return Err(ShapeError::Rank {
                expected: 1,
                found: x.rank(),
            });
        }
        let (rows, cols) = (m.shape[0], m.shape[1]);
        if x.numel() != rows || self.numel() != cols {
            return Err(ShapeError::Mismatch {
                expected: vec![rows, cols],
                found: vec![x.numel(), self.numel()],
            });
        }
        cpu::gemv_t(alpha, m.data, rows, cols, &x.data, &mut self.data);
        Ok(())
    }
}

/// A borrowed, reshaped view of a tensor's data.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorView<'a, T> {
    pub shape: Vec<usize>,
    pub data: &'a [T],
}

/// A mutable, reshaped view of a tensor's data.
#[derive(Debug, PartialEq)]
pub struct TensorViewMut<'a, T> {
    pub shape: Vec<usize>,
    pub data: &'a mut [T],
}

impl<T: TensorFloat> TensorViewMut<'_, T> {
    /// Rank-1 update through the view: `self += alpha * u vᵀ`.
    ///
    /// # Errors
    /// - [`ShapeError::Rank`] if the view is not 2-D or `u`/`v` are not 1-D
    /// - [`ShapeError::Mismatch`] if `[u.len(), v.len()]` is not the view's shape
    pub fn addr(&mut self, alpha: T, u: &Tensor<T>, v: &Tensor<T>) -> Result<(), ShapeError> {
        if self.shape.len() != 2 {
            return Err(ShapeError::Rank {
                expected: 2,
                found: self.shape.len(),
            });
        }
        for operand in [u, v] {
            if operand.rank() != 1 {
                return Err(ShapeError::Rank {
                    expected: 1,
                    found: operand.rank(),
                });
            }
        }
        let outer = [u.numel(), v.numel()];
        if self.shape != outer {
            return Err(ShapeError::Mismatch {
                expected: self.shape.clone(),
                found: outer.to_vec(),
            });
        }
        cpu::ger(alpha, &u.data, &v.data, self.data);
        Ok(())
    }
}

/// A container for tracking gradients of values (used in autograd).
///
/// Typically used as `WithGrad<Tensor<f64>>` or `WithGrad<f64>`.
#[derive(Debug, Clone)]
pub struct WithGrad<T> {
    pub value: T,
    pub grad: T,
}

impl<T: TensorFloat> WithGrad<Tensor<T>> {
    /// Wraps a tensor with a zero gradient of the same shape.
    pub fn new(value: Tensor<T>) -> Self {
        let grad = Tensor::zeros(value.shape.clone());
        Self { value, grad }
    }
}

/// Defines a tensor from nested literal arrays.
///
/// Supports arbitrary dimensionality as long as sublists are uniform in shape.
///
/// # Example
/// ```
/// use briny_add::tensor;
/// let t = tensor!([[1.0, 2.0], [3.0, 4.0]]);
/// assert_eq!(t.shape, vec![2, 2]);
/// ```
#[macro_export]
macro_rules! tensor {
    ($lit:literal) => {
        $crate::tensors::Tensor::new(Vec::<usize>::new(), vec![$lit])
    };

    ([ $( $inner:tt ),+ $(,)? ]) => {{
        let children = vec![ $( $crate::tensor!($inner) ),+ ];
        let first_shape = &children[0].shape;
        assert!(children.iter().all(|c| c.shape == *first_shape),
            "ragged tensor literal (rows have mismatched shapes)");
        let mut shape = vec![children.len()];
        shape.extend_from_slice(first_shape);
        let mut data = Vec::with_capacity(children.len() * children[0].data.len());
        for c in children { data.extend(c.data); }
        $crate::tensors::Tensor::new(shape, data)
    }};
}
