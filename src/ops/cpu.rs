//! Parallel CPU tensor kernels
//!
//! # CPU Backend
//!
//! BLAS-flavoured kernels over flat row-major slices. The tensor layer validates
//! shapes and then calls straight into these functions.
//!
//! ## Features
//!
//! - Parallel execution using [`rayon`](https://docs.rs/rayon)
//! - No allocation; every kernel writes into a caller-owned slice
//!
//! ## Implemented Ops
//!
//! - `fill`: set every element
//! - `axpy`: `y += alpha * x`
//! - `map_inplace`: element-wise transform
//! - `sum`: reduce to a scalar
//! - `ger`: rank-1 update `M += alpha * u vᵀ`
//! - `gemv_t`: transposed matrix-vector accumulate `y += alpha * Mᵀ x`

use crate::tensors::TensorFloat;
use rayon::prelude::*;

/// Sets every element of `data` to `value`.
pub fn fill<T: TensorFloat>(data: &mut [T], value: T) {
    data.par_iter_mut().for_each(|x| *x = value);
}

/// Computes `y += alpha * x` element-wise.
///
/// # Example
/// ```rust
/// use briny_add::ops::cpu::axpy;
///
/// let mut y = [1.0, 1.0];
/// axpy(2.0, &[0.5, 1.5], &mut y);
/// assert_eq!(y, [2.0, 4.0]);
/// ```
pub fn axpy<T: TensorFloat>(alpha: T, x: &[T], y: &mut [T]) {
    debug_assert_eq!(x.len(), y.len());
    y.par_iter_mut()
        .zip(x.par_iter())
        .for_each(|(yi, &xi)| *yi += alpha * xi);
}

/// Replaces every element `x` with `f(x)`.
pub fn map_inplace<T, F>(data: &mut [T], f: F)
where
    T: TensorFloat,
    F: Fn(T) -> T + Sync + Send,
{
    data.par_iter_mut().for_each(|x| *x = f(*x));
}

/// Sums every element.
pub fn sum<T: TensorFloat>(data: &[T]) -> T {
    data.par_iter().copied().sum::<T>()
}

/// Rank-1 update of a row-major `u.len() x v.len()` matrix: `m += alpha * u vᵀ`.
///
/// Rows are updated in parallel.
///
/// # Example
/// ```rust
/// use briny_add::ops::cpu::ger;
///
/// let mut m = [0.0; 4];
/// ger(1.0, &[1.0, 2.0], &[3.0, 4.0], &mut m);
/// assert_eq!(m, [3.0, 4.0, 6.0, 8.0]);
/// ```
pub fn ger<T: TensorFloat>(alpha: T, u: &[T], v: &[T], m: &mut [T]) {
    debug_assert_eq!(m.len(), u.len() * v.len());
    if v.is_empty() {
        return;
    }
    m.par_chunks_mut(v.len())
        .zip(u.par_iter())
        .for_each(|(row, &ui)| {
            let s = alpha * ui;
            for (mij, &vj) in row.iter_mut().zip(v) {
                *mij += s * vj;
            }
        });
}

/// Transposed matrix-vector accumulate: `y += alpha * mᵀ x`.
///
/// `m` is row-major `rows x cols`, `x` has `rows` elements and `y` has `cols`.
/// Each output column is reduced in row order on its own thread.
///
/// # Example
/// ```rust
/// use briny_add::ops::cpu::gemv_t;
///
/// // column sums of a 2x3 matrix
/// let m = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
/// let mut y = [0.0; 3];
/// gemv_t(1.0, &m, 2, 3, &[1.0, 1.0], &mut y);
/// assert_eq!(y, [5.0, 7.0, 9.0]);
/// ```
pub fn gemv_t<T: TensorFloat>(alpha: T, m: &[T], rows: usize, cols: usize, x: &[T], y: &mut [T]) {
    debug_assert_eq!(m.len(), rows * cols);
    debug_assert_eq!(x.len(), rows);
    debug_assert_eq!(y.len(), cols);
    y.par_iter_mut().enumerate().for_each(|(j, yj)| {
        let mut acc = T::ZERO;
        for (i, &xi) in x.iter().enumerate() {
            acc += m[i * cols + j] * xi;
        }
        *yj += alpha * acc;
    });
}
