//! # Numeric Kernels
//!
//! Flat-slice kernels backing the [`Tensor`](crate::tensors::Tensor) operations.
//!
//! ## Submodules
//!
//! - [`cpu`] — Multi-threaded CPU kernels built on `rayon`
//!
//! ## Notes
//!
//! - Kernels assume shapes were validated by the caller; they only index
//! - Kernels write their output in place and never allocate
//! - Reductions run in a fixed order per output element, so results are
//!   deterministic for a given input

pub mod cpu;
