//! briny_add: a learnable bias-add layer with batch broadcasting.
//!
//! The crate provides one trainable layer, [`nn::Add`], together with the small
//! tensor and kernel layer it is built on.
//!
//! # Features
//!
//! - Bias initialization from `U(-1/sqrt(n), 1/sqrt(n))`.
//! - Forward pass for bias-shaped inputs and for batched inputs, where the bias
//!   is broadcast across the leading dimension with a rank-1 update.
//! - Split backward pass: input gradient, and parameter gradients that
//!   *accumulate* (with a scale factor) until explicitly zeroed.
//! - Parameter persistence in the `.bpat` format.
//!
//! # Modules
//!
//! - [`tensors`] — Tensor data structure, shape errors and in-place operations.
//! - [`ops`] — Parallel CPU kernels (`axpy`, `ger`, `gemv_t`, ...).
//! - [`nn`] — The [`nn::Module`] contract and the [`nn::Add`] layer.
//! - [`modelio`] — Saving/loading parameters with integrity checks.
//! - [`approx`] — Tolerance-based float comparison for outputs and gradients.
//!
//! # Example
//!
//! ```rust
//! use briny_add::nn::{Add, Module};
//! use briny_add::tensor;
//!
//! let mut layer = Add::from_bias(tensor!([0.1, 0.2, 0.3])).unwrap();
//! let x = tensor!([[1.0, 1.0, 1.0], [2.0, 2.0, 2.0]]);
//! let out = layer.forward(&x).unwrap().clone();
//! assert_eq!(out.shape, vec![2, 3]);
//!
//! let g = tensor!([[1.0, 1.0, 1.0], [1.0, 1.0, 1.0]]);
//! layer.zero_grad_parameters();
//! layer.backward(&x, &g, 1.0).unwrap();
//! assert_eq!(layer.grad_bias(), &tensor!([2.0, 2.0, 2.0]));
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::module_name_repetitions
)]
#![deny(unsafe_code)]

pub mod approx;
pub mod modelio;
pub mod nn;
pub mod ops;
pub mod tensors;
