//! Trainable layers and the contract they share.
//!
//! # Module Contract
//!
//! A [`Module`] owns its parameters and gradient accumulators and exposes the
//! classic split backward pass:
//!
//! 1. [`Module::forward`] computes and caches the output.
//! 2. [`Module::backward_input`] computes `dL/d(input)` from `dL/d(output)`.
//! 3. [`Module::acc_grad_parameters`] *adds* `scale * dL/d(param)` into the
//!    gradient accumulators.
//!
//! Gradients are never zeroed automatically; the training loop calls
//! [`Module::zero_grad_parameters`] between optimizer steps.
//!
//! ## Layers
//!
//! - [`Add`] — learnable bias with batch broadcasting

mod add;
pub use self::add::Add;

use crate::tensors::{ShapeError, Tensor, TensorFloat};

/// An abstraction over all layers of each required function.
pub trait Module<T: TensorFloat> {
    /// Computes the layer output for `input`.
    ///
    /// The returned tensor is a buffer owned by the layer; it stays valid until
    /// the next mutating call.
    ///
    /// # Errors
    /// Returns a [`ShapeError`] if `input` is not a shape the layer accepts.
    fn forward(&mut self, input: &Tensor<T>) -> Result<&Tensor<T>, ShapeError>;

    /// Computes the gradient of the loss with respect to `input`.
    ///
    /// # Errors
    /// Returns a [`ShapeError`] if the shapes are not accepted by the layer.
    fn backward_input(
        &mut self,
        input: &Tensor<T>,
        grad_output: &Tensor<T>,
    ) -> Result<&Tensor<T>, ShapeError>;

    /// Adds `scale * dL/d(param)` into each gradient accumulator.
    ///
    /// Layers without parameters keep the default no-op.
    ///
    /// # Errors
    /// Returns a [`ShapeError`] if the shapes are not accepted by the layer.
    fn acc_grad_parameters(
        &mut self,
        _input: &Tensor<T>,
        _grad_output: &Tensor<T>,
        _scale: T,
    ) -> Result<(), ShapeError> {
        Ok(())
    }

    /// Drops transient buffers. Parameters and gradients are kept.
    fn clear_state(&mut self);

    /// Parameters and their gradient accumulators, index-aligned.
    fn parameters(&self) -> (Vec<&Tensor<T>>, Vec<&Tensor<T>>);

    /// Mutable access to parameters and gradient accumulators, index-aligned.
    fn parameters_mut(&mut self) -> (Vec<&mut Tensor<T>>, Vec<&mut Tensor<T>>);

    /// Zeroes every gradient accumulator.
    fn zero_grad_parameters(&mut self) {
        let (_, grads) = self.parameters_mut();
        for grad in grads {
            grad.fill(T::ZERO);
        }
    }

    /// Full backward pass: accumulates parameter gradients, then returns the
    /// input gradient.
    ///
    /// # Errors
    /// Propagates the first [`ShapeError`] raised by either half.
    fn backward(
        &mut self,
        input: &Tensor<T>,
        grad_output: &Tensor<T>,
        scale: T,
    ) -> Result<&Tensor<T>, ShapeError> {
        self.acc_grad_parameters(input, grad_output, scale)?;
        self.backward_input(input, grad_output)
    }

    /// Plain gradient step on every parameter: `param -= lr * grad`.
    ///
    /// Gradients are left as they are.
    ///
    /// # Errors
    /// Returns a [`ShapeError`] if a parameter and its gradient disagree in shape.
    fn update_parameters(&mut self, lr: T) -> Result<(), ShapeError> {
        let (params, grads) = self.parameters_mut();
        for (param, grad) in params.into_iter().zip(grads) {
            param.scaled_add_assign(T::ZERO - lr, grad)?;
        }
        Ok(())
    }

    /// Total number of learnable elements.
    fn num_parameters(&self) -> usize {
        self.parameters().0.iter().map(|p| p.numel()).sum()
    }
}
