use super::Module;
use crate::modelio::{load_model, save_model};
use crate::tensors::{ShapeError, Tensor, TensorFloat, WithGrad};
use log::{debug, trace};
use rand::Rng;
use std::error::Error;

/// How a given input shape lines up with the bias.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Broadcast {
    /// Input has exactly the bias's shape.
    Exact,
    /// Single-element bias, added to every element of any input.
    Scalar,
    /// Leading batch dimension; the remaining dims flatten to `input_size`.
    Batched { batch: usize },
}

/// Learnable bias layer.
///
/// Performs: `output = input + b`, broadcasting `b` over a leading batch
/// dimension when the input is not bias-shaped.
///
/// The bias gradient is accumulated across calls to
/// [`Module::acc_grad_parameters`] until [`Module::zero_grad_parameters`].
///
/// # Example
/// ```rust
/// use briny_add::nn::{Add, Module};
/// use briny_add::tensor;
///
/// let mut layer = Add::from_bias(tensor!([0.5, 1.5])).unwrap();
/// let x = tensor!([[1.0, 1.0], [2.0, 2.0]]);
///
/// let out = layer.forward(&x).unwrap();
/// assert_eq!(out, &tensor!([[1.5, 2.5], [2.5, 3.5]]));
///
/// layer.acc_grad_parameters(&x, &tensor!([[1.0, 2.0], [3.0, 4.0]]), 1.0).unwrap();
/// assert_eq!(layer.grad_bias(), &tensor!([4.0, 6.0]));
/// ```
#[derive(Debug, Clone)]
pub struct Add<T = f64> {
    input_size: usize,
    bias: WithGrad<Tensor<T>>,
    // scratch for the batch broadcast, all ones when sized
    ones: Tensor<T>,
    output: Tensor<T>,
    grad_input: Tensor<T>,
}

impl<T: TensorFloat> Add<T> {
    /// Creates a bias of `input_size` elements drawn from the thread-local RNG.
    ///
    /// # Panics
    /// Panics if `input_size` is zero.
    #[must_use]
    pub fn new(input_size: usize) -> Self {
        Self::with_rng(input_size, &mut rand::rng())
    }

    /// Creates a bias of `input_size` elements drawn from `rng`.
    ///
    /// # Panics
    /// Panics if `input_size` is zero.
    pub fn with_rng<R: Rng>(input_size: usize, rng: &mut R) -> Self {
        assert!(input_size > 0, "bias must have at least one element");
        debug!("initializing Add layer with input_size={input_size}");
        let mut layer = Self::allocate(input_size);
        layer.reset_with(rng);
        layer
    }

    /// Uses `bias` as the initial bias, with a zeroed gradient.
    ///
    /// # Errors
    /// - [`ShapeError::Rank`] if `bias` is not 1-D
    /// - [`ShapeError::ElementCount`] if `bias` is empty
    pub fn from_bias(bias: Tensor<T>) -> Result<Self, ShapeError> {
        if bias.rank() != 1 {
            return Err(ShapeError::Rank {
                expected: 1,
                found: bias.rank(),
            });
        }
        if bias.is_empty() {
            return Err(ShapeError::ElementCount {
                shape: bias.shape,
                len: 0,
            });
        }
        let mut layer = Self::allocate(bias.numel());
        layer.bias = WithGrad::new(bias);
        Ok(layer)
    }

    fn allocate(input_size: usize) -> Self {
        Self {
            input_size,
            bias: WithGrad::new(Tensor::zeros(vec![input_size])),
            ones: Tensor::empty(),
            output: Tensor::empty(),
            grad_input: Tensor::empty(),
        }
    }

    /// Number of bias elements.
    #[must_use]
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// The bias values.
    #[must_use]
    pub fn bias(&self) -> &Tensor<T> {
        &self.bias.value
    }

    /// The accumulated bias gradient.
    #[must_use]
    pub fn grad_bias(&self) -> &Tensor<T> {
        &self.bias.grad
    }

    /// Output of the last [`Module::forward`].
    #[must_use]
    pub fn output(&self) -> &Tensor<T> {
        &self.output
    }

    /// Result of the last [`Module::backward_input`].
    #[must_use]
    pub fn grad_input(&self) -> &Tensor<T> {
        &self.grad_input
    }

    /// Redraws the bias from `U(-stdv, stdv)`, `stdv = 1 / sqrt(input_size)`,
    /// using the thread-local RNG, and zeroes the gradient.
    pub fn reset(&mut self) {
        self.reset_with(&mut rand::rng());
    }

    /// [`Add::reset`] with an explicit RNG.
    pub fn reset_with<R: Rng>(&mut self, rng: &mut R) {
        let stdv = 1.0 / (self.input_size as f64).sqrt();
        for b in &mut self.bias.value.data {
            *b = T::from_f64(rng.random_range(-stdv..=stdv));
        }
        self.bias.grad.fill(T::ZERO);
        debug!("reset Add bias with stdv={stdv}");
    }

    /// Writes the bias to a `.bpat` file.
    ///
    /// # Errors
    /// Fails on I/O errors.
    pub fn save_bias(&self, path: &str) -> Result<(), Box<dyn Error>> {
        save_model(path, &[self.bias.value.clone()])
    }

    /// Replaces the bias with the single tensor stored at `path` and zeroes the
    /// gradient.
    ///
    /// # Errors
    /// Fails on I/O or validation errors, if the file does not hold exactly one
    /// tensor, or if that tensor's shape differs from the bias. The layer is
    /// unchanged on error.
    pub fn load_bias(&mut self, path: &str) -> Result<(), Box<dyn Error>> {
        let mut tensors = load_model::<T>(path)?;
        if tensors.len() != 1 {
            return Err(format!("expected 1 tensor in {path}, found {}", tensors.len()).into());
        }
        let loaded = tensors.remove(0);
        if loaded.shape != self.bias.value.shape {
            return Err(ShapeError::Mismatch {
                expected: self.bias.value.shape.clone(),
                found: loaded.shape,
            }
            .into());
        }
        self.bias = WithGrad::new(loaded);
        debug!("loaded Add bias from {path}");
        Ok(())
    }

    fn broadcast(&self, shape: &[usize]) -> Result<Broadcast, ShapeError> {
        if self.bias.value.shape == shape {
            return Ok(Broadcast::Exact);
        }
        if self.input_size == 1 {
            return Ok(Broadcast::Scalar);
        }
        match shape.split_first() {
            Some((&batch, rest))
                if !rest.is_empty() && rest.iter().product::<usize>() == self.input_size =>
            {
                Ok(Broadcast::Batched { batch })
            }
            _ => Err(ShapeError::Mismatch {
                expected: self.bias.value.shape.clone(),
                found: shape.to_vec(),
            }),
        }
    }

    fn ensure_ones(&mut self, batch: usize) {
        if self.ones.numel() != batch {
            trace!("rebuilding ones vector for batch size {batch}");
            self.ones.resize(&[batch]);
            self.ones.fill(T::ONE);
        }
    }
}

impl<T: TensorFloat> Module<T> for Add<T> {
    fn forward(&mut self, input: &Tensor<T>) -> Result<&Tensor<T>, ShapeError> {
        let mode = self.broadcast(&input.shape)?;
        self.output.copy_from(input);

        match mode {
            Broadcast::Exact => self.output.add_assign(&self.bias.value)?,
            Broadcast::Scalar => {
                let b = self.bias.value.data[0];
                self.output.map_inplace(move |x| x + b);
            }
            Broadcast::Batched { batch } => {
                self.ensure_ones(batch);
                // output[n, :] += ones[n] * bias
                self.output
                    .view_mut(&[batch, self.input_size])?
                    .addr(T::ONE, &self.ones, &self.bias.value)?;
            }
        }

        Ok(&self.output)
    }

    fn backward_input(
        &mut self,
        _input: &Tensor<T>,
        grad_output: &Tensor<T>,
    ) -> Result<&Tensor<T>, ShapeError> {
        // d(x + b)/dx = I
        self.grad_input.copy_from(grad_output);
        Ok(&self.grad_input)
    }

    fn acc_grad_parameters(
        &mut self,
        input: &Tensor<T>,
        grad_output: &Tensor<T>,
        scale: T,
    ) -> Result<(), ShapeError> {
        // a single-element bias sums the whole gradient, whatever its shape
        let mode = if self.input_size == 1 {
            Broadcast::Scalar
        } else {
            self.broadcast(&input.shape)?
        };

        match mode {
            Broadcast::Scalar => {
                let total = grad_output.sum();
                self.bias.grad.data[0] += scale * total;
                Ok(())
            }
            Broadcast::Exact => self.bias.grad.scaled_add_assign(scale, grad_output),
            Broadcast::Batched { batch } => {
                let flat = grad_output.view(&[batch, self.input_size])?;
                self.ensure_ones(batch);
                // grad_bias += scale * grad_outputᵀ · ones
                self.bias.grad.addmv_t(scale, &flat, &self.ones)
            }
        }
    }

    fn zero_grad_parameters(&mut self) {
        self.bias.grad.fill(T::ZERO);
    }

    fn clear_state(&mut self) {
        debug!("clearing Add scratch buffers");
        self.ones = Tensor::empty();
        self.output = Tensor::empty();
        self.grad_input = Tensor::empty();
    }

    fn parameters(&self) -> (Vec<&Tensor<T>>, Vec<&Tensor<T>>) {
        (vec![&self.bias.value], vec![&self.bias.grad])
    }

    fn parameters_mut(&mut self) -> (Vec<&mut Tensor<T>>, Vec<&mut Tensor<T>>) {
        let WithGrad { value, grad } = &mut self.bias;
        (vec![value], vec![grad])
    }
}
