//! Saving/loading of layer parameters.
//!
//! # `.bpat` Parameter Serialization Format
//!
//! Minimal utilities for saving and loading tensors in a compact binary format.
//! Layers use it to persist their parameters, e.g. [`Add::save_bias`].
//!
//! [`Add::save_bias`]: crate::nn::Add::save_bias
//!
//! # Format Overview
//!
//! A `.bpat` file stores one or more tensors in the following layout:
//!
//! ```text
//! ┌────────────┬────────────┬─────────────────────┐
//! │ Header     │ Tensor N   │ Tensor N+1 …        │
//! ├────────────┼────────────┼─────────────────────┤
//! │ "bpat"[4]  │ u64: ndim  │ u64: ndim           │
//! │ u8: count  │ [u64; ndim] shape                │
//! │            │ [f64; prod(shape)] data          │
//! └────────────┴──────────────────────────────────┘
//! ```
//!
//! ## Header
//! - `bpat` magic (4 bytes): ensures file is recognized
//! - `u8` tensor count: number of tensors to read
//!
//! ## Tensor Encoding
//! For each tensor:
//! - `ndim` (`u64`): number of dimensions
//! - `shape` (`u64 * ndim`): each dimension size
//! - `data` (`f64 * prod(shape)`): flattened, row-major tensor data
//!
//! Elements are always stored as little-endian `f64`; `f32` tensors are
//! widened on save and narrowed on load.
//!
//! # Limitations
//! - Maximum 255 tensors per file (due to `u8` count limit)
//! - No per-tensor metadata (names, dtypes, etc.)
//!
//! # Example
//!
//! ```rust
//! use briny_add::tensors::Tensor;
//! use briny_add::modelio::{save_model, load_model};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let path = std::env::temp_dir().join("briny_add_doc_model.bpat");
//!     let path = path.to_str().unwrap();
//!     let tensor = Tensor::new(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]);
//!
//!     save_model(path, &[tensor.clone()])?;
//!     let tensors = load_model::<f64>(path)?;
//!     assert_eq!(tensors, vec![tensor]);
//!
//!     Ok(())
//! }
//! ```

use crate::tensors::{Tensor, TensorFloat};
use briny::prelude::*;
use std::error::Error;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};

const BPAT_MAGIC: &[u8; 4] = b"bpat";

/// Upper bound on elements reserved up front while reading.
const MAX_PREALLOC: usize = 1 << 16;

/// Internal representation of a packed tensor.
struct PackedTensor {
    shape: Vec<u64>,
    data: Vec<f64>,
}

impl Validate for PackedTensor {
    fn validate(&self) -> Result<(), ValidationError> {
        let expected = self
            .shape
            .iter()
            .try_fold(1u64, |acc, &d| acc.checked_mul(d))
            .ok_or(ValidationError)?;
        if self.data.len() as u64 != expected {
            return Err(ValidationError);
        }
        if !self.data.iter().all(|x| x.is_finite()) {
            return Err(ValidationError);
        }
        Ok(())
    }
}

/// Save a list of tensors to a `.bpat` file.
///
/// # Arguments
/// - `path`: Output file path.
/// - `tensors`: Slice of tensors to save.
///
/// # Errors
/// - Returns an error if there are more than 255 tensors.
/// - Returns an error if file I/O or write fails.
pub fn save_model<T: TensorFloat>(path: &str, tensors: &[Tensor<T>]) -> Result<(), Box<dyn Error>> {
    let count = u8::try_from(tensors.len())
        .map_err(|_| format!("cannot store {} tensors in one file", tensors.len()))?;

    let mut file = BufWriter::new(File::create(path)?);

    file.write_all(BPAT_MAGIC)?;
    file.write_all(&[count])?;

    for tensor in tensors {
        let dims = tensor.shape.len() as u64;
        file.write_all(&dims.to_le_bytes())?;

        for &dim in &tensor.shape {
            file.write_all(&(dim as u64).to_le_bytes())?;
        }

        for &val in &tensor.data {
            file.write_all(&val.to_f64().to_le_bytes())?;
        }
    }

    file.flush()?;
    Ok(())
}

/// Load a `.bpat` file containing multiple tensors.
///
/// Every tensor is checked (shape product matches the data, all values finite)
/// before it is returned.
///
/// # Errors
/// - Fails if the file does not start with `bpat`, is truncated, or holds
///   data that does not validate.
pub fn load_model<T: TensorFloat>(path: &str) -> Result<Vec<Tensor<T>>, Box<dyn Error>> {
    let mut file = BufReader::new(File::open(path)?);
    let mut buf8 = [0u8; 8];

    let mut magic = [0u8; 4];
    file.read_exact(&mut magic)?;
    if &magic != BPAT_MAGIC {
        return Err("invalid magic header".into());
    }

    let mut count = [0u8; 1];
    file.read_exact(&mut count)?;
    let count = count[0] as usize;

    let mut tensors = Vec::with_capacity(count);

    for _ in 0..count {
        file.read_exact(&mut buf8)?;
        let ndim = usize::try_from(u64::from_le_bytes(buf8))?;

        let mut shape = Vec::with_capacity(ndim.min(MAX_PREALLOC));
        for _ in 0..ndim {
            file.read_exact(&mut buf8)?;
            shape.push(u64::from_le_bytes(buf8));
        }

        let size = shape
            .iter()
            .try_fold(1u64, |acc, &d| acc.checked_mul(d))
            .ok_or("tensor shape overflows")?;
        let size = usize::try_from(size)?;
        let mut data = Vec::with_capacity(size.min(MAX_PREALLOC));
        for _ in 0..size {
            file.read_exact(&mut buf8)?;
            data.push(f64::from_le_bytes(buf8));
        }

        let trusted = TrustedData::new(PackedTensor { shape, data })?;
        let inner = trusted.into_inner();
        let shape = inner
            .shape
            .iter()
            .map(|&d| usize::try_from(d))
            .collect::<Result<Vec<_>, _>>()?;
        let data = inner.data.into_iter().map(T::from_f64).collect();
        tensors.push(Tensor::try_new(shape, data)?);
    }

    Ok(tensors)
}
