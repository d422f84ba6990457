//! Learns a constant offset with a lone `Add` layer and a squared-error loss.
//!
//! Run with `RUST_LOG=debug cargo run --example fit_bias` to see layer logs.

use briny_add::nn::{Add, Module};
use briny_add::tensors::Tensor;
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

const INPUT_SIZE: usize = 4;
const BATCH: usize = 8;
const MICRO_BATCHES: usize = 4;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let target_offset = [0.5, -1.0, 2.0, 0.25];
    let mut rng = StdRng::seed_from_u64(0);
    let mut layer = Add::<f64>::with_rng(INPUT_SIZE, &mut rng);

    println!("Beginning training...");

    for epoch in 0..200 {
        layer.zero_grad_parameters();
        let mut loss = 0.0;

        // accumulate over several micro-batches before one step
        for _ in 0..MICRO_BATCHES {
            let x: Vec<f64> = (0..BATCH * INPUT_SIZE)
                .map(|_| rng.random_range(-1.0..1.0))
                .collect();
            let x = Tensor::new(vec![BATCH, INPUT_SIZE], x);

            let out = layer.forward(&x)?.clone();
            let mut grad = Tensor::zeros(out.shape.clone());
            for (i, (g, (&y, &xi))) in grad
                .data
                .iter_mut()
                .zip(out.data.iter().zip(&x.data))
                .enumerate()
            {
                let diff = y - (xi + target_offset[i % INPUT_SIZE]);
                loss += diff * diff;
                *g = 2.0 * diff / (BATCH * MICRO_BATCHES) as f64;
            }

            layer.backward(&x, &grad, 1.0)?;
        }

        layer.update_parameters(0.1)?;

        if epoch % 50 == 0 {
            println!(
                "EPOCH {epoch}: loss={:.6}",
                loss / (BATCH * MICRO_BATCHES) as f64
            );
        }
    }

    println!("learned bias = {:?}", layer.bias().data);
    layer.clear_state();
    Ok(())
}
