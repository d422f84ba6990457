use briny_add::approx::approx_eq;
use briny_add::nn::{Add, Module};
use briny_add::ops::cpu::gemv_t;
use briny_add::tensor;
use briny_add::tensors::{ShapeError, Tensor};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn temp_path(name: &str) -> String {
    std::env::temp_dir()
        .join(format!("briny_add_{name}_{}.bpat", std::process::id()))
        .to_string_lossy()
        .into_owned()
}

#[test]
fn test_end_to_end_batch_of_two() {
    init();
    let mut layer = Add::from_bias(tensor!([0.1, 0.2, 0.3])).unwrap();
    let x = tensor!([[1.0, 1.0, 1.0], [2.0, 2.0, 2.0]]);
    let g = tensor!([[1.0, 1.0, 1.0], [1.0, 1.0, 1.0]]);

    let out = layer.forward(&x).unwrap();
    assert!(approx_eq(out, &tensor!([[1.1, 1.2, 1.3], [2.1, 2.2, 2.3]])));

    layer.zero_grad_parameters();
    layer.acc_grad_parameters(&x, &g, 1.0).unwrap();
    assert_eq!(layer.grad_bias(), &tensor!([2.0, 2.0, 2.0]));

    let grad_in = layer.backward_input(&x, &g).unwrap();
    assert_eq!(grad_in, &g);
}

#[test]
fn test_forward_exact_shape() {
    let mut layer = Add::from_bias(tensor!([0.5, 0.25])).unwrap();
    let x = tensor!([1.0, 2.0]);
    let out = layer.forward(&x).unwrap();
    assert_eq!(out, &tensor!([1.5, 2.25]));

    let g = Tensor::new(vec![2], vec![3.0, -1.0]);
    assert_eq!(layer.backward_input(&x, &g).unwrap(), &g);
}

#[test]
fn test_forward_batch_with_trailing_dims() {
    let mut layer = Add::from_bias(tensor!([1.0, 2.0, 3.0, 4.0])).unwrap();
    let x = Tensor::new(vec![2, 2, 2], (0..8).map(f64::from).collect());

    let out = layer.forward(&x).unwrap();
    assert_eq!(out.shape, vec![2, 2, 2]);
    assert_eq!(out.data, vec![1.0, 3.0, 5.0, 7.0, 5.0, 7.0, 9.0, 11.0]);
}

#[test]
fn test_forward_leaves_input_and_parameters_untouched() {
    let mut layer = Add::from_bias(Tensor::new(vec![2], vec![1.0, -1.0])).unwrap();
    let x = tensor!([[1.0, 2.0], [3.0, 4.0]]);
    let before = x.clone();

    layer.forward(&x).unwrap();
    assert_eq!(x, before);
    assert_eq!(layer.bias().data, vec![1.0, -1.0]);
    assert_eq!(layer.grad_bias(), &tensor!([0.0, 0.0]));
}

#[test]
fn test_accumulation_is_additive_across_calls() {
    let mut layer = Add::from_bias(tensor!([0.0, 0.0])).unwrap();
    let x = tensor!([[0.0, 0.0], [0.0, 0.0]]);

    layer
        .acc_grad_parameters(&x, &tensor!([[1.0, 2.0], [3.0, 4.0]]), 0.5)
        .unwrap();
    assert_eq!(layer.grad_bias(), &tensor!([2.0, 3.0]));

    layer
        .acc_grad_parameters(&x, &tensor!([[1.0, 1.0], [1.0, 1.0]]), 2.0)
        .unwrap();
    assert_eq!(layer.grad_bias(), &tensor!([6.0, 7.0]));
}

#[test]
fn test_accumulation_exact_shape() {
    let mut layer = Add::from_bias(tensor!([0.0, 0.0, 0.0])).unwrap();
    let x = tensor!([5.0, 5.0, 5.0]);
    layer
        .acc_grad_parameters(&x, &tensor!([1.0, 2.0, 3.0]), 3.0)
        .unwrap();
    layer
        .acc_grad_parameters(&x, &Tensor::new(vec![3], vec![1.0, 0.0, -1.0]), 1.0)
        .unwrap();
    assert_eq!(layer.grad_bias(), &tensor!([4.0, 6.0, 8.0]));
}

#[test]
fn test_zero_grad_is_idempotent() {
    let mut layer = Add::from_bias(tensor!([1.0, 2.0])).unwrap();
    let x = tensor!([[1.0, 1.0]]);
    layer
        .acc_grad_parameters(&x, &tensor!([[4.0, 5.0]]), 1.0)
        .unwrap();

    layer.zero_grad_parameters();
    assert_eq!(layer.grad_bias(), &tensor!([0.0, 0.0]));
    layer.zero_grad_parameters();
    assert_eq!(layer.grad_bias(), &tensor!([0.0, 0.0]));
    assert_eq!(layer.bias(), &tensor!([1.0, 2.0]));
}

#[test]
fn test_scalar_bias_sums_whole_gradient() {
    let mut layer = Add::from_bias(tensor!([0.5])).unwrap();
    let x = tensor!([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);

    let out = layer.forward(&x).unwrap();
    assert_eq!(out, &tensor!([[1.5, 2.5, 3.5], [4.5, 5.5, 6.5]]));

    layer.acc_grad_parameters(&x, &x, 2.0).unwrap();
    assert_eq!(layer.grad_bias(), &tensor!([42.0]));
}

#[test]
fn test_scalar_bias_agrees_with_batched_reduction() {
    let mut layer = Add::from_bias(tensor!([0.0])).unwrap();
    let x = tensor!([[1.0], [2.0], [3.0], [4.0]]);
    let g = Tensor::new(vec![4, 1], vec![0.5, 1.5, -2.0, 4.0]);
    layer.acc_grad_parameters(&x, &g, 3.0).unwrap();

    // the general batch path: gradᵀ · ones over a (4, 1) view
    let mut expected = [0.0];
    gemv_t(3.0, &g.data, 4, 1, &[1.0; 4], &mut expected);

    assert_eq!(layer.grad_bias().data, expected.to_vec());
    assert_eq!(expected, [12.0]);
}

#[test]
fn test_batch_size_change_rebuilds_ones() {
    let mut layer = Add::from_bias(tensor!([0.0, 0.0])).unwrap();
    layer.forward(&tensor!([[1.0, 1.0], [1.0, 1.0]])).unwrap();

    let x3 = tensor!([[0.0, 0.0], [0.0, 0.0], [0.0, 0.0]]);
    let g3 = tensor!([[1.0, 2.0], [1.0, 2.0], [1.0, 2.0]]);
    layer.acc_grad_parameters(&x3, &g3, 1.0).unwrap();
    assert_eq!(layer.grad_bias(), &tensor!([3.0, 6.0]));

    let out = layer.forward(&tensor!([[1.0, 1.0]])).unwrap();
    assert_eq!(out, &tensor!([[1.0, 1.0]]));
}

#[test]
fn test_accumulate_without_forward() {
    let mut layer = Add::from_bias(tensor!([0.0, 0.0])).unwrap();
    let x = tensor!([[0.0, 0.0], [0.0, 0.0]]);
    layer
        .acc_grad_parameters(&x, &tensor!([[1.0, 1.0], [2.0, 2.0]]), 1.0)
        .unwrap();
    assert_eq!(layer.grad_bias(), &tensor!([3.0, 3.0]));
}

#[test]
fn test_clear_state_keeps_parameters() {
    let mut layer = Add::from_bias(tensor!([1.0, 2.0])).unwrap();
    let x = tensor!([[1.0, 1.0], [1.0, 1.0]]);
    layer.forward(&x).unwrap();
    layer
        .acc_grad_parameters(&x, &tensor!([[1.0, 1.0], [1.0, 1.0]]), 1.0)
        .unwrap();

    layer.clear_state();
    assert!(layer.output().is_empty());
    assert!(layer.grad_input().is_empty());
    assert_eq!(layer.bias(), &tensor!([1.0, 2.0]));
    assert_eq!(layer.grad_bias(), &tensor!([2.0, 2.0]));

    let out = layer.forward(&x).unwrap();
    assert_eq!(out, &tensor!([[2.0, 3.0], [2.0, 3.0]]));
}

#[test]
fn test_malformed_input_is_rejected_without_side_effects() {
    let mut layer = Add::from_bias(tensor!([1.0, 2.0, 3.0])).unwrap();
    let good = tensor!([[0.0, 0.0, 0.0]]);
    layer.forward(&good).unwrap();
    let output_before = layer.output().clone();

    let err = layer.forward(&tensor!([[1.0, 2.0, 3.0, 4.0], [1.0, 2.0, 3.0, 4.0]]));
    assert!(matches!(err, Err(ShapeError::Mismatch { .. })));
    assert!(layer.forward(&tensor!([1.0, 2.0])).is_err());
    assert_eq!(layer.output(), &output_before);

    // grad_output that cannot be viewed as (N, input_size)
    let err = layer.acc_grad_parameters(
        &tensor!([[0.0, 0.0, 0.0], [0.0, 0.0, 0.0]]),
        &tensor!([1.0, 1.0, 1.0, 1.0, 1.0]),
        1.0,
    );
    assert!(matches!(err, Err(ShapeError::ElementCount { .. })));
    assert_eq!(layer.grad_bias(), &tensor!([0.0, 0.0, 0.0]));
}

#[test]
fn test_reset_draws_within_stdv() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut layer = Add::<f64>::with_rng(16, &mut rng);
    assert!(layer.bias().data.iter().all(|b| (-0.25..=0.25).contains(b)));
    assert!(layer.bias().data.iter().any(|&b| b != layer.bias().data[0]));
    assert_eq!(layer.grad_bias(), &Tensor::<f64>::zeros(vec![16]));

    let x = Tensor::<f64>::zeros(vec![16]);
    layer.acc_grad_parameters(&x, &Tensor::filled(vec![16], 1.0), 1.0).unwrap();
    layer.reset();
    assert_eq!(layer.grad_bias(), &Tensor::<f64>::zeros(vec![16]));
}

#[test]
fn test_seeded_reset_is_reproducible() {
    let a = Add::<f64>::with_rng(5, &mut StdRng::seed_from_u64(42));
    let mut b = Add::<f64>::new(5);
    b.reset_with(&mut StdRng::seed_from_u64(42));
    assert_eq!(a.bias(), b.bias());
}

#[test]
#[should_panic(expected = "at least one element")]
fn test_zero_sized_bias_panics() {
    let _ = Add::<f64>::new(0);
}

#[test]
fn test_from_bias_rejects_matrices() {
    let err = Add::from_bias(tensor!([[1.0, 2.0]])).unwrap_err();
    assert_eq!(err, ShapeError::Rank { expected: 1, found: 2 });
}

#[test]
fn test_parameters_alias_layer_state() {
    let mut layer = Add::from_bias(tensor!([1.0, 1.0])).unwrap();
    {
        let (params, grads) = layer.parameters();
        assert_eq!(params.len(), 1);
        assert_eq!(grads.len(), 1);
        assert!(std::ptr::eq(params[0], layer.bias()));
        assert!(std::ptr::eq(grads[0], layer.grad_bias()));
    }

    let (mut params, _) = layer.parameters_mut();
    params[0].data[1] = 5.0;
    assert_eq!(layer.bias(), &tensor!([1.0, 5.0]));
    assert_eq!(layer.num_parameters(), 2);
}

#[test]
fn test_update_parameters_steps_against_gradient() {
    let mut layer = Add::from_bias(tensor!([1.0, 1.0])).unwrap();
    let x = tensor!([[0.0, 0.0], [0.0, 0.0]]);
    let g = tensor!([[1.0, 2.0], [1.0, 2.0]]);

    let grad_in = layer.backward(&x, &g, 1.0).unwrap();
    assert_eq!(grad_in, &g);
    assert_eq!(layer.grad_bias(), &tensor!([2.0, 4.0]));

    layer.update_parameters(0.5).unwrap();
    assert_eq!(layer.bias().data, vec![0.0, -1.0]);
    assert_eq!(layer.grad_bias(), &tensor!([2.0, 4.0]));
}

#[test]
fn test_single_precision_layer() {
    let mut layer = Add::<f32>::from_bias(Tensor::new(vec![2], vec![0.5f32, 1.5])).unwrap();
    let x = Tensor::new(vec![2, 2], vec![1.0f32, 1.0, 2.0, 2.0]);
    let out = layer.forward(&x).unwrap();
    assert_eq!(out.data, vec![1.5f32, 2.5, 2.5, 3.5]);

    layer.acc_grad_parameters(&x, &x, 0.5).unwrap();
    assert_eq!(layer.grad_bias().data, vec![1.5f32, 1.5]);
}

#[test]
fn test_bias_save_and_load() {
    let path = temp_path("bias_roundtrip");
    let saved = Add::from_bias(Tensor::new(vec![3], vec![0.25, -0.5, 0.75])).unwrap();
    saved.save_bias(&path).unwrap();

    let mut loaded = Add::<f64>::new(3);
    let x = tensor!([1.0, 1.0, 1.0]);
    loaded.acc_grad_parameters(&x, &x, 1.0).unwrap();
    loaded.load_bias(&path).unwrap();
    assert_eq!(loaded.bias(), saved.bias());
    assert_eq!(loaded.grad_bias(), &tensor!([0.0, 0.0, 0.0]));

    let mut wrong = Add::from_bias(tensor!([9.0, 9.0])).unwrap();
    assert!(wrong.load_bias(&path).is_err());
    assert_eq!(wrong.bias(), &tensor!([9.0, 9.0]));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_bpat_save_and_load() {
    use briny_add::modelio::{load_model, save_model};

    let path = temp_path("model");
    let a = Tensor::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let b = Tensor::new(vec![1, 4], vec![7.0, 8.0, 9.0, 10.0]);
    let original = vec![a, b];

    save_model(&path, &original).unwrap();
    let loaded = load_model::<f64>(&path).unwrap();
    assert_eq!(original, loaded);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_load_rejects_bad_magic_and_non_finite_data() {
    use briny_add::modelio::{load_model, save_model};

    let path = temp_path("bad_magic");
    std::fs::write(&path, b"nope\x00").unwrap();
    assert!(load_model::<f64>(&path).is_err());

    save_model(&path, &[Tensor::new(vec![2], vec![1.0, f64::NAN])]).unwrap();
    assert!(load_model::<f64>(&path).is_err());

    let _ = std::fs::remove_file(&path);
}
