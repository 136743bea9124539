use atp_models::masked_mean_l2;
use candle_core::{DType, Device, Tensor};

#[test]
fn masked_mean_l2_ignores_padding() {
    let dev = Device::Cpu;
    // Row 0: second token is padding. Row 1: both tokens count.
    let h = Tensor::from_slice(
        &[
            3.0f32, 4.0, 0.0, //
            9.0, 9.0, 9.0, //
            1.0, 0.0, 0.0, //
            0.0, 1.0, 0.0,
        ],
        (2, 2, 3),
        &dev,
    )
    .unwrap();
    let mask = Tensor::from_slice(&[1u32, 0, 1, 1], (2, 2), &dev).unwrap();
    let out: Vec<Vec<f32>> = masked_mean_l2(&h, &mask).unwrap().to_vec2().unwrap();

    let expected_0 = [0.6f32, 0.8, 0.0];
    let s = 0.5f32.sqrt();
    let expected_1 = [s, s, 0.0];
    for (a, b) in out[0].iter().zip(expected_0).chain(out[1].iter().zip(expected_1)) {
        assert!((a - b).abs() < 1e-5, "a={a} b={b}");
    }
}

#[test]
fn masked_mean_l2_rejects_mismatched_mask() {
    let dev = Device::Cpu;
    let h = Tensor::zeros((1, 3, 4), DType::F32, &dev).unwrap();
    let mask = Tensor::ones((1, 2), DType::F32, &dev).unwrap();
    assert!(masked_mean_l2(&h, &mask).is_err());
}
