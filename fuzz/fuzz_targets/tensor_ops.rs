#![no_main]

use arbitrary::Arbitrary;
use escalar::autograd::{
    add, add_bias, backward, matmul, pixel_shuffle, relu, scale, upsample_nearest, Tensor,
};
use libfuzzer_sys::fuzz_target;

/// Fuzz target for tensor operations
///
/// Tests that tensor operations and their backward passes never panic with
/// arbitrary values, and that output sizes always match the documented
/// shapes.

#[derive(Arbitrary, Debug)]
struct TensorOpFuzzInput {
    h: u8,             // Height selector
    w: u8,             // Width selector
    r: u8,             // Upscale factor selector
    factor: u8,        // Scalar for scale()
    values_a: Vec<u8>, // Raw bytes for tensor A
    values_b: Vec<u8>, // Raw bytes for tensor B
    op_type: u8,       // Operation selector
}

fn bytes_to_f32(bytes: &[u8], size: usize) -> Vec<f32> {
    // Map 0..255 to -10.0..10.0; cycles when the fuzzer gives fewer bytes
    (0..size)
        .map(|i| {
            let b = bytes.get(i % bytes.len().max(1)).copied().unwrap_or(0);
            ((b as f32) / 255.0) * 20.0 - 10.0
        })
        .collect()
}

fuzz_target!(|input: TensorOpFuzzInput| {
    // Keep dimensions small so each case is cheap
    let h = (input.h as usize % 8) + 1;
    let w = (input.w as usize % 8) + 1;
    let r = (input.r as usize % 3) + 2;
    let factor = ((input.factor as f32) / 255.0) * 20.0 - 10.0;

    match input.op_type % 8 {
        0 => {
            // Add over matching sizes
            let a = Tensor::from_vec(bytes_to_f32(&input.values_a, h * w), true);
            let b = Tensor::from_vec(bytes_to_f32(&input.values_b, h * w), false);
            let c = add(&a, &b);
            assert_eq!(c.len(), h * w);
            assert!(c.data().iter().all(|v| v.is_finite()));
        }
        1 => {
            // Scale by an arbitrary bounded scalar
            let a = Tensor::from_vec(bytes_to_f32(&input.values_a, h * w), true);
            let c = scale(&a, factor);
            assert_eq!(c.len(), a.len());
            assert!(c.data().iter().all(|v| v.is_finite()));
        }
        2 => {
            // ReLU output is never negative
            let a = Tensor::from_vec(bytes_to_f32(&input.values_a, h * w), true);
            let c = relu(&a);
            assert!(c.data().iter().all(|v| *v >= 0.0));
        }
        3 => {
            // Matmul with consistent dimensions (m=h, k=w, n=r)
            let a = Tensor::from_vec(bytes_to_f32(&input.values_a, h * w), true);
            let b = Tensor::from_vec(bytes_to_f32(&input.values_b, w * r), true);
            let c = matmul(&a, &b, h, w, r);
            assert_eq!(c.len(), h * r);
            assert_eq!(c.shape(), &[h, r]);
            assert!(c.data().iter().all(|v| v.is_finite()));
        }
        4 => {
            // Per-row bias over an h×w matrix
            let x = Tensor::from_vec(bytes_to_f32(&input.values_a, h * w), true);
            let bias = Tensor::from_vec(bytes_to_f32(&input.values_b, h), true);
            let c = add_bias(&x, &bias, h, w);
            assert_eq!(c.len(), h * w);
        }
        5 => {
            // Pixel shuffle is a permutation: size preserved, values too
            let x = Tensor::from_vec(bytes_to_f32(&input.values_a, r * r * h * w), true);
            let mut c = pixel_shuffle(&x, 1, h, w, r);
            assert_eq!(c.len(), x.len());
            assert_eq!(c.shape(), &[1, h * r, w * r]);

            let mut in_sorted: Vec<f32> = x.data().to_vec();
            let mut out_sorted: Vec<f32> = c.data().to_vec();
            in_sorted.sort_by(f32::total_cmp);
            out_sorted.sort_by(f32::total_cmp);
            assert_eq!(in_sorted, out_sorted);

            // The inverse permutation must route every gradient back
            backward(&mut c, None);
            let grad = x.grad().expect("no gradient after backward");
            assert_eq!(grad.len(), x.len());
        }
        6 => {
            // Nearest-neighbour upsample replicates each pixel r² times
            let x = Tensor::from_vec(bytes_to_f32(&input.values_a, h * w), true);
            let mut c = upsample_nearest(&x, 1, h, w, r);
            assert_eq!(c.len(), h * w * r * r);

            backward(&mut c, None);
            let grad = x.grad().expect("no gradient after backward");
            // Each input pixel feeds exactly r² output pixels of a unit seed
            assert!(grad.iter().all(|g| (*g - (r * r) as f32).abs() < 1e-4));
        }
        7 => {
            // Chained ops with a shared operand exercise grad accumulation
            let a = Tensor::from_vec(bytes_to_f32(&input.values_a, h * w), true);
            let b = Tensor::from_vec(bytes_to_f32(&input.values_b, h * w), true);
            let mut c = add(&relu(&a), &scale(&b, factor));
            backward(&mut c, None);
            assert!(a.grad().is_some());
            assert!(b.grad().is_some());
        }
        _ => unreachable!(),
    }
});
