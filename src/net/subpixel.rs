//! Efficient sub-pixel upscaling network
//!
//! A compact super-resolution model over single-channel images: two 1×1
//! pointwise convolutions with a ReLU between them expand each pixel into
//! scale² channel values, a pixel shuffle rearranges those channels into the
//! upscaled grid, and a nearest-neighbour skip path carries the input
//! through so the convolutions only learn the residual detail.
//!
//! Since the convolutions are pointwise, an image stack of any batch size
//! folds into a 1×pixels row and the whole forward pass runs as two matrix
//! multiplications.

use super::{Mode, Network};
use crate::autograd::{add, add_bias, matmul, pixel_shuffle, relu, upsample_nearest, Tensor};
use crate::error::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Sub-pixel super-resolution network
pub struct SubPixelNet {
    /// Pointwise expansion weights, 1 -> hidden, stored as 1D [hidden]
    w1: Tensor,
    /// Expansion bias [hidden]
    b1: Tensor,
    /// Pointwise projection weights, hidden -> scale², stored as 1D [scale² * hidden]
    w2: Tensor,
    /// Projection bias [scale²]
    b2: Tensor,
    /// Hidden channel count
    hidden: usize,
    /// Spatial upscale factor
    scale: usize,
    mode: Mode,
}

impl SubPixelNet {
    /// Create a network with scaled-uniform random weights and zero biases
    ///
    /// # Arguments
    /// * `scale` - Spatial upscale factor (output dims are input dims × scale)
    /// * `hidden` - Hidden channel count of the expansion layer
    /// * `seed` - RNG seed for reproducible initialization; entropy-seeded
    ///   when absent
    pub fn new(scale: usize, hidden: usize, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        // Uniform in ±1/sqrt(fan_in) per layer. The projection starts small,
        // so the initial output is close to the nearest-neighbour skip path.
        let bound1 = 1.0;
        let w1_data: Vec<f32> = (0..hidden).map(|_| rng.gen_range(-bound1..bound1)).collect();
        let bound2 = 1.0 / (hidden as f32).sqrt();
        let w2_data: Vec<f32> = (0..scale * scale * hidden)
            .map(|_| rng.gen_range(-bound2..bound2))
            .collect();

        Self {
            w1: Tensor::from_vec(w1_data, true),
            b1: Tensor::zeros(hidden, true),
            w2: Tensor::from_vec(w2_data, true),
            b2: Tensor::zeros(scale * scale, true),
            hidden,
            scale,
            mode: Mode::Train,
        }
    }

    /// Interpret an input shape as (samples, height, width)
    fn stack_dims(input: &Tensor) -> Result<(usize, usize, usize)> {
        match input.shape() {
            &[h, w] => Ok((1, h, w)),
            &[n, h, w] => Ok((n, h, w)),
            other => Err(Error::InvalidParameter(format!(
                "input must be a rank 2 or 3 image stack, got shape {other:?}"
            ))),
        }
    }
}

impl Network for SubPixelNet {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let (samples, h, w) = Self::stack_dims(input)?;
        let pixels = samples * h * w;
        let r = self.scale;

        // Pointwise convolutions act per pixel: the stack folds into one
        // 1×pixels row regardless of batch size.
        let row = input.reshape(&[1, pixels])?;

        let expanded = relu(&add_bias(
            &matmul(&self.w1, &row, self.hidden, 1, pixels),
            &self.b1,
            self.hidden,
            pixels,
        ));
        let channels = add_bias(
            &matmul(&self.w2, &expanded, r * r, self.hidden, pixels),
            &self.b2,
            r * r,
            pixels,
        );

        let detail = pixel_shuffle(&channels, samples, h, w, r);
        let base = upsample_nearest(input, samples, h, w, r);
        let out = add(&detail, &base);

        if input.rank() == 2 {
            out.reshape(&[h * r, w * r])
        } else {
            Ok(out)
        }
    }

    fn named_parameters(&self) -> Vec<(String, &Tensor)> {
        vec![
            ("conv1.weight".to_string(), &self.w1),
            ("conv1.bias".to_string(), &self.b1),
            ("conv2.weight".to_string(), &self.w2),
            ("conv2.bias".to_string(), &self.b2),
        ]
    }

    fn named_parameters_mut(&mut self) -> Vec<(String, &mut Tensor)> {
        vec![
            ("conv1.weight".to_string(), &mut self.w1),
            ("conv1.bias".to_string(), &mut self.b1),
            ("conv2.weight".to_string(), &mut self.w2),
            ("conv2.bias".to_string(), &mut self.b2),
        ]
    }

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn scale_factor(&self) -> usize {
        self.scale
    }

    fn describe(&self) -> String {
        let r2 = self.scale * self.scale;
        format!(
            "SubPixelNet(\n  \
             conv1: 1x1 pointwise, 1 -> {hidden} (weights {hidden}, bias {hidden})\n  \
             relu\n  \
             conv2: 1x1 pointwise, {hidden} -> {r2} (weights {w2}, bias {r2})\n  \
             pixel_shuffle: x{scale}\n  \
             skip: nearest x{scale}\n)",
            hidden = self.hidden,
            r2 = r2,
            w2 = r2 * self.hidden,
            scale = self.scale,
        )
    }
}
