//! Evaluation metrics and synthetic validation data
//!
//! Provides the reconstruction quality metric used for validation feedback
//! (PSNR) and a deterministic generator of (low-res, high-res) image pairs
//! for driving training without an image pipeline.

use crate::error::Result;
use crate::Tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

/// Trait for evaluation metrics
pub trait Metric {
    /// Compute the metric given predictions and targets
    fn compute(&self, predictions: &Tensor, targets: &Tensor) -> f32;

    /// Name of the metric
    fn name(&self) -> &str;

    /// Whether higher values are better (true) or lower (false)
    fn higher_is_better(&self) -> bool {
        true
    }
}

/// Peak signal-to-noise ratio in decibels
///
/// PSNR = 10 * log10(peak² / MSE). A perfect reconstruction has infinite
/// PSNR; callers feeding the value into a scheduler should treat that case
/// explicitly.
///
/// # Example
///
/// ```
/// use escalar::train::{Metric, Psnr};
/// use escalar::Tensor;
///
/// let metric = Psnr::normalized();
/// let pred = Tensor::from_vec(vec![0.5, 0.5], false);
/// let target = Tensor::from_vec(vec![1.0, 1.0], false);
///
/// let db = metric.compute(&pred, &target);
/// assert!((db - 6.0206).abs() < 1e-3);
/// ```
#[derive(Debug, Clone)]
pub struct Psnr {
    /// Peak signal value (1.0 for normalized images, 255.0 for 8-bit)
    peak: f32,
}

impl Psnr {
    /// Create a PSNR metric for the given peak signal value
    pub fn new(peak: f32) -> Self {
        Self { peak }
    }

    /// PSNR over images normalized to [0, 1]
    pub fn normalized() -> Self {
        Self::new(1.0)
    }
}

impl Metric for Psnr {
    fn compute(&self, predictions: &Tensor, targets: &Tensor) -> f32 {
        assert_eq!(
            predictions.len(),
            targets.len(),
            "Predictions and targets must have same length"
        );

        let diff = predictions.data() - targets.data();
        let mse = (&diff * &diff).mean().unwrap_or(0.0);

        if mse == 0.0 {
            f32::INFINITY
        } else {
            10.0 * (self.peak * self.peak / mse).log10()
        }
    }

    fn name(&self) -> &str {
        "PSNR"
    }
}

/// Deterministic stream of synthetic (low-res, high-res) training pairs
///
/// Each high-res image is a clamped mixture of three random plane waves, so
/// it is smooth enough for an upscaler to learn from; the low-res input is
/// its box-filtered downsample, matching the usual degradation model.
pub struct SyntheticPairs {
    rng: StdRng,
    height: usize,
    width: usize,
    scale: usize,
}

impl SyntheticPairs {
    /// Create a generator of `height`×`width` low-res images for the given
    /// upscaling factor, seeded for reproducibility
    pub fn new(height: usize, width: usize, scale: usize, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            height,
            width,
            scale,
        }
    }

    /// Produce the next (low, high) pair
    ///
    /// Shapes are `[height, width]` and `[height*scale, width*scale]`; all
    /// values lie in [0, 1].
    pub fn next_pair(&mut self) -> Result<(Tensor, Tensor)> {
        let hr_h = self.height * self.scale;
        let hr_w = self.width * self.scale;

        let waves: Vec<(f32, f32, f32, f32)> = (0..3)
            .map(|_| {
                (
                    self.rng.gen_range(0.1..0.4),  // amplitude
                    self.rng.gen_range(0.5..2.0),  // cycles along rows
                    self.rng.gen_range(0.5..2.0),  // cycles along columns
                    self.rng.gen_range(0.0..TAU),  // phase
                )
            })
            .collect();

        let mut high = vec![0.0f32; hr_h * hr_w];
        for i in 0..hr_h {
            for j in 0..hr_w {
                let mut v = 0.5;
                for &(amp, fx, fy, phase) in &waves {
                    let arg = TAU * (fx * i as f32 / hr_h as f32 + fy * j as f32 / hr_w as f32);
                    v += amp * (arg + phase).cos();
                }
                high[i * hr_w + j] = v.clamp(0.0, 1.0);
            }
        }

        // Low-res input is the mean of each scale×scale block
        let mut low = vec![0.0f32; self.height * self.width];
        for i in 0..self.height {
            for j in 0..self.width {
                let mut sum = 0.0;
                for di in 0..self.scale {
                    for dj in 0..self.scale {
                        sum += high[(i * self.scale + di) * hr_w + (j * self.scale + dj)];
                    }
                }
                low[i * self.width + j] = sum / (self.scale * self.scale) as f32;
            }
        }

        let low = Tensor::from_shape_vec(&[self.height, self.width], low, false)?;
        let high = Tensor::from_shape_vec(&[hr_h, hr_w], high, false)?;
        Ok((low, high))
    }
}
