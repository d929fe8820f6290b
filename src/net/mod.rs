//! Network abstraction consumed by the training session
//!
//! The session treats the network as an opaque differentiable function: it
//! forwards inputs, lends out parameters for optimizer updates, and toggles
//! the train/eval flag without knowing which sublayers react to it.

mod subpixel;

pub use subpixel::SubPixelNet;

use crate::autograd::Tensor;
use crate::error::Result;

/// Train/eval mode flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

/// A parametric function from low-resolution to high-resolution tensors
///
/// Parameter accessors return tensors in a stable order with stable names;
/// checkpoint alignment and per-parameter optimizer state both rely on it.
pub trait Network {
    /// Run the network on an input image stack (rank 2 or 3)
    fn forward(&self, input: &Tensor) -> Result<Tensor>;

    /// Trainable parameters with their names, in declaration order
    fn named_parameters(&self) -> Vec<(String, &Tensor)>;

    /// Mutable access to the same parameters, same order
    fn named_parameters_mut(&mut self) -> Vec<(String, &mut Tensor)>;

    /// Trainable parameters in declaration order
    fn parameters(&self) -> Vec<&Tensor> {
        self.named_parameters().into_iter().map(|(_, t)| t).collect()
    }

    /// Mutable parameters in declaration order
    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        self.named_parameters_mut()
            .into_iter()
            .map(|(_, t)| t)
            .collect()
    }

    /// Switch between training and evaluation behaviour
    fn set_mode(&mut self, mode: Mode);

    /// Current mode flag
    fn mode(&self) -> Mode;

    /// Spatial upscale factor the network applies
    fn scale_factor(&self) -> usize;

    /// Human-readable architecture summary
    fn describe(&self) -> String;

    /// Total number of trainable scalar parameters
    fn num_parameters(&self) -> usize {
        self.parameters().iter().map(|p| p.len()).sum()
    }
}
