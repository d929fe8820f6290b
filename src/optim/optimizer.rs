//! Optimizer trait

use crate::Tensor;

/// Trait for optimization algorithms
///
/// Parameters arrive as mutable borrows lent out by the network for the
/// duration of one call, always in the same order; per-parameter optimizer
/// state is kept positionally against that order.
pub trait Optimizer {
    /// Perform a single optimization step
    fn step(&mut self, params: &mut [&mut Tensor]);

    /// Zero out all gradients
    fn zero_grad(&mut self, params: &mut [&mut Tensor]) {
        for param in params.iter() {
            param.zero_grad();
        }
    }

    /// Get learning rate
    fn lr(&self) -> f32;

    /// Set learning rate
    fn set_lr(&mut self, lr: f32);
}
