//! Pixel-wise loss criteria for super-resolution training

use crate::autograd::BackwardOp;
use crate::Tensor;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

/// Trait for loss functions
pub trait LossFn {
    /// Compute loss given predictions and targets
    ///
    /// Returns a scalar loss value wired into the backward graph, so
    /// gradients flow from the loss through the predictions into every
    /// upstream parameter.
    fn forward(&self, predictions: &Tensor, targets: &Tensor) -> Tensor;

    /// Name of the loss function
    fn name(&self) -> &str;
}

/// Criterion selector used by training configurations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LossKind {
    /// Mean absolute error
    L1,
    /// Mean squared error
    L2,
}

impl LossKind {
    /// Instantiate the criterion this selector names
    pub fn build(self) -> Box<dyn LossFn> {
        match self {
            LossKind::L1 => Box::new(L1Loss),
            LossKind::L2 => Box::new(MSELoss),
        }
    }
}

/// Backward pass shared by the pixel criteria
///
/// `grad` holds the precomputed gradient with respect to the predictions;
/// backward scales it by the upstream seed, accumulates it, and then
/// continues into the predictions' own op.
struct CriterionBackward {
    predictions: Tensor,
    grad: Array1<f32>,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for CriterionBackward {
    fn backward(&self) {
        if let Some(seed) = self.result_grad.borrow().as_ref() {
            if self.predictions.requires_grad() {
                let grad = &self.grad * seed[0];
                self.predictions.accumulate_grad(grad);
            }

            if let Some(op) = self.predictions.backward_op() {
                op.backward();
            }
        }
    }
}

/// Mean Squared Error Loss
///
/// L = mean((predictions - targets)²)
///
/// # Example
///
/// ```
/// use escalar::train::{LossFn, MSELoss};
/// use escalar::Tensor;
///
/// let loss_fn = MSELoss;
/// let pred = Tensor::from_vec(vec![1.0, 2.0, 3.0], true);
/// let target = Tensor::from_vec(vec![1.5, 2.5, 3.5], false);
///
/// let loss = loss_fn.forward(&pred, &target);
/// assert!(loss.data()[0] > 0.0);
/// ```
pub struct MSELoss;

impl LossFn for MSELoss {
    fn forward(&self, predictions: &Tensor, targets: &Tensor) -> Tensor {
        assert_eq!(
            predictions.len(),
            targets.len(),
            "Predictions and targets must have same length"
        );

        // Compute squared error
        let diff = predictions.data() - targets.data();
        let squared = &diff * &diff;
        let mse = squared.mean().unwrap_or(0.0);

        let mut loss = Tensor::from_vec(vec![mse], predictions.requires_grad());

        if predictions.requires_grad() {
            // d(MSE)/d(pred) = 2 * (pred - target) / n
            let n = predictions.len() as f32;
            let grad = &diff * (2.0 / n);

            loss.set_backward_op(Rc::new(CriterionBackward {
                predictions: predictions.clone(),
                grad,
                result_grad: loss.grad_cell(),
            }));
        }

        loss
    }

    fn name(&self) -> &str {
        "MSE"
    }
}

/// Mean Absolute Error Loss
///
/// L = mean(|predictions - targets|)
///
/// # Example
///
/// ```
/// use escalar::train::{L1Loss, LossFn};
/// use escalar::Tensor;
///
/// let loss_fn = L1Loss;
/// let pred = Tensor::from_vec(vec![1.0, 2.0], true);
/// let target = Tensor::from_vec(vec![0.0, 0.0], false);
///
/// let loss = loss_fn.forward(&pred, &target);
/// assert!((loss.data()[0] - 1.5).abs() < 1e-6);
/// ```
pub struct L1Loss;

impl LossFn for L1Loss {
    fn forward(&self, predictions: &Tensor, targets: &Tensor) -> Tensor {
        assert_eq!(
            predictions.len(),
            targets.len(),
            "Predictions and targets must have same length"
        );

        let diff = predictions.data() - targets.data();
        let mae = diff.mapv(f32::abs).mean().unwrap_or(0.0);

        let mut loss = Tensor::from_vec(vec![mae], predictions.requires_grad());

        if predictions.requires_grad() {
            // d(MAE)/d(pred) = sign(pred - target) / n
            // signum maps ±0 to ±1, so the zero case is spelled out
            let n = predictions.len() as f32;
            let grad = diff.mapv(|d| {
                if d > 0.0 {
                    1.0 / n
                } else if d < 0.0 {
                    -1.0 / n
                } else {
                    0.0
                }
            });

            loss.set_backward_op(Rc::new(CriterionBackward {
                predictions: predictions.clone(),
                grad,
                result_grad: loss.grad_cell(),
            }));
        }

        loss
    }

    fn name(&self) -> &str {
        "L1"
    }
}
