//! Adam optimizer

use super::Optimizer;
use crate::Tensor;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Adam optimizer (Adaptive Moment Estimation)
pub struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    weight_decay: f32,
    t: u64,
    m: Vec<Option<Array1<f32>>>, // First moment
    v: Vec<Option<Array1<f32>>>, // Second moment
}

/// Snapshot of Adam's mutable state, used for trainer-state checkpoints.
///
/// Hyper-parameters other than the learning rate come from configuration and
/// are not part of the snapshot; moments are positional against the owning
/// network's parameter order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdamState {
    pub lr: f32,
    pub t: u64,
    pub m: Vec<Option<Vec<f32>>>,
    pub v: Vec<Option<Vec<f32>>>,
}

impl Adam {
    /// Create a new Adam optimizer
    pub fn new(lr: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            lr,
            beta1,
            beta2,
            epsilon,
            weight_decay: 0.0,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    /// Create Adam with default parameters
    pub fn default_params(lr: f32) -> Self {
        Self::new(lr, 0.9, 0.999, 1e-8)
    }

    /// Enable coupled L2 weight decay
    ///
    /// The decay term is added to the raw gradient before the moment
    /// estimates, matching classic L2 regularization rather than the
    /// decoupled AdamW variant.
    pub fn with_weight_decay(mut self, weight_decay: f32) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    /// Initialize moments if needed
    fn ensure_moments(&mut self, count: usize) {
        if self.m.len() != count {
            self.m = vec![None; count];
            self.v = vec![None; count];
        }
    }

    /// Export the mutable state for checkpointing
    pub fn to_state(&self) -> AdamState {
        AdamState {
            lr: self.lr,
            t: self.t,
            m: self.m.iter().map(|m| m.as_ref().map(|a| a.to_vec())).collect(),
            v: self.v.iter().map(|v| v.as_ref().map(|a| a.to_vec())).collect(),
        }
    }

    /// Restore state captured by [`Adam::to_state`]
    pub fn load_state(&mut self, state: AdamState) {
        self.lr = state.lr;
        self.t = state.t;
        self.m = state.m.into_iter().map(|m| m.map(Array1::from)).collect();
        self.v = state.v.into_iter().map(|v| v.map(Array1::from)).collect();
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut [&mut Tensor]) {
        self.ensure_moments(params.len());
        self.t += 1;

        // Bias correction factors
        let lr_t = self.lr
            * ((1.0 - self.beta2.powi(self.t as i32)).sqrt()
                / (1.0 - self.beta1.powi(self.t as i32)));

        for (i, param) in params.iter_mut().enumerate() {
            if let Some(grad) = param.grad() {
                // Coupled L2: the decay term joins the raw gradient before
                // the moment estimates
                let grad = if self.weight_decay > 0.0 {
                    &grad + &(param.data() * self.weight_decay)
                } else {
                    grad
                };

                // m_t = β1 * m_{t-1} + (1 - β1) * g
                let m_t = if let Some(m) = &self.m[i] {
                    m * self.beta1 + &grad * (1.0 - self.beta1)
                } else {
                    &grad * (1.0 - self.beta1)
                };

                // v_t = β2 * v_{t-1} + (1 - β2) * g²
                let grad_sq = &grad * &grad;
                let v_t = if let Some(v) = &self.v[i] {
                    v * self.beta2 + &grad_sq * (1.0 - self.beta2)
                } else {
                    &grad_sq * (1.0 - self.beta2)
                };

                // θ_t = θ_{t-1} - lr_t * m_t / (√v_t + ε)
                let update = &m_t / &(v_t.mapv(f32::sqrt) + self.epsilon) * lr_t;
                *param.data_mut() = param.data() - &update;

                self.m[i] = Some(m_t);
                self.v[i] = Some(v_t);
            }
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}
