//! Plateau-driven learning rate scheduling
//!
//! Watches a validation metric between optimization steps and reduces the
//! learning rate once the metric stops improving, in the spirit of
//! `ReduceLROnPlateau`.

use super::Optimizer;
use serde::{Deserialize, Serialize};

/// Direction in which the monitored metric improves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlateauMode {
    /// Lower is better (e.g. a loss)
    Min,
    /// Higher is better (e.g. PSNR)
    Max,
}

/// Snapshot of the scheduler's mutable state, used for trainer-state
/// checkpoints. Configuration (mode, factor, patience) is not part of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlateauState {
    pub best: Option<f32>,
    pub bad_steps: usize,
}

/// Reduce the learning rate when a validation metric plateaus
///
/// Each call to [`ReduceLrOnPlateau::step`] compares the metric against the
/// best value seen so far. After more than `patience` consecutive steps
/// without improvement the optimizer's learning rate is multiplied by
/// `factor` (never below `min_lr`) and the patience counter restarts.
pub struct ReduceLrOnPlateau {
    mode: PlateauMode,
    factor: f32,
    patience: usize,
    threshold: f32,
    min_lr: f32,
    best: Option<f32>,
    bad_steps: usize,
}

impl ReduceLrOnPlateau {
    /// Create a new plateau scheduler
    ///
    /// # Arguments
    /// * `mode` - Whether the metric improves downward or upward
    /// * `factor` - Multiplier applied to the learning rate on a plateau
    /// * `patience` - Steps without improvement tolerated before reducing
    /// * `threshold` - Relative margin a new value must clear to count as
    ///   an improvement
    /// * `min_lr` - Floor below which the learning rate never drops
    pub fn new(mode: PlateauMode, factor: f32, patience: usize, threshold: f32, min_lr: f32) -> Self {
        Self {
            mode,
            factor,
            patience,
            threshold,
            min_lr,
            best: None,
            bad_steps: 0,
        }
    }

    fn improved(&self, metric: f32, best: f32) -> bool {
        match self.mode {
            PlateauMode::Min => metric < best * (1.0 - self.threshold),
            PlateauMode::Max => metric > best * (1.0 + self.threshold),
        }
    }

    /// Record a validation metric and adjust the optimizer if needed
    ///
    /// The first recorded value only establishes the baseline; it can never
    /// trigger a reduction.
    pub fn step<O: Optimizer + ?Sized>(&mut self, metric: f32, optimizer: &mut O) {
        match self.best {
            None => {
                self.best = Some(metric);
            }
            Some(best) if self.improved(metric, best) => {
                self.best = Some(metric);
                self.bad_steps = 0;
            }
            Some(_) => {
                self.bad_steps += 1;
                if self.bad_steps > self.patience {
                    let reduced = (optimizer.lr() * self.factor).max(self.min_lr);
                    optimizer.set_lr(reduced);
                    self.bad_steps = 0;
                }
            }
        }
    }

    /// Export the mutable state for checkpointing
    pub fn to_state(&self) -> PlateauState {
        PlateauState {
            best: self.best,
            bad_steps: self.bad_steps,
        }
    }

    /// Restore state captured by [`ReduceLrOnPlateau::to_state`]
    pub fn load_state(&mut self, state: PlateauState) {
        self.best = state.best;
        self.bad_steps = state.bad_steps;
    }
}
