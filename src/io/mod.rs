//! Checkpoint I/O - saving and restoring network parameters
//!
//! Checkpoints carry a network's named parameter tensors plus a small
//! metadata header, in either JSON or SafeTensors form. Optimizer and
//! scheduler state travel in a separate trainer-state file so weight-only
//! checkpoints stay portable.

mod checkpoint;
mod format;
mod load;
mod save;

pub use checkpoint::{Checkpoint, CheckpointMeta, CheckpointState, ParameterInfo, TrainerState};
pub use format::{CheckpointFormat, SaveOptions};
pub use load::{apply_parameters, load_checkpoint, load_trainer_state};
pub use save::{save_checkpoint, save_trainer_state};
