//! Optimization and learning-rate scheduling

mod adam;
mod optimizer;
mod plateau;

pub use adam::{Adam, AdamState};
pub use optimizer::Optimizer;
pub use plateau::{PlateauMode, PlateauState, ReduceLrOnPlateau};
