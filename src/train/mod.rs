//! Training control
//!
//! This module provides everything a training driver touches:
//! - Loss criteria (MSE, L1) selected by configuration
//! - The session configuration bundle, loadable from YAML
//! - Evaluation metrics (PSNR) and a synthetic data generator
//! - The [`TrainingSession`] controller owning one full training run
//!
//! # Example
//!
//! ```no_run
//! use escalar::train::{SessionConfig, TrainingSession};
//! use escalar::Tensor;
//!
//! let config = SessionConfig::new(2, 0.001, "runs/demo");
//! let mut session = TrainingSession::new(config).unwrap();
//!
//! let low = Tensor::from_shape_vec(&[4, 4], vec![0.5; 16], false).unwrap();
//! let high = Tensor::from_shape_vec(&[8, 8], vec![0.5; 64], false).unwrap();
//! session.feed_data(low, high).unwrap();
//! session.optimize_step().unwrap();
//! ```

mod config;
mod loss;
mod metrics;
mod session;

pub use config::{Device, NetworkConfig, PlateauConfig, SessionConfig};
pub use loss::{L1Loss, LossFn, LossKind, MSELoss};
pub use metrics::{Metric, Psnr, SyntheticPairs};
pub use session::TrainingSession;
