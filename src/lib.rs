//! # Escalar: Single-Image Super-Resolution Training
//!
//! Escalar trains and evaluates a single-image super-resolution network:
//! a tape-based autograd engine drives a sub-pixel upscaling model, and an
//! explicit [`TrainingSession`] controller owns the network, optimizer,
//! scheduler, and loss criterion for one run.
//!
//! ## Architecture
//!
//! - **autograd**: Tape-based automatic differentiation over flat tensors
//! - **net**: Network trait and the sub-pixel upscaler
//! - **optim**: Adam optimizer and plateau learning-rate scheduling
//! - **train**: Loss criteria, metrics, configuration, and the session controller
//! - **io**: Checkpoint saving and loading (JSON, SafeTensors formats)
//!
//! ## Example
//!
//! ```no_run
//! use escalar::train::{SessionConfig, SyntheticPairs, TrainingSession};
//!
//! let config = SessionConfig::new(2, 0.001, "runs/demo");
//! let mut session = TrainingSession::new(config)?;
//! session.load()?;
//!
//! let mut pairs = SyntheticPairs::new(8, 8, 2, 42);
//! for _ in 0..100 {
//!     let (low, high) = pairs.next_pair()?;
//!     session.feed_data(low, high)?;
//!     session.optimize_step()?;
//! }
//! session.save(100, "G")?;
//! # Ok::<(), escalar::Error>(())
//! ```

pub mod autograd;
pub mod io;
pub mod net;
pub mod optim;
pub mod train;

pub mod error;

// Re-export commonly used types
pub use autograd::{backward, Tensor};
pub use error::{Error, Result};
pub use train::{SessionConfig, TrainingSession};
