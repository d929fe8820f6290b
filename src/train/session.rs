//! Training session controller
//!
//! [`TrainingSession`] owns the network, optimizer, scheduler, and loss
//! criterion for one training run and sequences the step lifecycle:
//! feed a batch, forward, backward, apply the update. It also persists
//! checkpoints and routes validation feedback into the learning rate.

use super::config::{Device, SessionConfig};
use super::loss::LossFn;
use crate::autograd;
use crate::error::{Error, Result};
use crate::io::{self, Checkpoint, SaveOptions, TrainerState};
use crate::net::{Mode, Network, SubPixelNet};
use crate::optim::{Adam, Optimizer, ReduceLrOnPlateau};
use crate::Tensor;
use std::fs;
use std::path::{Path, PathBuf};

/// Controller for one super-resolution training run
///
/// Exactly one network, optimizer, scheduler, and criterion live inside a
/// session; none of them can be swapped after construction. All operations
/// take the session by reference, so a driver can own several independent
/// sessions side by side.
///
/// # Example
///
/// ```no_run
/// use escalar::train::{SessionConfig, TrainingSession};
/// use escalar::Tensor;
///
/// let config = SessionConfig::new(2, 0.001, "runs/demo");
/// let mut session = TrainingSession::new(config).unwrap();
///
/// let low = Tensor::from_shape_vec(&[4, 4], vec![0.5; 16], false).unwrap();
/// let high = Tensor::from_shape_vec(&[8, 8], vec![0.5; 64], false).unwrap();
/// session.feed_data(low, high).unwrap();
/// session.optimize_step().unwrap();
///
/// for (name, value) in session.current_losses().unwrap() {
///     println!("{name} = {value:.6}");
/// }
/// ```
pub struct TrainingSession {
    config: SessionConfig,

    /// The network being trained
    network: Box<dyn Network>,

    /// Optimizer over the network's parameters
    optimizer: Adam,

    /// Plateau scheduler driving the optimizer's learning rate
    scheduler: ReduceLrOnPlateau,

    /// Pixel criterion
    criterion: Box<dyn LossFn>,

    /// Pretrained checkpoint, consumed by the first successful `load`
    checkpoint_path: Option<PathBuf>,

    // Transient step state; all three are overwritten by each feed_data
    low: Option<Tensor>,
    high: Option<Tensor>,
    prediction: Option<Tensor>,

    /// Scalar from the most recent backward pass since the last feed
    loss: Option<f32>,
}

impl TrainingSession {
    /// Build a session from a configuration bundle
    ///
    /// Construction instantiates the network on the configured device,
    /// binds the optimizer and scheduler to it, and writes a human-readable
    /// architecture summary to `<out_dir>/network.txt`. As a documented
    /// final step, that file is made read-only so the record of what this
    /// run trained cannot drift afterwards.
    ///
    /// Fails with a configuration error when the device is unsupported or
    /// any config value is out of range.
    pub fn new(config: SessionConfig) -> Result<Self> {
        config.validate()?;

        if config.device == Device::Accelerator {
            return Err(Error::ConfigError(
                "Accelerator device is not available in this build; use cpu".to_string(),
            ));
        }

        let network: Box<dyn Network> = Box::new(SubPixelNet::new(
            config.network.scale,
            config.network.hidden_channels,
            config.network.seed,
        ));

        let optimizer =
            Adam::default_params(config.lr).with_weight_decay(config.weight_decay);
        let scheduler = ReduceLrOnPlateau::new(
            config.plateau.mode,
            config.plateau.factor,
            config.plateau.patience,
            config.plateau.threshold,
            config.plateau.min_lr,
        );
        let criterion = config.loss.build();
        let checkpoint_path = config.pretrained.clone();

        let session = Self {
            config,
            network,
            optimizer,
            scheduler,
            criterion,
            checkpoint_path,
            low: None,
            high: None,
            prediction: None,
            loss: None,
        };

        session.write_description()?;

        println!(
            "✓ Network constructed: {} parameters, {} criterion",
            session.network.num_parameters(),
            session.criterion.name()
        );
        println!("---------- Session initialized ----------");

        Ok(session)
    }

    /// Write the architecture summary to `<out_dir>/network.txt`
    ///
    /// The permission change happens after the write, never before; a
    /// leftover file from a previous run in the same directory is made
    /// writable again and replaced.
    fn write_description(&self) -> Result<()> {
        fs::create_dir_all(&self.config.out_dir)?;
        let path = self.config.out_dir.join("network.txt");

        if path.exists() {
            let mut perms = fs::metadata(&path)?.permissions();
            perms.set_readonly(false);
            fs::set_permissions(&path, perms)?;
            fs::remove_file(&path)?;
        }

        let description = format!(
            "{}\nTotal trainable parameters: {}\n",
            self.network.describe(),
            self.network.num_parameters()
        );
        fs::write(&path, description)?;

        let mut perms = fs::metadata(&path)?.permissions();
        perms.set_readonly(true);
        fs::set_permissions(&path, perms)?;

        Ok(())
    }

    /// Tensor placement hook; on the CPU device this is the identity.
    /// Everything the session stores routes through here, so no operation
    /// hardcodes a device.
    fn to_device(&self, tensor: Tensor) -> Tensor {
        tensor
    }

    /// Stage a (low-res, high-res) training pair
    ///
    /// Both tensors are moved to the session device and marked for gradient
    /// tracking. The previous batch, prediction, and loss are dropped first,
    /// so queries never mix data from two batches. Accepts single images of
    /// shape `[h, w]` or stacks of shape `[n, h, w]`; the high-res tensor
    /// must match the low-res one scaled by the network's factor.
    pub fn feed_data(&mut self, mut low: Tensor, mut high: Tensor) -> Result<()> {
        let r = self.network.scale_factor();
        let expected: Vec<usize> = match low.shape() {
            &[h, w] => vec![h * r, w * r],
            &[n, h, w] => vec![n, h * r, w * r],
            other => {
                return Err(Error::InvalidParameter(format!(
                    "Expected a low-res image of rank 2 or 3, got shape {other:?}"
                )))
            }
        };
        if high.shape() != expected.as_slice() {
            return Err(Error::ShapeMismatch {
                expected,
                got: high.shape().to_vec(),
            });
        }

        low.set_requires_grad(true);
        high.set_requires_grad(true);

        // Old batch memory is released before the new one is stored
        self.prediction = None;
        self.loss = None;
        self.low = Some(self.to_device(low));
        self.high = Some(self.to_device(high));

        Ok(())
    }

    /// Run the network on the staged input and keep the prediction
    ///
    /// Fails with a state error when no batch has been fed.
    pub fn forward(&mut self) -> Result<()> {
        let low = self.low.as_ref().ok_or_else(|| {
            Error::InvalidState("forward requires a batch; call feed_data first".to_string())
        })?;

        let prediction = self.network.forward(low)?;
        self.prediction = Some(prediction);
        Ok(())
    }

    /// Compute the criterion against the stored target and backpropagate
    ///
    /// Stores the scalar loss and accumulates gradients into every network
    /// parameter. Fails with a state error when no prediction exists; the
    /// stored loss is left untouched in that case.
    pub fn backward(&mut self) -> Result<()> {
        let prediction = self.prediction.as_ref().ok_or_else(|| {
            Error::InvalidState("backward requires a prediction; call forward first".to_string())
        })?;
        let high = self.high.as_ref().ok_or_else(|| {
            Error::InvalidState("backward requires a target; call feed_data first".to_string())
        })?;

        let mut loss = self.criterion.forward(prediction, high);
        autograd::backward(&mut loss, None);
        self.loss = Some(loss.data()[0]);
        Ok(())
    }

    /// The canonical training step
    ///
    /// Runs forward, clears accumulated gradients, runs backward, then
    /// applies the optimizer update. Gradients are atomic with respect to
    /// this call: they are cleared after the forward pass and consumed by
    /// the update, so two steps never interleave their gradients.
    pub fn optimize_step(&mut self) -> Result<()> {
        self.forward()?;
        self.optimizer.zero_grad(&mut self.network.parameters_mut());
        self.backward()?;
        self.optimizer.step(&mut self.network.parameters_mut());
        Ok(())
    }

    /// Run the network for validation or inspection
    ///
    /// Produces a prediction exactly like `forward` but is the documented
    /// stopping point of the validation path: no backward pass, no
    /// optimizer update, no parameter changes.
    pub fn evaluate(&mut self) -> Result<()> {
        self.forward()
    }

    /// Ordered loss-name to value mapping from the most recent backward
    /// pass of the current batch
    pub fn current_losses(&self) -> Result<Vec<(&'static str, f32)>> {
        let loss = self.loss.ok_or_else(|| {
            Error::InvalidState(
                "No loss recorded for this batch; run backward or optimize_step first".to_string(),
            )
        })?;
        Ok(vec![("loss", loss)])
    }

    /// First-sample views of the current batch for inspection or logging
    ///
    /// Returns `low-resolution`, `super-resolution`, and `ground-truth`
    /// image tensors, detached from training state. Requires a completed
    /// forward pass.
    pub fn current_visuals(&self) -> Result<Vec<(&'static str, Tensor)>> {
        let prediction = self.prediction.as_ref().ok_or_else(|| {
            Error::InvalidState("No prediction available; run forward first".to_string())
        })?;
        let low = self.low.as_ref().ok_or_else(|| {
            Error::InvalidState("No batch available; call feed_data first".to_string())
        })?;
        let high = self.high.as_ref().ok_or_else(|| {
            Error::InvalidState("No batch available; call feed_data first".to_string())
        })?;

        Ok(vec![
            ("low-resolution", Self::first_sample(low)?),
            ("super-resolution", Self::first_sample(prediction)?),
            ("ground-truth", Self::first_sample(high)?),
        ])
    }

    // First sample of a [h, w] image or [n, h, w] stack, detached
    fn first_sample(tensor: &Tensor) -> Result<Tensor> {
        match tensor.shape() {
            &[h, w] => {
                Tensor::from_shape_vec(&[h, w], tensor.data().to_vec(), false)
            }
            &[_, h, w] => {
                let data = tensor.data().iter().take(h * w).copied().collect();
                Tensor::from_shape_vec(&[h, w], data, false)
            }
            other => Err(Error::InvalidParameter(format!(
                "Visuals require image tensors, got shape {other:?}"
            ))),
        }
    }

    /// Restore the pretrained checkpoint configured for this session
    ///
    /// Parameters are copied into the existing network in place, so the
    /// optimizer keeps tracking the very tensors it was bound to. The
    /// configured path is consumed by the first successful load; later
    /// calls (or sessions configured without one) are no-ops. A failed
    /// load leaves the freshly initialized parameters untouched.
    pub fn load(&mut self) -> Result<()> {
        let path = match &self.checkpoint_path {
            Some(path) => path.clone(),
            None => return Ok(()),
        };

        let checkpoint = io::load_checkpoint(&path)?;
        io::apply_parameters(&checkpoint, self.network.as_mut())?;
        self.checkpoint_path = None;

        println!("✓ Restored network parameters from {}", path.display());
        Ok(())
    }

    /// Restore optimizer and scheduler state written by a previous `save`
    ///
    /// Kept separate from `load` because weight-only checkpoints are the
    /// common case; resuming a run in place wants both calls.
    pub fn load_trainer_state(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let state = io::load_trainer_state(path.as_ref())?;
        self.optimizer.load_state(state.optimizer);
        self.scheduler.load_state(state.scheduler);

        println!("✓ Restored trainer state from {}", path.as_ref().display());
        Ok(())
    }

    /// Serialize network parameters to a uniquely named checkpoint
    ///
    /// The artifact lands at `<out_dir>/<iteration>_<label>.<ext>` and an
    /// existing file at that path is an error, never overwritten. When the
    /// session is configured with `save_trainer_state`, optimizer and
    /// scheduler state go to a `.state.json` sidecar next to it. Returns
    /// the checkpoint path.
    pub fn save(&self, iteration: u64, label: &str) -> Result<PathBuf> {
        let filename = format!(
            "{}_{}.{}",
            iteration,
            label,
            self.config.format.extension()
        );
        let path = self.config.out_dir.join(filename);

        let checkpoint = Checkpoint::from_network(label, iteration, self.network.as_ref());
        io::save_checkpoint(&checkpoint, &path, &SaveOptions::new(self.config.format))?;

        if self.config.save_trainer_state {
            let state = TrainerState {
                optimizer: self.optimizer.to_state(),
                scheduler: self.scheduler.to_state(),
            };
            io::save_trainer_state(&state, path.with_extension("state.json"))?;
        }

        println!("✓ Saved checkpoint to {}", path.display());
        Ok(path)
    }

    /// Feed a validation metric to the plateau scheduler
    ///
    /// The scheduler may reduce the optimizer's learning rate as a side
    /// effect. A non-finite metric is rejected rather than tracked.
    pub fn update_learning_rate(&mut self, validation_metric: f32) -> Result<()> {
        if !validation_metric.is_finite() {
            return Err(Error::InvalidState(format!(
                "Validation metric must be finite, got {validation_metric}"
            )));
        }

        self.scheduler.step(validation_metric, &mut self.optimizer);
        Ok(())
    }

    /// Switch the network into training mode
    ///
    /// The flag is forwarded as-is; which sublayers react to it is the
    /// network's business, not the session's.
    pub fn set_train_mode(&mut self) {
        self.network.set_mode(Mode::Train);
    }

    /// Switch the network into evaluation mode
    pub fn set_eval_mode(&mut self) {
        self.network.set_mode(Mode::Eval);
    }

    /// Current learning rate
    pub fn lr(&self) -> f32 {
        self.optimizer.lr()
    }

    /// The network driven by this session
    pub fn network(&self) -> &dyn Network {
        self.network.as_ref()
    }

    /// Session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}
