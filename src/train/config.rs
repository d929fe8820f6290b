//! Session configuration

use super::loss::LossKind;
use crate::error::{Error, Result};
use crate::io::CheckpointFormat;
use crate::optim::PlateauMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Compute device a session runs on
///
/// Selected once at construction; every tensor the session touches lives on
/// this device for the session's whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Host CPU
    Cpu,
    /// Dedicated accelerator (not available in this build)
    Accelerator,
}

impl Default for Device {
    fn default() -> Self {
        Device::Cpu
    }
}

/// Network architecture settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Upscaling factor per spatial axis
    pub scale: usize,

    /// Width of the hidden feature layer
    #[serde(default = "default_hidden_channels")]
    pub hidden_channels: usize,

    /// Seed for weight initialization; random when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_hidden_channels() -> usize {
    64
}

/// Plateau scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlateauConfig {
    /// Direction in which the validation metric improves
    #[serde(default = "default_plateau_mode")]
    pub mode: PlateauMode,

    /// Learning rate multiplier applied on a plateau
    #[serde(default = "default_factor")]
    pub factor: f32,

    /// Validation steps without improvement tolerated before reducing
    #[serde(default = "default_patience")]
    pub patience: usize,

    /// Relative improvement margin
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    /// Learning rate floor
    #[serde(default = "default_min_lr")]
    pub min_lr: f32,
}

fn default_plateau_mode() -> PlateauMode {
    PlateauMode::Max
}

fn default_factor() -> f32 {
    0.5
}

fn default_patience() -> usize {
    3
}

fn default_threshold() -> f32 {
    1e-4
}

fn default_min_lr() -> f32 {
    1e-7
}

impl Default for PlateauConfig {
    fn default() -> Self {
        Self {
            mode: default_plateau_mode(),
            factor: default_factor(),
            patience: default_patience(),
            threshold: default_threshold(),
            min_lr: default_min_lr(),
        }
    }
}

/// Complete configuration bundle for one training session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Device the session computes on
    #[serde(default)]
    pub device: Device,

    /// Network architecture
    pub network: NetworkConfig,

    /// Initial learning rate
    pub lr: f32,

    /// Coupled L2 weight decay coefficient (0 disables it)
    #[serde(default)]
    pub weight_decay: f32,

    /// Pixel criterion
    #[serde(default = "default_loss")]
    pub loss: LossKind,

    /// Plateau scheduling of the learning rate
    #[serde(default)]
    pub plateau: PlateauConfig,

    /// Optional checkpoint restored by the session's `load` call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pretrained: Option<PathBuf>,

    /// Serialization format for new checkpoints
    #[serde(default)]
    pub format: CheckpointFormat,

    /// Also write optimizer and scheduler state next to each checkpoint
    #[serde(default)]
    pub save_trainer_state: bool,

    /// Directory for checkpoints and the network description
    pub out_dir: PathBuf,
}

fn default_loss() -> LossKind {
    LossKind::L2
}

impl SessionConfig {
    /// Minimal configuration: everything defaulted except the required
    /// scale, learning rate, and output directory
    pub fn new(scale: usize, lr: f32, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            device: Device::default(),
            network: NetworkConfig {
                scale,
                hidden_channels: default_hidden_channels(),
                seed: None,
            },
            lr,
            weight_decay: 0.0,
            loss: default_loss(),
            plateau: PlateauConfig::default(),
            pretrained: None,
            format: CheckpointFormat::default(),
            save_trainer_state: false,
            out_dir: out_dir.into(),
        }
    }

    /// Validate the configuration
    ///
    /// Catches values a constructor could only fail on later, so a bad
    /// config never gets as far as allocating a network.
    pub fn validate(&self) -> Result<()> {
        if self.network.scale < 2 {
            return Err(Error::ConfigError(format!(
                "Upscaling factor must be at least 2, got {}",
                self.network.scale
            )));
        }
        if self.network.hidden_channels == 0 {
            return Err(Error::ConfigError(
                "hidden_channels must be positive".to_string(),
            ));
        }
        if !self.lr.is_finite() || self.lr <= 0.0 {
            return Err(Error::ConfigError(format!(
                "Learning rate must be positive and finite, got {}",
                self.lr
            )));
        }
        if !self.weight_decay.is_finite() || self.weight_decay < 0.0 {
            return Err(Error::ConfigError(format!(
                "Weight decay must be non-negative and finite, got {}",
                self.weight_decay
            )));
        }
        if !(self.plateau.factor > 0.0 && self.plateau.factor < 1.0) {
            return Err(Error::ConfigError(format!(
                "Plateau factor must be in (0, 1), got {}",
                self.plateau.factor
            )));
        }
        if self.plateau.min_lr < 0.0 {
            return Err(Error::ConfigError(
                "Plateau min_lr must be non-negative".to_string(),
            ));
        }
        if self.out_dir.as_os_str().is_empty() {
            return Err(Error::ConfigError(
                "Output directory must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Load and validate a session configuration from a YAML file
    ///
    /// # Example
    ///
    /// ```no_run
    /// use escalar::train::SessionConfig;
    ///
    /// let config = SessionConfig::from_yaml("train.yaml").unwrap();
    /// println!("Training at lr={}", config.lr);
    /// ```
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: SessionConfig = serde_yaml::from_str(&content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse YAML config: {e}")))?;

        config.validate()?;

        Ok(config)
    }
}
