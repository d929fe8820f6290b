//! Checkpoint structure for serialization

use crate::error::{Error, Result};
use crate::net::Network;
use crate::optim::{AdamState, PlateauState};
use crate::Tensor;
use serde::{Deserialize, Serialize};

/// Checkpoint metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMeta {
    /// Network label the snapshot belongs to (e.g. "G")
    pub label: String,

    /// Training iteration at which the snapshot was taken
    pub iteration: u64,

    /// Crate version that wrote the checkpoint
    pub version: String,
}

impl CheckpointMeta {
    /// Create metadata for the current crate version
    pub fn new(label: impl Into<String>, iteration: u64) -> Self {
        Self {
            label: label.into(),
            iteration,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Information about a checkpointed parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterInfo {
    /// Parameter name (e.g. "conv1.weight")
    pub name: String,

    /// Logical parameter shape
    pub shape: Vec<usize>,

    /// Data type (currently always "f32")
    pub dtype: String,

    /// Whether this parameter requires gradients
    pub requires_grad: bool,
}

/// Serializable checkpoint state for text formats
///
/// Parameter values are flattened into one buffer in declaration order;
/// `parameters` carries the per-tensor layout needed to slice it back up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointState {
    /// Checkpoint metadata
    pub meta: CheckpointMeta,

    /// Parameter information
    pub parameters: Vec<ParameterInfo>,

    /// Flattened parameter data
    pub data: Vec<f32>,
}

/// Optimizer and scheduler state saved alongside a network checkpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerState {
    /// Adam moments and step count
    pub optimizer: AdamState,

    /// Plateau tracking state
    pub scheduler: PlateauState,
}

/// In-memory snapshot of a network's named parameters
pub struct Checkpoint {
    /// Checkpoint metadata
    pub meta: CheckpointMeta,

    /// Named parameter snapshots, in the network's parameter order
    pub parameters: Vec<(String, Tensor)>,
}

impl Checkpoint {
    /// Create a new checkpoint
    pub fn new(meta: CheckpointMeta, parameters: Vec<(String, Tensor)>) -> Self {
        Self { meta, parameters }
    }

    /// Snapshot a network's parameters
    pub fn from_network(label: &str, iteration: u64, network: &dyn Network) -> Self {
        let parameters = network
            .named_parameters()
            .into_iter()
            .map(|(name, tensor)| (name, tensor.clone()))
            .collect();

        Self {
            meta: CheckpointMeta::new(label, iteration),
            parameters,
        }
    }

    /// Get parameter by name
    pub fn get_parameter(&self, name: &str) -> Option<&Tensor> {
        self.parameters
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
    }

    /// Convert checkpoint to serializable state
    pub fn to_state(&self) -> CheckpointState {
        let mut data = Vec::new();
        let parameters: Vec<ParameterInfo> = self
            .parameters
            .iter()
            .map(|(name, tensor)| {
                data.extend(tensor.data().iter().copied());

                ParameterInfo {
                    name: name.clone(),
                    shape: tensor.shape().to_vec(),
                    dtype: "f32".to_string(),
                    requires_grad: tensor.requires_grad(),
                }
            })
            .collect();

        CheckpointState {
            meta: self.meta.clone(),
            parameters,
            data,
        }
    }

    /// Reconstruct a checkpoint from serializable state
    ///
    /// Fails if the flattened buffer disagrees with the declared shapes, so
    /// a truncated or hand-edited file never produces a half-built snapshot.
    pub fn from_state(state: CheckpointState) -> Result<Self> {
        let expected: usize = state
            .parameters
            .iter()
            .map(|p| p.shape.iter().product::<usize>())
            .sum();
        if expected != state.data.len() {
            return Err(Error::Serialization(format!(
                "Checkpoint data holds {} values but declared shapes need {}",
                state.data.len(),
                expected
            )));
        }

        let mut data_offset = 0;
        let mut parameters = Vec::with_capacity(state.parameters.len());
        for param_info in state.parameters {
            if param_info.dtype != "f32" {
                return Err(Error::Serialization(format!(
                    "Unsupported parameter dtype: {}",
                    param_info.dtype
                )));
            }

            let size: usize = param_info.shape.iter().product();
            let param_data = state.data[data_offset..data_offset + size].to_vec();
            data_offset += size;

            let tensor =
                Tensor::from_shape_vec(&param_info.shape, param_data, param_info.requires_grad)?;
            parameters.push((param_info.name, tensor));
        }

        Ok(Self {
            meta: state.meta,
            parameters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_creation() {
        let meta = CheckpointMeta::new("G", 500);
        assert_eq!(meta.label, "G");
        assert_eq!(meta.iteration, 500);
        assert_eq!(meta.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_parameter_access() {
        let params = vec![
            (
                "conv1.weight".to_string(),
                Tensor::from_vec(vec![1.0, 2.0, 3.0], true),
            ),
            (
                "conv1.bias".to_string(),
                Tensor::from_vec(vec![0.1], true),
            ),
        ];

        let checkpoint = Checkpoint::new(CheckpointMeta::new("G", 0), params);

        assert!(checkpoint.get_parameter("conv1.weight").is_some());
        assert!(checkpoint.get_parameter("conv1.bias").is_some());
        assert!(checkpoint.get_parameter("nonexistent").is_none());
    }

    #[test]
    fn test_state_round_trip_preserves_shapes() {
        let params = vec![
            (
                "conv1.weight".to_string(),
                Tensor::from_shape_vec(&[2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], true).unwrap(),
            ),
            (
                "conv1.bias".to_string(),
                Tensor::from_vec(vec![0.1, 0.2], false),
            ),
        ];

        let original = Checkpoint::new(CheckpointMeta::new("G", 42), params);
        let state = original.to_state();
        let restored = Checkpoint::from_state(state).unwrap();

        assert_eq!(restored.meta.iteration, 42);
        assert_eq!(restored.parameters.len(), 2);

        let weight = restored.get_parameter("conv1.weight").unwrap();
        assert_eq!(weight.shape(), &[2, 3]);
        assert_eq!(
            weight.data(),
            original.get_parameter("conv1.weight").unwrap().data()
        );

        let bias = restored.get_parameter("conv1.bias").unwrap();
        assert!(!bias.requires_grad());
    }

    #[test]
    fn test_from_state_rejects_truncated_data() {
        let state = CheckpointState {
            meta: CheckpointMeta::new("G", 0),
            parameters: vec![ParameterInfo {
                name: "w".to_string(),
                shape: vec![4],
                dtype: "f32".to_string(),
                requires_grad: true,
            }],
            data: vec![1.0, 2.0], // two values short
        };

        let result = Checkpoint::from_state(state);
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn test_from_state_rejects_unknown_dtype() {
        let state = CheckpointState {
            meta: CheckpointMeta::new("G", 0),
            parameters: vec![ParameterInfo {
                name: "w".to_string(),
                shape: vec![1],
                dtype: "f64".to_string(),
                requires_grad: true,
            }],
            data: vec![1.0],
        };

        let result = Checkpoint::from_state(state);
        assert!(matches!(result, Err(Error::Serialization(_))));
    }
}
