//! Checkpoint loading

use super::checkpoint::{Checkpoint, CheckpointMeta, CheckpointState, TrainerState};
use super::format::CheckpointFormat;
use crate::net::Network;
use crate::{Error, Result, Tensor};
use safetensors::tensor::Dtype;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Load a checkpoint from a file
///
/// The format is automatically detected from the file extension.
///
/// # Example
///
/// ```no_run
/// use escalar::io::load_checkpoint;
///
/// let checkpoint = load_checkpoint("out/100_G.safetensors").unwrap();
/// println!("Loaded iteration {}", checkpoint.meta.iteration);
/// ```
pub fn load_checkpoint(path: impl AsRef<Path>) -> Result<Checkpoint> {
    let path = path.as_ref();

    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::Serialization("Checkpoint file has no extension".to_string()))?;

    let format = CheckpointFormat::from_extension(ext)
        .ok_or_else(|| Error::Serialization(format!("Unsupported file extension: {ext}")))?;

    match format {
        CheckpointFormat::SafeTensors => load_safetensors(path),
        CheckpointFormat::Json => {
            let mut file = File::open(path)?;
            let mut content = String::new();
            file.read_to_string(&mut content)?;

            let state: CheckpointState = serde_json::from_str(&content).map_err(|e| {
                Error::Serialization(format!("JSON deserialization failed: {e}"))
            })?;

            Checkpoint::from_state(state)
        }
    }
}

/// Load checkpoint from SafeTensors format (HuggingFace compatible)
fn load_safetensors(path: &Path) -> Result<Checkpoint> {
    let data = std::fs::read(path)?;

    // Header first, for the checkpoint metadata
    let (_, header) = safetensors::SafeTensors::read_metadata(&data)
        .map_err(|e| Error::Serialization(format!("SafeTensors parsing failed: {e}")))?;

    let custom_meta = header.metadata();
    let label = custom_meta
        .as_ref()
        .and_then(|m| m.get("label").cloned())
        .unwrap_or_else(|| "G".to_string());
    let iteration = custom_meta
        .as_ref()
        .and_then(|m| m.get("iteration"))
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    let safetensors = safetensors::SafeTensors::deserialize(&data)
        .map_err(|e| Error::Serialization(format!("SafeTensors parsing failed: {e}")))?;

    let mut parameters: Vec<(String, Tensor)> = Vec::with_capacity(safetensors.len());
    for name in safetensors.names() {
        let view = safetensors
            .tensor(name)
            .map_err(|e| Error::Serialization(format!("SafeTensors tensor {name}: {e}")))?;
        if view.dtype() != Dtype::F32 {
            return Err(Error::Serialization(format!(
                "Unsupported dtype {:?} for tensor {name}",
                view.dtype()
            )));
        }

        let values: &[f32] = bytemuck::cast_slice(view.data());
        let tensor = Tensor::from_shape_vec(view.shape(), values.to_vec(), true)?;
        parameters.push((name.to_string(), tensor));
    }

    Ok(Checkpoint::new(
        CheckpointMeta::new(label, iteration),
        parameters,
    ))
}

/// Copy checkpoint parameters into an existing network, in place
///
/// The whole checkpoint is validated against the network's parameter names
/// and shapes before the first value is written, so a mismatched or
/// corrupted checkpoint leaves the network exactly as it was.
pub fn apply_parameters(checkpoint: &Checkpoint, network: &mut dyn Network) -> Result<()> {
    // Validation pass
    for (name, current) in network.named_parameters() {
        let loaded = checkpoint.get_parameter(&name).ok_or_else(|| {
            Error::Serialization(format!("Checkpoint is missing parameter {name}"))
        })?;

        if loaded.len() != current.len() {
            return Err(Error::ShapeMismatch {
                expected: current.shape().to_vec(),
                got: loaded.shape().to_vec(),
            });
        }
    }
    if checkpoint.parameters.len() != network.named_parameters().len() {
        return Err(Error::Serialization(format!(
            "Checkpoint has {} parameters, network expects {}",
            checkpoint.parameters.len(),
            network.named_parameters().len()
        )));
    }

    // Write pass, only reached when every parameter lines up
    for (name, current) in network.named_parameters_mut() {
        // Presence was proven above
        if let Some(loaded) = checkpoint.get_parameter(&name) {
            current.data_mut().assign(loaded.data());
        }
    }

    Ok(())
}

/// Load optimizer and scheduler state saved by `save_trainer_state`
pub fn load_trainer_state(path: impl AsRef<Path>) -> Result<TrainerState> {
    let content = std::fs::read_to_string(path.as_ref())?;
    serde_json::from_str(&content)
        .map_err(|e| Error::Serialization(format!("Trainer state deserialization failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{save_checkpoint, save_trainer_state, SaveOptions};
    use crate::net::SubPixelNet;
    use crate::optim::{Adam, Optimizer, PlateauMode, ReduceLrOnPlateau};
    use std::io::Write;
    use tempfile::tempdir;

    fn sample_checkpoint() -> Checkpoint {
        let params = vec![
            (
                "conv1.weight".to_string(),
                Tensor::from_shape_vec(&[2, 2], vec![1.0, 2.0, 3.0, 4.0], true).unwrap(),
            ),
            (
                "conv1.bias".to_string(),
                Tensor::from_vec(vec![0.1, 0.2], true),
            ),
        ];
        Checkpoint::new(CheckpointMeta::new("G", 77), params)
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("77_G.json");

        let original = sample_checkpoint();
        save_checkpoint(&original, &path, &SaveOptions::new(CheckpointFormat::Json)).unwrap();

        let loaded = load_checkpoint(&path).unwrap();
        assert_eq!(loaded.meta.iteration, 77);
        assert_eq!(loaded.meta.label, "G");
        assert_eq!(loaded.parameters.len(), 2);

        for (name, tensor) in &original.parameters {
            let restored = loaded.get_parameter(name).unwrap();
            assert_eq!(restored.data(), tensor.data());
            assert_eq!(restored.shape(), tensor.shape());
        }
    }

    #[test]
    fn test_safetensors_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("77_G.safetensors");

        let original = sample_checkpoint();
        save_checkpoint(
            &original,
            &path,
            &SaveOptions::new(CheckpointFormat::SafeTensors),
        )
        .unwrap();

        let loaded = load_checkpoint(&path).unwrap();
        assert_eq!(loaded.meta.iteration, 77);
        assert_eq!(loaded.meta.label, "G");

        for (name, tensor) in &original.parameters {
            let restored = loaded.get_parameter(name).unwrap();
            assert_eq!(restored.data(), tensor.data());
            assert_eq!(restored.shape(), tensor.shape());
        }
    }

    #[test]
    fn test_load_unsupported_extension() {
        let result = load_checkpoint("model.pth");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_no_extension() {
        let result = load_checkpoint("checkpoint_without_extension");
        assert!(result.is_err());
        if let Err(err) = result {
            assert!(err.to_string().contains("no extension"));
        }
    }

    #[test]
    fn test_load_file_not_found() {
        let result = load_checkpoint("nonexistent.json");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");

        let mut f = File::create(&path).unwrap();
        f.write_all(b"{ invalid json }").unwrap();
        drop(f);

        let result = load_checkpoint(&path);
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn test_load_invalid_safetensors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.safetensors");

        let mut f = File::create(&path).unwrap();
        f.write_all(b"not valid safetensors binary data").unwrap();
        drop(f);

        let result = load_checkpoint(&path);
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn test_apply_parameters_in_place() {
        let mut source = SubPixelNet::new(2, 8, Some(11));
        let mut target = SubPixelNet::new(2, 8, Some(99));

        let checkpoint = Checkpoint::from_network("G", 0, &source);
        apply_parameters(&checkpoint, &mut target).unwrap();

        for ((_, a), (_, b)) in source
            .named_parameters()
            .iter()
            .zip(target.named_parameters().iter())
        {
            assert_eq!(a.data(), b.data());
        }
    }

    #[test]
    fn test_apply_parameters_rejects_wrong_architecture() {
        let source = SubPixelNet::new(2, 8, Some(11));
        let mut target = SubPixelNet::new(2, 16, Some(99));

        let before: Vec<f32> = target
            .named_parameters()
            .iter()
            .flat_map(|(_, t)| t.data().iter().copied().collect::<Vec<_>>())
            .collect();

        let checkpoint = Checkpoint::from_network("G", 0, &source);
        let result = apply_parameters(&checkpoint, &mut target);
        assert!(result.is_err());

        // Nothing may have been written
        let after: Vec<f32> = target
            .named_parameters()
            .iter()
            .flat_map(|(_, t)| t.data().iter().copied().collect::<Vec<_>>())
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_trainer_state_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("100_G.state.json");

        let mut optimizer = Adam::default_params(0.01);
        let mut param = Tensor::from_vec(vec![1.0, 2.0], true);
        param.set_grad(ndarray::Array1::from(vec![0.5, 0.5]));
        optimizer.step(&mut [&mut param]);

        let mut scheduler = ReduceLrOnPlateau::new(PlateauMode::Max, 0.5, 3, 1e-4, 1e-7);
        scheduler.step(20.0, &mut optimizer);

        let state = TrainerState {
            optimizer: optimizer.to_state(),
            scheduler: scheduler.to_state(),
        };
        save_trainer_state(&state, &path).unwrap();

        let loaded = load_trainer_state(&path).unwrap();
        assert_eq!(loaded.optimizer.t, 1);
        assert_eq!(loaded.scheduler.best, Some(20.0));
        assert_eq!(loaded.optimizer.m.len(), 1);
    }
}
