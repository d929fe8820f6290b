//! Checkpoint saving

use super::checkpoint::{Checkpoint, TrainerState};
use super::format::{CheckpointFormat, SaveOptions};
use crate::{Error, Result};
use safetensors::tensor::{Dtype, TensorView};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Save a checkpoint to a file
///
/// Refuses to overwrite: every save call must produce a uniquely named
/// artifact, so an existing file at `path` is an error rather than a
/// replacement.
///
/// # Arguments
///
/// * `checkpoint` - The parameter snapshot to save
/// * `path` - Output file path
/// * `options` - Save options (format, pretty-printing)
///
/// # Example
///
/// ```no_run
/// use escalar::io::{save_checkpoint, Checkpoint, CheckpointFormat, CheckpointMeta, SaveOptions};
/// # use escalar::Tensor;
///
/// let params = vec![("conv1.weight".to_string(), Tensor::from_vec(vec![1.0, 2.0], true))];
/// let checkpoint = Checkpoint::new(CheckpointMeta::new("G", 100), params);
/// let options = SaveOptions::new(CheckpointFormat::Json);
///
/// save_checkpoint(&checkpoint, "out/100_G.json", &options).unwrap();
/// ```
pub fn save_checkpoint(
    checkpoint: &Checkpoint,
    path: impl AsRef<Path>,
    options: &SaveOptions,
) -> Result<()> {
    let path = path.as_ref();

    if path.exists() {
        return Err(Error::CheckpointExists(path.to_path_buf()));
    }

    match options.format {
        CheckpointFormat::SafeTensors => save_safetensors(checkpoint, path),
        CheckpointFormat::Json => {
            let state = checkpoint.to_state();
            let data = if options.pretty {
                serde_json::to_string_pretty(&state)
                    .map_err(|e| Error::Serialization(format!("JSON serialization failed: {e}")))?
            } else {
                serde_json::to_string(&state)
                    .map_err(|e| Error::Serialization(format!("JSON serialization failed: {e}")))?
            };
            let mut file = File::create(path)?;
            file.write_all(data.as_bytes())?;
            Ok(())
        }
    }
}

/// Save checkpoint in SafeTensors format (HuggingFace compatible)
fn save_safetensors(checkpoint: &Checkpoint, path: &Path) -> Result<()> {
    // Collect tensor data with proper lifetime management
    let tensor_data: Vec<(String, Vec<u8>, Vec<usize>)> = checkpoint
        .parameters
        .iter()
        .map(|(name, tensor)| {
            let bytes: Vec<u8> = tensor
                .data()
                .iter()
                .flat_map(|v| v.to_le_bytes())
                .collect();
            (name.clone(), bytes, tensor.shape().to_vec())
        })
        .collect();

    // Create TensorViews from collected data
    let views: Vec<(&str, TensorView<'_>)> = tensor_data
        .iter()
        .map(|(name, bytes, shape)| {
            let view = TensorView::new(Dtype::F32, shape.clone(), bytes).map_err(|e| {
                Error::Serialization(format!("SafeTensors view for {name} failed: {e:?}"))
            })?;
            Ok((name.as_str(), view))
        })
        .collect::<Result<_>>()?;

    // Carry checkpoint metadata in the safetensors header
    let mut metadata = HashMap::new();
    metadata.insert("label".to_string(), checkpoint.meta.label.clone());
    metadata.insert(
        "iteration".to_string(),
        checkpoint.meta.iteration.to_string(),
    );
    metadata.insert("version".to_string(), checkpoint.meta.version.clone());

    let safetensor_bytes = safetensors::serialize(views, &Some(metadata))
        .map_err(|e| Error::Serialization(format!("SafeTensors serialization failed: {e}")))?;

    std::fs::write(path, safetensor_bytes)?;

    Ok(())
}

/// Save optimizer and scheduler state next to a checkpoint
///
/// Trainer state is always JSON regardless of the checkpoint format; it is
/// small and benefits from being inspectable.
pub fn save_trainer_state(state: &TrainerState, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();

    if path.exists() {
        return Err(Error::CheckpointExists(path.to_path_buf()));
    }

    let data = serde_json::to_string(state)
        .map_err(|e| Error::Serialization(format!("Trainer state serialization failed: {e}")))?;
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::CheckpointMeta;
    use crate::optim::{Adam, ReduceLrOnPlateau, PlateauMode};
    use crate::Tensor;
    use tempfile::tempdir;

    fn sample_checkpoint() -> Checkpoint {
        let params = vec![
            (
                "conv1.weight".to_string(),
                Tensor::from_shape_vec(&[2, 2], vec![1.0, 2.0, 3.0, 4.0], true).unwrap(),
            ),
            (
                "conv1.bias".to_string(),
                Tensor::from_vec(vec![0.1], true),
            ),
        ];
        Checkpoint::new(CheckpointMeta::new("G", 100), params)
    }

    #[test]
    fn test_save_checkpoint_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("100_G.json");

        let options = SaveOptions::new(CheckpointFormat::Json);
        save_checkpoint(&sample_checkpoint(), &path, &options).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("conv1.weight"));
        assert!(content.contains("\"iteration\": 100"));
    }

    #[test]
    fn test_save_checkpoint_json_compact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("100_G.json");

        let options = SaveOptions::new(CheckpointFormat::Json).with_pretty(false);
        save_checkpoint(&sample_checkpoint(), &path, &options).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn test_save_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("100_G.json");

        let options = SaveOptions::new(CheckpointFormat::Json);
        save_checkpoint(&sample_checkpoint(), &path, &options).unwrap();

        let second = save_checkpoint(&sample_checkpoint(), &path, &options);
        assert!(matches!(second, Err(Error::CheckpointExists(_))));
    }

    #[test]
    fn test_save_checkpoint_safetensors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("100_G.safetensors");

        let options = SaveOptions::new(CheckpointFormat::SafeTensors);
        save_checkpoint(&sample_checkpoint(), &path, &options).unwrap();

        // Verify we can read it back with the safetensors crate
        let data = std::fs::read(&path).unwrap();
        let loaded = safetensors::SafeTensors::deserialize(&data).unwrap();
        assert_eq!(loaded.len(), 2);

        let weight = loaded.tensor("conv1.weight").unwrap();
        assert_eq!(weight.shape(), &[2, 2]);
        let weight_data: &[f32] = bytemuck::cast_slice(weight.data());
        assert_eq!(weight_data, &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_save_safetensors_metadata() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("100_G.safetensors");

        let options = SaveOptions::new(CheckpointFormat::SafeTensors);
        save_checkpoint(&sample_checkpoint(), &path, &options).unwrap();

        let data = std::fs::read(&path).unwrap();
        let (_, header) = safetensors::SafeTensors::read_metadata(&data).unwrap();

        let metadata = header.metadata();
        let meta = metadata.as_ref().unwrap();
        assert_eq!(meta.get("label").unwrap(), "G");
        assert_eq!(meta.get("iteration").unwrap(), "100");
    }

    #[test]
    fn test_save_checkpoint_invalid_path() {
        let options = SaveOptions::new(CheckpointFormat::Json);
        let result = save_checkpoint(
            &sample_checkpoint(),
            "/nonexistent/directory/100_G.json",
            &options,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_save_trainer_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("100_G.state.json");

        let optimizer = Adam::default_params(0.001);
        let scheduler = ReduceLrOnPlateau::new(PlateauMode::Max, 0.5, 3, 1e-4, 1e-7);
        let state = TrainerState {
            optimizer: optimizer.to_state(),
            scheduler: scheduler.to_state(),
        };

        save_trainer_state(&state, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"lr\":0.001"));
    }
}
