//! Integration tests for checkpoint persistence through the session API.
//!
//! Covers the uniquely-named artifact contract, weight restoration into a
//! fresh session, trainer-state sidecars, and the failure paths that must
//! leave a session's parameters untouched.

use escalar::error::Error;
use escalar::io::{self, CheckpointFormat};
use escalar::train::{SessionConfig, SyntheticPairs, TrainingSession};
use tempfile::tempdir;

fn test_config(out_dir: &std::path::Path, seed: u64) -> SessionConfig {
    let mut config = SessionConfig::new(2, 0.005, out_dir);
    config.network.hidden_channels = 8;
    config.network.seed = Some(seed);
    config
}

fn parameter_values(session: &TrainingSession) -> Vec<Vec<f32>> {
    session
        .network()
        .named_parameters()
        .iter()
        .map(|(_, t)| t.data().to_vec())
        .collect()
}

fn train_steps(session: &mut TrainingSession, steps: usize) {
    let mut pairs = SyntheticPairs::new(4, 4, 2, 13);
    let (low, high) = pairs.next_pair().unwrap();
    session.feed_data(low, high).unwrap();
    for _ in 0..steps {
        session.optimize_step().unwrap();
    }
}

#[test]
fn test_safetensors_roundtrip_between_sessions() {
    let dir = tempdir().unwrap();

    let mut source = TrainingSession::new(test_config(dir.path(), 1)).unwrap();
    train_steps(&mut source, 5);
    let path = source.save(100, "G").unwrap();
    assert_eq!(path.file_name().unwrap(), "100_G.safetensors");

    let mut config = test_config(dir.path(), 2);
    config.pretrained = Some(path);
    let mut restored = TrainingSession::new(config).unwrap();

    // Different seed, so the fresh weights cannot match by accident
    assert_ne!(parameter_values(&source), parameter_values(&restored));

    restored.load().unwrap();
    assert_eq!(parameter_values(&source), parameter_values(&restored));
}

#[test]
fn test_json_roundtrip_between_sessions() {
    let dir = tempdir().unwrap();

    let mut config = test_config(dir.path(), 1);
    config.format = CheckpointFormat::Json;
    let mut source = TrainingSession::new(config).unwrap();
    train_steps(&mut source, 5);
    let path = source.save(42, "G").unwrap();
    assert_eq!(path.file_name().unwrap(), "42_G.json");

    let mut config = test_config(dir.path(), 2);
    config.format = CheckpointFormat::Json;
    config.pretrained = Some(path);
    let mut restored = TrainingSession::new(config).unwrap();

    restored.load().unwrap();
    assert_eq!(parameter_values(&source), parameter_values(&restored));
}

#[test]
fn test_checkpoint_carries_metadata() {
    let dir = tempdir().unwrap();

    let source = TrainingSession::new(test_config(dir.path(), 1)).unwrap();
    let path = source.save(250, "G").unwrap();

    let checkpoint = io::load_checkpoint(&path).unwrap();
    assert_eq!(checkpoint.meta.label, "G");
    assert_eq!(checkpoint.meta.iteration, 250);
    assert_eq!(checkpoint.parameters.len(), 4);
    assert!(checkpoint.get_parameter("conv1.weight").is_some());
    assert!(checkpoint.get_parameter("conv2.bias").is_some());
}

#[test]
fn test_duplicate_save_is_rejected() {
    let dir = tempdir().unwrap();

    let session = TrainingSession::new(test_config(dir.path(), 1)).unwrap();
    session.save(100, "G").unwrap();

    let second = session.save(100, "G");
    assert!(matches!(second, Err(Error::CheckpointExists(_))));

    // Another iteration or label still goes through
    session.save(101, "G").unwrap();
    session.save(100, "best").unwrap();
}

#[test]
fn test_load_without_pretrained_is_noop() {
    let dir = tempdir().unwrap();

    let mut session = TrainingSession::new(test_config(dir.path(), 1)).unwrap();
    let before = parameter_values(&session);
    session.load().unwrap();
    assert_eq!(before, parameter_values(&session));
}

#[test]
fn test_load_consumes_configured_path() {
    let dir = tempdir().unwrap();

    let mut source = TrainingSession::new(test_config(dir.path(), 1)).unwrap();
    train_steps(&mut source, 3);
    let path = source.save(10, "G").unwrap();

    let mut config = test_config(dir.path(), 2);
    config.pretrained = Some(path.clone());
    let mut restored = TrainingSession::new(config).unwrap();
    restored.load().unwrap();

    // The path was consumed, so a second load survives the file vanishing
    std::fs::remove_file(&path).unwrap();
    restored.load().unwrap();
    assert_eq!(parameter_values(&source), parameter_values(&restored));
}

#[test]
fn test_failed_load_leaves_parameters_untouched() {
    let dir = tempdir().unwrap();
    let bad = dir.path().join("bad.safetensors");
    std::fs::write(&bad, b"not a checkpoint").unwrap();

    let mut config = test_config(dir.path(), 3);
    config.pretrained = Some(bad);
    let mut session = TrainingSession::new(config).unwrap();

    let before = parameter_values(&session);
    assert!(session.load().is_err());
    assert_eq!(before, parameter_values(&session));

    // The session stays fully usable after the failure
    train_steps(&mut session, 1);
}

#[test]
fn test_wrong_architecture_checkpoint_is_rejected() {
    let dir = tempdir().unwrap();

    let mut wide = test_config(dir.path(), 1);
    wide.network.hidden_channels = 16;
    let source = TrainingSession::new(wide).unwrap();
    let path = source.save(5, "G").unwrap();

    let mut narrow = test_config(dir.path(), 2);
    narrow.pretrained = Some(path);
    let mut session = TrainingSession::new(narrow).unwrap();

    let before = parameter_values(&session);
    assert!(session.load().is_err());
    assert_eq!(before, parameter_values(&session));
}

#[test]
fn test_trainer_state_sidecar_roundtrip() {
    let dir = tempdir().unwrap();

    let mut config = test_config(dir.path(), 1);
    config.save_trainer_state = true;
    let mut source = TrainingSession::new(config).unwrap();
    train_steps(&mut source, 3);

    // Drive the plateau scheduler past its patience so the saved state
    // carries a reduced learning rate
    source.update_learning_rate(30.0).unwrap();
    for _ in 0..4 {
        source.update_learning_rate(29.0).unwrap();
    }
    let reduced_lr = source.lr();
    assert!(reduced_lr < 0.005);

    let path = source.save(7, "G").unwrap();
    let sidecar = path.with_extension("state.json");
    assert!(sidecar.exists(), "expected trainer-state sidecar");

    let mut resumed = TrainingSession::new(test_config(dir.path(), 2)).unwrap();
    assert_eq!(resumed.lr(), 0.005);
    resumed.load_trainer_state(&sidecar).unwrap();
    assert_eq!(resumed.lr(), reduced_lr);
}

#[test]
fn test_sidecar_is_opt_in() {
    let dir = tempdir().unwrap();

    let session = TrainingSession::new(test_config(dir.path(), 1)).unwrap();
    let path = session.save(9, "G").unwrap();

    assert!(!path.with_extension("state.json").exists());
}

#[test]
fn test_formats_store_identical_parameters() {
    let dir = tempdir().unwrap();

    let mut config = test_config(dir.path(), 1);
    config.format = CheckpointFormat::SafeTensors;
    let mut session = TrainingSession::new(config).unwrap();
    train_steps(&mut session, 5);

    let st_path = session.save(1, "G").unwrap();
    let json_path = dir.path().join("1_G.json");
    let checkpoint = io::load_checkpoint(&st_path).unwrap();
    io::save_checkpoint(
        &checkpoint,
        &json_path,
        &io::SaveOptions::new(CheckpointFormat::Json),
    )
    .unwrap();

    let from_st = io::load_checkpoint(&st_path).unwrap();
    let from_json = io::load_checkpoint(&json_path).unwrap();

    for (name, tensor) in &from_st.parameters {
        let other = from_json.get_parameter(name).unwrap();
        assert_eq!(other.data(), tensor.data());
        assert_eq!(other.shape(), tensor.shape());
    }
}
