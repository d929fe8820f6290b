//! Escalar CLI
//!
//! Single-command entry point for super-resolution training on synthetic
//! image pairs.
//!
//! # Usage
//!
//! ```bash
//! # Train from config
//! escalar train config.yaml
//!
//! # Train with overrides
//! escalar train config.yaml --iters 500 --lr 0.0005
//!
//! # Validate config
//! escalar validate config.yaml --detailed
//!
//! # Show config info
//! escalar info config.yaml --format yaml
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use escalar::train::{Metric, Psnr, SessionConfig, SyntheticPairs, TrainingSession};
use std::path::PathBuf;
use std::process::ExitCode;

/// Escalar: single-image super-resolution training
#[derive(Parser, Debug, Clone)]
#[command(name = "escalar")]
#[command(version)]
#[command(about = "Super-resolution training with a sub-pixel network and plateau scheduling")]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Train a network from YAML configuration
    Train(TrainArgs),

    /// Validate a configuration file without training
    Validate(ValidateArgs),

    /// Display information about a configuration
    Info(InfoArgs),
}

/// Arguments for the train command
#[derive(Parser, Debug, Clone)]
struct TrainArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Number of training iterations
    #[arg(short, long, default_value = "200")]
    iters: u64,

    /// Validate and checkpoint every N iterations
    #[arg(long, default_value = "25")]
    val_every: u64,

    /// Print training loss every N iterations
    #[arg(long, default_value = "10")]
    log_every: u64,

    /// Side length of the synthetic low-res images
    #[arg(long, default_value = "8")]
    size: usize,

    /// Override output directory
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Override learning rate
    #[arg(short, long)]
    lr: Option<f32>,

    /// Random seed for weight init and data generation
    #[arg(long)]
    seed: Option<u64>,

    /// Dry run (validate config but don't train)
    #[arg(long)]
    dry_run: bool,
}

/// Arguments for the validate command
#[derive(Parser, Debug, Clone)]
struct ValidateArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Show detailed validation report
    #[arg(short, long)]
    detailed: bool,
}

/// Arguments for the info command
#[derive(Parser, Debug, Clone)]
struct InfoArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,
}

/// Output format for the info command
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
    Yaml,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Configure output based on verbose/quiet flags
    let log_level = if cli.quiet {
        LogLevel::Quiet
    } else if cli.verbose {
        LogLevel::Verbose
    } else {
        LogLevel::Normal
    };

    let result = match cli.command {
        Command::Train(args) => run_train(args, log_level),
        Command::Validate(args) => run_validate(args, log_level),
        Command::Info(args) => run_info(args, log_level),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum LogLevel {
    Quiet,
    Normal,
    Verbose,
}

fn log(level: LogLevel, required: LogLevel, msg: &str) {
    if level != LogLevel::Quiet && (level == required || required == LogLevel::Normal) {
        println!("{msg}");
    }
}

fn run_train(args: TrainArgs, level: LogLevel) -> Result<(), String> {
    if args.val_every == 0 || args.log_every == 0 {
        return Err("--val-every and --log-every must be positive".to_string());
    }
    if args.size == 0 {
        return Err("--size must be positive".to_string());
    }

    log(
        level,
        LogLevel::Normal,
        &format!("Escalar: Training from {}", args.config.display()),
    );

    // Load and validate config
    let mut config =
        SessionConfig::from_yaml(&args.config).map_err(|e| format!("Config error: {e}"))?;

    // Apply command-line overrides, then re-validate
    if let Some(out_dir) = &args.out_dir {
        config.out_dir = out_dir.clone();
    }
    if let Some(lr) = args.lr {
        config.lr = lr;
    }
    if let Some(seed) = args.seed {
        config.network.seed = Some(seed);
    }
    config.validate().map_err(|e| format!("Config error: {e}"))?;

    if args.dry_run {
        log(
            level,
            LogLevel::Normal,
            "Dry run - config validated successfully",
        );
        log(
            level,
            LogLevel::Verbose,
            &format!("  Scale: x{}", config.network.scale),
        );
        log(
            level,
            LogLevel::Verbose,
            &format!("  Hidden channels: {}", config.network.hidden_channels),
        );
        log(level, LogLevel::Verbose, &format!("  Learning rate: {}", config.lr));
        log(
            level,
            LogLevel::Verbose,
            &format!("  Output dir: {}", config.out_dir.display()),
        );
        return Ok(());
    }

    let scale = config.network.scale;
    let data_seed = args.seed.or(config.network.seed).unwrap_or(42);

    let mut session = TrainingSession::new(config).map_err(|e| format!("Session error: {e}"))?;
    session
        .load()
        .map_err(|e| format!("Checkpoint load error: {e}"))?;

    // One held-out pair for validation feedback, then the training stream
    let mut pairs = SyntheticPairs::new(args.size, args.size, scale, data_seed);
    let (val_low, val_high) = pairs
        .next_pair()
        .map_err(|e| format!("Data error: {e}"))?;
    let psnr = Psnr::normalized();

    session.set_train_mode();
    let mut last_saved = 0;

    for iteration in 1..=args.iters {
        let (low, high) = pairs.next_pair().map_err(|e| format!("Data error: {e}"))?;
        session
            .feed_data(low, high)
            .map_err(|e| format!("Training error: {e}"))?;
        session
            .optimize_step()
            .map_err(|e| format!("Training error: {e}"))?;

        if iteration % args.log_every == 0 {
            let losses = session
                .current_losses()
                .map_err(|e| format!("Training error: {e}"))?;
            for (name, value) in losses {
                log(
                    level,
                    LogLevel::Normal,
                    &format!("iter {iteration:>6}  {name}={value:.6}  lr={:.2e}", session.lr()),
                );
            }
        }

        if iteration % args.val_every == 0 {
            session.set_eval_mode();
            session
                .feed_data(val_low.clone(), val_high.clone())
                .map_err(|e| format!("Validation error: {e}"))?;
            session
                .evaluate()
                .map_err(|e| format!("Validation error: {e}"))?;

            let visuals = session
                .current_visuals()
                .map_err(|e| format!("Validation error: {e}"))?;
            let prediction = &visuals[1].1;
            let ground_truth = &visuals[2].1;
            let db = psnr.compute(prediction, ground_truth);

            log(
                level,
                LogLevel::Normal,
                &format!("iter {iteration:>6}  validation PSNR={db:.2} dB"),
            );

            // An exact reconstruction has infinite PSNR; the scheduler only
            // accepts finite feedback
            if db.is_finite() {
                session
                    .update_learning_rate(db)
                    .map_err(|e| format!("Scheduler error: {e}"))?;
            }

            let path = session
                .save(iteration, "G")
                .map_err(|e| format!("Checkpoint error: {e}"))?;
            last_saved = iteration;
            log(
                level,
                LogLevel::Verbose,
                &format!("  checkpoint: {}", path.display()),
            );

            session.set_train_mode();
        }
    }

    // Final snapshot, unless the last validation already produced one
    if last_saved != args.iters {
        session
            .save(args.iters, "G")
            .map_err(|e| format!("Checkpoint error: {e}"))?;
    }

    log(level, LogLevel::Normal, "Training complete!");
    Ok(())
}

fn run_validate(args: ValidateArgs, level: LogLevel) -> Result<(), String> {
    log(
        level,
        LogLevel::Normal,
        &format!("Validating config: {}", args.config.display()),
    );

    let config = SessionConfig::from_yaml(&args.config).map_err(|e| format!("Config error: {e}"))?;

    log(level, LogLevel::Normal, "Configuration is valid");

    if args.detailed {
        println!();
        println!("Configuration Summary:");
        println!("  Device: {:?}", config.device);
        println!("  Scale: x{}", config.network.scale);
        println!("  Hidden channels: {}", config.network.hidden_channels);
        if let Some(seed) = config.network.seed {
            println!("  Seed: {seed}");
        }
        println!();
        println!("  Learning rate: {}", config.lr);
        println!("  Weight decay: {}", config.weight_decay);
        println!("  Loss: {:?}", config.loss);
        println!();
        println!("  Plateau mode: {:?}", config.plateau.mode);
        println!("  Plateau factor: {}", config.plateau.factor);
        println!("  Plateau patience: {}", config.plateau.patience);
        println!();
        if let Some(pretrained) = &config.pretrained {
            println!("  Pretrained: {}", pretrained.display());
        }
        println!("  Checkpoint format: {:?}", config.format);
        println!("  Save trainer state: {}", config.save_trainer_state);
        println!("  Output dir: {}", config.out_dir.display());
    }

    Ok(())
}

fn run_info(args: InfoArgs, level: LogLevel) -> Result<(), String> {
    let config = SessionConfig::from_yaml(&args.config).map_err(|e| format!("Config error: {e}"))?;

    match args.format {
        OutputFormat::Text => {
            log(level, LogLevel::Normal, "Configuration Info:");
            println!();
            println!("Network: x{} sub-pixel, {} hidden channels", config.network.scale, config.network.hidden_channels);
            println!("Optimizer: Adam (lr={}, weight_decay={})", config.lr, config.weight_decay);
            println!("Loss: {:?}", config.loss);
            println!("Output dir: {}", config.out_dir.display());

            if config.pretrained.is_some() {
                println!("Pretrained checkpoint: configured");
            }
            if config.save_trainer_state {
                println!("Trainer state checkpoints: enabled");
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&config)
                .map_err(|e| format!("JSON serialization error: {e}"))?;
            println!("{json}");
        }
        OutputFormat::Yaml => {
            let yaml = serde_yaml::to_string(&config)
                .map_err(|e| format!("YAML serialization error: {e}"))?;
            println!("{yaml}");
        }
    }

    Ok(())
}
