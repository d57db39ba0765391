//! curio CLI
//!
//! Command-line interface for curiosity-driven DQN training.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rand::Rng;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use curiosity::config::{RewardMode, TrainConfig};
use curiosity::env::Env;
use curiosity::log::{CompositeLogger, ConsoleLogger, MemoryLogger, MetricLogger};
use std::sync::Arc;
use curiosity_envs::{make, ENV_NAMES};

#[derive(Parser)]
#[command(name = "curio")]
#[command(version, about = "curio - DQN with world-model curiosity", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RewardArg {
    Intrinsic,
    Extrinsic,
    Mixed,
}

#[derive(Subcommand)]
enum Commands {
    /// Train an agent (requires --features torch)
    Train {
        /// Environment name
        #[arg(default_value = "cartpole")]
        env: String,

        /// JSON config file; defaults are used when absent
        #[arg(long)]
        config: Option<PathBuf>,

        /// Training steps (overrides the config)
        #[arg(long)]
        steps: Option<u64>,

        /// Reward the agent learns from
        #[arg(long, value_enum)]
        reward: Option<RewardArg>,

        /// Weight of the intrinsic term in mixed mode
        #[arg(long, default_value = "1.0")]
        intrinsic_scale: f32,

        /// Checkpoint directory
        #[arg(long)]
        checkpoint_dir: Option<PathBuf>,

        /// Save a checkpoint every N training steps
        #[arg(long)]
        checkpoint_interval: Option<u64>,

        /// Resume from the newest checkpoint in the checkpoint directory
        #[arg(long)]
        resume: bool,

        #[arg(long)]
        seed: Option<u64>,

        /// Write the metric history as JSON when training ends
        #[arg(long)]
        metrics_out: Option<PathBuf>,

        /// Also write TensorBoard event files to this directory
        /// (requires --features tensorboard)
        #[arg(long)]
        tensorboard: Option<PathBuf>,

        /// Show a progress bar
        #[arg(long)]
        progress: bool,
    },

    /// Evaluate a checkpoint, or a random policy when none is given
    Eval {
        /// Environment name
        env: String,

        /// Checkpoint file written by `train` (requires --features torch)
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Number of episodes
        #[arg(long, default_value = "10")]
        episodes: usize,

        /// Step limit per episode
        #[arg(long, default_value = "1000")]
        max_steps: usize,

        #[arg(long, default_value = "0")]
        seed: u64,
    },

    /// Fit the world model and its VAE on random-policy rollouts
    /// (requires --features torch)
    PretrainVae {
        /// Environment name
        #[arg(default_value = "pixel-grid")]
        env: String,

        /// Rollout episodes
        #[arg(long, default_value = "40")]
        episodes: usize,

        /// Gradient updates
        #[arg(long, default_value = "20000")]
        updates: usize,

        #[arg(long, default_value = "64")]
        batch_size: usize,

        /// Where to write the world-model state
        #[arg(long, default_value = "world_model.bin")]
        out: PathBuf,
    },

    /// List available environments
    List,

    /// Print the default config as JSON, or write it to a file
    Config {
        #[arg(long)]
        out: Option<PathBuf>,

        /// Validate an existing config file instead
        #[arg(long)]
        check: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            env,
            config,
            steps,
            reward,
            intrinsic_scale,
            checkpoint_dir,
            checkpoint_interval,
            resume,
            seed,
            metrics_out,
            tensorboard,
            progress,
        } => {
            let mut config = match config {
                Some(path) => TrainConfig::from_json_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => TrainConfig::default(),
            }
            .with_env_overrides();
            if let Some(steps) = steps {
                config = config.with_train_steps(steps);
            }
            if let Some(reward) = reward {
                config = config.with_reward_mode(reward_mode(reward, intrinsic_scale));
            }
            if let Some(seed) = seed {
                config = config.with_seed(seed);
            }
            if checkpoint_dir.is_some() || checkpoint_interval.is_some() {
                let dir = checkpoint_dir.unwrap_or_else(|| config.checkpoint_dir.clone());
                let interval = checkpoint_interval.unwrap_or(config.checkpoint_interval);
                config = config.with_checkpoints(dir, interval);
            }
            config.progress |= progress;
            config.validate()?;
            let history = Arc::new(MemoryLogger::new());
            let logger = build_logger(history.clone(), tensorboard)?;
            train(&env, config, resume, logger)?;
            if let Some(path) = metrics_out {
                history.save_json(&path)?;
                tracing::info!(path = %path.display(), "Saved metric history");
            }
        }
        Commands::Eval {
            env,
            checkpoint,
            episodes,
            max_steps,
            seed,
        } => {
            eval(&env, checkpoint, episodes, max_steps, seed)?;
        }
        Commands::PretrainVae {
            env,
            episodes,
            updates,
            batch_size,
            out,
        } => {
            pretrain(&env, episodes, updates, batch_size, out)?;
        }
        Commands::List => {
            list_envs();
        }
        Commands::Config { out, check } => {
            if let Some(path) = check {
                let config = TrainConfig::from_json_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?;
                println!(
                    "{} is valid ({} training steps)",
                    path.display(),
                    config.train_steps()
                );
            } else if let Some(path) = out {
                TrainConfig::default().to_json_file(&path)?;
                println!("Wrote default config to {}", path.display());
            } else {
                println!("{}", serde_json::to_string_pretty(&TrainConfig::default())?);
            }
        }
    }

    Ok(())
}

fn reward_mode(arg: RewardArg, intrinsic_scale: f32) -> RewardMode {
    match arg {
        RewardArg::Intrinsic => RewardMode::Intrinsic,
        RewardArg::Extrinsic => RewardMode::Extrinsic,
        RewardArg::Mixed => RewardMode::Mixed { intrinsic_scale },
    }
}

fn make_env(name: &str) -> Result<Box<dyn Env>> {
    match make(name) {
        Some(env) => Ok(env),
        None => bail!(
            "unknown environment '{}', expected one of: {}",
            name,
            ENV_NAMES.join(", ")
        ),
    }
}

/// Console output plus the in-memory history, and TensorBoard when asked for
fn build_logger(
    history: Arc<MemoryLogger>,
    tensorboard: Option<PathBuf>,
) -> Result<CompositeLogger> {
    let loggers: Vec<Box<dyn MetricLogger>> =
        vec![Box::new(ConsoleLogger::new()), Box::new(history)];
    let mut logger = CompositeLogger::new(loggers);
    if let Some(dir) = tensorboard {
        add_tensorboard(&mut logger, dir)?;
    }
    Ok(logger)
}

#[cfg(feature = "tensorboard")]
fn add_tensorboard(logger: &mut CompositeLogger, dir: PathBuf) -> Result<()> {
    use curiosity::log::TensorBoardLogger;

    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    tracing::info!(dir = %dir.display(), "Writing TensorBoard events");
    logger.add(Box::new(TensorBoardLogger::new(dir)));
    Ok(())
}

#[cfg(not(feature = "tensorboard"))]
fn add_tensorboard(_logger: &mut CompositeLogger, _dir: PathBuf) -> Result<()> {
    bail!("--tensorboard requires the 'tensorboard' feature")
}

#[cfg(feature = "torch")]
fn train(env_name: &str, config: TrainConfig, resume: bool, logger: CompositeLogger) -> Result<()> {
    use curiosity::training::CuriosityTrainer;

    let env = make_env(env_name)?;
    tracing::info!(
        env = env_name,
        train_steps = config.train_steps(),
        reward_mode = ?config.reward_mode,
        "Starting training"
    );

    let mut trainer = CuriosityTrainer::new(env, config)?.with_logger(Box::new(logger));
    if resume {
        match trainer.resume_latest()? {
            Some(step) => tracing::info!(step, "Resumed"),
            None => tracing::warn!("No checkpoint to resume from, starting fresh"),
        }
    }

    let summary = trainer.run()?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[cfg(not(feature = "torch"))]
fn train(
    _env_name: &str,
    _config: TrainConfig,
    _resume: bool,
    _logger: CompositeLogger,
) -> Result<()> {
    tracing::error!("Training requires the 'torch' feature. Rebuild with:");
    tracing::error!("  cargo build --features torch");
    bail!("curio was built without the 'torch' feature")
}

fn eval(
    env_name: &str,
    checkpoint: Option<PathBuf>,
    episodes: usize,
    max_steps: usize,
    seed: u64,
) -> Result<()> {
    let mut env = make_env(env_name)?;
    match checkpoint {
        Some(path) => eval_checkpoint(env.as_mut(), &path, episodes, max_steps, seed),
        None => eval_random(env.as_mut(), episodes, max_steps, seed),
    }
}

fn eval_random(env: &mut dyn Env, episodes: usize, max_steps: usize, seed: u64) -> Result<()> {
    tracing::info!(episodes, "Starting evaluation (random policy)");
    let num_actions = env.action_space().num_actions()?;
    let mut rng = rand::thread_rng();

    let mut returns = Vec::with_capacity(episodes);
    for ep in 0..episodes {
        env.reset(Some(seed + ep as u64));
        let mut ret = 0.0f64;
        for _ in 0..max_steps {
            let result = env.step(rng.gen_range(0..num_actions));
            ret += result.reward as f64;
            if result.done() {
                break;
            }
        }
        returns.push(ret);
    }

    report_returns(&returns);
    Ok(())
}

#[cfg(feature = "torch")]
fn eval_checkpoint(
    env: &mut dyn Env,
    path: &std::path::Path,
    episodes: usize,
    max_steps: usize,
    seed: u64,
) -> Result<()> {
    use curiosity::agent::DqnAgent;
    use curiosity::checkpoint::{Checkpointable, TrainingCheckpoint};
    use curiosity::training::evaluate;

    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let bundle = TrainingCheckpoint::from_bytes(&bytes)?;
    let config: TrainConfig = if bundle.config.is_empty() {
        TrainConfig::default()
    } else {
        serde_json::from_str(&bundle.config)?
    };

    let obs_shape = env.observation_space().observation_shape();
    let num_actions = env.action_space().num_actions()?;
    let mut agent = DqnAgent::new(
        &obs_shape,
        num_actions,
        &config.dqn,
        config.device()?,
        config.seed,
    )?;
    agent.load_state(&bundle.agent)?;
    tracing::info!(step = bundle.step, episodes, "Starting evaluation (greedy policy)");

    let summary = evaluate(env, &mut agent, episodes, max_steps, Some(seed))?;
    report_returns(&summary.returns);
    Ok(())
}

#[cfg(not(feature = "torch"))]
fn eval_checkpoint(
    _env: &mut dyn Env,
    _path: &std::path::Path,
    _episodes: usize,
    _max_steps: usize,
    _seed: u64,
) -> Result<()> {
    bail!("evaluating a checkpoint requires the 'torch' feature")
}

fn report_returns(returns: &[f64]) {
    let mean = if returns.is_empty() {
        0.0
    } else {
        returns.iter().sum::<f64>() / returns.len() as f64
    };
    let best = returns.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    tracing::info!(episodes = returns.len(), mean, "Evaluation complete");
    println!("episodes: {}", returns.len());
    println!("mean return: {:.3}", mean);
    if best.is_finite() {
        println!("best return: {:.3}", best);
    }
}

#[cfg(feature = "torch")]
fn pretrain(
    env_name: &str,
    episodes: usize,
    updates: usize,
    batch_size: usize,
    out: PathBuf,
) -> Result<()> {
    use curiosity::checkpoint::Checkpointable;
    use curiosity::training::{pretrain_vae, PretrainConfig};
    use curiosity::world_model::WorldModel;

    let mut env = make_env(env_name)?;
    let config = TrainConfig::default().with_env_overrides();
    let obs_shape = env.observation_space().observation_shape();
    let num_actions = env.action_space().num_actions()?;
    let mut world_model = WorldModel::new(
        &obs_shape,
        num_actions,
        &config.world_model,
        config.device()?,
    )?;

    let pretrain_config = PretrainConfig {
        episodes,
        updates,
        batch_size,
        seed: config.seed,
        ..Default::default()
    };
    let summary = pretrain_vae(&mut env, &mut world_model, &pretrain_config)?;
    std::fs::write(&out, world_model.save_state()?)
        .with_context(|| format!("writing {}", out.display()))?;

    println!("transitions: {}", summary.transitions);
    println!("world model loss: {:.5}", summary.world_model_loss);
    if let Some(vae_loss) = summary.vae_loss {
        println!("vae loss: {:.3}", vae_loss);
    }
    println!("saved to {}", out.display());
    Ok(())
}

#[cfg(not(feature = "torch"))]
fn pretrain(
    _env_name: &str,
    _episodes: usize,
    _updates: usize,
    _batch_size: usize,
    _out: PathBuf,
) -> Result<()> {
    bail!("pretrain-vae requires the 'torch' feature")
}

fn list_envs() {
    println!("Available environments:");
    println!("  cartpole    - Classic control, 4-d vector observations");
    println!("  pixel-grid  - Grid navigation, 1x36x36 image observations");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_feeds_history() {
        let history = Arc::new(MemoryLogger::new());
        let logger = build_logger(history.clone(), None).unwrap();
        assert_eq!(logger.len(), 2);

        logger.log_metrics(&[("score", 3.0), ("epsilon", 0.5)], 100);
        assert_eq!(history.series("score"), vec![(100, 3.0)]);
        assert_eq!(history.latest("epsilon"), Some(0.5));
    }

    #[test]
    fn test_reward_mode_args() {
        assert_eq!(reward_mode(RewardArg::Intrinsic, 2.0), RewardMode::Intrinsic);
        assert_eq!(
            reward_mode(RewardArg::Mixed, 0.1),
            RewardMode::Mixed {
                intrinsic_scale: 0.1
            }
        );
    }

    #[cfg(feature = "tensorboard")]
    #[test]
    fn test_tensorboard_joins_composite() {
        let dir = tempfile::tempdir().unwrap();
        let events = dir.path().join("tb");
        let history = Arc::new(MemoryLogger::new());
        let logger = build_logger(history, Some(events.clone())).unwrap();
        assert_eq!(logger.len(), 3);

        logger.log_metrics(&[("score", 1.0)], 1);
        logger.close();
        assert!(std::fs::read_dir(&events).unwrap().next().is_some());
    }

    #[cfg(not(feature = "tensorboard"))]
    #[test]
    fn test_tensorboard_needs_feature() {
        let history = Arc::new(MemoryLogger::new());
        assert!(build_logger(history, Some(PathBuf::from("tb"))).is_err());
    }
}
