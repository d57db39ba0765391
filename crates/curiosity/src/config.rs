//! Run configuration.
//!
//! Every hyperparameter of a run lives in `TrainConfig`, which nests the
//! agent, world-model and VAE settings. Configs round-trip through JSON so a
//! run can be reproduced from the file written next to its checkpoints.

use crate::schedule::EpsilonSchedule;
use crate::{CuriosityError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
#[cfg(feature = "torch")]
use tch::Device;

/// What to do when a training batch contains a NaN reward
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NanRewardPolicy {
    /// Stop training with `CuriosityError::NanReward`
    Abort,
    /// Skip the update and keep going
    Skip,
}

/// Reward sanitation applied by the agent before each update
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RewardPolicy {
    pub nan: NanRewardPolicy,
    /// Clip rewards to `[-clip, clip]` when set
    pub clip: Option<f32>,
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self {
            nan: NanRewardPolicy::Abort,
            clip: None,
        }
    }
}

/// How a frozen copy follows its live counterpart
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetUpdate {
    /// Full parameter copy every `every` training steps
    Hard { every: u64 },
    /// Polyak averaging after every step: `target = tau * live + (1 - tau) * target`
    Soft { tau: f64 },
}

/// Which reward the agent learns from
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RewardMode {
    /// World-model prediction error only
    Intrinsic,
    /// Environment reward only; the world model still trains
    Extrinsic,
    /// `extrinsic + intrinsic_scale * intrinsic`
    Mixed { intrinsic_scale: f32 },
}

impl RewardMode {
    /// Reward the agent learns from for one transition
    pub fn mix(&self, extrinsic: f32, intrinsic: f32) -> f32 {
        match *self {
            RewardMode::Intrinsic => intrinsic,
            RewardMode::Extrinsic => extrinsic,
            RewardMode::Mixed { intrinsic_scale } => extrinsic + intrinsic_scale * intrinsic,
        }
    }
}

/// Q-network layer sizes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Hidden layer sizes of the dense stack for vector observations
    pub hidden_sizes: Vec<i64>,
    /// Width of the dense layer after the conv stack for image observations
    pub conv_hidden: i64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            hidden_sizes: vec![256, 256],
            conv_hidden: 512,
        }
    }
}

/// DQN agent hyperparameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DqnConfig {
    /// Planned number of training steps; also calibrates epsilon decay
    pub train_steps: u64,
    /// Discount factor
    pub gamma: f64,
    /// Epsilon reached halfway through training
    pub eps_half: f64,
    /// Epsilon floor
    pub eps_min: f64,
    /// Target network resync interval (training steps)
    pub target_network_steps: u64,
    /// Adam learning rate
    pub learning_rate: f64,
    /// Gradient norm bound applied before every optimizer step
    pub max_grad_norm: f64,
    pub reward_policy: RewardPolicy,
    pub network: NetworkConfig,
}

impl Default for DqnConfig {
    fn default() -> Self {
        Self {
            train_steps: 1_000_000,
            gamma: 0.99,
            eps_half: 0.08,
            eps_min: 0.025,
            target_network_steps: 500,
            learning_rate: 1e-3,
            max_grad_norm: 0.01,
            reward_policy: RewardPolicy::default(),
            network: NetworkConfig::default(),
        }
    }
}

impl DqnConfig {
    /// Epsilon schedule implied by this config
    pub fn epsilon_schedule(&self) -> Result<EpsilonSchedule> {
        EpsilonSchedule::new(self.train_steps, self.eps_half, self.eps_min)
    }

    pub fn validate(&self) -> Result<()> {
        self.epsilon_schedule()?;
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(invalid(format!("gamma must lie in [0, 1], got {}", self.gamma)));
        }
        if self.target_network_steps == 0 {
            return Err(invalid("target_network_steps must be positive"));
        }
        if self.learning_rate <= 0.0 || self.max_grad_norm <= 0.0 {
            return Err(invalid("learning_rate and max_grad_norm must be positive"));
        }
        if let Some(clip) = self.reward_policy.clip {
            if clip <= 0.0 {
                return Err(invalid("reward clip bound must be positive"));
            }
        }
        check_layers("network.hidden_sizes", &self.network.hidden_sizes)?;
        if self.network.conv_hidden <= 0 {
            return Err(invalid("network.conv_hidden must be positive"));
        }
        Ok(())
    }
}

/// VAE hyperparameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VaeConfig {
    /// Latent dimensionality
    pub z_dim: i64,
    pub learning_rate: f64,
    pub max_grad_norm: f64,
}

impl Default for VaeConfig {
    fn default() -> Self {
        Self {
            z_dim: 64,
            learning_rate: 1e-3,
            max_grad_norm: 1.0,
        }
    }
}

/// World-model hyperparameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldModelConfig {
    /// Hidden layer sizes of the dynamics MLP
    pub hidden_sizes: Vec<i64>,
    pub learning_rate: f64,
    pub max_grad_norm: f64,
    /// How the frozen target encoder follows the live one
    pub target_update: TargetUpdate,
    /// Encode observations with a VAE. Image observations always do.
    pub use_vae: bool,
    pub vae: VaeConfig,
}

impl Default for WorldModelConfig {
    fn default() -> Self {
        Self {
            hidden_sizes: vec![256, 256, 256],
            learning_rate: 1e-4,
            max_grad_norm: 1.0,
            target_update: TargetUpdate::Hard { every: 500 },
            use_vae: false,
            vae: VaeConfig::default(),
        }
    }
}

impl WorldModelConfig {
    pub fn validate(&self) -> Result<()> {
        check_layers("world_model.hidden_sizes", &self.hidden_sizes)?;
        if self.learning_rate <= 0.0 || self.max_grad_norm <= 0.0 {
            return Err(invalid("world_model learning_rate and max_grad_norm must be positive"));
        }
        match self.target_update {
            TargetUpdate::Hard { every } if every == 0 => {
                return Err(invalid("hard target update interval must be positive"))
            }
            TargetUpdate::Soft { tau } if !(tau > 0.0 && tau <= 1.0) => {
                return Err(invalid(format!("soft target tau must lie in (0, 1], got {}", tau)))
            }
            _ => {}
        }
        if self.vae.z_dim <= 0 || self.vae.learning_rate <= 0.0 || self.vae.max_grad_norm <= 0.0 {
            return Err(invalid("vae z_dim, learning_rate and max_grad_norm must be positive"));
        }
        Ok(())
    }
}

/// Configuration for a curiosity-driven training run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    // Data
    /// Replay buffer capacity
    pub buffer_size: usize,
    /// Transitions per training batch
    pub batch_size: usize,
    /// Transitions collected before the first update
    pub learning_starts: usize,

    // Rewards
    pub reward_mode: RewardMode,

    // Reporting
    /// Emit a metric summary every N training steps
    pub log_interval: u64,
    /// Save a checkpoint every N training steps (0 disables)
    pub checkpoint_interval: u64,
    /// Directory for checkpoints
    pub checkpoint_dir: PathBuf,
    /// Keep only the newest N checkpoints (0 keeps all)
    pub keep_last: usize,
    /// Show a progress bar
    pub progress: bool,

    // Device
    /// "cpu", "cuda", "cuda:N" or "auto"
    pub device: String,

    // Random seed
    pub seed: u64,

    pub dqn: DqnConfig,
    pub world_model: WorldModelConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            buffer_size: 20_000,
            batch_size: 64,
            learning_starts: 64,
            reward_mode: RewardMode::Intrinsic,
            log_interval: 1000,
            checkpoint_interval: 0,
            checkpoint_dir: PathBuf::from("checkpoints"),
            keep_last: 5,
            progress: false,
            device: "cpu".to_string(),
            seed: 1,
            dqn: DqnConfig::default(),
            world_model: WorldModelConfig::default(),
        }
    }
}

impl TrainConfig {
    /// Load a config from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let config: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty-printed JSON
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path.as_ref())?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Override learning rates and discount from `CURIOSITY_ALG_LR`,
    /// `CURIOSITY_WM_LR`, `CURIOSITY_VAE_LR` and `CURIOSITY_GAMMA`.
    pub fn with_env_overrides(mut self) -> Self {
        self.dqn.learning_rate = env_or("CURIOSITY_ALG_LR", self.dqn.learning_rate);
        self.world_model.learning_rate = env_or("CURIOSITY_WM_LR", self.world_model.learning_rate);
        self.world_model.vae.learning_rate =
            env_or("CURIOSITY_VAE_LR", self.world_model.vae.learning_rate);
        self.dqn.gamma = env_or("CURIOSITY_GAMMA", self.dqn.gamma);
        self
    }

    /// Set the planned number of training steps
    pub fn with_train_steps(mut self, steps: u64) -> Self {
        self.dqn.train_steps = steps;
        self
    }

    /// Set replay buffer capacity
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Set batch size; warm-up shrinks with it when it was tied to the old value
    pub fn with_batch_size(mut self, size: usize) -> Self {
        if self.learning_starts == self.batch_size {
            self.learning_starts = size;
        }
        self.batch_size = size;
        self
    }

    pub fn with_reward_mode(mut self, mode: RewardMode) -> Self {
        self.reward_mode = mode;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_checkpoints(mut self, dir: impl Into<PathBuf>, interval: u64) -> Self {
        self.checkpoint_dir = dir.into();
        self.checkpoint_interval = interval;
        self
    }

    pub fn with_log_interval(mut self, interval: u64) -> Self {
        self.log_interval = interval;
        self
    }

    /// Planned number of training steps
    pub fn train_steps(&self) -> u64 {
        self.dqn.train_steps
    }

    /// Resolve the configured device
    #[cfg(feature = "torch")]
    pub fn device(&self) -> Result<Device> {
        match self.device.as_str() {
            "cpu" => Ok(Device::Cpu),
            "auto" => Ok(Device::cuda_if_available()),
            "cuda" => Ok(Device::Cuda(0)),
            other => other
                .strip_prefix("cuda:")
                .and_then(|idx| idx.parse().ok())
                .map(Device::Cuda)
                .ok_or_else(|| invalid(format!("unknown device '{}'", other))),
        }
    }

    /// Check every invariant the trainer relies on
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 || self.batch_size == 0 {
            return Err(invalid("buffer_size and batch_size must be positive"));
        }
        if self.learning_starts == 0 || self.learning_starts > self.buffer_size {
            return Err(invalid(format!(
                "learning_starts must lie in [1, buffer_size], got {}",
                self.learning_starts
            )));
        }
        if self.log_interval == 0 {
            return Err(invalid("log_interval must be positive"));
        }
        if let RewardMode::Mixed { intrinsic_scale } = self.reward_mode {
            if !intrinsic_scale.is_finite() {
                return Err(invalid("intrinsic_scale must be finite"));
            }
        }
        match self.device.as_str() {
            "cpu" | "cuda" | "auto" => {}
            other if other.starts_with("cuda:") => {}
            other => return Err(invalid(format!("unknown device '{}'", other))),
        }
        self.dqn.validate()?;
        self.world_model.validate()
    }
}

fn invalid(msg: impl Into<String>) -> CuriosityError {
    CuriosityError::InvalidConfig(msg.into())
}

fn check_layers(name: &str, sizes: &[i64]) -> Result<()> {
    if sizes.is_empty() || sizes.iter().any(|&s| s <= 0) {
        return Err(invalid(format!("{} must be non-empty and positive", name)));
    }
    Ok(())
}

fn env_or(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        TrainConfig::default().validate().unwrap();
    }

    #[test]
    fn test_builder() {
        let config = TrainConfig::default()
            .with_train_steps(1000)
            .with_batch_size(16)
            .with_buffer_size(200)
            .with_reward_mode(RewardMode::Mixed { intrinsic_scale: 0.1 })
            .with_checkpoints("./ckpt", 100);

        assert_eq!(config.train_steps(), 1000);
        assert_eq!(config.batch_size, 16);
        assert_eq!(config.learning_starts, 16);
        assert_eq!(config.buffer_size, 200);
        assert_eq!(config.checkpoint_dir, PathBuf::from("./ckpt"));
        config.validate().unwrap();
    }

    #[test]
    fn test_validation_failures() {
        let mut config = TrainConfig::default();
        config.dqn.eps_half = 1.5;
        assert!(config.validate().is_err());

        let mut config = TrainConfig::default();
        config.world_model.target_update = TargetUpdate::Soft { tau: 0.0 };
        assert!(config.validate().is_err());

        let mut config = TrainConfig::default();
        config.learning_starts = config.buffer_size + 1;
        assert!(config.validate().is_err());

        let mut config = TrainConfig::default();
        config.device = "tpu".into();
        assert!(config.validate().is_err());

        let mut config = TrainConfig::default();
        config.dqn.network.hidden_sizes.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reward_mix() {
        assert_eq!(RewardMode::Intrinsic.mix(1.0, 0.25), 0.25);
        assert_eq!(RewardMode::Extrinsic.mix(1.0, 0.25), 1.0);
        let mixed = RewardMode::Mixed { intrinsic_scale: 2.0 };
        assert_eq!(mixed.mix(1.0, 0.25), 1.5);
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = TrainConfig::default().with_train_steps(1234);
        config.dqn.reward_policy = RewardPolicy {
            nan: NanRewardPolicy::Skip,
            clip: Some(1.0),
        };
        config.world_model.target_update = TargetUpdate::Soft { tau: 0.01 };

        config.to_json_file(&path).unwrap();
        let loaded = TrainConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded, config);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"kind\": \"soft\""));
        assert!(text.contains("\"nan\": \"skip\""));
    }
}
