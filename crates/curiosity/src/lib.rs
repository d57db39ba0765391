//! # Curiosity
//!
//! Deep Q-learning driven by world-model curiosity, in Rust.
//!
//! ## Overview
//!
//! The crate provides:
//! - An `Env` trait plus observation/action spaces and common wrappers
//! - A fixed-capacity `ReplayBuffer` with uniform sampling
//! - Q-networks for vector and image observations - requires `torch` feature
//! - A `DqnAgent` with a frozen target network and exponential epsilon decay
//! - A `WorldModel` whose prediction error is an intrinsic reward
//! - A `Vae` for learning latent representations of image observations
//! - `CuriosityTrainer`, the act/step/store/sample/train loop
//!
//! ## Features
//!
//! - `default` - Spaces, environments, replay buffer, schedules, checkpoints
//! - `torch` - Networks, agents, world models and training (requires libtorch)
//! - `tensorboard` - TensorBoard metric logging
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use curiosity::prelude::*;
//! use curiosity_envs::CartPole;
//!
//! let config = TrainConfig::default().with_train_steps(10_000);
//! let mut trainer = CuriosityTrainer::new(CartPole::new(), config)?;
//! let summary = trainer.run()?;
//! ```

pub mod buffer;
pub mod checkpoint;
pub mod env;
pub mod log;
pub mod network;
pub mod schedule;
pub mod spaces;
pub mod utils;

// Configuration is plain data and always available
pub mod config;

#[cfg(feature = "torch")]
pub mod agent;
#[cfg(feature = "torch")]
pub mod optim;
#[cfg(feature = "torch")]
pub mod training;
#[cfg(feature = "torch")]
pub mod vae;
#[cfg(feature = "torch")]
pub mod world_model;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::buffer::{DynamicsTransition, ReplayBuffer, Transition};
    pub use crate::config::{
        DqnConfig, NanRewardPolicy, NetworkConfig, RewardMode, RewardPolicy, TargetUpdate,
        TrainConfig, VaeConfig, WorldModelConfig,
    };
    pub use crate::env::{Env, EnvInfo, StepResult};
    pub use crate::schedule::EpsilonSchedule;
    pub use crate::spaces::*;

    pub use crate::checkpoint::Checkpointable;
    pub use crate::checkpoint::{CheckpointConfig, CheckpointManager, TrainingCheckpoint};
    pub use crate::network::{Architecture, ObsShape};

    #[cfg(feature = "tensorboard")]
    pub use crate::log::TensorBoardLogger;
    pub use crate::log::{CompositeLogger, ConsoleLogger, MemoryLogger, MetricLogger, TrainMetrics};

    #[cfg(feature = "torch")]
    pub use crate::agent::DqnAgent;
    #[cfg(feature = "torch")]
    pub use crate::network::{QNetwork, TargetNetwork};
    #[cfg(feature = "torch")]
    pub use crate::training::{
        evaluate, pretrain_vae, CuriosityTrainer, EvalSummary, PretrainConfig, TrainSummary,
    };
    #[cfg(feature = "torch")]
    pub use crate::vae::Vae;
    #[cfg(feature = "torch")]
    pub use crate::world_model::{LatentState, WorldModel};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error types for the library
#[derive(Debug, thiserror::Error)]
pub enum CuriosityError {
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cannot sample from an empty replay buffer")]
    EmptyBuffer,

    #[error("NaN reward in training batch at step {step}")]
    NanReward { step: u64 },

    #[error("Environment error: {0}")]
    EnvError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[cfg(feature = "torch")]
    #[error("Tensor error: {0}")]
    TensorError(#[from] tch::TchError),
}

pub type Result<T> = core::result::Result<T, CuriosityError>;
