//! Checkpoint trait and the run-level checkpoint bundle.

use crate::Result;
use serde::{Deserialize, Serialize};

/// A component whose state can be written to and restored from bytes.
///
/// The blob format is private to the implementor; callers only move the
/// bytes around.
pub trait Checkpointable {
    /// Serialize the component's state to bytes.
    fn save_state(&self) -> Result<Vec<u8>>;

    /// Restore the component's state from bytes.
    fn load_state(&mut self, data: &[u8]) -> Result<()>;
}

/// Everything needed to resume a curiosity run.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TrainingCheckpoint {
    /// Agent training steps at save time
    pub step: u64,
    /// Environment steps at save time
    pub env_steps: u64,
    /// Mean extrinsic score over recent episodes
    pub score: f64,
    /// Agent blob
    pub agent: Vec<u8>,
    /// World-model blob
    pub world_model: Vec<u8>,
    /// JSON of the `TrainConfig` that produced the run
    pub config: String,
    /// Seconds since the Unix epoch
    pub timestamp: u64,
    /// Crate version that wrote the checkpoint
    pub version: String,
}

impl TrainingCheckpoint {
    pub fn new(step: u64, agent: Vec<u8>, world_model: Vec<u8>) -> Self {
        Self {
            step,
            env_steps: 0,
            score: 0.0,
            agent,
            world_model,
            config: String::new(),
            timestamp: unix_timestamp(),
            version: crate::VERSION.to_string(),
        }
    }

    pub fn with_env_steps(mut self, env_steps: u64) -> Self {
        self.env_steps = env_steps;
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    pub fn with_config(mut self, config: &crate::config::TrainConfig) -> Result<Self> {
        self.config = serde_json::to_string(config)?;
        Ok(self)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// A bundle is itself checkpointable, so the manager can store it directly
impl Checkpointable for TrainingCheckpoint {
    fn save_state(&self) -> Result<Vec<u8>> {
        self.to_bytes()
    }

    fn load_state(&mut self, data: &[u8]) -> Result<()> {
        *self = Self::from_bytes(data)?;
        Ok(())
    }
}

fn unix_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
