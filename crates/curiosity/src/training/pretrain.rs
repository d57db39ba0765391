//! World-model pretraining on random-policy rollouts.

use crate::buffer::{DynamicsTransition, ReplayBuffer};
use crate::env::Env;
use crate::world_model::WorldModel;
use crate::{CuriosityError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PretrainConfig {
    /// Random-policy episodes collected before training
    pub episodes: usize,
    /// Cut episodes after this many steps
    pub max_episode_steps: usize,
    /// Joint VAE + dynamics updates
    pub updates: usize,
    pub batch_size: usize,
    pub buffer_size: usize,
    /// Log losses every N updates
    pub log_every: usize,
    pub seed: u64,
}

impl Default for PretrainConfig {
    fn default() -> Self {
        Self {
            episodes: 40,
            max_episode_steps: 10_000,
            updates: 20_000,
            batch_size: 64,
            buffer_size: 40_000,
            log_every: 500,
            seed: 0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PretrainSummary {
    pub transitions: usize,
    pub updates: usize,
    /// Last dynamics loss
    pub world_model_loss: f64,
    /// Last VAE loss, when the world model has one
    pub vae_loss: Option<f64>,
}

/// Fill a buffer with uniformly random actions, then train the world model
/// (VAE and dynamics jointly) on replayed batches.
pub fn pretrain_vae<E: Env + ?Sized>(
    env: &mut E,
    world_model: &mut WorldModel,
    config: &PretrainConfig,
) -> Result<PretrainSummary> {
    if config.batch_size == 0 || config.log_every == 0 {
        return Err(CuriosityError::InvalidConfig(
            "batch_size and log_every must be positive".into(),
        ));
    }
    let num_actions = env.action_space().num_actions()?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut buffer = ReplayBuffer::with_seed(config.buffer_size, config.seed.wrapping_add(1))?;

    for episode in 0..config.episodes {
        let (mut obs, _) = env.reset(Some(config.seed.wrapping_add(episode as u64)));
        for _ in 0..config.max_episode_steps {
            let action = rng.gen_range(0..num_actions);
            let result = env.step(action);
            let done = result.done();
            buffer.add(DynamicsTransition {
                state: obs,
                action,
                next_state: result.observation.clone(),
                done: result.terminated,
            });
            if done {
                break;
            }
            obs = result.observation;
        }
    }
    tracing::info!(transitions = buffer.len(), "collected random rollouts");

    let device = world_model.device();
    for update in 0..config.updates {
        let batch = buffer.sample(config.batch_size)?.to_tensors(device);
        world_model.train(&batch.states, &batch.actions, &batch.next_states)?;
        if update % config.log_every == 0 {
            let losses = world_model.losses();
            tracing::info!(
                update,
                world_model_loss = losses.world_model.last().copied().unwrap_or_default(),
                vae_loss = losses.vae.last().copied().unwrap_or_default(),
                "pretraining"
            );
        }
    }

    let losses = world_model.losses();
    Ok(PretrainSummary {
        transitions: buffer.len(),
        updates: config.updates,
        world_model_loss: losses.world_model.last().copied().unwrap_or_default(),
        vae_loss: losses.vae.last().copied(),
    })
}
