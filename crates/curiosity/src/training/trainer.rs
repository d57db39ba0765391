//! The act/step/store/sample/train loop.

use crate::agent::DqnAgent;
use crate::buffer::{ReplayBuffer, Transition};
use crate::checkpoint::{CheckpointConfig, CheckpointManager, Checkpointable, TrainingCheckpoint};
use crate::config::TrainConfig;
use crate::env::Env;
use crate::log::{ConsoleLogger, MetricLogger, MetricsTracker, TrainMetrics};
use crate::utils::{format_duration, set_seed};
use crate::world_model::WorldModel;
use crate::Result;
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tch::{Device, Tensor};

/// Outcome of `CuriosityTrainer::run`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrainSummary {
    pub train_steps: u64,
    pub env_steps: u64,
    pub episodes: u64,
    /// Mean extrinsic return of the last ten episodes
    pub mean_score: f64,
    pub final_epsilon: f64,
    pub elapsed_secs: f64,
    /// Last periodic summary, if one was emitted
    pub last_metrics: Option<TrainMetrics>,
}

/// Trains a `DqnAgent` on world-model curiosity.
///
/// Each environment step is stored in the replay buffer. Once
/// `learning_starts` transitions exist, every step also samples a batch,
/// trains the world model on it, mixes the resulting intrinsic reward with
/// the extrinsic one according to `RewardMode`, and trains the agent.
pub struct CuriosityTrainer<E: Env> {
    env: E,
    config: TrainConfig,
    agent: DqnAgent,
    world_model: WorldModel,
    buffer: ReplayBuffer<Transition>,
    tracker: MetricsTracker,
    logger: Box<dyn MetricLogger>,
    checkpoints: Option<CheckpointManager>,
    device: Device,
    obs: ArrayD<f32>,
    env_steps: u64,
    last_metrics: Option<TrainMetrics>,
    progress: Option<ProgressBar>,
    start_time: Instant,
}

impl<E: Env> CuriosityTrainer<E> {
    pub fn new(mut env: E, config: TrainConfig) -> Result<Self> {
        config.validate()?;
        set_seed(config.seed);
        let device = config.device()?;

        let obs_shape = env.observation_space().observation_shape();
        let num_actions = env.action_space().num_actions()?;
        let agent = DqnAgent::new(&obs_shape, num_actions, &config.dqn, device, config.seed)?;
        let world_model = WorldModel::new(&obs_shape, num_actions, &config.world_model, device)?;
        let buffer = ReplayBuffer::with_seed(config.buffer_size, config.seed.wrapping_add(1))?;

        let checkpoints = if config.checkpoint_interval > 0 {
            Some(CheckpointManager::new(CheckpointConfig::from_train_config(
                &config,
            ))?)
        } else {
            None
        };

        let progress = if config.progress {
            let pb = ProgressBar::new(config.train_steps());
            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
            ) {
                pb.set_style(style.progress_chars("#>-"));
            }
            Some(pb)
        } else {
            None
        };

        let (obs, _) = env.reset(Some(config.seed));
        tracing::info!(
            ?obs_shape,
            num_actions,
            ?device,
            train_steps = config.train_steps(),
            "curiosity trainer ready"
        );

        Ok(Self {
            env,
            config,
            agent,
            world_model,
            buffer,
            tracker: MetricsTracker::new(),
            logger: Box::new(ConsoleLogger::new()),
            checkpoints,
            device,
            obs,
            env_steps: 0,
            last_metrics: None,
            progress,
            start_time: Instant::now(),
        })
    }

    /// Replace the default console logger
    pub fn with_logger(mut self, logger: Box<dyn MetricLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Train until the agent has taken `train_steps` gradient steps.
    pub fn run(&mut self) -> Result<TrainSummary> {
        while self.agent.train_steps() < self.config.train_steps() {
            self.step()?;
        }

        let step = self.agent.train_steps();
        if self.last_checkpoint_step() != Some(step) {
            self.save_checkpoint(step)?;
        }
        self.logger.close();
        if let Some(pb) = &self.progress {
            pb.finish_with_message("done");
        }

        let summary = self.summary();
        tracing::info!(
            train_steps = summary.train_steps,
            env_steps = summary.env_steps,
            episodes = summary.episodes,
            score = summary.mean_score,
            "training finished in {}",
            format_duration(summary.elapsed_secs)
        );
        Ok(summary)
    }

    /// One environment step, followed by one update once warm-up is over.
    pub fn step(&mut self) -> Result<()> {
        let action = self.agent.act_one(&self.obs, false)?;
        let result = self.env.step(action);
        let done = result.done();

        self.buffer.add(Transition {
            state: self.obs.clone(),
            action,
            reward: result.reward,
            next_state: result.observation.clone(),
            done: result.terminated,
        });
        if let Some(ret) = self.tracker.record_step(result.reward, done) {
            tracing::debug!(episode = self.tracker.episodes(), ret, "episode finished");
        }
        self.obs = if done {
            self.env.reset(None).0
        } else {
            result.observation
        };
        self.env_steps += 1;

        if self.buffer.len() >= self.config.learning_starts {
            self.update()?;
        }
        Ok(())
    }

    fn update(&mut self) -> Result<()> {
        let batch = self
            .buffer
            .sample(self.config.batch_size)?
            .to_tensors(self.device);

        let intrinsic =
            self.world_model
                .train(&batch.states, &batch.actions, &batch.next_states)?;
        let intrinsic = Vec::<f32>::try_from(&intrinsic.to_device(Device::Cpu))?;
        let extrinsic = match &batch.rewards {
            Some(rewards) => Vec::<f32>::try_from(&rewards.to_device(Device::Cpu))?,
            None => vec![0.0; intrinsic.len()],
        };
        let mode = self.config.reward_mode;
        let mixed: Vec<f32> = extrinsic
            .iter()
            .zip(&intrinsic)
            .map(|(&e, &i)| mode.mix(e, i))
            .collect();
        let rewards = Tensor::from_slice(&mixed).to_device(self.device);

        let loss = self.agent.train(
            &batch.states,
            &batch.actions,
            &rewards,
            &batch.next_states,
            &batch.dones,
        )?;
        self.tracker.record_intrinsic(&intrinsic);
        let Some(loss) = loss else {
            return Ok(());
        };
        let wm_loss = self
            .world_model
            .losses()
            .world_model
            .last()
            .copied()
            .unwrap_or_default();
        self.tracker.record_losses(loss, wm_loss);

        let step = self.agent.train_steps();
        if let Some(pb) = &self.progress {
            pb.set_position(step);
        }
        if step % self.config.log_interval == 0 {
            self.report(step);
        }
        if self.checkpoints.as_ref().is_some_and(|m| m.is_due(step)) {
            self.save_checkpoint(step)?;
        }
        Ok(())
    }

    fn report(&mut self, step: u64) {
        let metrics = self
            .tracker
            .summarize(step, self.env_steps, self.agent.epsilon());
        self.logger.log_metrics(&metrics.pairs(), step);
        if let Some(pb) = &self.progress {
            pb.set_message(format!(
                "score {:.2} int {:.4} eps {:.3}",
                metrics.mean_score, metrics.mean_intrinsic, metrics.epsilon
            ));
        }
        self.last_metrics = Some(metrics);
    }

    fn save_checkpoint(&mut self, step: u64) -> Result<()> {
        let Some(manager) = self.checkpoints.as_mut() else {
            return Ok(());
        };
        let score = self.tracker.mean_score();
        let bundle = Self::bundle(
            &self.agent,
            &self.world_model,
            &self.config,
            self.env_steps,
            score,
        )?;
        manager.save(&bundle, step, score)?;
        Ok(())
    }

    fn bundle(
        agent: &DqnAgent,
        world_model: &WorldModel,
        config: &TrainConfig,
        env_steps: u64,
        score: f64,
    ) -> Result<TrainingCheckpoint> {
        TrainingCheckpoint::new(
            agent.train_steps(),
            agent.save_state()?,
            world_model.save_state()?,
        )
        .with_env_steps(env_steps)
        .with_score(score)
        .with_config(config)
    }

    /// Restore agent and world model from a checkpoint file; returns the
    /// training step it was written at.
    pub fn resume_from(&mut self, path: impl AsRef<Path>) -> Result<u64> {
        let bundle = TrainingCheckpoint::from_bytes(&std::fs::read(path.as_ref())?)?;
        self.restore(bundle)
    }

    /// Restore from the newest checkpoint in the configured directory
    pub fn resume_latest(&mut self) -> Result<Option<u64>> {
        let manager = CheckpointManager::new(CheckpointConfig::from_train_config(&self.config))?;
        let mut bundle = TrainingCheckpoint::new(0, Vec::new(), Vec::new());
        if manager.load_latest(&mut bundle)?.is_none() {
            return Ok(None);
        }
        self.restore(bundle).map(Some)
    }

    fn restore(&mut self, bundle: TrainingCheckpoint) -> Result<u64> {
        self.agent.load_state(&bundle.agent)?;
        self.world_model.load_state(&bundle.world_model)?;
        self.env_steps = bundle.env_steps;
        tracing::info!(
            step = bundle.step,
            env_steps = bundle.env_steps,
            version = %bundle.version,
            "resumed from checkpoint"
        );
        Ok(bundle.step)
    }

    pub fn summary(&self) -> TrainSummary {
        TrainSummary {
            train_steps: self.agent.train_steps(),
            env_steps: self.env_steps,
            episodes: self.tracker.episodes(),
            mean_score: self.tracker.mean_score(),
            final_epsilon: self.agent.epsilon(),
            elapsed_secs: self.start_time.elapsed().as_secs_f64(),
            last_metrics: self.last_metrics.clone(),
        }
    }

    pub fn agent(&self) -> &DqnAgent {
        &self.agent
    }

    pub fn agent_mut(&mut self) -> &mut DqnAgent {
        &mut self.agent
    }

    pub fn world_model(&self) -> &WorldModel {
        &self.world_model
    }

    pub fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }

    pub fn buffer(&self) -> &ReplayBuffer<Transition> {
        &self.buffer
    }

    /// Step of the last checkpoint this trainer wrote
    pub fn last_checkpoint_step(&self) -> Option<u64> {
        self.checkpoints.as_ref().and_then(CheckpointManager::last_saved)
    }

    pub fn env_steps(&self) -> u64 {
        self.env_steps
    }

    /// Hand back the environment and the trained agent
    pub fn into_parts(self) -> (E, DqnAgent, WorldModel) {
        (self.env, self.agent, self.world_model)
    }
}
