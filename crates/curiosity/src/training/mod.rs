//! Training orchestration.
//!
//! - `CuriosityTrainer` runs the curiosity-driven DQN loop
//! - `evaluate` measures greedy returns
//! - `pretrain_vae` fits the world model on random-policy rollouts

mod evaluate;
mod pretrain;
mod trainer;

pub use evaluate::{evaluate, EvalSummary};
pub use pretrain::{pretrain_vae, PretrainConfig, PretrainSummary};
pub use trainer::{CuriosityTrainer, TrainSummary};

#[cfg(all(test, feature = "torch"))]
mod tests {
    use super::*;
    use crate::config::{RewardMode, TrainConfig, WorldModelConfig};
    use crate::env::{Env, EnvInfo, StepResult};
    use crate::log::MemoryLogger;
    use crate::spaces::{Box as BoxSpace, Discrete, DynSpace};
    use crate::world_model::WorldModel;
    use ndarray::{ArrayD, IxDyn};
    use std::sync::Arc;
    use tch::Device;
    use tempfile::tempdir;

    /// Walk along a line of `len` cells; action 1 moves right and reaching
    /// the end pays 1.
    struct Corridor {
        len: usize,
        pos: usize,
        t: usize,
    }

    impl Corridor {
        fn new(len: usize) -> Self {
            Self { len, pos: 0, t: 0 }
        }

        fn obs(&self) -> ArrayD<f32> {
            let mut obs = ArrayD::zeros(IxDyn(&[self.len]));
            obs[[self.pos]] = 1.0;
            obs
        }
    }

    impl Env for Corridor {
        fn observation_space(&self) -> DynSpace {
            DynSpace::Box(BoxSpace::uniform(&[self.len], 0.0, 1.0))
        }

        fn action_space(&self) -> DynSpace {
            DynSpace::Discrete(Discrete::new(2))
        }

        fn reset(&mut self, _seed: Option<u64>) -> (ArrayD<f32>, EnvInfo) {
            self.pos = 0;
            self.t = 0;
            (self.obs(), EnvInfo::new())
        }

        fn step(&mut self, action: usize) -> StepResult {
            self.t += 1;
            if action == 1 {
                self.pos = (self.pos + 1).min(self.len - 1);
            } else {
                self.pos = self.pos.saturating_sub(1);
            }
            let terminated = self.pos == self.len - 1;
            StepResult {
                observation: self.obs(),
                reward: if terminated { 1.0 } else { 0.0 },
                terminated,
                truncated: self.t >= 20,
                info: EnvInfo::new(),
            }
        }
    }

    /// Constant 1x36x36 frames whose brightness tracks the step count
    struct Flicker {
        t: usize,
    }

    impl Env for Flicker {
        fn observation_space(&self) -> DynSpace {
            DynSpace::Box(BoxSpace::unit(&[1, 36, 36]))
        }

        fn action_space(&self) -> DynSpace {
            DynSpace::Discrete(Discrete::new(3))
        }

        fn reset(&mut self, _seed: Option<u64>) -> (ArrayD<f32>, EnvInfo) {
            self.t = 0;
            (ArrayD::zeros(IxDyn(&[1, 36, 36])), EnvInfo::new())
        }

        fn step(&mut self, _action: usize) -> StepResult {
            self.t += 1;
            StepResult {
                observation: ArrayD::from_elem(IxDyn(&[1, 36, 36]), self.t as f32 / 10.0),
                reward: 0.0,
                terminated: self.t >= 8,
                truncated: false,
                info: EnvInfo::new(),
            }
        }
    }

    fn small_config(train_steps: u64) -> TrainConfig {
        let mut config = TrainConfig::default()
            .with_train_steps(train_steps)
            .with_buffer_size(200)
            .with_batch_size(8)
            .with_log_interval(10);
        config.dqn.network.hidden_sizes = vec![16];
        config.dqn.target_network_steps = 5;
        config.world_model = WorldModelConfig {
            hidden_sizes: vec![16],
            ..Default::default()
        };
        config
    }

    #[test]
    fn test_run_reaches_train_steps() {
        let logger = Arc::new(MemoryLogger::new());
        let mut trainer = CuriosityTrainer::new(Corridor::new(4), small_config(30))
            .unwrap()
            .with_logger(Box::new(logger.clone()));

        let summary = trainer.run().unwrap();
        assert_eq!(summary.train_steps, 30);
        // warm-up of 8 transitions before the first update
        assert_eq!(summary.env_steps, 37);
        assert_eq!(trainer.world_model().steps(), 30);
        assert_eq!(logger.series("epsilon").len(), 3);
        assert!(logger.latest("intrinsic_reward").unwrap() >= 0.0);
        assert!(summary.final_epsilon < 1.0);
    }

    #[test]
    fn test_extrinsic_mode_still_trains_world_model() {
        let config = small_config(10).with_reward_mode(RewardMode::Extrinsic);
        let mut trainer = CuriosityTrainer::new(Corridor::new(3), config).unwrap();
        trainer.run().unwrap();
        assert_eq!(trainer.world_model().losses().world_model.len(), 10);
    }

    #[test]
    fn test_checkpoints_and_resume() {
        let dir = tempdir().unwrap();
        let config = small_config(20).with_checkpoints(dir.path(), 10);
        let mut trainer = CuriosityTrainer::new(Corridor::new(4), config.clone()).unwrap();
        trainer.run().unwrap();

        assert!(dir.path().join("checkpoint_step_00000010.bin").exists());
        assert!(dir.path().join("checkpoint_step_00000020.bin").exists());

        let mut resumed = CuriosityTrainer::new(Corridor::new(4), config).unwrap();
        assert_eq!(resumed.resume_latest().unwrap(), Some(20));
        assert_eq!(resumed.agent().train_steps(), 20);
        assert_eq!(resumed.env_steps(), trainer.env_steps());
        assert!((resumed.agent().epsilon() - trainer.agent().epsilon()).abs() < 1e-9);
    }

    #[test]
    fn test_final_step_on_interval_is_written_once() {
        let dir = tempdir().unwrap();
        let config = small_config(20).with_checkpoints(dir.path(), 10);
        let mut trainer = CuriosityTrainer::new(Corridor::new(4), config).unwrap();
        trainer.run().unwrap();
        assert_eq!(trainer.last_checkpoint_step(), Some(20));

        let written = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("checkpoint_step_"))
            .count();
        assert_eq!(written, 2);
    }

    #[test]
    fn test_final_step_off_interval_is_saved() {
        let dir = tempdir().unwrap();
        let config = small_config(15).with_checkpoints(dir.path(), 10);
        let mut trainer = CuriosityTrainer::new(Corridor::new(4), config).unwrap();
        trainer.run().unwrap();

        assert!(dir.path().join("checkpoint_step_00000010.bin").exists());
        assert!(dir.path().join("checkpoint_step_00000015.bin").exists());
        assert_eq!(trainer.last_checkpoint_step(), Some(15));
    }

    #[test]
    fn test_evaluate_is_greedy_and_bounded() {
        let mut trainer = CuriosityTrainer::new(Corridor::new(4), small_config(5)).unwrap();
        trainer.run().unwrap();
        let (mut env, mut agent, _) = trainer.into_parts();

        let summary = evaluate(&mut env, &mut agent, 3, 20, Some(0)).unwrap();
        assert_eq!(summary.returns.len(), 3);
        assert!(summary.steps <= 60);
        // greedy policy on a deterministic env repeats itself
        assert!(summary.returns.iter().all(|&r| r == summary.returns[0]));
    }

    #[test]
    fn test_pretrain_on_images() {
        let mut config = WorldModelConfig {
            hidden_sizes: vec![16],
            ..Default::default()
        };
        config.vae.z_dim = 4;
        let mut wm = WorldModel::new(&[1, 36, 36], 3, &config, Device::Cpu).unwrap();
        let mut env = Flicker { t: 0 };
        let pretrain = PretrainConfig {
            episodes: 2,
            updates: 3,
            batch_size: 4,
            buffer_size: 100,
            log_every: 1,
            ..Default::default()
        };

        let summary = pretrain_vae(&mut env, &mut wm, &pretrain).unwrap();
        assert_eq!(summary.transitions, 16);
        assert_eq!(summary.updates, 3);
        assert!(summary.vae_loss.is_some());
        assert_eq!(wm.losses().vae.len(), 3);
    }
}
