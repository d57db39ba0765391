//! Periodic training summaries and the rolling windows behind them.

use crate::utils::tail_mean;
use serde::{Deserialize, Serialize};

/// Episodes averaged for the reported score
pub const SCORE_WINDOW: usize = 10;
/// Updates averaged for reported losses
pub const LOSS_WINDOW: usize = 100;

/// One summary line of a training run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainMetrics {
    /// Agent training steps so far
    pub step: u64,
    pub env_steps: u64,
    pub episodes: u64,
    /// Mean extrinsic return of the last `SCORE_WINDOW` episodes
    pub mean_score: f64,
    /// Mean intrinsic reward per step since the previous summary
    pub mean_intrinsic: f64,
    /// Mean world-model loss of the last `LOSS_WINDOW` updates
    pub world_model_loss: f64,
    /// Mean agent loss of the last `LOSS_WINDOW` updates
    pub agent_loss: f64,
    pub epsilon: f64,
}

impl TrainMetrics {
    /// Scalars in logging order
    pub fn pairs(&self) -> [(&'static str, f64); 6] {
        [
            ("score", self.mean_score),
            ("intrinsic_reward", self.mean_intrinsic),
            ("world_model_loss", self.world_model_loss),
            ("agent_loss", self.agent_loss),
            ("epsilon", self.epsilon),
            ("episodes", self.episodes as f64),
        ]
    }
}

/// Accumulates per-step data between summaries.
#[derive(Clone, Debug, Default)]
pub struct MetricsTracker {
    episode_returns: Vec<f64>,
    current_return: f64,
    current_length: u64,
    intrinsic_sum: f64,
    intrinsic_count: u64,
    agent_losses: Vec<f64>,
    world_model_losses: Vec<f64>,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one environment step; returns the episode return when `done`.
    pub fn record_step(&mut self, reward: f32, done: bool) -> Option<f64> {
        self.current_return += reward as f64;
        self.current_length += 1;
        if !done {
            return None;
        }
        let finished = self.current_return;
        self.episode_returns.push(finished);
        self.current_return = 0.0;
        self.current_length = 0;
        Some(finished)
    }

    /// Record the intrinsic rewards of one training batch
    pub fn record_intrinsic(&mut self, rewards: &[f32]) {
        self.intrinsic_sum += rewards.iter().map(|&r| r as f64).sum::<f64>();
        self.intrinsic_count += rewards.len() as u64;
    }

    pub fn record_losses(&mut self, agent_loss: f64, world_model_loss: f64) {
        self.agent_losses.push(agent_loss);
        self.world_model_losses.push(world_model_loss);
        if self.agent_losses.len() > 2 * LOSS_WINDOW {
            self.agent_losses.drain(..LOSS_WINDOW);
            self.world_model_losses.drain(..LOSS_WINDOW);
        }
    }

    pub fn episodes(&self) -> u64 {
        self.episode_returns.len() as u64
    }

    pub fn episode_returns(&self) -> &[f64] {
        &self.episode_returns
    }

    /// Steps taken in the unfinished episode
    pub fn current_length(&self) -> u64 {
        self.current_length
    }

    pub fn mean_score(&self) -> f64 {
        tail_mean(&self.episode_returns, SCORE_WINDOW)
    }

    /// Build a summary and reset the intrinsic accumulator.
    pub fn summarize(&mut self, step: u64, env_steps: u64, epsilon: f64) -> TrainMetrics {
        let mean_intrinsic = if self.intrinsic_count == 0 {
            0.0
        } else {
            self.intrinsic_sum / self.intrinsic_count as f64
        };
        self.intrinsic_sum = 0.0;
        self.intrinsic_count = 0;

        TrainMetrics {
            step,
            env_steps,
            episodes: self.episodes(),
            mean_score: self.mean_score(),
            mean_intrinsic,
            world_model_loss: tail_mean(&self.world_model_losses, LOSS_WINDOW),
            agent_loss: tail_mean(&self.agent_losses, LOSS_WINDOW),
            epsilon,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_bookkeeping() {
        let mut tracker = MetricsTracker::new();
        assert_eq!(tracker.record_step(1.0, false), None);
        assert_eq!(tracker.record_step(2.0, true), Some(3.0));
        assert_eq!(tracker.current_length(), 0);
        tracker.record_step(5.0, true);

        assert_eq!(tracker.episodes(), 2);
        assert!((tracker.mean_score() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_score_uses_last_ten_episodes() {
        let mut tracker = MetricsTracker::new();
        for i in 0..15 {
            tracker.record_step(i as f32, true);
        }
        // episodes 5..15
        assert!((tracker.mean_score() - 9.5).abs() < 1e-12);
    }

    #[test]
    fn test_summary_resets_intrinsic() {
        let mut tracker = MetricsTracker::new();
        tracker.record_intrinsic(&[1.0, 3.0]);
        tracker.record_losses(0.5, 2.0);

        let first = tracker.summarize(100, 164, 0.5);
        assert_eq!(first.step, 100);
        assert!((first.mean_intrinsic - 2.0).abs() < 1e-12);
        assert!((first.agent_loss - 0.5).abs() < 1e-12);
        assert!((first.world_model_loss - 2.0).abs() < 1e-12);

        let second = tracker.summarize(200, 264, 0.4);
        assert_eq!(second.mean_intrinsic, 0.0);
        assert!((second.agent_loss - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_loss_window() {
        let mut tracker = MetricsTracker::new();
        for _ in 0..LOSS_WINDOW {
            tracker.record_losses(10.0, 10.0);
        }
        for _ in 0..LOSS_WINDOW * 2 {
            tracker.record_losses(1.0, 1.0);
        }
        let summary = tracker.summarize(1, 1, 1.0);
        assert!((summary.agent_loss - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pairs_order() {
        let metrics = TrainMetrics {
            epsilon: 0.3,
            ..Default::default()
        };
        let pairs = metrics.pairs();
        assert_eq!(pairs[0].0, "score");
        assert_eq!(pairs[4], ("epsilon", 0.3));
    }
}
