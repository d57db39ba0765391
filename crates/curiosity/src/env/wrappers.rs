//! Environment wrappers for common functionality.

use super::{Env, EnvInfo, StepResult};
use crate::spaces::{Box as BoxSpace, DynSpace};
use crate::utils::clip_reward;
use crate::{CuriosityError, Result};
use ndarray::{concatenate, ArrayD, Axis};
use std::collections::VecDeque;

/// Wrapper that tracks episode statistics (return and length).
///
/// Adds `episode_return` and `episode_length` to info on episode completion.
pub struct EpisodeStats<E: Env> {
    env: E,
    episode_return: f32,
    episode_length: u32,
}

impl<E: Env> EpisodeStats<E> {
    /// Wrap an environment with episode statistics tracking
    pub fn new(env: E) -> Self {
        Self {
            env,
            episode_return: 0.0,
            episode_length: 0,
        }
    }

    /// Get a reference to the inner environment
    pub fn inner(&self) -> &E {
        &self.env
    }
}

impl<E: Env> Env for EpisodeStats<E> {
    fn observation_space(&self) -> DynSpace {
        self.env.observation_space()
    }

    fn action_space(&self) -> DynSpace {
        self.env.action_space()
    }

    fn reset(&mut self, seed: Option<u64>) -> (ArrayD<f32>, EnvInfo) {
        self.episode_return = 0.0;
        self.episode_length = 0;
        self.env.reset(seed)
    }

    fn step(&mut self, action: usize) -> StepResult {
        let mut result = self.env.step(action);

        self.episode_return += result.reward;
        self.episode_length += 1;

        if result.done() {
            result.info = result
                .info
                .with_episode_stats(self.episode_return, self.episode_length);

            // Env will be reset externally
            self.episode_return = 0.0;
            self.episode_length = 0;
        }

        result
    }

    fn render(&self) -> Option<String> {
        self.env.render()
    }

    fn close(&mut self) {
        self.env.close()
    }
}

/// Wrapper that clips extrinsic rewards to `[-bound, bound]`.
pub struct ClipReward<E: Env> {
    env: E,
    bound: f32,
}

impl<E: Env> ClipReward<E> {
    pub fn new(env: E, bound: f32) -> Self {
        Self {
            env,
            bound: bound.abs(),
        }
    }
}

impl<E: Env> Env for ClipReward<E> {
    fn observation_space(&self) -> DynSpace {
        self.env.observation_space()
    }

    fn action_space(&self) -> DynSpace {
        self.env.action_space()
    }

    fn reset(&mut self, seed: Option<u64>) -> (ArrayD<f32>, EnvInfo) {
        self.env.reset(seed)
    }

    fn step(&mut self, action: usize) -> StepResult {
        let mut result = self.env.step(action);
        result.reward = clip_reward(result.reward, self.bound);
        result
    }

    fn render(&self) -> Option<String> {
        self.env.render()
    }

    fn close(&mut self) {
        self.env.close()
    }
}

/// Wrapper that stacks the last `k` frames of an image environment along the
/// channel axis. The oldest frame occupies the first channels.
pub struct FrameStack<E: Env> {
    env: E,
    k: usize,
    frames: VecDeque<ArrayD<f32>>,
}

impl<E: Env> FrameStack<E> {
    /// Fails with `InvalidConfig` when `k` is zero.
    pub fn new(env: E, k: usize) -> Result<Self> {
        if k == 0 {
            return Err(CuriosityError::InvalidConfig(
                "frame stack needs at least one frame".into(),
            ));
        }
        Ok(Self {
            env,
            k,
            frames: VecDeque::with_capacity(k),
        })
    }

    fn stacked(&self) -> ArrayD<f32> {
        let views: Vec<_> = self.frames.iter().map(|f| f.view()).collect();
        // frames of one env share a shape, so this only fails before reset
        concatenate(Axis(0), &views).unwrap_or_default()
    }
}

impl<E: Env> Env for FrameStack<E> {
    fn observation_space(&self) -> DynSpace {
        match self.env.observation_space() {
            DynSpace::Box(b) => {
                let lows: Vec<_> = (0..self.k).map(|_| b.low.view()).collect();
                let highs: Vec<_> = (0..self.k).map(|_| b.high.view()).collect();
                match (concatenate(Axis(0), &lows), concatenate(Axis(0), &highs)) {
                    (Ok(low), Ok(high)) => DynSpace::Box(BoxSpace::new(low, high)),
                    _ => DynSpace::Box(b),
                }
            }
            other => other,
        }
    }

    fn action_space(&self) -> DynSpace {
        self.env.action_space()
    }

    fn reset(&mut self, seed: Option<u64>) -> (ArrayD<f32>, EnvInfo) {
        let (obs, info) = self.env.reset(seed);
        self.frames.clear();
        for _ in 0..self.k {
            self.frames.push_back(obs.clone());
        }
        (self.stacked(), info)
    }

    fn step(&mut self, action: usize) -> StepResult {
        let mut result = self.env.step(action);
        if self.frames.len() == self.k {
            self.frames.pop_front();
        }
        self.frames.push_back(result.observation);
        if let Some(newest) = self.frames.back().cloned() {
            while self.frames.len() < self.k {
                self.frames.push_front(newest.clone());
            }
        }
        result.observation = self.stacked();
        result
    }

    fn render(&self) -> Option<String> {
        self.env.render()
    }

    fn close(&mut self) {
        self.env.close()
    }
}
