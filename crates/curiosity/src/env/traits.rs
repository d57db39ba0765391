//! Core environment trait definitions.

use crate::spaces::DynSpace;
use ndarray::ArrayD;

/// Information returned from environment steps
#[derive(Clone, Debug, Default)]
pub struct EnvInfo {
    /// Episode return (if done)
    pub episode_return: Option<f32>,
    /// Episode length (if done)
    pub episode_length: Option<f32>,
    /// Custom metrics (kept minimal for performance)
    pub extra: smallvec::SmallVec<[(&'static str, f32); 4]>,
}

impl EnvInfo {
    /// Create empty info
    pub fn new() -> Self {
        Self::default()
    }

    /// Add episode stats
    pub fn with_episode_stats(mut self, ret: f32, len: u32) -> Self {
        self.episode_return = Some(ret);
        self.episode_length = Some(len as f32);
        self
    }

    /// Add a custom metric
    pub fn with_extra(mut self, key: &'static str, value: f32) -> Self {
        self.extra.push((key, value));
        self
    }

    /// Get a value by key (including defaults)
    pub fn get(&self, key: &str) -> Option<f32> {
        match key {
            "episode_return" => self.episode_return,
            "episode_length" => self.episode_length,
            _ => self.extra.iter().find(|(k, _)| k == &key).map(|(_, v)| *v),
        }
    }
}

/// Result from a single environment step
#[derive(Clone, Debug)]
pub struct StepResult {
    /// Observation after the step
    pub observation: ArrayD<f32>,
    /// Extrinsic reward received
    pub reward: f32,
    /// Whether episode terminated (goal reached, failure, etc.)
    pub terminated: bool,
    /// Whether episode truncated (time limit, etc.)
    pub truncated: bool,
    /// Additional info
    pub info: EnvInfo,
}

impl StepResult {
    /// Check if episode is done (terminated or truncated)
    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// Single-agent environment with a discrete action set.
///
/// Observation and action spaces are queried once when a trainer is built.
///
/// # Example
///
/// ```rust,ignore
/// use curiosity::env::{Env, EnvInfo, StepResult};
/// use curiosity::spaces::{Box as BoxSpace, Discrete, DynSpace};
///
/// struct Corridor {
///     pos: f32,
/// }
///
/// impl Env for Corridor {
///     fn observation_space(&self) -> DynSpace {
///         DynSpace::Box(BoxSpace::uniform(&[1], 0.0, 10.0))
///     }
///
///     fn action_space(&self) -> DynSpace {
///         DynSpace::Discrete(Discrete::new(2))
///     }
///
///     fn reset(&mut self, seed: Option<u64>) -> (ArrayD<f32>, EnvInfo) {
///         self.pos = 0.0;
///         (ArrayD::from_elem(IxDyn(&[1]), self.pos), EnvInfo::new())
///     }
///
///     fn step(&mut self, action: usize) -> StepResult {
///         // ... move left or right
///     }
/// }
/// ```
pub trait Env {
    /// Get the observation space
    fn observation_space(&self) -> DynSpace;

    /// Get the action space
    fn action_space(&self) -> DynSpace;

    /// Reset the environment to its initial state
    ///
    /// # Arguments
    /// * `seed` - Optional random seed for reproducibility
    fn reset(&mut self, seed: Option<u64>) -> (ArrayD<f32>, EnvInfo);

    /// Take a single step with a discrete action index
    fn step(&mut self, action: usize) -> StepResult;

    /// Optional: Render the environment as text
    fn render(&self) -> Option<String> {
        None
    }

    /// Optional: Close the environment and free resources
    fn close(&mut self) {}
}

impl<E: Env + ?Sized> Env for Box<E> {
    fn observation_space(&self) -> DynSpace {
        (**self).observation_space()
    }

    fn action_space(&self) -> DynSpace {
        (**self).action_space()
    }

    fn reset(&mut self, seed: Option<u64>) -> (ArrayD<f32>, EnvInfo) {
        (**self).reset(seed)
    }

    fn step(&mut self, action: usize) -> StepResult {
        (**self).step(action)
    }

    fn render(&self) -> Option<String> {
        (**self).render()
    }

    fn close(&mut self) {
        (**self).close()
    }
}
