//! Observation and action spaces.
//!
//! Observations live in a `Box` (vectors or `[C, H, W]` images); actions are
//! always `Discrete` indices, since a Q-network scores a finite action set.

mod r#box;
mod discrete;

pub use discrete::Discrete;
pub use r#box::Box;

use crate::{CuriosityError, Result};
use ndarray::ArrayD;
use rand::Rng;

/// Trait for observation and action spaces
pub trait Space: Clone + Send + Sync {
    /// The type of samples from this space
    type Sample;

    /// Sample a random element from this space
    fn sample<R: Rng>(&self, rng: &mut R) -> Self::Sample;

    /// Check if a value is contained in this space
    fn contains(&self, value: &Self::Sample) -> bool;

    /// Get the shape of samples from this space
    fn shape(&self) -> &[usize];

    /// Get the total number of elements in a sample
    fn num_elements(&self) -> usize {
        self.shape().iter().product()
    }
}

/// Enum for dynamic space types
#[derive(Clone, Debug)]
pub enum DynSpace {
    Discrete(Discrete),
    Box(Box),
}

impl DynSpace {
    /// Get the shape of this space
    pub fn shape(&self) -> Vec<usize> {
        match self {
            DynSpace::Discrete(s) => s.shape().to_vec(),
            DynSpace::Box(s) => s.shape().to_vec(),
        }
    }

    /// Number of discrete choices, or an error for continuous spaces.
    pub fn num_actions(&self) -> Result<usize> {
        match self {
            DynSpace::Discrete(d) => Ok(d.n),
            DynSpace::Box(_) => Err(CuriosityError::InvalidConfig(
                "Q-learning requires a discrete action space".into(),
            )),
        }
    }

    /// Shape of a single observation drawn from this space.
    ///
    /// Discrete observations are one-hot encoded by the caller, so they
    /// report `[n]`.
    pub fn observation_shape(&self) -> Vec<usize> {
        match self {
            DynSpace::Discrete(d) => vec![d.n],
            DynSpace::Box(b) => b.shape().to_vec(),
        }
    }

    /// Check if this space contains the value
    pub fn contains(&self, value: &ArrayD<f32>) -> bool {
        match self {
            DynSpace::Discrete(s) => match value.iter().next() {
                Some(v) if value.len() == 1 => s.contains(&(v.round() as usize)),
                _ => false,
            },
            DynSpace::Box(s) => s.contains(value),
        }
    }
}
