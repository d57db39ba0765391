//! Environment trait and wrappers.
//!
//! Provides the `Env` trait the training loop drives, plus wrappers for
//! episode statistics, reward clipping and frame stacking.

mod traits;
mod wrappers;

pub use traits::{Env, EnvInfo, StepResult};
pub use wrappers::{ClipReward, EpisodeStats, FrameStack};
