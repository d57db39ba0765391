//! World models whose prediction error is an intrinsic reward.
//!
//! The `WorldModel` predicts the next latent belief from the current one and
//! an action. Latents either come straight from vector observations or from
//! a frozen copy of a VAE encoder for image observations.

mod dynamics;
mod model;

pub use dynamics::{prediction_error, DynamicsModel, LatentState};
pub use model::{WorldModel, WorldModelLosses};
