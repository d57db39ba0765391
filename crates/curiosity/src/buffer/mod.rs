//! Experience replay.
//!
//! Provides:
//! - `Transition` / `DynamicsTransition` - one step of experience, with and
//!   without the extrinsic reward
//! - `ReplayBuffer` - fixed-capacity ring buffer with uniform sampling
//! - `Collate` - column-wise batching of sampled transitions

mod replay;
mod transition;

pub use replay::ReplayBuffer;
pub use transition::{Collate, DynamicsBatch, DynamicsTransition, Transition, TransitionBatch};

#[cfg(feature = "torch")]
pub use transition::{array_to_tensor, TensorBatch};
