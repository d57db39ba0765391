//! Checkpoints for agents, world models and whole training runs.
//!
//! Components implement `Checkpointable` and hand opaque blobs to the
//! `CheckpointManager`, which names files by training step, rotates old ones
//! and keeps a copy of the best-scoring checkpoint.

mod manager;
mod state;

pub use manager::{CheckpointConfig, CheckpointManager};
pub use state::{Checkpointable, TrainingCheckpoint};
