//! Value-based agents.

mod dqn;

pub use dqn::DqnAgent;
