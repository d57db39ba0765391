//! Exploration schedules.

use crate::{CuriosityError, Result};
use serde::{Deserialize, Serialize};

/// Exponentially decaying exploration rate:
/// `epsilon(step) = max(eps_min, exp(-step / tau))`.
///
/// `tau` is calibrated so that `epsilon` reaches `eps_half` halfway through
/// the planned number of training steps.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpsilonSchedule {
    tau: f64,
    eps_min: f64,
}

impl EpsilonSchedule {
    /// Build a schedule for `train_steps` updates.
    ///
    /// # Arguments
    /// * `train_steps` - Total number of planned training steps
    /// * `eps_half` - Exploration rate at `train_steps / 2`, in (0, 1)
    /// * `eps_min` - Floor for the exploration rate, in [0, 1]
    pub fn new(train_steps: u64, eps_half: f64, eps_min: f64) -> Result<Self> {
        if train_steps == 0 {
            return Err(CuriosityError::InvalidConfig(
                "train_steps must be positive".into(),
            ));
        }
        if !(eps_half > 0.0 && eps_half < 1.0) {
            return Err(CuriosityError::InvalidConfig(format!(
                "eps_half must lie in (0, 1), got {}",
                eps_half
            )));
        }
        if !(0.0..=1.0).contains(&eps_min) {
            return Err(CuriosityError::InvalidConfig(format!(
                "eps_min must lie in [0, 1], got {}",
                eps_min
            )));
        }
        let half_point = train_steps as f64 / 2.0;
        let tau = -half_point / eps_half.ln();
        Ok(Self { tau, eps_min })
    }

    /// Exploration rate after `step` training steps
    pub fn value(&self, step: u64) -> f64 {
        self.eps_min.max((-(step as f64) / self.tau).exp())
    }

    /// Decay constant
    pub fn tau(&self) -> f64 {
        self.tau
    }

    pub fn eps_min(&self) -> f64 {
        self.eps_min
    }
}
