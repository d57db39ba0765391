//! Adam with global gradient-norm clipping.

use crate::Result;
use serde::{Deserialize, Serialize};
use tch::nn::{self, OptimizerConfig};
use tch::{Kind, Tensor};

/// Optimizer settings stored in checkpoints.
///
/// Adam moment estimates are not part of it; they restart from zero after a
/// restore.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizerSettings {
    pub learning_rate: f64,
    pub max_grad_norm: f64,
}

/// Adam over every trainable variable of one `VarStore`, clipping the global
/// gradient norm to `max_grad_norm` before each step.
pub struct ClippedAdam {
    inner: nn::Optimizer,
    variables: Vec<Tensor>,
    settings: OptimizerSettings,
}

impl ClippedAdam {
    pub fn new(vs: &nn::VarStore, learning_rate: f64, max_grad_norm: f64) -> Result<Self> {
        let inner = nn::Adam::default().build(vs, learning_rate)?;
        Ok(Self {
            inner,
            variables: vs.trainable_variables(),
            settings: OptimizerSettings {
                learning_rate,
                max_grad_norm,
            },
        })
    }

    pub fn settings(&self) -> OptimizerSettings {
        self.settings
    }

    /// Apply restored settings
    pub fn apply_settings(&mut self, settings: OptimizerSettings) {
        self.inner.set_lr(settings.learning_rate);
        self.settings = settings;
    }

    /// Backpropagate `loss`, clip, and step. Returns the pre-clip gradient norm.
    pub fn minimize(&mut self, loss: &Tensor) -> f64 {
        self.inner.zero_grad();
        loss.backward();
        let norm = self.clip_grad_norm(self.settings.max_grad_norm);
        self.inner.step();
        norm
    }

    /// Scale gradients so their global L2 norm is at most `max_norm`.
    pub fn clip_grad_norm(&mut self, max_norm: f64) -> f64 {
        let mut global_norm = 0.0f64;
        for var in &self.variables {
            let grad = var.grad();
            if grad.defined() {
                global_norm += grad
                    .pow_tensor_scalar(2.0)
                    .sum(Kind::Float)
                    .double_value(&[]);
            }
        }
        global_norm = global_norm.sqrt();

        if global_norm > max_norm {
            let clip_coef = max_norm / (global_norm + 1e-6);
            for var in &self.variables {
                let mut grad = var.grad();
                if grad.defined() {
                    let _ = grad.f_mul_scalar_(clip_coef);
                }
            }
        }
        global_norm
    }
}
