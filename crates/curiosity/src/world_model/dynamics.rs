//! Latent dynamics: `(mu, log_var, action) -> (mu', log_var')`.

use crate::network::mlp;
use crate::{CuriosityError, Result};
use tch::{nn, nn::Module, Kind, Tensor};

/// Gaussian belief over an encoded observation
#[derive(Debug)]
pub struct LatentState {
    /// `[B, latent_dim]`
    pub mu: Tensor,
    /// `[B, latent_dim]`
    pub log_var: Tensor,
}

impl LatentState {
    pub fn new(mu: Tensor, log_var: Tensor) -> Self {
        Self { mu, log_var }
    }

    pub fn batch_size(&self) -> i64 {
        self.mu.size()[0]
    }

    pub fn shallow_clone(&self) -> Self {
        Self {
            mu: self.mu.shallow_clone(),
            log_var: self.log_var.shallow_clone(),
        }
    }
}

/// MLP over `cat(mu, log_var, one_hot(action))`.
#[derive(Debug)]
pub struct DynamicsModel {
    net: nn::Sequential,
    latent_dim: i64,
    num_actions: i64,
}

impl DynamicsModel {
    pub fn new(p: &nn::Path, latent_dim: i64, num_actions: i64, hidden: &[i64]) -> Self {
        let input = 2 * latent_dim + num_actions;
        Self {
            net: mlp(p, input, hidden, 2 * latent_dim),
            latent_dim,
            num_actions,
        }
    }

    /// Predicted next latent for a batch of latents and Int64 actions `[B]`
    pub fn forward(&self, latent: &LatentState, actions: &Tensor) -> Result<LatentState> {
        let batch = latent.batch_size();
        if actions.size() != [batch] {
            return Err(CuriosityError::ShapeMismatch {
                expected: vec![batch as usize],
                actual: actions.size().iter().map(|&d| d as usize).collect(),
            });
        }
        let one_hot = actions
            .to_device(latent.mu.device())
            .to_kind(Kind::Int64)
            .f_one_hot(self.num_actions)?
            .to_kind(Kind::Float);
        let input = Tensor::cat(&[&latent.mu, &latent.log_var, &one_hot], 1);
        let out = self.net.forward(&input);
        let parts = out.split(self.latent_dim, 1);
        Ok(LatentState::new(
            parts[0].shallow_clone(),
            parts[1].shallow_clone(),
        ))
    }

    pub fn latent_dim(&self) -> i64 {
        self.latent_dim
    }

    pub fn num_actions(&self) -> i64 {
        self.num_actions
    }
}

/// Per-row smooth-L1 between predicted and observed latents.
///
/// Each channel (mean, log-variance) is averaged over the latent dimension and
/// the two channel means are added, so the error of a row lies in the same
/// range regardless of `latent_dim`.
pub fn prediction_error(predicted: &LatentState, observed: &LatentState) -> Tensor {
    let per_channel = |a: &Tensor, b: &Tensor| {
        a.smooth_l1_loss(b, tch::Reduction::None, 1.0)
            .mean_dim(Some(&[1i64][..]), false, Kind::Float)
    };
    per_channel(&predicted.mu, &observed.mu)
        + per_channel(&predicted.log_var, &observed.log_var)
}

#[cfg(all(test, feature = "torch"))]
mod tests {
    use super::*;
    use tch::Device;

    fn opts() -> (Kind, Device) {
        (Kind::Float, Device::Cpu)
    }

    #[test]
    fn test_forward_shapes() {
        let vs = nn::VarStore::new(Device::Cpu);
        let model = DynamicsModel::new(&(vs.root() / "wm"), 6, 3, &[32, 32]);
        let latent = LatentState::new(Tensor::rand([5, 6], opts()), Tensor::zeros([5, 6], opts()));
        let next = model
            .forward(&latent, &Tensor::from_slice(&[0i64, 1, 2, 0, 1]))
            .unwrap();
        assert_eq!(next.mu.size(), vec![5, 6]);
        assert_eq!(next.log_var.size(), vec![5, 6]);
    }

    #[test]
    fn test_action_checks() {
        let vs = nn::VarStore::new(Device::Cpu);
        let model = DynamicsModel::new(&(vs.root() / "wm"), 2, 2, &[8]);
        let latent = LatentState::new(Tensor::rand([2, 2], opts()), Tensor::zeros([2, 2], opts()));
        assert!(model.forward(&latent, &Tensor::from_slice(&[0i64])).is_err());
        assert!(model.forward(&latent, &Tensor::from_slice(&[0i64, 5])).is_err());
    }

    #[test]
    fn test_prediction_error_per_row() {
        let zeros = LatentState::new(Tensor::zeros([2, 3], opts()), Tensor::zeros([2, 3], opts()));
        // row 0 off by 0.5 in one mean entry, row 1 off by 2 in one log-var entry
        let mu = Tensor::from_slice(&[0.5f32, 0.0, 0.0, 0.0, 0.0, 0.0]).reshape([2, 3]);
        let log_var = Tensor::from_slice(&[0.0f32, 0.0, 0.0, 2.0, 0.0, 0.0]).reshape([2, 3]);
        let predicted = LatentState::new(mu, log_var);

        let err = prediction_error(&predicted, &zeros);
        assert_eq!(err.size(), vec![2]);
        // 0.5 * 0.5^2 = 0.125 and 2 - 0.5 = 1.5, each averaged over 3 dims
        assert!((err.double_value(&[0]) - 0.125 / 3.0).abs() < 1e-6);
        assert!((err.double_value(&[1]) - 1.5 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_prediction_error_independent_of_latent_dim() {
        let err_for = |dim: i64| {
            let observed =
                LatentState::new(Tensor::zeros([1, dim], opts()), Tensor::zeros([1, dim], opts()));
            let predicted =
                LatentState::new(Tensor::ones([1, dim], opts()), Tensor::ones([1, dim], opts()));
            prediction_error(&predicted, &observed).double_value(&[0])
        };
        // every element off by 1: 0.5 per channel
        assert!((err_for(2) - 1.0).abs() < 1e-6);
        assert!((err_for(64) - 1.0).abs() < 1e-6);
    }
}
