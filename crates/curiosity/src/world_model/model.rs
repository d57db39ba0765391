use super::dynamics::{prediction_error, DynamicsModel, LatentState};
use crate::checkpoint::Checkpointable;
use crate::config::{TargetUpdate, WorldModelConfig};
use crate::network::{InputKind, ObsShape};
use crate::optim::{ClippedAdam, OptimizerSettings};
use crate::vae::{TargetEncoder, Vae};
use crate::{CuriosityError, Result};
use serde::{Deserialize, Serialize};
use tch::{nn, Device, Kind, Tensor};

/// Loss history per component
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WorldModelLosses {
    pub world_model: Vec<f64>,
    pub vae: Vec<f64>,
}

enum LatentSource {
    /// Vector observations are the latent mean; log-variance is zero
    Identity,
    /// Image observations go through a VAE; a frozen encoder copy supplies
    /// the regression targets
    Vae {
        vae: Vae,
        target: TargetEncoder,
        optimizer: ClippedAdam,
    },
}

#[derive(Serialize, Deserialize)]
struct WorldModelState {
    steps: u64,
    losses: WorldModelLosses,
    dynamics: Vec<u8>,
    optimizer: OptimizerSettings,
    vae: Option<Vec<u8>>,
    target_encoder: Option<Vec<u8>>,
    vae_optimizer: Option<OptimizerSettings>,
}

/// Latent dynamics model trained on replayed transitions.
///
/// `train` returns the per-transition prediction error, which the trainer
/// uses as the intrinsic reward.
pub struct WorldModel {
    vs: nn::VarStore,
    dynamics: DynamicsModel,
    optimizer: ClippedAdam,
    source: LatentSource,
    shape: ObsShape,
    target_update: TargetUpdate,
    steps: u64,
    losses: WorldModelLosses,
}

impl WorldModel {
    /// Build for the given observation shape. Rank-3 observations always go
    /// through a VAE; asking for one with rank-1 observations is an error.
    pub fn new(
        obs_shape: &[usize],
        num_actions: usize,
        config: &WorldModelConfig,
        device: Device,
    ) -> Result<Self> {
        config.validate()?;
        let shape = ObsShape::new(obs_shape)?;
        let (source, latent_dim) = match shape.rank() {
            1 if config.use_vae => {
                return Err(CuriosityError::InvalidConfig(
                    "a VAE latent source needs [C, H, W] observations".into(),
                ))
            }
            1 => (LatentSource::Identity, shape.dims()[0] as i64),
            3 => {
                let vae = Vae::new(obs_shape, config.vae.z_dim, device)?;
                let target = vae.snapshot_encoder()?;
                let optimizer = ClippedAdam::new(
                    vae.var_store(),
                    config.vae.learning_rate,
                    config.vae.max_grad_norm,
                )?;
                (
                    LatentSource::Vae {
                        vae,
                        target,
                        optimizer,
                    },
                    config.vae.z_dim,
                )
            }
            _ => {
                return Err(CuriosityError::InvalidConfig(format!(
                    "observations must be rank 1 or rank 3 [C, H, W], got {:?}",
                    obs_shape
                )))
            }
        };

        let vs = nn::VarStore::new(device);
        let dynamics = DynamicsModel::new(
            &(vs.root() / "dynamics"),
            latent_dim,
            num_actions as i64,
            &config.hidden_sizes,
        );
        let optimizer = ClippedAdam::new(&vs, config.learning_rate, config.max_grad_norm)?;

        tracing::debug!(
            latent_dim,
            vae = matches!(source, LatentSource::Vae { .. }),
            "built world model"
        );

        Ok(Self {
            vs,
            dynamics,
            optimizer,
            source,
            shape,
            target_update: config.target_update,
            steps: 0,
            losses: WorldModelLosses::default(),
        })
    }

    /// One joint update. In VAE mode the VAE first takes a step on `s_t`;
    /// then the dynamics model regresses onto the frozen encoder's latents.
    /// Returns the detached per-row prediction error `[B]`.
    pub fn train(&mut self, s_t: &Tensor, a_t: &Tensor, s_tp1: &Tensor) -> Result<Tensor> {
        self.check_pair(s_t, s_tp1)?;
        if let LatentSource::Vae { vae, optimizer, .. } = &mut self.source {
            let out = vae.forward(s_t)?;
            optimizer.minimize(&out.loss);
            self.losses.vae.push(out.loss.double_value(&[]));
        }

        let reward = self.dynamics_step(s_t, a_t, s_tp1)?;

        self.steps += 1;
        self.refresh_target()?;
        Ok(reward)
    }

    /// Update only the dynamics model; encoder and target stay untouched.
    pub fn train_dynamics_only(
        &mut self,
        s_t: &Tensor,
        a_t: &Tensor,
        s_tp1: &Tensor,
    ) -> Result<Tensor> {
        self.check_pair(s_t, s_tp1)?;
        self.dynamics_step(s_t, a_t, s_tp1)
    }

    /// Prediction error `[B]` without updating anything
    pub fn intrinsic_reward(&self, s_t: &Tensor, a_t: &Tensor, s_tp1: &Tensor) -> Result<Tensor> {
        self.check_pair(s_t, s_tp1)?;
        let latent_t = self.target_encode(s_t)?;
        let latent_tp1 = self.target_encode(s_tp1)?;
        tch::no_grad(|| {
            let predicted = self.dynamics.forward(&latent_t, a_t)?;
            Ok(prediction_error(&predicted, &latent_tp1))
        })
    }

    /// Latent belief from the live encoder (no graph)
    pub fn encode(&self, x: &Tensor) -> Result<LatentState> {
        match &self.source {
            LatentSource::Identity => self.identity_latent(x),
            LatentSource::Vae { vae, .. } => {
                let (mu, log_var) = tch::no_grad(|| vae.encode(x))?;
                Ok(LatentState::new(mu, log_var))
            }
        }
    }

    /// Latent belief from the frozen encoder
    pub fn target_encode(&self, x: &Tensor) -> Result<LatentState> {
        match &self.source {
            LatentSource::Identity => self.identity_latent(x),
            LatentSource::Vae { target, .. } => {
                let (mu, log_var) = target.forward(x)?;
                Ok(LatentState::new(mu, log_var))
            }
        }
    }

    pub fn predict_next_latent(&self, latent: &LatentState, a_t: &Tensor) -> Result<LatentState> {
        tch::no_grad(|| self.dynamics.forward(latent, a_t))
    }

    /// Predicted next observation: the decoded predicted mean in VAE mode,
    /// the predicted mean reshaped to the observation otherwise.
    pub fn predict_next_obs(&self, x_t: &Tensor, a_t: &Tensor) -> Result<Tensor> {
        let latent = self.encode(x_t)?;
        let next = self.predict_next_latent(&latent, a_t)?;
        match &self.source {
            LatentSource::Identity => Ok(next.mu),
            LatentSource::Vae { vae, .. } => vae.decode(&next.mu),
        }
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn losses(&self) -> &WorldModelLosses {
        &self.losses
    }

    pub fn latent_dim(&self) -> i64 {
        self.dynamics.latent_dim()
    }

    pub fn uses_vae(&self) -> bool {
        matches!(self.source, LatentSource::Vae { .. })
    }

    pub fn vae(&self) -> Option<&Vae> {
        match &self.source {
            LatentSource::Vae { vae, .. } => Some(vae),
            LatentSource::Identity => None,
        }
    }

    pub fn device(&self) -> Device {
        self.vs.device()
    }

    fn dynamics_step(&mut self, s_t: &Tensor, a_t: &Tensor, s_tp1: &Tensor) -> Result<Tensor> {
        let latent_t = self.target_encode(s_t)?;
        let latent_tp1 = self.target_encode(s_tp1)?;
        let predicted = self.dynamics.forward(&latent_t, a_t)?;
        let per_row = prediction_error(&predicted, &latent_tp1);
        let loss = per_row.mean(Kind::Float);
        self.optimizer.minimize(&loss);
        self.losses.world_model.push(loss.double_value(&[]));
        Ok(per_row.detach())
    }

    fn refresh_target(&mut self) -> Result<()> {
        let LatentSource::Vae { vae, target, .. } = &mut self.source else {
            return Ok(());
        };
        match self.target_update {
            TargetUpdate::Hard { every } if self.steps % every == 0 => {
                tracing::debug!(step = self.steps, "refreshing target encoder");
                target.sync_from(vae)
            }
            TargetUpdate::Hard { .. } => Ok(()),
            TargetUpdate::Soft { tau } => target.soft_update_from(vae, tau),
        }
    }

    fn identity_latent(&self, x: &Tensor) -> Result<LatentState> {
        let mu = match self.shape.check_i64(&x.size())? {
            InputKind::Single => x.unsqueeze(0),
            InputKind::Batch(_) => x.shallow_clone(),
        }
        .to_device(self.vs.device())
        .to_kind(Kind::Float)
        .detach();
        let log_var = mu.zeros_like();
        Ok(LatentState::new(mu, log_var))
    }

    fn check_pair(&self, s_t: &Tensor, s_tp1: &Tensor) -> Result<()> {
        if s_t.size() != s_tp1.size() {
            return Err(CuriosityError::ShapeMismatch {
                expected: s_t.size().iter().map(|&d| d as usize).collect(),
                actual: s_tp1.size().iter().map(|&d| d as usize).collect(),
            });
        }
        self.shape.check_i64(&s_t.size())?;
        Ok(())
    }
}

impl Checkpointable for WorldModel {
    fn save_state(&self) -> Result<Vec<u8>> {
        let mut dynamics = Vec::new();
        self.vs.save_to_stream(&mut dynamics)?;
        let (vae, target_encoder, vae_optimizer) = match &self.source {
            LatentSource::Identity => (None, None, None),
            LatentSource::Vae {
                vae,
                target,
                optimizer,
            } => {
                let mut buf = Vec::new();
                vae.var_store().save_to_stream(&mut buf)?;
                (
                    Some(buf),
                    Some(target.params_to_bytes()?),
                    Some(optimizer.settings()),
                )
            }
        };
        let state = WorldModelState {
            steps: self.steps,
            losses: self.losses.clone(),
            dynamics,
            optimizer: self.optimizer.settings(),
            vae,
            target_encoder,
            vae_optimizer,
        };
        Ok(serde_json::to_vec(&state)?)
    }

    fn load_state(&mut self, data: &[u8]) -> Result<()> {
        let state: WorldModelState = serde_json::from_slice(data)?;
        self.vs.load_from_stream(std::io::Cursor::new(&state.dynamics))?;
        self.optimizer.apply_settings(state.optimizer);

        match (&mut self.source, state.vae, state.target_encoder) {
            (LatentSource::Identity, None, None) => {}
            (
                LatentSource::Vae {
                    vae,
                    target,
                    optimizer,
                },
                Some(vae_params),
                Some(target_params),
            ) => {
                vae.var_store_mut()
                    .load_from_stream(std::io::Cursor::new(&vae_params))?;
                target.params_from_bytes(&target_params)?;
                if let Some(settings) = state.vae_optimizer {
                    optimizer.apply_settings(settings);
                }
            }
            _ => {
                return Err(CuriosityError::InvalidConfig(
                    "checkpoint latent source does not match this world model".into(),
                ))
            }
        }

        self.steps = state.steps;
        self.losses = state.losses;
        Ok(())
    }
}

#[cfg(all(test, feature = "torch"))]
mod tests {
    use super::*;

    fn opts() -> (Kind, Device) {
        (Kind::Float, Device::Cpu)
    }

    fn vector_model() -> WorldModel {
        let config = WorldModelConfig {
            hidden_sizes: vec![32, 32],
            learning_rate: 1e-3,
            ..Default::default()
        };
        WorldModel::new(&[4], 2, &config, Device::Cpu).unwrap()
    }

    fn image_model(target_update: TargetUpdate) -> WorldModel {
        let mut config = WorldModelConfig {
            hidden_sizes: vec![32],
            target_update,
            ..Default::default()
        };
        config.vae.z_dim = 8;
        WorldModel::new(&[1, 36, 36], 3, &config, Device::Cpu).unwrap()
    }

    #[test]
    fn test_identity_latents() {
        let wm = vector_model();
        assert!(!wm.uses_vae());
        assert_eq!(wm.latent_dim(), 4);
        let x = Tensor::rand([3, 4], opts());
        let latent = wm.encode(&x).unwrap();
        assert!(latent.mu.equal(&x));
        assert_eq!(latent.log_var.abs().sum(Kind::Float).double_value(&[]), 0.0);
    }

    #[test]
    fn test_train_returns_per_row_reward() {
        let mut wm = vector_model();
        let s = Tensor::rand([6, 4], opts());
        let s2 = Tensor::rand([6, 4], opts());
        let a = Tensor::from_slice(&[0i64, 1, 0, 1, 0, 1]);

        let r = wm.train(&s, &a, &s2).unwrap();
        assert_eq!(r.size(), vec![6]);
        assert!(!r.requires_grad());
        assert!(r.min().double_value(&[]) >= 0.0);
        assert_eq!(wm.steps(), 1);
        assert_eq!(wm.losses().world_model.len(), 1);
        assert!(wm.losses().vae.is_empty());
    }

    #[test]
    fn test_prediction_error_falls_with_training() {
        tch::manual_seed(3);
        let mut wm = vector_model();
        let s = Tensor::rand([16, 4], opts());
        let s2 = &s * 0.5;
        let a = Tensor::zeros([16], (Kind::Int64, Device::Cpu));

        let before = wm.intrinsic_reward(&s, &a, &s2).unwrap().mean(Kind::Float).double_value(&[]);
        for _ in 0..200 {
            wm.train(&s, &a, &s2).unwrap();
        }
        let after = wm.intrinsic_reward(&s, &a, &s2).unwrap().mean(Kind::Float).double_value(&[]);
        assert!(after < before, "{} !< {}", after, before);
        assert_eq!(wm.steps(), 200);
    }

    #[test]
    fn test_dynamics_only_leaves_step_count() {
        let mut wm = vector_model();
        let s = Tensor::rand([2, 4], opts());
        wm.train_dynamics_only(&s, &Tensor::from_slice(&[0i64, 1]), &s).unwrap();
        assert_eq!(wm.steps(), 0);
        assert_eq!(wm.losses().world_model.len(), 1);
    }

    #[test]
    fn test_rejects_mismatched_pair() {
        let mut wm = vector_model();
        let err = wm
            .train(
                &Tensor::rand([2, 4], opts()),
                &Tensor::from_slice(&[0i64, 1]),
                &Tensor::rand([3, 4], opts()),
            )
            .unwrap_err();
        assert!(matches!(err, CuriosityError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_vae_mode_trains_both_and_refreshes_target() {
        let mut wm = image_model(TargetUpdate::Hard { every: 2 });
        assert!(wm.uses_vae());
        let s = Tensor::rand([4, 1, 36, 36], opts());
        let s2 = Tensor::rand([4, 1, 36, 36], opts());
        let a = Tensor::from_slice(&[0i64, 1, 2, 0]);

        wm.train(&s, &a, &s2).unwrap();
        let live = wm.encode(&s).unwrap();
        let frozen = wm.target_encode(&s).unwrap();
        assert!(!live.mu.allclose(&frozen.mu, 1e-7, 1e-7, false));

        wm.train(&s, &a, &s2).unwrap();
        let live = wm.encode(&s).unwrap();
        let frozen = wm.target_encode(&s).unwrap();
        assert!(live.mu.allclose(&frozen.mu, 1e-6, 1e-6, false));
        assert_eq!(wm.losses().vae.len(), 2);

        let next = wm.predict_next_obs(&s, &a).unwrap();
        assert_eq!(next.size(), vec![4, 1, 36, 36]);
    }

    #[test]
    fn test_checkpoint_round_trip() {
        let mut wm = image_model(TargetUpdate::Soft { tau: 0.1 });
        let s = Tensor::rand([2, 1, 36, 36], opts());
        let a = Tensor::from_slice(&[1i64, 2]);
        wm.train(&s, &a, &s).unwrap();
        let blob = wm.save_state().unwrap();

        let mut restored = image_model(TargetUpdate::Soft { tau: 0.1 });
        restored.load_state(&blob).unwrap();
        assert_eq!(restored.steps(), 1);
        let expected = wm.intrinsic_reward(&s, &a, &s).unwrap();
        let actual = restored.intrinsic_reward(&s, &a, &s).unwrap();
        assert!(expected.allclose(&actual, 1e-6, 1e-6, false));

        let mut vector = vector_model();
        assert!(vector.load_state(&blob).is_err());
    }
}
