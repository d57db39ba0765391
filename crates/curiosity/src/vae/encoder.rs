//! Gaussian image encoders.

use super::Vae;
use crate::network::{conv_flat_size, conv_stack, soft_update, InputKind, ObsShape};
use crate::{CuriosityError, Result};
use tch::{nn, nn::Module, Kind, Tensor};

/// Conv stack followed by linear heads for `mu` and `log_var`.
#[derive(Debug)]
pub struct GaussianEncoder {
    conv: nn::Sequential,
    mu: nn::Linear,
    log_var: nn::Linear,
}

impl GaussianEncoder {
    pub fn new(p: &nn::Path, shape: &ObsShape, z_dim: i64) -> Result<Self> {
        let [c, h, w] = match *shape.dims() {
            [c, h, w] => [c as i64, h as i64, w as i64],
            _ => {
                return Err(CuriosityError::InvalidConfig(format!(
                    "encoder needs [C, H, W] observations, got {:?}",
                    shape.dims()
                )))
            }
        };
        let flat = conv_flat_size(h, w).ok_or_else(|| {
            CuriosityError::InvalidConfig(format!("image {}x{} is too small for the conv stack", h, w))
        })?;
        Ok(Self {
            conv: conv_stack(&(p / "conv"), c),
            mu: nn::linear(p / "mu", flat, z_dim, Default::default()),
            log_var: nn::linear(p / "log_var", flat, z_dim, Default::default()),
        })
    }

    /// `(mu, log_var)`, each `[B, z_dim]`, for a batched image tensor
    pub fn forward(&self, x: &Tensor) -> (Tensor, Tensor) {
        let features = self.conv.forward(x);
        (self.mu.forward(&features), self.log_var.forward(&features))
    }
}

/// Frozen copy of a VAE encoder.
///
/// Supplies the world model's latents so its regression targets only move
/// when the copy is refreshed.
pub struct TargetEncoder {
    vs: nn::VarStore,
    encoder: GaussianEncoder,
    shape: ObsShape,
}

impl TargetEncoder {
    pub(super) fn from_vae(vae: &Vae) -> Result<Self> {
        let mut vs = nn::VarStore::new(vae.device());
        let encoder = GaussianEncoder::new(&(vs.root() / "encoder"), vae.obs_shape(), vae.z_dim())?;
        vs.copy(vae.var_store())?;
        vs.freeze();
        Ok(Self {
            vs,
            encoder,
            shape: vae.obs_shape().clone(),
        })
    }

    /// `(mu, log_var)` without a graph
    pub fn forward(&self, x: &Tensor) -> Result<(Tensor, Tensor)> {
        let x = match self.shape.check_i64(&x.size())? {
            InputKind::Single => x.unsqueeze(0),
            InputKind::Batch(_) => x.shallow_clone(),
        };
        let x = x.to_device(self.vs.device()).to_kind(Kind::Float);
        Ok(tch::no_grad(|| self.encoder.forward(&x)))
    }

    /// Copy the live encoder's parameters
    pub fn sync_from(&mut self, vae: &Vae) -> Result<()> {
        self.vs.copy(vae.var_store())?;
        Ok(())
    }

    pub fn soft_update_from(&mut self, vae: &Vae, tau: f64) -> Result<()> {
        soft_update(&self.vs, vae.var_store(), tau)
    }

    pub fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    pub fn params_to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.vs.save_to_stream(&mut buf)?;
        Ok(buf)
    }

    pub fn params_from_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.vs.load_from_stream(std::io::Cursor::new(data))?;
        self.vs.freeze();
        Ok(())
    }
}
