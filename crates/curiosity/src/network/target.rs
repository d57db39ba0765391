//! Frozen network copies and the parameter updates that refresh them.

use super::QNetwork;
use crate::{CuriosityError, Result};
use tch::{nn, Tensor};

/// Copy every parameter of `source` into `target`.
pub fn hard_update(target: &mut nn::VarStore, source: &nn::VarStore) -> Result<()> {
    target.copy(source)?;
    Ok(())
}

/// Polyak averaging: `target = tau * source + (1 - tau) * target`.
pub fn soft_update(target: &nn::VarStore, source: &nn::VarStore, tau: f64) -> Result<()> {
    if !(tau > 0.0 && tau <= 1.0) {
        return Err(CuriosityError::InvalidConfig(format!(
            "soft update tau must lie in (0, 1], got {}",
            tau
        )));
    }
    let live = source.variables();
    tch::no_grad(|| {
        for (name, mut frozen) in target.variables() {
            let src = live.get(&name).ok_or_else(|| {
                CuriosityError::InvalidConfig(format!("variable '{}' missing from source", name))
            })?;
            let mixed = src * tau + &frozen * (1.0 - tau);
            frozen.copy_(&mixed);
        }
        Ok(())
    })
}

/// A Q-network snapshot with gradients disabled.
///
/// Produced by `QNetwork::snapshot`; its parameters only change through
/// `sync_from` or `soft_update_from`.
pub struct TargetNetwork {
    pub(super) net: QNetwork,
}

impl TargetNetwork {
    /// Q-values without building a graph
    pub fn forward(&self, obs: &Tensor) -> Result<Tensor> {
        tch::no_grad(|| self.net.forward(obs))
    }

    /// Replace all parameters with those of `live`
    pub fn sync_from(&mut self, live: &QNetwork) -> Result<()> {
        hard_update(&mut self.net.vs, &live.vs)
    }

    pub fn soft_update_from(&mut self, live: &QNetwork, tau: f64) -> Result<()> {
        soft_update(&self.net.vs, &live.vs, tau)
    }

    pub fn var_store(&self) -> &nn::VarStore {
        &self.net.vs
    }

    pub fn params_to_bytes(&self) -> Result<Vec<u8>> {
        self.net.params_to_bytes()
    }

    /// Load parameters; the copy stays frozen
    pub fn params_from_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.net.params_from_bytes(data)?;
        self.net.vs.freeze();
        Ok(())
    }
}
