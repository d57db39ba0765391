//! Q-value networks for vector and image observations.

use super::layers::{conv_flat_size, conv_stack, mlp};
use super::shape::{Architecture, InputKind, ObsShape};
use super::target::TargetNetwork;
use crate::config::NetworkConfig;
use crate::{CuriosityError, Result};
use std::io::Cursor;
use tch::{nn, nn::Module, Device, Kind, Tensor};

/// Maps observations to one Q-value per action.
///
/// The body is fixed at construction from the observation shape: a dense
/// stack for `[features]`, the standard conv stack for `[C, H, W]`.
pub struct QNetwork {
    pub(super) vs: nn::VarStore,
    net: nn::Sequential,
    shape: ObsShape,
    architecture: Architecture,
    num_actions: i64,
}

impl QNetwork {
    pub fn new(
        obs_shape: &[usize],
        num_actions: usize,
        config: &NetworkConfig,
        device: Device,
    ) -> Result<Self> {
        let shape = ObsShape::new(obs_shape)?;
        let architecture = Architecture::select(&shape, config)?;
        Self::build(shape, architecture, num_actions as i64, device)
    }

    fn build(
        shape: ObsShape,
        architecture: Architecture,
        num_actions: i64,
        device: Device,
    ) -> Result<Self> {
        if num_actions <= 0 {
            return Err(CuriosityError::InvalidConfig(
                "Q-network needs at least one action".into(),
            ));
        }
        let vs = nn::VarStore::new(device);
        let root = vs.root();

        let net = match &architecture {
            Architecture::Dense { input, hidden } => mlp(&(&root / "q"), *input, hidden, num_actions),
            Architecture::Conv {
                channels,
                height,
                width,
                hidden,
            } => {
                let flat = conv_flat_size(*height, *width).ok_or_else(|| {
                    CuriosityError::InvalidConfig(format!(
                        "image {}x{} is too small for the conv stack",
                        height, width
                    ))
                })?;
                conv_stack(&(&root / "conv"), *channels)
                    .add(nn::linear(&root / "fc", flat, *hidden, Default::default()))
                    .add_fn(|x| x.relu())
                    .add(nn::linear(&root / "head", *hidden, num_actions, Default::default()))
            }
        };

        Ok(Self {
            vs,
            net,
            shape,
            architecture,
            num_actions,
        })
    }

    /// Q-values `[B, num_actions]` for a single observation or a batch
    pub fn forward(&self, obs: &Tensor) -> Result<Tensor> {
        let x = self.prepare(obs)?;
        Ok(self.net.forward(&x))
    }

    /// Validate the shape, add a batch axis if needed, move to the device
    pub fn prepare(&self, obs: &Tensor) -> Result<Tensor> {
        let x = match self.shape.check_i64(&obs.size())? {
            InputKind::Single => obs.unsqueeze(0),
            InputKind::Batch(_) => obs.shallow_clone(),
        };
        Ok(x.to_device(self.device()).to_kind(Kind::Float))
    }

    /// Frozen deep copy with its own parameter store
    pub fn snapshot(&self) -> Result<TargetNetwork> {
        let mut copy = Self::build(
            self.shape.clone(),
            self.architecture.clone(),
            self.num_actions,
            self.device(),
        )?;
        copy.vs.copy(&self.vs)?;
        copy.vs.freeze();
        Ok(TargetNetwork { net: copy })
    }

    pub fn num_actions(&self) -> i64 {
        self.num_actions
    }

    pub fn obs_shape(&self) -> &ObsShape {
        &self.shape
    }

    pub fn architecture(&self) -> &Architecture {
        &self.architecture
    }

    pub fn device(&self) -> Device {
        self.vs.device()
    }

    pub fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    pub fn var_store_mut(&mut self) -> &mut nn::VarStore {
        &mut self.vs
    }

    pub fn num_parameters(&self) -> i64 {
        self.vs
            .trainable_variables()
            .iter()
            .map(|t| t.numel() as i64)
            .sum()
    }

    /// Parameters as bytes
    pub fn params_to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.vs.save_to_stream(&mut buf)?;
        Ok(buf)
    }

    pub fn params_from_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.vs.load_from_stream(Cursor::new(data))?;
        Ok(())
    }
}
