//! Variational autoencoder over image observations.
//!
//! A `GaussianEncoder` maps `[C, H, W]` images to the mean and log-variance
//! of a diagonal Gaussian; a `Decoder` maps latents back to per-pixel
//! Bernoulli means. The training objective is the negative ELBO: summed
//! per-pixel BCE plus the closed-form KL to a standard normal, averaged over
//! the batch.

mod decoder;
mod encoder;

pub use decoder::Decoder;
pub use encoder::{GaussianEncoder, TargetEncoder};

use crate::network::{InputKind, ObsShape};
use crate::{CuriosityError, Result};
use tch::{nn, Device, Kind, Reduction, Tensor};

/// Result of one VAE forward pass
pub struct VaeOutput {
    /// Batch-mean negative ELBO
    pub loss: Tensor,
    /// Reparameterised latent sample `[B, z_dim]`
    pub z: Tensor,
    /// Decoder output `[B, C, H, W]` in (0, 1)
    pub reconstruction: Tensor,
    pub mu: Tensor,
    pub log_var: Tensor,
}

pub struct Vae {
    vs: nn::VarStore,
    encoder: GaussianEncoder,
    decoder: Decoder,
    shape: ObsShape,
    z_dim: i64,
}

impl Vae {
    pub fn new(obs_shape: &[usize], z_dim: i64, device: Device) -> Result<Self> {
        let shape = ObsShape::new(obs_shape)?;
        if shape.rank() != 3 {
            return Err(CuriosityError::InvalidConfig(format!(
                "VAE needs [C, H, W] observations, got {:?}",
                obs_shape
            )));
        }
        if z_dim <= 0 {
            return Err(CuriosityError::InvalidConfig("z_dim must be positive".into()));
        }
        let vs = nn::VarStore::new(device);
        let root = vs.root();
        let encoder = GaussianEncoder::new(&(&root / "encoder"), &shape, z_dim)?;
        let decoder = Decoder::new(&(&root / "decoder"), &shape, z_dim)?;
        Ok(Self {
            vs,
            encoder,
            decoder,
            shape,
            z_dim,
        })
    }

    /// Validate, batch and move an image tensor to the VAE's device
    pub fn prepare(&self, x: &Tensor) -> Result<Tensor> {
        let x = match self.shape.check_i64(&x.size())? {
            InputKind::Single => x.unsqueeze(0),
            InputKind::Batch(_) => x.shallow_clone(),
        };
        Ok(x.to_device(self.vs.device()).to_kind(Kind::Float))
    }

    /// Encode, sample with the reparameterisation trick, decode, and score.
    pub fn forward(&self, x: &Tensor) -> Result<VaeOutput> {
        let x = self.prepare(x)?;
        let (mu, log_var) = self.encoder.forward(&x);
        let noise = mu.randn_like();
        let z = &mu + (&log_var * 0.5).exp() * noise;
        let reconstruction = self.decoder.forward(&z);

        let target = x.clamp(0.0, 1.0);
        let recon_loss = reconstruction
            .binary_cross_entropy::<Tensor>(&target, None, Reduction::None)
            .sum_dim_intlist(Some(&[1i64, 2, 3][..]), false, Kind::Float);
        let kl = kl_to_standard_normal(&mu, &log_var);
        let loss = (recon_loss + kl).mean(Kind::Float);

        Ok(VaeOutput {
            loss,
            z,
            reconstruction,
            mu,
            log_var,
        })
    }

    /// `(mu, log_var)` with gradients
    pub fn encode(&self, x: &Tensor) -> Result<(Tensor, Tensor)> {
        let x = self.prepare(x)?;
        Ok(self.encoder.forward(&x))
    }

    /// Decode the posterior mean
    pub fn reconstruct_mean(&self, x: &Tensor) -> Result<Tensor> {
        let x = self.prepare(x)?;
        Ok(tch::no_grad(|| {
            let (mu, _) = self.encoder.forward(&x);
            self.decoder.forward(&mu)
        }))
    }

    pub fn decode(&self, z: &Tensor) -> Result<Tensor> {
        let size = z.size();
        if size.len() != 2 || size[1] != self.z_dim {
            return Err(CuriosityError::ShapeMismatch {
                expected: vec![self.z_dim as usize],
                actual: size.iter().map(|&d| d as usize).collect(),
            });
        }
        let z = z.to_device(self.vs.device()).to_kind(Kind::Float);
        Ok(tch::no_grad(|| self.decoder.forward(&z)))
    }

    /// Decode `n` draws from the prior
    pub fn sample(&self, n: i64) -> Tensor {
        let z = Tensor::randn([n, self.z_dim], (Kind::Float, self.vs.device()));
        tch::no_grad(|| self.decoder.forward(&z))
    }

    /// Frozen copy of the encoder with its own parameter store
    pub fn snapshot_encoder(&self) -> Result<TargetEncoder> {
        TargetEncoder::from_vae(self)
    }

    pub fn z_dim(&self) -> i64 {
        self.z_dim
    }

    pub fn obs_shape(&self) -> &ObsShape {
        &self.shape
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
}

/// `0.5 * sum(exp(log_var) + mu^2 - log_var - 1)` per row
pub fn kl_to_standard_normal(mu: &Tensor, log_var: &Tensor) -> Tensor {
    (log_var.exp() + mu.square() - log_var - 1.0).sum_dim_intlist(
        Some(&[1i64][..]),
        false,
        Kind::Float,
    ) * 0.5
}

#[cfg(all(test, feature = "torch"))]
mod tests {
    use super::*;
    use crate::optim::ClippedAdam;

    fn opts() -> (Kind, Device) {
        (Kind::Float, Device::Cpu)
    }

    #[test]
    fn test_forward_shapes() {
        let vae = Vae::new(&[1, 64, 64], 16, Device::Cpu).unwrap();
        let out = vae.forward(&Tensor::rand([4, 1, 64, 64], opts())).unwrap();
        assert_eq!(out.z.size(), vec![4, 16]);
        assert_eq!(out.reconstruction.size(), vec![4, 1, 64, 64]);
        assert_eq!(out.loss.size(), Vec::<i64>::new());
        assert!(out.loss.double_value(&[]) > 0.0);
    }

    #[test]
    fn test_non_square_images_decode_to_input_size() {
        let vae = Vae::new(&[3, 50, 61], 8, Device::Cpu).unwrap();
        let recon = vae.reconstruct_mean(&Tensor::rand([3, 50, 61], opts())).unwrap();
        assert_eq!(recon.size(), vec![1, 3, 50, 61]);
        assert_eq!(vae.sample(2).size(), vec![2, 3, 50, 61]);
    }

    #[test]
    fn test_kl_is_zero_at_prior() {
        let mu = Tensor::zeros([3, 5], opts());
        let log_var = Tensor::zeros([3, 5], opts());
        let kl = kl_to_standard_normal(&mu, &log_var);
        assert_eq!(kl.size(), vec![3]);
        assert!(kl.abs().max().double_value(&[]) < 1e-7);

        // mu = 1 adds 0.5 per dimension
        let kl = kl_to_standard_normal(&Tensor::ones([1, 4], opts()), &Tensor::zeros([1, 4], opts()));
        assert!((kl.double_value(&[0]) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_bad_inputs() {
        assert!(Vae::new(&[4], 8, Device::Cpu).is_err());
        assert!(Vae::new(&[1, 16, 16], 8, Device::Cpu).is_err());
        let vae = Vae::new(&[1, 36, 36], 8, Device::Cpu).unwrap();
        assert!(vae.forward(&Tensor::rand([2, 3, 36, 36], opts())).is_err());
        assert!(vae.decode(&Tensor::zeros([2, 7], opts())).is_err());
    }

    #[test]
    fn test_training_reduces_loss() {
        tch::manual_seed(0);
        let vae = Vae::new(&[1, 36, 36], 4, Device::Cpu).unwrap();
        let mut opt = ClippedAdam::new(vae.var_store(), 1e-3, 1.0).unwrap();
        let x = Tensor::zeros([8, 1, 36, 36], opts());

        let first = vae.forward(&x).unwrap().loss.double_value(&[]);
        for _ in 0..50 {
            let out = vae.forward(&x).unwrap();
            opt.minimize(&out.loss);
        }
        let last = vae.forward(&x).unwrap().loss.double_value(&[]);
        assert!(last < first, "{} !< {}", last, first);
    }
}
