//! Q-value function approximators.
//!
//! - `ObsShape` and `Architecture` decide the network body from the
//!   observation shape and validate inputs
//! - `QNetwork` is the live network, `TargetNetwork` its frozen snapshot
//!   (requires `torch` feature)

mod shape;

#[cfg(feature = "torch")]
mod layers;
#[cfg(feature = "torch")]
mod qnet;
#[cfg(feature = "torch")]
mod target;

pub use shape::{
    conv_output_dims, transpose_paddings, Architecture, ConvLayer, InputKind, ObsShape,
    STANDARD_CONV,
};

#[cfg(feature = "torch")]
pub use layers::{conv_flat_size, conv_stack, mlp};
#[cfg(feature = "torch")]
pub use qnet::QNetwork;
#[cfg(feature = "torch")]
pub use target::{hard_update, soft_update, TargetNetwork};

#[cfg(all(test, feature = "torch"))]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;
    use crate::optim::ClippedAdam;
    use crate::CuriosityError;
    use tch::{Device, Kind, Tensor};

    fn params_equal(a: &tch::nn::VarStore, b: &tch::nn::VarStore) -> bool {
        let b_vars = b.variables();
        a.variables()
            .iter()
            .all(|(name, t)| b_vars.get(name).map(|u| t.equal(u)).unwrap_or(false))
    }

    fn dense() -> QNetwork {
        QNetwork::new(&[4], 2, &NetworkConfig::default(), Device::Cpu).unwrap()
    }

    #[test]
    fn test_dense_forward_shapes() {
        let net = dense();
        let single = net.forward(&Tensor::zeros([4], (Kind::Float, Device::Cpu))).unwrap();
        assert_eq!(single.size(), vec![1, 2]);
        let batch = net.forward(&Tensor::zeros([5, 4], (Kind::Float, Device::Cpu))).unwrap();
        assert_eq!(batch.size(), vec![5, 2]);
    }

    #[test]
    fn test_conv_forward_shapes() {
        let net = QNetwork::new(&[1, 64, 64], 3, &NetworkConfig::default(), Device::Cpu).unwrap();
        assert!(matches!(net.architecture(), Architecture::Conv { .. }));
        let out = net
            .forward(&Tensor::rand([2, 1, 64, 64], (Kind::Float, Device::Cpu)))
            .unwrap();
        assert_eq!(out.size(), vec![2, 3]);
    }

    #[test]
    fn test_bad_input_shape() {
        let net = dense();
        let err = net
            .forward(&Tensor::zeros([5, 3], (Kind::Float, Device::Cpu)))
            .unwrap_err();
        assert!(matches!(err, CuriosityError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_snapshot_is_frozen_until_sync() {
        let live = dense();
        let mut target = live.snapshot().unwrap();
        assert!(params_equal(live.var_store(), target.var_store()));
        assert!(target
            .var_store()
            .trainable_variables()
            .iter()
            .all(|t| !t.requires_grad()));

        let before: Vec<(String, Tensor)> = target
            .var_store()
            .variables()
            .into_iter()
            .map(|(k, v)| (k, v.copy()))
            .collect();

        let mut opt = ClippedAdam::new(live.var_store(), 1e-2, 10.0).unwrap();
        let x = Tensor::rand([8, 4], (Kind::Float, Device::Cpu));
        for _ in 0..2 {
            let loss = live.forward(&x).unwrap().sum(Kind::Float);
            opt.minimize(&loss);
        }
        assert!(!params_equal(live.var_store(), target.var_store()));
        let after = target.var_store().variables();
        assert!(before.iter().all(|(k, v)| v.equal(&after[k])));

        target.sync_from(&live).unwrap();
        assert!(params_equal(live.var_store(), target.var_store()));
    }

    #[test]
    fn test_soft_update_moves_toward_live() {
        let live = dense();
        let other = dense();
        let mut target = other.snapshot().unwrap();
        let name = "q.out.weight";
        let before = target.var_store().variables()[name].copy();
        let source = live.var_store().variables()[name].copy();

        target.soft_update_from(&live, 0.5).unwrap();
        let after = target.var_store().variables()[name].copy();
        let expected = (before + source) * 0.5;
        assert!(after.allclose(&expected, 1e-6, 1e-6, false));

        assert!(target.soft_update_from(&live, 0.0).is_err());
    }

    #[test]
    fn test_params_bytes_round_trip() {
        let a = dense();
        let mut b = dense();
        assert!(!params_equal(a.var_store(), b.var_store()));
        let bytes = a.params_to_bytes().unwrap();
        b.params_from_bytes(&bytes).unwrap();
        assert!(params_equal(a.var_store(), b.var_store()));
    }
}
