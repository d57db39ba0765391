//! Transposed-conv image decoder.

use crate::network::{conv_output_dims, transpose_paddings, ObsShape, STANDARD_CONV};
use crate::{CuriosityError, Result};
use tch::{nn, nn::Module, Tensor};

/// Linear projection followed by the conv stack in reverse, ending in a
/// sigmoid so outputs are Bernoulli means.
#[derive(Debug)]
pub struct Decoder {
    fc: nn::Linear,
    deconv: nn::Sequential,
    /// `[C, H, W]` of the decoded image
    out_shape: [i64; 3],
    /// `[channels, h, w]` the projection is reshaped to
    start_shape: [i64; 3],
}

impl Decoder {
    pub fn new(p: &nn::Path, shape: &ObsShape, z_dim: i64) -> Result<Self> {
        let [c, h, w] = match *shape.dims() {
            [c, h, w] => [c as i64, h as i64, w as i64],
            _ => {
                return Err(CuriosityError::InvalidConfig(format!(
                    "decoder needs [C, H, W] observations, got {:?}",
                    shape.dims()
                )))
            }
        };
        let too_small =
            || CuriosityError::InvalidConfig(format!("image {}x{} is too small for the conv stack", h, w));
        let dims = conv_output_dims(h, w).ok_or_else(too_small)?;
        let paddings = transpose_paddings(h, w).ok_or_else(too_small)?;

        let last = STANDARD_CONV.len() - 1;
        let (h_in, w_in) = dims[last];
        let start_shape = [STANDARD_CONV[last].channels, h_in, w_in];
        let fc = nn::linear(p / "fc", z_dim, start_shape.iter().product(), Default::default());

        let mut deconv = nn::seq();
        for (n, (i, pad)) in (0..STANDARD_CONV.len()).rev().zip(paddings).enumerate() {
            let layer = STANDARD_CONV[i];
            let out_channels = if i == 0 { c } else { STANDARD_CONV[i - 1].channels };
            deconv = deconv.add(nn::conv_transpose2d(
                p / format!("d{}", n + 1),
                layer.channels,
                out_channels,
                layer.kernel,
                nn::ConvTransposeConfig {
                    stride: layer.stride,
                    output_padding: pad,
                    ..Default::default()
                },
            ));
            if i > 0 {
                deconv = deconv.add_fn(|x| x.relu());
            }
        }

        Ok(Self {
            fc,
            deconv,
            out_shape: [c, h, w],
            start_shape,
        })
    }

    /// Images `[B, C, H, W]` in (0, 1) for latents `[B, z_dim]`
    pub fn forward(&self, z: &Tensor) -> Tensor {
        let [c0, h0, w0] = self.start_shape;
        let [_, h, w] = self.out_shape;
        self.fc
            .forward(z)
            .relu()
            .reshape([-1, c0, h0, w0])
            .apply(&self.deconv)
            .narrow(2, 0, h)
            .narrow(3, 0, w)
            .sigmoid()
    }
}
