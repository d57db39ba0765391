//! Layer stacks shared by the Q-network, the VAE and the dynamics model.

use super::shape::{conv_output_dims, STANDARD_CONV};
use tch::nn;

/// `STANDARD_CONV` with ReLU after every layer, flattened to `[B, features]`.
pub fn conv_stack(p: &nn::Path, in_channels: i64) -> nn::Sequential {
    let mut seq = nn::seq();
    let mut in_c = in_channels;
    for (i, layer) in STANDARD_CONV.iter().enumerate() {
        let conv = nn::conv2d(
            p / format!("c{}", i + 1),
            in_c,
            layer.channels,
            layer.kernel,
            nn::ConvConfig {
                stride: layer.stride,
                ..Default::default()
            },
        );
        seq = seq.add(conv).add_fn(|x| x.relu());
        in_c = layer.channels;
    }
    seq.add_fn(|x| x.flatten(1, -1))
}

/// Flattened width of `conv_stack` for an image of the given size
pub fn conv_flat_size(height: i64, width: i64) -> Option<i64> {
    let dims = conv_output_dims(height, width)?;
    let (h, w) = *dims.last()?;
    Some(STANDARD_CONV[STANDARD_CONV.len() - 1].channels * h * w)
}

/// Linear layers with ReLU between them; the output layer is linear.
pub fn mlp(p: &nn::Path, input: i64, hidden: &[i64], output: i64) -> nn::Sequential {
    let mut seq = nn::seq();
    let mut in_size = input;
    for (i, &size) in hidden.iter().enumerate() {
        seq = seq
            .add(nn::linear(p / format!("fc{}", i), in_size, size, Default::default()))
            .add_fn(|x| x.relu());
        in_size = size;
    }
    seq.add(nn::linear(p / "out", in_size, output, Default::default()))
}
