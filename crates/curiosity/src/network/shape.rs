//! Observation shape validation and architecture selection.

use crate::config::NetworkConfig;
use crate::{CuriosityError, Result};
use serde::{Deserialize, Serialize};

/// One layer of the standard conv stack
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConvLayer {
    pub channels: i64,
    pub kernel: i64,
    pub stride: i64,
}

/// Conv stack shared by the Q-network and the VAE encoder
pub const STANDARD_CONV: [ConvLayer; 3] = [
    ConvLayer { channels: 32, kernel: 8, stride: 4 },
    ConvLayer { channels: 64, kernel: 4, stride: 2 },
    ConvLayer { channels: 64, kernel: 3, stride: 1 },
];

/// Spatial size after each layer of `STANDARD_CONV`, or `None` if the image
/// is too small.
pub fn conv_output_dims(height: i64, width: i64) -> Option<Vec<(i64, i64)>> {
    let mut dims = Vec::with_capacity(STANDARD_CONV.len());
    let (mut h, mut w) = (height, width);
    for layer in STANDARD_CONV {
        if h < layer.kernel || w < layer.kernel {
            return None;
        }
        h = (h - layer.kernel) / layer.stride + 1;
        w = (w - layer.kernel) / layer.stride + 1;
        dims.push((h, w));
    }
    Some(dims)
}

/// Output paddings for a transposed mirror of `STANDARD_CONV` that lands on
/// at least `height x width`, ordered from the innermost layer outwards.
///
/// Each layer uses one padding for both axes, so non-square images may come
/// out one or more pixels larger and need cropping.
pub fn transpose_paddings(height: i64, width: i64) -> Option<Vec<i64>> {
    let dims = conv_output_dims(height, width)?;
    let mut paddings = Vec::with_capacity(STANDARD_CONV.len());
    for i in (0..STANDARD_CONV.len()).rev() {
        let layer = STANDARD_CONV[i];
        let (in_h, in_w) = dims[i];
        let (out_h, out_w) = if i == 0 { (height, width) } else { dims[i - 1] };
        let pad_h = out_h - ((in_h - 1) * layer.stride + layer.kernel);
        let pad_w = out_w - ((in_w - 1) * layer.stride + layer.kernel);
        paddings.push(pad_h.max(pad_w));
    }
    Some(paddings)
}

/// How an input related to the declared observation shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputKind {
    /// One observation; a batch axis must be inserted
    Single,
    /// A batch of the given size
    Batch(usize),
}

/// Declared per-example observation shape
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObsShape(Vec<usize>);

impl ObsShape {
    pub fn new(dims: &[usize]) -> Result<Self> {
        if dims.is_empty() || dims.iter().any(|&d| d == 0) {
            return Err(CuriosityError::InvalidConfig(format!(
                "observation shape {:?} must be non-empty with positive dimensions",
                dims
            )));
        }
        Ok(Self(dims.to_vec()))
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn num_elements(&self) -> usize {
        self.0.iter().product()
    }

    /// Classify an input shape as a single example or a batch.
    ///
    /// Rank must be the observation rank or one more, and the trailing
    /// dimensions must match exactly.
    pub fn check(&self, input: &[usize]) -> Result<InputKind> {
        let kind = if input.len() == self.rank() {
            InputKind::Single
        } else if input.len() == self.rank() + 1 {
            InputKind::Batch(input[0])
        } else {
            return Err(self.mismatch(input));
        };
        if input[input.len() - self.rank()..] != self.0[..] {
            return Err(self.mismatch(input));
        }
        Ok(kind)
    }

    /// `check` for tensor sizes
    pub fn check_i64(&self, input: &[i64]) -> Result<InputKind> {
        let dims: Vec<usize> = input.iter().map(|&d| d.max(0) as usize).collect();
        self.check(&dims)
    }

    fn mismatch(&self, input: &[usize]) -> CuriosityError {
        CuriosityError::ShapeMismatch {
            expected: self.0.clone(),
            actual: input.to_vec(),
        }
    }
}

/// Network body chosen from the observation shape
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Architecture {
    /// Fully-connected stack for `[features]` observations
    Dense { input: i64, hidden: Vec<i64> },
    /// `STANDARD_CONV` plus one dense layer for `[C, H, W]` observations
    Conv {
        channels: i64,
        height: i64,
        width: i64,
        hidden: i64,
    },
}

impl Architecture {
    /// Pick the body for an observation shape; ranks other than 1 and 3, and
    /// images too small for the conv stack, are rejected.
    pub fn select(shape: &ObsShape, config: &NetworkConfig) -> Result<Self> {
        match *shape.dims() {
            [features] => Ok(Architecture::Dense {
                input: features as i64,
                hidden: config.hidden_sizes.clone(),
            }),
            [c, h, w] => {
                if conv_output_dims(h as i64, w as i64).is_none() {
                    return Err(CuriosityError::InvalidConfig(format!(
                        "image {}x{} is too small for the conv stack",
                        h, w
                    )));
                }
                Ok(Architecture::Conv {
                    channels: c as i64,
                    height: h as i64,
                    width: w as i64,
                    hidden: config.conv_hidden,
                })
            }
            _ => Err(CuriosityError::InvalidConfig(format!(
                "observations must be rank 1 or rank 3 [C, H, W], got {:?}",
                shape.dims()
            ))),
        }
    }

    /// Width of the body's output
    pub fn feature_size(&self) -> i64 {
        match self {
            Architecture::Dense { input, hidden } => hidden.last().copied().unwrap_or(*input),
            Architecture::Conv { hidden, .. } => *hidden,
        }
    }
}
