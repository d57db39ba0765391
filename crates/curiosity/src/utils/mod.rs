//! Utility functions: seeding, formatting and observation preprocessing.

use crate::{CuriosityError, Result};
use ndarray::{Array3, ArrayD, ArrayView3, Axis};

/// Luma weights used to collapse RGB frames to grayscale
const GRAY_WEIGHTS: [f32; 3] = [0.2989, 0.5870, 0.1140];

/// Pixel values are divided by this to land in [0, 1)
const PIXEL_SCALE: f32 = 256.0;

/// Set global random seed
pub fn set_seed(_seed: u64) {
    // Rust-side RNGs are seeded explicitly from config;
    // tch keeps its own generator
    #[cfg(feature = "torch")]
    tch::manual_seed(_seed as i64);
}

/// Format duration in human-readable form
pub fn format_duration(seconds: f64) -> String {
    if seconds < 0.0 {
        return "0s".to_string();
    }

    let secs = seconds as u64;
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;

    if h > 0 {
        format!("{}h {}m {}s", h, m, s)
    } else if m > 0 {
        format!("{}m {}s", m, s)
    } else {
        format!("{}s", s)
    }
}

/// Clip a reward to `[-bound, bound]`.
pub fn clip_reward(reward: f32, bound: f32) -> f32 {
    reward.clamp(-bound, bound)
}

/// Mean of the last `n` values (0.0 for an empty slice).
pub fn tail_mean(values: &[f64], n: usize) -> f64 {
    let start = values.len().saturating_sub(n);
    let tail = &values[start..];
    if tail.is_empty() {
        0.0
    } else {
        tail.iter().sum::<f64>() / tail.len() as f64
    }
}

/// Collapse a channels-first RGB frame `[3, H, W]` to `[1, H, W]`.
pub fn rgb_to_gray(frame: ArrayView3<'_, f32>) -> Result<Array3<f32>> {
    let (c, h, w) = frame.dim();
    if c != 3 {
        return Err(CuriosityError::ShapeMismatch {
            expected: vec![3, h, w],
            actual: vec![c, h, w],
        });
    }
    let mut gray = Array3::zeros((1, h, w));
    for (weight, channel) in GRAY_WEIGHTS.iter().zip(frame.axis_iter(Axis(0))) {
        gray.index_axis_mut(Axis(0), 0)
            .scaled_add(*weight, &channel);
    }
    Ok(gray)
}

/// Nearest-neighbour resize of a channels-last frame `[H, W, C]`.
pub fn resize_nearest(frame: ArrayView3<'_, f32>, height: usize, width: usize) -> Array3<f32> {
    let (h, w, c) = frame.dim();
    Array3::from_shape_fn((height, width, c), |(y, x, ch)| {
        let sy = (y * h / height).min(h.saturating_sub(1));
        let sx = (x * w / width).min(w.saturating_sub(1));
        frame[[sy, sx, ch]]
    })
}

/// Turn a raw channels-last frame `[H, W, C]` with values in [0, 256) into a
/// network-ready observation: resized to `size x size`, channels first,
/// optionally grayscale, scaled to [0, 1).
pub fn standardize_frame(frame: &ArrayD<f32>, size: usize, grayscale: bool) -> Result<ArrayD<f32>> {
    let frame = frame
        .view()
        .into_dimensionality::<ndarray::Ix3>()
        .map_err(|_| CuriosityError::ShapeMismatch {
            expected: vec![size, size, 3],
            actual: frame.shape().to_vec(),
        })?;

    let resized = resize_nearest(frame, size, size);
    let channels_first = resized.permuted_axes([2, 0, 1]);
    let mut out = if grayscale {
        rgb_to_gray(channels_first.view())?
    } else {
        channels_first.as_standard_layout().to_owned()
    };
    out.mapv_inplace(|v| v / PIXEL_SCALE);
    Ok(out.into_dyn())
}
