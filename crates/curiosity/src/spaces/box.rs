//! Box (continuous) observation space

use super::Space;
use ndarray::{ArrayD, IxDyn, Zip};
use rand::Rng;
use rand_distr::{Distribution, Uniform};

/// Bounded continuous space, used for vector and image observations
#[derive(Clone, Debug)]
pub struct Box {
    /// Lower bound for each element
    pub low: ArrayD<f32>,
    /// Upper bound for each element
    pub high: ArrayD<f32>,
    shape: Vec<usize>,
}

impl Box {
    /// Create a new box space with given bounds
    pub fn new(low: ArrayD<f32>, high: ArrayD<f32>) -> Self {
        assert_eq!(low.shape(), high.shape(), "Low and high must have same shape");
        let shape = low.shape().to_vec();
        Self { low, high, shape }
    }

    /// Create a box space with uniform bounds
    pub fn uniform(shape: &[usize], low: f32, high: f32) -> Self {
        Self::new(
            ArrayD::from_elem(IxDyn(shape), low),
            ArrayD::from_elem(IxDyn(shape), high),
        )
    }

    /// Create a unit box [0, 1], the range of normalised image frames
    pub fn unit(shape: &[usize]) -> Self {
        Self::uniform(shape, 0.0, 1.0)
    }

    /// Number of dimensions of one observation
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Whether samples are `[C, H, W]` images
    pub fn is_image(&self) -> bool {
        self.rank() == 3
    }
}

impl Space for Box {
    type Sample = ArrayD<f32>;

    fn sample<R: Rng>(&self, rng: &mut R) -> Self::Sample {
        let mut result = ArrayD::zeros(IxDyn(&self.shape));
        Zip::from(&mut result)
            .and(&self.low)
            .and(&self.high)
            .for_each(|r, &l, &h| {
                // Unbounded dimensions sample from a unit interval around zero
                *r = if l.is_finite() && h.is_finite() && l < h {
                    Uniform::new(l, h).sample(rng)
                } else {
                    rng.gen_range(-1.0..1.0)
                };
            });
        result
    }

    fn contains(&self, value: &Self::Sample) -> bool {
        if value.shape() != self.low.shape() {
            return false;
        }
        value
            .iter()
            .zip(self.low.iter())
            .zip(self.high.iter())
            .all(|((&v, &l), &h)| v >= l && v <= h)
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }
}
