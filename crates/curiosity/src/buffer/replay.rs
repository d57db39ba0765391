//! Fixed-capacity replay buffer with ring-buffer eviction.

use super::transition::Collate;
use crate::{CuriosityError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Fixed-capacity store of past transitions.
///
/// Once full, each `add` overwrites the oldest entry. `sample` draws rows
/// independently and uniformly, with replacement, from the populated slots
/// only.
pub struct ReplayBuffer<T> {
    storage: Vec<T>,
    capacity: usize,
    /// Slot the next insertion writes to once the buffer is full
    next_idx: usize,
    rng: StdRng,
}

impl<T> ReplayBuffer<T> {
    /// Create a buffer with an entropy-seeded sampler
    pub fn new(capacity: usize) -> Result<Self> {
        Self::build(capacity, StdRng::from_entropy())
    }

    /// Create a buffer whose sampling sequence is reproducible
    pub fn with_seed(capacity: usize, seed: u64) -> Result<Self> {
        Self::build(capacity, StdRng::seed_from_u64(seed))
    }

    fn build(capacity: usize, rng: StdRng) -> Result<Self> {
        if capacity == 0 {
            return Err(CuriosityError::InvalidConfig(
                "replay buffer capacity must be positive".into(),
            ));
        }
        Ok(Self {
            storage: Vec::with_capacity(capacity.min(1 << 16)),
            capacity,
            next_idx: 0,
            rng,
        })
    }

    /// Insert a transition, evicting the oldest one when full
    pub fn add(&mut self, item: T) {
        if self.storage.len() < self.capacity {
            self.storage.push(item);
        } else {
            self.storage[self.next_idx] = item;
        }
        self.next_idx = (self.next_idx + 1) % self.capacity;
    }

    /// Number of stored transitions
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.storage.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every stored transition
    pub fn clear(&mut self) {
        self.storage.clear();
        self.next_idx = 0;
    }

    /// Iterate stored transitions from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let split = if self.is_full() { self.next_idx } else { 0 };
        self.storage[split..].iter().chain(self.storage[..split].iter())
    }

    /// Draw `batch_size` slot indices uniformly with replacement
    pub fn sample_indices(&mut self, batch_size: usize) -> Result<Vec<usize>> {
        if self.storage.is_empty() {
            return Err(CuriosityError::EmptyBuffer);
        }
        if batch_size == 0 {
            return Err(CuriosityError::InvalidConfig(
                "batch size must be positive".into(),
            ));
        }
        let len = self.storage.len();
        Ok((0..batch_size).map(|_| self.rng.gen_range(0..len)).collect())
    }

    /// Draw `batch_size` rows without collating them
    pub fn sample_rows(&mut self, batch_size: usize) -> Result<Vec<&T>> {
        let indices = self.sample_indices(batch_size)?;
        Ok(indices.into_iter().map(|i| &self.storage[i]).collect())
    }
}

impl<T: Collate> ReplayBuffer<T> {
    /// Draw `batch_size` transitions and collate them column-wise
    pub fn sample(&mut self, batch_size: usize) -> Result<T::Batch> {
        let rows = self.sample_rows(batch_size)?;
        T::collate(&rows)
    }
}
