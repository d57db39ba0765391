//! Transition records and their column-wise batches.

use crate::{CuriosityError, Result};
use ndarray::{stack, Array1, ArrayD, ArrayView, Axis, IxDyn};
#[cfg(feature = "torch")]
use tch::{Device, Kind, Tensor};

/// One step of experience: `(s_t, a_t, r_t, s_tp1, done)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub state: ArrayD<f32>,
    pub action: usize,
    pub reward: f32,
    pub next_state: ArrayD<f32>,
    pub done: bool,
}

/// One step of experience without the extrinsic reward, for pipelines where
/// the reward is computed later from the world model.
#[derive(Clone, Debug, PartialEq)]
pub struct DynamicsTransition {
    pub state: ArrayD<f32>,
    pub action: usize,
    pub next_state: ArrayD<f32>,
    pub done: bool,
}

/// Column-wise batch of `Transition`s. Row `i` of every field comes from the
/// same transition.
#[derive(Clone, Debug)]
pub struct TransitionBatch {
    /// `[B, ..obs_shape]`
    pub states: ArrayD<f32>,
    /// `[B]`
    pub actions: Array1<i64>,
    /// `[B]`
    pub rewards: Array1<f32>,
    /// `[B, ..obs_shape]`
    pub next_states: ArrayD<f32>,
    /// `[B]`, 1.0 where the episode ended
    pub dones: Array1<f32>,
}

/// Column-wise batch of `DynamicsTransition`s.
#[derive(Clone, Debug)]
pub struct DynamicsBatch {
    pub states: ArrayD<f32>,
    pub actions: Array1<i64>,
    pub next_states: ArrayD<f32>,
    pub dones: Array1<f32>,
}

/// Records that can be gathered into a column-wise batch.
pub trait Collate: Sized {
    type Batch;

    /// Build one batch from the given rows, preserving their order.
    fn collate(items: &[&Self]) -> Result<Self::Batch>;
}

/// Stack observations along a new leading batch axis.
fn stack_observations<'a, I>(observations: I) -> Result<ArrayD<f32>>
where
    I: IntoIterator<Item = &'a ArrayD<f32>>,
{
    let views: Vec<ArrayView<'a, f32, IxDyn>> = observations.into_iter().map(|o| o.view()).collect();
    let first = views
        .first()
        .ok_or_else(|| CuriosityError::InvalidConfig("cannot collate an empty batch".into()))?
        .shape()
        .to_vec();
    if let Some(bad) = views.iter().find(|v| v.shape() != first.as_slice()) {
        return Err(CuriosityError::ShapeMismatch {
            expected: first,
            actual: bad.shape().to_vec(),
        });
    }
    stack(Axis(0), &views).map_err(|e| CuriosityError::InvalidConfig(e.to_string()))
}

fn done_flag(done: bool) -> f32 {
    if done {
        1.0
    } else {
        0.0
    }
}

impl Collate for Transition {
    type Batch = TransitionBatch;

    fn collate(items: &[&Self]) -> Result<TransitionBatch> {
        Ok(TransitionBatch {
            states: stack_observations(items.iter().map(|t| &t.state))?,
            actions: items.iter().map(|t| t.action as i64).collect(),
            rewards: items.iter().map(|t| t.reward).collect(),
            next_states: stack_observations(items.iter().map(|t| &t.next_state))?,
            dones: items.iter().map(|t| done_flag(t.done)).collect(),
        })
    }
}

impl Collate for DynamicsTransition {
    type Batch = DynamicsBatch;

    fn collate(items: &[&Self]) -> Result<DynamicsBatch> {
        Ok(DynamicsBatch {
            states: stack_observations(items.iter().map(|t| &t.state))?,
            actions: items.iter().map(|t| t.action as i64).collect(),
            next_states: stack_observations(items.iter().map(|t| &t.next_state))?,
            dones: items.iter().map(|t| done_flag(t.done)).collect(),
        })
    }
}

impl TransitionBatch {
    /// Number of rows
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl DynamicsBatch {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Batch columns as tensors on one device.
#[cfg(feature = "torch")]
#[derive(Debug)]
pub struct TensorBatch {
    pub states: Tensor,
    /// Int64 action indices
    pub actions: Tensor,
    /// `None` for dynamics batches
    pub rewards: Option<Tensor>,
    pub next_states: Tensor,
    pub dones: Tensor,
}

/// Copy an `f32` array into a float tensor with the same shape.
#[cfg(feature = "torch")]
pub fn array_to_tensor(array: &ArrayD<f32>, device: Device) -> Tensor {
    let shape: Vec<i64> = array.shape().iter().map(|&d| d as i64).collect();
    let tensor = match array.as_slice() {
        Some(data) => Tensor::from_slice(data),
        None => Tensor::from_slice(&array.iter().copied().collect::<Vec<f32>>()),
    };
    tensor.reshape(shape.as_slice()).to_device(device)
}

#[cfg(feature = "torch")]
fn column_to_tensor<T: tch::kind::Element>(column: &Array1<T>, device: Device) -> Tensor {
    let data: Vec<T> = column.iter().copied().collect();
    Tensor::from_slice(&data).to_device(device)
}

#[cfg(feature = "torch")]
impl TransitionBatch {
    pub fn to_tensors(&self, device: Device) -> TensorBatch {
        TensorBatch {
            states: array_to_tensor(&self.states, device),
            actions: column_to_tensor(&self.actions, device).to_kind(Kind::Int64),
            rewards: Some(column_to_tensor(&self.rewards, device)),
            next_states: array_to_tensor(&self.next_states, device),
            dones: column_to_tensor(&self.dones, device),
        }
    }
}

#[cfg(feature = "torch")]
impl DynamicsBatch {
    pub fn to_tensors(&self, device: Device) -> TensorBatch {
        TensorBatch {
            states: array_to_tensor(&self.states, device),
            actions: column_to_tensor(&self.actions, device).to_kind(Kind::Int64),
            rewards: None,
            next_states: array_to_tensor(&self.next_states, device),
            dones: column_to_tensor(&self.dones, device),
        }
    }
}
