//! # Value estimators
//!
//! The training loop only talks to action-value estimators through the
//! [`ValueEstimator`] trait. Two instances of the same concrete type play the
//! "online" and "target" roles; the target is never trained directly and only
//! moves through [`ValueEstimator::soft_sync_from`].

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::error::{DqnError, Result};

/// Maps states to per-action value estimates.
pub trait ValueEstimator {
    /// Length of the flattened state vector the estimator accepts.
    fn input_size(&self) -> usize;

    /// Number of discrete actions.
    fn action_count(&self) -> usize;

    /// Estimated action values for a single state.
    fn predict_values(&self, state: ArrayView1<f32>) -> Result<Array1<f32>>;

    /// Estimated action values for a batch of states, one row per state.
    fn predict_values_batch(&self, states: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Greedy action for a single state.
    fn predict_action(&self, state: ArrayView1<f32>) -> Result<usize> {
        let values = self.predict_values(state)?;
        argmax(values.view())
    }

    /// Greedy action for every row of `states`.
    fn predict_actions_batch(&self, states: ArrayView2<f32>) -> Result<Vec<usize>> {
        let values = self.predict_values_batch(states)?;
        values.rows().into_iter().map(argmax).collect()
    }

    /// One gradient step pulling `Q(states[i], actions[i])` toward
    /// `targets[i]`. Returns the mean squared error before the step.
    fn update(&mut self, states: ArrayView2<f32>, actions: &[usize], targets: ArrayView1<f32>) -> Result<f32>;

    /// Polyak update: every parameter becomes `tau * source + (1 - tau) * self`.
    fn soft_sync_from(&mut self, source: &Self, tau: f32) -> Result<()>
    where
        Self: Sized;

    /// Euclidean distance between the parameter vectors of two estimators.
    fn parameter_distance(&self, other: &Self) -> Result<f32>
    where
        Self: Sized;
}

/// Index of the largest value; ties resolve to the lowest index.
pub fn argmax(values: ArrayView1<f32>) -> Result<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &value) in values.iter().enumerate() {
        if value.is_nan() {
            return Err(DqnError::Numerical(format!("NaN action value at index {}", idx)));
        }
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some((idx, value)),
        }
    }
    best.map(|(idx, _)| idx)
        .ok_or_else(|| DqnError::Numerical("No action values to choose from".to_string()))
}
