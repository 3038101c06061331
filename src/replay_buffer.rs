use ndarray::{Array1, Array2};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::error::{DqnError, Result};

/// Number of transitions kept when no capacity is configured.
pub const DEFAULT_CAPACITY: usize = 50_000;

/// One environment step: `state --action--> next_state` with its reward.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub state: Array1<f32>,
    pub action: usize,
    pub reward: f32,
    pub next_state: Array1<f32>,
    pub done: bool,
}

/// Transitions collected during a single episode.
///
/// Nothing reaches the [`ReplayBuffer`] until the episode is over; the whole
/// episode is then handed over in one [`ReplayBuffer::add`] call.
#[derive(Clone, Debug, Default)]
pub struct EpisodeBuffer {
    transitions: Vec<Transition>,
}

impl EpisodeBuffer {
    pub fn new() -> Self {
        EpisodeBuffer { transitions: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        EpisodeBuffer { transitions: Vec::with_capacity(capacity) }
    }

    pub fn push(&mut self, transition: Transition) {
        self.transitions.push(transition);
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn into_transitions(self) -> Vec<Transition> {
        self.transitions
    }
}

/// Fixed-capacity FIFO store of transitions with uniform sampling.
#[derive(Clone, Debug)]
pub struct ReplayBuffer {
    buffer: VecDeque<Transition>,
    capacity: usize,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        ReplayBuffer {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `items` in order, then evict from the front until the buffer
    /// is back within capacity. The retained items are always the most
    /// recent `capacity` ones.
    pub fn add<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = Transition>,
    {
        self.buffer.extend(items);
        let excess = self.buffer.len().saturating_sub(self.capacity);
        if excess > 0 {
            self.buffer.drain(..excess);
        }
    }

    /// Flush a finished episode into the buffer.
    pub fn add_episode(&mut self, episode: EpisodeBuffer) {
        self.add(episode.into_transitions());
    }

    /// Draw `n` transitions uniformly at random, with replacement, using the
    /// thread-local generator.
    pub fn sample(&self, n: usize) -> Result<Vec<&Transition>> {
        let mut rng = rand::thread_rng();
        self.sample_with(n, &mut rng)
    }

    /// Draw `n` transitions uniformly at random, with replacement.
    ///
    /// Sampling never mutates the stored transitions, so repeated calls are
    /// independent. Fails only when the buffer is empty and `n > 0`.
    pub fn sample_with<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Vec<&Transition>> {
        if n > 0 && self.buffer.is_empty() {
            return Err(DqnError::InsufficientData {
                requested: n,
                available: 0,
            });
        }
        let len = self.buffer.len();
        Ok((0..n).map(|_| &self.buffer[rng.gen_range(0..len)]).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.buffer.iter()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for ReplayBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Column-wise view of a sampled mini-batch, ready for the estimator.
#[derive(Clone, Debug)]
pub struct TransitionBatch {
    pub states: Array2<f32>,
    pub actions: Vec<usize>,
    pub rewards: Array1<f32>,
    pub next_states: Array2<f32>,
    pub dones: Vec<bool>,
}

impl TransitionBatch {
    /// Stack sampled transitions row by row.
    pub fn from_transitions(transitions: &[&Transition]) -> Result<Self> {
        let first = transitions
            .first()
            .ok_or_else(|| DqnError::InsufficientData { requested: 1, available: 0 })?;
        let state_size = first.state.len();
        let batch_size = transitions.len();

        let mut states = Array2::zeros((batch_size, state_size));
        let mut next_states = Array2::zeros((batch_size, state_size));
        let mut actions = Vec::with_capacity(batch_size);
        let mut rewards = Array1::zeros(batch_size);
        let mut dones = Vec::with_capacity(batch_size);

        for (i, t) in transitions.iter().enumerate() {
            if t.state.len() != state_size || t.next_state.len() != state_size {
                return Err(DqnError::dimension_mismatch(
                    format!("state of length {}", state_size),
                    format!("lengths {} / {}", t.state.len(), t.next_state.len()),
                ));
            }
            states.row_mut(i).assign(&t.state);
            next_states.row_mut(i).assign(&t.next_state);
            actions.push(t.action);
            rewards[i] = t.reward;
            dones.push(t.done);
        }

        Ok(TransitionBatch {
            states,
            actions,
            rewards,
            next_states,
            dones,
        })
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
