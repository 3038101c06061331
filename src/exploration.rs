use rand::Rng;
use serde::{Deserialize, Serialize};

/// Linearly annealed epsilon-greedy exploration with a random-only warm-up.
///
/// During the first `pre_train_steps` environment steps every action is
/// random and the rate stays at `start`. After that, each call to
/// [`decay`](Self::decay) lowers the rate by `(start - end) / anneal_steps`
/// until it reaches `end`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExplorationSchedule {
    epsilon: f32,
    start: f32,
    end: f32,
    step_drop: f32,
    pre_train_steps: usize,
}

impl ExplorationSchedule {
    pub fn new(start: f32, end: f32, anneal_steps: usize, pre_train_steps: usize) -> Self {
        let step_drop = if anneal_steps == 0 {
            start - end
        } else {
            (start - end) / anneal_steps as f32
        };
        ExplorationSchedule {
            epsilon: start,
            start,
            end,
            step_drop,
            pre_train_steps,
        }
    }

    /// Current probability of taking a random action.
    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    pub fn start(&self) -> f32 {
        self.start
    }

    pub fn end(&self) -> f32 {
        self.end
    }

    pub fn step_drop(&self) -> f32 {
        self.step_drop
    }

    pub fn pre_train_steps(&self) -> usize {
        self.pre_train_steps
    }

    /// True once more than `pre_train_steps` steps have been taken.
    pub fn warmed_up(&self, total_steps: usize) -> bool {
        total_steps > self.pre_train_steps
    }

    /// Decide whether the next action should be random.
    ///
    /// `steps_taken` is the number of environment steps completed before the
    /// action being chosen.
    pub fn should_explore<R: Rng + ?Sized>(&self, steps_taken: usize, rng: &mut R) -> bool {
        rng.gen::<f32>() < self.epsilon || steps_taken < self.pre_train_steps
    }

    /// Lower the rate by one step, never going below `end`.
    pub fn decay(&mut self) {
        if self.epsilon > self.end {
            self.epsilon = (self.epsilon - self.step_drop).max(self.end);
        }
    }

    /// Restore a rate saved in a checkpoint, clamped into `[end, start]`.
    pub fn restore(&mut self, epsilon: f32) {
        self.epsilon = epsilon.clamp(self.end, self.start);
    }
}

/// Uniformly random action in `[0, action_count)`.
pub fn random_action<R: Rng + ?Sized>(action_count: usize, rng: &mut R) -> usize {
    rng.gen_range(0..action_count)
}
