//! Small deterministic environments and a linear estimator for exercising
//! the training loop without the cost of the dueling network.

use ndarray::{array, Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::environment::{Environment, Step};
use crate::error::{DqnError, Result};
use crate::estimator::ValueEstimator;

/// `Q(s, a) = weights[a] . s`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LinearEstimator {
    pub weights: Array2<f32>,
    pub learning_rate: f32,
}

impl LinearEstimator {
    pub fn new(weights: Array2<f32>) -> Self {
        LinearEstimator { weights, learning_rate: 0.05 }
    }
}

impl ValueEstimator for LinearEstimator {
    fn input_size(&self) -> usize {
        self.weights.ncols()
    }

    fn action_count(&self) -> usize {
        self.weights.nrows()
    }

    fn predict_values(&self, state: ArrayView1<f32>) -> Result<Array1<f32>> {
        if state.len() != self.input_size() {
            return Err(DqnError::dimension_mismatch(self.input_size().to_string(), state.len().to_string()));
        }
        Ok(self.weights.dot(&state))
    }

    fn predict_values_batch(&self, states: ArrayView2<f32>) -> Result<Array2<f32>> {
        Ok(states.dot(&self.weights.t()))
    }

    fn update(&mut self, states: ArrayView2<f32>, actions: &[usize], targets: ArrayView1<f32>) -> Result<f32> {
        if targets.iter().any(|t| !t.is_finite()) {
            return Err(DqnError::Numerical("non-finite target".to_string()));
        }
        let q = self.predict_values_batch(states)?;
        let batch = actions.len() as f32;
        let mut gradients = Array2::<f32>::zeros(self.weights.dim());
        let mut loss = 0.0;
        for (i, &action) in actions.iter().enumerate() {
            let diff = q[[i, action]] - targets[i];
            loss += diff * diff / batch;
            let mut row = gradients.row_mut(action);
            row.scaled_add(2.0 * diff / batch, &states.row(i));
        }
        self.weights.scaled_add(-self.learning_rate, &gradients);
        Ok(loss)
    }

    fn soft_sync_from(&mut self, source: &Self, tau: f32) -> Result<()> {
        self.weights.zip_mut_with(&source.weights, |t, &s| *t = tau * s + (1.0 - tau) * *t);
        Ok(())
    }

    fn parameter_distance(&self, other: &Self) -> Result<f32> {
        Ok((&self.weights - &other.weights).mapv(|d| d * d).sum().sqrt())
    }
}

/// Two-action environment with a two-element state that counts steps.
/// Every step pays `reward`; the episode ends after `done_after` steps if set.
pub struct CountingEnv {
    pub steps: usize,
    pub reward: f32,
    pub done_after: Option<usize>,
}

impl CountingEnv {
    pub fn endless() -> Self {
        CountingEnv { steps: 0, reward: 1.0, done_after: None }
    }

    fn state(&self) -> Array1<f32> {
        Array1::from(vec![1.0, self.steps as f32 / 100.0])
    }
}

impl Environment for CountingEnv {
    fn reset(&mut self) -> Array1<f32> {
        self.steps = 0;
        self.state()
    }

    fn step(&mut self, action: usize) -> Result<Step> {
        if action >= 2 {
            return Err(DqnError::InvalidAction { action, action_count: 2 });
        }
        self.steps += 1;
        Ok(Step {
            next_state: self.state(),
            reward: self.reward,
            done: self.done_after.map_or(false, |limit| self.steps >= limit),
        })
    }

    fn action_count(&self) -> usize {
        2
    }

    fn observation_size(&self) -> usize {
        2
    }
}

pub fn linear_estimator() -> LinearEstimator {
    LinearEstimator::new(array![[0.1, 0.0], [0.0, 0.1]])
}

/// Tiny run: warm-up of 10 steps, learning every 4, batches of 4.
pub fn small_config() -> Config {
    let mut config = Config::default();
    config.agent.batch_size = 4;
    config.agent.update_freq = 4;
    config.agent.pre_train_steps = 10;
    config.agent.anneal_steps = 10;
    config.agent.replay_capacity = 100;
    config.agent.hidden_width = 8;
    config.agent.feature_width = 4;
    config.agent.tau = 0.1;
    config.agent.learning_rate = 0.01;
    config.training.num_episodes = 5;
    config.training.max_episode_length = 3;
    config.training.seed = Some(3);
    config.environment.size = 3;
    config.environment.render_scale = 1;
    config.environment.goals = 1;
    config.environment.hazards = 1;
    config
}
