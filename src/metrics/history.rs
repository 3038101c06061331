use serde::{Deserialize, Serialize};

use super::statistics::Statistics;

/// Block length used for the smoothed reward curve.
pub const SMOOTHING_WINDOW: usize = 100;

/// Per-episode records appended at every episode boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingHistory {
    /// Steps taken in each episode
    pub episode_lengths: Vec<usize>,

    /// Total reward collected in each episode
    pub episode_rewards: Vec<f32>,

    /// Loss of every completed learning update
    pub losses: Vec<f32>,

    /// Learning updates skipped because of non-finite values
    pub skipped_updates: usize,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_episode(&mut self, steps: usize, reward: f32) {
        self.episode_lengths.push(steps);
        self.episode_rewards.push(reward);
    }

    pub fn record_loss(&mut self, loss: f32) {
        self.losses.push(loss);
    }

    pub fn record_skipped_update(&mut self) {
        self.skipped_updates += 1;
    }

    pub fn episodes(&self) -> usize {
        self.episode_rewards.len()
    }

    /// Mean reward over the last `n` episodes (fewer if not available).
    pub fn recent_mean_reward(&self, n: usize) -> f32 {
        let start = self.episode_rewards.len().saturating_sub(n);
        Statistics::from_slice(&self.episode_rewards[start..]).mean
    }

    pub fn reward_statistics(&self) -> Statistics {
        Statistics::from_slice(&self.episode_rewards)
    }
}

/// Average consecutive blocks of `window` values. A trailing partial block
/// is dropped.
pub fn smoothed(values: &[f32], window: usize) -> Vec<f32> {
    if window == 0 {
        return Vec::new();
    }
    values
        .chunks_exact(window)
        .map(|block| block.iter().sum::<f32>() / window as f32)
        .collect()
}

/// Aggregate results of a training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub episodes: usize,
    pub total_steps: usize,
    pub final_epsilon: f32,
    pub mean_reward: f32,
    /// Sum of episode rewards divided by the number of episodes.
    pub success_percentage: f32,
    /// Rewards averaged over blocks of 100 episodes.
    pub smoothed_rewards: Vec<f32>,
    pub mean_loss: Option<f32>,
    pub skipped_updates: usize,
}

impl TrainingReport {
    pub fn from_history(history: &TrainingHistory, total_steps: usize, final_epsilon: f32) -> Self {
        let episodes = history.episodes();
        let rewards = history.reward_statistics();
        let total_reward: f32 = history.episode_rewards.iter().sum();
        let success_percentage = if episodes == 0 { 0.0 } else { total_reward / episodes as f32 };
        let mean_loss = if history.losses.is_empty() {
            None
        } else {
            Some(Statistics::from_slice(&history.losses).mean)
        };

        TrainingReport {
            episodes,
            total_steps,
            final_epsilon,
            mean_reward: rewards.mean,
            success_percentage,
            smoothed_rewards: smoothed(&history.episode_rewards, SMOOTHING_WINDOW),
            mean_loss,
            skipped_updates: history.skipped_updates,
        }
    }
}
