//! # Off-policy training loop
//!
//! [`Trainer`] owns every piece of mutable training state: the online and
//! target estimators, the replay buffer, the exploration schedule, the step
//! counters and the history. One call to [`Trainer::run`] plays
//! `num_episodes` episodes:
//!
//! 1. reset the environment and open an [`EpisodeBuffer`];
//! 2. step with epsilon-greedy actions until `done` or `max_episode_length`;
//! 3. after the warm-up, decay epsilon every step and learn every
//!    `update_freq` steps once the buffer holds a full batch (Double-DQN
//!    targets, one gradient step on the online estimator, then a soft sync
//!    into the target estimator);
//! 4. flush the episode into the replay buffer, record its length and reward
//!    and periodically persist a snapshot.

use ndarray::{Array1, ArrayView1};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::checkpoint::{CheckpointStore, TrainingSnapshot};
use crate::config::Config;
use crate::environment::Environment;
use crate::error::{DqnError, Result};
use crate::estimator::ValueEstimator;
use crate::exploration::{random_action, ExplorationSchedule};
use crate::metrics::{TrainingHistory, TrainingReport};
use crate::replay_buffer::{EpisodeBuffer, ReplayBuffer, Transition, TransitionBatch};

/// Learning hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub batch_size: usize,
    /// Learn every this many environment steps.
    pub update_freq: usize,
    pub gamma: f32,
    pub start_e: f32,
    pub end_e: f32,
    /// Steps needed to anneal from `start_e` to `end_e`.
    pub anneal_steps: usize,
    /// Random-only steps before any learning or decay.
    pub pre_train_steps: usize,
    pub hidden_width: usize,
    /// Width of the last trunk layer, split into advantage and value streams.
    pub feature_width: usize,
    pub tau: f32,
    pub learning_rate: f32,
    pub replay_capacity: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            batch_size: 32,
            update_freq: 4,
            gamma: 0.99,
            start_e: 1.0,
            end_e: 0.1,
            anneal_steps: 10_000,
            pre_train_steps: 10_000,
            hidden_width: 256,
            feature_width: 512,
            tau: 0.001,
            learning_rate: 0.0001,
            replay_capacity: 50_000,
        }
    }
}

/// Episode-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub num_episodes: usize,
    pub max_episode_length: usize,
    /// Log progress every this many episodes.
    pub report_every: usize,
    pub seed: Option<u64>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            num_episodes: 10_000,
            max_episode_length: 50,
            report_every: 10,
            seed: None,
        }
    }
}

/// Length and reward of one finished episode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeSummary {
    pub steps: usize,
    pub reward: f32,
}

/// Double-DQN bootstrap targets.
///
/// The online estimator picks `a* = argmax_a Q_online(s', a)`, the target
/// estimator evaluates it, and terminal transitions keep only their reward:
/// `y = r + gamma * Q_target(s', a*) * (1 - done)`.
pub fn double_dqn_targets<Q: ValueEstimator>(
    online: &Q,
    target: &Q,
    batch: &TransitionBatch,
    gamma: f32,
) -> Result<Array1<f32>> {
    let next_actions = online.predict_actions_batch(batch.next_states.view())?;
    let next_values = target.predict_values_batch(batch.next_states.view())?;

    let mut targets = Array1::zeros(batch.len());
    for (i, &action) in next_actions.iter().enumerate() {
        let bootstrap = next_values[[i, action]];
        // terminal rows drop the bootstrap entirely so a non-finite estimate cannot leak in
        let value = if batch.dones[i] {
            batch.rewards[i]
        } else {
            batch.rewards[i] + gamma * bootstrap
        };
        if !value.is_finite() {
            return Err(DqnError::Numerical(format!(
                "target {} is {} (reward {}, bootstrap {})",
                i, value, batch.rewards[i], bootstrap
            )));
        }
        targets[i] = value;
    }
    Ok(targets)
}

/// Training context: estimators, replay memory, exploration state and
/// counters for one run.
pub struct Trainer<E, Q> {
    agent: AgentConfig,
    settings: TrainerConfig,
    save_every: usize,
    env: E,
    online: Q,
    target: Q,
    buffer: ReplayBuffer,
    schedule: ExplorationSchedule,
    rng: StdRng,
    total_steps: usize,
    next_episode: usize,
    history: TrainingHistory,
    checkpoints: Option<CheckpointStore>,
}

impl<E, Q> Trainer<E, Q>
where
    E: Environment,
    Q: ValueEstimator + Clone,
{
    /// Build a trainer; the target estimator starts as a copy of `online`.
    pub fn new(config: &Config, env: E, online: Q) -> Result<Self> {
        config.validate()?;
        if env.observation_size() != online.input_size() {
            return Err(DqnError::dimension_mismatch(
                format!("estimator input of {}", env.observation_size()),
                format!("estimator input of {}", online.input_size()),
            ));
        }
        if env.action_count() != online.action_count() {
            return Err(DqnError::dimension_mismatch(
                format!("{} actions", env.action_count()),
                format!("{} actions", online.action_count()),
            ));
        }

        let agent = config.agent.clone();
        let rng = match config.training.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let schedule = ExplorationSchedule::new(agent.start_e, agent.end_e, agent.anneal_steps, agent.pre_train_steps);

        Ok(Trainer {
            buffer: ReplayBuffer::new(agent.replay_capacity),
            schedule,
            settings: config.training.clone(),
            save_every: config.checkpoint.save_every,
            target: online.clone(),
            online,
            env,
            agent,
            rng,
            total_steps: 0,
            next_episode: 0,
            history: TrainingHistory::new(),
            checkpoints: None,
        })
    }

    /// Persist snapshots into `store` while training.
    pub fn with_checkpoints(mut self, store: CheckpointStore) -> Self {
        self.checkpoints = Some(store);
        self
    }

    pub fn online(&self) -> &Q {
        &self.online
    }

    pub fn target(&self) -> &Q {
        &self.target
    }

    pub fn buffer(&self) -> &ReplayBuffer {
        &self.buffer
    }

    pub fn schedule(&self) -> &ExplorationSchedule {
        &self.schedule
    }

    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// Index of the next episode to be played.
    pub fn next_episode(&self) -> usize {
        self.next_episode
    }

    pub fn environment(&self) -> &E {
        &self.env
    }

    /// Epsilon-greedy action for `state`.
    pub fn select_action(&mut self, state: ArrayView1<f32>) -> Result<usize> {
        if self.schedule.should_explore(self.total_steps, &mut self.rng) {
            Ok(random_action(self.env.action_count(), &mut self.rng))
        } else {
            self.online.predict_action(state)
        }
    }

    /// One LEARN step. Returns `Ok(None)` when the batch produced non-finite
    /// values and the step was abandoned without touching any parameters.
    pub fn learn(&mut self) -> Result<Option<f32>> {
        let batch_size = self.agent.batch_size;
        if self.buffer.len() < batch_size {
            return Err(DqnError::InsufficientData {
                requested: batch_size,
                available: self.buffer.len(),
            });
        }
        let sampled = self.buffer.sample_with(batch_size, &mut self.rng)?;
        let batch = TransitionBatch::from_transitions(&sampled)?;

        let outcome = double_dqn_targets(&self.online, &self.target, &batch, self.agent.gamma)
            .and_then(|targets| self.online.update(batch.states.view(), &batch.actions, targets.view()));
        let loss = match outcome {
            Ok(loss) => loss,
            Err(DqnError::Numerical(reason)) => {
                warn!(step = self.total_steps, %reason, "skipping learning step");
                self.history.record_skipped_update();
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        self.target.soft_sync_from(&self.online, self.agent.tau)?;
        self.history.record_loss(loss);
        debug!(step = self.total_steps, loss, "learning step");
        Ok(Some(loss))
    }

    /// Play one episode and flush it into the replay buffer.
    pub fn run_episode(&mut self) -> Result<EpisodeSummary> {
        let mut state = self.env.reset();
        let mut episode = EpisodeBuffer::with_capacity(self.settings.max_episode_length);
        let mut reward_sum = 0.0;
        let mut steps = 0;

        while steps < self.settings.max_episode_length {
            steps += 1;
            let action = self.select_action(state.view())?;
            let step = self.env.step(action)?;
            self.total_steps += 1;
            episode.push(Transition {
                state: state.clone(),
                action,
                reward: step.reward,
                next_state: step.next_state.clone(),
                done: step.done,
            });

            if self.schedule.warmed_up(self.total_steps) {
                self.schedule.decay();
                if self.total_steps % self.agent.update_freq == 0 {
                    // after a resume the buffer starts empty while the counters are past warm-up
                    if self.buffer.len() >= self.agent.batch_size {
                        self.learn()?;
                    } else {
                        debug!(
                            step = self.total_steps,
                            stored = self.buffer.len(),
                            "replay buffer refilling, learning deferred"
                        );
                    }
                }
            }

            reward_sum += step.reward;
            state = step.next_state;
            if step.done {
                break;
            }
        }

        self.buffer.add_episode(episode);
        self.history.record_episode(steps, reward_sum);
        Ok(EpisodeSummary { steps, reward: reward_sum })
    }

    /// Train for the configured number of episodes and return the report.
    pub fn run(&mut self) -> Result<TrainingReport>
    where
        Q: Serialize,
    {
        let num_episodes = self.settings.num_episodes;
        info!(
            start = self.next_episode,
            episodes = num_episodes,
            pre_train_steps = self.agent.pre_train_steps,
            "starting training"
        );

        while self.next_episode < num_episodes {
            let episode = self.next_episode;
            self.run_episode()?;
            self.next_episode += 1;

            if episode % self.save_every == 0 {
                self.save_checkpoint(episode);
            }
            let report_every = self.settings.report_every;
            if report_every > 0 && self.history.episodes() % report_every == 0 {
                info!(
                    episode,
                    total_steps = self.total_steps,
                    mean_reward = self.history.recent_mean_reward(report_every),
                    epsilon = self.schedule.epsilon(),
                    "progress"
                );
            }
        }
        if let Some(last) = self.next_episode.checked_sub(1) {
            self.save_checkpoint(last);
        }

        Ok(self.report())
    }

    pub fn report(&self) -> TrainingReport {
        TrainingReport::from_history(&self.history, self.total_steps, self.schedule.epsilon())
    }

    pub fn snapshot(&self, episode: usize) -> TrainingSnapshot<Q> {
        TrainingSnapshot {
            episode,
            total_steps: self.total_steps,
            epsilon: self.schedule.epsilon(),
            online: self.online.clone(),
            target: self.target.clone(),
        }
    }

    /// Save failures are logged and training continues.
    fn save_checkpoint(&self, episode: usize)
    where
        Q: Serialize,
    {
        let Some(store) = &self.checkpoints else {
            return;
        };
        if let Err(e) = store.save(&self.snapshot(episode)) {
            warn!(episode, error = %e, "failed to save checkpoint");
        }
    }

    /// Restore estimators, exploration rate and counters from the latest
    /// snapshot. Any failure is returned to the caller.
    pub fn resume(&mut self) -> Result<()>
    where
        Q: DeserializeOwned,
    {
        let store = self.checkpoints.as_ref().ok_or_else(|| {
            DqnError::invalid_config("checkpoint.path", "no checkpoint store configured")
        })?;
        let snapshot: TrainingSnapshot<Q> = store.load_latest()?;
        if snapshot.online.input_size() != self.online.input_size()
            || snapshot.online.action_count() != self.online.action_count()
        {
            return Err(DqnError::checkpoint(
                store.dir(),
                "snapshot does not match the environment dimensions",
            ));
        }
        self.online = snapshot.online;
        self.target = snapshot.target;
        self.schedule.restore(snapshot.epsilon);
        self.total_steps = snapshot.total_steps;
        self.next_episode = snapshot.episode + 1;
        info!(episode = snapshot.episode, total_steps = self.total_steps, "resumed training");
        Ok(())
    }
}
