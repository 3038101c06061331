//! # Dueling DQN - Double Dueling Deep Q-Learning on a grid world
//!
//! An off-policy agent that learns to navigate a small grid world from
//! rendered RGB observations. The crate provides the experience replay
//! buffer, the epsilon-greedy exploration schedule, a dueling Q-network
//! implemented on `ndarray`, and the training loop that ties them together
//! with Double-DQN targets and soft target-network updates.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dueling_dqn::config::Config;
//! use dueling_dqn::environment::{Environment, GridWorld};
//! use dueling_dqn::network::DuelingNetworkBuilder;
//! use dueling_dqn::trainer::Trainer;
//! use rand::SeedableRng;
//!
//! let config = Config::default();
//! let env = GridWorld::new(config.environment.clone()).unwrap();
//! let mut rng = rand::rngs::StdRng::seed_from_u64(0);
//! let network = DuelingNetworkBuilder::new(env.observation_size(), env.action_count())
//!     .hidden_sizes(&[config.agent.hidden_width, config.agent.feature_width])
//!     .learning_rate(config.agent.learning_rate)
//!     .build(&mut rng)
//!     .unwrap();
//!
//! let mut trainer = Trainer::new(&config, env, network).unwrap();
//! let report = trainer.run().unwrap();
//! println!("{}", report.success_percentage);
//! ```
//!
//! ## Module Organization
//!
//! - [`replay_buffer`] - Transitions, per-episode buffers and the FIFO replay memory
//! - [`exploration`] - Annealed epsilon-greedy schedule
//! - [`estimator`] - The `ValueEstimator` capability used by the training loop
//! - [`network`] - Dueling Q-network (dense trunk, value and advantage heads)
//! - [`trainer`] - Episode loop, Double-DQN targets and soft target sync
//! - [`environment`] - Environment trait and the grid world
//! - [`checkpoint`] - Snapshot persistence
//! - [`config`] - TOML configuration and validation
//! - [`metrics`] - Training history and the final report
//! - [`visualization`] - Text plots of the reward curve

pub mod activations;
pub mod checkpoint;
pub mod config;
pub mod environment;
pub mod error;
pub mod estimator;
pub mod exploration;
pub mod layers;
pub mod metrics;
pub mod network;
pub mod optimizer;
pub mod replay_buffer;
pub mod trainer;
pub mod visualization;

#[cfg(test)]
mod tests;
