use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::checkpoint::CheckpointConfig;
use crate::environment::GridWorldConfig;
use crate::error::{DqnError, Result};
use crate::trainer::{AgentConfig, TrainerConfig};

/// Complete run configuration, one TOML table per section.
///
/// ```toml
/// [agent]
/// batch_size = 32
/// gamma = 0.99
///
/// [training]
/// num_episodes = 10000
///
/// [checkpoint]
/// path = "./dqn"
/// load_model = false
/// ```
///
/// Missing keys and missing sections fall back to their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub agent: AgentConfig,
    pub training: TrainerConfig,
    pub environment: GridWorldConfig,
    pub checkpoint: CheckpointConfig,
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            warn!(path = %path.display(), "config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Defaults rendered as TOML.
    pub fn default_toml() -> Result<String> {
        toml::to_string_pretty(&Config::default()).map_err(|e| DqnError::Serialization(e.to_string()))
    }

    /// Reject values that would break the training loop.
    pub fn validate(&self) -> Result<()> {
        let agent = &self.agent;
        let training = &self.training;

        positive("agent.batch_size", agent.batch_size)?;
        positive("agent.update_freq", agent.update_freq)?;
        positive("agent.anneal_steps", agent.anneal_steps)?;
        positive("agent.replay_capacity", agent.replay_capacity)?;
        positive("agent.hidden_width", agent.hidden_width)?;
        positive("training.num_episodes", training.num_episodes)?;
        positive("training.max_episode_length", training.max_episode_length)?;
        positive("checkpoint.save_every", self.checkpoint.save_every)?;

        if agent.replay_capacity < agent.batch_size {
            return Err(DqnError::invalid_config(
                "agent.replay_capacity".to_string(),
                format!("{} is smaller than batch_size {}", agent.replay_capacity, agent.batch_size),
            ));
        }
        // an episode reaches the buffer only when it ends, so up to
        // max_episode_length - 1 warm-up steps may still be unflushed
        let warm_up_needed = agent.batch_size + training.max_episode_length - 1;
        if agent.pre_train_steps < warm_up_needed {
            return Err(DqnError::invalid_config(
                "agent.pre_train_steps".to_string(),
                format!(
                    "{} steps cannot fill a batch of {} before learning starts (need at least {} with episodes of up to {} steps)",
                    agent.pre_train_steps, agent.batch_size, warm_up_needed, training.max_episode_length
                ),
            ));
        }
        unit_interval("agent.gamma", agent.gamma)?;
        unit_interval("agent.start_e", agent.start_e)?;
        unit_interval("agent.end_e", agent.end_e)?;
        if agent.end_e > agent.start_e {
            return Err(DqnError::invalid_config(
                "agent.end_e".to_string(),
                format!("{} exceeds start_e {}", agent.end_e, agent.start_e),
            ));
        }
        if !(agent.tau > 0.0 && agent.tau <= 1.0) {
            return Err(DqnError::invalid_config(
                "agent.tau".to_string(),
                format!("must be in (0, 1], got {}", agent.tau),
            ));
        }
        if !(agent.learning_rate > 0.0) || !agent.learning_rate.is_finite() {
            return Err(DqnError::invalid_config(
                "agent.learning_rate".to_string(),
                format!("must be > 0, got {}", agent.learning_rate),
            ));
        }
        if agent.feature_width == 0 || agent.feature_width % 2 != 0 {
            return Err(DqnError::invalid_config(
                "agent.feature_width".to_string(),
                format!("must be a positive even number, got {}", agent.feature_width),
            ));
        }

        self.environment.validate()
    }
}

fn positive(name: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(DqnError::invalid_config(name, "must be > 0"));
    }
    Ok(())
}

fn unit_interval(name: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(DqnError::invalid_config(
            name.to_string(),
            format!("must be in [0, 1], got {}", value),
        ));
    }
    Ok(())
}
