use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dueling_dqn::checkpoint::CheckpointStore;
use dueling_dqn::config::Config;
use dueling_dqn::environment::{Environment, GridWorld};
use dueling_dqn::network::DuelingNetworkBuilder;
use dueling_dqn::trainer::Trainer;
use dueling_dqn::visualization::training_summary;

/// Train a Double Dueling DQN agent on the grid world.
#[derive(Parser)]
#[command(name = "train", about = "Train a Double Dueling DQN agent on the grid world")]
struct Cli {
    /// Path to TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Override number of training episodes
    #[arg(long)]
    episodes: Option<usize>,

    /// Resume from the latest checkpoint
    #[arg(long)]
    load: bool,

    /// Override checkpoint directory
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,

    /// Seed for the agent and the environment
    #[arg(long)]
    seed: Option<u64>,

    /// Print the default configuration as TOML and exit
    #[arg(long)]
    print_default_config: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::default_toml()?);
        return Ok(());
    }

    let mut config = Config::load_or_default(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    if let Some(episodes) = cli.episodes {
        config.training.num_episodes = episodes;
    }
    if cli.load {
        config.checkpoint.load_model = true;
    }
    if let Some(dir) = cli.checkpoint_dir {
        config.checkpoint.path = dir;
    }
    if let Some(seed) = cli.seed {
        config.training.seed = Some(seed);
        config.environment.seed = Some(seed.wrapping_add(1));
    }
    config.validate().context("invalid configuration")?;

    let env = GridWorld::new(config.environment.clone()).context("creating grid world")?;
    let mut rng = match config.training.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let network = DuelingNetworkBuilder::new(env.observation_size(), env.action_count())
        .hidden_sizes(&[config.agent.hidden_width, config.agent.feature_width])
        .learning_rate(config.agent.learning_rate)
        .build(&mut rng)
        .context("building network")?;
    info!(
        inputs = env.observation_size(),
        actions = env.action_count(),
        feature_width = config.agent.feature_width,
        "network ready"
    );

    let store = CheckpointStore::new(&config.checkpoint)
        .with_context(|| format!("opening checkpoint directory {}", config.checkpoint.path.display()))?;
    let mut trainer = Trainer::new(&config, env, network)?.with_checkpoints(store);
    if config.checkpoint.load_model {
        trainer.resume().context("loading model")?;
    }

    let report = trainer.run().context("training failed")?;
    println!("{}", training_summary(&report));
    Ok(())
}
