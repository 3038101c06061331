//! Replay sampling and a full LEARN step on the default 84x84x3 observations.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dueling_dqn::config::Config;
use dueling_dqn::environment::{Environment, GridWorld, GridWorldConfig};
use dueling_dqn::network::DuelingNetworkBuilder;
use dueling_dqn::replay_buffer::{ReplayBuffer, Transition, TransitionBatch};
use dueling_dqn::trainer::Trainer;
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn bench_replay_sampling(c: &mut Criterion) {
    let mut buffer = ReplayBuffer::default();
    let state = Array1::<f32>::zeros(21168);
    buffer.add((0..2_000).map(|i| Transition {
        state: state.clone(),
        action: i % 4,
        reward: 0.0,
        next_state: state.clone(),
        done: false,
    }));
    let mut rng = StdRng::seed_from_u64(0);

    c.bench_function("replay_sample_32", |b| {
        b.iter(|| {
            let sample = buffer.sample_with(black_box(32), &mut rng).unwrap();
            black_box(TransitionBatch::from_transitions(&sample).unwrap())
        })
    });
}

fn bench_learn_step(c: &mut Criterion) {
    let mut config = Config::default();
    config.agent.pre_train_steps = 100;
    config.training.seed = Some(0);
    config.environment = GridWorldConfig { seed: Some(1), ..GridWorldConfig::default() };

    let env = GridWorld::new(config.environment.clone()).unwrap();
    let mut rng = StdRng::seed_from_u64(2);
    let network = DuelingNetworkBuilder::new(env.observation_size(), env.action_count())
        .hidden_sizes(&[config.agent.hidden_width, config.agent.feature_width])
        .learning_rate(config.agent.learning_rate)
        .build(&mut rng)
        .unwrap();
    let mut trainer = Trainer::new(&config, env, network).unwrap();
    trainer.run_episode().unwrap();

    c.bench_function("learn_step_batch_32", |b| {
        b.iter(|| black_box(trainer.learn().unwrap()))
    });
}

criterion_group!(benches, bench_replay_sampling, bench_learn_step);
criterion_main!(benches);
