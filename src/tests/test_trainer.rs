use ndarray::array;

use super::support::{linear_estimator, small_config, CountingEnv, LinearEstimator};
use crate::checkpoint::CheckpointStore;
use crate::error::DqnError;
use crate::estimator::ValueEstimator;
use crate::replay_buffer::{Transition, TransitionBatch};
use crate::trainer::{double_dqn_targets, Trainer};

fn trainer(env: CountingEnv) -> Trainer<CountingEnv, LinearEstimator> {
    Trainer::new(&small_config(), env, linear_estimator()).unwrap()
}

#[test]
fn test_double_dqn_targets() {
    // online prefers action 1 on the next state, target prefers action 0
    let online = LinearEstimator::new(array![[1.0, 0.0], [2.0, 0.0]]);
    let target = LinearEstimator::new(array![[5.0, 0.0], [3.0, 0.0]]);
    let continuing = Transition {
        state: array![0.0, 1.0],
        action: 0,
        reward: 0.5,
        next_state: array![1.0, 0.0],
        done: false,
    };
    let terminal = Transition { done: true, reward: -1.0, ..continuing.clone() };

    let batch = TransitionBatch::from_transitions(&[&continuing, &terminal]).unwrap();
    let targets = double_dqn_targets(&online, &target, &batch, 0.9).unwrap();
    assert!((targets[0] - (0.5 + 0.9 * 3.0)).abs() < 1e-6);
    assert_eq!(targets[1], -1.0);
}

#[test]
fn test_double_dqn_targets_reject_nan() {
    let online = linear_estimator();
    let nan_target = LinearEstimator::new(array![[f32::NAN, 0.0], [f32::NAN, 0.0]]);
    let transition = Transition {
        state: array![1.0, 0.0],
        action: 1,
        reward: 0.0,
        next_state: array![1.0, 0.0],
        done: false,
    };
    let batch = TransitionBatch::from_transitions(&[&transition]).unwrap();
    assert!(matches!(
        double_dqn_targets(&online, &nan_target, &batch, 0.99),
        Err(DqnError::Numerical(_))
    ));

    // a terminal row never reads the bootstrap value
    let terminal = Transition { done: true, ..transition };
    let batch = TransitionBatch::from_transitions(&[&terminal]).unwrap();
    assert_eq!(double_dqn_targets(&online, &nan_target, &batch, 0.99).unwrap()[0], 0.0);
}

#[test]
fn test_no_decay_during_warm_up() {
    let mut config = small_config();
    config.training.max_episode_length = 5;
    let mut trainer = Trainer::new(&config, CountingEnv::endless(), linear_estimator()).unwrap();

    trainer.run_episode().unwrap();
    trainer.run_episode().unwrap();
    assert_eq!(trainer.total_steps(), 10);
    assert_eq!(trainer.schedule().epsilon(), 1.0);
    assert!(trainer.history().losses.is_empty());

    // steps 11..=15 each decay once; learning happens on step 12
    trainer.run_episode().unwrap();
    assert_eq!(trainer.total_steps(), 15);
    let expected = 1.0 - 5.0 * trainer.schedule().step_drop();
    assert!((trainer.schedule().epsilon() - expected).abs() < 1e-6);
    assert_eq!(trainer.history().losses.len(), 1);
}

#[test]
fn test_first_decay_on_step_after_warm_up() {
    // one-step episodes pin the boundary to a single environment step
    let env = CountingEnv { steps: 0, reward: 1.0, done_after: Some(1) };
    let mut trainer = trainer(env);
    for _ in 0..10 {
        trainer.run_episode().unwrap();
    }
    assert_eq!(trainer.total_steps(), 10);
    assert_eq!(trainer.schedule().epsilon(), 1.0);

    trainer.run_episode().unwrap();
    assert_eq!(trainer.total_steps(), 11);
    let expected = 1.0 - trainer.schedule().step_drop();
    assert!((trainer.schedule().epsilon() - expected).abs() < 1e-6);
}

#[test]
fn test_endless_episodes_are_capped() {
    let mut config = small_config();
    config.training.max_episode_length = 7;
    let mut trainer = Trainer::new(&config, CountingEnv::endless(), linear_estimator()).unwrap();

    for episode in 1..=3 {
        let summary = trainer.run_episode().unwrap();
        assert_eq!(summary.steps, 7);
        assert_eq!(trainer.buffer().len(), 7 * episode);
    }
    assert_eq!(trainer.history().episode_lengths, vec![7, 7, 7]);
    assert!(trainer.buffer().iter().all(|t| !t.done));
}

#[test]
fn test_episode_stops_on_done() {
    let env = CountingEnv { steps: 0, reward: 1.0, done_after: Some(2) };
    let mut trainer = trainer(env);
    let summary = trainer.run_episode().unwrap();
    assert_eq!(summary.steps, 2);
    let stored: Vec<bool> = trainer.buffer().iter().map(|t| t.done).collect();
    assert_eq!(stored, vec![false, true]);
}

#[test]
fn test_learn_requires_full_batch() {
    let mut trainer = trainer(CountingEnv::endless());
    assert!(matches!(
        trainer.learn(),
        Err(DqnError::InsufficientData { requested: 4, available: 0 })
    ));
}

#[test]
fn test_learn_soft_syncs_target_once() {
    let mut config = small_config();
    config.agent.pre_train_steps = 1000;
    config.training.max_episode_length = 5;
    let tau = config.agent.tau;
    let mut trainer = Trainer::new(&config, CountingEnv::endless(), linear_estimator()).unwrap();
    trainer.run_episode().unwrap();
    trainer.run_episode().unwrap();
    assert_eq!(trainer.target().parameter_distance(trainer.online()).unwrap(), 0.0);

    let before = trainer.online().clone();
    let loss = trainer.learn().unwrap();
    assert!(loss.is_some());

    let moved = trainer.online().parameter_distance(&before).unwrap();
    assert!(moved > 0.0);
    // target = tau * online + (1 - tau) * before
    let lag = trainer.target().parameter_distance(trainer.online()).unwrap();
    assert!((lag - (1.0 - tau) * moved).abs() < 1e-5);
    assert!(trainer.target().parameter_distance(&before).unwrap() > 0.0);
}

#[test]
fn test_non_finite_targets_skip_update() {
    let mut config = small_config();
    config.agent.pre_train_steps = 5;
    config.agent.update_freq = 1;
    config.training.max_episode_length = 2;
    config.training.num_episodes = 4;
    let env = CountingEnv { steps: 0, reward: f32::NAN, done_after: None };
    let mut trainer = Trainer::new(&config, env, linear_estimator()).unwrap();
    let initial = trainer.online().clone();

    for _ in 0..4 {
        trainer.run_episode().unwrap();
    }
    assert!(trainer.history().skipped_updates > 0);
    assert_eq!(trainer.online().parameter_distance(&initial).unwrap(), 0.0);
    assert_eq!(trainer.target().parameter_distance(&initial).unwrap(), 0.0);
}

#[test]
fn test_run_reports_every_episode() {
    let mut trainer = trainer(CountingEnv::endless());
    let report = trainer.run().unwrap();
    assert_eq!(report.episodes, 5);
    assert_eq!(report.total_steps, 15);
    assert_eq!(trainer.next_episode(), 5);
    assert!(report.final_epsilon < 1.0);
    assert!(report.smoothed_rewards.is_empty());
}

#[test]
fn test_rejects_mismatched_estimator() {
    let wide = LinearEstimator::new(array![[0.0, 0.0, 0.0], [0.0, 0.0, 0.0]]);
    assert!(matches!(
        Trainer::new(&small_config(), CountingEnv::endless(), wide),
        Err(DqnError::DimensionMismatch { .. })
    ));

    let mut config = small_config();
    config.agent.update_freq = 0;
    assert!(Trainer::new(&config, CountingEnv::endless(), linear_estimator()).is_err());
}

#[test]
fn test_resume_defers_learning_until_buffer_refills() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = small_config();
    config.checkpoint.path = dir.path().to_path_buf();
    let store = || CheckpointStore::new(&config.checkpoint).unwrap();

    let mut first = trainer(CountingEnv::endless()).with_checkpoints(store());
    first.run().unwrap();
    assert_eq!(first.total_steps(), 15);

    let mut resumed = Trainer::new(&config, CountingEnv::endless(), linear_estimator())
        .unwrap()
        .with_checkpoints(store());
    resumed.resume().unwrap();
    assert_eq!(resumed.total_steps(), 15);
    assert!(resumed.buffer().is_empty());

    // learning steps at 16 and 20 find fewer than 4 stored transitions
    resumed.run_episode().unwrap();
    resumed.run_episode().unwrap();
    assert!(resumed.history().losses.is_empty());
    assert_eq!(resumed.buffer().len(), 6);

    // step 24 has a full batch available
    resumed.run_episode().unwrap();
    assert_eq!(resumed.history().losses.len(), 1);
}
