use ndarray::array;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::DqnError;
use crate::replay_buffer::{EpisodeBuffer, ReplayBuffer, Transition, TransitionBatch};

fn tagged(tag: usize) -> Transition {
    Transition {
        state: array![tag as f32, 0.0],
        action: tag % 4,
        reward: tag as f32,
        next_state: array![tag as f32 + 1.0, 0.0],
        done: false,
    }
}

fn tags(buffer: &ReplayBuffer) -> Vec<usize> {
    buffer.iter().map(|t| t.reward as usize).collect()
}

#[test]
fn test_three_episodes_into_capacity_five() {
    let mut buffer = ReplayBuffer::new(5);
    for episode in 0..3 {
        let mut transitions = EpisodeBuffer::new();
        transitions.push(tagged(episode * 2));
        transitions.push(tagged(episode * 2 + 1));
        buffer.add_episode(transitions);
    }

    assert_eq!(buffer.len(), 5);
    assert!(!tags(&buffer).contains(&0));
    assert_eq!(tags(&buffer), vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_eviction_keeps_most_recent() {
    let mut buffer = ReplayBuffer::new(4);
    let mut next = 0;
    for chunk in [1, 3, 2, 5, 1] {
        buffer.add((next..next + chunk).map(tagged));
        next += chunk;
        assert!(buffer.len() <= buffer.capacity());
        let expected: Vec<usize> = (next.saturating_sub(4)..next).collect();
        assert_eq!(tags(&buffer), expected);
    }
}

#[test]
fn test_add_larger_than_capacity() {
    let mut buffer = ReplayBuffer::new(3);
    buffer.add((0..7).map(tagged));
    assert_eq!(tags(&buffer), vec![4, 5, 6]);
}

#[test]
fn test_default_capacity() {
    assert_eq!(ReplayBuffer::default().capacity(), 50_000);
}

#[test]
fn test_sample_returns_members() {
    let mut buffer = ReplayBuffer::new(10);
    buffer.add((0..3).map(tagged));
    let mut rng = StdRng::seed_from_u64(1);

    // with replacement: more samples than stored items is fine
    let sample = buffer.sample_with(8, &mut rng).unwrap();
    assert_eq!(sample.len(), 8);
    for transition in sample {
        assert!(buffer.iter().any(|stored| stored == transition));
    }
    assert_eq!(tags(&buffer), vec![0, 1, 2]);
}

#[test]
fn test_sample_is_roughly_uniform() {
    let mut buffer = ReplayBuffer::new(4);
    buffer.add((0..4).map(tagged));
    let mut rng = StdRng::seed_from_u64(42);

    let draws = 40_000;
    let mut counts = [0usize; 4];
    for transition in buffer.sample_with(draws, &mut rng).unwrap() {
        counts[transition.reward as usize] += 1;
    }
    for count in counts {
        let frequency = count as f32 / draws as f32;
        assert!((frequency - 0.25).abs() < 0.02, "frequency {} too far from uniform", frequency);
    }
}

#[test]
fn test_sample_empty_buffer() {
    let buffer = ReplayBuffer::new(4);
    assert!(matches!(
        buffer.sample(2),
        Err(DqnError::InsufficientData { requested: 2, available: 0 })
    ));
    assert!(buffer.sample(0).unwrap().is_empty());
}

#[test]
fn test_transition_batch_stacks_rows() {
    let first = tagged(1);
    let mut second = tagged(2);
    second.done = true;

    let batch = TransitionBatch::from_transitions(&[&first, &second]).unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch.states, array![[1.0, 0.0], [2.0, 0.0]]);
    assert_eq!(batch.next_states, array![[2.0, 0.0], [3.0, 0.0]]);
    assert_eq!(batch.actions, vec![1, 2]);
    assert_eq!(batch.rewards, array![1.0, 2.0]);
    assert_eq!(batch.dones, vec![false, true]);
}

#[test]
fn test_transition_batch_rejects_ragged_states() {
    let first = tagged(1);
    let mut odd = tagged(2);
    odd.state = array![1.0, 2.0, 3.0];
    assert!(matches!(
        TransitionBatch::from_transitions(&[&first, &odd]),
        Err(DqnError::DimensionMismatch { .. })
    ));
    assert!(TransitionBatch::from_transitions(&[]).is_err());
}
