// Test modules for all components
mod support;

pub mod test_replay_buffer;
pub mod test_trainer;
