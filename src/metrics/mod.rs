pub mod history;
pub mod statistics;

pub use history::{smoothed, TrainingHistory, TrainingReport};
pub use statistics::Statistics;
