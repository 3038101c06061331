pub mod text_plots;

pub use text_plots::{plot_series, training_summary};
