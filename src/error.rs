use std::path::PathBuf;

/// Result type for training operations
pub type Result<T> = std::result::Result<T, DqnError>;

/// Main error type for the crate
#[derive(Debug, thiserror::Error)]
pub enum DqnError {
    /// Configuration value rejected at startup
    #[error("Invalid configuration '{name}': {reason}")]
    InvalidConfig {
        name: String,
        reason: String,
    },

    /// Configuration file could not be parsed
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Not enough stored transitions to draw a batch
    #[error("Insufficient data: requested {requested} transitions, buffer holds {available}")]
    InsufficientData {
        requested: usize,
        available: usize,
    },

    /// Invalid dimensions for operations
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: String,
        actual: String,
    },

    /// Action index outside of the action space
    #[error("Invalid action {action}: must be less than {action_count}")]
    InvalidAction {
        action: usize,
        action_count: usize,
    },

    /// NaN or infinite values produced by the estimator or target computation
    #[error("Numerical error: {0}")]
    Numerical(String),

    /// Missing or unreadable checkpoint
    #[error("Checkpoint error at {}: {reason}", path.display())]
    Checkpoint {
        path: PathBuf,
        reason: String,
    },

    /// IO errors (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<bincode::Error> for DqnError {
    fn from(err: bincode::Error) -> Self {
        DqnError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for DqnError {
    fn from(err: serde_json::Error) -> Self {
        DqnError::Serialization(err.to_string())
    }
}

// Helper functions for common error patterns
impl DqnError {
    pub fn dimension_mismatch<S: Into<String>>(expected: S, actual: S) -> Self {
        DqnError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn invalid_config<S: Into<String>>(name: S, reason: S) -> Self {
        DqnError::InvalidConfig {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn checkpoint<P: Into<PathBuf>, S: Into<String>>(path: P, reason: S) -> Self {
        DqnError::Checkpoint {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
