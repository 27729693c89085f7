//! Error types for parlo-core.

use thiserror::Error;

/// Error type for parlo-core operations.
///
/// Queue-full conditions are transient: retrying later can succeed.
/// [`Error::NotReady`] is persistent until an engine is registered again.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Label queue is full, dropped label: {query}")]
    LabelQueueFull { query: String },

    #[error("Label queue is closed, dropped label: {query}")]
    LabelQueueClosed { query: String },

    #[error("Model queue is full")]
    ModelQueueFull,

    #[error("Audio command queue is full")]
    CommandQueueFull,

    #[error("No acoustic engine registered")]
    NotReady,

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Engine arguments: {0}")]
    Config(String),

    #[error("Failed to load engine '{name}': {reason}")]
    EngineLoad { name: String, reason: String },

    #[error("Invalid label: {0}")]
    InvalidLabel(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether the same call may succeed later without reconfiguration.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::LabelQueueFull { .. } | Error::ModelQueueFull | Error::CommandQueueFull
        )
    }

    /// Whether an engine must be (re-)registered before the call can succeed.
    pub fn requires_reconfiguration(&self) -> bool {
        matches!(self, Error::NotReady)
    }
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let full = Error::LabelQueueFull {
            query: "a^b-c+d=e".to_string(),
        };
        assert!(full.is_transient());
        assert!(!full.requires_reconfiguration());

        assert!(Error::NotReady.requires_reconfiguration());
        assert!(!Error::NotReady.is_transient());

        assert!(!Error::InvalidConfig("x".into()).is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = Error::EngineLoad {
            name: "slt".into(),
            reason: "missing -m".into(),
        };
        assert_eq!(err.to_string(), "Failed to load engine 'slt': missing -m");
    }
}
