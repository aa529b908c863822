use thiserror::Error;

/// Top-level error type for the anima runtime.
///
/// Each variant wraps a subsystem-specific error. Subsystem crates define
/// their own error types and implement `From<SubsystemError> for AnimaError`
/// so that the `?` operator works seamlessly across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AnimaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Component error: {0}")]
    Component(String),

    #[error("Interface error: {0}")]
    Interface(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Shutdown in progress")]
    ShuttingDown,
}

/// Convenience result alias used across the workspace.
pub type Result<T> = std::result::Result<T, AnimaError>;

impl From<toml::de::Error> for AnimaError {
    fn from(err: toml::de::Error) -> Self {
        AnimaError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for AnimaError {
    fn from(err: toml::ser::Error) -> Self {
        AnimaError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AnimaError {
    fn from(err: serde_json::Error) -> Self {
        AnimaError::Serialization(err.to_string())
    }
}
