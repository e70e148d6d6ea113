//! Error types for minimesos

use thiserror::Error;

/// Result type for minimesos operations
pub type Result<T> = std::result::Result<T, MinimesosError>;

/// minimesos error types
#[derive(Error, Debug)]
pub enum MinimesosError {
    #[error("Invalid cluster configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to start container {name}: {source}")]
    StartFailure {
        name: String,
        #[source]
        source: Box<MinimesosError>,
    },

    #[error("Cluster did not become ready: {0}")]
    ReadinessTimeout(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Container engine error: {0}")]
    Engine(String),

    #[error("Container not known to the engine: {0}")]
    EngineNotFound(String),

    #[error("Cluster state file error: {0}")]
    StateFile(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Marathon error: {0}")]
    Marathon(String),

    #[error("Lock error: {0}")]
    Lock(String),
}

impl MinimesosError {
    /// Wrap a container-local failure into the fatal orchestration error
    /// raised by `start()` and `add_and_start_container()`.
    pub fn start_failure(name: &str, cause: MinimesosError) -> Self {
        MinimesosError::StartFailure {
            name: name.to_string(),
            source: Box::new(cause),
        }
    }
}
