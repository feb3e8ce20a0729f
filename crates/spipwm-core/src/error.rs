use crate::master::MasterError;
use crate::trace::TraceError;

/// Errors from loading or validating a [`PeripheralConfig`](crate::PeripheralConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Trace(#[from] TraceError),

    #[error(transparent)]
    Master(#[from] MasterError),

    #[error("failed to start peripheral worker: {0}")]
    Spawn(std::io::Error),

    #[error("peripheral service is closed")]
    ServiceClosed,
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;
