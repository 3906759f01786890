use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Why a command could not be delivered to a device.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("device not found")]
    NotFound,

    #[error("device disconnected")]
    Disconnected,
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("download failed with status {0}")]
    Status(u16),

    #[error("download network error: {0}")]
    Network(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("controller health check failed: {0}")]
    HealthCheck(String),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("gave up after {0} reconnection attempts")]
    RetriesExhausted(u32),
}

#[derive(Debug, thiserror::Error)]
pub enum SignageError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}
