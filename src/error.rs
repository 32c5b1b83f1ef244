//! Error types for the gateway

use thiserror::Error;

/// Errors that stop the daemon from starting.
///
/// Frame, process and beacon errors are handled where they occur and
/// never abort startup, so they stay in their own types.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Frame codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),
}

/// Delivery channel errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Address resolution failed for {host}: {reason}")]
    Resolve { host: String, reason: String },

    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Connection closed by peer")]
    Closed,

    #[error("Send failed: zero bytes written")]
    ZeroWrite,

    #[error("Queue full, frame dropped")]
    QueueFull,

    #[error("Delivery worker is not running")]
    WorkerStopped,

    #[error("Invalid gateway address: {0}")]
    InvalidGateway(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// External process errors
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to spawn {program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("Missing pipe on {0}")]
    MissingPipe(String),

    #[error("Supervisor already running")]
    AlreadyRunning,
}

/// Beacon payload errors
#[derive(Error, Debug)]
pub enum BeaconError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid weather data: {0}")]
    Weather(#[from] serde_json::Error),

    #[error("Timestamp out of range: {0}")]
    Timestamp(i64),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
