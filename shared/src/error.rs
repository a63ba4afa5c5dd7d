/*!
Common error types for the shutter control components.
*/

use thiserror::Error;

/// Common result type used throughout the shared library
pub type Result<T> = std::result::Result<T, SharedError>;

/// The named serial port could not be opened (missing, access denied, busy)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot open serial port {port}: {reason}")]
pub struct ConnectionError {
    pub port: String,
    pub reason: String,
}

impl ConnectionError {
    pub fn new(port: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by an open (or supposedly open) serial channel
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Write attempted before `open` succeeded or after `close`
    #[error("serial channel is not connected")]
    NotConnected,

    /// Underlying write or flush failed
    #[error("serial write failed: {0}")]
    Io(#[from] std::io::Error),

    /// The OS refused to list serial ports
    #[error("serial port enumeration failed: {0}")]
    Enumeration(String),
}

/// Initialization failures, always reported rather than raised to the host
#[derive(Error, Debug)]
pub enum InitError {
    /// Slave role without a channel handed over by its master
    #[error("slave actuator initialized without a controller shared by its master")]
    MissingExternalController,

    /// No serial port was enumerated or configured
    #[error("no serial port selected")]
    NoPortSelected,

    /// Master could not open its serial port
    #[error("hardware initialization failed on port {}", .0.port)]
    HardwareInitFailed(#[source] ConnectionError),
}

/// Move request failures
#[derive(Error, Debug)]
pub enum MoveError {
    #[error("actuator is not initialized")]
    NotInitialized,

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Comprehensive error type for all shared operations
#[derive(Error, Debug)]
pub enum SharedError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Init(#[from] InitError),

    #[error(transparent)]
    Move(#[from] MoveError),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SharedError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
