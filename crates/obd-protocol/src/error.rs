//! OBD-II Error Types

use thiserror::Error;

/// Errors that can occur while talking to an OBD-II adapter
#[derive(Debug, Error)]
pub enum ObdError {
    /// Stream read/write failure
    #[error("I/O error: {0}")]
    Io(String),

    /// Protocol name not recognised
    #[error("Protocol not supported: {0}")]
    UnsupportedProtocol(String),

    /// The underlying stream reached end of file
    #[error("OBD adapter disconnected")]
    Disconnected,

    /// Connector or handshake could not establish a usable link
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Exchange attempted on a session that already finished
    #[error("OBD session already finished")]
    SessionFinished,

    /// Caller requested the connection to stop
    #[error("Operation cancelled")]
    Cancelled,

    /// A connection task is already running on this dispatcher
    #[error("A connection is already active")]
    AlreadyConnected,

    /// Configuration value out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<std::io::Error> for ObdError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            ObdError::Disconnected
        } else {
            ObdError::Io(err.to_string())
        }
    }
}
