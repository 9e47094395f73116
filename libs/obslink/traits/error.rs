use thiserror::Error;

/// Main error type for obslink
#[derive(Error, Debug)]
pub enum ObsLinkError {
    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Connection closed unexpectedly
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Identification handshake failed (missing Hello/Identified, wrong op,
    /// timeout or close during the exchange)
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// Malformed wire frame or unknown operation code
    #[error("Codec error: {0}")]
    Codec(String),

    /// Channel send error
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Invalid state for the attempted operation
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type for obslink operations
pub type Result<T> = std::result::Result<T, ObsLinkError>;
