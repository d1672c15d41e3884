use thiserror::Error;

/// Unified error type for tor-endpoint
#[derive(Error, Debug)]
pub enum EndpointError {
    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid endpoint descriptor: {0}")]
    InvalidDescriptor(String),

    // Connection errors
    /// The TCP connection to the local SOCKS port could not be established.
    ///
    /// Carries the error from the TCP layer as-is, so callers can still
    /// match on `io::ErrorKind::ConnectionRefused` and friends.
    #[error("Connection to SOCKS port failed: {0}")]
    Connect(#[source] std::io::Error),

    #[error("SOCKS5 error: {0}")]
    Socks(#[from] tokio_socks::Error),

    // Errors once the stream is established
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Operation timed out")]
    Timeout,
}

/// Result type alias for tor-endpoint operations
pub type Result<T> = std::result::Result<T, EndpointError>;

impl EndpointError {
    /// Whether another SOCKS port is worth trying after this error.
    ///
    /// Only failures to reach the proxy itself qualify. Anything the proxy
    /// said back, or anything that went wrong after the handshake, would
    /// happen again on a different port.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EndpointError::Connect(_))
    }

    /// The underlying I/O error, if this error carries one.
    pub fn io_error(&self) -> Option<&std::io::Error> {
        match self {
            EndpointError::Connect(e) | EndpointError::Io(e) => Some(e),
            EndpointError::Socks(tokio_socks::Error::Io(e)) => Some(e),
            _ => None,
        }
    }

    /// Check if this is a configuration error raised before any network activity
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            EndpointError::InvalidConfig(_) | EndpointError::InvalidDescriptor(_)
        )
    }
}
