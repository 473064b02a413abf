//! Error handling for the chat server

use thiserror::Error;
use tokio_util::codec::LinesCodecError;

/// Result type alias for chat operations
pub type Result<T> = std::result::Result<T, ChatError>;

/// Chat server error types
#[derive(Debug, Error)]
pub enum ChatError {
    /// Read/write failure or peer disconnect
    #[error("Network error: {0}")]
    Network(String),
    /// Another active session already holds this username
    #[error("username already in use: {0}")]
    UsernameTaken(String),
    /// Every registry slot is occupied
    #[error("server full: {capacity} clients connected")]
    CapacityExceeded { capacity: usize },
    /// The registry has been drained for shutdown
    #[error("registry closed for shutdown")]
    RegistryClosed,
    /// Message store failure
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ChatError {
    /// Whether this error ends the session that hit it.
    ///
    /// Storage failures are reported inline and the session carries on;
    /// anything touching the socket is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChatError::Network(_))
    }

    /// Create a network error
    pub fn network<T: Into<String>>(msg: T) -> Self {
        ChatError::Network(msg.into())
    }

    /// Create a configuration error
    pub fn config<T: Into<String>>(msg: T) -> Self {
        ChatError::Config(msg.into())
    }
}

impl From<std::io::Error> for ChatError {
    fn from(err: std::io::Error) -> Self {
        ChatError::Network(format!("IO error: {}", err))
    }
}

impl From<LinesCodecError> for ChatError {
    fn from(err: LinesCodecError) -> Self {
        match err {
            LinesCodecError::MaxLineLengthExceeded => {
                ChatError::Network("line exceeds maximum length".to_string())
            }
            LinesCodecError::Io(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_classification() {
        assert!(ChatError::network("reset").is_terminal());
        assert!(!ChatError::config("bad").is_terminal());
        assert!(!ChatError::Storage(sqlx::Error::RowNotFound).is_terminal());
        assert!(!ChatError::CapacityExceeded { capacity: 10 }.is_terminal());
    }

    #[test]
    fn test_codec_error_maps_to_network() {
        let err: ChatError = LinesCodecError::MaxLineLengthExceeded.into();
        assert!(matches!(err, ChatError::Network(_)));
    }
}
