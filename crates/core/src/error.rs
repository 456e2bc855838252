//! Core error types for rconhub

#[derive(thiserror::Error, Debug)]
pub enum RconError {
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl RconError {
    /// Whether this error should end a connection for good instead of
    /// being retried by the reconnect scheduler.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Authentication(_) | Self::Protocol(_) | Self::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, RconError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_classification() {
        assert!(RconError::Authentication("bad password".into()).is_terminal());
        assert!(RconError::Protocol("version 1".into()).is_terminal());
        assert!(!RconError::Network("reset".into()).is_terminal());
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(!RconError::from(io).is_terminal());
    }
}
