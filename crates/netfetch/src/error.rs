//! Error types for netfetch

use std::fmt;
use std::io;

/// Result type alias for netfetch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for fetcher operations
#[derive(Debug)]
pub enum Error {
    /// Configuration rejected at construction
    InvalidConfiguration(String),

    /// Disk cache or local file I/O error
    Io(io::Error),

    /// HTTP transport error
    Http(reqwest::Error),

    /// Server answered with a non-success status
    Status(u16),

    /// Bytes could not be turned into a resource
    Decode(DecodeError),

    /// No tokio runtime to run workers on
    NoRuntime,

    /// Transport panicked while fetching
    TransportPanicked,
}

/// Failure to decode fetched or cached bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError(String);

impl DecodeError {
    /// Create a decode error with a description
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Get the description
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for DecodeError {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Http(e) => write!(f, "HTTP error: {}", e),
            Error::Status(code) => write!(f, "HTTP status {}", code),
            Error::Decode(e) => write!(f, "Decode error: {}", e),
            Error::NoRuntime => write!(f, "No tokio runtime available"),
            Error::TransportPanicked => write!(f, "Transport panicked"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Http(e) => Some(e),
            Error::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Http(err)
    }
}

impl From<DecodeError> for Error {
    fn from(err: DecodeError) -> Self {
        Error::Decode(err)
    }
}

impl From<boundedcache::Error> for Error {
    fn from(err: boundedcache::Error) -> Self {
        match err {
            boundedcache::Error::InvalidConfiguration(msg) => Error::InvalidConfiguration(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_io_source() {
        let err = Error::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(err.source().is_some());
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_cache_config_error_converts() {
        let err = Error::from(boundedcache::Error::InvalidConfiguration("bad".to_string()));
        assert!(matches!(err, Error::InvalidConfiguration(ref m) if m == "bad"));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(Error::Status(404).to_string(), "HTTP status 404");
    }
}
