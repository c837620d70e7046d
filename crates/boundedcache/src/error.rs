//! Error types for boundedcache

use std::fmt;

/// Result type alias for cache construction
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for cache configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Limits or hooks passed to the builder do not describe a usable cache
    InvalidConfiguration(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for Error {}
