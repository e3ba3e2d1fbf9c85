//! Error types for tilecache

use std::fmt;
use std::io;

use crate::tile::Coord;

/// Result type alias for tilecache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for cache construction and scheduling
#[derive(Debug)]
pub enum Error {
    /// I/O error (spawning a worker thread)
    Io(io::Error),

    /// Configuration rejected by `CacheConfig::validate`
    InvalidConfig(&'static str),

    /// Work queue was full and the request was dropped
    QueueFull(Coord),

    /// Work queue has been closed for shutdown
    QueueClosed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::QueueFull(coord) => write!(f, "Work queue full, dropped request for {}", coord),
            Error::QueueClosed => write!(f, "Work queue is closed"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

/// Failure reported by a `Generator` for a single coordinate.
///
/// Workers log it and leave the tile as a placeholder; it never reaches
/// callers of `TileCache`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateError {
    message: String,
}

impl GenerateError {
    /// Create a generation error with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for GenerateError {}

impl From<String> for GenerateError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for GenerateError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}
