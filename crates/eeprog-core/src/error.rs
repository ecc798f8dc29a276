//! Error types for eeprog-core
//!
//! Pin operations cannot fail at this level, so the only errors here come
//! from the byte channel and from frame decoding.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Channel errors
    /// The byte channel was closed by the peer
    Disconnected,
    /// Reading from the byte channel failed
    ReadError,
    /// Other I/O error on the underlying transport
    IoError,

    // Frame errors
    /// Frame did not start with the magic header
    InvalidHeader,
    /// Provided buffer is too small for the operation
    BufferTooSmall,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "channel disconnected"),
            Self::ReadError => write!(f, "channel read failed"),
            Self::IoError => write!(f, "I/O error"),
            Self::InvalidHeader => write!(f, "invalid frame header"),
            Self::BufferTooSmall => write!(f, "buffer too small"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
