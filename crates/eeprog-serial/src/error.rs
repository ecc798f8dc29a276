//! Error types for the host client

use thiserror::Error;

/// Host client errors
#[derive(Debug, Error)]
pub enum ProgrammerError {
    /// Failed to connect to device
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Device did not answer in time
    #[error("Communication timeout")]
    Timeout,

    /// Device never answered the readiness probe
    #[error("Programmer not responding after {0} attempts")]
    NotResponding(usize),

    /// Device rejected the request action
    #[error("Programmer rejected action 0x{action:02X} at address 0x{address:04X}")]
    InvalidAction { action: u8, address: u16 },

    /// Response did not match the request
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Frame-level error from the core crate
    #[error("Protocol error: {0}")]
    Protocol(#[from] eeprog_core::Error),

    /// I/O error during communication
    #[error("I/O error: {0}")]
    IoError(String),

    /// Serial port error
    #[error("Serial port error: {0}")]
    SerialError(#[from] serialport::Error),
}

/// Result type for host client operations
pub type Result<T> = std::result::Result<T, ProgrammerError>;

impl From<std::io::Error> for ProgrammerError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                ProgrammerError::Timeout
            }
            _ => ProgrammerError::IoError(e.to_string()),
        }
    }
}
