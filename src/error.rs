//! Error types for OSCIL agent and host operations.

use thiserror::Error;

/// Result type alias for OSCIL operations.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Error types for serial communication with an OSCIL peer.
///
/// Protocol input never produces one of these; malformed commands are
/// ignored by the session. Errors only come from the collaborators.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Serial port communication error
    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Communication timeout (no answer from the peer)
    #[error("Communication timeout")]
    Timeout,

    /// No serial port answered the handshake probe
    #[error("No OSCIL device found")]
    DeviceNotFound,

    /// Response didn't match expected format
    #[error("Invalid response: expected {expected}, got {actual}")]
    InvalidResponse {
        /// Expected response line
        expected: String,
        /// Actual line received
        actual: String,
    },

    /// Data parsing error
    #[error("Parse error: {0}")]
    Parse(String),
}
