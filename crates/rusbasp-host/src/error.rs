//! Error types for host-side programmer operations

use thiserror::Error;

/// Host driver errors
#[derive(Debug, Error)]
pub enum HostError {
    /// The device rejected a control transfer or one of its data chunks
    #[error("Device stalled command {0}")]
    Stall(u8),

    /// Fewer bytes than requested came back
    #[error("Short transfer: expected {expected} bytes, got {actual}")]
    ShortTransfer { expected: usize, actual: usize },

    /// The target did not acknowledge programming enable
    #[error("Target not responding (status {0}), check wiring or try a slower clock")]
    TargetNotResponding(u8),

    /// The device answered with a data stage of the wrong kind
    #[error("Unexpected reply to command {0}")]
    UnexpectedReply(u8),

    /// Read-back differs from the written data
    #[error("Verify failed at 0x{address:05X}: expected 0x{expected:02X}, got 0x{actual:02X}")]
    VerifyFailed {
        address: u32,
        expected: u8,
        actual: u8,
    },

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Engine error
    #[error("Engine error: {0}")]
    Core(#[from] rusbasp_core::Error),
}

/// Result type for host operations
pub type Result<T> = std::result::Result<T, HostError>;
