//! Error types for the HVC-P2 driver.

use thiserror::Error;

use crate::wire::ResponseCode;

/// Main error type for the driver.
#[derive(Error, Debug)]
pub enum Error {
    /// The byte stream violated the protocol. Fatal to the current call;
    /// the receive buffer must be cleared before the channel is reused.
    #[error("protocol fault: {0}")]
    Protocol(#[from] ProtocolFault),

    /// The device answered with a non-zero response code. Recoverable; no
    /// payload was read.
    #[error("device error: {0}")]
    Device(ResponseCode),

    /// The external stabilization engine returned a negative status.
    #[error("stabilizer error: {0}")]
    Stabilizer(#[from] StabilizerFault),

    /// A caller-supplied parameter is out of range. Nothing was sent.
    #[error("configuration error: {0}")]
    Config(String),

    /// The underlying byte channel failed.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
}

/// Wire-level faults that leave the channel desynchronized.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolFault {
    #[error("invalid sync byte {found:#04x}")]
    BadSync { found: u8 },

    #[error("short read: wanted {want} bytes, got {got}")]
    ShortRead { want: usize, got: usize },

    #[error("declared body length {declared} does not match {consumed} bytes consumed")]
    LengthMismatch { declared: usize, consumed: usize },

    #[error("malformed response: {0}")]
    Malformed(&'static str),
}

/// Negative status from the stabilization engine, surfaced verbatim.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("stabilizer returned status {0}")]
pub struct StabilizerFault(pub i32);

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Convenience constructor for range checks.
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}
