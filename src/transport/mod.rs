//! Byte channel abstractions for talking to the sensor.
//!
//! The protocol layer only needs an ordered, reliable, half-duplex byte
//! channel. Anything that can move bytes to and from the device fits behind
//! [`Transport`]: the Linux serial implementation, or the scripted
//! in-memory channel used by tests.

use std::io;
use std::time::Duration;

#[cfg(target_os = "linux")]
pub mod serial;
pub mod stub;

#[cfg(target_os = "linux")]
pub use serial::TtyTransport;
pub use stub::ScriptedTransport;

/// An ordered, reliable byte channel to the device.
///
/// Implementations must be blocking: `receive` waits until `n` bytes have
/// arrived or the configured timeout elapses, and may return fewer bytes
/// than requested on timeout. No retry or backoff logic belongs here.
pub trait Transport {
    /// Opens the channel. `endpoint` names the device in implementation
    /// terms (a tty path for serial links).
    fn connect(&mut self, endpoint: &str, baud: u32, timeout: Duration) -> io::Result<()>;

    /// Closes the channel. Closing an unopened channel is a no-op.
    fn disconnect(&mut self) -> io::Result<()>;

    /// Writes all of `bytes` to the channel.
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Reads up to `n` bytes, blocking until they arrive or the timeout
    /// elapses. A short return means timeout, not end of stream.
    fn receive(&mut self, n: usize) -> io::Result<Vec<u8>>;

    /// Discards any unread bytes buffered on the receive side.
    fn clear_receive_buffer(&mut self) -> io::Result<()>;
}
