//! Scripted transport for testing. Plays back canned device responses.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use super::Transport;
use crate::wire::SYNC_BYTE;

/// In-memory transport that records sent frames and answers each send with
/// the next scripted response.
///
/// A scripted response is the raw byte stream the device would emit:
/// header plus body. Queuing fewer bytes than a caller asks for simulates a
/// receive timeout (short read).
pub struct ScriptedTransport {
    script: VecDeque<Vec<u8>>,
    rx: Vec<u8>,
    sent: Vec<Vec<u8>>,
    connected: bool,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
            rx: Vec::new(),
            sent: Vec::new(),
            connected: true,
        }
    }

    /// Queues a well-formed response: sync byte, response code, 4-byte
    /// little-endian body length, body.
    pub fn queue_response(&mut self, code: u8, body: &[u8]) {
        let mut frame = Vec::with_capacity(6 + body.len());
        frame.push(SYNC_BYTE);
        frame.push(code);
        frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
        frame.extend_from_slice(body);
        self.script.push_back(frame);
    }

    /// Queues arbitrary bytes, for malformed-stream scenarios.
    pub fn queue_raw(&mut self, bytes: &[u8]) {
        self.script.push_back(bytes.to_vec());
    }

    /// Frames sent by the host so far, oldest first.
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    /// Bytes queued on the receive side that no one has read.
    pub fn unread(&self) -> usize {
        self.rx.len()
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ScriptedTransport {
    fn connect(&mut self, _endpoint: &str, _baud: u32, _timeout: Duration) -> io::Result<()> {
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> io::Result<()> {
        self.connected = false;
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        if !self.connected {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "scripted transport disconnected",
            ));
        }
        self.sent.push(bytes.to_vec());
        if let Some(response) = self.script.pop_front() {
            self.rx.extend_from_slice(&response);
        }
        Ok(())
    }

    fn receive(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let take = n.min(self.rx.len());
        Ok(self.rx.drain(..take).collect())
    }

    fn clear_receive_buffer(&mut self) -> io::Result<()> {
        self.rx.clear();
        Ok(())
    }
}
