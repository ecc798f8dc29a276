//! In-memory byte channel

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use eeprog_core::channel::ByteChannel;
use eeprog_core::error::{Error, Result};

/// A `ByteChannel` backed by a receive queue and a transmit buffer
///
/// Once closed, the channel reports `Disconnected` as soon as a reader runs
/// out of queued bytes or has to wait for more than are queued, which lets a
/// blocking engine loop terminate.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    closed: bool,
    starved: bool,
    idle_polls: usize,
}

impl MemoryChannel {
    /// Create an empty, open channel
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an open channel with `input` queued for reading
    pub fn with_input(input: &[u8]) -> Self {
        let mut channel = Self::new();
        channel.push_input(input);
        channel
    }

    /// Queue more bytes for reading
    pub fn push_input(&mut self, input: &[u8]) {
        self.rx.extend(input.iter().copied());
        self.starved = false;
    }

    /// Mark the peer as gone
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Bytes queued but not yet read
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Everything written so far
    pub fn output(&self) -> &[u8] {
        &self.tx
    }

    /// Take everything written so far
    pub fn take_output(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.tx)
    }

    /// Number of times the reader had to wait
    pub fn idle_polls(&self) -> usize {
        self.idle_polls
    }
}

impl ByteChannel for MemoryChannel {
    fn available(&mut self) -> Result<usize> {
        if self.closed && (self.rx.is_empty() || self.starved) {
            return Err(Error::Disconnected);
        }
        Ok(self.rx.len())
    }

    fn read_byte(&mut self) -> Result<u8> {
        self.rx.pop_front().ok_or(Error::ReadError)
    }

    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.tx.push(byte);
        Ok(())
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.tx.extend_from_slice(data);
        Ok(())
    }

    fn idle(&mut self) {
        self.idle_polls += 1;
        if self.closed {
            self.starved = true;
        }
    }
}
