//! Framed request/response engine
//!
//! One cycle walks the states below, in order, and then starts over:
//!
//! 1. `Sync` - slide a 32-bit window over incoming bytes until it holds the
//!    magic marker. Garbage is skipped; there is no timeout.
//! 2. `HeaderDecode` - wait for the 5 field bytes and read them in one burst.
//! 3. `Execute` - allocate a zeroed payload buffer of the requested size and
//!    dispatch: reads fill the clamped prefix, writes drain the full payload
//!    from the channel and commit only the clamped prefix, unknown actions
//!    touch nothing. Only reads send device data back; the other actions
//!    answer with zero bytes.
//! 4. `Respond` - send the response header and `rsize` payload bytes.
//!
//! Failing to allocate the payload buffer abandons the cycle without a
//! response. Everything else is answered, using clamping or the
//! `ACTION_INVALID` sentinel.

use alloc::vec::Vec;

use super::{
    clamp_size, decode_fields, Action, MagicScanner, RequestHeader, ResponseHeader, FIELDS_LEN,
};
use crate::bus::EepromPins;
use crate::channel::{self, ByteChannel};
use crate::eeprom::Eeprom;
use crate::error::Result;

/// Engine state within a request cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Scanning for the magic marker
    Sync,
    /// Reading action, address and size
    HeaderDecode,
    /// Running the request against the device
    Execute,
    /// Sending the response frame
    Respond,
}

/// Result of a single request cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The request was executed and answered
    Responded(ResponseHeader),
    /// The payload buffer could not be allocated; nothing was sent
    Aborted(RequestHeader),
}

/// Counters kept across cycles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Completed cycles, answered or aborted
    pub cycles: u64,
    /// Read requests served
    pub reads: u64,
    /// Write requests served
    pub writes: u64,
    /// Requests answered with `ACTION_INVALID`
    pub invalid: u64,
    /// Cycles abandoned on allocation failure
    pub aborted: u64,
    /// Bytes read from the device
    pub bytes_read: u64,
    /// Bytes committed to the device
    pub bytes_written: u64,
}

/// Protocol engine serving one EEPROM over one byte channel
pub struct Engine<P, C> {
    eeprom: Eeprom<P>,
    channel: C,
    state: State,
    payload_limit: Option<usize>,
    stats: EngineStats,
}

impl<P: EepromPins, C: ByteChannel> Engine<P, C> {
    /// Create an engine
    pub fn new(eeprom: Eeprom<P>, channel: C) -> Self {
        Self {
            eeprom,
            channel,
            state: State::Sync,
            payload_limit: None,
            stats: EngineStats::default(),
        }
    }

    /// Treat payload buffers larger than `limit` bytes as an allocation failure
    ///
    /// Models the heap of a small microcontroller, where a large request
    /// cannot be buffered.
    pub fn with_payload_limit(mut self, limit: usize) -> Self {
        self.payload_limit = Some(limit);
        self
    }

    /// Current state
    pub fn state(&self) -> State {
        self.state
    }

    /// Counters so far
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Get a reference to the EEPROM
    pub fn eeprom(&self) -> &Eeprom<P> {
        &self.eeprom
    }

    /// Get a mutable reference to the EEPROM
    pub fn eeprom_mut(&mut self) -> &mut Eeprom<P> {
        &mut self.eeprom
    }

    /// Get a mutable reference to the channel
    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Release the EEPROM and the channel
    pub fn into_parts(self) -> (Eeprom<P>, C) {
        (self.eeprom, self.channel)
    }

    /// Serve requests until the channel fails
    pub fn run(&mut self) -> Result<()> {
        loop {
            self.run_cycle()?;
        }
    }

    /// Serve exactly one request
    ///
    /// Blocks until a complete request has arrived. Channel errors abort the
    /// cycle and are returned; the next call starts again at `Sync`.
    pub fn run_cycle(&mut self) -> Result<CycleOutcome> {
        let result = self.cycle();
        self.state = State::Sync;
        if result.is_ok() {
            self.stats.cycles += 1;
            log::debug!("engine: {:?}", self.stats);
        }
        result
    }

    fn cycle(&mut self) -> Result<CycleOutcome> {
        self.state = State::Sync;
        self.sync()?;

        self.state = State::HeaderDecode;
        let request = self.decode_header()?;
        log::debug!(
            "engine: request action=0x{:02x} address=0x{:04x} size={}",
            request.action,
            request.address,
            request.size
        );

        self.state = State::Execute;
        let Some((response, buffer)) = self.execute(&request)? else {
            self.stats.aborted += 1;
            return Ok(CycleOutcome::Aborted(request));
        };

        self.state = State::Respond;
        self.respond(&response, &buffer)?;
        Ok(CycleOutcome::Responded(response))
    }

    fn sync(&mut self) -> Result<()> {
        let mut scanner = MagicScanner::new();
        loop {
            if self.channel.available()? > 0 {
                if scanner.push(self.channel.read_byte()?) {
                    return Ok(());
                }
            } else {
                self.channel.idle();
            }
        }
    }

    fn decode_header(&mut self) -> Result<RequestHeader> {
        let mut fields = [0u8; FIELDS_LEN];
        channel::read_burst(&mut self.channel, &mut fields)?;
        let (action, address, size) = decode_fields(&fields);
        Ok(RequestHeader {
            action,
            address,
            size,
        })
    }

    fn allocate(&self, size: usize) -> Option<Vec<u8>> {
        if self.payload_limit.is_some_and(|limit| size > limit) {
            return None;
        }
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(size).ok()?;
        buffer.resize(size, 0);
        Some(buffer)
    }

    fn execute(&mut self, request: &RequestHeader) -> Result<Option<(ResponseHeader, Vec<u8>)>> {
        let size = request.size as usize;
        let Some(mut buffer) = self.allocate(size) else {
            log::warn!(
                "engine: failed to allocate {} byte payload buffer, dropping request",
                size
            );
            return Ok(None);
        };

        let capacity = self.eeprom.capacity();
        let rsize = clamp_size(request.address, request.size, capacity) as usize;
        let response = ResponseHeader::for_request(request, capacity);

        match request.action() {
            Action::Read => {
                let count = self
                    .eeprom
                    .read_range(request.address, rsize, Some(&mut buffer[..]));
                self.stats.reads += 1;
                self.stats.bytes_read += count as u64;
            }
            Action::Write => {
                for byte in buffer.iter_mut() {
                    *byte = channel::read_blocking(&mut self.channel)?;
                }
                let count = self.eeprom.write_buffer(request.address, &buffer[..rsize]);
                // Writes answer with a zeroed placeholder payload
                buffer.fill(0);
                self.stats.writes += 1;
                self.stats.bytes_written += count as u64;
            }
            Action::Invalid(action) => {
                log::debug!("engine: invalid action 0x{:02x}", action);
                self.stats.invalid += 1;
            }
        }

        if rsize < size {
            log::debug!("engine: request clamped from {} to {} bytes", size, rsize);
        }

        Ok(Some((response, buffer)))
    }

    fn respond(&mut self, response: &ResponseHeader, buffer: &[u8]) -> Result<()> {
        self.channel.write_all(&response.encode())?;
        self.channel.write_all(&buffer[..response.rsize as usize])?;
        self.channel.flush()
    }
}
