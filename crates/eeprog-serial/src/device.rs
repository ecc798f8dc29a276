//! Programmer client
//!
//! [`Programmer`] frames requests, waits for the matching response and
//! splits large transfers into blocks the device can buffer.

use std::time::{Duration, Instant};

use eeprog_core::protocol::{
    decode_fields, MagicScanner, RequestHeader, ResponseHeader, ACTION_WRITE, FIELDS_LEN,
};

use crate::error::{ProgrammerError, Result};
use crate::transport::Transport;

/// Default per-command timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u32 = 1000;

/// Default number of payload bytes per frame
pub const DEFAULT_BLOCK_SIZE: usize = 64;

/// Timeout of a single readiness probe in milliseconds
pub const PROBE_TIMEOUT_MS: u32 = 100;

/// Default number of readiness probes before giving up
pub const DEFAULT_PROBE_ATTEMPTS: usize = 50;

/// Time the device spends committing one byte, added to write deadlines
const WRITE_CYCLE_MS: u32 = 10;

/// Pause between readiness probes
const PROBE_INTERVAL: Duration = Duration::from_millis(100);

/// Slice used to poll the transport when no timeout is set
const UNBOUNDED_POLL_MS: u32 = 1000;

/// Upper bound on the time spent discarding late probe answers
const DRAIN_LIMIT_MS: u32 = 1000;

/// Progress callbacks for multi-block transfers
pub trait TransferProgress {
    /// A transfer of `total_bytes` is starting
    fn start(&mut self, total_bytes: usize);

    /// `bytes_done` bytes of the transfer have completed
    fn progress(&mut self, bytes_done: usize);

    /// The transfer has ended
    fn finish(&mut self);
}

/// Progress sink that ignores every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl TransferProgress for NoProgress {
    fn start(&mut self, _total_bytes: usize) {}
    fn progress(&mut self, _bytes_done: usize) {}
    fn finish(&mut self) {}
}

/// A parsed response frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response header as received
    pub header: ResponseHeader,
    /// `header.rsize` payload bytes
    pub data: Vec<u8>,
}

struct Deadline(Option<Instant>);

impl Deadline {
    fn after_ms(timeout_ms: u32) -> Self {
        if timeout_ms == 0 {
            Self(None)
        } else {
            Self(Some(
                Instant::now() + Duration::from_millis(timeout_ms as u64),
            ))
        }
    }

    /// Milliseconds left, or `Timeout` once expired
    fn remaining_ms(&self) -> Result<u32> {
        let Some(deadline) = self.0 else {
            return Ok(UNBOUNDED_POLL_MS);
        };
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return Err(ProgrammerError::Timeout);
        }
        Ok((left.as_millis() as u32).max(1))
    }
}

/// Client for a programmer reachable over `T`
pub struct Programmer<T: Transport> {
    transport: T,
    timeout_ms: u32,
}

impl<T: Transport> Programmer<T> {
    /// Create a client with the default timeout
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// Set the per-command timeout in milliseconds; 0 waits forever
    pub fn set_timeout(&mut self, timeout_ms: u32) {
        self.timeout_ms = timeout_ms;
    }

    /// Per-command timeout in milliseconds
    pub fn timeout(&self) -> u32 {
        self.timeout_ms
    }

    /// Get a reference to the transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Release the transport
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Probe the device until it answers
    ///
    /// Boards that reset when the port opens need a moment before they
    /// listen. Each attempt is a one-byte read of address 0. Answers to
    /// earlier probes that arrive late are discarded once the device is
    /// ready, so they cannot be mistaken for the next command's response.
    pub fn wait_ready(&mut self, attempts: usize) -> Result<()> {
        for attempt in 1..=attempts {
            match self.exchange(&RequestHeader::read(0, 1), &[], PROBE_TIMEOUT_MS) {
                Ok(_) => {
                    log::debug!("programmer ready after {} probe(s)", attempt);
                    self.drain(PROBE_TIMEOUT_MS)?;
                    return Ok(());
                }
                Err(ProgrammerError::Timeout) => {
                    log::debug!("programmer not ready (probe {}/{})", attempt, attempts);
                    std::thread::sleep(PROBE_INTERVAL);
                }
                Err(e) => return Err(e),
            }
        }
        Err(ProgrammerError::NotResponding(attempts))
    }

    /// Discard input until the line has been quiet for `quiet_ms`
    fn drain(&mut self, quiet_ms: u32) -> Result<usize> {
        let limit = Deadline::after_ms(DRAIN_LIMIT_MS);
        let mut buf = [0u8; 64];
        let mut discarded = 0;
        loop {
            let n = self.transport.read_nonblock(&mut buf, quiet_ms)?;
            if n == 0 {
                break;
            }
            log::trace!("drop: {}", hex::encode(&buf[..n]));
            discarded += n;
            if limit.remaining_ms().is_err() {
                log::warn!("line still busy after discarding {} byte(s)", discarded);
                break;
            }
        }
        if discarded > 0 {
            log::debug!("discarded {} late byte(s)", discarded);
        }
        Ok(discarded)
    }

    /// Send one request frame and return the parsed response
    pub fn command(&mut self, request: &RequestHeader, payload: &[u8]) -> Result<Response> {
        let mut timeout_ms = self.timeout_ms;
        if timeout_ms != 0 && request.action == ACTION_WRITE {
            timeout_ms = timeout_ms.saturating_add(WRITE_CYCLE_MS * request.size as u32);
        }
        self.exchange(request, payload, timeout_ms)
    }

    fn exchange(
        &mut self,
        request: &RequestHeader,
        payload: &[u8],
        timeout_ms: u32,
    ) -> Result<Response> {
        let expected = if request.action == ACTION_WRITE {
            request.size as usize
        } else {
            0
        };
        if payload.len() != expected {
            return Err(ProgrammerError::InvalidParameter(format!(
                "payload of {} bytes for a request carrying {}",
                payload.len(),
                expected
            )));
        }

        let mut frame = Vec::with_capacity(request.encode().len() + payload.len());
        frame.extend_from_slice(&request.encode());
        frame.extend_from_slice(payload);
        log::debug!(
            "request action=0x{:02x} address=0x{:04x} size={}",
            request.action,
            request.address,
            request.size
        );
        log::trace!("send: {}", hex::encode(&frame));
        self.transport.write(&frame)?;
        self.transport.flush()?;

        let deadline = Deadline::after_ms(timeout_ms);
        let header = self.receive_header(&deadline)?;
        log::debug!(
            "response action=0x{:02x} address=0x{:04x} rsize={}",
            header.action,
            header.address,
            header.rsize
        );

        if header.address != request.address {
            return Err(ProgrammerError::InvalidResponse(format!(
                "address 0x{:04x} echoed for request at 0x{:04x}",
                header.address, request.address
            )));
        }
        if !header.is_invalid() && header.action != request.action {
            return Err(ProgrammerError::InvalidResponse(format!(
                "action 0x{:02x} echoed for request action 0x{:02x}",
                header.action, request.action
            )));
        }
        if header.rsize > request.size {
            return Err(ProgrammerError::InvalidResponse(format!(
                "{} bytes answered for a {} byte request",
                header.rsize, request.size
            )));
        }

        let mut data = vec![0u8; header.rsize as usize];
        self.receive_exact(&mut data, &deadline)?;
        log::trace!("recv: {} {}", hex::encode(header.encode()), hex::encode(&data));
        Ok(Response { header, data })
    }

    fn receive_exact(&mut self, buf: &mut [u8], deadline: &Deadline) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let wait_ms = deadline.remaining_ms()?;
            filled += self.transport.read_nonblock(&mut buf[filled..], wait_ms)?;
        }
        Ok(())
    }

    fn receive_header(&mut self, deadline: &Deadline) -> Result<ResponseHeader> {
        let mut scanner = MagicScanner::new();
        let mut byte = [0u8; 1];
        let mut scanned = 0usize;
        loop {
            self.receive_exact(&mut byte, deadline)?;
            scanned += 1;
            if scanner.push(byte[0]) {
                break;
            }
        }
        let stray = scanned.saturating_sub(4);
        if stray > 0 {
            log::warn!("skipped {} stray byte(s) before response", stray);
        }

        let mut fields = [0u8; FIELDS_LEN];
        self.receive_exact(&mut fields, deadline)?;
        let (action, address, rsize) = decode_fields(&fields);
        Ok(ResponseHeader {
            action,
            address,
            rsize,
        })
    }

    fn check_action(response: &Response) -> Result<()> {
        if response.header.is_invalid() {
            return Err(ProgrammerError::InvalidAction {
                action: response.header.action,
                address: response.header.address,
            });
        }
        Ok(())
    }

    /// Read up to `size` bytes in a single frame
    ///
    /// The device clamps the range at its capacity, so the result may be
    /// shorter than requested.
    pub fn read(&mut self, address: u16, size: u16) -> Result<Vec<u8>> {
        let response = self.command(&RequestHeader::read(address, size), &[])?;
        Self::check_action(&response)?;
        if response.header.rsize < size {
            log::warn!(
                "read at 0x{:04x} truncated to {} of {} bytes",
                address,
                response.header.rsize,
                size
            );
        }
        Ok(response.data)
    }

    /// Write `data` in a single frame, returning the number of bytes committed
    pub fn write(&mut self, address: u16, data: &[u8]) -> Result<usize> {
        let size = u16::try_from(data.len()).map_err(|_| {
            ProgrammerError::InvalidParameter(format!(
                "{} bytes do not fit in one frame",
                data.len()
            ))
        })?;
        let response = self.command(&RequestHeader::write(address, size), data)?;
        Self::check_action(&response)?;
        if response.header.rsize < size {
            log::warn!(
                "write at 0x{:04x} truncated to {} of {} bytes",
                address,
                response.header.rsize,
                size
            );
        }
        Ok(response.header.rsize as usize)
    }

    /// Read `size` bytes starting at `address`, `block_size` bytes per frame
    ///
    /// Stops early when the device truncates a block.
    pub fn read_blocks(
        &mut self,
        address: u16,
        size: usize,
        block_size: usize,
        progress: &mut dyn TransferProgress,
    ) -> Result<Vec<u8>> {
        let block_size = check_block_size(block_size)?;
        let mut out = Vec::with_capacity(size);
        progress.start(size);

        while out.len() < size {
            let chunk = (size - out.len()).min(block_size);
            let block_address = block_address(address, out.len())?;
            let data = self.read(block_address, chunk as u16)?;
            let short = data.len() < chunk;
            out.extend_from_slice(&data);
            progress.progress(out.len());
            if short {
                break;
            }
        }

        progress.finish();
        Ok(out)
    }

    /// Write `data` starting at `address`, `block_size` bytes per frame
    ///
    /// Returns the number of bytes the device committed; stops early when
    /// the device truncates a block.
    pub fn write_blocks(
        &mut self,
        address: u16,
        data: &[u8],
        block_size: usize,
        progress: &mut dyn TransferProgress,
    ) -> Result<usize> {
        let block_size = check_block_size(block_size)?;
        let mut done = 0;
        progress.start(data.len());

        for block in data.chunks(block_size) {
            let block_address = block_address(address, done)?;
            let written = self.write(block_address, block)?;
            done += written;
            progress.progress(done);
            if written < block.len() {
                break;
            }
        }

        progress.finish();
        Ok(done)
    }
}

fn check_block_size(block_size: usize) -> Result<usize> {
    if block_size == 0 || block_size > u16::MAX as usize {
        return Err(ProgrammerError::InvalidParameter(format!(
            "block size {} out of range 1..={}",
            block_size,
            u16::MAX
        )));
    }
    Ok(block_size)
}

fn block_address(base: u16, offset: usize) -> Result<u16> {
    u16::try_from(base as usize + offset).map_err(|_| {
        ProgrammerError::InvalidParameter(format!(
            "address 0x{:x} past the 16-bit address field",
            base as usize + offset
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::loopback::LoopbackTransport;
    use eeprog_core::eeprom::{Eeprom, EepromConfig};
    use eeprog_core::protocol::{ACTION_INVALID, ACTION_READ};
    use eeprog_dummy::DummyEeprom;

    fn programmer() -> Programmer<LoopbackTransport<DummyEeprom>> {
        Programmer::new(LoopbackTransport::new(Eeprom::new(DummyEeprom::new_default())))
    }

    fn programmer_with(data: &[u8]) -> Programmer<LoopbackTransport<DummyEeprom>> {
        let dummy = DummyEeprom::with_data(Default::default(), data);
        Programmer::new(LoopbackTransport::new(Eeprom::new(dummy)))
    }

    /// Transport that swallows requests and replays a canned answer
    struct Canned {
        answer: Vec<u8>,
        sent: Vec<u8>,
    }

    impl Transport for Canned {
        fn write(&mut self, data: &[u8]) -> Result<()> {
            self.sent.extend_from_slice(data);
            Ok(())
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<()> {
            let n = self.read_nonblock(buf, 0)?;
            if n < buf.len() {
                return Err(ProgrammerError::Timeout);
            }
            Ok(())
        }

        fn read_nonblock(&mut self, buf: &mut [u8], _timeout_ms: u32) -> Result<usize> {
            let n = buf.len().min(self.answer.len());
            buf[..n].copy_from_slice(&self.answer[..n]);
            self.answer.drain(..n);
            Ok(n)
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn canned(answer: &[u8]) -> Programmer<Canned> {
        Programmer::new(Canned {
            answer: answer.to_vec(),
            sent: Vec::new(),
        })
    }

    #[derive(Default)]
    struct Recorder {
        total: usize,
        updates: Vec<usize>,
        finished: bool,
    }

    impl TransferProgress for Recorder {
        fn start(&mut self, total_bytes: usize) {
            self.total = total_bytes;
        }
        fn progress(&mut self, bytes_done: usize) {
            self.updates.push(bytes_done);
        }
        fn finish(&mut self) {
            self.finished = true;
        }
    }

    #[test]
    fn test_read_erased_device() {
        let mut prog = programmer();
        assert_eq!(prog.read(0, 4).unwrap(), vec![0xFF; 4]);
    }

    #[test]
    fn test_write_then_read() {
        let mut prog = programmer();
        assert_eq!(prog.write(0x10, &[1, 2, 3]).unwrap(), 3);
        assert_eq!(prog.read(0x10, 3).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_read_truncated_at_capacity() {
        let mut prog = programmer();
        assert_eq!(prog.read(2046, 10).unwrap().len(), 2);
        assert!(prog.read(2048, 10).unwrap().is_empty());
    }

    #[test]
    fn test_write_truncated_at_capacity() {
        let mut prog = programmer();
        assert_eq!(prog.write(2047, &[0xAA, 0xBB]).unwrap(), 1);
        assert_eq!(prog.read(2047, 1).unwrap(), vec![0xAA]);
    }

    #[test]
    fn test_wait_ready_on_live_device() {
        let mut prog = programmer();
        prog.wait_ready(3).unwrap();
    }

    #[test]
    fn test_late_ready_answer_is_discarded() {
        let mut prog = programmer_with(&[1, 2, 3, 4]);
        // Answer to a readiness check that timed out before the device came up
        let stale = ResponseHeader {
            action: ACTION_READ,
            address: 0,
            rsize: 1,
        };
        let mut late = stale.encode().to_vec();
        late.push(0xAA);
        prog.transport_mut().inject_response(&late);

        prog.wait_ready(3).unwrap();
        assert_eq!(prog.read(0, 4).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_wait_ready_drains_duplicate_answers() {
        let answer = ResponseHeader {
            action: ACTION_READ,
            address: 0,
            rsize: 1,
        };
        let mut frames = Vec::new();
        for _ in 0..2 {
            frames.extend_from_slice(&answer.encode());
            frames.push(0x01);
        }
        let mut prog = canned(&frames);
        prog.wait_ready(1).unwrap();
        assert!(prog.transport().answer.is_empty());
    }

    #[test]
    fn test_wait_ready_gives_up() {
        let mut prog = canned(&[]);
        let err = prog.wait_ready(2).unwrap_err();
        assert!(matches!(err, ProgrammerError::NotResponding(2)));
        // Two read(0, 1) probes went out
        assert_eq!(prog.transport().sent.len(), 18);
    }

    #[test]
    fn test_silent_device_times_out() {
        let mut prog = canned(&[]);
        prog.set_timeout(20);
        assert!(matches!(prog.read(0, 1), Err(ProgrammerError::Timeout)));
    }

    #[test]
    fn test_invalid_action_is_reported() {
        let header = ResponseHeader {
            action: ACTION_INVALID,
            address: 0x0100,
            rsize: 0,
        };
        let mut prog = canned(&header.encode());
        let err = prog.read(0x0100, 0).unwrap_err();
        assert!(matches!(
            err,
            ProgrammerError::InvalidAction {
                action: ACTION_INVALID,
                address: 0x0100
            }
        ));
    }

    #[test]
    fn test_stray_bytes_before_response_are_skipped() {
        let header = ResponseHeader {
            action: ACTION_READ,
            address: 0x0002,
            rsize: 2,
        };
        let mut answer = vec![0x00, 0xCA, 0x13];
        answer.extend_from_slice(&header.encode());
        answer.extend_from_slice(&[0x55, 0x66]);
        let mut prog = canned(&answer);
        assert_eq!(prog.read(2, 2).unwrap(), vec![0x55, 0x66]);
    }

    #[test]
    fn test_mismatched_address_is_rejected() {
        let header = ResponseHeader {
            action: ACTION_READ,
            address: 0x0003,
            rsize: 0,
        };
        let mut prog = canned(&header.encode());
        assert!(matches!(
            prog.read(0x0002, 0),
            Err(ProgrammerError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_oversized_response_is_rejected() {
        let header = ResponseHeader {
            action: ACTION_READ,
            address: 0,
            rsize: 8,
        };
        let mut prog = canned(&header.encode());
        assert!(matches!(
            prog.read(0, 4),
            Err(ProgrammerError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_write_payload_length_must_match() {
        let mut prog = programmer();
        let err = prog
            .command(&RequestHeader::write(0, 4), &[1, 2])
            .unwrap_err();
        assert!(matches!(err, ProgrammerError::InvalidParameter(_)));
    }

    #[test]
    fn test_blocks_round_trip_with_progress() {
        let mut prog = programmer();
        let data: Vec<u8> = (0..200u32).map(|i| (i * 7) as u8).collect();

        let mut progress = Recorder::default();
        let written = prog.write_blocks(0x80, &data, 64, &mut progress).unwrap();
        assert_eq!(written, 200);
        assert_eq!(progress.total, 200);
        assert_eq!(progress.updates, vec![64, 128, 192, 200]);
        assert!(progress.finished);

        let back = prog.read_blocks(0x80, 200, 50, &mut NoProgress).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_read_blocks_stops_at_capacity() {
        let image: Vec<u8> = (0..2048u32).map(|i| i as u8).collect();
        let mut prog = programmer_with(&image);
        let back = prog.read_blocks(2000, 100, 32, &mut NoProgress).unwrap();
        assert_eq!(back, image[2000..]);
    }

    #[test]
    fn test_write_blocks_stops_at_capacity() {
        let mut prog = programmer();
        let written = prog
            .write_blocks(2040, &[0u8; 20], 4, &mut NoProgress)
            .unwrap();
        assert_eq!(written, 8);
    }

    #[test]
    fn test_zero_block_size_is_rejected() {
        let mut prog = programmer();
        assert!(matches!(
            prog.read_blocks(0, 4, 0, &mut NoProgress),
            Err(ProgrammerError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_smaller_capacity_device() {
        let config = EepromConfig::default().with_capacity(256);
        let eeprom = Eeprom::with_config(DummyEeprom::new_default(), config);
        let mut prog = Programmer::new(LoopbackTransport::new(eeprom));
        assert_eq!(prog.read(250, 16).unwrap().len(), 6);
    }
}
