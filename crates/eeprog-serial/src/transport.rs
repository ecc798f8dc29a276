//! Transport layer abstraction for programmer communication
//!
//! The host client talks to a programmer through [`Transport`]. The serial
//! and TCP transports also implement [`ByteChannel`], which is what lets the
//! `serve` command run the protocol engine on the other end of the same
//! kind of link.

use std::io::ErrorKind;

use eeprog_core::Error as CoreError;

use crate::error::Result;

/// Transport trait for reading and writing bytes
pub trait Transport {
    /// Write bytes to the transport
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Read bytes from the transport
    ///
    /// Reads exactly `buf.len()` bytes into the buffer.
    fn read(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Read with timeout
    ///
    /// Reads up to `buf.len()` bytes, waiting up to `timeout_ms` milliseconds.
    /// Returns the number of bytes read, or 0 on timeout.
    fn read_nonblock(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize>;

    /// Flush any buffered data
    fn flush(&mut self) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        (**self).read(buf)
    }

    fn read_nonblock(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize> {
        (**self).read_nonblock(buf, timeout_ms)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Map an I/O error seen by the engine side onto the core error type
fn channel_error(e: std::io::Error) -> CoreError {
    match e.kind() {
        ErrorKind::UnexpectedEof
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe
        | ErrorKind::NotConnected => CoreError::Disconnected,
        _ => {
            log::debug!("channel I/O error: {}", e);
            CoreError::IoError
        }
    }
}

/// Poll delay used by the engine while waiting for input
const IDLE_POLL_MS: u64 = 1;

pub mod serial {
    //! Serial port transport implementation

    use super::*;
    use eeprog_core::channel::ByteChannel;
    use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
    use std::io::{Read, Write};
    use std::time::Duration;

    use crate::error::ProgrammerError;

    /// Default line rate of the programmer firmware
    pub const DEFAULT_BAUD: u32 = 115_200;

    /// Serial port transport, 8N1 without flow control
    pub struct SerialTransport {
        port: Box<dyn SerialPort>,
    }

    impl SerialTransport {
        /// Open a serial port with the specified baud rate
        ///
        /// `None` selects [`DEFAULT_BAUD`].
        pub fn open(device: &str, baud: Option<u32>) -> Result<Self> {
            let baud_rate = baud.unwrap_or(DEFAULT_BAUD);

            let port = serialport::new(device, baud_rate)
                .data_bits(DataBits::Eight)
                .parity(Parity::None)
                .stop_bits(StopBits::One)
                .flow_control(FlowControl::None)
                .timeout(Duration::from_secs(5))
                .open()?;

            log::info!("Opened serial port {} at {} baud", device, baud_rate);

            Ok(Self { port })
        }

        /// Set the read timeout
        pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
            self.port.set_timeout(timeout)?;
            Ok(())
        }
    }

    impl Transport for SerialTransport {
        fn write(&mut self, data: &[u8]) -> Result<()> {
            self.port.write_all(data)?;
            Ok(())
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<()> {
            self.port.read_exact(buf)?;
            Ok(())
        }

        fn read_nonblock(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize> {
            let old_timeout = self.port.timeout();
            self.port
                .set_timeout(Duration::from_millis(timeout_ms as u64))?;

            let result = match self.port.read(buf) {
                Ok(n) => Ok(n),
                Err(e) if e.kind() == ErrorKind::TimedOut => Ok(0),
                Err(e) => Err(ProgrammerError::from(e)),
            };

            self.port.set_timeout(old_timeout)?;
            result
        }

        fn flush(&mut self) -> Result<()> {
            self.port.flush()?;
            Ok(())
        }
    }

    impl ByteChannel for SerialTransport {
        fn available(&mut self) -> eeprog_core::Result<usize> {
            match self.port.bytes_to_read() {
                Ok(n) => Ok(n as usize),
                Err(e) => {
                    log::error!("serial: failed to query input queue: {}", e);
                    Err(CoreError::IoError)
                }
            }
        }

        fn read_byte(&mut self) -> eeprog_core::Result<u8> {
            let mut byte = [0u8; 1];
            self.port.read_exact(&mut byte).map_err(channel_error)?;
            Ok(byte[0])
        }

        fn write_byte(&mut self, byte: u8) -> eeprog_core::Result<()> {
            self.port.write_all(&[byte]).map_err(channel_error)
        }

        fn write_all(&mut self, data: &[u8]) -> eeprog_core::Result<()> {
            self.port.write_all(data).map_err(channel_error)
        }

        fn flush(&mut self) -> eeprog_core::Result<()> {
            self.port.flush().map_err(channel_error)
        }

        fn idle(&mut self) {
            std::thread::sleep(Duration::from_millis(IDLE_POLL_MS));
        }
    }
}

pub mod tcp {
    //! TCP socket transport implementation

    use super::*;
    use eeprog_core::channel::ByteChannel;
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::time::Duration;

    use crate::error::ProgrammerError;

    const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(5);
    const PEEK_LEN: usize = 256;

    /// TCP socket transport
    pub struct TcpTransport {
        stream: TcpStream,
        peek_buf: [u8; PEEK_LEN],
    }

    impl TcpTransport {
        /// Connect to a programmer served at the specified host and port
        pub fn connect(host: &str, port: u16) -> Result<Self> {
            let addr = format!("{}:{}", host, port);
            log::info!("Connecting to programmer at {}", addr);

            let stream = TcpStream::connect(&addr)
                .map_err(|e| ProgrammerError::ConnectionFailed(e.to_string()))?;

            stream
                .set_read_timeout(Some(DEFAULT_IO_TIMEOUT))
                .map_err(|e| {
                    ProgrammerError::ConnectionFailed(format!("Failed to set read timeout: {}", e))
                })?;
            stream
                .set_write_timeout(Some(DEFAULT_IO_TIMEOUT))
                .map_err(|e| {
                    ProgrammerError::ConnectionFailed(format!(
                        "Failed to set write timeout: {}",
                        e
                    ))
                })?;

            let transport = Self::from_stream(stream)?;
            log::info!("Connected to programmer at {}", addr);
            Ok(transport)
        }

        /// Wrap an accepted stream
        pub fn from_stream(stream: TcpStream) -> Result<Self> {
            // Frames are small; don't let Nagle hold them back
            stream.set_nodelay(true).map_err(|e| {
                ProgrammerError::ConnectionFailed(format!("Failed to set TCP_NODELAY: {}", e))
            })?;
            Ok(Self {
                stream,
                peek_buf: [0; PEEK_LEN],
            })
        }

        /// Address of the remote end
        pub fn peer_addr(&self) -> Option<std::net::SocketAddr> {
            self.stream.peer_addr().ok()
        }
    }

    impl Transport for TcpTransport {
        fn write(&mut self, data: &[u8]) -> Result<()> {
            self.stream.write_all(data)?;
            Ok(())
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<()> {
            self.stream.read_exact(buf)?;
            Ok(())
        }

        fn read_nonblock(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize> {
            // A zero duration is rejected by set_read_timeout
            let timeout = Duration::from_millis(timeout_ms.max(1) as u64);
            self.stream.set_read_timeout(Some(timeout))?;

            let result = match self.stream.read(buf) {
                Ok(0) => Err(ProgrammerError::ConnectionFailed(
                    "connection closed by peer".into(),
                )),
                Ok(n) => Ok(n),
                Err(e) if e.kind() == ErrorKind::TimedOut => Ok(0),
                Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(0),
                Err(e) => Err(ProgrammerError::from(e)),
            };

            self.stream.set_read_timeout(Some(DEFAULT_IO_TIMEOUT))?;
            result
        }

        fn flush(&mut self) -> Result<()> {
            self.stream.flush()?;
            Ok(())
        }
    }

    impl ByteChannel for TcpTransport {
        fn available(&mut self) -> eeprog_core::Result<usize> {
            self.stream.set_nonblocking(true).map_err(channel_error)?;
            let peeked = self.stream.peek(&mut self.peek_buf);
            self.stream.set_nonblocking(false).map_err(channel_error)?;

            match peeked {
                Ok(0) => Err(CoreError::Disconnected),
                Ok(n) => Ok(n),
                Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(0),
                Err(e) => Err(channel_error(e)),
            }
        }

        fn read_byte(&mut self) -> eeprog_core::Result<u8> {
            let mut byte = [0u8; 1];
            self.stream.read_exact(&mut byte).map_err(channel_error)?;
            Ok(byte[0])
        }

        fn write_byte(&mut self, byte: u8) -> eeprog_core::Result<()> {
            self.stream.write_all(&[byte]).map_err(channel_error)
        }

        fn write_all(&mut self, data: &[u8]) -> eeprog_core::Result<()> {
            self.stream.write_all(data).map_err(channel_error)
        }

        fn flush(&mut self) -> eeprog_core::Result<()> {
            self.stream.flush().map_err(channel_error)
        }

        fn idle(&mut self) {
            std::thread::sleep(Duration::from_millis(IDLE_POLL_MS));
        }
    }
}

pub mod loopback {
    //! In-process transport that runs the protocol engine directly
    //!
    //! Every write is handed to an [`Engine`] whose cycles run until the
    //! written bytes are consumed; responses queue up for the next read.
    //! Writes must carry whole request frames.

    use super::*;
    use eeprog_core::bus::EepromPins;
    use eeprog_core::eeprom::Eeprom;
    use eeprog_core::protocol::engine::Engine;
    use eeprog_dummy::MemoryChannel;
    use std::collections::VecDeque;
    use std::time::Duration;

    use crate::error::ProgrammerError;

    /// Transport backed by a local engine instance
    pub struct LoopbackTransport<P> {
        engine: Engine<P, MemoryChannel>,
        rx: VecDeque<u8>,
    }

    impl<P: EepromPins> LoopbackTransport<P> {
        /// Serve `eeprom` through an in-memory engine
        pub fn new(eeprom: Eeprom<P>) -> Self {
            let mut channel = MemoryChannel::new();
            // Closed so an incomplete frame ends the cycle instead of blocking
            channel.close();
            Self {
                engine: Engine::new(eeprom, channel),
                rx: VecDeque::new(),
            }
        }

        /// Queue raw bytes as if the device had sent them
        pub fn inject_response(&mut self, bytes: &[u8]) {
            self.rx.extend(bytes.iter().copied());
        }

        /// The engine behind this transport
        pub fn engine(&self) -> &Engine<P, MemoryChannel> {
            &self.engine
        }

        /// Mutable access to the engine behind this transport
        pub fn engine_mut(&mut self) -> &mut Engine<P, MemoryChannel> {
            &mut self.engine
        }

        fn pump(&mut self) -> Result<()> {
            while self.engine.channel_mut().pending() > 0 {
                match self.engine.run_cycle() {
                    Ok(_) => {}
                    Err(CoreError::Disconnected) => {
                        log::debug!("loopback: dropped incomplete frame");
                        break;
                    }
                    Err(e) => return Err(ProgrammerError::Protocol(e)),
                }
            }
            let output = self.engine.channel_mut().take_output();
            self.rx.extend(output);
            Ok(())
        }
    }

    impl<P: EepromPins> Transport for LoopbackTransport<P> {
        fn write(&mut self, data: &[u8]) -> Result<()> {
            self.engine.channel_mut().push_input(data);
            self.pump()
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<()> {
            if self.rx.len() < buf.len() {
                return Err(ProgrammerError::Timeout);
            }
            for byte in buf.iter_mut() {
                *byte = self.rx.pop_front().unwrap_or_default();
            }
            Ok(())
        }

        fn read_nonblock(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize> {
            if self.rx.is_empty() {
                std::thread::sleep(Duration::from_millis(timeout_ms.min(1) as u64));
                return Ok(0);
            }
            let n = buf.len().min(self.rx.len());
            for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
                *slot = byte;
            }
            Ok(n)
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
    }
}
