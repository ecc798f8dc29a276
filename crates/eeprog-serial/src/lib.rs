//! eeprog-serial - Host side of the eeprog framed protocol
//!
//! This crate talks to a programmer running the eeprog protocol engine,
//! either over a serial port (the usual microcontroller board) or over TCP
//! (an engine served with `eeprog serve --listen`). It also provides an
//! in-process loopback to an emulated device.
//!
//! # Protocol Overview
//!
//! Every request is a 9-byte header (`CA FE BA BE`, action, address and
//! size, big-endian) followed by the payload of a write. The device answers
//! with the same header layout carrying the number of bytes it actually
//! handled, followed by that many payload bytes. Requests past the end of the
//! device are truncated, unknown actions are echoed as `0xFF`.
//!
//! # Supported Transports
//!
//! - Serial port: `dev=/dev/ttyUSB0[:baud]` (115200 8N1 by default)
//! - TCP socket: `ip=host:port`
//! - Emulator: `dummy`
//!
//! # Example
//!
//! ```no_run
//! use eeprog_serial::{Programmer, SerialTransport};
//!
//! let transport = SerialTransport::open("/dev/ttyUSB0", None)?;
//! let mut programmer = Programmer::new(transport);
//! programmer.wait_ready(eeprog_serial::DEFAULT_PROBE_ATTEMPTS)?;
//!
//! let bytes = programmer.read(0x0000, 16)?;
//! println!("{:02x?}", bytes);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod device;
pub mod error;
pub mod transport;

// Re-exports
pub use device::{
    NoProgress, Programmer, Response, TransferProgress, DEFAULT_BLOCK_SIZE,
    DEFAULT_PROBE_ATTEMPTS, DEFAULT_TIMEOUT_MS,
};
pub use error::{ProgrammerError, Result};
pub use transport::loopback::LoopbackTransport;
pub use transport::serial::SerialTransport;
pub use transport::tcp::TcpTransport;
pub use transport::Transport;

use eeprog_core::eeprom::Eeprom;
use eeprog_dummy::DummyEeprom;

/// Connection options for a programmer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgrammerConnection {
    /// Serial port connection
    Serial {
        /// Device path (e.g., "/dev/ttyUSB0" or "COM1")
        device: String,
        /// Baud rate (None for 115200)
        baud: Option<u32>,
    },
    /// TCP socket connection
    Tcp {
        /// Hostname or IP address
        host: String,
        /// Port number
        port: u16,
    },
    /// In-process emulated device
    Dummy {
        /// Image loaded into the emulator before the first request
        image: Option<String>,
    },
}

impl ProgrammerConnection {
    /// Parse a connection string
    ///
    /// Formats:
    /// - `dev=/dev/ttyUSB0` - Serial with default baud
    /// - `dev=/dev/ttyUSB0:115200` - Serial with specified baud
    /// - `ip=host:port` - TCP connection
    /// - `dummy` or `dummy:image=file.bin` - Emulated device
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        if let Some(dev) = s.strip_prefix("dev=") {
            if let Some((device, baud_str)) = dev.rsplit_once(':') {
                let baud = baud_str
                    .parse()
                    .map_err(|_| format!("Invalid baud rate: {}", baud_str))?;
                Ok(ProgrammerConnection::Serial {
                    device: device.to_string(),
                    baud: Some(baud),
                })
            } else {
                Ok(ProgrammerConnection::Serial {
                    device: dev.to_string(),
                    baud: None,
                })
            }
        } else if let Some(ip) = s.strip_prefix("ip=") {
            let (host, port_str) = ip
                .rsplit_once(':')
                .ok_or_else(|| "Missing port in ip= parameter".to_string())?;
            let port = port_str
                .parse()
                .map_err(|_| format!("Invalid port: {}", port_str))?;
            Ok(ProgrammerConnection::Tcp {
                host: host.to_string(),
                port,
            })
        } else if s == "dummy" {
            Ok(ProgrammerConnection::Dummy { image: None })
        } else if let Some(opts) = s.strip_prefix("dummy:") {
            let image = opts
                .strip_prefix("image=")
                .filter(|path| !path.is_empty())
                .ok_or_else(|| format!("Invalid dummy option: {}", opts))?;
            Ok(ProgrammerConnection::Dummy {
                image: Some(image.to_string()),
            })
        } else {
            Err(format!(
                "Invalid programmer connection string: {}. Use dev=..., ip=... or dummy",
                s
            ))
        }
    }
}

/// Open a programmer connection behind a type-erased transport
///
/// The returned client still needs [`Programmer::wait_ready`] before the
/// first request when the device may be resetting.
pub fn open_programmer(
    options: &str,
) -> std::result::Result<Programmer<Box<dyn Transport>>, Box<dyn std::error::Error>> {
    let conn = ProgrammerConnection::parse(options)?;

    let transport: Box<dyn Transport> = match conn {
        ProgrammerConnection::Serial { device, baud } => {
            Box::new(SerialTransport::open(&device, baud)?)
        }
        ProgrammerConnection::Tcp { host, port } => Box::new(TcpTransport::connect(&host, port)?),
        ProgrammerConnection::Dummy { image } => {
            let dummy = match image {
                Some(path) => {
                    let data = std::fs::read(&path)?;
                    log::info!("Loaded {} bytes from {} into emulator", data.len(), path);
                    DummyEeprom::with_data(Default::default(), &data)
                }
                None => DummyEeprom::new_default(),
            };
            Box::new(LoopbackTransport::new(Eeprom::new(dummy)))
        }
    };

    Ok(Programmer::new(transport))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serial() {
        assert_eq!(
            ProgrammerConnection::parse("dev=/dev/ttyUSB0").unwrap(),
            ProgrammerConnection::Serial {
                device: "/dev/ttyUSB0".into(),
                baud: None
            }
        );
        assert_eq!(
            ProgrammerConnection::parse("dev=/dev/ttyACM0:57600").unwrap(),
            ProgrammerConnection::Serial {
                device: "/dev/ttyACM0".into(),
                baud: Some(57600)
            }
        );
        assert!(ProgrammerConnection::parse("dev=/dev/ttyUSB0:fast").is_err());
    }

    #[test]
    fn test_parse_tcp() {
        assert_eq!(
            ProgrammerConnection::parse("ip=localhost:4000").unwrap(),
            ProgrammerConnection::Tcp {
                host: "localhost".into(),
                port: 4000
            }
        );
        assert!(ProgrammerConnection::parse("ip=localhost").is_err());
        assert!(ProgrammerConnection::parse("ip=localhost:99999").is_err());
    }

    #[test]
    fn test_parse_dummy() {
        assert_eq!(
            ProgrammerConnection::parse("dummy").unwrap(),
            ProgrammerConnection::Dummy { image: None }
        );
        assert_eq!(
            ProgrammerConnection::parse("dummy:image=rom.bin").unwrap(),
            ProgrammerConnection::Dummy {
                image: Some("rom.bin".into())
            }
        );
        assert!(ProgrammerConnection::parse("dummy:size=4").is_err());
    }

    #[test]
    fn test_parse_unknown() {
        assert!(ProgrammerConnection::parse("/dev/ttyUSB0").is_err());
    }

    #[test]
    fn test_open_dummy() {
        let mut programmer = open_programmer("dummy").unwrap();
        programmer.wait_ready(1).unwrap();
        assert_eq!(programmer.read(0, 2).unwrap(), vec![0xFF, 0xFF]);
    }
}
