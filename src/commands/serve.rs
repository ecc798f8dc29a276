//! Serve command implementation
//!
//! Runs the protocol engine on this machine, with a backend driving the
//! EEPROM bus and a serial port or TCP socket as the host link.

use crate::backends::open_backend;
use eeprog_core::bus::EepromPins;
use eeprog_core::channel::ByteChannel;
use eeprog_core::eeprom::Eeprom;
use eeprog_core::protocol::engine::Engine;
use eeprog_core::Error as CoreError;
use eeprog_serial::{ProgrammerConnection, SerialTransport, TcpTransport};
use std::net::TcpListener;

/// Run the serve command
pub fn run_serve(
    serial: Option<&str>,
    listen: Option<&str>,
    backend: &str,
    payload_limit: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let pins = open_backend(backend)?;
    let mut eeprom = Eeprom::new(pins);
    log::info!(
        "Serving {} byte EEPROM from backend {}",
        eeprom.capacity(),
        backend
    );

    match (serial, listen) {
        (Some(conn), None) => {
            let (device, baud) = match ProgrammerConnection::parse(conn)? {
                ProgrammerConnection::Serial { device, baud } => (device, baud),
                _ => return Err(format!("--serial expects dev=<port>[:baud], got {}", conn).into()),
            };
            let transport = SerialTransport::open(&device, baud)?;
            let (_, result) = session(eeprom, transport, payload_limit);
            Err(format!("Serial session ended: {}", result).into())
        }
        (None, Some(addr)) => {
            let listener = TcpListener::bind(addr)?;
            log::info!("Listening on {}", listener.local_addr()?);
            for stream in listener.incoming() {
                let stream = match stream {
                    Ok(stream) => stream,
                    Err(e) => {
                        log::warn!("Failed to accept connection: {}", e);
                        continue;
                    }
                };
                let transport = TcpTransport::from_stream(stream)?;
                let peer = transport
                    .peer_addr()
                    .map(|a| a.to_string())
                    .unwrap_or_else(|| "unknown peer".into());
                log::info!("Client {} connected", peer);

                let (released, result) = session(eeprom, transport, payload_limit);
                eeprom = released;
                match result {
                    CoreError::Disconnected => log::info!("Client {} disconnected", peer),
                    e => log::warn!("Client {} dropped: {}", peer, e),
                }
            }
            Ok(())
        }
        _ => Err("Exactly one of --serial or --listen must be given".into()),
    }
}

/// Serve requests over `channel` until it fails, then hand the EEPROM back
fn session<P: EepromPins, C: ByteChannel>(
    eeprom: Eeprom<P>,
    channel: C,
    payload_limit: Option<usize>,
) -> (Eeprom<P>, CoreError) {
    let mut engine = Engine::new(eeprom, channel);
    if let Some(limit) = payload_limit {
        engine = engine.with_payload_limit(limit);
    }

    let error = match engine.run() {
        Ok(()) => CoreError::Disconnected,
        Err(e) => e,
    };
    let stats = *engine.stats();
    log::info!(
        "Session: {} requests ({} reads, {} writes, {} invalid, {} dropped), {} bytes read, {} bytes written",
        stats.cycles,
        stats.reads,
        stats.writes,
        stats.invalid,
        stats.aborted,
        stats.bytes_read,
        stats.bytes_written
    );

    let (eeprom, _) = engine.into_parts();
    (eeprom, error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eeprog_core::protocol::RequestHeader;
    use eeprog_dummy::{DummyEeprom, MemoryChannel};

    #[test]
    fn test_session_returns_eeprom_after_disconnect() {
        let mut input = RequestHeader::write(0x0005, 2).encode().to_vec();
        input.extend_from_slice(&[0x12, 0x34]);
        let mut channel = MemoryChannel::with_input(&input);
        channel.close();

        let eeprom = Eeprom::new(DummyEeprom::new_default());
        let (eeprom, error) = session(eeprom, &mut channel, None);
        assert_eq!(error, CoreError::Disconnected);
        assert_eq!(&eeprom.pins().data()[5..7], &[0x12, 0x34]);
        assert!(!channel.output().is_empty());
    }

    #[test]
    fn test_session_with_payload_limit() {
        let mut channel = MemoryChannel::with_input(&RequestHeader::read(0, 64).encode());
        channel.close();

        let eeprom = Eeprom::new(DummyEeprom::new_default());
        let (_, error) = session(eeprom, &mut channel, Some(16));
        assert_eq!(error, CoreError::Disconnected);
        assert!(channel.output().is_empty());
    }
}
