//! Wire protocol constants and frame codecs
//!
//! All multi-byte integers are big-endian.
//!
//! ```text
//! request:  [CA FE BA BE] [action:u8] [address:u16] [size:u16]  [payload: size bytes, writes only]
//! response: [CA FE BA BE] [action:u8] [address:u16] [rsize:u16] [payload: rsize bytes]
//! ```

#[cfg(feature = "alloc")]
pub mod engine;

use crate::error::{Error, Result};

/// Frame start marker
pub const HEADER_MAGIC: u32 = 0xCAFE_BABE;

/// Length of the magic marker in bytes
pub const MAGIC_LEN: usize = 4;

/// Bytes following the magic marker: action, address, size
pub const FIELDS_LEN: usize = 5;

/// Full frame header length (magic + fields)
pub const FRAME_HEADER_LEN: usize = MAGIC_LEN + FIELDS_LEN;

/// Read action
pub const ACTION_READ: u8 = 0x00;
/// Write action
pub const ACTION_WRITE: u8 = 0x01;
/// Action reported back for any unrecognised request action
pub const ACTION_INVALID: u8 = 0xFF;

/// Capacity of the supported EEPROM (11 address bits)
pub const EEPROM_SIZE: u16 = 2048;

/// Decoded request action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Read bytes from the device
    Read,
    /// Write the request payload to the device
    Write,
    /// Anything else; answered with `ACTION_INVALID`
    Invalid(u8),
}

impl Action {
    /// Decode an action byte
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            ACTION_READ => Self::Read,
            ACTION_WRITE => Self::Write,
            other => Self::Invalid(other),
        }
    }

    /// The action byte as sent in a request
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Read => ACTION_READ,
            Self::Write => ACTION_WRITE,
            Self::Invalid(byte) => byte,
        }
    }

    /// The action byte to report in the response
    pub fn resolved(self) -> u8 {
        match self {
            Self::Invalid(_) => ACTION_INVALID,
            other => other.as_byte(),
        }
    }
}

/// Number of bytes of a `size`-byte access at `address` that fit in `capacity`
///
/// An address at or past the end of the device yields 0.
pub fn clamp_size(address: u16, size: u16, capacity: u16) -> u16 {
    if address >= capacity {
        0
    } else if address as u32 + size as u32 > capacity as u32 {
        capacity - address
    } else {
        size
    }
}

/// Sliding-window matcher for the 4-byte magic marker
///
/// Bytes are shifted into a 32-bit accumulator, so a match is found at any
/// byte offset and garbage before the marker is skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct MagicScanner {
    window: u32,
}

impl MagicScanner {
    /// Create a scanner with an empty window
    pub const fn new() -> Self {
        Self { window: 0 }
    }

    /// Shift in a byte; returns true when the window holds the magic marker
    pub fn push(&mut self, byte: u8) -> bool {
        self.window = (self.window << 8) | byte as u32;
        self.window == HEADER_MAGIC
    }

    /// Clear the window
    pub fn reset(&mut self) {
        self.window = 0;
    }
}

fn encode_frame(action: u8, address: u16, size: u16) -> [u8; FRAME_HEADER_LEN] {
    let mut frame = [0u8; FRAME_HEADER_LEN];
    frame[..MAGIC_LEN].copy_from_slice(&HEADER_MAGIC.to_be_bytes());
    frame[4] = action;
    frame[5..7].copy_from_slice(&address.to_be_bytes());
    frame[7..9].copy_from_slice(&size.to_be_bytes());
    frame
}

fn decode_frame(frame: &[u8]) -> Result<(u8, u16, u16)> {
    if frame.len() < FRAME_HEADER_LEN {
        return Err(Error::BufferTooSmall);
    }
    if frame[..MAGIC_LEN] != HEADER_MAGIC.to_be_bytes() {
        return Err(Error::InvalidHeader);
    }
    Ok(decode_fields(&[frame[4], frame[5], frame[6], frame[7], frame[8]]))
}

/// Decode the 5 bytes following the magic marker into (action, address, size)
pub fn decode_fields(fields: &[u8; FIELDS_LEN]) -> (u8, u16, u16) {
    (
        fields[0],
        u16::from_be_bytes([fields[1], fields[2]]),
        u16::from_be_bytes([fields[3], fields[4]]),
    )
}

/// Request frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    /// Raw action byte
    pub action: u8,
    /// Start address (only the low 11 bits address the device)
    pub address: u16,
    /// Requested byte count
    pub size: u16,
}

impl RequestHeader {
    /// Build a read request
    pub fn read(address: u16, size: u16) -> Self {
        Self {
            action: ACTION_READ,
            address,
            size,
        }
    }

    /// Build a write request; the payload of `size` bytes follows the header
    pub fn write(address: u16, size: u16) -> Self {
        Self {
            action: ACTION_WRITE,
            address,
            size,
        }
    }

    /// Decoded action
    pub fn action(&self) -> Action {
        Action::from_byte(self.action)
    }

    /// Encode as a 9-byte frame header
    pub fn encode(&self) -> [u8; FRAME_HEADER_LEN] {
        encode_frame(self.action, self.address, self.size)
    }

    /// Decode a 9-byte frame header
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let (action, address, size) = decode_frame(frame)?;
        Ok(Self {
            action,
            address,
            size,
        })
    }
}

/// Response frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    /// Resolved action (`ACTION_INVALID` if the request action was unknown)
    pub action: u8,
    /// Request address, echoed unclamped
    pub address: u16,
    /// Clamped size; this many payload bytes follow
    pub rsize: u16,
}

impl ResponseHeader {
    /// Build the response header for `request` against a device of `capacity` bytes
    pub fn for_request(request: &RequestHeader, capacity: u16) -> Self {
        Self {
            action: request.action().resolved(),
            address: request.address,
            rsize: clamp_size(request.address, request.size, capacity),
        }
    }

    /// Whether the device rejected the action
    pub fn is_invalid(&self) -> bool {
        self.action == ACTION_INVALID
    }

    /// Encode as a 9-byte frame header
    pub fn encode(&self) -> [u8; FRAME_HEADER_LEN] {
        encode_frame(self.action, self.address, self.rsize)
    }

    /// Decode a 9-byte frame header
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let (action, address, rsize) = decode_frame(frame)?;
        Ok(Self {
            action,
            address,
            rsize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_size() {
        assert_eq!(clamp_size(0, 4, EEPROM_SIZE), 4);
        assert_eq!(clamp_size(2000, 100, EEPROM_SIZE), 48);
        assert_eq!(clamp_size(2040, 16, EEPROM_SIZE), 8);
        assert_eq!(clamp_size(2047, 1, EEPROM_SIZE), 1);
        assert_eq!(clamp_size(0, 0, EEPROM_SIZE), 0);
        assert_eq!(clamp_size(0, u16::MAX, EEPROM_SIZE), EEPROM_SIZE);
    }

    #[test]
    fn test_clamp_size_past_end_is_zero() {
        assert_eq!(clamp_size(2048, 4, EEPROM_SIZE), 0);
        assert_eq!(clamp_size(3000, 4, EEPROM_SIZE), 0);
        assert_eq!(clamp_size(u16::MAX, u16::MAX, EEPROM_SIZE), 0);
    }

    #[test]
    fn test_request_encoding() {
        let frame = RequestHeader::read(0, 4).encode();
        assert_eq!(frame, [0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x00, 0x00, 0x00, 0x04]);

        let frame = RequestHeader::write(0x07F8, 0x0102).encode();
        assert_eq!(frame, [0xCA, 0xFE, 0xBA, 0xBE, 0x01, 0x07, 0xF8, 0x01, 0x02]);
    }

    #[test]
    fn test_response_decoding() {
        let frame = [0xCA, 0xFE, 0xBA, 0xBE, 0xFF, 0x12, 0x34, 0x00, 0x08];
        let header = ResponseHeader::decode(&frame).unwrap();
        assert!(header.is_invalid());
        assert_eq!(header.address, 0x1234);
        assert_eq!(header.rsize, 8);
    }

    #[test]
    fn test_decode_rejects_bad_magic() {
        let frame = [0xCA, 0xFE, 0xBA, 0xBF, 0x00, 0x00, 0x00, 0x00, 0x04];
        assert_eq!(RequestHeader::decode(&frame), Err(Error::InvalidHeader));
        assert_eq!(
            RequestHeader::decode(&frame[..5]),
            Err(Error::BufferTooSmall)
        );
    }

    #[test]
    fn test_response_for_invalid_action() {
        let request = RequestHeader {
            action: 2,
            address: 0,
            size: 4,
        };
        let response = ResponseHeader::for_request(&request, EEPROM_SIZE);
        assert_eq!(response.action, ACTION_INVALID);
        assert_eq!(response.rsize, 4);
        assert_eq!(request.action(), Action::Invalid(2));
    }

    #[test]
    fn test_magic_scanner_skips_garbage() {
        let mut scanner = MagicScanner::new();
        let stream = [0x00, 0xCA, 0xCA, 0xFE, 0xBA, 0x13, 0xCA, 0xFE, 0xBA, 0xBE];
        let hits: usize = stream.iter().filter(|&&b| scanner.push(b)).count();
        assert_eq!(hits, 1);
        assert!(!scanner.push(0xCA));
    }

    #[test]
    fn test_action_bytes() {
        assert_eq!(Action::from_byte(0), Action::Read);
        assert_eq!(Action::from_byte(1), Action::Write);
        assert_eq!(Action::Write.resolved(), ACTION_WRITE);
        assert_eq!(Action::Invalid(7).as_byte(), 7);
        assert_eq!(Action::Invalid(7).resolved(), ACTION_INVALID);
    }
}
