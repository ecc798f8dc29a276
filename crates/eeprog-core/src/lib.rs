//! eeprog-core - Core library for parallel EEPROM programming
//!
//! This crate holds everything that runs on the programmer itself: the
//! shift-register address driver, the byte engine that bit-bangs the 8 data
//! lines of a parallel EEPROM, bounded range operations, the framed wire
//! protocol and the request/response engine that serves it. It is `no_std`
//! so the same code can run on a microcontroller, on a Linux board with GPIO
//! access, or against the in-memory emulator used in tests.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`)
//! - `alloc` - Enable heap allocation, required by the protocol engine
//!
//! # Example
//!
//! ```ignore
//! use eeprog_core::eeprom::Eeprom;
//! use eeprog_core::protocol::engine::Engine;
//!
//! fn serve<P: EepromPins, C: ByteChannel>(pins: P, channel: C) -> eeprog_core::Result<()> {
//!     let mut engine = Engine::new(Eeprom::new(pins), channel);
//!     engine.run()
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod bus;
pub mod channel;
pub mod eeprom;
pub mod error;
pub mod protocol;

pub use error::{Error, Result};
