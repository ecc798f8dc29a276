//! Address bus and data bus primitives
//!
//! The programmer drives the EEPROM through a pair of cascaded 8-bit shift
//! registers (address lines plus the output-enable control) and 8 directly
//! connected data lines. This module defines the hardware-context trait that
//! backends implement, the 16-bit register word layout, and the serial
//! shift-out routine.

pub mod address;
mod pins;
pub mod shift;

pub use address::{encode, RegisterWord, ADDRESS_MASK, DIRECTION_BIT};
pub use pins::*;
