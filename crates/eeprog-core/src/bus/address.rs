//! Shift register word layout
//!
//! ```text
//!  15   14..11   10..0
//! [OE#] [unused] [address]
//! ```
//!
//! Bit 15 feeds the EEPROM's active-low output enable: 0 lets the EEPROM
//! drive the data bus (a read), 1 keeps its outputs off so the programmer
//! can drive the bus (a write).

use core::fmt;

/// Mask of the 11 address bits
pub const ADDRESS_MASK: u16 = 0x07FF;

/// Direction/output-enable bit
pub const DIRECTION_BIT: u16 = 1 << 15;

/// A 16-bit value to be shifted into the address registers
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterWord(u16);

impl RegisterWord {
    /// Build the register word for `address`
    ///
    /// `output_enabled` means the EEPROM drives the data bus (a host read),
    /// which clears the direction bit. The address is reduced modulo 2048.
    pub const fn encode(address: u16, output_enabled: bool) -> Self {
        let direction = if output_enabled { 0 } else { DIRECTION_BIT };
        Self(direction | (address & ADDRESS_MASK))
    }

    /// Wrap a raw register value
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// The raw 16-bit value
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// The 11-bit address carried by this word
    pub const fn address(self) -> u16 {
        self.0 & ADDRESS_MASK
    }

    /// Whether the EEPROM outputs are enabled (direction bit clear)
    pub const fn output_enabled(self) -> bool {
        self.0 & DIRECTION_BIT == 0
    }
}

impl fmt::Display for RegisterWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}", self.0)
    }
}

impl fmt::Debug for RegisterWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:04x} (address: 0x{:03x}, {})",
            self.0,
            self.address(),
            if self.output_enabled() { "OE" } else { "WR" }
        )
    }
}

impl From<RegisterWord> for u16 {
    fn from(word: RegisterWord) -> Self {
        word.0
    }
}

/// Encode `address` and the bus direction into a raw register value
pub const fn encode(address: u16, output_enabled: bool) -> u16 {
    RegisterWord::encode(address, output_enabled).raw()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_clears_direction_bit() {
        for address in [0u16, 1, 0x3FF, 0x7FF, 0x800, 0xFFFF] {
            assert_eq!(encode(address, true) & DIRECTION_BIT, 0);
            assert_eq!(encode(address, false) & DIRECTION_BIT, DIRECTION_BIT);
        }
    }

    #[test]
    fn test_unused_bits_are_zero() {
        for address in (0..=u16::MAX).step_by(97) {
            assert_eq!(encode(address, true) & 0x7800, 0);
            assert_eq!(encode(address, false) & 0x7800, 0);
        }
    }

    #[test]
    fn test_address_wraps_at_2048() {
        assert_eq!(encode(2048, true), 0x0000);
        assert_eq!(encode(2049, true), 0x0001);
        assert_eq!(encode(0x1234, false), 0x8000 | (0x1234 % 2048));
        assert_eq!(RegisterWord::encode(0x7FF, false).raw(), 0x87FF);
    }

    #[test]
    fn test_accessors() {
        let word = RegisterWord::encode(0x0123, false);
        assert_eq!(word.address(), 0x0123);
        assert!(!word.output_enabled());
        assert!(RegisterWord::from_raw(0x0123).output_enabled());
        assert_eq!(u16::from(word), 0x8123);
    }
}
