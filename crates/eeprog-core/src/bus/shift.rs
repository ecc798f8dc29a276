//! Serial shift-out to the address registers

use super::address::RegisterWord;
use super::pins::EepromPins;

/// Shift one byte out MSB first
///
/// Each bit is presented on the data line and clocked in with a low-high-low
/// pulse on the clock line.
pub fn shift_out_byte<P: EepromPins + ?Sized>(pins: &mut P, byte: u8) {
    for i in (0..8).rev() {
        pins.set_shift_data((byte >> i) & 1 != 0);
        pins.set_shift_clock(true);
        pins.set_shift_clock(false);
    }
}

/// Load a full register word and latch it onto the register outputs
///
/// The high byte goes out first so that it ends up in the second register
/// of the cascade. Every address-dependent access re-drives the whole word.
pub fn write_register<P: EepromPins + ?Sized>(pins: &mut P, word: RegisterWord) {
    log::trace!("reg_write: {}", word);
    let [high, low] = word.raw().to_be_bytes();
    shift_out_byte(pins, high);
    shift_out_byte(pins, low);
    pins.set_shift_latch(true);
    pins.set_shift_latch(false);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::DataDirection;

    /// Records shift-register activity and reconstructs latched words
    #[derive(Default)]
    struct ShiftRecorder {
        data: bool,
        clock: bool,
        latch: bool,
        shifted: u32,
        clocks: usize,
        latched: [u16; 4],
        latch_count: usize,
    }

    impl EepromPins for ShiftRecorder {
        fn set_shift_data(&mut self, high: bool) {
            self.data = high;
        }
        fn set_shift_clock(&mut self, high: bool) {
            if high && !self.clock {
                self.shifted = (self.shifted << 1) | self.data as u32;
                self.clocks += 1;
            }
            self.clock = high;
        }
        fn set_shift_latch(&mut self, high: bool) {
            if high && !self.latch {
                self.latched[self.latch_count] = self.shifted as u16;
                self.latch_count += 1;
            }
            self.latch = high;
        }
        fn set_data_direction(&mut self, _direction: DataDirection) {}
        fn set_data_line(&mut self, _index: usize, _high: bool) {}
        fn get_data_line(&mut self, _index: usize) -> bool {
            false
        }
        fn set_write_enable(&mut self, _high: bool) {}
        fn delay_us(&mut self, _us: u32) {}
    }

    #[test]
    fn test_write_register_shifts_16_bits_msb_first() {
        let mut pins = ShiftRecorder::default();
        write_register(&mut pins, RegisterWord::from_raw(0x8123));
        assert_eq!(pins.clocks, 16);
        assert_eq!(pins.latch_count, 1);
        assert_eq!(pins.latched[0], 0x8123);
        // Lines are left idle
        assert!(!pins.clock);
        assert!(!pins.latch);
    }

    #[test]
    fn test_each_write_latches_full_word() {
        let mut pins = ShiftRecorder::default();
        write_register(&mut pins, RegisterWord::encode(0x7FF, true));
        write_register(&mut pins, RegisterWord::encode(0x001, false));
        assert_eq!(pins.latched[0], 0x07FF);
        assert_eq!(pins.latched[1], 0x8001);
    }

    #[test]
    fn test_shift_out_byte() {
        let mut pins = ShiftRecorder::default();
        shift_out_byte(&mut pins, 0xA5);
        assert_eq!(pins.clocks, 8);
        assert_eq!(pins.shifted, 0xA5);
        assert_eq!(pins.latch_count, 0);
    }
}
