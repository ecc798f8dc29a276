//! Hardware context trait for the EEPROM bus

/// Number of parallel data lines
pub const DATA_LINES: usize = 8;

/// Direction of the 8 data lines, seen from the programmer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataDirection {
    /// Lines are inputs; the EEPROM drives the bus (read)
    Input,
    /// Lines are outputs; the programmer drives the bus (write)
    Output,
}

/// Low-level pin access for a shift-register addressed parallel EEPROM
///
/// An implementation owns every line of the bus: the serial data, clock and
/// latch lines of the shift registers, the 8 data lines and the active-low
/// write-enable line. Taking it by `&mut self` is what guarantees that only
/// one logical operation drives the bus at a time.
///
/// Pin operations are infallible here. Backends that can fail (for example
/// the Linux GPIO character device) log the error and carry on, the same way
/// a microcontroller `digitalWrite` has no failure path.
pub trait EepromPins {
    /// Set the shift register serial data line
    fn set_shift_data(&mut self, high: bool);

    /// Set the shift register clock line (bits shift in on the rising edge)
    fn set_shift_clock(&mut self, high: bool);

    /// Set the shift register latch line (outputs update on the rising edge)
    fn set_shift_latch(&mut self, high: bool);

    /// Configure all 8 data lines as inputs or outputs
    fn set_data_direction(&mut self, direction: DataDirection);

    /// Drive data line `index` (0..8); only meaningful as an output
    fn set_data_line(&mut self, index: usize, high: bool);

    /// Sample data line `index` (0..8)
    fn get_data_line(&mut self, index: usize) -> bool;

    /// Set the write-enable line (active low)
    fn set_write_enable(&mut self, high: bool);

    /// Busy-wait for `us` microseconds
    fn delay_us(&mut self, us: u32);

    /// Busy-wait for `ms` milliseconds
    fn delay_ms(&mut self, ms: u32) {
        for _ in 0..ms {
            self.delay_us(1000);
        }
    }

    /// Optional: Drive all 8 data lines at once, line `i` from bit `i`
    ///
    /// Default implementation calls `set_data_line` for each line.
    fn set_data_bus(&mut self, value: u8) {
        for i in 0..DATA_LINES {
            self.set_data_line(i, (value >> i) & 1 != 0);
        }
    }

    /// Optional: Sample all 8 data lines at once, line `i` into bit `i`
    ///
    /// Default implementation calls `get_data_line` for each line.
    fn get_data_bus(&mut self) -> u8 {
        let mut value = 0u8;
        for i in 0..DATA_LINES {
            if self.get_data_line(i) {
                value |= 1 << i;
            }
        }
        value
    }
}

macro_rules! forward_pins {
    () => {
        fn set_shift_data(&mut self, high: bool) {
            (**self).set_shift_data(high)
        }

        fn set_shift_clock(&mut self, high: bool) {
            (**self).set_shift_clock(high)
        }

        fn set_shift_latch(&mut self, high: bool) {
            (**self).set_shift_latch(high)
        }

        fn set_data_direction(&mut self, direction: DataDirection) {
            (**self).set_data_direction(direction)
        }

        fn set_data_line(&mut self, index: usize, high: bool) {
            (**self).set_data_line(index, high)
        }

        fn get_data_line(&mut self, index: usize) -> bool {
            (**self).get_data_line(index)
        }

        fn set_write_enable(&mut self, high: bool) {
            (**self).set_write_enable(high)
        }

        fn delay_us(&mut self, us: u32) {
            (**self).delay_us(us)
        }

        fn delay_ms(&mut self, ms: u32) {
            (**self).delay_ms(ms)
        }

        fn set_data_bus(&mut self, value: u8) {
            (**self).set_data_bus(value)
        }

        fn get_data_bus(&mut self) -> u8 {
            (**self).get_data_bus()
        }
    };
}

impl<P: EepromPins + ?Sized> EepromPins for &mut P {
    forward_pins!();
}

#[cfg(feature = "alloc")]
impl<P: EepromPins + ?Sized> EepromPins for alloc::boxed::Box<P> {
    forward_pins!();
}
