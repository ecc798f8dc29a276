//! EEPROM byte engine and range operations
//!
//! `Eeprom` owns the hardware context and performs single-byte reads and
//! writes through the shift-register address latch. The range operations
//! build on those and enforce the device capacity themselves, independent of
//! any clamping the caller may already have done.

use crate::bus::shift::write_register;
use crate::bus::{DataDirection, EepromPins, RegisterWord};
use crate::protocol::EEPROM_SIZE;

/// Default write-enable low time in microseconds
pub const DEFAULT_WRITE_PULSE_US: u32 = 1;

/// Default write cycle settle time in milliseconds
pub const DEFAULT_WRITE_CYCLE_MS: u32 = 10;

/// Timing and geometry of the attached EEPROM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EepromConfig {
    /// Number of addressable bytes (at most 2048)
    pub capacity: u16,
    /// How long write-enable is held low
    pub write_pulse_us: u32,
    /// Settle time after every byte write before the next access
    pub write_cycle_ms: u32,
}

impl Default for EepromConfig {
    fn default() -> Self {
        Self {
            capacity: EEPROM_SIZE,
            write_pulse_us: DEFAULT_WRITE_PULSE_US,
            write_cycle_ms: DEFAULT_WRITE_CYCLE_MS,
        }
    }
}

impl EepromConfig {
    /// Set the device capacity (clamped to the 11-bit address space)
    pub fn with_capacity(mut self, capacity: u16) -> Self {
        self.capacity = capacity.min(EEPROM_SIZE);
        self
    }

    /// Set the write-enable pulse width
    pub fn with_write_pulse_us(mut self, us: u32) -> Self {
        self.write_pulse_us = us;
        self
    }

    /// Set the write cycle settle time
    pub fn with_write_cycle_ms(mut self, ms: u32) -> Self {
        self.write_cycle_ms = ms;
        self
    }
}

/// A parallel EEPROM behind a shift-register address latch
pub struct Eeprom<P> {
    pins: P,
    config: EepromConfig,
}

impl<P: EepromPins> Eeprom<P> {
    /// Create an EEPROM with default timing (2048 bytes, 1 us pulse, 10 ms cycle)
    pub fn new(pins: P) -> Self {
        Self::with_config(pins, EepromConfig::default())
    }

    /// Create an EEPROM with the given configuration
    pub fn with_config(pins: P, config: EepromConfig) -> Self {
        let config = config.with_capacity(config.capacity);
        Self { pins, config }
    }

    /// Device capacity in bytes
    pub fn capacity(&self) -> u16 {
        self.config.capacity
    }

    /// Get the configuration
    pub fn config(&self) -> &EepromConfig {
        &self.config
    }

    /// Get a reference to the hardware context
    pub fn pins(&self) -> &P {
        &self.pins
    }

    /// Get a mutable reference to the hardware context
    pub fn pins_mut(&mut self) -> &mut P {
        &mut self.pins
    }

    /// Release the hardware context
    pub fn into_pins(self) -> P {
        self.pins
    }

    /// Read a single byte
    ///
    /// The address is taken modulo 2048; staying within capacity is the
    /// caller's responsibility.
    pub fn read_byte(&mut self, address: u16) -> u8 {
        self.pins.set_data_direction(DataDirection::Input);
        write_register(&mut self.pins, RegisterWord::encode(address, true));
        self.pins.get_data_bus()
    }

    /// Write a single byte, including the full write cycle delay
    pub fn write_byte(&mut self, address: u16, value: u8) {
        self.pins.set_data_direction(DataDirection::Output);
        write_register(&mut self.pins, RegisterWord::encode(address, false));
        self.pins.set_data_bus(value);
        self.write_pulse();
    }

    /// Pulse write-enable and wait for the write cycle to complete
    fn write_pulse(&mut self) {
        self.pins.set_write_enable(false);
        self.pins.delay_us(self.config.write_pulse_us);
        self.pins.set_write_enable(true);
        self.pins.delay_ms(self.config.write_cycle_ms);
    }

    /// Number of bytes from `address` that fit in the device, capped at `len`
    fn span(&self, address: u16, len: usize) -> usize {
        let capacity = self.config.capacity as usize;
        let address = address as usize;
        if address >= capacity {
            0
        } else {
            len.min(capacity - address)
        }
    }

    /// Write `data` starting at `address`
    ///
    /// Bytes that would land at or beyond capacity are dropped silently.
    /// Returns the number of bytes written.
    pub fn write_buffer(&mut self, address: u16, data: &[u8]) -> usize {
        let count = self.span(address, data.len());
        for (i, &byte) in data[..count].iter().enumerate() {
            self.write_byte(address + i as u16, byte);
        }
        count
    }

    /// Write `size` copies of `value` starting at `address`
    ///
    /// Same bounds policy as [`write_buffer`](Self::write_buffer).
    pub fn write_fill(&mut self, address: u16, size: usize, value: u8) -> usize {
        let count = self.span(address, size);
        for i in 0..count {
            self.write_byte(address + i as u16, value);
        }
        count
    }

    /// Read up to `size` bytes starting at `address` into `buffer`
    ///
    /// Stops at `size`, at the end of `buffer`, or at device capacity,
    /// whichever comes first. Returns the number of bytes read; an absent
    /// buffer reads nothing and touches no pins.
    pub fn read_range(&mut self, address: u16, size: usize, buffer: Option<&mut [u8]>) -> usize {
        let Some(buffer) = buffer else {
            return 0;
        };
        let count = self.span(address, size.min(buffer.len()));
        for (i, byte) in buffer[..count].iter_mut().enumerate() {
            *byte = self.read_byte(address + i as u16);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        Direction(DataDirection),
        Latch,
        Bus(u8),
        WriteEnable(bool),
        DelayUs(u32),
        Sample,
    }

    /// Logs bus-level events, ignoring individual shift clocks
    struct EventLog {
        events: [Option<Event>; 64],
        len: usize,
        lines: [bool; 8],
        input: u8,
    }

    impl EventLog {
        fn new(input: u8) -> Self {
            Self {
                events: [None; 64],
                len: 0,
                lines: [false; 8],
                input,
            }
        }

        fn push(&mut self, event: Event) {
            self.events[self.len] = Some(event);
            self.len += 1;
        }

        fn events(&self) -> impl Iterator<Item = Event> + '_ {
            self.events[..self.len].iter().flatten().copied()
        }

        fn count(&self, wanted: Event) -> usize {
            self.events().filter(|e| *e == wanted).count()
        }
    }

    impl EepromPins for EventLog {
        fn set_shift_data(&mut self, _high: bool) {}
        fn set_shift_clock(&mut self, _high: bool) {}
        fn set_shift_latch(&mut self, high: bool) {
            if high {
                self.push(Event::Latch);
            }
        }
        fn set_data_direction(&mut self, direction: DataDirection) {
            self.push(Event::Direction(direction));
        }
        fn set_data_line(&mut self, index: usize, high: bool) {
            self.lines[index] = high;
            if index == 7 {
                let value = self
                    .lines
                    .iter()
                    .enumerate()
                    .fold(0u8, |acc, (i, &b)| acc | ((b as u8) << i));
                self.push(Event::Bus(value));
            }
        }
        fn get_data_line(&mut self, index: usize) -> bool {
            if index == 0 {
                self.push(Event::Sample);
            }
            (self.input >> index) & 1 != 0
        }
        fn set_write_enable(&mut self, high: bool) {
            self.push(Event::WriteEnable(high));
        }
        fn delay_us(&mut self, us: u32) {
            self.push(Event::DelayUs(us));
        }
    }

    #[test]
    fn test_read_byte_sequence() {
        let mut eeprom = Eeprom::new(EventLog::new(0b1000_0001));
        assert_eq!(eeprom.read_byte(0x10), 0x81);
        let events: [Event; 3] = [
            Event::Direction(DataDirection::Input),
            Event::Latch,
            Event::Sample,
        ];
        assert!(eeprom.pins().events().eq(events.iter().copied()));
    }

    #[test]
    fn test_write_byte_pulse_and_settle() {
        let config = EepromConfig::default().with_write_cycle_ms(2);
        let mut eeprom = Eeprom::with_config(EventLog::new(0), config);
        eeprom.write_byte(0x10, 0x5A);
        let events: [Event; 8] = [
            Event::Direction(DataDirection::Output),
            Event::Latch,
            Event::Bus(0x5A),
            Event::WriteEnable(false),
            Event::DelayUs(1),
            Event::WriteEnable(true),
            Event::DelayUs(1000),
            Event::DelayUs(1000),
        ];
        assert!(eeprom.pins().events().eq(events.iter().copied()));
    }

    #[test]
    fn test_read_range_without_buffer_touches_nothing() {
        let mut eeprom = Eeprom::new(EventLog::new(0xFF));
        assert_eq!(eeprom.read_range(0, 10, None), 0);
        assert_eq!(eeprom.pins().len, 0);
    }

    #[test]
    fn test_read_range_stops_at_buffer_end() {
        let mut eeprom = Eeprom::new(EventLog::new(0x42));
        let mut buf = [0u8; 3];
        assert_eq!(eeprom.read_range(0, 10, Some(&mut buf)), 3);
        assert_eq!(buf, [0x42; 3]);
        assert_eq!(eeprom.pins().count(Event::Sample), 3);
    }

    #[test]
    fn test_fill_clamps_to_capacity() {
        let config = EepromConfig::default()
            .with_capacity(16)
            .with_write_cycle_ms(0);
        let mut eeprom = Eeprom::with_config(EventLog::new(0), config);
        assert_eq!(eeprom.write_fill(14, 8, 0xEE), 2);
        assert_eq!(eeprom.pins().count(Event::WriteEnable(false)), 2);
        assert_eq!(eeprom.write_fill(16, 8, 0xEE), 0);
    }

    #[test]
    fn test_capacity_limited_to_address_space() {
        let config = EepromConfig::default().with_capacity(4096);
        assert_eq!(config.capacity, EEPROM_SIZE);
        let eeprom = Eeprom::with_config(
            EventLog::new(0),
            EepromConfig {
                capacity: 9999,
                ..Default::default()
            },
        );
        assert_eq!(eeprom.capacity(), EEPROM_SIZE);
    }
}
