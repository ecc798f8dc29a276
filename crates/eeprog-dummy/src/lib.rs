//! eeprog-dummy - Emulated EEPROM bus for testing
//!
//! This crate provides a pin-level emulator of the programmer hardware: two
//! cascaded 8-bit shift registers with an output latch, an EEPROM with an
//! active-low output enable fed from register bit 15, an active-low write
//! enable, and a byte array behind it. It implements `EepromPins`, so the
//! byte engine and the protocol engine run against it unmodified. Delays
//! advance a virtual clock instead of sleeping.
//!
//! It also provides [`MemoryChannel`], an in-memory `ByteChannel`.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod channel;

use alloc::vec;
use alloc::vec::Vec;

use eeprog_core::bus::{DataDirection, EepromPins, RegisterWord, DATA_LINES};
use eeprog_core::protocol::EEPROM_SIZE;

pub use channel::MemoryChannel;

/// Configuration for the emulated EEPROM
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Size of the memory array in bytes, clamped to `1..=2048`
    ///
    /// A smaller array ignores the upper address lines, so its contents
    /// repeat across the 2048-byte address space.
    pub size: usize,
    /// Time the device stays busy after a write, in microseconds
    pub write_cycle_us: u64,
    /// Minimum write-enable low time, in microseconds
    pub min_pulse_us: u64,
    /// Contents of a fresh device
    pub fill: u8,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            size: EEPROM_SIZE as usize,
            write_cycle_us: 10_000,
            min_pulse_us: 1,
            fill: 0xFF,
        }
    }
}

/// Bus activity counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Register words latched
    pub register_loads: usize,
    /// Bytes sampled with the EEPROM driving the bus
    pub reads: usize,
    /// Bytes committed to the memory array
    pub writes: usize,
    /// Accesses made while a write cycle was still in progress
    pub busy_violations: usize,
    /// Write pulses ignored because the EEPROM outputs were enabled
    pub inhibited_writes: usize,
    /// Write pulses ignored because they were too short
    pub short_pulses: usize,
}

/// Emulated programmer bus with an attached EEPROM
pub struct DummyEeprom {
    config: DummyConfig,
    data: Vec<u8>,
    shift_data: bool,
    shift_clock: bool,
    shift_latch: bool,
    shift: u16,
    latched: RegisterWord,
    direction: DataDirection,
    bus_out: [bool; DATA_LINES],
    write_enable: bool,
    write_enable_low_since: u64,
    busy_until: u64,
    now_us: u64,
    stats: BusStats,
}

impl DummyEeprom {
    /// Create an emulator with the given configuration
    pub fn new(mut config: DummyConfig) -> Self {
        let size = config.size.clamp(1, EEPROM_SIZE as usize);
        if size != config.size {
            log::warn!(
                "dummy: array size {} out of range, using {}",
                config.size,
                size
            );
            config.size = size;
        }
        let data = vec![config.fill; size];
        Self {
            config,
            data,
            shift_data: false,
            shift_clock: false,
            shift_latch: false,
            shift: 0,
            // Power-on: outputs disabled until the first register load
            latched: RegisterWord::from_raw(0x8000),
            direction: DataDirection::Input,
            bus_out: [false; DATA_LINES],
            write_enable: true,
            write_enable_low_since: 0,
            busy_until: 0,
            now_us: 0,
            stats: BusStats::default(),
        }
    }

    /// Create a 2048-byte emulator with default timing
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create an emulator with pre-filled data
    pub fn with_data(config: DummyConfig, initial_data: &[u8]) -> Self {
        let mut eeprom = Self::new(config);
        let len = core::cmp::min(initial_data.len(), eeprom.data.len());
        eeprom.data[..len].copy_from_slice(&initial_data[..len]);
        eeprom
    }

    /// Get a reference to the memory array
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the memory array
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Bus activity so far
    pub fn stats(&self) -> &BusStats {
        &self.stats
    }

    /// The word currently on the register outputs
    pub fn latched(&self) -> RegisterWord {
        self.latched
    }

    /// Virtual time elapsed through delays, in microseconds
    pub fn elapsed_us(&self) -> u64 {
        self.now_us
    }

    fn cell(&self) -> usize {
        self.latched.address() as usize % self.data.len()
    }

    fn is_busy(&self) -> bool {
        self.now_us < self.busy_until
    }

    fn bus_value(&self) -> u8 {
        self.bus_out
            .iter()
            .enumerate()
            .fold(0u8, |acc, (i, &high)| acc | ((high as u8) << i))
    }

    fn commit_write(&mut self) {
        let pulse = self.now_us - self.write_enable_low_since;
        if self.latched.output_enabled() {
            log::warn!("dummy: write pulse with outputs enabled, ignored");
            self.stats.inhibited_writes += 1;
        } else if pulse < self.config.min_pulse_us {
            log::warn!("dummy: write pulse of {} us too short, ignored", pulse);
            self.stats.short_pulses += 1;
        } else if self.is_busy() {
            log::warn!("dummy: write during write cycle, ignored");
            self.stats.busy_violations += 1;
        } else {
            let cell = self.cell();
            let value = match self.direction {
                DataDirection::Output => self.bus_value(),
                // Nothing drives the bus
                DataDirection::Input => 0xFF,
            };
            log::trace!("dummy: write 0x{:02x} to 0x{:03x}", value, cell);
            self.data[cell] = value;
            self.busy_until = self.now_us + self.config.write_cycle_us;
            self.stats.writes += 1;
        }
    }
}

impl Default for DummyEeprom {
    fn default() -> Self {
        Self::new_default()
    }
}

impl EepromPins for DummyEeprom {
    fn set_shift_data(&mut self, high: bool) {
        self.shift_data = high;
    }

    fn set_shift_clock(&mut self, high: bool) {
        if high && !self.shift_clock {
            self.shift = (self.shift << 1) | self.shift_data as u16;
        }
        self.shift_clock = high;
    }

    fn set_shift_latch(&mut self, high: bool) {
        if high && !self.shift_latch {
            self.latched = RegisterWord::from_raw(self.shift);
            self.stats.register_loads += 1;
        }
        self.shift_latch = high;
    }

    fn set_data_direction(&mut self, direction: DataDirection) {
        self.direction = direction;
    }

    fn set_data_line(&mut self, index: usize, high: bool) {
        if self.direction == DataDirection::Output {
            self.bus_out[index] = high;
        }
    }

    fn get_data_line(&mut self, index: usize) -> bool {
        match self.direction {
            DataDirection::Output => self.bus_out[index],
            DataDirection::Input if self.latched.output_enabled() => {
                if index == 0 {
                    self.stats.reads += 1;
                }
                let mut value = self.data[self.cell()];
                if self.is_busy() {
                    if index == 0 {
                        log::warn!("dummy: read during write cycle");
                        self.stats.busy_violations += 1;
                    }
                    // Data polling: bit 7 reads inverted until the cycle ends
                    value ^= 0x80;
                }
                (value >> index) & 1 != 0
            }
            DataDirection::Input => false,
        }
    }

    fn set_write_enable(&mut self, high: bool) {
        if !high && self.write_enable {
            self.write_enable_low_since = self.now_us;
        } else if high && !self.write_enable {
            self.commit_write();
        }
        self.write_enable = high;
    }

    fn delay_us(&mut self, us: u32) {
        self.now_us += us as u64;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.now_us += ms as u64 * 1000;
    }
}
