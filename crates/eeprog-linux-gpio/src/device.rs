//! Linux GPIO pin driver
//!
//! Drives the shift-register lines, the 8 EEPROM data lines and the write
//! enable strobe through the GPIO character device. All lines live in one
//! request; switching the data bus direction reconfigures the whole request
//! with the last driven level of every output, so the control lines never
//! glitch (write enable in particular stays high).

use crate::error::{LinuxGpioError, Result};

use gpiocdev::line::{Offset, Value};
use gpiocdev::request::{Config, Request};

use eeprog_core::bus::{DataDirection, EepromPins, DATA_LINES};

/// Indices into the line table
#[derive(Debug, Clone, Copy)]
enum Line {
    Ser = 0,
    Clk = 1,
    Latch = 2,
    We = 3,
}

/// Index of data line 0; data line `n` sits at `IO_BASE + n`
const IO_BASE: usize = 4;

/// Total number of GPIO lines used
const LINE_COUNT: usize = IO_BASE + DATA_LINES;

/// Configuration for opening the GPIO backend
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinuxGpioConfig {
    /// Device path (e.g., "/dev/gpiochip0")
    pub device: String,
    /// Shift register serial data
    pub ser: Offset,
    /// Shift register clock
    pub clk: Offset,
    /// Shift register latch
    pub latch: Offset,
    /// EEPROM write enable (active low)
    pub we: Offset,
    /// EEPROM data lines D0..D7
    pub io: [Offset; DATA_LINES],
}

impl LinuxGpioConfig {
    /// Create a configuration with every line given explicitly
    pub fn new(
        device: impl Into<String>,
        ser: Offset,
        clk: Offset,
        latch: Offset,
        we: Offset,
        io: [Offset; DATA_LINES],
    ) -> Self {
        Self {
            device: device.into(),
            ser,
            clk,
            latch,
            we,
            io,
        }
    }

    fn offsets(&self) -> [Offset; LINE_COUNT] {
        let mut offsets = [0; LINE_COUNT];
        offsets[Line::Ser as usize] = self.ser;
        offsets[Line::Clk as usize] = self.clk;
        offsets[Line::Latch as usize] = self.latch;
        offsets[Line::We as usize] = self.we;
        offsets[IO_BASE..].copy_from_slice(&self.io);
        offsets
    }

    /// Check that a device is set and no line is used twice
    pub fn validate(&self) -> Result<()> {
        if self.device.is_empty() {
            return Err(LinuxGpioError::NoDevice);
        }
        let offsets = self.offsets();
        for (i, offset) in offsets.iter().enumerate() {
            if offsets[..i].contains(offset) {
                return Err(LinuxGpioError::DuplicateLine(*offset));
            }
        }
        Ok(())
    }
}

fn level(high: bool) -> Value {
    if high {
        Value::Active
    } else {
        Value::Inactive
    }
}

/// EEPROM programmer bus on Linux GPIO lines
pub struct LinuxGpioPins {
    /// GPIO line request handle
    request: Request,
    /// GPIO line offsets indexed by `Line` / `IO_BASE + n`
    offsets: [Offset; LINE_COUNT],
    /// Last level driven on each line
    levels: [bool; LINE_COUNT],
    /// Current direction of the data lines
    direction: DataDirection,
}

impl LinuxGpioPins {
    /// Request all lines of `config`
    ///
    /// Control lines start low except write enable, which starts high
    /// (inactive). Data lines start as inputs.
    pub fn open(config: &LinuxGpioConfig) -> Result<Self> {
        config.validate()?;

        log::debug!("linux_gpio: Opening device {}", config.device);

        let offsets = config.offsets();
        let mut levels = [false; LINE_COUNT];
        levels[Line::We as usize] = true;

        let req_config = Self::line_config(&offsets, &levels, DataDirection::Input);
        let request = Request::from_config(req_config)
            .on_chip(&config.device)
            .with_consumer("eeprog")
            .request()
            .map_err(LinuxGpioError::LineRequestFailed)?;

        log::info!(
            "linux_gpio: Opened {} (ser={}, clk={}, latch={}, we={}, io={:?})",
            config.device,
            config.ser,
            config.clk,
            config.latch,
            config.we,
            config.io
        );

        Ok(Self {
            request,
            offsets,
            levels,
            direction: DataDirection::Input,
        })
    }

    fn line_config(
        offsets: &[Offset; LINE_COUNT],
        levels: &[bool; LINE_COUNT],
        direction: DataDirection,
    ) -> Config {
        let mut cfg = Config::default();
        for (i, &offset) in offsets.iter().enumerate() {
            if i < IO_BASE || direction == DataDirection::Output {
                cfg.with_line(offset).as_output(level(levels[i]));
            } else {
                cfg.with_line(offset).as_input();
            }
        }
        cfg
    }

    fn drive(&mut self, line: usize, high: bool) {
        self.levels[line] = high;
        if let Err(e) = self.request.set_value(self.offsets[line], level(high)) {
            log::error!("Failed to set GPIO {}: {}", self.offsets[line], e);
        }
    }
}

impl EepromPins for LinuxGpioPins {
    fn set_shift_data(&mut self, high: bool) {
        self.drive(Line::Ser as usize, high);
    }

    fn set_shift_clock(&mut self, high: bool) {
        self.drive(Line::Clk as usize, high);
    }

    fn set_shift_latch(&mut self, high: bool) {
        self.drive(Line::Latch as usize, high);
    }

    fn set_data_direction(&mut self, direction: DataDirection) {
        if self.direction == direction {
            return;
        }
        let cfg = Self::line_config(&self.offsets, &self.levels, direction);
        if let Err(e) = self.request.reconfigure(&cfg) {
            log::error!("Failed to switch data lines to {:?}: {}", direction, e);
        }
        self.direction = direction;
    }

    fn set_data_line(&mut self, index: usize, high: bool) {
        let line = IO_BASE + index;
        if self.direction == DataDirection::Output {
            self.drive(line, high);
        } else {
            // Applied when the bus turns around
            self.levels[line] = high;
        }
    }

    fn get_data_line(&mut self, index: usize) -> bool {
        let offset = self.offsets[IO_BASE + index];
        match self.request.value(offset) {
            Ok(Value::Active) => true,
            Ok(Value::Inactive) => false,
            Err(e) => {
                log::error!("Failed to get GPIO {}: {}", offset, e);
                false
            }
        }
    }

    fn set_write_enable(&mut self, high: bool) {
        self.drive(Line::We as usize, high);
    }

    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(std::time::Duration::from_micros(us as u64));
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(ms as u64));
    }
}

fn parse_line(name: &str, value: &str) -> Result<Offset> {
    value
        .parse()
        .map_err(|_| LinuxGpioError::InvalidLineNumber {
            name: name.to_string(),
            value: value.to_string(),
        })
}

/// Parse backend options from a list of key-value pairs
///
/// # Supported Options
///
/// - `dev=/dev/gpiochipN` - GPIO chip device path (required, or use gpiochip)
/// - `gpiochip=N` - GPIO chip number (alternative to dev)
/// - `ser=N` - shift register data line (required)
/// - `clk=N` - shift register clock line (required)
/// - `latch=N` - shift register latch line (required)
/// - `we=N` - EEPROM write enable line (required)
/// - `io0=N` .. `io7=N` - EEPROM data lines (all required)
pub fn parse_options(options: &[(&str, &str)]) -> Result<LinuxGpioConfig> {
    let mut config = LinuxGpioConfig::default();
    let mut seen = [false; LINE_COUNT];
    let mut gpiochip: Option<u32> = None;

    for (key, value) in options {
        let (slot, line) = match *key {
            "dev" => {
                config.device = value.to_string();
                continue;
            }
            "gpiochip" => {
                gpiochip = Some(value.parse().map_err(|_| {
                    LinuxGpioError::InvalidParameter(format!("Invalid gpiochip value: {}", value))
                })?);
                continue;
            }
            "ser" => (&mut config.ser, Line::Ser as usize),
            "clk" => (&mut config.clk, Line::Clk as usize),
            "latch" => (&mut config.latch, Line::Latch as usize),
            "we" => (&mut config.we, Line::We as usize),
            io => match io.strip_prefix("io").and_then(|n| n.parse::<usize>().ok()) {
                Some(n) if n < DATA_LINES => (&mut config.io[n], IO_BASE + n),
                _ => {
                    log::warn!("linux_gpio: Unknown option: {}={}", key, value);
                    continue;
                }
            },
        };

        *slot = parse_line(key, value)?;
        seen[line] = true;
    }

    match (config.device.is_empty(), gpiochip) {
        (true, Some(n)) => config.device = format!("/dev/gpiochip{}", n),
        (true, None) => return Err(LinuxGpioError::NoDevice),
        (false, Some(_)) => return Err(LinuxGpioError::ConflictingDevice),
        (false, None) => {}
    }

    const NAMES: [&str; LINE_COUNT] = [
        "ser", "clk", "latch", "we", "io0", "io1", "io2", "io3", "io4", "io5", "io6", "io7",
    ];
    if let Some(missing) = seen.iter().position(|&s| !s) {
        return Err(LinuxGpioError::MissingParameter(NAMES[missing]));
    }

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &[(&str, &str)] = &[
        ("dev", "/dev/gpiochip0"),
        ("ser", "2"),
        ("clk", "3"),
        ("latch", "4"),
        ("we", "17"),
        ("io0", "5"),
        ("io1", "6"),
        ("io2", "13"),
        ("io3", "19"),
        ("io4", "26"),
        ("io5", "16"),
        ("io6", "20"),
        ("io7", "21"),
    ];

    #[test]
    fn test_parse_full() {
        let config = parse_options(FULL).unwrap();
        assert_eq!(
            config,
            LinuxGpioConfig::new(
                "/dev/gpiochip0",
                2,
                3,
                4,
                17,
                [5, 6, 13, 19, 26, 16, 20, 21]
            )
        );
    }

    #[test]
    fn test_parse_gpiochip_number() {
        let mut options = FULL.to_vec();
        options[0] = ("gpiochip", "1");
        assert_eq!(parse_options(&options).unwrap().device, "/dev/gpiochip1");
    }

    #[test]
    fn test_parse_dev_and_gpiochip_conflict() {
        let mut options = FULL.to_vec();
        options.push(("gpiochip", "1"));
        assert!(matches!(
            parse_options(&options),
            Err(LinuxGpioError::ConflictingDevice)
        ));
    }

    #[test]
    fn test_parse_missing_device() {
        assert!(matches!(
            parse_options(&FULL[1..]),
            Err(LinuxGpioError::NoDevice)
        ));
    }

    #[test]
    fn test_parse_missing_line() {
        let options: Vec<_> = FULL.iter().copied().filter(|(k, _)| *k != "io6").collect();
        assert!(matches!(
            parse_options(&options),
            Err(LinuxGpioError::MissingParameter("io6"))
        ));
    }

    #[test]
    fn test_parse_bad_line_number() {
        let mut options = FULL.to_vec();
        options[1] = ("ser", "two");
        assert!(matches!(
            parse_options(&options),
            Err(LinuxGpioError::InvalidLineNumber { .. })
        ));
    }

    #[test]
    fn test_parse_duplicate_line() {
        let mut options = FULL.to_vec();
        options[4] = ("we", "2");
        assert!(matches!(
            parse_options(&options),
            Err(LinuxGpioError::DuplicateLine(2))
        ));
    }
}
