//! eeprog-linux-gpio - Linux GPIO backend
//!
//! Runs the eeprog protocol engine on a single-board computer by driving the
//! programmer bus directly from GPIO lines, through the Linux GPIO character
//! device (gpiocdev).
//!
//! # Usage with eeprog CLI
//!
//! ```bash
//! # Serve the EEPROM wired to gpiochip0 over TCP
//! eeprog serve --listen 0.0.0.0:7777 \
//!     --backend linux_gpio:gpiochip=0,ser=2,clk=3,latch=4,we=17,io0=5,io1=6,io2=13,io3=19,io4=26,io5=16,io6=20,io7=21
//! ```
//!
//! # GPIO Pin Wiring
//!
//! | Signal | GPIO Function | Description |
//! |--------|---------------|-------------|
//! | SER    | ser (output)  | Serial data into the first 74HC595 |
//! | SRCLK  | clk (output)  | Shift clock of both 74HC595 |
//! | RCLK   | latch (output)| Latch clock of both 74HC595 |
//! | WE#    | we (output)   | EEPROM write enable |
//! | D0..D7 | io0..io7      | EEPROM data bus |
//!
//! The shift registers drive A0..A10 from bits 0..10 and OE# from bit 15.
//!
//! # System Requirements
//!
//! - Linux kernel 4.8+ with GPIO character device support (kernel 5.5+ for v2 API)
//! - Access to `/dev/gpiochipN` devices (may require root or udev rules)

pub mod device;
pub mod error;

// Re-exports
pub use device::{parse_options, LinuxGpioConfig, LinuxGpioPins};
pub use error::{LinuxGpioError, Result};

/// Open the GPIO backend from `key=value` option pairs
pub fn open_linux_gpio(
    options: &[(&str, &str)],
) -> std::result::Result<LinuxGpioPins, Box<dyn std::error::Error>> {
    let config = parse_options(options)?;
    let pins = LinuxGpioPins::open(&config)?;
    Ok(pins)
}
