//! Backend registration and dispatch
//!
//! A backend drives the EEPROM bus for `eeprog serve`. Backends are
//! feature-gated; the emulator is always available.

use eeprog_core::bus::EepromPins;

/// Information about a backend
pub struct BackendInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available backends (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_backends() -> Vec<BackendInfo> {
    let mut backends = Vec::new();

    backends.push(BackendInfo {
        name: "dummy",
        aliases: &[],
        description: "Emulated 2 KiB EEPROM behind two 74HC595 (image=<file>)",
    });

    #[cfg(feature = "linux-gpio")]
    backends.push(BackendInfo {
        name: "linux_gpio",
        aliases: &["linux-gpio", "gpio"],
        description:
            "Linux GPIO character device (dev=<chip>|gpiochip=<n>,ser,clk,latch,we,io0..io7)",
    });

    backends
}

/// Generate help text listing all available backends
pub fn backend_help() -> String {
    let mut help = String::from("Available backends:\n");
    for b in &available_backends() {
        help.push_str(&format!("  {:12} - {}\n", b.name, b.description));
    }
    help
}

/// Resolve a backend name or alias to its primary name
pub fn find_backend(name: &str) -> Option<&'static str> {
    available_backends()
        .into_iter()
        .find(|b| b.name == name || b.aliases.contains(&name))
        .map(|b| b.name)
}

/// Parse a backend string into name and options
///
/// Format: "name" or "name:option1=value1,option2=value2"
pub fn parse_backend_string(s: &str) -> (&str, Vec<(&str, &str)>) {
    if let Some((name, opts)) = s.split_once(':') {
        let options: Vec<_> = opts
            .split(',')
            .filter_map(|opt| opt.split_once('='))
            .collect();
        (name, options)
    } else {
        (s, Vec::new())
    }
}

/// Open the backend named by `backend`
pub fn open_backend(backend: &str) -> Result<Box<dyn EepromPins>, Box<dyn std::error::Error>> {
    let (name, options) = parse_backend_string(backend);

    let canonical_name = match find_backend(name) {
        Some(n) => n,
        None => return Err(unknown_backend_error(name)),
    };

    match canonical_name {
        "dummy" => {
            use eeprog_dummy::{DummyConfig, DummyEeprom};

            let mut dummy = DummyEeprom::new(DummyConfig::default());
            for (key, value) in &options {
                match *key {
                    "image" => {
                        let data = std::fs::read(value)
                            .map_err(|e| format!("Failed to read image {}: {}", value, e))?;
                        log::info!("Loaded {} bytes from {} into emulator", data.len(), value);
                        dummy = DummyEeprom::with_data(DummyConfig::default(), &data);
                    }
                    _ => log::warn!("dummy: Unknown option: {}={}", key, value),
                }
            }
            Ok(Box::new(dummy))
        }

        #[cfg(feature = "linux-gpio")]
        "linux_gpio" => {
            log::info!("Opening Linux GPIO backend...");
            let pins = eeprog_linux_gpio::open_linux_gpio(&options).map_err(|e| {
                format!(
                    "Failed to open linux_gpio backend: {}\n\
                     Make sure the chip exists and you have read/write permissions.",
                    e
                )
            })?;
            Ok(Box::new(pins))
        }

        _ => Err(unknown_backend_error(name)),
    }
}

fn unknown_backend_error(name: &str) -> Box<dyn std::error::Error> {
    let mut msg = format!("Unknown backend: {}\n\n", name);
    msg.push_str(&backend_help());
    msg.push_str("\nUse 'eeprog list-backends' for more details");
    msg.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backend_string() {
        assert_eq!(parse_backend_string("dummy"), ("dummy", vec![]));
        assert_eq!(
            parse_backend_string("linux_gpio:gpiochip=0,we=17"),
            ("linux_gpio", vec![("gpiochip", "0"), ("we", "17")])
        );
    }

    #[test]
    fn test_find_backend() {
        assert_eq!(find_backend("dummy"), Some("dummy"));
        assert_eq!(find_backend("nope"), None);
    }

    #[test]
    fn test_open_unknown_backend() {
        let err = open_backend("nope").err().unwrap();
        assert!(err.to_string().contains("Unknown backend: nope"));
    }

    #[test]
    fn test_open_dummy_backend() {
        use eeprog_core::eeprom::Eeprom;

        let mut eeprom = Eeprom::new(open_backend("dummy").unwrap());
        eeprom.write_byte(0x10, 0x42);
        assert_eq!(eeprom.read_byte(0x10), 0x42);
    }
}
