//! List commands implementation

use crate::backends::available_backends;

/// List all supported backends and programmer connections
pub fn list_backends() {
    println!("Backends (eeprog serve --backend):");
    println!();
    for b in available_backends() {
        let aliases = if b.aliases.is_empty() {
            String::new()
        } else {
            format!(" (aliases: {})", b.aliases.join(", "))
        };
        println!("  {:12} - {}{}", b.name, b.description, aliases);
    }

    println!();
    println!("Programmer connections (-p):");
    println!();
    println!("  dev=<port>[:baud]   - Serial port, 115200 8N1 by default");
    println!("  ip=<host>:<port>    - TCP, e.g. an `eeprog serve --listen` instance");
    println!("  dummy[:image=<f>]   - In-process emulated EEPROM");
}
