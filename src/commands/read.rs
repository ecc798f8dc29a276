//! Read command implementation

use crate::cli::ConnectionArgs;
use crate::commands::{connect, BarProgress};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Widest hexdump line accepted, in bytes
pub const MAX_HEXDUMP_WIDTH: usize = 256;

fn check_width(width: usize) -> Result<(), Box<dyn std::error::Error>> {
    if width == 0 || width > MAX_HEXDUMP_WIDTH {
        return Err(format!(
            "Hexdump width {} out of range 1..={}",
            width, MAX_HEXDUMP_WIDTH
        )
        .into());
    }
    Ok(())
}

/// Run the read command
pub fn run_read(
    connection: &ConnectionArgs,
    address: u16,
    size: usize,
    output: Option<&Path>,
    width: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    check_width(width)?;

    let mut programmer = connect(connection)?;
    let mut progress = BarProgress::new("Reading", connection.block_size);
    let data = programmer.read_blocks(address, size, connection.block_size, &mut progress)?;

    if data.len() < size {
        println!(
            "Device returned {} of {} bytes (end of EEPROM reached)",
            data.len(),
            size
        );
    }

    match output {
        Some(path) => {
            let mut file = File::create(path)?;
            file.write_all(&data)?;
            println!("Wrote {} bytes to {:?}", data.len(), path);
        }
        None => {
            for line in hexdump(address as usize, &data, width) {
                println!("{}", line);
            }
        }
    }

    Ok(())
}

/// Format `data` as hexdump lines of `width` bytes
///
/// Each line is `aaaaaaaa: hh hh .. |text|` with the absolute address,
/// bytes 33..=126 shown as text and everything else as `.`. `width` is
/// clamped to `1..=MAX_HEXDUMP_WIDTH`.
pub fn hexdump(base: usize, data: &[u8], width: usize) -> Vec<String> {
    let width = width.clamp(1, MAX_HEXDUMP_WIDTH);
    let hex_width = width * 3 - 1;
    data.chunks(width)
        .enumerate()
        .map(|(i, chunk)| {
            let hex = chunk
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect::<Vec<_>>()
                .join(" ");
            let text: String = chunk
                .iter()
                .map(|&b| if (33..=126).contains(&b) { b as char } else { '.' })
                .collect();
            format!(
                "{:08x}: {:hex_width$} |{:<width$}|",
                base + i * width,
                hex,
                text,
                hex_width = hex_width,
                width = width
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hexdump_full_line() {
        let data: Vec<u8> = (0x41..0x51).collect();
        let lines = hexdump(0x100, &data, 16);
        assert_eq!(
            lines,
            vec![
                "00000100: 41 42 43 44 45 46 47 48 49 4a 4b 4c 4d 4e 4f 50 |ABCDEFGHIJKLMNOP|"
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_hexdump_partial_line_is_padded() {
        let lines = hexdump(0, &[0x20, 0x21, 0x7E, 0x7F, 0xFF], 16);
        assert_eq!(lines.len(), 1);
        assert_eq!(
            lines[0],
            format!("00000000: 20 21 7e 7f ff{} |.!~..{}|", " ".repeat(33), " ".repeat(11))
        );
    }

    #[test]
    fn test_hexdump_addresses_advance_by_width() {
        let lines = hexdump(0x7F8, &[0u8; 12], 4);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("000007f8: "));
        assert!(lines[1].starts_with("000007fc: "));
        assert!(lines[2].starts_with("00000800: "));
    }

    #[test]
    fn test_width_bounds() {
        assert!(check_width(0).is_err());
        assert!(check_width(1).is_ok());
        assert!(check_width(MAX_HEXDUMP_WIDTH).is_ok());
        assert!(check_width(MAX_HEXDUMP_WIDTH + 1).is_err());
        assert!(check_width(usize::MAX).is_err());
    }

    #[test]
    fn test_hexdump_huge_width_is_clamped() {
        let lines = hexdump(0, &[0u8; 300], usize::MAX);
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("00000100: "));
    }

    #[test]
    fn test_hexdump_empty() {
        assert!(hexdump(0, &[], 16).is_empty());
    }
}
