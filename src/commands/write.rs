//! Write command implementation

use crate::cli::ConnectionArgs;
use crate::commands::{connect, verify_range, BarProgress};
use std::path::Path;

/// Run the write command
#[allow(clippy::too_many_arguments)]
pub fn run_write(
    connection: &ConnectionArgs,
    address: u16,
    hex_data: Option<&str>,
    file: Option<&Path>,
    count: usize,
    data_step: usize,
    data_offset: usize,
    verify: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = match (hex_data, file) {
        (Some(hex_data), None) => decode_hex(hex_data)?,
        (None, Some(path)) => {
            let data = std::fs::read(path)?;
            println!("Read {} bytes from {:?}", data.len(), path);
            data
        }
        _ => return Err("Exactly one of --data or --file must be given".into()),
    };

    let data = select_data(&source, data_offset, data_step, count)?;
    if data.is_empty() {
        println!("Nothing to write");
        return Ok(());
    }

    let mut programmer = connect(connection)?;
    let mut progress = BarProgress::new("Writing", connection.block_size);
    let written = programmer.write_blocks(address, &data, connection.block_size, &mut progress)?;

    println!(
        "Wrote {} bytes at 0x{:04X}{}",
        written,
        address,
        if written < data.len() {
            " (end of EEPROM reached)"
        } else {
            ""
        }
    );

    if verify {
        verify_range(
            &mut programmer,
            address,
            &data[..written],
            connection.block_size,
        )?;
        println!("Verification passed!");
    }

    Ok(())
}

/// Decode a hex string, ignoring whitespace and an optional `0x` prefix
pub fn decode_hex(s: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let digits: String = s.split_whitespace().collect();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(digits.as_str());
    hex::decode(digits).map_err(|e| format!("Invalid hex data: {}", e).into())
}

/// Pick every `step`'th byte from `offset`, then repeat the result `count` times
pub fn select_data(
    data: &[u8],
    offset: usize,
    step: usize,
    count: usize,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    if step == 0 {
        return Err("--data-step must be at least 1".into());
    }
    let selected: Vec<u8> = data.iter().skip(offset).step_by(step).copied().collect();
    Ok(selected.repeat(count))
}
