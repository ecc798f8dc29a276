//! Fill command implementation

use crate::cli::ConnectionArgs;
use crate::commands::{connect, BarProgress};

/// Run the fill command
pub fn run_fill(
    connection: &ConnectionArgs,
    address: u16,
    size: usize,
    value: u8,
) -> Result<(), Box<dyn std::error::Error>> {
    if size == 0 {
        println!("Nothing to fill");
        return Ok(());
    }

    let data = vec![value; size];
    let mut programmer = connect(connection)?;
    let mut progress = BarProgress::new("Filling", connection.block_size);
    let written = programmer.write_blocks(address, &data, connection.block_size, &mut progress)?;

    println!(
        "Filled {} bytes at 0x{:04X} with 0x{:02X}",
        written, address, value
    );
    Ok(())
}
