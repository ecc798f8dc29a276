//! Verify command implementation

use crate::cli::ConnectionArgs;
use crate::commands::{connect, verify_range};
use std::path::Path;

/// Run the verify command
pub fn run_verify(
    connection: &ConnectionArgs,
    address: u16,
    input: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let expected = std::fs::read(input)?;
    println!("Read {} bytes from {:?}", expected.len(), input);

    let mut programmer = connect(connection)?;
    verify_range(&mut programmer, address, &expected, connection.block_size)?;

    println!("Verification passed!");
    Ok(())
}
