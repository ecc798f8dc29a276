//! eeprog - Parallel EEPROM programmer
//!
//! Host tool for a programmer that addresses a 2 KiB parallel EEPROM through
//! two cascaded shift registers and talks a small framed protocol over a
//! serial link.
//!
//! # Architecture
//!
//! - **Client commands** (`read`, `write`, `fill`, `verify`) connect to a
//!   programmer (serial port, TCP, or the in-process emulator) and move data
//!   in block-sized request frames.
//! - **`serve`** runs the protocol engine here instead of on a
//!   microcontroller, with a backend (emulator or Linux GPIO lines) driving
//!   the EEPROM bus.

mod backends;
mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    match cli.command {
        Commands::Read {
            connection,
            address,
            size,
            output,
            width,
        } => commands::run_read(&connection, address, size, output.as_deref(), width),
        Commands::Write {
            connection,
            address,
            data,
            file,
            count,
            data_step,
            data_offset,
            verify,
        } => commands::run_write(
            &connection,
            address,
            data.as_deref(),
            file.as_deref(),
            count,
            data_step,
            data_offset,
            verify,
        ),
        Commands::Fill {
            connection,
            address,
            size,
            value,
        } => commands::run_fill(&connection, address, size, value),
        Commands::Verify {
            connection,
            address,
            file,
        } => commands::run_verify(&connection, address, &file),
        Commands::Serve {
            serial,
            listen,
            backend,
            payload_limit,
        } => commands::run_serve(
            serial.as_deref(),
            listen.as_deref(),
            &backend,
            payload_limit,
        ),
        Commands::ListBackends => {
            commands::list_backends();
            Ok(())
        }
    }
}
