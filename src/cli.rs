//! CLI argument parsing

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex (`0x` prefix) or decimal integer
fn parse_int(s: &str) -> Result<u64, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u64>().map_err(|e| format!("Invalid number: {}", e))
    }
}

fn parse_u8(s: &str) -> Result<u8, String> {
    u8::try_from(parse_int(s)?).map_err(|_| format!("{} does not fit in a byte", s))
}

fn parse_u16(s: &str) -> Result<u16, String> {
    u16::try_from(parse_int(s)?).map_err(|_| format!("{} is larger than 0xffff", s))
}

fn parse_u32(s: &str) -> Result<u32, String> {
    u32::try_from(parse_int(s)?).map_err(|_| format!("{} is larger than 0xffffffff", s))
}

fn parse_usize(s: &str) -> Result<usize, String> {
    usize::try_from(parse_int(s)?).map_err(|_| format!("{} is too large", s))
}

#[derive(Parser)]
#[command(name = "eeprog")]
#[command(author, version, about = "Parallel EEPROM programmer", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Connection options shared by every command that talks to a programmer
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Programmer connection [dev=<port>[:baud], ip=<host>:<port>, dummy[:image=<file>]]
    #[arg(short, long)]
    pub programmer: String,

    /// Per-command timeout in milliseconds (0 for no timeout)
    #[arg(short, long, default_value = "1000", value_parser = parse_u32)]
    pub timeout: u32,

    /// Payload bytes per request frame
    #[arg(long, default_value = "64", value_parser = parse_usize)]
    pub block_size: usize,

    /// Readiness probes to send before giving up
    #[arg(long, default_value = "50", value_parser = parse_usize)]
    pub probe_attempts: usize,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read EEPROM contents to a file or as a hexdump
    Read {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Start address (hex or decimal)
        #[arg(short, long, default_value = "0", value_parser = parse_u16)]
        address: u16,

        /// Number of bytes to read
        #[arg(short, long, value_parser = parse_usize)]
        size: usize,

        /// Output file path (prints a hexdump when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Bytes per hexdump line
        #[arg(long, default_value = "16", value_parser = parse_usize)]
        width: usize,
    },

    /// Write hex data or a file to the EEPROM
    Write {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Start address (hex or decimal)
        #[arg(short, long, default_value = "0", value_parser = parse_u16)]
        address: u16,

        /// Data to write, in hexadecimal
        #[arg(short, long, conflicts_with = "file", required_unless_present = "file")]
        data: Option<String>,

        /// Binary file to write
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Number of times the selected data is repeated
        #[arg(short, long, default_value = "1", value_parser = parse_usize)]
        count: usize,

        /// Write every N'th byte of the data, starting at --data-offset
        #[arg(long, default_value = "1", value_parser = parse_usize)]
        data_step: usize,

        /// Skip the first N bytes of the data
        #[arg(long, default_value = "0", value_parser = parse_usize)]
        data_offset: usize,

        /// Read back and compare after writing
        #[arg(long)]
        verify: bool,
    },

    /// Fill a range with one byte value
    Fill {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Start address (hex or decimal)
        #[arg(short, long, default_value = "0", value_parser = parse_u16)]
        address: u16,

        /// Number of bytes to fill
        #[arg(short, long, value_parser = parse_usize)]
        size: usize,

        /// Fill value
        #[arg(long, value_parser = parse_u8)]
        value: u8,
    },

    /// Verify EEPROM contents against a file
    Verify {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Start address (hex or decimal)
        #[arg(short, long, default_value = "0", value_parser = parse_u16)]
        address: u16,

        /// File to compare against
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Run the protocol engine, serving an EEPROM backend
    Serve {
        /// Serve over a serial port (dev=<port>[:baud])
        #[arg(long, conflicts_with = "listen", required_unless_present = "listen")]
        serial: Option<String>,

        /// Serve over TCP, one client at a time (<host>:<port>)
        #[arg(long)]
        listen: Option<String>,

        /// Backend driving the EEPROM bus [dummy[:image=<file>], linux_gpio:<options>]
        #[arg(short, long, default_value = "dummy")]
        backend: String,

        /// Largest payload the engine buffers; bigger requests are dropped
        #[arg(long, value_parser = parse_usize)]
        payload_limit: Option<usize>,
    },

    /// List supported backends
    ListBackends,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("0x7ff"), Ok(0x7FF));
        assert_eq!(parse_int("0X10"), Ok(16));
        assert_eq!(parse_int("2048"), Ok(2048));
        assert!(parse_int("0xgg").is_err());
        assert!(parse_int("-1").is_err());
        assert!(parse_u16("0x10000").is_err());
        assert_eq!(parse_u8("0xff"), Ok(0xFF));
    }

    #[test]
    fn test_write_requires_one_source() {
        assert!(Cli::try_parse_from(["eeprog", "write", "-p", "dummy"]).is_err());
        assert!(Cli::try_parse_from([
            "eeprog", "write", "-p", "dummy", "-d", "00", "-f", "rom.bin"
        ])
        .is_err());
        assert!(Cli::try_parse_from(["eeprog", "write", "-p", "dummy", "-d", "00ff"]).is_ok());
    }

    #[test]
    fn test_read_arguments() {
        let cli = Cli::try_parse_from([
            "eeprog", "-vv", "read", "-p", "dev=/dev/ttyUSB0", "-a", "0x100", "-s", "32", "-t",
            "0",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Read {
                connection,
                address,
                size,
                output,
                width,
            } => {
                assert_eq!(connection.programmer, "dev=/dev/ttyUSB0");
                assert_eq!(connection.timeout, 0);
                assert_eq!(connection.block_size, 64);
                assert_eq!(address, 0x100);
                assert_eq!(size, 32);
                assert!(output.is_none());
                assert_eq!(width, 16);
            }
            _ => panic!("expected read command"),
        }
    }

    #[test]
    fn test_serve_requires_one_endpoint() {
        assert!(Cli::try_parse_from(["eeprog", "serve"]).is_err());
        assert!(Cli::try_parse_from([
            "eeprog",
            "serve",
            "--serial",
            "dev=/dev/ttyUSB0",
            "--listen",
            "0.0.0.0:7777"
        ])
        .is_err());
        assert!(Cli::try_parse_from(["eeprog", "serve", "--listen", "127.0.0.1:7777"]).is_ok());
    }
}
