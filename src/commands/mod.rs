//! CLI command implementations
//!
//! The client commands (`read`, `write`, `fill`, `verify`) open a programmer
//! connection, wait for the device to answer and then move data in
//! block-sized frames. `serve` runs the protocol engine itself.

mod fill;
mod list;
mod read;
mod serve;
mod verify;
mod write;

pub use fill::run_fill;
pub use list::list_backends;
pub use read::run_read;
pub use serve::run_serve;
pub use verify::run_verify;
pub use write::run_write;

use crate::cli::ConnectionArgs;
use eeprog_serial::{open_programmer, Programmer, TransferProgress, Transport};
use indicatif::{ProgressBar, ProgressStyle};

/// Open the programmer named by `args` and wait until it answers
pub fn connect(
    args: &ConnectionArgs,
) -> Result<Programmer<Box<dyn Transport>>, Box<dyn std::error::Error>> {
    let mut programmer = open_programmer(&args.programmer)
        .map_err(|e| format!("Failed to open programmer {}: {}", args.programmer, e))?;
    programmer.set_timeout(args.timeout);

    log::info!("Waiting for programmer...");
    programmer.wait_ready(args.probe_attempts)?;
    Ok(programmer)
}

/// Transfer progress shown as an indicatif bar
///
/// Single-block transfers stay silent.
pub struct BarProgress {
    phase: &'static str,
    block_size: usize,
    bar: Option<ProgressBar>,
}

impl BarProgress {
    pub fn new(phase: &'static str, block_size: usize) -> Self {
        Self {
            phase,
            block_size,
            bar: None,
        }
    }
}

impl TransferProgress for BarProgress {
    fn start(&mut self, total_bytes: usize) {
        if total_bytes <= self.block_size {
            return;
        }
        let pb = ProgressBar::new(total_bytes as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(&format!(
                    "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                    self.phase
                ))
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        self.bar = Some(pb);
    }

    fn progress(&mut self, bytes_done: usize) {
        if let Some(pb) = &self.bar {
            pb.set_position(bytes_done as u64);
        }
    }

    fn finish(&mut self) {
        if let Some(pb) = self.bar.take() {
            pb.finish_with_message(format!("{} complete", self.phase));
        }
    }
}

/// Count differing bytes and locate the first one
///
/// Returns `(mismatches, Some((offset, expected, actual)))`, comparing over
/// the shorter of the two slices.
pub fn compare(expected: &[u8], actual: &[u8]) -> (usize, Option<(usize, u8, u8)>) {
    let mut count = 0;
    let mut first = None;
    for (i, (&e, &a)) in expected.iter().zip(actual).enumerate() {
        if e != a {
            if first.is_none() {
                first = Some((i, e, a));
            }
            count += 1;
        }
    }
    (count, first)
}

/// Read back `expected.len()` bytes at `address` and compare
pub fn verify_range<T: Transport>(
    programmer: &mut Programmer<T>,
    address: u16,
    expected: &[u8],
    block_size: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut progress = BarProgress::new("Verifying", block_size);
    let actual = programmer.read_blocks(address, expected.len(), block_size, &mut progress)?;

    if actual.len() < expected.len() {
        return Err(format!(
            "Verification failed: device returned {} of {} bytes",
            actual.len(),
            expected.len()
        )
        .into());
    }

    let (count, first) = compare(expected, &actual);
    if let Some((offset, e, a)) = first {
        return Err(format!(
            "Verification failed: {} byte(s) differ. First mismatch at 0x{:04X}: expected 0x{:02X}, got 0x{:02X}",
            count,
            address as usize + offset,
            e,
            a
        )
        .into());
    }

    Ok(())
}
