//! Byte-stream channel abstraction
//!
//! The protocol engine talks to the host through an ordered byte channel
//! with an explicit "bytes available" query, like a UART receive FIFO. The
//! blocking helpers below poll that query and call [`ByteChannel::idle`]
//! between polls; there is no timeout.

use crate::error::Result;

/// Ordered, lossless byte channel to the host
pub trait ByteChannel {
    /// Number of bytes that can be read without blocking
    ///
    /// A channel whose peer has gone away returns `Error::Disconnected`.
    fn available(&mut self) -> Result<usize>;

    /// Read one byte; only called when `available()` is non-zero
    fn read_byte(&mut self) -> Result<u8>;

    /// Write one byte
    fn write_byte(&mut self, byte: u8) -> Result<()>;

    /// Write all bytes in order
    ///
    /// Default implementation calls `write_byte` for each byte.
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        for &byte in data {
            self.write_byte(byte)?;
        }
        Ok(())
    }

    /// Flush any buffered output
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Wait a short while before polling again
    fn idle(&mut self) {}
}

impl<C: ByteChannel + ?Sized> ByteChannel for &mut C {
    fn available(&mut self) -> Result<usize> {
        (**self).available()
    }

    fn read_byte(&mut self) -> Result<u8> {
        (**self).read_byte()
    }

    fn write_byte(&mut self, byte: u8) -> Result<()> {
        (**self).write_byte(byte)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        (**self).write_all(data)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn idle(&mut self) {
        (**self).idle()
    }
}

/// Block until at least `count` bytes are available
pub fn wait_available<C: ByteChannel + ?Sized>(channel: &mut C, count: usize) -> Result<()> {
    while channel.available()? < count {
        channel.idle();
    }
    Ok(())
}

/// Block until a byte is available and read it
pub fn read_blocking<C: ByteChannel + ?Sized>(channel: &mut C) -> Result<u8> {
    wait_available(channel, 1)?;
    channel.read_byte()
}

/// Block until `buf.len()` bytes are available, then read them as one burst
pub fn read_burst<C: ByteChannel + ?Sized>(channel: &mut C, buf: &mut [u8]) -> Result<()> {
    wait_available(channel, buf.len())?;
    for byte in buf.iter_mut() {
        *byte = channel.read_byte()?;
    }
    Ok(())
}
