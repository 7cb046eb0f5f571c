//! Debug console over the host link
//!
//! Console output goes to the host tool's standard output as a write to host
//! descriptor 1, using the same request as file writes. Only buffered output
//! is real; the remaining console operations behave like the null console
//! (accept and discard, or report that nothing is available).

use dcload_hal::{ContextProbe, DatagramSocket, IrqSafeLock};

use crate::fs::FsError;
use crate::session::Session;

/// Console errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConsoleError {
    /// Session is not connected
    NotConnected,
    /// Session lock is held and the caller may not wait
    LockUnavailable,
    /// The write did not complete
    WriteFailed,
    /// Operation not provided by this console
    NotSupported,
}

impl From<FsError> for ConsoleError {
    fn from(e: FsError) -> Self {
        match e {
            FsError::NotConnected => ConsoleError::NotConnected,
            FsError::LockUnavailable => ConsoleError::LockUnavailable,
            _ => ConsoleError::WriteFailed,
        }
    }
}

/// Debug console capability set
pub trait ConsoleSink {
    /// Name the console registers under
    fn name(&self) -> &str;

    /// Whether the console is present
    fn detected(&self) -> bool;

    fn init(&mut self) -> Result<(), ConsoleError> {
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), ConsoleError> {
        Ok(())
    }

    /// Route console interrupts; ignored
    fn set_irq_usage(&mut self, _enabled: bool) -> Result<(), ConsoleError> {
        Ok(())
    }

    /// Read one byte; there is never input
    fn read(&mut self) -> Result<u8, ConsoleError> {
        Err(ConsoleError::NotSupported)
    }

    /// Write one byte; discarded
    fn write(&mut self, _byte: u8) -> Result<(), ConsoleError> {
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ConsoleError> {
        Ok(())
    }

    /// Write a buffer; returns the number of bytes written
    ///
    /// `translate` asks for newline translation, which this console does not
    /// perform.
    fn write_buffer(&mut self, data: &[u8], translate: bool) -> Result<usize, ConsoleError>;

    fn read_buffer(&mut self, _buf: &mut [u8]) -> Result<usize, ConsoleError> {
        Err(ConsoleError::NotSupported)
    }
}

impl<S, L, P> ConsoleSink for Session<S, L, P>
where
    S: DatagramSocket,
    L: IrqSafeLock,
    P: ContextProbe,
{
    fn name(&self) -> &str {
        &self.config().console_name
    }

    fn detected(&self) -> bool {
        self.state().is_detected()
    }

    fn write_buffer(&mut self, data: &[u8], _translate: bool) -> Result<usize, ConsoleError> {
        if !self.state().is_connected() {
            return Err(ConsoleError::NotConnected);
        }
        Ok(self.write_stdout(data)?)
    }
}
