//! Device abstraction seam.
//!
//! The engine never talks to `serialport` handles directly; it goes through
//! [`SerialDevice`] and [`DeviceFactory`]. Production code plugs in the
//! system-backed implementations from [`crate::handle`]; tests plug in
//! [`crate::mock::MockDevice`] and drive byte streams deterministically.

use std::io;
use std::time::Duration;

use crate::error::PortError;
use crate::line::LineSettings;

/// An acquired serial device handle.
///
/// Reads are expected to block for at most the poll interval the device was
/// opened with and to surface an idle interval as `io::ErrorKind::TimedOut`.
/// The engine relies on that bound to keep its reader loop responsive to
/// stop requests.
pub trait SerialDevice: Send {
    /// Read at most `buf.len()` bytes. `Ok(0)` means the device produced an
    /// end-of-stream, which the engine treats as a disconnect signal when it
    /// repeats.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Hand `buf` to the OS in a single call, returning the accepted count.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Clone the underlying handle so reads and writes can proceed on
    /// independent handles without shared locking.
    fn try_clone(&self) -> io::Result<Box<dyn SerialDevice>>;

    /// The device name this handle was opened from.
    fn name(&self) -> &str;
}

impl std::fmt::Debug for dyn SerialDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialDevice")
            .field("name", &self.name())
            .finish()
    }
}

/// Opens serial devices by name.
///
/// `settings` is the translated OS record; `read_timeout` is applied to the
/// handle so reads return `TimedOut` after a bounded wait. Implementations
/// must reject settings their backend cannot express with
/// [`PortError::ConfigurationRejected`] rather than silently altering them.
/// Device names are taken as-is; discovering which names exist is the host's
/// concern, not the engine's.
pub trait DeviceFactory: Send + Sync {
    fn open(
        &self,
        name: &str,
        settings: &LineSettings,
        read_timeout: Duration,
    ) -> Result<Box<dyn SerialDevice>, PortError>;
}
