//! Per-port lifecycle controller.
//!
//! A [`Port`] owns one serial device end to end: it translates the line
//! configuration, acquires the handle, launches the background reader and
//! tears everything down again. The state machine is deliberately small —
//! [`PortState::Closed`] and [`PortState::Open`] — and only the lifecycle
//! operations here ever move it; the reader and writer paths never do.
//!
//! Shutdown protocol: [`Port::close`] signals the reader, joins it (bounded
//! by one read-poll interval), and only then releases the handles. Dropping
//! an open `Port` runs the same protocol, so a forgotten close never leaks a
//! thread or a handle.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info};

use crate::device::{DeviceFactory, SerialDevice};
use crate::error::PortError;
use crate::handle::SystemDeviceFactory;
use crate::line::LineConfig;
use crate::reader::{ReaderLoop, ReaderState};

/// Default upper bound on a single blocking read. Small enough that stop
/// signals are noticed quickly, large enough to avoid spinning on an idle
/// line.
pub const DEFAULT_READ_POLL: Duration = Duration::from_millis(100);

/// Operational timing knobs. These are defaults with an override point, not
/// part of the line configuration; most callers never touch them.
#[derive(Debug, Clone, Copy)]
pub struct PortOptions {
    /// Poll interval for blocking reads. Bounds both worst-case delivery
    /// latency while idle and how long `close()` can block while joining
    /// the reader.
    pub read_poll: Duration,
}

impl Default for PortOptions {
    fn default() -> Self {
        Self {
            read_poll: DEFAULT_READ_POLL,
        }
    }
}

/// Whether the handle and reader are live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PortState {
    Closed,
    Open,
}

/// Registered consumer for received chunks.
pub type DataCallback = Arc<dyn Fn(&[u8]) + Send + Sync + 'static>;

type CallbackSlot = Arc<RwLock<Option<DataCallback>>>;

#[derive(Debug, Default)]
struct Counters {
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
    chunks_delivered: AtomicU64,
}

impl Counters {
    fn reset(&self) {
        self.bytes_read.store(0, Ordering::Relaxed);
        self.bytes_written.store(0, Ordering::Relaxed);
        self.chunks_delivered.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time snapshot of a port, for host-side health checks.
#[derive(Debug, Clone, Serialize)]
pub struct PortStatus {
    pub name: String,
    pub state: PortState,
    pub reader: ReaderState,
    pub config: Option<LineConfig>,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub chunks_delivered: u64,
    /// Why the reader exited early, if it did. The port still reports
    /// `Open` in that situation; this field is the passive way to see it.
    pub last_reader_error: Option<String>,
}

/// Everything that only exists while the port is open. Field order matters:
/// the reader is joined before the write handle is released.
struct OpenInner {
    reader: ReaderLoop,
    writer: Box<dyn SerialDevice>,
    config: LineConfig,
}

/// One managed serial port.
///
/// Writes take `&mut self`, so a single `Port` has a single writer by
/// construction; callers sharing a port across threads wrap it in a mutex
/// (as [`crate::manager::PortManager`] does). The data callback must not
/// call [`Port::close`] or [`Port::open`] on its own port — close joins the
/// reader thread the callback runs on, which would deadlock.
pub struct Port {
    name: String,
    options: PortOptions,
    factory: Arc<dyn DeviceFactory>,
    callback: CallbackSlot,
    counters: Arc<Counters>,
    inner: Option<OpenInner>,
}

impl Port {
    /// A closed port over the system serial backend.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_options(name, PortOptions::default())
    }

    pub fn with_options(name: impl Into<String>, options: PortOptions) -> Self {
        Self::with_factory(name, options, Arc::new(SystemDeviceFactory))
    }

    /// Inject a device factory; how tests substitute [`crate::mock`] devices.
    pub fn with_factory(
        name: impl Into<String>,
        options: PortOptions,
        factory: Arc<dyn DeviceFactory>,
    ) -> Self {
        Self {
            name: name.into(),
            options,
            factory,
            callback: Arc::new(RwLock::new(None)),
            counters: Arc::new(Counters::default()),
            inner: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> PortState {
        if self.inner.is_some() {
            PortState::Open
        } else {
            PortState::Closed
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == PortState::Open
    }

    /// Whether the background reader is alive and delivering. Can be false
    /// while the port still reports open: the reader exits silently on an
    /// unrecoverable read failure and nothing moves the state machine until
    /// the caller acts.
    pub fn is_receiving(&self) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|inner| inner.reader.is_running())
    }

    pub fn reader_state(&self) -> ReaderState {
        self.inner
            .as_ref()
            .map_or(ReaderState::NotStarted, |inner| inner.reader.state())
    }

    /// The configuration the port was opened with, while open.
    pub fn config(&self) -> Option<LineConfig> {
        self.inner.as_ref().map(|inner| inner.config)
    }

    /// Why the reader exited early, if it did.
    pub fn last_reader_error(&self) -> Option<String> {
        self.inner.as_ref().and_then(|inner| inner.reader.failure())
    }

    /// Open the device and start reading.
    ///
    /// Opening an already-open port closes the previous session first:
    /// re-open replaces, never stacks. On any intermediate failure every
    /// partially-acquired resource is released and the port is left closed;
    /// `Ok` means the handle is live and the reader launched.
    pub fn open(&mut self, config: LineConfig) -> Result<(), PortError> {
        if self.inner.is_some() {
            debug!("{}: open while open, replacing previous session", self.name);
            self.close()?;
        }

        let settings = config.translate();
        let device = self
            .factory
            .open(&self.name, &settings, self.options.read_poll)?;
        let reader_handle = device.try_clone()?;

        self.counters.reset();
        let callback = Arc::clone(&self.callback);
        let counters = Arc::clone(&self.counters);
        let on_chunk = move |bytes: &[u8]| {
            counters
                .bytes_read
                .fetch_add(bytes.len() as u64, Ordering::Relaxed);
            counters.chunks_delivered.fetch_add(1, Ordering::Relaxed);
            // Capture the current callback, then invoke without holding the
            // slot lock so registration never blocks on a delivery.
            let delivered = callback.read().clone();
            if let Some(cb) = delivered {
                cb(bytes);
            }
        };

        let reader = ReaderLoop::start(&self.name, reader_handle, on_chunk)?;
        self.inner = Some(OpenInner {
            reader,
            writer: device,
            config,
        });
        info!(
            "{}: opened at {} baud, reading in {}-byte chunks",
            self.name,
            config.baud_rate,
            crate::reader::MAX_CHUNK
        );
        Ok(())
    }

    /// Stop the reader, join it, release the handle.
    ///
    /// Idempotent: closing a closed (or never-opened) port is a no-op, not
    /// an error. Blocks for at most roughly one read-poll interval. Must not
    /// be called from the data callback.
    pub fn close(&mut self) -> Result<(), PortError> {
        let Some(mut inner) = self.inner.take() else {
            debug!("{}: close on closed port (no-op)", self.name);
            return Ok(());
        };
        inner.reader.stop();
        drop(inner);
        info!("{}: closed", self.name);
        Ok(())
    }

    /// Transmit `bytes`, returning how many the OS accepted.
    ///
    /// Never retried internally; a short write or failure is the caller's
    /// decision to handle. Safe to call while the reader is blocked in a
    /// read on the same device. Does not alter port state, even on failure.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize, PortError> {
        let inner = self.inner.as_mut().ok_or(PortError::NotOpen)?;
        if bytes.is_empty() {
            return Err(PortError::EmptyInput);
        }
        let written = inner.writer.write(bytes)?;
        self.counters
            .bytes_written
            .fetch_add(written as u64, Ordering::Relaxed);
        Ok(written)
    }

    /// Replace the data callback. Single slot, last writer wins; chunks
    /// already being delivered complete with the callback captured at
    /// invocation start.
    pub fn set_data_callback<F>(&self, callback: F)
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        *self.callback.write() = Some(Arc::new(callback));
    }

    /// Drop the registered callback; future chunks are discarded.
    pub fn clear_data_callback(&self) {
        *self.callback.write() = None;
    }

    pub fn status(&self) -> PortStatus {
        PortStatus {
            name: self.name.clone(),
            state: self.state(),
            reader: self.reader_state(),
            config: self.config(),
            bytes_read: self.counters.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.counters.bytes_written.load(Ordering::Relaxed),
            chunks_delivered: self.counters.chunks_delivered.load(Ordering::Relaxed),
            last_reader_error: self.last_reader_error(),
        }
    }
}

impl fmt::Debug for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Port")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("reader", &self.reader_state())
            .finish_non_exhaustive()
    }
}

impl Drop for Port {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
