//! Background reader loop.
//!
//! One [`ReaderLoop`] runs per open port. It repeatedly issues bounded reads
//! against its own clone of the device handle and hands every non-empty
//! chunk to the delivery closure, in arrival order. Stopping is cooperative:
//! [`ReaderLoop::stop`] flips the stop flag and joins, and because every read
//! returns within the device's poll timeout, the join is bounded by roughly
//! one poll interval.
//!
//! The loop never touches port state. If it dies on an unrecoverable read
//! failure the port still reports itself open; the failure is parked where
//! [`ReaderLoop::failure`] (and the port's status) can report it on request.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::device::SerialDevice;
use crate::error::PortError;

/// Upper bound on a single delivered chunk, and the reader's buffer size.
pub const MAX_CHUNK: usize = 4096;

/// Consecutive zero-byte reads after which the device is presumed gone and
/// the reader exits. A timed-out read (line idle) resets the streak; only
/// back-to-back `Ok(0)` results count.
pub const ZERO_READ_DISCONNECT_THRESHOLD: u32 = 10;

/// Observable reader lifecycle, derived from the stop/exit flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReaderState {
    /// No reader exists (port closed).
    NotStarted,
    Running,
    /// Stop requested, thread not yet finished.
    Stopping,
    Stopped,
}

/// Handle to a running reader thread.
pub struct ReaderLoop {
    port_name: String,
    stop: Arc<AtomicBool>,
    exited: Arc<AtomicBool>,
    failure: Arc<Mutex<Option<PortError>>>,
    thread: Option<JoinHandle<()>>,
}

/// Sets the exited flag no matter how the thread unwinds.
struct ExitFlag(Arc<AtomicBool>);

impl Drop for ExitFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

impl ReaderLoop {
    /// Spawn the reader thread over `device`. `on_chunk` is invoked on the
    /// reader thread once per non-empty read, in arrival order.
    pub fn start<F>(
        port_name: &str,
        device: Box<dyn SerialDevice>,
        on_chunk: F,
    ) -> Result<Self, PortError>
    where
        F: Fn(&[u8]) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let exited = Arc::new(AtomicBool::new(false));
        let failure = Arc::new(Mutex::new(None));

        let thread = thread::Builder::new()
            .name(format!("serial-read-{port_name}"))
            .spawn({
                let name = port_name.to_string();
                let stop = Arc::clone(&stop);
                let exit_flag = ExitFlag(Arc::clone(&exited));
                let failure = Arc::clone(&failure);
                move || {
                    let _exit_flag = exit_flag;
                    run(&name, device, &stop, &failure, on_chunk);
                }
            })?;

        Ok(Self {
            port_name: port_name.to_string(),
            stop,
            exited,
            failure,
            thread: Some(thread),
        })
    }

    pub fn state(&self) -> ReaderState {
        if self.exited.load(Ordering::Relaxed) {
            ReaderState::Stopped
        } else if self.stop.load(Ordering::Relaxed) {
            ReaderState::Stopping
        } else {
            ReaderState::Running
        }
    }

    /// Whether the loop is still alive and delivering.
    pub fn is_running(&self) -> bool {
        self.state() == ReaderState::Running
    }

    /// The failure that terminated the loop early, if any. Clean stops and
    /// shutdown races leave nothing here.
    pub fn failure(&self) -> Option<String> {
        self.failure.lock().as_ref().map(|e| e.to_string())
    }

    /// Signal stop and block until the thread has fully exited. Bounded by
    /// roughly one device poll interval. Idempotent; must not be called from
    /// the delivery callback (the join would deadlock).
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!("{}: reader thread panicked", self.port_name);
                self.exited.store(true, Ordering::Relaxed);
            }
        }
    }
}

impl Drop for ReaderLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Classify a failed read: while stopping, device errors are the expected
/// result of tearing the handle down under the reader, not faults.
fn classify_read_failure(e: io::Error, stopping: bool) -> PortError {
    if stopping {
        PortError::Canceled
    } else {
        PortError::Io(e)
    }
}

fn run<F>(
    port_name: &str,
    mut device: Box<dyn SerialDevice>,
    stop: &AtomicBool,
    failure: &Mutex<Option<PortError>>,
    on_chunk: F,
) where
    F: Fn(&[u8]),
{
    let mut buf = [0u8; MAX_CHUNK];
    let mut zero_reads: u32 = 0;
    debug!("{}: reader running", port_name);

    while !stop.load(Ordering::Relaxed) {
        match device.read(&mut buf) {
            Ok(0) => {
                zero_reads += 1;
                if zero_reads >= ZERO_READ_DISCONNECT_THRESHOLD {
                    warn!(
                        "{}: {} consecutive empty reads, device presumed gone, reader exiting",
                        port_name, zero_reads
                    );
                    *failure.lock() = Some(PortError::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "device stopped producing data",
                    )));
                    return;
                }
            }
            Ok(n) => {
                zero_reads = 0;
                on_chunk(&buf[..n]);
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                // Line idle. Not a disconnect signal.
                zero_reads = 0;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                match classify_read_failure(e, stop.load(Ordering::Relaxed)) {
                    err @ PortError::Canceled => debug!("{}: {}", port_name, err),
                    err => {
                        warn!("{}: reader exiting after read failure: {}", port_name, err);
                        *failure.lock() = Some(err);
                    }
                }
                return;
            }
        }
    }
    debug!("{}: reader stopped", port_name);
}
