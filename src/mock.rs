//! In-memory mock devices for tests.
//!
//! [`MockDevice`] implements [`SerialDevice`] over a shared event queue, so
//! tests can script exactly what a port produces: data frames, zero-length
//! reads, injected I/O errors, or nothing at all (which surfaces as a
//! `TimedOut` read after the configured poll interval, just like a real
//! handle). Clones share state, mirroring how a cloned OS handle refers to
//! the same device.
//!
//! ```
//! use serial_port_engine::device::SerialDevice;
//! use serial_port_engine::mock::MockDevice;
//!
//! let mut mock = MockDevice::new("COM3");
//! mock.push_frame(b"OK\r\n");
//!
//! let mut buf = [0u8; 16];
//! let n = mock.read(&mut buf).unwrap();
//! assert_eq!(&buf[..n], b"OK\r\n");
//! ```

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::device::{DeviceFactory, SerialDevice};
use crate::error::PortError;
use crate::line::LineSettings;

const DEFAULT_MOCK_READ_TIMEOUT: Duration = Duration::from_millis(25);

/// One scripted reader-side event.
enum MockEvent {
    /// Delivered as a single read (split only if the caller's buffer is
    /// smaller; the remainder stays queued).
    Data(Vec<u8>),
    /// A single `Ok(0)` read.
    ZeroRead,
    /// A single read error of the given kind.
    Error(io::ErrorKind),
}

#[derive(Default)]
struct MockState {
    queue: VecDeque<MockEvent>,
    /// Once set, every read with an empty queue returns `Ok(0)` immediately.
    disconnected: bool,
    writes: Vec<Vec<u8>>,
    write_error: Option<io::ErrorKind>,
    write_cap: Option<usize>,
    fail_next_clone: bool,
}

struct MockShared {
    state: Mutex<MockState>,
    readable: Condvar,
}

/// Scriptable serial device. Cheap to clone; clones share the device state.
#[derive(Clone)]
pub struct MockDevice {
    name: String,
    read_timeout: Duration,
    shared: Arc<MockShared>,
}

impl MockDevice {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            read_timeout: DEFAULT_MOCK_READ_TIMEOUT,
            shared: Arc::new(MockShared {
                state: Mutex::new(MockState::default()),
                readable: Condvar::new(),
            }),
        }
    }

    /// How long a read blocks before reporting `TimedOut` when nothing is
    /// queued.
    pub fn set_read_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }

    /// Queue bytes to be delivered as one read.
    pub fn push_frame(&self, bytes: &[u8]) {
        let mut state = self.shared.state.lock();
        state.queue.push_back(MockEvent::Data(bytes.to_vec()));
        drop(state);
        self.shared.readable.notify_all();
    }

    /// Queue a single zero-length read.
    pub fn push_zero_read(&self) {
        let mut state = self.shared.state.lock();
        state.queue.push_back(MockEvent::ZeroRead);
        drop(state);
        self.shared.readable.notify_all();
    }

    /// Queue a single read error.
    pub fn push_read_error(&self, kind: io::ErrorKind) {
        let mut state = self.shared.state.lock();
        state.queue.push_back(MockEvent::Error(kind));
        drop(state);
        self.shared.readable.notify_all();
    }

    /// Make every subsequent read (after the queue drains) return `Ok(0)`,
    /// like a device that has gone away.
    pub fn disconnect(&self) {
        let mut state = self.shared.state.lock();
        state.disconnected = true;
        drop(state);
        self.shared.readable.notify_all();
    }

    /// Make every subsequent write fail with the given kind.
    pub fn fail_writes(&self, kind: io::ErrorKind) {
        self.shared.state.lock().write_error = Some(kind);
    }

    /// Cap how many bytes a single write accepts, forcing short writes.
    pub fn set_write_cap(&self, cap: usize) {
        self.shared.state.lock().write_cap = Some(cap);
    }

    /// Make the next `try_clone` fail.
    pub fn fail_next_clone(&self) {
        self.shared.state.lock().fail_next_clone = true;
    }

    /// Every write the device accepted, one entry per call.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.shared.state.lock().writes.clone()
    }

    /// All accepted bytes, flattened in order.
    pub fn written(&self) -> Vec<u8> {
        self.shared.state.lock().writes.concat()
    }
}

impl SerialDevice for MockDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.shared.state.lock();
        loop {
            match state.queue.pop_front() {
                Some(MockEvent::Data(mut bytes)) => {
                    if bytes.len() > buf.len() {
                        let rest = bytes.split_off(buf.len());
                        state.queue.push_front(MockEvent::Data(rest));
                    }
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    return Ok(bytes.len());
                }
                Some(MockEvent::ZeroRead) => return Ok(0),
                Some(MockEvent::Error(kind)) => {
                    return Err(io::Error::new(kind, "injected read error"))
                }
                None if state.disconnected => return Ok(0),
                None => {
                    let result = self
                        .shared
                        .readable
                        .wait_for(&mut state, self.read_timeout);
                    if result.timed_out() && state.queue.is_empty() && !state.disconnected {
                        return Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            "mock read timed out",
                        ));
                    }
                }
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.shared.state.lock();
        if let Some(kind) = state.write_error {
            return Err(io::Error::new(kind, "injected write error"));
        }
        let accepted = state.write_cap.map_or(buf.len(), |cap| cap.min(buf.len()));
        state.writes.push(buf[..accepted].to_vec());
        Ok(accepted)
    }

    fn try_clone(&self) -> io::Result<Box<dyn SerialDevice>> {
        let mut state = self.shared.state.lock();
        if state.fail_next_clone {
            state.fail_next_clone = false;
            return Err(io::Error::other("injected clone failure"));
        }
        drop(state);
        Ok(Box::new(self.clone()))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Default)]
struct MockFactoryState {
    devices: HashMap<String, MockDevice>,
    opens: Vec<(String, LineSettings, Duration)>,
    fail_next_open: Option<PortError>,
}

/// [`DeviceFactory`] that hands out [`MockDevice`] clones and records every
/// open so tests can assert what settings actually reached the device layer.
#[derive(Default, Clone)]
pub struct MockDeviceFactory {
    inner: Arc<Mutex<MockFactoryState>>,
}

impl MockDeviceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or fetch) the mock device behind `name`. The returned handle
    /// shares state with every handle later produced by [`DeviceFactory::open`],
    /// so tests can keep scripting it after the engine has opened the port.
    pub fn device(&self, name: &str) -> MockDevice {
        let mut inner = self.inner.lock();
        inner
            .devices
            .entry(name.to_string())
            .or_insert_with(|| MockDevice::new(name))
            .clone()
    }

    /// Make the next open fail with `err`, regardless of the name.
    pub fn fail_next_open(&self, err: PortError) {
        self.inner.lock().fail_next_open = Some(err);
    }

    /// Settings passed to the most recent successful open.
    pub fn last_settings(&self) -> Option<LineSettings> {
        self.inner.lock().opens.last().map(|(_, s, _)| *s)
    }

    /// Read timeout passed to the most recent successful open.
    pub fn last_read_timeout(&self) -> Option<Duration> {
        self.inner.lock().opens.last().map(|(_, _, t)| *t)
    }

    /// Number of successful opens across all devices.
    pub fn open_count(&self) -> usize {
        self.inner.lock().opens.len()
    }
}

impl DeviceFactory for MockDeviceFactory {
    fn open(
        &self,
        name: &str,
        settings: &LineSettings,
        read_timeout: Duration,
    ) -> Result<Box<dyn SerialDevice>, PortError> {
        let mut inner = self.inner.lock();
        if let Some(err) = inner.fail_next_open.take() {
            return Err(err);
        }
        let Some(device) = inner.devices.get(name) else {
            return Err(PortError::not_found(name));
        };
        let mut handle = device.clone();
        handle.read_timeout = read_timeout;
        inner
            .opens
            .push((name.to_string(), *settings, read_timeout));
        Ok(Box::new(handle))
    }
}
