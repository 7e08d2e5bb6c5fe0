//! Identifier-keyed port registry.
//!
//! [`PortManager`] is the surface a host application talks to: every
//! operation takes the port identifier, and received data is fanned out
//! through one manager-wide handler tagged with the identifier it came from.
//! Ports are fully independent; the manager adds no cross-port coordination
//! beyond the map itself.
//!
//! Locking discipline: the registry lock is only ever held to look up or
//! insert an entry, never across device I/O or a reader join, so a slow
//! `close()` on one port cannot stall operations on another.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::info;

use crate::device::DeviceFactory;
use crate::error::PortError;
use crate::handle::SystemDeviceFactory;
use crate::line::LineConfig;
use crate::port::{Port, PortOptions, PortStatus};

/// Manager-wide sink for received data: `(identifier, chunk)`.
pub type DataHandler = Arc<dyn Fn(&str, &[u8]) + Send + Sync + 'static>;

type HandlerSlot = Arc<RwLock<Option<DataHandler>>>;

/// Thread-safe registry of managed ports.
pub struct PortManager {
    ports: Mutex<HashMap<String, Arc<Mutex<Port>>>>,
    factory: Arc<dyn DeviceFactory>,
    options: PortOptions,
    handler: HandlerSlot,
}

impl PortManager {
    /// A manager over the system serial backend with default timing.
    pub fn new() -> Self {
        Self::with_factory(Arc::new(SystemDeviceFactory), PortOptions::default())
    }

    pub fn with_options(options: PortOptions) -> Self {
        Self::with_factory(Arc::new(SystemDeviceFactory), options)
    }

    /// Inject a device factory; how tests substitute [`crate::mock`] devices.
    pub fn with_factory(factory: Arc<dyn DeviceFactory>, options: PortOptions) -> Self {
        Self {
            ports: Mutex::new(HashMap::new()),
            factory,
            options,
            handler: Arc::new(RwLock::new(None)),
        }
    }

    /// Replace the manager-wide data handler. Applies to every port,
    /// including ones already open; chunks mid-delivery complete with the
    /// handler captured when their delivery started. The handler runs on
    /// reader threads and must not call back into `open`/`close`/`close_all`
    /// for the port it is handling (the reader join would deadlock).
    pub fn set_data_handler<F>(&self, handler: F)
    where
        F: Fn(&str, &[u8]) + Send + Sync + 'static,
    {
        *self.handler.write() = Some(Arc::new(handler));
    }

    /// Drop the data handler; received chunks are discarded until a new one
    /// is registered.
    pub fn clear_data_handler(&self) {
        *self.handler.write() = None;
    }

    /// Open `name` with `config`, replacing any session already open under
    /// that identifier.
    pub fn open(&self, name: &str, config: LineConfig) -> Result<(), PortError> {
        let port = self.entry(name);
        let result = port.lock().open(config);
        result
    }

    /// Boundary variant of [`PortManager::open`]: raw numeric selectors are
    /// validated and mapped into [`LineConfig`] before anything touches the
    /// core. Encodings are documented on the `TryFrom<u8>` impls in
    /// [`crate::line`].
    pub fn open_raw(
        &self,
        name: &str,
        baud_rate: u32,
        data_bits: u8,
        stop_bits: u8,
        parity: u8,
        flow_control: u8,
    ) -> Result<(), PortError> {
        let config = LineConfig::from_raw(baud_rate, data_bits, stop_bits, parity, flow_control)?;
        self.open(name, config)
    }

    /// Close `name` and drop it from the registry. Unknown or already-closed
    /// identifiers are a no-op, not an error.
    pub fn close(&self, name: &str) -> Result<(), PortError> {
        let port = self.ports.lock().remove(name);
        match port {
            Some(port) => port.lock().close(),
            None => Ok(()),
        }
    }

    /// Write to the port registered under `name`.
    pub fn write(&self, name: &str, bytes: &[u8]) -> Result<usize, PortError> {
        let port = self.ports.lock().get(name).cloned();
        match port {
            Some(port) => port.lock().write(bytes),
            None => Err(PortError::NotOpen),
        }
    }

    /// Snapshot of the port registered under `name`, if any.
    pub fn status(&self, name: &str) -> Option<PortStatus> {
        let port = self.ports.lock().get(name).cloned();
        port.map(|port| port.lock().status())
    }

    /// Identifiers currently open, sorted.
    pub fn open_ports(&self) -> Vec<String> {
        let ports: Vec<Arc<Mutex<Port>>> = self.ports.lock().values().cloned().collect();
        let mut names: Vec<String> = ports
            .into_iter()
            .filter(|port| port.lock().is_open())
            .map(|port| port.lock().name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Close every managed port. Always succeeds; used on host shutdown.
    pub fn close_all(&self) -> Result<(), PortError> {
        let drained: Vec<(String, Arc<Mutex<Port>>)> = self.ports.lock().drain().collect();
        let count = drained.len();
        for (_, port) in drained {
            port.lock().close()?;
        }
        if count > 0 {
            info!("closed {} managed port(s)", count);
        }
        Ok(())
    }

    /// Fetch or create the registry entry for `name`, with delivery wired to
    /// the manager-wide handler.
    fn entry(&self, name: &str) -> Arc<Mutex<Port>> {
        let mut ports = self.ports.lock();
        Arc::clone(ports.entry(name.to_string()).or_insert_with(|| {
            let port = Port::with_factory(name, self.options, Arc::clone(&self.factory));
            let handler = Arc::clone(&self.handler);
            let identifier = name.to_string();
            port.set_data_callback(move |bytes| {
                let sink = handler.read().clone();
                if let Some(sink) = sink {
                    sink(&identifier, bytes);
                }
            });
            Arc::new(Mutex::new(port))
        }))
    }
}

impl Default for PortManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PortManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortManager")
            .field("ports", &self.ports.lock().len())
            .finish_non_exhaustive()
    }
}
