//! Serial Port Engine
//!
//! Managed, bidirectional serial port I/O for host applications: open a port
//! with explicit line settings, receive incoming bytes continuously on a
//! background reader while writing from your own thread, and tear the port
//! down deterministically — no leaked handles, no dangling threads.
//!
//! # Modules
//!
//! - `line`: line configuration and its pure translation to OS settings
//! - `device`: the device abstraction the engine is written against
//! - `handle`: system-backed devices via the `serialport` crate
//! - `reader`: the background reader loop
//! - `port`: per-port lifecycle controller (open/close/write/callback)
//! - `manager`: identifier-keyed registry, the host-facing surface
//! - `mock`: scriptable in-memory devices for deterministic tests
//! - `error`: the engine's error taxonomy

pub mod device;
pub mod error;
pub mod handle;
pub mod line;
pub mod manager;
pub mod mock;
pub mod port;
pub mod reader;

// Re-export commonly used types for convenience
pub use device::{DeviceFactory, SerialDevice};
pub use error::PortError;
pub use handle::SystemDeviceFactory;
pub use line::{
    DataBits, FlowControl, LineConfig, LineSettings, Parity, StopBits, DEFAULT_BAUD_RATE,
};
pub use manager::{DataHandler, PortManager};
pub use mock::{MockDevice, MockDeviceFactory};
pub use port::{DataCallback, Port, PortOptions, PortState, PortStatus, DEFAULT_READ_POLL};
pub use reader::{ReaderState, MAX_CHUNK, ZERO_READ_DISCONNECT_THRESHOLD};
