//! Shared test utilities for serial-port-engine integration tests.
//!
//! This module provides common test infrastructure including:
//! - A harness bundling a [`PortManager`] with the mock factory behind it
//! - Channel-backed data handlers for asserting delivery order
//! - Deadline-bounded polling and receive helpers

#![allow(dead_code)]

use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serial_port_engine::mock::{MockDevice, MockDeviceFactory};
use serial_port_engine::{Port, PortManager, PortOptions};

/// Read poll interval used across integration tests. Short, so reader joins
/// and idle waits stay fast.
pub const TEST_READ_POLL: Duration = Duration::from_millis(5);

pub fn test_options() -> PortOptions {
    PortOptions {
        read_poll: TEST_READ_POLL,
    }
}

/// Test harness bundling a manager with its mock device factory.
pub struct TestHarness {
    pub manager: PortManager,
    pub factory: MockDeviceFactory,
}

impl TestHarness {
    pub fn new() -> Self {
        let factory = MockDeviceFactory::new();
        let manager = PortManager::with_factory(Arc::new(factory.clone()), test_options());
        Self { manager, factory }
    }

    /// Register `name` in the factory and return its scripting handle.
    ///
    /// # Example
    /// ```ignore
    /// let harness = TestHarness::new();
    /// let device = harness.device("COM3");
    /// device.push_frame(b"OK\r\n");
    /// ```
    pub fn device(&self, name: &str) -> MockDevice {
        self.factory.device(name)
    }

    /// Route manager deliveries into a channel as `(identifier, bytes)`.
    pub fn collect_data(&self) -> mpsc::Receiver<(String, Vec<u8>)> {
        let (tx, rx) = mpsc::channel();
        self.manager.set_data_handler(move |name, bytes| {
            tx.send((name.to_string(), bytes.to_vec())).ok();
        });
        rx
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Standalone [`Port`] backed by a fresh mock device, for tests below the
/// manager layer.
pub fn mock_port(name: &str) -> (Port, MockDevice) {
    let factory = MockDeviceFactory::new();
    let device = factory.device(name);
    let port = Port::with_factory(name, test_options(), Arc::new(factory));
    (port, device)
}

/// Route a port's deliveries into a channel.
pub fn collect_port_data(port: &Port) -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    port.set_data_callback(move |bytes| {
        tx.send(bytes.to_vec()).ok();
    });
    rx
}

/// Receive one message with a one-second deadline.
pub fn recv_one<T>(rx: &mpsc::Receiver<T>, what: &str) -> T {
    match rx.recv_timeout(Duration::from_secs(1)) {
        Ok(value) => value,
        Err(e) => panic!("timed out waiting for {what}: {e}"),
    }
}

/// Assert nothing arrives on `rx` within a settling window.
pub fn assert_no_delivery<T>(rx: &mpsc::Receiver<T>, what: &str) {
    if rx.recv_timeout(Duration::from_millis(50)).is_ok() {
        panic!("unexpected delivery: {what}");
    }
}

/// Poll `done` until it returns true, panicking after two seconds.
pub fn wait_until(what: &str, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting: {what}");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_port_engine::LineConfig;

    #[test]
    fn test_harness_wires_mock_devices() {
        let harness = TestHarness::new();
        let device = harness.device("MOCK0");
        let rx = harness.collect_data();

        harness.manager.open("MOCK0", LineConfig::default()).unwrap();
        device.push_frame(b"hello");

        let (name, bytes) = recv_one(&rx, "first chunk");
        assert_eq!(name, "MOCK0");
        assert_eq!(bytes, b"hello".to_vec());
        harness.manager.close_all().unwrap();
    }

    #[test]
    fn test_mock_port_helper() {
        let (mut port, device) = mock_port("MOCK0");
        port.open(LineConfig::default()).unwrap();
        port.write(b"ping").unwrap();
        assert_eq!(device.written(), b"ping");
    }
}
