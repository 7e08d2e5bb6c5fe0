//! System-backed device handles.
//!
//! [`SystemDeviceFactory`] acquires real OS handles through the `serialport`
//! builder, applying the translated line settings and the read poll timeout
//! in one step so a caller never observes a half-configured device. Open
//! failures are classified into the engine's error taxonomy here; everything
//! downstream deals only in [`PortError`].

use std::fmt;
use std::io::{self, Read, Write};
use std::time::Duration;

use tracing::debug;

use crate::device::{DeviceFactory, SerialDevice};
use crate::error::PortError;
use crate::line::{LineSettings, Parity, StopBits};

/// A live OS serial handle.
pub struct SystemDevice {
    inner: Box<dyn serialport::SerialPort>,
    name: String,
}

impl SerialDevice for SystemDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn try_clone(&self) -> io::Result<Box<dyn SerialDevice>> {
        let clone = self.inner.try_clone().map_err(io::Error::from)?;
        Ok(Box::new(SystemDevice {
            inner: clone,
            name: self.name.clone(),
        }))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for SystemDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemDevice")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Factory for real OS serial devices.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDeviceFactory;

impl DeviceFactory for SystemDeviceFactory {
    fn open(
        &self,
        name: &str,
        settings: &LineSettings,
        read_timeout: Duration,
    ) -> Result<Box<dyn SerialDevice>, PortError> {
        let data_bits = convert_char_size(settings.char_size)?;
        let stop_bits = convert_stop_bits(settings.stop_bits)?;
        let parity = convert_parity(settings.parity)?;
        let flow_control = convert_flow_flags(settings)?;

        debug!(
            "opening {} at {} baud ({:?} {:?} {:?} {:?})",
            name, settings.baud_rate, data_bits, parity, stop_bits, flow_control
        );

        let port = serialport::new(name, settings.baud_rate)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(parity)
            .flow_control(flow_control)
            .timeout(read_timeout)
            .open()
            .map_err(|e| classify_open_error(name, e))?;

        Ok(Box::new(SystemDevice {
            inner: port,
            name: name.to_string(),
        }))
    }
}

fn convert_char_size(bits: u8) -> Result<serialport::DataBits, PortError> {
    match bits {
        5 => Ok(serialport::DataBits::Five),
        6 => Ok(serialport::DataBits::Six),
        7 => Ok(serialport::DataBits::Seven),
        8 => Ok(serialport::DataBits::Eight),
        other => Err(PortError::rejected(format!(
            "unsupported character size: {other} bits"
        ))),
    }
}

fn convert_stop_bits(stop_bits: StopBits) -> Result<serialport::StopBits, PortError> {
    match stop_bits {
        StopBits::One => Ok(serialport::StopBits::One),
        StopBits::Two => Ok(serialport::StopBits::Two),
        StopBits::OnePointFive => Err(PortError::rejected(
            "1.5 stop bits are not supported by this platform backend",
        )),
    }
}

fn convert_parity(parity: Parity) -> Result<serialport::Parity, PortError> {
    match parity {
        Parity::None => Ok(serialport::Parity::None),
        Parity::Odd => Ok(serialport::Parity::Odd),
        Parity::Even => Ok(serialport::Parity::Even),
        Parity::Mark | Parity::Space => Err(PortError::rejected(
            "mark/space parity is not supported by this platform backend",
        )),
    }
}

fn convert_flow_flags(settings: &LineSettings) -> Result<serialport::FlowControl, PortError> {
    match (
        settings.hw_flow_out,
        settings.sw_flow_out,
        settings.sw_flow_in,
    ) {
        (false, false, false) => Ok(serialport::FlowControl::None),
        (false, true, true) => Ok(serialport::FlowControl::Software),
        (true, false, false) => Ok(serialport::FlowControl::Hardware),
        _ => Err(PortError::rejected("inconsistent flow-control flags")),
    }
}

/// Map a `serialport` open failure onto the engine taxonomy.
fn classify_open_error(name: &str, e: serialport::Error) -> PortError {
    match e.kind() {
        serialport::ErrorKind::NoDevice => PortError::not_found(name),
        serialport::ErrorKind::InvalidInput => PortError::rejected(e.to_string()),
        serialport::ErrorKind::Io(kind) => classify_io_kind(name, kind, e.to_string()),
        _ => PortError::Io(io::Error::other(e.to_string())),
    }
}

fn classify_io_kind(name: &str, kind: io::ErrorKind, detail: String) -> PortError {
    if kind == io::ErrorKind::NotFound {
        PortError::not_found(name)
    } else if kind == io::ErrorKind::PermissionDenied {
        PortError::access_denied(name)
    } else if kind == busy_kind() {
        PortError::already_open(name)
    } else {
        PortError::Io(io::Error::new(kind, detail))
    }
}

/// The `io::ErrorKind` the running toolchain assigns to the platform's
/// "device busy" code. Comparing kinds this way stays correct whether or not
/// the toolchain has a dedicated variant for it.
#[cfg(unix)]
fn busy_kind() -> io::ErrorKind {
    io::Error::from_raw_os_error(libc::EBUSY).kind()
}

#[cfg(windows)]
fn busy_kind() -> io::ErrorKind {
    io::Error::from_raw_os_error(winapi::shared::winerror::ERROR_SHARING_VIOLATION as i32).kind()
}
