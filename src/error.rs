//! Engine error types.
//!
//! Every failure the engine can surface is a [`PortError`]. Each variant maps
//! to a short machine-readable code (see [`PortError::code`]) so host
//! applications can branch without parsing display strings.

use thiserror::Error;

/// Errors surfaced by port lifecycle and I/O operations.
#[derive(Debug, Error)]
pub enum PortError {
    /// The named serial device does not exist on this system.
    #[error("serial device not found: {0}")]
    NotFound(String),

    /// The OS refused access to the device (permissions).
    #[error("access denied opening serial device: {0}")]
    AccessDenied(String),

    /// The device is held open by another process or handle.
    #[error("serial device already in use: {0}")]
    AlreadyOpen(String),

    /// The OS or platform I/O layer refused the requested line settings.
    #[error("line settings rejected: {0}")]
    ConfigurationRejected(String),

    /// A raw configuration value could not be mapped into the typed
    /// configuration (boundary validation, before the core is reached).
    #[error("invalid line configuration: {0}")]
    InvalidConfig(String),

    /// The operation requires an open port.
    #[error("port is not open")]
    NotOpen,

    /// A write of zero bytes was requested; rejected rather than silently
    /// reported as success.
    #[error("refusing to write zero bytes")]
    EmptyInput,

    /// An I/O failure during read or write. The OS error code, when present,
    /// is available via [`PortError::os_code`].
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// The operation was interrupted by shutdown. Expected during close();
    /// never an error in that context.
    #[error("operation canceled during shutdown")]
    Canceled,
}

impl PortError {
    /// Create a `NotFound` error from a device name.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    /// Create an `AccessDenied` error from a device name.
    pub fn access_denied(name: impl Into<String>) -> Self {
        Self::AccessDenied(name.into())
    }

    /// Create an `AlreadyOpen` error from a device name.
    pub fn already_open(name: impl Into<String>) -> Self {
        Self::AlreadyOpen(name.into())
    }

    /// Create a `ConfigurationRejected` error from a reason.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::ConfigurationRejected(reason.into())
    }

    /// Create an `InvalidConfig` error from a reason.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }

    /// Short machine-readable code identifying the error class.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::AccessDenied(_) => "access_denied",
            Self::AlreadyOpen(_) => "already_open",
            Self::ConfigurationRejected(_) => "configuration_rejected",
            Self::InvalidConfig(_) => "invalid_config",
            Self::NotOpen => "not_open",
            Self::EmptyInput => "empty_input",
            Self::Io(_) => "io_failure",
            Self::Canceled => "canceled",
        }
    }

    /// The raw OS error code for I/O failures, when the platform provided one.
    pub fn os_code(&self) -> Option<i32> {
        match self {
            Self::Io(e) => e.raw_os_error(),
            _ => None,
        }
    }
}
