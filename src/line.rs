//! Line configuration and its translation to OS line settings.
//!
//! [`LineConfig`] is the engine-facing description of a serial line. It is
//! deliberately wider than what any single platform backend accepts: every
//! standard UART framing (including 1.5 stop bits and mark/space parity) can
//! be represented and translated. Whether the OS accepts the translated
//! settings is decided later, when a device is acquired.
//!
//! [`LineConfig::translate`] is pure and total: it never fails and never
//! touches the OS.

use serde::{Deserialize, Serialize};

use crate::error::PortError;

/// Default baud rate applied when none is specified.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    #[default]
    Eight,
}

impl DataBits {
    /// Character size in bits, as the OS record expects it.
    pub fn bits(self) -> u8 {
        match self {
            Self::Five => 5,
            Self::Six => 6,
            Self::Seven => 7,
            Self::Eight => 8,
        }
    }
}

impl TryFrom<u8> for DataBits {
    type Error = PortError;

    /// Raw encoding is the literal bit count: 5, 6, 7 or 8.
    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            5 => Ok(Self::Five),
            6 => Ok(Self::Six),
            7 => Ok(Self::Seven),
            8 => Ok(Self::Eight),
            other => Err(PortError::invalid(format!(
                "data bits must be 5-8, got {other}"
            ))),
        }
    }
}

/// Number of stop bits terminating each character.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBits {
    #[default]
    One,
    OnePointFive,
    Two,
}

impl TryFrom<u8> for StopBits {
    type Error = PortError;

    /// Raw encoding follows the Windows DCB convention:
    /// 0 = one, 1 = one-and-a-half, 2 = two.
    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::One),
            1 => Ok(Self::OnePointFive),
            2 => Ok(Self::Two),
            other => Err(PortError::invalid(format!(
                "stop bits selector must be 0-2, got {other}"
            ))),
        }
    }
}

/// Parity scheme for each character.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
    Mark,
    Space,
}

impl TryFrom<u8> for Parity {
    type Error = PortError;

    /// Raw encoding follows the Windows DCB convention:
    /// 0 = none, 1 = odd, 2 = even, 3 = mark, 4 = space.
    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::None),
            1 => Ok(Self::Odd),
            2 => Ok(Self::Even),
            3 => Ok(Self::Mark),
            4 => Ok(Self::Space),
            other => Err(PortError::invalid(format!(
                "parity selector must be 0-4, got {other}"
            ))),
        }
    }
}

/// Flow control mode for the line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowControl {
    #[default]
    None,
    /// XON/XOFF in both directions.
    Software,
    /// RTS/CTS handshaking.
    Hardware,
}

impl TryFrom<u8> for FlowControl {
    type Error = PortError;

    /// Raw encoding: 0 = none, 1 = software (XON/XOFF), 2 = hardware (RTS/CTS).
    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::None),
            1 => Ok(Self::Software),
            2 => Ok(Self::Hardware),
            other => Err(PortError::invalid(format!(
                "flow control selector must be 0-2, got {other}"
            ))),
        }
    }
}

/// Complete description of a serial line, as the host configures it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineConfig {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
    pub flow_control: FlowControl,
}

impl Default for LineConfig {
    /// 9600 baud, 8 data bits, no parity, 1 stop bit, no flow control.
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DataBits::default(),
            stop_bits: StopBits::default(),
            parity: Parity::default(),
            flow_control: FlowControl::default(),
        }
    }
}

impl LineConfig {
    /// Build a configuration from raw numeric selectors, as received over a
    /// host boundary. Selector encodings are documented on the respective
    /// `TryFrom<u8>` impls. A zero baud rate is rejected here rather than
    /// letting the OS produce an opaque failure later.
    pub fn from_raw(
        baud_rate: u32,
        data_bits: u8,
        stop_bits: u8,
        parity: u8,
        flow_control: u8,
    ) -> Result<Self, PortError> {
        if baud_rate == 0 {
            return Err(PortError::invalid("baud rate must be non-zero"));
        }
        Ok(Self {
            baud_rate,
            data_bits: DataBits::try_from(data_bits)?,
            stop_bits: StopBits::try_from(stop_bits)?,
            parity: Parity::try_from(parity)?,
            flow_control: FlowControl::try_from(flow_control)?,
        })
    }

    /// Translate into the OS line-settings record.
    ///
    /// Pure and total: every representable configuration translates, even
    /// ones a given platform backend will later refuse. The parity-check
    /// flag is enabled exactly when a parity scheme is selected, and the
    /// three flow-control flags are written for every mode so a translation
    /// can never inherit stale flags from a previous configuration.
    pub fn translate(&self) -> LineSettings {
        let (hw_flow_out, sw_flow_out, sw_flow_in) = match self.flow_control {
            FlowControl::None => (false, false, false),
            FlowControl::Software => (false, true, true),
            FlowControl::Hardware => (true, false, false),
        };
        LineSettings {
            baud_rate: self.baud_rate,
            char_size: self.data_bits.bits(),
            stop_bits: self.stop_bits,
            parity: self.parity,
            parity_check: self.parity != Parity::None,
            hw_flow_out,
            sw_flow_out,
            sw_flow_in,
        }
    }
}

/// The OS-facing line-settings record produced by [`LineConfig::translate`].
///
/// Field layout mirrors what serial drivers actually consume: a numeric baud
/// rate and character size, selector enums for stop bits and parity, plus the
/// individual enable flags that platform control blocks carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSettings {
    pub baud_rate: u32,
    pub char_size: u8,
    pub stop_bits: StopBits,
    pub parity: Parity,
    /// Whether the receiver should verify parity; on exactly when
    /// `parity != Parity::None`.
    pub parity_check: bool,
    /// RTS/CTS output handshaking.
    pub hw_flow_out: bool,
    /// XON/XOFF on transmit.
    pub sw_flow_out: bool,
    /// XON/XOFF on receive.
    pub sw_flow_in: bool,
}
