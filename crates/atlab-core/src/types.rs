//! Value types shared by the AT engine, device drivers, and the test app.

use std::fmt;
use std::str::FromStr;

/// Opaque socket identifier returned by a successful socket-creation
/// transaction.
///
/// The caller owns the handle until it is passed to
/// [`close_socket`](crate::device::CellularDevice::close_socket). Handles
/// are never pooled or reused by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketHandle(u32);

impl SocketHandle {
    /// Create a handle from the raw number the module reported.
    pub fn new(raw: u32) -> Self {
        SocketHandle(raw)
    }

    /// Return the raw number as the module knows it.
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SocketHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Radio functionality level requested via the family's radio template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioState {
    /// Minimum functionality, transmitter and receiver off.
    Off,
    /// Full functionality.
    Full,
}

impl RadioState {
    /// The value substituted for `{state}` in the radio template.
    pub fn at_value(&self) -> &'static str {
        match self {
            RadioState::Off => "0",
            RadioState::Full => "1",
        }
    }
}

/// Release-assistance flag attached to an outgoing datagram.
///
/// The module uses these hints to drop the RRC connection early and save
/// power once the expected traffic has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendFlag {
    /// No hint.
    #[default]
    None,
    /// Send with high priority.
    HighPriority,
    /// Release the connection after the next uplink message.
    ReleaseAfterNextMessage,
    /// Release the connection after the next downlink reply.
    ReleaseAfterNextReply,
}

impl SendFlag {
    /// Numeric wire value of the flag.
    pub fn bits(&self) -> u16 {
        match self {
            SendFlag::None => 0x000,
            SendFlag::HighPriority => 0x100,
            SendFlag::ReleaseAfterNextMessage => 0x200,
            SendFlag::ReleaseAfterNextReply => 0x400,
        }
    }
}

/// Transport protocol for a module-side socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Udp,
    Tcp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Udp => write!(f, "UDP"),
            Protocol::Tcp => write!(f, "TCP"),
        }
    }
}

/// Error returned when a string cannot be parsed into a [`Protocol`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseProtocolError(String);

impl fmt::Display for ParseProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown protocol: {}", self.0)
    }
}

impl std::error::Error for ParseProtocolError {}

impl FromStr for Protocol {
    type Err = ParseProtocolError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "UDP" => Ok(Protocol::Udp),
            "TCP" => Ok(Protocol::Tcp),
            _ => Err(ParseProtocolError(s.to_string())),
        }
    }
}

/// Static information about a connected device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Family name, e.g. "SARA-N2".
    pub family: String,
    /// Baud rate the serial link was opened with.
    pub baud_rate: u32,
}
