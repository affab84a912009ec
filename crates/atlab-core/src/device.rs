//! The `CellularDevice` trait -- the intent surface every module family
//! exposes.
//!
//! Test sequences program against `dyn CellularDevice` without knowing
//! which command dialect the attached module speaks. A family that lacks a
//! command for an intent returns [`Error::Unsupported`], which callers
//! treat as a configuration error rather than a transient failure.

use std::net::IpAddr;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::*;

/// Unified asynchronous interface for driving a cellular module.
///
/// Every method that talks to the module is `async` and runs exactly one
/// AT transaction (two for [`receive_datagram`](Self::receive_datagram)
/// when the family announces inbound data with a notification). Calls are
/// serialized on the underlying connection.
#[async_trait]
pub trait CellularDevice: Send + Sync {
    /// Return static information about the device.
    fn info(&self) -> &DeviceInfo;

    /// Send a bare `AT` and expect `OK`.
    async fn check_alive(&self) -> Result<()>;

    /// Query the firmware version; returns the module's response lines.
    async fn firmware_version(&self) -> Result<Vec<String>>;

    /// Read the module's IMEI.
    async fn imei(&self) -> Result<u64>;

    /// Read the SIM's IMSI.
    async fn imsi(&self) -> Result<u64>;

    /// Reboot the module.
    async fn reboot(&self) -> Result<()>;

    /// Set the radio functionality level.
    async fn set_radio(&self, state: RadioState) -> Result<()>;

    /// Configure the access point name.
    async fn set_apn(&self, apn: &str) -> Result<()>;

    /// Switch to automatic operator selection.
    async fn auto_operator_selection(&self) -> Result<()>;

    /// Disable extended idle-mode discontinuous reception.
    async fn disable_edrx(&self) -> Result<()>;

    /// Configure power-save mode.
    ///
    /// `periodic_timer` and `active_time` are the raw 8-bit timer encodings
    /// defined by 3GPP TS 24.008 (unit bits plus value bits).
    async fn power_save_mode(&self, enabled: bool, periodic_timer: u8, active_time: u8)
        -> Result<()>;

    /// Query the EPS registration status code (1 = registered, home network).
    async fn registration_status(&self) -> Result<u32>;

    /// Open a module-side socket bound to `listen_port`.
    async fn create_socket(&self, protocol: Protocol, listen_port: u16) -> Result<SocketHandle>;

    /// Close a module-side socket.
    async fn close_socket(&self, socket: SocketHandle) -> Result<()>;

    /// Send one datagram through an open socket.
    async fn send_datagram(
        &self,
        socket: SocketHandle,
        ip: IpAddr,
        port: u16,
        flag: SendFlag,
        payload: &[u8],
    ) -> Result<()>;

    /// Receive one datagram of up to `expected_len` bytes from an open socket.
    async fn receive_datagram(&self, socket: SocketHandle, expected_len: usize)
        -> Result<Vec<u8>>;

    /// Close the serial connection. Subsequent calls are no-ops.
    async fn close(&self) -> Result<()>;
}
