//! AtDevice -- [`CellularDevice`] implementation driven by a [`DeviceSpec`].
//!
//! Each intent looks up its template, renders it, runs one transaction on
//! the shared [`AtConnection`], and parses the classified reply. The
//! connection lives behind a `tokio::sync::Mutex` so the public API can
//! take `&self`; the lock is held for exactly one transaction, or for the
//! notification wait plus transaction in [`receive_datagram`](CellularDevice::receive_datagram).

use std::fmt::Display;
use std::net::IpAddr;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use atlab_at_io::{AtConfig, AtConnection, Transaction};
use atlab_core::error::Result;
use atlab_core::transport::Transport;
use atlab_core::{CellularDevice, DeviceInfo, Protocol, RadioState, SendFlag, SocketHandle};

use crate::commands;
use crate::spec::{render, DeviceSpec, Intent};

/// A cellular module driven through AT command templates.
pub struct AtDevice {
    conn: Mutex<AtConnection>,
    spec: DeviceSpec,
    info: DeviceInfo,
}

impl AtDevice {
    /// Create a device over an already open transport.
    ///
    /// `baud_rate` is recorded in [`DeviceInfo`]; the transport is assumed
    /// to be running at it already.
    pub fn new(
        transport: Box<dyn Transport>,
        spec: DeviceSpec,
        config: AtConfig,
        baud_rate: u32,
    ) -> Self {
        let info = DeviceInfo {
            family: spec.name.clone(),
            baud_rate,
        };
        AtDevice {
            conn: Mutex::new(AtConnection::new(transport, config)),
            spec,
            info,
        }
    }

    /// The template set this device was built with.
    pub fn spec(&self) -> &DeviceSpec {
        &self.spec
    }

    /// Run a fixed command and require `OK`.
    async fn execute(&self, command: &str) -> Result<Transaction> {
        let mut conn = self.conn.lock().await;
        conn.transact(command).await?.into_result()
    }

    /// Render and run the template for `intent`.
    async fn run_intent(
        &self,
        intent: Intent,
        params: &[(&str, &(dyn Display + Sync))],
    ) -> Result<Transaction> {
        let template = self.spec.require(intent)?;
        let command = render(template, params)?;
        self.execute(&command).await.inspect_err(|e| {
            warn!(family = %self.spec.name, intent = %intent, error = %e, "Intent failed");
        })
    }
}

#[async_trait]
impl CellularDevice for AtDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    async fn check_alive(&self) -> Result<()> {
        info!("Testing serial device");
        self.execute(commands::PING).await?;
        info!("Device responds OK");
        Ok(())
    }

    async fn firmware_version(&self) -> Result<Vec<String>> {
        let tx = self.run_intent(Intent::FirmwareVersion, &[]).await?;
        for line in &tx.response {
            info!(firmware = %line, "Firmware version");
        }
        Ok(tx.response)
    }

    async fn imei(&self) -> Result<u64> {
        let tx = self.execute(commands::IMEI_QUERY).await?;
        commands::parse_imei(&tx.notifications)
    }

    async fn imsi(&self) -> Result<u64> {
        let tx = self.execute(commands::IMSI_QUERY).await?;
        commands::parse_identity_line(&tx.response)
    }

    async fn reboot(&self) -> Result<()> {
        info!(family = %self.spec.name, "Rebooting module");
        self.run_intent(Intent::Reboot, &[]).await?;
        info!("Rebooted OK");
        Ok(())
    }

    async fn set_radio(&self, state: RadioState) -> Result<()> {
        info!(state = ?state, "Setting radio functionality");
        self.run_intent(Intent::Radio, &[("state", &state.at_value())])
            .await?;
        Ok(())
    }

    async fn set_apn(&self, apn: &str) -> Result<()> {
        info!(apn, "Setting APN");
        self.run_intent(Intent::ConfigApn, &[("apn", &apn)]).await?;
        Ok(())
    }

    async fn auto_operator_selection(&self) -> Result<()> {
        info!("Selecting operator automatically");
        self.run_intent(Intent::AutoOperatorSelection, &[]).await?;
        Ok(())
    }

    async fn disable_edrx(&self) -> Result<()> {
        info!("Disabling eDRX");
        self.run_intent(Intent::DisableEdrx, &[]).await?;
        info!("eDRX disabled");
        Ok(())
    }

    async fn power_save_mode(
        &self,
        enabled: bool,
        periodic_timer: u8,
        active_time: u8,
    ) -> Result<()> {
        info!(enabled, periodic_timer, active_time, "Configuring power save mode");
        self.run_intent(
            Intent::PowerSaveMode,
            &[
                ("enabled", &commands::enabled_flag(enabled)),
                ("periodic_timer", &commands::timer_bits(periodic_timer)),
                ("active_time", &commands::timer_bits(active_time)),
            ],
        )
        .await?;
        info!("Power save mode configured");
        Ok(())
    }

    async fn registration_status(&self) -> Result<u32> {
        let tx = self.run_intent(Intent::RegistrationStatus, &[]).await?;
        let status = commands::parse_registration_status(&tx.notifications)
            .inspect_err(|e| warn!(error = %e, "Registration status unavailable"))?;
        debug!(status, "Registration status");
        Ok(status)
    }

    async fn create_socket(&self, protocol: Protocol, listen_port: u16) -> Result<SocketHandle> {
        info!(%protocol, listen_port, "Creating socket");
        let intent = match protocol {
            Protocol::Udp => Intent::CreateUdpSocket,
            Protocol::Tcp => Intent::CreateTcpSocket,
        };
        let tx = self.run_intent(intent, &[("port", &listen_port)]).await?;
        let socket = commands::parse_socket_handle(&tx.response, &tx.notifications)?;
        info!(%socket, "Socket created");
        Ok(socket)
    }

    async fn close_socket(&self, socket: SocketHandle) -> Result<()> {
        debug!(%socket, "Closing socket");
        self.run_intent(Intent::CloseSocket, &[("socket", &socket)])
            .await?;
        Ok(())
    }

    async fn send_datagram(
        &self,
        socket: SocketHandle,
        ip: IpAddr,
        port: u16,
        flag: SendFlag,
        payload: &[u8],
    ) -> Result<()> {
        info!(%socket, %ip, port, flag = ?flag, bytes = payload.len(), "Sending datagram");
        self.run_intent(
            Intent::SendDatagram,
            &[
                ("socket", &socket),
                ("ip", &ip),
                ("port", &port),
                ("flag", &flag.bits()),
                ("flag_hex", &commands::flag_hex(flag)),
                ("length", &payload.len()),
                ("payload", &commands::payload_hex(payload)),
            ],
        )
        .await?;
        info!("Datagram sent");
        Ok(())
    }

    async fn receive_datagram(&self, socket: SocketHandle, expected_len: usize) -> Result<Vec<u8>> {
        info!(%socket, expected_len, "Receiving datagram");
        let template = self.spec.require(Intent::ReceiveDatagram)?;
        let command = render(
            template,
            &[("socket", &socket), ("length", &expected_len)],
        )?;

        let mut conn = self.conn.lock().await;
        if let Some(prefix) = self.spec.indication_prefix() {
            let line = conn.wait_for_urc(prefix).await?;
            let detail = line.strip_prefix(prefix).unwrap_or(&line);
            info!(indication = detail.trim_start_matches(':').trim(), "Data waiting");
        }
        let tx = conn.transact(&command).await?.into_result()?;
        drop(conn);

        let Some(line) = tx.response.first() else {
            debug!("Receive returned no data line");
            return Ok(Vec::new());
        };
        let datagram = commands::parse_received_datagram(line)?;
        info!(
            from = %datagram.ip,
            port = datagram.port,
            bytes = datagram.payload.len(),
            remaining = datagram.remaining,
            "Datagram received"
        );
        Ok(datagram.payload)
    }

    async fn close(&self) -> Result<()> {
        self.conn.lock().await.close().await
    }
}
