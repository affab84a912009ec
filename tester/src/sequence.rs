//! The scripted provisioning and connectivity run.
//!
//! ```text
//! Idle -> Configuring -> PollingRegistration -> Ready -> Idle
//!              \                 \                \
//!               +-----------------+----------------+--> Failed
//! ```
//!
//! Configuring reboots the module and applies radio, APN, PSM, and eDRX
//! settings. Registration is polled until the module reports "registered,
//! home network", with bounded error and poll counts. In Ready the run
//! records a power trace in the background while sending a few datagrams,
//! then joins the recording. Nothing is retried except registration polls.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tracing::{info, warn};

use atlab_core::{CellularDevice, Error, Protocol, RadioState, SendFlag};
use atlab_ublox::commands::REGISTERED_HOME;

use crate::recorder::{PowerRecorder, Recording};

/// Payload of a plain connectivity packet.
pub const PACKET_PAYLOAD: &[u8] = b"hi";

/// Payload that asks the echo server to answer.
pub const ECHO_PAYLOAD: &[u8] = b"echo hi";

/// Bytes requested when reading an echo back.
pub const ECHO_READ_LEN: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Configuring,
    PollingRegistration,
    Ready,
    Failed,
}

/// Parameters and timings of one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub apn: String,
    pub server_ip: IpAddr,
    pub server_port: u16,
    pub listen_port: u16,
    pub packets: u32,
    /// Send `echo hi` and read the reply instead of fire-and-forget packets.
    pub echo: bool,
    /// PSM requested periodic TAU, raw 3GPP encoding.
    pub psm_periodic_timer: u8,
    /// PSM requested active time, raw 3GPP encoding.
    pub psm_active_time: u8,
    /// Wait after configuring before the first registration poll.
    pub attach_delay: Duration,
    pub poll_interval: Duration,
    /// Failed polls tolerated; one more fails the run.
    pub max_poll_errors: u32,
    pub max_polls: u32,
    /// Idle time after registering, so the trace starts from a quiet module.
    pub idle_before_record: Duration,
    pub record_duration: Duration,
    /// Gap between starting the recording and the first packet.
    pub lead_in: Duration,
    pub packet_interval: Duration,
    /// Pause between opening a socket and sending an echo request.
    pub echo_delay: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            apn: "tdt2.telenor.iot".into(),
            server_ip: IpAddr::from([10, 0, 0, 1]),
            server_port: 1234,
            listen_port: 1234,
            packets: 3,
            echo: false,
            psm_periodic_timer: 223,
            psm_active_time: 1,
            attach_delay: Duration::from_secs(5),
            poll_interval: Duration::from_secs(1),
            max_poll_errors: 5,
            max_polls: 120,
            idle_before_record: Duration::from_secs(30),
            record_duration: Duration::from_secs(30),
            lead_in: Duration::from_secs(5),
            packet_interval: Duration::from_secs(5),
            echo_delay: Duration::from_secs(1),
        }
    }
}

/// What a successful run did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub registration_polls: u32,
    pub packets_sent: u32,
    pub echoes: Vec<Vec<u8>>,
}

/// One run of the sequence against one device.
pub struct TestRun<'a> {
    device: &'a dyn CellularDevice,
    recorder: Arc<dyn PowerRecorder>,
    config: RunConfig,
    state: RunState,
}

impl<'a> TestRun<'a> {
    pub fn new(
        device: &'a dyn CellularDevice,
        recorder: Arc<dyn PowerRecorder>,
        config: RunConfig,
    ) -> Self {
        TestRun {
            device,
            recorder,
            config,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn enter(&mut self, next: RunState) {
        info!(from = ?self.state, to = ?next, "Run state");
        self.state = next;
    }

    /// Run the whole sequence. On error the run is left in [`RunState::Failed`].
    pub async fn execute(&mut self) -> Result<RunReport> {
        match self.run().await {
            Ok(report) => {
                self.enter(RunState::Idle);
                info!(?report, "Success!");
                Ok(report)
            }
            Err(e) => {
                self.enter(RunState::Failed);
                Err(e)
            }
        }
    }

    async fn run(&mut self) -> Result<RunReport> {
        let mut report = RunReport::default();

        self.log_firmware().await?;

        self.enter(RunState::Configuring);
        self.configure().await.context("configuration failed")?;
        tokio::time::sleep(self.config.attach_delay).await;

        self.enter(RunState::PollingRegistration);
        report.registration_polls = self.await_registration().await?;

        self.enter(RunState::Ready);
        tokio::time::sleep(self.config.idle_before_record).await;

        let recording = Recording::start(self.recorder.clone(), self.config.record_duration);
        if let Err(e) = self.traffic(&mut report).await {
            if let Err(cancel_err) = recording.cancel().await {
                warn!(error = %cancel_err, "Stopping recording failed");
            }
            return Err(e);
        }
        recording.join().await.context("power recording failed")?;

        Ok(report)
    }

    /// Firmware version is informational; families without the query skip it.
    async fn log_firmware(&self) -> Result<()> {
        match self.device.firmware_version().await {
            Ok(_) => Ok(()),
            Err(Error::Unsupported(reason)) => {
                info!(%reason, "Skipping firmware version");
                Ok(())
            }
            Err(e) if e.is_configuration() => Err(anyhow!(e)),
            Err(e) => {
                warn!(error = %e, "Firmware version query failed");
                Ok(())
            }
        }
    }

    async fn configure(&self) -> Result<()> {
        self.device.reboot().await?;
        match self.device.set_radio(RadioState::Full).await {
            // Families without a radio template come back from reboot with the radio on.
            Err(Error::Unsupported(reason)) => info!(%reason, "Skipping radio"),
            other => other?,
        }
        self.device.set_apn(&self.config.apn).await?;
        self.device
            .power_save_mode(
                true,
                self.config.psm_periodic_timer,
                self.config.psm_active_time,
            )
            .await?;
        self.device.disable_edrx().await?;
        Ok(())
    }

    /// Poll until registered. Returns the number of polls it took.
    async fn await_registration(&self) -> Result<u32> {
        let mut errors = 0u32;
        for poll in 1..=self.config.max_polls {
            match self.device.registration_status().await {
                Ok(REGISTERED_HOME) => {
                    info!(polls = poll, "Registered");
                    return Ok(poll);
                }
                Ok(status) => info!(status, "Not connected"),
                Err(e) if e.is_configuration() => {
                    return Err(anyhow!(e).context("registration status"));
                }
                Err(e) => {
                    errors += 1;
                    warn!(error = %e, errors, "Status failed");
                    if errors > self.config.max_poll_errors {
                        return Err(anyhow!(e).context(format!(
                            "registration status failed {} times",
                            errors
                        )));
                    }
                }
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
        bail!(
            "not registered after {} polls",
            self.config.max_polls
        )
    }

    async fn traffic(&self, report: &mut RunReport) -> Result<()> {
        tokio::time::sleep(self.config.lead_in).await;
        for n in 1..=self.config.packets {
            if self.config.echo {
                let reply = self
                    .echo_exchange()
                    .await
                    .with_context(|| format!("echo exchange {n} failed"))?;
                report.echoes.push(reply);
            } else {
                self.send_small_packet()
                    .await
                    .with_context(|| format!("packet {n} failed"))?;
            }
            report.packets_sent += 1;
            tokio::time::sleep(self.config.packet_interval).await;
        }
        Ok(())
    }

    async fn send_small_packet(&self) -> Result<()> {
        let socket = self
            .device
            .create_socket(Protocol::Udp, self.config.listen_port)
            .await?;
        let sent = self
            .device
            .send_datagram(
                socket,
                self.config.server_ip,
                self.config.server_port,
                SendFlag::ReleaseAfterNextMessage,
                PACKET_PAYLOAD,
            )
            .await;
        self.close_quietly(socket).await;
        Ok(sent?)
    }

    async fn echo_exchange(&self) -> Result<Vec<u8>> {
        let socket = self
            .device
            .create_socket(Protocol::Udp, self.config.listen_port)
            .await?;
        tokio::time::sleep(self.config.echo_delay).await;

        let result = async {
            self.device
                .send_datagram(
                    socket,
                    self.config.server_ip,
                    self.config.server_port,
                    SendFlag::ReleaseAfterNextReply,
                    ECHO_PAYLOAD,
                )
                .await?;
            self.device.receive_datagram(socket, ECHO_READ_LEN).await
        }
        .await;
        self.close_quietly(socket).await;

        let reply = result?;
        info!(reply = %String::from_utf8_lossy(&reply), "Echo received");
        Ok(reply)
    }

    async fn close_quietly(&self, socket: atlab_core::SocketHandle) {
        if let Err(e) = self.device.close_socket(socket).await {
            warn!(%socket, error = %e, "Couldn't close socket");
        }
    }
}
