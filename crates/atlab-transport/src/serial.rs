//! Serial port transport for module communication.
//!
//! AT links are always 8 data bits and 1 stop bit; the configurable parts
//! are the baud rate, parity, flow control, and what to do with the modem
//! control lines after opening. Some evaluation boards wire DTR to the
//! module's power-saving input, so the default leaves DTR and RTS alone.
//!
//! A read that returns zero bytes means the device went away (USB bridge
//! unplugged, pty closed); it is reported as `Ok(0)` so the framer can
//! flush its last partial line.

use async_trait::async_trait;
use atlab_core::error::{Error, Result};
use atlab_core::transport::Transport;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};

/// Serial port configuration.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Baud rate (9600 for SARA-N2, 115200 for SARA-R4).
    pub baud_rate: u32,
    /// Parity checking (almost always `None`).
    pub parity: Parity,
    /// Flow control.
    pub flow_control: FlowControl,
    /// What to do with DTR after opening.
    pub dtr: LineControl,
    /// What to do with RTS after opening.
    pub rts: LineControl,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            parity: Parity::None,
            flow_control: FlowControl::None,
            dtr: LineControl::Leave,
            rts: LineControl::Leave,
        }
    }
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for tokio_serial::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => tokio_serial::Parity::None,
            Parity::Odd => tokio_serial::Parity::Odd,
            Parity::Even => tokio_serial::Parity::Even,
        }
    }
}

/// Flow control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

impl From<FlowControl> for tokio_serial::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => tokio_serial::FlowControl::None,
            FlowControl::Software => tokio_serial::FlowControl::Software,
            FlowControl::Hardware => tokio_serial::FlowControl::Hardware,
        }
    }
}

/// Handling of a modem control line right after the port is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineControl {
    /// Keep whatever the OS driver set.
    Leave,
    Assert,
    Deassert,
}

impl LineControl {
    fn level(self) -> Option<bool> {
        match self {
            LineControl::Leave => None,
            LineControl::Assert => Some(true),
            LineControl::Deassert => Some(false),
        }
    }
}

/// Serial port transport for module communication.
pub struct SerialTransport {
    port: Option<SerialStream>,
    port_name: String,
}

impl SerialTransport {
    /// Open a serial port at `baud_rate` with 8N1, no flow control.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use atlab_transport::SerialTransport;
    /// # async fn example() -> atlab_core::Result<()> {
    /// let transport = SerialTransport::open("/dev/ttyUSB0", 115200).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn open(port: &str, baud_rate: u32) -> Result<Self> {
        let config = SerialConfig {
            baud_rate,
            ..Default::default()
        };
        Self::open_with_config(port, config).await
    }

    /// Open a serial port with full configuration control.
    pub async fn open_with_config(port: &str, config: SerialConfig) -> Result<Self> {
        tracing::debug!(
            port = %port,
            baud_rate = config.baud_rate,
            parity = ?config.parity,
            flow_control = ?config.flow_control,
            "Opening serial port"
        );

        let mut stream = tokio_serial::new(port, config.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .stop_bits(tokio_serial::StopBits::One)
            .parity(config.parity.into())
            .flow_control(config.flow_control.into())
            .open_native_async()
            .map_err(|e| {
                tracing::error!(port = %port, error = %e, "Failed to open serial port");
                Error::Transport(format!("failed to open serial port {}: {}", port, e))
            })?;

        if let Some(level) = config.dtr.level() {
            if let Err(e) = stream.write_data_terminal_ready(level) {
                tracing::warn!(port = %port, level, error = %e, "Failed to set DTR");
            }
        }
        if let Some(level) = config.rts.level() {
            if let Err(e) = stream.write_request_to_send(level) {
                tracing::warn!(port = %port, level, error = %e, "Failed to set RTS");
            }
        }

        tracing::info!(port = %port, baud_rate = config.baud_rate, "Serial port opened");

        Ok(Self {
            port: Some(stream),
            port_name: port.to_string(),
        })
    }

    /// Get the name of the serial port.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

fn map_io_error(e: std::io::Error) -> Error {
    match e.kind() {
        std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::NotConnected => Error::ConnectionLost,
        _ => Error::Io(e),
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        tracing::trace!(port = %self.port_name, bytes = data.len(), "Sending data");

        port.write_all(data).await.map_err(|e| {
            tracing::error!(port = %self.port_name, error = %e, "Failed to send data");
            map_io_error(e)
        })?;
        port.flush().await.map_err(|e| {
            tracing::error!(port = %self.port_name, error = %e, "Failed to flush serial port");
            map_io_error(e)
        })?;

        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        match tokio::time::timeout(timeout, port.read(buf)).await {
            Ok(Ok(0)) => {
                tracing::debug!(port = %self.port_name, "Serial stream ended");
                Ok(0)
            }
            Ok(Ok(n)) => {
                tracing::trace!(port = %self.port_name, bytes = n, "Received data");
                Ok(n)
            }
            Ok(Err(e)) => {
                tracing::error!(port = %self.port_name, error = %e, "Failed to receive data");
                Err(map_io_error(e))
            }
            Err(_) => {
                tracing::debug!(
                    port = %self.port_name,
                    timeout_ms = timeout.as_millis() as u64,
                    "Timeout waiting for data"
                );
                Err(Error::Timeout)
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut port) = self.port.take() {
            if let Err(e) = port.flush().await {
                tracing::warn!(port = %self.port_name, error = %e, "Flush before close failed");
            }
            tracing::info!(port = %self.port_name, "Serial port closed");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }
}
