//! AtDeviceBuilder -- fluent builder for constructing [`AtDevice`] instances.
//!
//! # Example
//!
//! ```no_run
//! use atlab_ublox::builder::AtDeviceBuilder;
//! use atlab_ublox::models::sara_n2;
//!
//! # async fn example() -> atlab_core::Result<()> {
//! let device = AtDeviceBuilder::new(sara_n2())
//!     .serial_port("/dev/ttyUSB0")
//!     .verbose(true)
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use atlab_at_io::connection::{AtConfig, DEFAULT_READ_TIMEOUT, DEFAULT_SETTLE_DELAY};
use atlab_core::error::{Error, Result};
use atlab_core::transport::Transport;

use crate::device::AtDevice;
use crate::spec::DeviceSpec;

/// Fluent builder for [`AtDevice`].
///
/// The baud rate defaults to the family's factory rate.
pub struct AtDeviceBuilder {
    spec: DeviceSpec,
    serial_port: Option<String>,
    baud_rate: Option<u32>,
    read_timeout: Duration,
    settle_delay: Duration,
    verbose: bool,
}

impl AtDeviceBuilder {
    /// Create a new builder for the given family.
    pub fn new(spec: DeviceSpec) -> Self {
        AtDeviceBuilder {
            spec,
            serial_port: None,
            baud_rate: None,
            read_timeout: DEFAULT_READ_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
            verbose: false,
        }
    }

    /// Set the serial port path (e.g. `/dev/ttyUSB0` or `COM3`).
    pub fn serial_port(mut self, port: &str) -> Self {
        self.serial_port = Some(port.to_string());
        self
    }

    /// Override the family's baud rate.
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = Some(baud);
        self
    }

    /// Per-read timeout on the link (default: 30s).
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Pause after each transaction (default: 20ms).
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Log every command and reply line at `info`.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn effective_baud(&self) -> u32 {
        self.baud_rate.unwrap_or(self.spec.baud_rate)
    }

    /// Build an [`AtDevice`] with a caller-provided transport.
    ///
    /// Used by tests (pass a `MockTransport` from `atlab-test-harness`) and
    /// by callers that manage the link themselves.
    pub async fn build_with_transport(self, transport: Box<dyn Transport>) -> Result<AtDevice> {
        if self.read_timeout.is_zero() {
            return Err(Error::InvalidParameter("read_timeout must be non-zero".into()));
        }
        if self.effective_baud() == 0 {
            return Err(Error::InvalidParameter("baud_rate must be non-zero".into()));
        }
        self.spec.validate()?;

        let baud = self.effective_baud();
        let config = AtConfig {
            read_timeout: self.read_timeout,
            settle_delay: self.settle_delay,
            verbose: self.verbose,
        };
        Ok(AtDevice::new(transport, self.spec, config, baud))
    }

    /// Build an [`AtDevice`] over a serial port.
    ///
    /// Requires that [`serial_port()`](Self::serial_port) has been called.
    pub async fn build(self) -> Result<AtDevice> {
        let port = self
            .serial_port
            .as_deref()
            .ok_or_else(|| Error::InvalidParameter("serial_port is required for build()".into()))?;
        let transport = atlab_transport::SerialTransport::open(port, self.effective_baud()).await?;
        self.build_with_transport(Box::new(transport)).await
    }
}
