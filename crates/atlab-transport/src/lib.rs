//! Transport implementations for atlab.
//!
//! Cellular modules attach over USB-to-UART bridges or a native UART and
//! present as serial ports. [`SerialTransport`] implements the
//! [`Transport`](atlab_core::Transport) trait over `tokio-serial`.
//!
//! # Example
//!
//! ```no_run
//! use atlab_transport::SerialTransport;
//! use atlab_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> atlab_core::Result<()> {
//! let mut transport = SerialTransport::open("/dev/ttyUSB0", 9600).await?;
//! transport.send(b"AT\r\n").await?;
//!
//! let mut buf = [0u8; 256];
//! let n = transport.receive(&mut buf, Duration::from_secs(30)).await?;
//! # Ok(())
//! # }
//! ```

pub mod serial;

pub use serial::{FlowControl, LineControl, Parity, SerialConfig, SerialTransport};
