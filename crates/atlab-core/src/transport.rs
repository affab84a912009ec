//! Transport trait for module communication.
//!
//! The [`Transport`] trait abstracts over the physical link to a cellular
//! module. The serial implementation lives in `atlab-transport`; a scripted
//! mock for tests lives in `atlab-test-harness`.
//!
//! The AT engine in `atlab-at-io` operates on a `Transport` rather than
//! directly on a serial port, so the same framing and classification code
//! runs against real hardware and deterministic test scripts.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to a module.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the module.
    ///
    /// Implementations should block until all bytes have been written to
    /// the underlying transport.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the module into the provided buffer.
    ///
    /// Returns the number of bytes read. `Ok(0)` means the stream has
    /// ended and no further bytes will arrive. Waits up to `timeout` for
    /// data; returns [`Error::Timeout`](crate::error::Error::Timeout) if
    /// nothing arrives within the deadline.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the transport connection.
    ///
    /// After calling `close()`, subsequent `send()` and `receive()` calls
    /// should return [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}
