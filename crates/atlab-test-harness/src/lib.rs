//! atlab-test-harness: Test utilities and mock transports for atlab.
//!
//! This crate provides [`MockTransport`] for deterministic unit testing of
//! the AT engine and device drivers without a module attached.

pub mod mock_serial;

pub use mock_serial::MockTransport;
