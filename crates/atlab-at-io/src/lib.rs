//! Shared AT-command IO for atlab module drivers.
//!
//! An AT link is a half-duplex conversation of `\r\n`-terminated text lines:
//! the host writes a command, the module echoes it, emits zero or more
//! response and notification lines, and finishes with `OK`, a line
//! containing `ERROR`, or `ABORT`. Notifications (URCs) may also arrive
//! between commands.
//!
//! # Architecture
//!
//! - [`framer`] -- incremental `\r\n` line framing over a byte buffer
//! - [`protocol`] -- terminal-line detection and line classification
//! - [`connection`] -- [`AtConnection`]: the transaction engine and URC waiter

pub mod connection;
pub mod framer;
pub mod protocol;

pub use connection::{AtConfig, AtConnection, Outcome, Transaction};
pub use framer::LineFramer;
