//! The AT transaction engine and URC waiter.
//!
//! [`AtConnection`] exclusively owns a [`Transport`] and a [`LineFramer`].
//! Every exchange goes through [`AtConnection::transact`]: write one
//! command, read lines until a final result code, classify what was read.
//! Between transactions [`AtConnection::wait_for_urc`] can block on an
//! unsolicited notification.
//!
//! Callers must not interleave transactions; the connection takes
//! `&mut self` so the borrow checker enforces this within a task, and the
//! device driver wraps it in a mutex for everything else.

use std::time::Duration;

use tracing::{debug, info};

use atlab_core::error::{Error, Result};
use atlab_core::transport::Transport;

use crate::framer::{LineFramer, TERMINATOR};
use crate::protocol::{self, Terminal};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Default per-read timeout on the serial link.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Default pause after each transaction so trailing URCs can arrive.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(20);

/// Size of the scratch buffer used for each transport read.
const READ_CHUNK: usize = 512;

/// Configuration for an [`AtConnection`].
#[derive(Debug, Clone)]
pub struct AtConfig {
    /// Timeout for a single read from the transport.
    pub read_timeout: Duration,
    /// Sleep after classifying a transaction, before returning it.
    pub settle_delay: Duration,
    /// Log every command and non-empty inbound line at `info`.
    pub verbose: bool,
}

impl Default for AtConfig {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
            verbose: false,
        }
    }
}

/// How a transaction ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The module answered `OK`.
    Ok,
    /// A line containing `ERROR` ended the transaction; carries that line.
    Error(String),
    /// The module answered `ABORT`; carries that line.
    Abort(String),
    /// The stream ended before any final result code.
    Incomplete,
}

/// Result of one command/response exchange.
///
/// On [`Outcome::Ok`] the command echo has been removed. On
/// [`Outcome::Incomplete`] every collected line is left unclassified in
/// `response` and `notifications` is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub command: String,
    pub response: Vec<String>,
    pub notifications: Vec<String>,
    pub outcome: Outcome,
}

impl Transaction {
    pub fn is_ok(&self) -> bool {
        self.outcome == Outcome::Ok
    }

    /// Turn a failed outcome into the matching protocol [`Error`].
    pub fn into_result(self) -> Result<Transaction> {
        match self.outcome {
            Outcome::Ok => Ok(self),
            Outcome::Error(line) => Err(Error::CommandFailed(line)),
            Outcome::Abort(line) => Err(Error::Aborted(line)),
            Outcome::Incomplete => Err(Error::IncompleteResponse(self.response)),
        }
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// An open AT link to one module.
pub struct AtConnection {
    transport: Box<dyn Transport>,
    framer: LineFramer,
    config: AtConfig,
    closed: bool,
}

impl AtConnection {
    pub fn new(transport: Box<dyn Transport>, config: AtConfig) -> Self {
        Self {
            transport,
            framer: LineFramer::new(),
            config,
            closed: false,
        }
    }

    pub fn config(&self) -> &AtConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Send `command` and collect lines up to the final result code.
    ///
    /// Only connection failures (write error, read timeout, closed link)
    /// come back as `Err`. `ERROR`, `ABORT`, and a truncated stream are
    /// reported through [`Transaction::outcome`].
    pub async fn transact(&mut self, command: &str) -> Result<Transaction> {
        if self.closed {
            return Err(Error::NotConnected);
        }

        if self.config.verbose {
            info!("--> {}", command);
        } else {
            debug!(command, "Sending AT command");
        }

        let mut wire = Vec::with_capacity(command.len() + TERMINATOR.len());
        wire.extend_from_slice(command.as_bytes());
        wire.extend_from_slice(TERMINATOR);
        self.transport.send(&wire).await?;

        let mut collected = Vec::new();
        let outcome = loop {
            let Some(line) = self.read_line().await? else {
                break Outcome::Incomplete;
            };
            match protocol::terminal(&line) {
                Some(Terminal::Ok) => break Outcome::Ok,
                Some(Terminal::Error) => {
                    collected.push(line.clone());
                    break Outcome::Error(line);
                }
                Some(Terminal::Abort) => {
                    collected.push(line.clone());
                    break Outcome::Abort(line);
                }
                None => collected.push(line),
            }
        };

        let (response, notifications) = match outcome {
            // First line is the module echoing the command back.
            Outcome::Ok => protocol::split_lines(collected.into_iter().skip(1)),
            Outcome::Error(_) | Outcome::Abort(_) => protocol::split_lines(collected),
            Outcome::Incomplete => (collected, Vec::new()),
        };

        debug!(
            command,
            outcome = ?outcome,
            response_lines = response.len(),
            notifications = notifications.len(),
            "AT transaction complete"
        );

        if !self.config.settle_delay.is_zero() {
            tokio::time::sleep(self.config.settle_delay).await;
        }

        Ok(Transaction {
            command: command.to_string(),
            response,
            notifications,
            outcome,
        })
    }

    /// Block until a line starting with `prefix` arrives and return it.
    ///
    /// Lines that do not match are discarded. There is no timeout beyond
    /// the per-read timeout of the transport.
    pub async fn wait_for_urc(&mut self, prefix: &str) -> Result<String> {
        if self.closed {
            return Err(Error::NotConnected);
        }
        debug!(prefix, "Waiting for notification");
        loop {
            match self.read_line().await? {
                Some(line) if line.starts_with(prefix) => return Ok(line),
                Some(_) => continue,
                None => return Err(Error::ConnectionClosed),
            }
        }
    }

    /// Read the next framed line, or `None` once the stream has ended.
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(line) = self.framer.next_line() {
                if self.config.verbose && !line.is_empty() {
                    info!("<-- {}", line);
                }
                return Ok(Some(line));
            }
            if self.framer.is_exhausted() {
                return Ok(None);
            }
            let n = self
                .transport
                .receive(&mut chunk, self.config.read_timeout)
                .await?;
            if n == 0 {
                self.framer.mark_eof();
            } else {
                self.framer.push(&chunk[..n]);
            }
        }
    }

    /// Close the transport. Later calls are no-ops.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        debug!("Closing AT connection");
        self.transport.close().await
    }
}
