//! UDP echo server for the far end of connectivity tests.
//!
//! Every datagram is logged. Payloads starting with `echo ` are answered
//! with the remainder, so a module that sends `echo hi` gets `hi` back.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Prefix that asks the server to answer.
pub const ECHO_PREFIX: &[u8] = b"echo ";

const MAX_DATAGRAM: usize = 4096;

/// The reply for `payload`, if it asks for one.
pub fn echo_reply(payload: &[u8]) -> Option<&[u8]> {
    payload.strip_prefix(ECHO_PREFIX)
}

pub struct EchoServer {
    socket: UdpSocket,
}

impl EchoServer {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .with_context(|| format!("cannot listen on {addr}"))?;
        Ok(EchoServer { socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Serve until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        info!(addr = %self.local_addr()?, "Starting UDP server");
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let (n, from) = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("UDP server stopped");
                    return Ok(());
                }
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok(r) => r,
                    Err(e) => {
                        warn!(error = %e, "Receive failed");
                        continue;
                    }
                },
            };
            if n == 0 {
                continue;
            }
            let payload = &buf[..n];
            info!(bytes = n, %from, text = %String::from_utf8_lossy(payload), "Datagram received");

            if let Some(reply) = echo_reply(payload) {
                info!(reply = ?String::from_utf8_lossy(reply), %from, "Echoing");
                if let Err(e) = self.socket.send_to(reply, from).await {
                    warn!(error = %e, %from, "Echo failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn echo_reply_strips_prefix() {
        assert_eq!(echo_reply(b"echo hi"), Some(&b"hi"[..]));
        assert_eq!(echo_reply(b"echo "), Some(&b""[..]));
        assert_eq!(echo_reply(b"hi"), None);
        assert_eq!(echo_reply(b"echohi"), None);
    }

    #[tokio::test]
    async fn server_echoes_and_ignores() {
        let server = EchoServer::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(server.run(shutdown.clone()));

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(b"hello", addr).await.unwrap();
        client.send_to(b"echo hi", addr).await.unwrap();

        let mut buf = [0u8; 64];
        let (n, _) = tokio::time::timeout(Duration::from_secs(5), client.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..n], b"hi");

        shutdown.cancel();
        task.await.unwrap().unwrap();
    }
}
