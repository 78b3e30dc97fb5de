//! TCP connect probe: handshake only, closed immediately on success

use super::ProbeStrategy;
use crate::models::{ProbeResult, ProbeTarget};
use crate::types::{ProbeErrorKind, ProbeKind};
use async_trait::async_trait;
use chrono::Utc;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;

/// Serves both single-port (telnet) and range (nmap) sessions
#[derive(Debug, Clone)]
pub struct TcpProbe {
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

/// Map a connect error onto the per-probe taxonomy
pub fn classify_connect_error(error: &io::Error) -> ProbeErrorKind {
    match error.kind() {
        io::ErrorKind::ConnectionRefused => ProbeErrorKind::Refused,
        io::ErrorKind::TimedOut => ProbeErrorKind::Timeout,
        io::ErrorKind::HostUnreachable | io::ErrorKind::NetworkUnreachable => ProbeErrorKind::Unreachable,
        _ => ProbeErrorKind::Other,
    }
}

#[async_trait]
impl ProbeStrategy for TcpProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::TcpConnect
    }

    async fn execute(&self, target: &ProbeTarget, sequence: u32) -> ProbeResult {
        let sent_at = Utc::now();
        let Some(port) = target.port else {
            return ProbeResult::failed(
                target,
                sequence,
                sent_at,
                Duration::ZERO,
                ProbeErrorKind::Other,
                "TCP probe needs a port",
            );
        };

        let started = Instant::now();
        let connect = TcpStream::connect(SocketAddr::new(target.address, port));

        match tokio::time::timeout(self.timeout, connect).await {
            Ok(Ok(stream)) => {
                let latency = started.elapsed();
                drop(stream);
                ProbeResult::success(target, sequence, sent_at, latency)
            }
            Ok(Err(e)) => ProbeResult::failed(
                target,
                sequence,
                sent_at,
                started.elapsed(),
                classify_connect_error(&e),
                e.to_string(),
            ),
            Err(_) => ProbeResult::timeout(target, sequence, sent_at, self.timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_to_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let probe = TcpProbe::new(Duration::from_secs(2));
        let target = ProbeTarget::new(IpAddr::V4(Ipv4Addr::LOCALHOST), Some(port));
        let result = probe.execute(&target, 0).await;

        assert!(result.success, "{:?}", result.error);
        assert!(result.latency > Duration::ZERO);
        assert!(result.latency <= Duration::from_secs(2));
        assert_eq!(result.port, Some(port));
    }

    #[tokio::test]
    async fn test_closed_port_is_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let probe = TcpProbe::new(Duration::from_secs(2));
        let target = ProbeTarget::new(IpAddr::V4(Ipv4Addr::LOCALHOST), Some(port));
        let result = probe.execute(&target, 0).await;

        assert!(!result.success);
        assert_eq!(result.error_kind(), Some(ProbeErrorKind::Refused));
    }

    #[tokio::test]
    async fn test_missing_port() {
        let probe = TcpProbe::new(Duration::from_secs(1));
        let result = probe
            .execute(&ProbeTarget::host(IpAddr::V4(Ipv4Addr::LOCALHOST)), 0)
            .await;
        assert_eq!(result.error_kind(), Some(ProbeErrorKind::Other));
    }

    #[test]
    fn test_classify_connect_error() {
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(classify_connect_error(&refused), ProbeErrorKind::Refused);

        let other = io::Error::from(io::ErrorKind::PermissionDenied);
        assert_eq!(classify_connect_error(&other), ProbeErrorKind::Other);
    }
}
