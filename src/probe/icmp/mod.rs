//! ICMP echo probing over one shared socket per session
//!
//! Every probe registers its sequence with the [`ReplyCorrelator`], sends,
//! and waits on its own deadline. A single reader task owns all reads on
//! the transport and routes replies back by sequence number, so a slow or
//! missing reply never blocks sibling probes.

pub mod correlator;
pub mod packet;
pub mod transport;

pub use correlator::{InboundReply, ReplyCorrelator};
pub use transport::{IcmpTransport, ScriptedReply, ScriptedTransport, SocketTransport, TransportKind};

use super::ProbeStrategy;
use crate::logging::ProbeLogger;
use crate::models::{ProbeResult, ProbeTarget};
use crate::types::{ProbeErrorKind, ProbeKind};
use async_trait::async_trait;
use chrono::Utc;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

const READ_BUFFER_BYTES: usize = 2048;
const READ_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Echo probe bound to one transport and one identifier
pub struct IcmpProbe {
    transport: Arc<dyn IcmpTransport>,
    correlator: Arc<ReplyCorrelator>,
    identifier: u16,
    payload: Arc<[u8]>,
    timeout: Duration,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl IcmpProbe {
    /// Starts the reader task; must be called inside a tokio runtime
    pub fn new(
        transport: Arc<dyn IcmpTransport>,
        payload_bytes: usize,
        timeout: Duration,
        logger: ProbeLogger,
    ) -> Self {
        let identifier = rand::random::<u16>();
        let payload: Arc<[u8]> = packet::payload(payload_bytes).into();
        let correlator = Arc::new(ReplyCorrelator::new());

        let reader = tokio::spawn(read_replies(
            transport.clone(),
            correlator.clone(),
            identifier,
            payload.clone(),
            logger,
        ));

        Self {
            transport,
            correlator,
            identifier,
            payload,
            timeout,
            reader: Mutex::new(Some(reader)),
        }
    }

    pub fn identifier(&self) -> u16 {
        self.identifier
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.transport.kind()
    }

    fn stop_reader(&self) {
        if let Ok(mut reader) = self.reader.lock() {
            if let Some(handle) = reader.take() {
                handle.abort();
            }
        }
    }
}

impl Drop for IcmpProbe {
    fn drop(&mut self) {
        self.stop_reader();
    }
}

#[async_trait]
impl ProbeStrategy for IcmpProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::IcmpEcho
    }

    async fn execute(&self, target: &ProbeTarget, sequence: u32) -> ProbeResult {
        let address = match target.address {
            IpAddr::V4(address) => address,
            IpAddr::V6(_) => {
                return ProbeResult::failed(
                    target,
                    sequence,
                    Utc::now(),
                    Duration::ZERO,
                    ProbeErrorKind::Other,
                    "ICMP echo requires an IPv4 address",
                )
            }
        };

        // Low 16 bits go on the wire; sessions are capped to that space
        let wire_sequence = sequence as u16;
        let Some(reply_rx) = self.correlator.register(wire_sequence, target.address).await else {
            return ProbeResult::failed(
                target,
                sequence,
                Utc::now(),
                Duration::ZERO,
                ProbeErrorKind::Other,
                format!("sequence {} is already outstanding", wire_sequence),
            );
        };

        let request = packet::encode_request(self.identifier, wire_sequence, &self.payload);
        let sent_at = Utc::now();
        let started = Instant::now();

        if let Err(e) = self.transport.send_to(&request, address).await {
            self.correlator.abandon(wire_sequence).await;
            return ProbeResult::failed(
                target,
                sequence,
                sent_at,
                started.elapsed(),
                ProbeErrorKind::WriteError,
                e.to_string(),
            );
        }

        match tokio::time::timeout_at(started + self.timeout, reply_rx).await {
            Ok(Ok(reply)) => ProbeResult::success(
                target,
                sequence,
                sent_at,
                reply.received_at.saturating_duration_since(started),
            )
            .with_payload_bytes(reply.payload_bytes),
            Ok(Err(_)) => ProbeResult::failed(
                target,
                sequence,
                sent_at,
                started.elapsed(),
                ProbeErrorKind::SocketReadError,
                "reply channel closed before a reply arrived",
            ),
            Err(_) => match self.correlator.abandon(wire_sequence).await {
                Some(kind) => ProbeResult::failed(
                    target,
                    sequence,
                    sent_at,
                    self.timeout,
                    kind,
                    format!("no valid reply within {:?}", self.timeout),
                ),
                None => ProbeResult::timeout(target, sequence, sent_at, self.timeout),
            },
        }
    }

    async fn shutdown(&self) {
        self.stop_reader();
    }
}

/// Single reader for the session's transport
async fn read_replies(
    transport: Arc<dyn IcmpTransport>,
    correlator: Arc<ReplyCorrelator>,
    identifier: u16,
    expected_payload: Arc<[u8]>,
    logger: ProbeLogger,
) {
    let filter_identifier = transport.kind().filters_identifier();
    let mut buf = vec![0u8; READ_BUFFER_BYTES];

    loop {
        let (len, source) = match transport.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                let outstanding = correlator.fault_all(ProbeErrorKind::SocketReadError).await;
                logger.log_socket_error(&e, outstanding).await;
                tokio::time::sleep(READ_ERROR_BACKOFF).await;
                continue;
            }
        };
        let received_at = Instant::now();

        match packet::parse(packet::strip_ipv4_header(&buf[..len])) {
            Ok(echo) if echo.is_reply() => {
                if filter_identifier && echo.identifier != identifier {
                    logger.log_discarded("foreign identifier", source).await;
                    continue;
                }

                if echo.payload.as_slice() != &*expected_payload {
                    correlator
                        .fault(echo.sequence, source, ProbeErrorKind::MalformedReply)
                        .await;
                    logger.log_discarded("payload mismatch", source).await;
                    continue;
                }

                let reply = InboundReply {
                    source,
                    received_at,
                    payload_bytes: echo.payload.len(),
                };
                if !correlator.complete(echo.sequence, reply).await {
                    logger.log_discarded("no outstanding request", source).await;
                }
            }
            Ok(_) => logger.log_discarded("not an echo reply", source).await,
            Err(packet::PacketError::BadChecksum { identifier: id, sequence }) => {
                if !filter_identifier || id == identifier {
                    correlator
                        .fault(sequence, source, ProbeErrorKind::MalformedReply)
                        .await;
                }
                logger.log_discarded("bad checksum", source).await;
            }
            Err(packet::PacketError::Truncated(_)) => logger.log_discarded("truncated", source).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn target() -> ProbeTarget {
        ProbeTarget::host(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)))
    }

    fn probe(transport: ScriptedTransport) -> IcmpProbe {
        IcmpProbe::new(Arc::new(transport), 4, Duration::from_secs(1), ProbeLogger::disabled())
    }

    #[tokio::test(start_paused = true)]
    async fn test_echo_reply_latency() {
        let probe = probe(ScriptedTransport::new(ScriptedReply::Echo(Duration::from_millis(12))));

        let result = probe.execute(&target(), 0).await;
        assert!(result.success);
        assert_eq!(result.latency, Duration::from_millis(12));
        assert_eq!(result.payload_bytes, Some(4));
        probe.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_peer_times_out() {
        let probe = probe(ScriptedTransport::new(ScriptedReply::Silent));

        let result = probe.execute(&target(), 1).await;
        assert_eq!(result.error_kind(), Some(ProbeErrorKind::Timeout));
        assert_eq!(result.latency, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_corrupt_reply_is_malformed() {
        let probe = probe(ScriptedTransport::new(ScriptedReply::Corrupt(Duration::from_millis(3))));

        let result = probe.execute(&target(), 2).await;
        assert!(!result.success);
        assert_eq!(result.error_kind(), Some(ProbeErrorKind::MalformedReply));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_failure_is_write_error() {
        let probe = probe(ScriptedTransport::new(ScriptedReply::FailSend));

        let result = probe.execute(&target(), 3).await;
        assert_eq!(result.error_kind(), Some(ProbeErrorKind::WriteError));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spoofed_source_is_not_attributed() {
        let spoofer = Ipv4Addr::new(203, 0, 113, 9);
        let probe = probe(ScriptedTransport::new(ScriptedReply::Spoofed(
            spoofer,
            Duration::from_millis(2),
        )));

        let result = probe.execute(&target(), 4).await;
        assert_eq!(result.error_kind(), Some(ProbeErrorKind::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_reply_settles_once() {
        let probe = probe(ScriptedTransport::new(ScriptedReply::Duplicate(Duration::from_millis(5))));

        let first = probe.execute(&target(), 5).await;
        let second = probe.execute(&target(), 6).await;
        assert!(first.success);
        assert!(second.success);
        assert_eq!(probe.correlator.outstanding().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_probes_get_their_own_replies() {
        let transport = ScriptedTransport::new(ScriptedReply::Echo(Duration::from_millis(10)))
            .with_reply(0, ScriptedReply::Echo(Duration::from_millis(30)))
            .with_reply(1, ScriptedReply::Echo(Duration::from_millis(5)));
        let probe = Arc::new(probe(transport));

        let slow = tokio::spawn({
            let probe = probe.clone();
            async move { probe.execute(&target(), 0).await }
        });
        let fast = tokio::spawn({
            let probe = probe.clone();
            async move { probe.execute(&target(), 1).await }
        });

        let slow = slow.await.unwrap();
        let fast = fast.await.unwrap();
        assert_eq!(slow.latency, Duration::from_millis(30));
        assert_eq!(fast.latency, Duration::from_millis(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_reply_ignored_and_late_reply_matched() {
        let transport = Arc::new(ScriptedTransport::new(ScriptedReply::Silent));
        let icmp = Arc::new(IcmpProbe::new(
            transport.clone(),
            4,
            Duration::from_secs(1),
            ProbeLogger::disabled(),
        ));
        assert_eq!(icmp.transport_kind(), TransportKind::Scripted);

        let reply_to = |sequence| {
            packet::reply_for(&packet::encode_request(icmp.identifier(), sequence, &packet::payload(4)))
        };
        let stale = reply_to(40);
        let late = reply_to(7);

        // Nothing is waiting on sequence 40
        transport.inject(stale, target().address);

        let pending = tokio::spawn({
            let icmp = icmp.clone();
            async move { icmp.execute(&target(), 7).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        transport.inject(late, target().address);

        let result = pending.await.unwrap();
        assert!(result.success);
        assert_eq!(result.latency, Duration::from_millis(20));
        assert_eq!(transport.sent(), vec![(7, Ipv4Addr::new(10, 0, 0, 1))]);
        assert_eq!(icmp.correlator.outstanding().await, 0);
    }
}
