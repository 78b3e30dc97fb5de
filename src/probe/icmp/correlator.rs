//! Matches inbound echo replies to outstanding requests by sequence number

use crate::types::ProbeErrorKind;
use std::collections::HashMap;
use std::net::IpAddr;
use tokio::sync::{oneshot, Mutex};
use tokio::time::Instant;

/// Reply handed from the reader task to the waiting probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboundReply {
    pub source: IpAddr,
    pub received_at: Instant,
    pub payload_bytes: usize,
}

struct PendingProbe {
    address: IpAddr,
    tx: oneshot::Sender<InboundReply>,
    /// Last non-fatal problem seen for this sequence
    fault: Option<ProbeErrorKind>,
}

/// Per-session table of outstanding echo requests
///
/// An entry is removed by whichever comes first: a matching reply or the
/// owning probe abandoning it at its deadline. Later packets for the same
/// sequence find nothing and are dropped.
#[derive(Default)]
pub struct ReplyCorrelator {
    pending: Mutex<HashMap<u16, PendingProbe>>,
}

impl ReplyCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` if the sequence is already outstanding
    pub async fn register(&self, sequence: u16, address: IpAddr) -> Option<oneshot::Receiver<InboundReply>> {
        let mut pending = self.pending.lock().await;
        if pending.contains_key(&sequence) {
            return None;
        }

        let (tx, rx) = oneshot::channel();
        pending.insert(
            sequence,
            PendingProbe {
                address,
                tx,
                fault: None,
            },
        );
        Some(rx)
    }

    /// Deliver a reply; false when it was unknown, stale or from the wrong peer
    pub async fn complete(&self, sequence: u16, reply: InboundReply) -> bool {
        let mut pending = self.pending.lock().await;
        match pending.get(&sequence) {
            Some(probe) if probe.address == reply.source => {}
            _ => return false,
        }

        match pending.remove(&sequence) {
            Some(probe) => probe.tx.send(reply).is_ok(),
            None => false,
        }
    }

    /// Note a problem for one outstanding sequence without settling it
    pub async fn fault(&self, sequence: u16, source: IpAddr, kind: ProbeErrorKind) -> bool {
        let mut pending = self.pending.lock().await;
        match pending.get_mut(&sequence) {
            Some(probe) if probe.address == source => {
                probe.fault = Some(kind);
                true
            }
            _ => false,
        }
    }

    /// Note a problem for every outstanding sequence
    pub async fn fault_all(&self, kind: ProbeErrorKind) -> usize {
        let mut pending = self.pending.lock().await;
        for probe in pending.values_mut() {
            probe.fault = Some(kind);
        }
        pending.len()
    }

    /// Drop the entry at the deadline, returning any recorded fault
    pub async fn abandon(&self, sequence: u16) -> Option<ProbeErrorKind> {
        self.pending
            .lock()
            .await
            .remove(&sequence)
            .and_then(|probe| probe.fault)
    }

    pub async fn outstanding(&self) -> usize {
        self.pending.lock().await.len()
    }
}
