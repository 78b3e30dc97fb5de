//! Per-session state: resolved target, strategy and sequence space

use crate::models::{ProbeConfig, ProbeTarget, ResolvedTarget};
use crate::probe::ProbeStrategy;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// One (iteration, address, port) operation with its sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOperation {
    pub target: ProbeTarget,
    pub sequence: u32,
    pub iteration: u32,
}

/// Owns everything one invocation probes with
///
/// Nothing here is shared between sessions: each has its own strategy
/// (and with it its own ICMP socket and correlator) and its own counter.
pub struct Session {
    config: Arc<ProbeConfig>,
    target: ResolvedTarget,
    strategy: Arc<dyn ProbeStrategy>,
    next_sequence: AtomicU32,
}

impl Session {
    pub fn new(config: Arc<ProbeConfig>, target: ResolvedTarget, strategy: Arc<dyn ProbeStrategy>) -> Self {
        Self {
            config,
            target,
            strategy,
            next_sequence: AtomicU32::new(0),
        }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    pub fn target(&self) -> &ResolvedTarget {
        &self.target
    }

    pub fn strategy(&self) -> Arc<dyn ProbeStrategy> {
        self.strategy.clone()
    }

    pub fn requested(&self) -> u64 {
        self.config.requested_operations(self.target.len())
    }

    /// Iterations outermost, then addresses, then ports
    ///
    /// Sequence numbers are drawn as operations are produced and are
    /// never handed out twice.
    pub fn operations(&self) -> Operations<'_> {
        Operations {
            addresses: self.target.addresses(),
            ports: self.config.ports.ports(),
            count: self.config.count,
            iteration: 0,
            address_index: 0,
            port_index: 0,
            next_sequence: &self.next_sequence,
        }
    }

    /// Release the strategy's resources
    pub async fn close(self) {
        self.strategy.shutdown().await;
    }
}

/// Lazy enumeration of a session's operations
pub struct Operations<'a> {
    addresses: &'a [IpAddr],
    ports: Vec<Option<u16>>,
    count: u32,
    iteration: u32,
    address_index: usize,
    port_index: usize,
    next_sequence: &'a AtomicU32,
}

impl Iterator for Operations<'_> {
    type Item = ProbeOperation;

    fn next(&mut self) -> Option<ProbeOperation> {
        if self.iteration >= self.count || self.addresses.is_empty() || self.ports.is_empty() {
            return None;
        }

        let operation = ProbeOperation {
            target: ProbeTarget::new(self.addresses[self.address_index], self.ports[self.port_index]),
            sequence: self.next_sequence.fetch_add(1, Ordering::Relaxed),
            iteration: self.iteration,
        };

        self.port_index += 1;
        if self.port_index == self.ports.len() {
            self.port_index = 0;
            self.address_index += 1;
            if self.address_index == self.addresses.len() {
                self.address_index = 0;
                self.iteration += 1;
            }
        }

        Some(operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::TcpProbe;
    use std::collections::HashSet;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    fn session(config: ProbeConfig, addresses: Vec<IpAddr>) -> Session {
        Session::new(
            Arc::new(config),
            ResolvedTarget::new("host.test", addresses),
            Arc::new(TcpProbe::new(Duration::from_secs(1))),
        )
    }

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn test_cartesian_enumeration() {
        let session = session(ProbeConfig::nmap("host.test", 20, 22).with_count(2), vec![ip(1), ip(2)]);
        let operations: Vec<ProbeOperation> = session.operations().collect();

        assert_eq!(session.requested(), 12);
        assert_eq!(operations.len(), 12);
        assert_eq!(operations[0].target, ProbeTarget::new(ip(1), Some(20)));
        assert_eq!(operations[2].target, ProbeTarget::new(ip(1), Some(22)));
        assert_eq!(operations[3].target, ProbeTarget::new(ip(2), Some(20)));
        assert_eq!(operations[6].iteration, 1);
        assert_eq!(operations[11].target, ProbeTarget::new(ip(2), Some(22)));
    }

    #[test]
    fn test_sequences_unique_and_monotonic() {
        let session = session(ProbeConfig::ping("host.test").with_count(5), vec![ip(1), ip(2)]);

        let first: Vec<u32> = session.operations().map(|op| op.sequence).collect();
        assert_eq!(first, (0..10).collect::<Vec<_>>());

        let second: HashSet<u32> = session.operations().map(|op| op.sequence).collect();
        assert!(second.iter().all(|sequence| *sequence >= 10));
    }

    #[test]
    fn test_no_addresses_no_operations() {
        let session = session(ProbeConfig::ping("host.test").with_count(3), vec![]);
        assert_eq!(session.operations().count(), 0);
        assert_eq!(session.requested(), 0);
    }
}
