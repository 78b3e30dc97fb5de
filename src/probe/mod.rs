//! Probe strategies
//!
//! The orchestrator only knows [`ProbeStrategy`]: run one probe against one
//! target with a given sequence number and always come back with exactly
//! one [`ProbeResult`]. Per-probe failures are folded into that result and
//! never returned as errors.

pub mod icmp;
pub mod tcp;
pub mod web;

pub use crate::models::ProbeTarget;
pub use icmp::IcmpProbe;
pub use tcp::TcpProbe;
pub use web::WebProbe;

use crate::error::{AppError, Result};
use crate::logging::ProbeLogger;
use crate::models::{ProbeConfig, ProbeResult};
use crate::types::ProbeKind;
use async_trait::async_trait;
use icmp::{IcmpTransport, SocketTransport};
use std::sync::Arc;

/// One probe against one target
#[async_trait]
pub trait ProbeStrategy: Send + Sync {
    fn kind(&self) -> ProbeKind;

    /// Never fails; problems become a failed result
    async fn execute(&self, target: &ProbeTarget, sequence: u32) -> ProbeResult;

    /// Release session resources once every dispatched probe has settled
    async fn shutdown(&self) {}
}

/// Builds the session's strategy after resolution succeeded
#[async_trait]
pub trait StrategyFactory: Send + Sync {
    async fn create(&self, config: &ProbeConfig, logger: &ProbeLogger) -> Result<Arc<dyn ProbeStrategy>>;
}

/// Picks the strategy from the probe mode; opens the ICMP socket on demand
#[derive(Default)]
pub struct DefaultStrategyFactory {
    icmp_transport: Option<Arc<dyn IcmpTransport>>,
}

impl DefaultStrategyFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `transport` instead of opening a socket
    pub fn with_icmp_transport(transport: Arc<dyn IcmpTransport>) -> Self {
        Self {
            icmp_transport: Some(transport),
        }
    }
}

#[async_trait]
impl StrategyFactory for DefaultStrategyFactory {
    async fn create(&self, config: &ProbeConfig, logger: &ProbeLogger) -> Result<Arc<dyn ProbeStrategy>> {
        match config.mode.probe_kind() {
            ProbeKind::IcmpEcho => {
                let transport: Arc<dyn IcmpTransport> = match &self.icmp_transport {
                    Some(transport) => transport.clone(),
                    None => Arc::new(SocketTransport::open()?),
                };
                let probe = IcmpProbe::new(transport, config.payload_bytes, config.timeout, logger.clone());
                logger
                    .log_transport(&probe.transport_kind().to_string(), probe.identifier())
                    .await;
                Ok(Arc::new(probe))
            }
            ProbeKind::TcpConnect => Ok(Arc::new(TcpProbe::new(config.timeout))),
            ProbeKind::HttpGet => {
                let url = config
                    .url
                    .as_deref()
                    .ok_or_else(|| AppError::config("Web mode requires a URL"))?;
                Ok(Arc::new(WebProbe::new(url, config.timeout)?))
            }
        }
    }
}
