//! Hostname resolution consumed by the probe engine
//!
//! Resolution runs once per session before any probe is dispatched. The
//! engine only sees the [`Resolver`] trait, so tests can swap in a
//! [`StaticResolver`] while the binary uses trust-dns through
//! [`SystemResolver`].

use crate::error::AppError;
use crate::models::ResolvedTarget;
use async_trait::async_trait;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use thiserror::Error;
use trust_dns_resolver::{
    config::{LookupIpStrategy, ResolverConfig, ResolverOpts},
    error::{ResolveError, ResolveErrorKind},
    system_conf, TokioAsyncResolver,
};

/// Classified resolution failure; always fatal to the session
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveFailure {
    #[error("no such host: {0}")]
    NoSuchHost(String),

    #[error("resolving {host} timed out after {timeout:?}")]
    Timeout { host: String, timeout: Duration },

    #[error("resolving {host} failed: {message}")]
    Other { host: String, message: String },
}

impl ResolveFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            ResolveFailure::NoSuchHost(_) => "no-such-host",
            ResolveFailure::Timeout { .. } => "timeout",
            ResolveFailure::Other { .. } => "other",
        }
    }

    fn classify(host: &str, error: &ResolveError) -> Self {
        match error.kind() {
            ResolveErrorKind::NoRecordsFound { .. } => ResolveFailure::NoSuchHost(host.to_string()),
            ResolveErrorKind::Timeout => ResolveFailure::Timeout {
                host: host.to_string(),
                timeout: Duration::ZERO,
            },
            _ => ResolveFailure::Other {
                host: host.to_string(),
                message: error.to_string(),
            },
        }
    }
}

impl From<ResolveFailure> for AppError {
    fn from(failure: ResolveFailure) -> Self {
        match failure {
            ResolveFailure::Timeout { .. } => AppError::timeout(failure.to_string()),
            other => AppError::dns_resolution(other.to_string()),
        }
    }
}

pub type ResolveResult<T> = std::result::Result<T, ResolveFailure>;

/// Name lookup backend
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Raw lookup; may return duplicates and non-IPv4 addresses
    async fn lookup(&self, host: &str) -> ResolveResult<Vec<IpAddr>>;
}

/// Resolve `host` into its de-duplicated IPv4 addresses within `timeout`
///
/// IPv4 literals bypass the backend.
pub async fn resolve_target(
    resolver: &dyn Resolver,
    host: &str,
    timeout: Duration,
) -> ResolveResult<ResolvedTarget> {
    let host = host.trim();
    if let Ok(address) = host.parse::<Ipv4Addr>() {
        return Ok(ResolvedTarget::new(host, [IpAddr::V4(address)]));
    }

    let addresses = match tokio::time::timeout(timeout, resolver.lookup(host)).await {
        Ok(Ok(addresses)) => addresses,
        Ok(Err(ResolveFailure::Timeout { .. })) | Err(_) => {
            return Err(ResolveFailure::Timeout {
                host: host.to_string(),
                timeout,
            })
        }
        Ok(Err(failure)) => return Err(failure),
    };

    let target = ResolvedTarget::new(host, addresses.into_iter().filter(IpAddr::is_ipv4));
    if target.is_empty() {
        return Err(ResolveFailure::NoSuchHost(host.to_string()));
    }

    Ok(target)
}

/// trust-dns resolver built from the host's resolver configuration
pub struct SystemResolver {
    resolver: TokioAsyncResolver,
}

impl SystemResolver {
    /// Falls back to the library default upstreams when the system
    /// configuration cannot be read
    pub fn new() -> Self {
        let (config, mut opts) =
            system_conf::read_system_conf().unwrap_or_else(|_| (ResolverConfig::default(), ResolverOpts::default()));
        opts.ip_strategy = LookupIpStrategy::Ipv4Only;

        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        }
    }
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resolver for SystemResolver {
    async fn lookup(&self, host: &str) -> ResolveResult<Vec<IpAddr>> {
        let response = self
            .resolver
            .lookup_ip(host)
            .await
            .map_err(|e| ResolveFailure::classify(host, &e))?;

        Ok(response.iter().collect())
    }
}

/// Fixed host table, used by tests and for offline runs
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    hosts: HashMap<String, Vec<IpAddr>>,
    failures: HashMap<String, ResolveFailure>,
    latency: Duration,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>, addresses: Vec<IpAddr>) -> Self {
        self.hosts.insert(host.into(), addresses);
        self
    }

    pub fn with_failure(mut self, host: impl Into<String>, failure: ResolveFailure) -> Self {
        self.failures.insert(host.into(), failure);
        self
    }

    /// Simulated lookup duration
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn lookup(&self, host: &str) -> ResolveResult<Vec<IpAddr>> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if let Some(failure) = self.failures.get(host) {
            return Err(failure.clone());
        }

        self.hosts
            .get(host)
            .cloned()
            .ok_or_else(|| ResolveFailure::NoSuchHost(host.to_string()))
    }
}
