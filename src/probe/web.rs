//! HTTP reachability probe pinned to one resolved address per request

use super::ProbeStrategy;
use crate::error::{AppError, Result};
use crate::models::{ProbeResult, ProbeTarget};
use crate::types::{ProbeErrorKind, ProbeKind};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Url};
use std::collections::HashMap;
use std::error::Error as _;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// GET `url` against each resolved address; any HTTP response is a success
pub struct WebProbe {
    url: Url,
    host: String,
    port: u16,
    timeout: Duration,
    /// One client per address so connection reuse never crosses addresses
    clients: RwLock<HashMap<IpAddr, Arc<Client>>>,
}

impl WebProbe {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let url = Url::parse(url)?;
        let host = url
            .host_str()
            .ok_or_else(|| AppError::config(format!("URL has no host: {}", url)))?
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| AppError::config(format!("URL has no known port: {}", url)))?;

        Ok(Self {
            url,
            host,
            port,
            timeout,
            clients: RwLock::new(HashMap::new()),
        })
    }

    async fn client_for(&self, address: IpAddr) -> Result<Arc<Client>> {
        if let Some(client) = self.clients.read().await.get(&address) {
            return Ok(client.clone());
        }

        let client = Client::builder()
            .timeout(self.timeout)
            .user_agent(format!("nprobe/{}", crate::VERSION))
            .resolve(&self.host, SocketAddr::new(address, self.port))
            .build()
            .map_err(|e| AppError::http_request(format!("Failed to create HTTP client: {}", e)))?;
        let client = Arc::new(client);

        self.clients.write().await.insert(address, client.clone());
        Ok(client)
    }
}

/// Map a transport-level request failure onto the per-probe taxonomy
pub fn classify_request_error(error: &reqwest::Error) -> ProbeErrorKind {
    if error.is_timeout() {
        return ProbeErrorKind::Timeout;
    }

    let mut source = error.source();
    while let Some(cause) = source {
        if let Some(io_error) = cause.downcast_ref::<std::io::Error>() {
            return super::tcp::classify_connect_error(io_error);
        }
        source = cause.source();
    }

    if error.is_connect() {
        ProbeErrorKind::Unreachable
    } else {
        ProbeErrorKind::Other
    }
}

#[async_trait]
impl ProbeStrategy for WebProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::HttpGet
    }

    async fn execute(&self, target: &ProbeTarget, sequence: u32) -> ProbeResult {
        let sent_at = Utc::now();
        let client = match self.client_for(target.address).await {
            Ok(client) => client,
            Err(e) => {
                return ProbeResult::failed(
                    target,
                    sequence,
                    sent_at,
                    Duration::ZERO,
                    ProbeErrorKind::Other,
                    e.to_string(),
                )
            }
        };

        let started = Instant::now();
        let response = match client.get(self.url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                return ProbeResult::failed(
                    target,
                    sequence,
                    sent_at,
                    started.elapsed(),
                    classify_request_error(&e),
                    e.to_string(),
                )
            }
        };

        let status = response.status().as_u16();
        match response.bytes().await {
            Ok(body) => ProbeResult::success(target, sequence, sent_at, started.elapsed())
                .with_status_code(status)
                .with_payload_bytes(body.len()),
            Err(e) => {
                let mut result = ProbeResult::failed(
                    target,
                    sequence,
                    sent_at,
                    started.elapsed(),
                    classify_request_error(&e),
                    format!("body read failed: {}", e),
                );
                result.status_code = Some(status);
                result
            }
        }
    }
}
