//! Bounded dispatch of a session's operations

use super::session::{ProbeOperation, Session};
use super::throttle::DelayPolicy;
use super::{CancelHandle, ProgressEvent, ProgressSender};
use crate::defaults;
use crate::logging::ProbeLogger;
use crate::models::{ProbeConfig, ProbeResult};
use crate::types::{ProbeErrorKind, ProbeMode};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

/// Host facts used to size the parallel worker pool
#[derive(Debug, Clone)]
pub struct SystemResources {
    pub cpu_cores: usize,
    /// Default in-flight bound for parallel sessions
    pub optimal_in_flight: usize,
}

impl SystemResources {
    pub fn detect() -> Self {
        let cpu_cores = num_cpus::get();
        // Probes are I/O bound; most of their time is spent waiting
        let optimal_in_flight = (cpu_cores * 8).clamp(defaults::MIN_IN_FLIGHT, defaults::MAX_IN_FLIGHT);

        Self {
            cpu_cores,
            optimal_in_flight,
        }
    }
}

/// Dispatches every operation of a session and collects exactly one
/// result per operation
///
/// Sequential and parallel sessions share one path: a semaphore with one
/// permit, or `max_in_flight` permits. The delay is applied after a permit
/// is acquired and before the probe is spawned.
pub struct Orchestrator {
    mode: ProbeMode,
    limiter: Arc<Semaphore>,
    max_in_flight: usize,
    delay: DelayPolicy,
    cancel: CancelHandle,
    logger: ProbeLogger,
    progress: Option<ProgressSender>,
}

impl Orchestrator {
    pub fn new(config: &ProbeConfig) -> Self {
        let max_in_flight = config.max_in_flight.max(1);
        Self {
            mode: config.mode,
            limiter: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
            delay: DelayPolicy::from_config(config),
            cancel: CancelHandle::new(),
            logger: ProbeLogger::disabled(),
            progress: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_logger(mut self, logger: ProbeLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_progress(mut self, progress: Option<ProgressSender>) -> Self {
        self.progress = progress;
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Results come back ordered by sequence number
    pub async fn run(&self, session: &Session) -> Vec<ProbeResult> {
        let strategy = session.strategy();
        let mut operations = session.operations();
        let mut handles: Vec<(ProbeOperation, JoinHandle<ProbeResult>)> = Vec::new();
        let mut results = Vec::new();

        for operation in operations.by_ref() {
            match self.admit(&operation).await {
                Some(permit) => {
                    let strategy = strategy.clone();
                    let logger = self.logger.clone();
                    let progress = self.progress.clone();
                    let mode = self.mode;

                    let handle = tokio::spawn(async move {
                        let _permit = permit;
                        let result = strategy.execute(&operation.target, operation.sequence).await;
                        logger.log_result(&result).await;
                        if let Some(progress) = progress {
                            let _ = progress.send(ProgressEvent::ProbeCompleted {
                                mode,
                                result: result.clone(),
                            });
                        }
                        result
                    });
                    handles.push((operation, handle));
                }
                None => {
                    results.push(ProbeResult::cancelled(&operation.target, operation.sequence));
                    break;
                }
            }
        }

        // Everything left after a cancellation is recorded, never dropped
        results.extend(operations.map(|op| ProbeResult::cancelled(&op.target, op.sequence)));
        if !results.is_empty() {
            let reason = self.cancel.reason().unwrap_or_else(|| "cancelled".to_string());
            let undispatched = results.len() as u64;
            self.logger.log_cancelled(&reason, undispatched).await;
            if let Some(progress) = &self.progress {
                let _ = progress.send(ProgressEvent::Cancelled { reason, undispatched });
            }
        }

        let settled = join_all(handles.into_iter().map(|(operation, handle)| async move {
            handle.await.unwrap_or_else(|e| {
                ProbeResult::failed(
                    &operation.target,
                    operation.sequence,
                    Utc::now(),
                    Duration::ZERO,
                    ProbeErrorKind::Other,
                    format!("probe task failed: {}", e),
                )
            })
        }))
        .await;

        results.extend(settled);
        results.sort_by_key(|result| result.sequence);
        results
    }

    /// Wait for a free slot and the pre-dispatch delay; `None` once cancelled
    async fn admit(&self, operation: &ProbeOperation) -> Option<OwnedSemaphorePermit> {
        if self.cancel.is_cancelled() {
            return None;
        }

        let permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return None,
            permit = self.limiter.clone().acquire_owned() => permit.ok()?,
        };

        let delay = self.delay.next_delay();
        if !delay.is_zero() {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.logger.log_dispatch(&operation.target, operation.sequence, delay).await;
        Some(permit)
    }
}
