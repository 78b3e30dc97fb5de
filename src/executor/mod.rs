//! Probe session execution
//!
//! [`ProbeEngine`] drives one session end to end: resolve once, build the
//! strategy, hand the operations to the [`Orchestrator`], then reduce the
//! results into stats. Progress is streamed as [`ProgressEvent`]s while the
//! session runs.

pub mod dispatch;
pub mod session;
pub mod throttle;

pub use dispatch::{Orchestrator, SystemResources};
pub use session::{ProbeOperation, Session};
pub use throttle::DelayPolicy;

use crate::defaults;
use crate::dns::{resolve_target, ResolveFailure, Resolver, SystemResolver};
use crate::error::{AppError, Result};
use crate::logging::ProbeLogger;
use crate::models::{DnsLookup, InputParams, ProbeConfig, ProbeResult, ResolvedTarget, SessionSummary};
use crate::probe::{DefaultStrategyFactory, StrategyFactory};
use crate::stats::{ProbeStats, StatsAggregator};
use crate::types::{ProbeKind, ProbeMode};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

/// Streamed while a session runs
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Resolved {
        target: ResolvedTarget,
        duration: Duration,
    },
    ResolutionFailed {
        hostname: String,
        error: String,
        duration: Duration,
    },
    ProbeCompleted {
        mode: ProbeMode,
        result: ProbeResult,
    },
    Cancelled {
        reason: String,
        undispatched: u64,
    },
    Finished {
        stats: ProbeStats,
    },
}

pub type ProgressSender = mpsc::UnboundedSender<ProgressEvent>;
pub type ProgressReceiver = mpsc::UnboundedReceiver<ProgressEvent>;

/// Session-wide cancellation signal, fired by a deadline or Ctrl-C
///
/// Cancelling stops new dispatches; probes already in flight run to their
/// own deadline.
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<Option<String>>>,
    rx: watch::Receiver<Option<String>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(None);
        Self { tx: Arc::new(tx), rx }
    }

    /// First reason wins
    pub fn cancel(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.borrow().is_some()
    }

    pub fn reason(&self) -> Option<String> {
        self.rx.borrow().clone()
    }

    /// Resolves once the handle is cancelled
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|reason| reason.is_some()).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs one probe session
pub struct ProbeEngine {
    config: Arc<ProbeConfig>,
    resolver: Option<Arc<dyn Resolver>>,
    factory: Arc<dyn StrategyFactory>,
    logger: ProbeLogger,
    progress: Option<ProgressSender>,
    cancel: CancelHandle,
    session_id: String,
}

impl ProbeEngine {
    pub fn new(config: ProbeConfig) -> Self {
        Self {
            config: Arc::new(config),
            resolver: None,
            factory: Arc::new(DefaultStrategyFactory::new()),
            logger: ProbeLogger::disabled(),
            progress: None,
            cancel: CancelHandle::new(),
            session_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Defaults to the system resolver
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_strategy_factory(mut self, factory: Arc<dyn StrategyFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_logger(mut self, logger: ProbeLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_progress(mut self, progress: ProgressSender) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Convenience: attach a fresh progress channel and return its receiver
    pub fn subscribe(&mut self) -> ProgressReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.progress = Some(tx);
        rx
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Run the session to completion
    ///
    /// Resolution failure and cancellation before any dispatch still yield
    /// a summary (zero attempted, error recorded). Invalid parameters and
    /// socket setup failure are returned as errors.
    pub async fn run(&self) -> Result<SessionSummary> {
        self.config.validate()?;

        let start_time = Utc::now();
        let started = Instant::now();
        let deadline_task = self.config.session_deadline.map(|deadline| {
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                cancel.cancel(format!("session deadline of {:?} reached", deadline));
            })
        });

        let outcome = self.run_session(start_time, started).await;

        if let Some(task) = deadline_task {
            task.abort();
        }
        outcome
    }

    async fn run_session(&self, start_time: DateTime<Utc>, started: Instant) -> Result<SessionSummary> {
        let resolver: Arc<dyn Resolver> = match &self.resolver {
            Some(resolver) => resolver.clone(),
            None => Arc::new(SystemResolver::new()),
        };

        let resolution = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(None),
            resolved = resolve_target(resolver.as_ref(), &self.config.host, self.config.resolve_timeout) => {
                resolved.map_err(Some)
            }
        };
        let resolve_time = started.elapsed();

        let target = match resolution {
            Ok(target) => target,
            Err(failure) => return Ok(self.unresolved_summary(failure, resolve_time, start_time, started).await),
        };

        if let Some(progress) = &self.progress {
            let _ = progress.send(ProgressEvent::Resolved {
                target: target.clone(),
                duration: resolve_time,
            });
        }
        self.logger.log_resolution(&target, resolve_time).await;

        let requested = self.config.requested_operations(target.len());
        self.check_operation_limits(requested)?;

        let strategy = self.factory.create(&self.config, &self.logger).await?;
        let dns_lookup = DnsLookup::resolved(&target, resolve_time);
        let session = Session::new(self.config.clone(), target, strategy);

        let orchestrator = Orchestrator::new(&self.config)
            .with_cancel(self.cancel.clone())
            .with_logger(self.logger.clone())
            .with_progress(self.progress.clone());
        self.logger
            .log_session_start(self.config.mode.module_name(), requested, orchestrator.max_in_flight())
            .await;

        let results = orchestrator.run(&session).await;
        session.close().await;

        let total_time = started.elapsed();
        let stats = StatsAggregator::new(requested)
            .with_resolve_time(resolve_time)
            .with_total_time(total_time)
            .aggregate(&results);

        self.finish(stats, results, dns_lookup, start_time, total_time).await
    }

    /// Summary for a session that never got past resolution
    async fn unresolved_summary(
        &self,
        failure: Option<ResolveFailure>,
        resolve_time: Duration,
        start_time: DateTime<Utc>,
        started: Instant,
    ) -> SessionSummary {
        let message = match &failure {
            Some(failure) => failure.to_string(),
            None => self
                .cancel
                .reason()
                .unwrap_or_else(|| "cancelled during resolution".to_string()),
        };

        let error = match failure {
            Some(failure) => AppError::from(failure),
            None => AppError::cancelled(message.clone()),
        };
        self.logger
            .log_resolution_failure(&self.config.host, &error, resolve_time)
            .await;
        if let Some(progress) = &self.progress {
            let _ = progress.send(ProgressEvent::ResolutionFailed {
                hostname: self.config.host.clone(),
                error: message.clone(),
                duration: resolve_time,
            });
        }

        // Nothing resolved, so the session counts as targeting one address
        let requested = self.config.requested_operations(1);
        let total_time = started.elapsed();
        let stats = StatsAggregator::new(requested)
            .with_resolve_time(resolve_time)
            .with_total_time(total_time)
            .aggregate(&[]);

        let dns_lookup = DnsLookup::failed(self.config.host.clone(), message, resolve_time);
        let mut summary = self.summary(stats, Vec::new(), dns_lookup, start_time, total_time);
        summary.error = Some(error.to_string());
        summary.fatal_exit_code = Some(error.exit_code());
        summary
    }

    async fn finish(
        &self,
        stats: ProbeStats,
        results: Vec<ProbeResult>,
        dns_lookup: DnsLookup,
        start_time: DateTime<Utc>,
        total_time: Duration,
    ) -> Result<SessionSummary> {
        self.logger.log_summary(&stats).await;
        if let Some(progress) = &self.progress {
            let _ = progress.send(ProgressEvent::Finished { stats: stats.clone() });
        }

        let mut summary = self.summary(stats, results, dns_lookup, start_time, total_time);
        if let Some(reason) = self.cancel.reason() {
            summary.error = Some(AppError::cancelled(reason).to_string());
        }
        Ok(summary)
    }

    fn summary(
        &self,
        stats: ProbeStats,
        results: Vec<ProbeResult>,
        dns_lookup: DnsLookup,
        start_time: DateTime<Utc>,
        total_time: Duration,
    ) -> SessionSummary {
        let end_time = chrono::Duration::from_std(total_time)
            .ok()
            .and_then(|elapsed| start_time.checked_add_signed(elapsed))
            .unwrap_or_else(Utc::now);

        SessionSummary {
            session_id: self.session_id.clone(),
            input_params: InputParams::from(self.config.as_ref()),
            module_name: self.config.mode.module_name().to_string(),
            dns_lookup,
            results,
            stats,
            start_time,
            end_time,
            total_time,
            error: None,
            cancelled: self.cancel.is_cancelled(),
            fatal_exit_code: None,
        }
    }

    fn check_operation_limits(&self, requested: u64) -> Result<()> {
        if self.config.mode.probe_kind() == ProbeKind::IcmpEcho && requested > defaults::MAX_ICMP_OPERATIONS {
            return Err(AppError::validation(format!(
                "ICMP session would send {} requests but only {} sequence numbers exist; lower --count",
                requested,
                defaults::MAX_ICMP_OPERATIONS
            )));
        }

        if requested > defaults::MAX_SESSION_OPERATIONS {
            return Err(AppError::validation(format!(
                "Session would run {} operations; the limit is {}",
                requested,
                defaults::MAX_SESSION_OPERATIONS
            )));
        }

        Ok(())
    }
}
