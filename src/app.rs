//! Wires a parsed [`Config`] to the engine, the progress printer and the
//! summary formatter

use crate::config::display_config_summary;
use crate::error::Result;
use crate::executor::{CancelHandle, ProbeEngine};
use crate::logging::{Logger, LoggerFactory};
use crate::models::{Config, SessionSummary};
use crate::output::{OutputFormatter, OutputFormatterFactory, ProgressPrinter};

/// One invocation of the tool
pub struct App {
    config: Config,
    logger_factory: LoggerFactory,
}

impl App {
    pub fn new(config: Config) -> Self {
        let logger_factory = LoggerFactory::new(config.clone());
        Self { config, logger_factory }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the session, printing progress lines unless JSON output is on
    ///
    /// The first Ctrl-C stops new dispatches; a second one exits at once.
    pub async fn run(&self) -> Result<SessionSummary> {
        let app_logger = self.logger_factory.create_logger("APP").await;
        crate::log_debug!(app_logger, "{} v{}", crate::PKG_NAME, crate::VERSION);
        if self.config.debug {
            eprintln!("{}\n", display_config_summary(&self.config));
        }

        let probe_config = self.config.probe_config()?;
        let logger = self.logger_factory.create_probe_logger().await;
        let mut engine = ProbeEngine::new(probe_config)
            .with_logger(logger)
            .with_session_id(self.logger_factory.session_id());

        let printer = if self.config.json_output {
            None
        } else {
            let events = engine.subscribe();
            let printer = ProgressPrinter::new(self.config.verbose, self.config.enable_color);
            Some(tokio::spawn(printer.run(events)))
        };

        let interrupt = tokio::spawn(watch_interrupts(engine.cancel_handle(), app_logger.clone()));
        let outcome = engine.run().await;
        interrupt.abort();

        if let Ok(summary) = &outcome {
            crate::log_info!(
                app_logger,
                "Session finished in {:?} with exit code {}",
                summary.total_time,
                summary.exit_code()
            );
        }

        // Closing the progress channel lets the printer drain and finish
        drop(engine);
        if let Some(printer) = printer {
            let _ = printer.await;
        }

        outcome
    }

    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        OutputFormatterFactory::for_config(&self.config)
    }

    /// Summary as the configured formatter renders it
    pub fn render(&self, summary: &SessionSummary) -> Result<String> {
        self.formatter().format_summary(summary)
    }
}

async fn watch_interrupts(cancel: CancelHandle, logger: Logger) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    cancel.cancel("interrupted by Ctrl-C");
    crate::log_warn!(logger, "Interrupted, finishing in-flight operations; press Ctrl-C again to exit");

    if tokio::signal::ctrl_c().await.is_ok() {
        crate::log_error!(logger, "Interrupted twice, exiting without a summary");
        std::process::exit(130);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProbeMode;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_app_runs_telnet_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                if listener.accept().await.is_err() {
                    break;
                }
            }
        });

        let config = Config {
            mode: ProbeMode::Telnet,
            host: "127.0.0.1".to_string(),
            port: Some(port),
            count: 2,
            delay_ms: 0,
            json_output: true,
            ..Config::default()
        };
        let app = App::new(config);
        let summary = app.run().await.unwrap();

        assert_eq!(summary.stats.succeeded, 2);
        assert_eq!(summary.exit_code(), 0);
        assert_eq!(summary.session_id, app.logger_factory.session_id());

        let rendered = app.render(&summary).unwrap();
        assert!(rendered.trim_start().starts_with('{'));
    }
}
