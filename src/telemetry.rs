//! Logging setup and the `tracing` sink for ingestion events.
//!
//! Logs go to **stderr** so stdout stays parseable for scripts (`newswire
//! articles` prints JSON there).

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use newswire_core::{IngestEvent, IngestObserver, Severity};

use crate::config::{LogFormat, LoggingConfig};

/// Install the global subscriber. `RUST_LOG` overrides `logging.filter`.
///
/// Calling this twice is harmless; the second call is ignored.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };
    let _ = result;
}

/// Forwards [`IngestEvent`]s to `tracing` with structured fields.
pub struct TracingObserver;

impl IngestObserver for TracingObserver {
    fn emit(&self, event: IngestEvent) {
        let kind = event.kind();
        match &event {
            IngestEvent::RunStarted { source } => {
                tracing::info!(event = kind, %source, "ingestion run started");
            }
            IngestEvent::ConfigurationError { source, message } => {
                tracing::error!(event = kind, %source, "{}", message);
            }
            IngestEvent::TransportError { source, message } => {
                tracing::error!(event = kind, %source, "{}", message);
            }
            IngestEvent::UnknownSource { source } => {
                tracing::warn!(event = kind, %source, "unknown news source");
            }
            IngestEvent::RecordSkipped {
                source,
                url,
                title,
                reason,
            } => {
                tracing::warn!(
                    event = kind,
                    %source,
                    url = url.as_deref().unwrap_or(""),
                    title = title.as_deref().unwrap_or(""),
                    %reason,
                    "skipping article"
                );
            }
            IngestEvent::RunFailed { source, message } => {
                tracing::error!(event = kind, %source, "ingestion run failed: {}", message);
            }
            IngestEvent::RunFinished { outcome } => {
                let fields = (
                    outcome.source.as_str(),
                    outcome.status.to_string(),
                    outcome.attempted,
                    outcome.saved,
                    outcome.skipped,
                    outcome.duration_ms(),
                );
                if event.severity() == Severity::Info {
                    tracing::info!(
                        event = kind,
                        source = fields.0,
                        status = %fields.1,
                        attempted = fields.2,
                        saved = fields.3,
                        skipped = fields.4,
                        duration_ms = fields.5,
                        "ingestion run finished"
                    );
                } else {
                    tracing::error!(
                        event = kind,
                        source = fields.0,
                        status = %fields.1,
                        attempted = fields.2,
                        saved = fields.3,
                        skipped = fields.4,
                        duration_ms = fields.5,
                        error = outcome.error.as_deref().unwrap_or(""),
                        "ingestion run finished"
                    );
                }
            }
            IngestEvent::ScheduledRunSkipped { source } => {
                tracing::info!(event = kind, %source, "previous run still in flight; tick skipped");
            }
            IngestEvent::ScheduledRunCompleted { source, succeeded } => {
                tracing::info!(event = kind, %source, succeeded, "scheduled run completed");
            }
        }
    }
}
