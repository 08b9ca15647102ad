//! Ingestion observability.
//!
//! Every notable thing that happens during a run (configuration problems,
//! transport failures, skipped records, run boundaries, scheduler
//! decisions) is reported as an [`IngestEvent`] to an injected
//! [`IngestObserver`]. Events are the contract; the application crate
//! forwards them to `tracing`, and tests record them.

use std::sync::Mutex;

use crate::models::{IngestionOutcome, SkipReason, SourceId};

/// Event severity, used by sinks to choose a log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

/// A single observable ingestion event.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestEvent {
    /// The orchestrator began a run for a known source.
    RunStarted { source: SourceId },
    /// An adapter could not run because it is misconfigured (e.g. no API key).
    ConfigurationError { source: SourceId, message: String },
    /// A provider request failed after retries (HTTP status, network, decode).
    TransportError { source: SourceId, message: String },
    /// A run was requested for an identifier outside the registry.
    UnknownSource { source: String },
    /// A provider record was rejected by validation.
    RecordSkipped {
        source: SourceId,
        url: Option<String>,
        title: Option<String>,
        reason: SkipReason,
    },
    /// The run aborted (store failure, timeout, adapter panic).
    RunFailed { source: String, message: String },
    /// Terminal event of every run, successful or not.
    RunFinished { outcome: IngestionOutcome },
    /// A scheduled tick fired while the previous run was still in flight.
    ScheduledRunSkipped { source: SourceId },
    /// A scheduled run ended.
    ScheduledRunCompleted { source: SourceId, succeeded: bool },
}

impl IngestEvent {
    pub fn severity(&self) -> Severity {
        match self {
            IngestEvent::RunStarted { .. }
            | IngestEvent::ScheduledRunSkipped { .. }
            | IngestEvent::ScheduledRunCompleted { .. } => Severity::Info,
            IngestEvent::RunFinished { outcome } => {
                if outcome.is_success() {
                    Severity::Info
                } else {
                    Severity::Error
                }
            }
            IngestEvent::RecordSkipped { .. } | IngestEvent::UnknownSource { .. } => Severity::Warn,
            IngestEvent::ConfigurationError { .. }
            | IngestEvent::TransportError { .. }
            | IngestEvent::RunFailed { .. } => Severity::Error,
        }
    }

    /// Short machine name, used as the `event` field in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestEvent::RunStarted { .. } => "run_started",
            IngestEvent::ConfigurationError { .. } => "configuration_error",
            IngestEvent::TransportError { .. } => "transport_error",
            IngestEvent::UnknownSource { .. } => "unknown_source",
            IngestEvent::RecordSkipped { .. } => "record_skipped",
            IngestEvent::RunFailed { .. } => "run_failed",
            IngestEvent::RunFinished { .. } => "run_finished",
            IngestEvent::ScheduledRunSkipped { .. } => "scheduled_run_skipped",
            IngestEvent::ScheduledRunCompleted { .. } => "scheduled_run_completed",
        }
    }
}

/// Receives ingestion events. Implementations must be cheap and must not
/// block; they are called inline from the pipeline.
pub trait IngestObserver: Send + Sync {
    fn emit(&self, event: IngestEvent);
}

/// Discards every event.
pub struct NoopObserver;

impl IngestObserver for NoopObserver {
    fn emit(&self, _event: IngestEvent) {}
}

/// Keeps every event in memory. Used by tests to assert on what a run reported.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<IngestEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events seen so far, in emission order.
    pub fn events(&self) -> Vec<IngestEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn count(&self, pred: impl Fn(&IngestEvent) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }
}

impl IngestObserver for RecordingObserver {
    fn emit(&self, event: IngestEvent) {
        match self.events.lock() {
            Ok(mut guard) => guard.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
