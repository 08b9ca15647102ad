//! Periodic ingestion.
//!
//! The scheduler drives one timer loop per configured source. Every tick
//! starts a run in its own task, guarded so that a source never has two
//! runs in flight: a tick (or a manual [`Scheduler::trigger`]) that finds
//! its source still running is skipped and reported.
//!
//! ```text
//!   tick ──► InFlight::try_acquire(source) ──► spawn(run_source) ──► ScheduledRunCompleted
//!                    │ busy
//!                    └──► ScheduledRunSkipped
//! ```
//!
//! A panic inside a run is caught at the task boundary and turned into a
//! failed outcome; the loop keeps ticking.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use newswire_core::{IngestEvent, IngestionOutcome, SourceId};

use crate::config::SchedulerConfig;
use crate::ingest::Orchestrator;

/// Set of sources with a run in progress.
#[derive(Default)]
struct InFlight {
    running: Mutex<HashSet<SourceId>>,
}

impl InFlight {
    fn try_acquire(self: &Arc<Self>, source: SourceId) -> Option<InFlightGuard> {
        let mut running = match self.running.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if running.insert(source) {
            Some(InFlightGuard {
                set: Arc::clone(self),
                source,
            })
        } else {
            None
        }
    }

    fn contains(&self, source: SourceId) -> bool {
        match self.running.lock() {
            Ok(guard) => guard.contains(&source),
            Err(poisoned) => poisoned.into_inner().contains(&source),
        }
    }
}

/// Releases the source when dropped, including during a panic unwind.
struct InFlightGuard {
    set: Arc<InFlight>,
    source: SourceId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut running = match self.set.running.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        running.remove(&self.source);
    }
}

/// Periodic, overlap-free ingestion over a fixed set of sources.
#[derive(Clone)]
pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    interval: Duration,
    sources: Vec<SourceId>,
    in_flight: Arc<InFlight>,
}

impl Scheduler {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        interval: Duration,
        sources: Vec<SourceId>,
    ) -> Self {
        let mut sources = sources;
        sources.sort();
        sources.dedup();
        Self {
            orchestrator,
            interval,
            sources,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    pub fn from_config(orchestrator: Arc<Orchestrator>, config: &SchedulerConfig) -> Self {
        Self::new(
            orchestrator,
            Duration::from_secs(config.interval_secs),
            config.sources.clone(),
        )
    }

    pub fn sources(&self) -> &[SourceId] {
        &self.sources
    }

    /// Whether `source` currently has a run in flight.
    pub fn is_running(&self, source: SourceId) -> bool {
        self.in_flight.contains(source)
    }

    /// Run `source` now unless it is already running.
    ///
    /// Returns `None` when the run was skipped because of overlap.
    pub async fn trigger(&self, source: SourceId) -> Option<IngestionOutcome> {
        let observer = self.orchestrator.observer().clone();
        let Some(guard) = self.in_flight.try_acquire(source) else {
            observer.emit(IngestEvent::ScheduledRunSkipped { source });
            return None;
        };

        let started_at = Utc::now();
        let orchestrator = Arc::clone(&self.orchestrator);
        let joined = tokio::spawn(async move {
            let _guard = guard;
            orchestrator.run_source(source).await
        })
        .await;

        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                let message = if e.is_panic() {
                    "ingestion run panicked"
                } else {
                    "ingestion run was cancelled"
                };
                observer.emit(IngestEvent::RunFailed {
                    source: source.to_string(),
                    message: message.to_string(),
                });
                IngestionOutcome::begin(source.as_str(), started_at)
                    .fail(message)
                    .finish(Utc::now())
            }
        };

        observer.emit(IngestEvent::ScheduledRunCompleted {
            source,
            succeeded: outcome.is_success(),
        });
        Some(outcome)
    }

    /// Trigger every scheduled source concurrently and wait for all of them.
    ///
    /// Results are in source order; `None` marks a source that was skipped
    /// because it was already running.
    pub async fn run_all_once(&self) -> Vec<(SourceId, Option<IngestionOutcome>)> {
        let mut runs = JoinSet::new();
        for &source in &self.sources {
            let this = self.clone();
            runs.spawn(async move { (source, this.trigger(source).await) });
        }

        let mut results = Vec::with_capacity(self.sources.len());
        while let Some(joined) = runs.join_next().await {
            if let Ok(result) = joined {
                results.push(result);
            }
        }
        results.sort_by_key(|(source, _)| *source);
        results
    }

    /// Start one timer loop per source. The first tick fires immediately;
    /// ticks missed while the runtime was busy are skipped, not replayed.
    pub fn spawn(&self) -> SchedulerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut loops = JoinSet::new();

        for &source in &self.sources {
            let this = self.clone();
            let mut stop = stop_rx.clone();
            loops.spawn(async move {
                let mut ticker = tokio::time::interval(this.interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                let mut runs = JoinSet::new();

                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            let this = this.clone();
                            runs.spawn(async move {
                                this.trigger(source).await;
                            });
                        }
                        Some(_) = runs.join_next(), if !runs.is_empty() => {}
                        _ = stop.changed() => break,
                    }
                }

                // Let in-flight runs finish before the loop exits.
                while runs.join_next().await.is_some() {}
            });
        }

        SchedulerHandle { stop_tx, loops }
    }
}

/// Controls a running scheduler. Dropping the handle also stops the loops.
pub struct SchedulerHandle {
    stop_tx: watch::Sender<bool>,
    loops: JoinSet<()>,
}

impl SchedulerHandle {
    /// Stop ticking and wait for every in-flight run to complete.
    pub async fn shutdown(mut self) {
        let _ = self.stop_tx.send(true);
        while self.loops.join_next().await.is_some() {}
    }
}
