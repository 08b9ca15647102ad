//! Ingestion run orchestration.
//!
//! One run takes one source through the whole flow:
//! adapter fetch → validation → upsert by url → outcome. Runs never
//! return an error; every failure mode ends up in the returned
//! [`IngestionOutcome`] and in the events sent to the observer.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use chrono::Utc;

use newswire_core::{
    ArticleDraft, ArticleStore, FetchCriteria, IngestEvent, IngestObserver, IngestionOutcome,
    SkipReason, SourceId, UpsertPolicy,
};

use crate::config::Config;
use crate::providers::ProviderRegistry;

/// Runs ingestion for registered sources against one article store.
///
/// The orchestrator keeps no per-run state, so one instance can be shared
/// (behind an `Arc`) by the CLI, the scheduler and concurrent runs of
/// different sources.
pub struct Orchestrator {
    registry: Arc<ProviderRegistry>,
    store: Arc<dyn ArticleStore>,
    observer: Arc<dyn IngestObserver>,
    policy: UpsertPolicy,
    fetch_timeout: Option<Duration>,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        store: Arc<dyn ArticleStore>,
        observer: Arc<dyn IngestObserver>,
    ) -> Self {
        Self {
            registry,
            store,
            observer,
            policy: UpsertPolicy::default(),
            fetch_timeout: None,
        }
    }

    /// Apply the `[ingest]` section: image refresh policy and fetch deadline.
    pub fn configured(mut self, config: &Config) -> Self {
        self.policy = UpsertPolicy {
            refresh_image_url: config.ingest.refresh_image_url,
        };
        self.fetch_timeout = config.ingest.fetch_timeout_secs.map(Duration::from_secs);
        self
    }

    pub fn with_policy(mut self, policy: UpsertPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn ArticleStore> {
        &self.store
    }

    pub fn observer(&self) -> &Arc<dyn IngestObserver> {
        &self.observer
    }

    /// Run ingestion for a source given by name.
    ///
    /// An unknown name yields a `SourceNotFound` outcome with zero work.
    pub async fn run(&self, source: &str) -> IngestionOutcome {
        match source.parse::<SourceId>() {
            Ok(id) if self.registry.get(id).is_some() => self.run_source(id).await,
            _ => self.not_found(source),
        }
    }

    /// Run every registered source once, one after another.
    pub async fn run_all(&self) -> Vec<IngestionOutcome> {
        let mut outcomes = Vec::with_capacity(self.registry.len());
        for source in self.registry.sources() {
            outcomes.push(self.run_source(source).await);
        }
        outcomes
    }

    pub async fn run_source(&self, source: SourceId) -> IngestionOutcome {
        let Some(provider) = self.registry.get(source) else {
            return self.not_found(source.as_str());
        };

        self.observer.emit(IngestEvent::RunStarted { source });
        let mut outcome = IngestionOutcome::begin(source.as_str(), Utc::now());

        let criteria = FetchCriteria::default();
        let fetched = match self.fetch_timeout {
            Some(limit) => match tokio::time::timeout(limit, provider.fetch(&criteria)).await {
                Ok(fetched) => fetched,
                Err(_) => Err(anyhow!("fetch timed out after {}s", limit.as_secs_f64())),
            },
            None => provider.fetch(&criteria).await,
        };

        let drafts = match fetched {
            Ok(drafts) => drafts,
            Err(e) => return self.fail(outcome, format!("{e:#}")),
        };

        for draft in drafts {
            outcome.attempted += 1;
            match draft.validate() {
                Ok(upsert) => {
                    if let Err(e) = self.store.upsert_by_url(&upsert, self.policy).await {
                        return self.fail(outcome, format!("{e:#}"));
                    }
                    outcome.saved += 1;
                }
                Err(reason) => {
                    outcome.skipped += 1;
                    self.skip(source, draft, reason);
                }
            }
        }

        self.finish(outcome)
    }

    fn skip(&self, source: SourceId, draft: ArticleDraft, reason: SkipReason) {
        self.observer.emit(IngestEvent::RecordSkipped {
            source,
            url: draft.url,
            title: draft.title,
            reason,
        });
    }

    fn not_found(&self, source: &str) -> IngestionOutcome {
        self.observer.emit(IngestEvent::UnknownSource {
            source: source.to_string(),
        });
        self.finish(IngestionOutcome::not_found(source, Utc::now()))
    }

    fn fail(&self, outcome: IngestionOutcome, message: String) -> IngestionOutcome {
        self.observer.emit(IngestEvent::RunFailed {
            source: outcome.source.clone(),
            message: message.clone(),
        });
        self.finish(outcome.fail(message))
    }

    fn finish(&self, outcome: IngestionOutcome) -> IngestionOutcome {
        let outcome = outcome.finish(Utc::now());
        self.observer.emit(IngestEvent::RunFinished {
            outcome: outcome.clone(),
        });
        outcome
    }
}
