//! News provider adapters.
//!
//! Each supported provider has one adapter implementing [`NewsProvider`].
//! An adapter owns its credentials, its HTTP client and a private mapping
//! from the provider's wire shape onto [`ArticleDraft`].
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │             ProviderRegistry               │
//! │  ┌──────────┐ ┌──────────┐ ┌────────────┐  │
//! │  │ newsapi  │ │ opennws  │ │  newscred  │  │
//! │  └──────────┘ └──────────┘ └────────────┘  │
//! └──────────────┬─────────────────────────────┘
//!                ▼
//!       Orchestrator::run() → ArticleStore
//! ```
//!
//! # Failure contract
//!
//! Adapters degrade instead of failing. Missing credentials and transport
//! problems (network errors, non-2xx statuses, malformed bodies) are
//! reported to the injected [`IngestObserver`] and the adapter returns an
//! empty list. `Err` from [`NewsProvider::fetch`] is reserved for bugs.

pub mod newsapi;
pub mod newscred;
pub mod opennws;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use newswire_core::{
    ArticleDraft, FetchCriteria, IngestEvent, IngestObserver, SourceId, UnknownSource,
};

use crate::config::{Config, ProviderConfig};

pub use newsapi::NewsApiProvider;
pub use newscred::NewsCredProvider;
pub use opennws::OpenNwsProvider;

/// A news source that produces article drafts for ingestion.
///
/// # Lifecycle
///
/// 1. The adapter is built from config by [`ProviderRegistry::from_config`].
/// 2. [`fetch`](NewsProvider::fetch) is called once per ingestion run.
/// 3. Returned drafts are validated and upserted by the orchestrator.
#[async_trait]
pub trait NewsProvider: Send + Sync {
    /// Registry key of this adapter.
    fn source(&self) -> SourceId;

    /// One-line description, shown by `newswire sources` and `GET /sources`.
    fn description(&self) -> &str;

    /// Whether a credential is available. An unconfigured adapter still
    /// runs; it just reports the problem and returns nothing.
    fn is_configured(&self) -> bool;

    /// Fetch the latest articles.
    ///
    /// Returns `Ok(vec![])` for "no results", missing credentials and
    /// transport failures alike.
    async fn fetch(&self, criteria: &FetchCriteria) -> Result<Vec<ArticleDraft>>;
}

/// Why a provider request produced no usable response.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// 429, 5xx and network errors are worth another attempt.
    fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            ProviderError::Network(_) => true,
            ProviderError::Decode(_) => false,
        }
    }
}

/// Report missing credentials and return the degraded result.
pub(crate) fn missing_credentials(
    observer: &dyn IngestObserver,
    source: SourceId,
) -> Vec<ArticleDraft> {
    observer.emit(IngestEvent::ConfigurationError {
        source,
        message: format!("{} API key is not configured", source),
    });
    Vec::new()
}

/// Report a failed request and return the degraded result.
pub(crate) fn transport_failure(
    observer: &dyn IngestObserver,
    source: SourceId,
    err: ProviderError,
) -> Vec<ArticleDraft> {
    observer.emit(IngestEvent::TransportError {
        source,
        message: format!("Error fetching articles from {}: {}", source, err),
    });
    Vec::new()
}

/// Field deserializer for provider records: a value of the wrong type
/// becomes `None` instead of failing the record.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Decode the items of a provider's article array one by one. An item that
/// is not an object at all decodes to `T::default()`, which maps to a draft
/// the orchestrator skips.
pub(crate) fn decode_items<T: DeserializeOwned + Default>(items: Vec<Value>) -> Vec<T> {
    items
        .into_iter()
        .map(|item| serde_json::from_value(item).unwrap_or_default())
        .collect()
}

/// HTTP plumbing shared by the adapters: one client per adapter, a base
/// URL, and retry with exponential backoff.
pub(crate) struct HttpEndpoint {
    client: reqwest::Client,
    base: Url,
    max_retries: u32,
}

impl HttpEndpoint {
    pub(crate) fn new(cfg: &ProviderConfig, default_base: &str) -> Result<Self> {
        let raw = cfg.base_url.as_deref().unwrap_or(default_base);
        // `Url::join` drops the last path segment unless it ends with '/'.
        let normalized = if raw.ends_with('/') {
            raw.to_string()
        } else {
            format!("{raw}/")
        };
        let base = Url::parse(&normalized).with_context(|| format!("invalid base URL: {raw}"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base,
            max_retries: cfg.max_retries,
        })
    }

    pub(crate) fn url(&self, path: &str) -> Result<Url, ProviderError> {
        self.base
            .join(path)
            .map_err(|e| ProviderError::Decode(format!("bad endpoint path {path}: {e}")))
    }

    /// GET `path` and decode the JSON body.
    ///
    /// Retry strategy:
    /// - HTTP 429 or 5xx → retry with exponential backoff (1s, 2s, 4s, ...)
    /// - HTTP 4xx (not 429) → fail immediately
    /// - Network error → retry
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        bearer: Option<&str>,
    ) -> Result<T, ProviderError> {
        let url = self.url(path)?;
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let mut request = self.client.get(url.clone()).query(query);
            if let Some(token) = bearer {
                request = request.bearer_auth(token);
            }

            let err = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    if status.is_success() {
                        return serde_json::from_str(&body)
                            .map_err(|e| ProviderError::Decode(e.to_string()));
                    }
                    ProviderError::Status { status, body }
                }
                // The url can carry a credential in its query string.
                Err(e) => ProviderError::Network(e.without_url()),
            };

            if !err.is_retryable() {
                return Err(err);
            }
            last_err = Some(err);
        }

        Err(match last_err {
            Some(err) => err,
            None => ProviderError::Decode("no attempt was made".into()),
        })
    }
}

/// The configured adapters, keyed by [`SourceId`].
pub struct ProviderRegistry {
    providers: BTreeMap<SourceId, Arc<dyn NewsProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: BTreeMap::new(),
        }
    }

    /// Build one adapter per known source from the `[providers]` config.
    ///
    /// Fails only on invalid settings such as an unparseable base URL;
    /// missing credentials are reported later, at fetch time.
    pub fn from_config(config: &Config, observer: Arc<dyn IngestObserver>) -> Result<Self> {
        let providers = &config.providers;
        let mut registry = Self::new();
        registry.register(Arc::new(NewsApiProvider::new(
            &providers.newsapi,
            observer.clone(),
        )?));
        registry.register(Arc::new(OpenNwsProvider::new(
            &providers.opennws,
            observer.clone(),
        )?));
        registry.register(Arc::new(NewsCredProvider::new(
            &providers.newscred,
            observer,
        )?));
        Ok(registry)
    }

    /// Register an adapter, replacing any previous one for the same source.
    pub fn register(&mut self, provider: Arc<dyn NewsProvider>) {
        self.providers.insert(provider.source(), provider);
    }

    pub fn get(&self, source: SourceId) -> Option<Arc<dyn NewsProvider>> {
        self.providers.get(&source).cloned()
    }

    /// Look up an adapter by its wire name.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn NewsProvider>, UnknownSource> {
        let source: SourceId = name.parse()?;
        self.get(source)
            .ok_or_else(|| UnknownSource(name.to_string()))
    }

    /// All adapters in source order.
    pub fn providers(&self) -> impl Iterator<Item = &Arc<dyn NewsProvider>> {
        self.providers.values()
    }

    pub fn sources(&self) -> Vec<SourceId> {
        self.providers.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
