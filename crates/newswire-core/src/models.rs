//! Core data models used throughout Newswire.
//!
//! These types describe the articles that flow from provider adapters,
//! through validation, into the article store, and the per-run outcome
//! the orchestrator reports back.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::normalize::non_empty;
use crate::store::UpsertPolicy;

/// Identifier of a supported news provider.
///
/// The set is closed: adding a provider means adding a variant here and
/// an adapter in the application crate. Parsing any other string yields
/// [`UnknownSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    NewsApi,
    OpenNws,
    NewsCred,
}

impl SourceId {
    /// Every known source, in registry order.
    pub const ALL: [SourceId; 3] = [SourceId::NewsApi, SourceId::OpenNws, SourceId::NewsCred];

    /// Wire name used on the CLI, in config files, and in outcomes.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::NewsApi => "newsapi",
            SourceId::OpenNws => "opennws",
            SourceId::NewsCred => "newscred",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Returned when a source identifier is not one of [`SourceId::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown news source: '{0}'. Available: newsapi, opennws, newscred")]
pub struct UnknownSource(pub String);

impl FromStr for SourceId {
    type Err = UnknownSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| UnknownSource(s.to_string()))
    }
}

/// Optional parameters passed to a provider adapter.
///
/// Every field is optional; each adapter fills in its own defaults and
/// maps the fields onto its provider's query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchCriteria {
    /// Free-text search query.
    pub query: Option<String>,
    /// Earliest publication date to request.
    pub date: Option<NaiveDate>,
    /// Two-letter language code.
    pub language: Option<String>,
    /// Maximum number of articles per request.
    pub page_size: Option<u32>,
}

/// A provider record mapped onto the canonical shape, before validation.
///
/// Every field is optional, `url` and `title` included: an adapter maps
/// whatever the provider sent and leaves the skip decision to the
/// orchestrator. No provider-specific field name appears here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleDraft {
    pub url: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub source: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
}

/// Why a draft could not be stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
    #[error("missing title")]
    MissingTitle,
    #[error("missing url")]
    MissingUrl,
    #[error("missing title and url")]
    MissingTitleAndUrl,
}

impl ArticleDraft {
    /// Check the required fields and produce an upsert payload.
    ///
    /// `url` and `title` must be present and non-blank after trimming.
    /// Optional fields that are blank become `None`.
    pub fn validate(&self) -> Result<ArticleUpsert, SkipReason> {
        let url = non_empty(self.url.clone());
        let title = non_empty(self.title.clone());
        match (url, title) {
            (Some(url), Some(title)) => Ok(ArticleUpsert {
                url,
                title,
                content: non_empty(self.content.clone()),
                source: non_empty(self.source.clone()),
                author: non_empty(self.author.clone()),
                category: non_empty(self.category.clone()),
                published_at: self.published_at,
                image_url: non_empty(self.image_url.clone()),
            }),
            (None, None) => Err(SkipReason::MissingTitleAndUrl),
            (None, Some(_)) => Err(SkipReason::MissingUrl),
            (Some(_), None) => Err(SkipReason::MissingTitle),
        }
    }
}

/// A validated article, ready to be upserted by `url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleUpsert {
    pub url: String,
    pub title: String,
    pub content: Option<String>,
    pub source: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
}

impl ArticleUpsert {
    /// Minimal payload with only the required fields set.
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            content: None,
            source: None,
            author: None,
            category: None,
            published_at: None,
            image_url: None,
        }
    }
}

/// A stored article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// UUID assigned on first insert; stable across updates.
    pub id: String,
    pub url: String,
    pub title: String,
    pub content: Option<String>,
    pub source: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// Build a fresh article from an upsert payload.
    pub fn from_upsert(upsert: &ArticleUpsert, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url: upsert.url.clone(),
            title: upsert.title.clone(),
            content: upsert.content.clone(),
            source: upsert.source.clone(),
            author: upsert.author.clone(),
            category: upsert.category.clone(),
            published_at: upsert.published_at,
            image_url: upsert.image_url.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a repeat ingestion of the same `url`.
    ///
    /// Overwrites title, content, source, author, category and
    /// published_at. `id`, `url` and `created_at` never change.
    /// `image_url` is only touched when the policy asks for it, and then
    /// only when the new payload carries one.
    pub fn apply_upsert(
        &mut self,
        upsert: &ArticleUpsert,
        policy: UpsertPolicy,
        now: DateTime<Utc>,
    ) {
        self.title = upsert.title.clone();
        self.content = upsert.content.clone();
        self.source = upsert.source.clone();
        self.author = upsert.author.clone();
        self.category = upsert.category.clone();
        self.published_at = upsert.published_at;
        if policy.refresh_image_url && upsert.image_url.is_some() {
            self.image_url = upsert.image_url.clone();
        }
        self.updated_at = now;
    }
}

/// Final status of one ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    Failed,
    SourceNotFound,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
            RunStatus::SourceNotFound => "source_not_found",
        };
        f.pad(s)
    }
}

/// Summary of one run: one source, one outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionOutcome {
    /// Source identifier as requested (may be unknown).
    pub source: String,
    pub status: RunStatus,
    /// Drafts returned by the adapter.
    pub attempted: usize,
    /// Drafts upserted into the store.
    pub saved: usize,
    /// Drafts rejected by validation.
    pub skipped: usize,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl IngestionOutcome {
    /// Start a run record with zero counts and `Succeeded` status.
    pub fn begin(source: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            source: source.into(),
            status: RunStatus::Succeeded,
            attempted: 0,
            saved: 0,
            skipped: 0,
            error: None,
            started_at,
            finished_at: started_at,
        }
    }

    /// Outcome for an identifier outside the registry. No work was attempted.
    pub fn not_found(source: impl Into<String>, now: DateTime<Utc>) -> Self {
        let source = source.into();
        let mut outcome = Self::begin(source.clone(), now);
        outcome.status = RunStatus::SourceNotFound;
        outcome.error = Some(UnknownSource(source).to_string());
        outcome
    }

    /// Mark the run failed, keeping the counts accumulated so far.
    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.status = RunStatus::Failed;
        self.error = Some(message.into());
        self
    }

    pub fn finish(mut self, now: DateTime<Utc>) -> Self {
        self.finished_at = now;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
