//! # Newswire Core
//!
//! Shared, I/O-free logic for Newswire: the canonical article model,
//! the normalization policy every provider adapter follows, the
//! ingestion observer capability, and the article store abstraction.
//!
//! This crate contains no tokio, sqlx, reqwest, or other runtime-bound
//! dependencies. Provider adapters, the SQLite backend, the orchestrator
//! and the HTTP server live in the `newswire` application crate.

pub mod models;
pub mod normalize;
pub mod observe;
pub mod store;

pub use models::{
    Article, ArticleDraft, ArticleUpsert, FetchCriteria, IngestionOutcome, RunStatus, SkipReason,
    SourceId, UnknownSource,
};
pub use observe::{IngestEvent, IngestObserver, NoopObserver, RecordingObserver, Severity};
pub use store::{ArticleQuery, ArticleStore, Page, UpsertPolicy};
