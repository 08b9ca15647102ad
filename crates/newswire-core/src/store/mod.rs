//! Storage abstraction for Newswire articles.
//!
//! The [`ArticleStore`] trait defines every operation the ingestion
//! pipeline and the read API need: idempotent upsert keyed by `url`,
//! lookup, and filtered pagination. Backends: SQLite (application crate)
//! and [`memory::InMemoryArticleStore`].
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::cmp::Ordering;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{Article, ArticleUpsert};

/// How a repeat upsert treats fields that are not simply overwritten.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertPolicy {
    /// When true, a re-ingested article's `image_url` replaces the stored
    /// one (if the new payload has one). When false, the first stored
    /// `image_url` is kept forever.
    pub refresh_image_url: bool,
}

/// Filters and pagination for [`ArticleStore::query`].
///
/// All filters are optional and combine with AND. `source`, `category`
/// and `author` match exactly; `title` is a substring match that ignores
/// ASCII case only (non-ASCII letters must match exactly, as with SQLite's
/// `LOWER`); `published_on` matches the UTC calendar day of `published_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleQuery {
    pub source: Option<String>,
    pub category: Option<String>,
    pub author: Option<String>,
    pub published_on: Option<NaiveDate>,
    pub title: Option<String>,
    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
}

impl Default for ArticleQuery {
    fn default() -> Self {
        Self {
            source: None,
            category: None,
            author: None,
            published_on: None,
            title: None,
            page: 1,
            per_page: 15,
        }
    }
}

impl ArticleQuery {
    /// `page` and `per_page` clamped to at least 1.
    pub fn bounds(&self) -> (u32, u32) {
        (self.page.max(1), self.per_page.max(1))
    }

    /// Row offset of the first item on the requested page.
    pub fn offset(&self) -> u64 {
        let (page, per_page) = self.bounds();
        u64::from(page - 1) * u64::from(per_page)
    }

    /// Whether `article` passes every filter in this query.
    pub fn matches(&self, article: &Article) -> bool {
        fn eq(filter: &Option<String>, value: &Option<String>) -> bool {
            match filter {
                Some(f) => value.as_deref() == Some(f.as_str()),
                None => true,
            }
        }

        if !eq(&self.source, &article.source)
            || !eq(&self.category, &article.category)
            || !eq(&self.author, &article.author)
        {
            return false;
        }
        if let Some(day) = self.published_on {
            match article.published_at {
                Some(ts) if ts.date_naive() == day => {}
                _ => return false,
            }
        }
        if let Some(needle) = &self.title {
            if !article
                .title
                .to_ascii_lowercase()
                .contains(&needle.to_ascii_lowercase())
            {
                return false;
            }
        }
        true
    }
}

/// Listing order: newest `published_at` first, undated articles last,
/// ties broken by `url` ascending.
pub fn listing_order(a: &Article, b: &Article) -> Ordering {
    match (a.published_at, b.published_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.url.cmp(&b.url))
}

/// One page of query results plus pagination metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub items: Vec<Article>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub last_page: u32,
}

impl Page {
    pub fn new(items: Vec<Article>, query: &ArticleQuery, total: u64) -> Self {
        let (page, per_page) = query.bounds();
        let last_page = total.div_ceil(u64::from(per_page)).max(1);
        Self {
            items,
            page,
            per_page,
            total,
            last_page: u32::try_from(last_page).unwrap_or(u32::MAX),
        }
    }
}

/// Abstract storage backend for articles.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert_by_url`](ArticleStore::upsert_by_url) | Insert or update the article identified by `url` |
/// | [`get`](ArticleStore::get) | Fetch one article by id |
/// | [`find_by_url`](ArticleStore::find_by_url) | Fetch one article by url |
/// | [`query`](ArticleStore::query) | Filtered, ordered, paginated listing |
/// | [`count`](ArticleStore::count) | Total stored articles |
///
/// `upsert_by_url` must be atomic per `url`: concurrent upserts of the
/// same url leave exactly one record.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Insert or update the article keyed by `upsert.url`.
    ///
    /// A new url creates a record with a fresh id. An existing url keeps
    /// its id and `created_at`; other fields follow [`UpsertPolicy`].
    async fn upsert_by_url(&self, upsert: &ArticleUpsert, policy: UpsertPolicy) -> Result<Article>;

    async fn get(&self, id: &str) -> Result<Option<Article>>;

    async fn find_by_url(&self, url: &str) -> Result<Option<Article>>;

    async fn query(&self, query: &ArticleQuery) -> Result<Page>;

    async fn count(&self) -> Result<u64>;
}
