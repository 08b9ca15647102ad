//! In-memory [`ArticleStore`] implementation for tests and single-process use.
//!
//! Articles live in a `HashMap` keyed by url behind `std::sync::RwLock`.
//! Each upsert holds the write lock for its whole read-modify-write, so
//! concurrent upserts of one url are serialized.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;

use crate::models::{Article, ArticleUpsert};

use super::{listing_order, ArticleQuery, ArticleStore, Page, UpsertPolicy};

/// In-memory article store.
pub struct InMemoryArticleStore {
    by_url: RwLock<HashMap<String, Article>>,
}

impl InMemoryArticleStore {
    pub fn new() -> Self {
        Self {
            by_url: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Article>>> {
        self.by_url
            .read()
            .map_err(|_| anyhow!("article store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Article>>> {
        self.by_url
            .write()
            .map_err(|_| anyhow!("article store lock poisoned"))
    }
}

impl Default for InMemoryArticleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArticleStore for InMemoryArticleStore {
    async fn upsert_by_url(&self, upsert: &ArticleUpsert, policy: UpsertPolicy) -> Result<Article> {
        let now = Utc::now();
        let mut articles = self.write()?;
        let article = articles
            .entry(upsert.url.clone())
            .and_modify(|existing| existing.apply_upsert(upsert, policy, now))
            .or_insert_with(|| Article::from_upsert(upsert, now));
        Ok(article.clone())
    }

    async fn get(&self, id: &str) -> Result<Option<Article>> {
        Ok(self.read()?.values().find(|a| a.id == id).cloned())
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<Article>> {
        Ok(self.read()?.get(url).cloned())
    }

    async fn query(&self, query: &ArticleQuery) -> Result<Page> {
        let mut matched: Vec<Article> = self
            .read()?
            .values()
            .filter(|a| query.matches(a))
            .cloned()
            .collect();
        matched.sort_by(listing_order);

        let total = matched.len() as u64;
        let (_, per_page) = query.bounds();
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let items = matched
            .into_iter()
            .skip(offset)
            .take(per_page as usize)
            .collect();
        Ok(Page::new(items, query, total))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.read()?.len() as u64)
    }
}
