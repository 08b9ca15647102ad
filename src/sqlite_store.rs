//! SQLite-backed [`ArticleStore`] implementation.
//!
//! Upserts are a single `INSERT … ON CONFLICT(url) DO UPDATE … RETURNING`
//! statement, so each one is atomic per url and concurrent writers of the
//! same url end with exactly one row.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use newswire_core::models::{Article, ArticleUpsert};
use newswire_core::store::{ArticleQuery, ArticleStore, Page, UpsertPolicy};

const COLUMNS: &str = "id, url, title, content, source, author, category, published_at, \
                       image_url, created_at, updated_at";

const UPSERT_KEEP_IMAGE: &str = r#"
    INSERT INTO articles (id, url, title, content, source, author, category,
                          published_at, image_url, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(url) DO UPDATE SET
        title = excluded.title,
        content = excluded.content,
        source = excluded.source,
        author = excluded.author,
        category = excluded.category,
        published_at = excluded.published_at,
        updated_at = excluded.updated_at
    RETURNING id, url, title, content, source, author, category, published_at,
              image_url, created_at, updated_at
"#;

const UPSERT_REFRESH_IMAGE: &str = r#"
    INSERT INTO articles (id, url, title, content, source, author, category,
                          published_at, image_url, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(url) DO UPDATE SET
        title = excluded.title,
        content = excluded.content,
        source = excluded.source,
        author = excluded.author,
        category = excluded.category,
        published_at = excluded.published_at,
        image_url = COALESCE(excluded.image_url, articles.image_url),
        updated_at = excluded.updated_at
    RETURNING id, url, title, content, source, author, category, published_at,
              image_url, created_at, updated_at
"#;

// Shared by the listing and count queries. A NULL parameter disables
// its filter. `LOWER` folds ASCII letters only, so the title match is
// ASCII case-insensitive, the same as `ArticleQuery::matches`.
const FILTER: &str = r#"
    WHERE (?1 IS NULL OR source = ?1)
      AND (?2 IS NULL OR category = ?2)
      AND (?3 IS NULL OR author = ?3)
      AND (?4 IS NULL OR (published_at >= ?4 AND published_at < ?5))
      AND (?6 IS NULL OR LOWER(title) LIKE '%' || LOWER(?6) || '%' ESCAPE '\')
"#;

/// SQLite implementation of [`ArticleStore`].
pub struct SqliteArticleStore {
    pool: SqlitePool,
}

impl SqliteArticleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn from_ts(ts: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0).with_context(|| format!("timestamp out of range: {ts}"))
}

fn row_to_article(row: &SqliteRow) -> Result<Article> {
    let published_at: Option<i64> = row.get("published_at");
    Ok(Article {
        id: row.get("id"),
        url: row.get("url"),
        title: row.get("title"),
        content: row.get("content"),
        source: row.get("source"),
        author: row.get("author"),
        category: row.get("category"),
        published_at: published_at.map(from_ts).transpose()?,
        image_url: row.get("image_url"),
        created_at: from_ts(row.get("created_at"))?,
        updated_at: from_ts(row.get("updated_at"))?,
    })
}

/// Escape LIKE wildcards so user input matches literally.
fn like_literal(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

struct FilterBinds {
    source: Option<String>,
    category: Option<String>,
    author: Option<String>,
    day_start: Option<i64>,
    day_end: Option<i64>,
    title: Option<String>,
}

impl FilterBinds {
    fn from_query(query: &ArticleQuery) -> Self {
        let day = query
            .published_on
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|start| start.and_utc().timestamp());
        Self {
            source: query.source.clone(),
            category: query.category.clone(),
            author: query.author.clone(),
            day_start: day,
            day_end: day.map(|s| s + 86_400),
            title: query.title.as_deref().map(like_literal),
        }
    }
}

#[async_trait]
impl ArticleStore for SqliteArticleStore {
    async fn upsert_by_url(&self, upsert: &ArticleUpsert, policy: UpsertPolicy) -> Result<Article> {
        let sql = if policy.refresh_image_url {
            UPSERT_REFRESH_IMAGE
        } else {
            UPSERT_KEEP_IMAGE
        };
        let now = Utc::now().timestamp();

        let row = sqlx::query(sql)
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(&upsert.url)
            .bind(&upsert.title)
            .bind(&upsert.content)
            .bind(&upsert.source)
            .bind(&upsert.author)
            .bind(&upsert.category)
            .bind(upsert.published_at.map(|t| t.timestamp()))
            .bind(&upsert.image_url)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to upsert article {}", upsert.url))?;

        row_to_article(&row)
    }

    async fn get(&self, id: &str) -> Result<Option<Article>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM articles WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_article).transpose()
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<Article>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM articles WHERE url = ?"))
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_article).transpose()
    }

    async fn query(&self, query: &ArticleQuery) -> Result<Page> {
        let binds = FilterBinds::from_query(query);
        let (_, per_page) = query.bounds();

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM articles {FILTER}"))
            .bind(&binds.source)
            .bind(&binds.category)
            .bind(&binds.author)
            .bind(binds.day_start)
            .bind(binds.day_end)
            .bind(&binds.title)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM articles {FILTER} \
             ORDER BY published_at IS NULL, published_at DESC, url ASC \
             LIMIT ?7 OFFSET ?8"
        ))
        .bind(&binds.source)
        .bind(&binds.category)
        .bind(&binds.author)
        .bind(binds.day_start)
        .bind(binds.day_end)
        .bind(&binds.title)
        .bind(i64::from(per_page))
        .bind(i64::try_from(query.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let items = rows.iter().map(row_to_article).collect::<Result<Vec<_>>>()?;
        Ok(Page::new(items, query, total.max(0) as u64))
    }

    async fn count(&self) -> Result<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await?;
        Ok(n.max(0) as u64)
    }
}
