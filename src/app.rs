//! Wiring between config, storage, adapters and the command handlers.

use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::NaiveDate;

use newswire_core::{ArticleQuery, ArticleStore, IngestObserver, IngestionOutcome, RunStatus};

use crate::config::Config;
use crate::db;
use crate::ingest::Orchestrator;
use crate::migrate;
use crate::providers::ProviderRegistry;
use crate::scheduler::Scheduler;
use crate::server::{self, AppState};
use crate::sqlite_store::SqliteArticleStore;
use crate::telemetry::TracingObserver;

/// Everything a command needs, built once from the config.
pub struct App {
    pub config: Config,
    pub store: Arc<dyn ArticleStore>,
    pub registry: Arc<ProviderRegistry>,
    pub orchestrator: Arc<Orchestrator>,
}

impl App {
    /// Open the database (creating the schema if needed) and build the
    /// adapters with a `tracing`-backed observer.
    pub async fn open(config: Config) -> Result<Self> {
        let pool = db::connect(&config).await?;
        migrate::apply(&pool).await?;
        let store: Arc<dyn ArticleStore> = Arc::new(SqliteArticleStore::new(pool));
        Self::with_store(config, store, Arc::new(TracingObserver))
    }

    pub fn with_store(
        config: Config,
        store: Arc<dyn ArticleStore>,
        observer: Arc<dyn IngestObserver>,
    ) -> Result<Self> {
        let registry = Arc::new(ProviderRegistry::from_config(&config, observer.clone())?);
        let orchestrator = Arc::new(
            Orchestrator::new(registry.clone(), store.clone(), observer).configured(&config),
        );
        Ok(Self {
            config,
            store,
            registry,
            orchestrator,
        })
    }

    pub fn scheduler(&self) -> Scheduler {
        Scheduler::from_config(self.orchestrator.clone(), &self.config.scheduler)
    }

    pub fn api_state(&self) -> AppState {
        AppState::new(
            self.store.clone(),
            self.registry.clone(),
            self.config.server.page_size,
        )
    }
}

fn print_outcome(outcome: &IngestionOutcome) {
    println!(
        "fetch {:<10} {:<16} attempted={} saved={} skipped={} ({} ms)",
        outcome.source,
        outcome.status,
        outcome.attempted,
        outcome.saved,
        outcome.skipped,
        outcome.duration_ms()
    );
    if let Some(err) = &outcome.error {
        println!("  error: {}", err);
    }
}

/// `newswire fetch <source|all>`.
pub async fn run_fetch(app: &App, source: &str) -> Result<()> {
    let outcomes = if source == "all" {
        app.orchestrator.run_all().await
    } else {
        vec![app.orchestrator.run(source).await]
    };

    for outcome in &outcomes {
        print_outcome(outcome);
    }

    let failed: Vec<&str> = outcomes
        .iter()
        .filter(|o| o.status != RunStatus::Succeeded)
        .map(|o| o.source.as_str())
        .collect();
    if !failed.is_empty() {
        bail!("ingestion did not succeed for: {}", failed.join(", "));
    }
    Ok(())
}

/// Filters accepted by `newswire articles`.
#[derive(Debug, Default)]
pub struct ArticleFilters {
    pub source: Option<String>,
    pub category: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<String>,
    pub title: Option<String>,
    pub page: u32,
}

/// `newswire articles`: print one page of stored articles.
pub async fn run_articles(app: &App, filters: ArticleFilters, json: bool) -> Result<()> {
    let published_on = filters
        .published_at
        .as_deref()
        .map(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .transpose()?;
    let query = ArticleQuery {
        source: filters.source,
        category: filters.category,
        author: filters.author,
        published_on,
        title: filters.title,
        page: filters.page,
        per_page: app.config.server.page_size,
    };
    let page = app.store.query(&query).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    if page.items.is_empty() {
        println!("No articles.");
    }
    for article in &page.items {
        let published = article
            .published_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {:<16}  {:<20}  {}",
            article.id,
            published,
            article.source.as_deref().unwrap_or("-"),
            article.title
        );
    }
    println!(
        "page {}/{} ({} total)",
        page.page, page.last_page, page.total
    );
    Ok(())
}

/// `newswire schedule`: run the scheduler until Ctrl-C.
pub async fn run_schedule(app: &App) -> Result<()> {
    let scheduler = app.scheduler();
    tracing::info!(
        interval_secs = app.config.scheduler.interval_secs,
        sources = ?scheduler.sources(),
        "scheduler started"
    );
    let handle = scheduler.spawn();
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down scheduler; waiting for in-flight runs");
    handle.shutdown().await;
    Ok(())
}

/// `newswire serve [--schedule]`.
pub async fn run_serve(app: &App, with_scheduler: bool) -> Result<()> {
    let handle = with_scheduler.then(|| app.scheduler().spawn());

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    server::run_server(&app.config, app.api_state(), shutdown).await?;

    if let Some(handle) = handle {
        handle.shutdown().await;
    }
    Ok(())
}
