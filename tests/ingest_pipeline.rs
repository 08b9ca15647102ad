//! Integration tests for the ingestion orchestrator.
//!
//! Adapters are replaced by in-process fakes so every failure mode can be
//! triggered deterministically; the store is the in-memory backend.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use newswire::ingest::Orchestrator;
use newswire::providers::{NewsProvider, ProviderRegistry};
use newswire_core::store::memory::InMemoryArticleStore;
use newswire_core::{
    Article, ArticleDraft, ArticleQuery, ArticleStore, ArticleUpsert, FetchCriteria, IngestEvent,
    Page, RecordingObserver, RunStatus, SkipReason, SourceId, UpsertPolicy,
};

// ─── Fakes ──────────────────────────────────────────────────────────

enum Behaviour {
    Drafts(Vec<ArticleDraft>),
    Fail(&'static str),
    Hang,
}

struct FakeProvider {
    source: SourceId,
    behaviour: Behaviour,
}

#[async_trait]
impl NewsProvider for FakeProvider {
    fn source(&self) -> SourceId {
        self.source
    }

    fn description(&self) -> &str {
        "fake provider"
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn fetch(&self, _criteria: &FetchCriteria) -> Result<Vec<ArticleDraft>> {
        match &self.behaviour {
            Behaviour::Drafts(drafts) => Ok(drafts.clone()),
            Behaviour::Fail(msg) => bail!("{}", msg),
            Behaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(vec![])
            }
        }
    }
}

/// Store whose writes always fail after the first `ok_writes`.
struct FlakyStore {
    inner: InMemoryArticleStore,
    ok_writes: std::sync::atomic::AtomicUsize,
}

#[async_trait]
impl ArticleStore for FlakyStore {
    async fn upsert_by_url(&self, upsert: &ArticleUpsert, policy: UpsertPolicy) -> Result<Article> {
        use std::sync::atomic::Ordering;
        if self
            .ok_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_err()
        {
            bail!("disk full");
        }
        self.inner.upsert_by_url(upsert, policy).await
    }

    async fn get(&self, id: &str) -> Result<Option<Article>> {
        self.inner.get(id).await
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<Article>> {
        self.inner.find_by_url(url).await
    }

    async fn query(&self, query: &ArticleQuery) -> Result<Page> {
        self.inner.query(query).await
    }

    async fn count(&self) -> Result<u64> {
        self.inner.count().await
    }
}

fn draft(url: Option<&str>, title: Option<&str>) -> ArticleDraft {
    ArticleDraft {
        url: url.map(str::to_string),
        title: title.map(str::to_string),
        ..Default::default()
    }
}

fn setup(
    behaviour: Behaviour,
    store: Arc<dyn ArticleStore>,
) -> (Orchestrator, Arc<RecordingObserver>) {
    let observer = Arc::new(RecordingObserver::new());
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(FakeProvider {
        source: SourceId::NewsApi,
        behaviour,
    }));
    let orchestrator = Orchestrator::new(Arc::new(registry), store, observer.clone());
    (orchestrator, observer)
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn valid_drafts_are_saved_and_invalid_ones_skipped() {
    let store = Arc::new(InMemoryArticleStore::new());
    let (orchestrator, observer) = setup(
        Behaviour::Drafts(vec![
            draft(Some("http://x/a"), Some("A")),
            draft(Some("http://x/b"), Some("B")),
            draft(Some("http://x/c"), None),
        ]),
        store.clone(),
    );

    let outcome = orchestrator.run("newsapi").await;

    assert_eq!(outcome.status, RunStatus::Succeeded);
    assert_eq!(outcome.attempted, 3);
    assert_eq!(outcome.saved, 2);
    assert_eq!(outcome.skipped, 1);
    assert_eq!(store.count().await.unwrap(), 2);
    assert!(store.find_by_url("http://x/c").await.unwrap().is_none());

    let events = observer.events();
    assert!(matches!(
        events.first(),
        Some(IngestEvent::RunStarted {
            source: SourceId::NewsApi
        })
    ));
    assert!(events.iter().any(|e| matches!(
        e,
        IngestEvent::RecordSkipped {
            reason: SkipReason::MissingTitle,
            url: Some(url),
            ..
        } if url == "http://x/c"
    )));
    assert!(matches!(
        events.last(),
        Some(IngestEvent::RunFinished { .. })
    ));
}

#[tokio::test]
async fn rerun_updates_in_place() {
    let store = Arc::new(InMemoryArticleStore::new());
    let (first, _) = setup(
        Behaviour::Drafts(vec![draft(Some("http://x/a"), Some("A"))]),
        store.clone(),
    );
    first.run("newsapi").await;
    let original = store.find_by_url("http://x/a").await.unwrap().unwrap();

    let (second, _) = setup(
        Behaviour::Drafts(vec![draft(Some("http://x/a"), Some("A (updated)"))]),
        store.clone(),
    );
    let outcome = second.run("newsapi").await;

    assert_eq!(outcome.saved, 1);
    assert_eq!(store.count().await.unwrap(), 1);
    let updated = store.find_by_url("http://x/a").await.unwrap().unwrap();
    assert_eq!(updated.id, original.id);
    assert_eq!(updated.title, "A (updated)");
}

#[tokio::test]
async fn identical_rerun_changes_nothing_visible() {
    let store = Arc::new(InMemoryArticleStore::new());
    let (orchestrator, _) = setup(
        Behaviour::Drafts(vec![
            draft(Some("http://x/a"), Some("A")),
            draft(Some("http://x/b"), Some("B")),
        ]),
        store.clone(),
    );
    orchestrator.run("newsapi").await;
    let before = store.query(&ArticleQuery::default()).await.unwrap();
    orchestrator.run("newsapi").await;
    let after = store.query(&ArticleQuery::default()).await.unwrap();

    assert_eq!(before.total, after.total);
    let ids = |p: &Page| p.items.iter().map(|a| a.id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(&before), ids(&after));
}

#[tokio::test]
async fn unknown_source_does_no_work() {
    let store = Arc::new(InMemoryArticleStore::new());
    let (orchestrator, observer) = setup(Behaviour::Drafts(vec![]), store.clone());

    let outcome = orchestrator.run("reuters").await;

    assert_eq!(outcome.status, RunStatus::SourceNotFound);
    assert_eq!(outcome.attempted, 0);
    assert_eq!(store.count().await.unwrap(), 0);
    assert!(!observer
        .events()
        .iter()
        .any(|e| matches!(e, IngestEvent::RunStarted { .. })));
    let unknown = observer.count(|e| {
        matches!(e, IngestEvent::UnknownSource { source } if source == "reuters")
    });
    assert_eq!(unknown, 1);
}

#[tokio::test]
async fn known_but_unregistered_source_is_not_found() {
    let (orchestrator, _) = setup(
        Behaviour::Drafts(vec![]),
        Arc::new(InMemoryArticleStore::new()),
    );
    let outcome = orchestrator.run("opennws").await;
    assert_eq!(outcome.status, RunStatus::SourceNotFound);
}

#[tokio::test]
async fn adapter_error_fails_the_run() {
    let store = Arc::new(InMemoryArticleStore::new());
    let (orchestrator, observer) = setup(Behaviour::Fail("exploded"), store.clone());

    let outcome = orchestrator.run_source(SourceId::NewsApi).await;

    assert_eq!(outcome.status, RunStatus::Failed);
    assert_eq!(outcome.saved, 0);
    assert!(outcome.error.as_deref().unwrap().contains("exploded"));
    assert_eq!(store.count().await.unwrap(), 0);
    assert_eq!(
        observer.count(|e| matches!(e, IngestEvent::RunFailed { .. })),
        1
    );
}

#[tokio::test]
async fn slow_adapter_hits_the_fetch_deadline() {
    let (orchestrator, _) = setup(Behaviour::Hang, Arc::new(InMemoryArticleStore::new()));
    let orchestrator = orchestrator.with_fetch_timeout(Some(Duration::from_millis(50)));

    let outcome = orchestrator.run("newsapi").await;

    assert_eq!(outcome.status, RunStatus::Failed);
    assert!(outcome.error.as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
async fn store_failure_aborts_with_counts_so_far() {
    let store = Arc::new(FlakyStore {
        inner: InMemoryArticleStore::new(),
        ok_writes: std::sync::atomic::AtomicUsize::new(1),
    });
    let (orchestrator, _) = setup(
        Behaviour::Drafts(vec![
            draft(Some("http://x/a"), Some("A")),
            draft(Some("http://x/b"), Some("B")),
            draft(Some("http://x/c"), Some("C")),
        ]),
        store.clone(),
    );

    let outcome = orchestrator.run("newsapi").await;

    assert_eq!(outcome.status, RunStatus::Failed);
    assert_eq!(outcome.saved, 1);
    assert_eq!(outcome.attempted, 2);
    assert!(outcome.error.as_deref().unwrap().contains("disk full"));
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn image_url_policy_is_applied() {
    let with_image = |img: &str| ArticleDraft {
        image_url: Some(img.to_string()),
        ..draft(Some("http://x/a"), Some("A"))
    };

    let store = Arc::new(InMemoryArticleStore::new());
    let first = Behaviour::Drafts(vec![with_image("http://img/1")]);
    setup(first, store.clone()).0.run("newsapi").await;

    let second = Behaviour::Drafts(vec![with_image("http://img/2")]);
    setup(second, store.clone()).0.run("newsapi").await;
    let kept = store.find_by_url("http://x/a").await.unwrap().unwrap();
    assert_eq!(kept.image_url.as_deref(), Some("http://img/1"));

    let refresh = UpsertPolicy {
        refresh_image_url: true,
    };
    let third = Behaviour::Drafts(vec![with_image("http://img/2")]);
    let (orchestrator, _) = setup(third, store.clone());
    orchestrator.with_policy(refresh).run("newsapi").await;
    let refreshed = store.find_by_url("http://x/a").await.unwrap().unwrap();
    assert_eq!(refreshed.image_url.as_deref(), Some("http://img/2"));
}

#[tokio::test]
async fn missing_credentials_yield_successful_empty_run() {
    // Real adapter with no key: it reports the problem and returns nothing.
    let config: newswire::config::Config = toml::from_str(
        r#"
        [db]
        path = "unused.sqlite"

        [providers.opennws]
        api_key_env = "NEWSWIRE_TEST_DEFINITELY_UNSET"
        "#,
    )
    .unwrap();
    let observer = Arc::new(RecordingObserver::new());
    let registry = ProviderRegistry::from_config(&config, observer.clone()).unwrap();
    let store = Arc::new(InMemoryArticleStore::new());
    let orchestrator = Orchestrator::new(Arc::new(registry), store.clone(), observer.clone());

    let outcome = orchestrator.run("opennws").await;

    assert_eq!(outcome.status, RunStatus::Succeeded);
    assert_eq!(outcome.attempted, 0);
    assert_eq!(store.count().await.unwrap(), 0);
    assert_eq!(
        observer.count(|e| matches!(
            e,
            IngestEvent::ConfigurationError {
                source: SourceId::OpenNws,
                ..
            }
        )),
        1
    );
}
