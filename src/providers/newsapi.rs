//! NewsAPI adapter (`GET {base}/everything`).
//!
//! Authenticates with an `apiKey` query parameter. NewsAPI's `everything`
//! endpoint carries no category, so drafts from this adapter never have one.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::Value;

use newswire_core::normalize::{non_empty, parse_timestamp};
use newswire_core::{ArticleDraft, FetchCriteria, IngestObserver, SourceId};

use super::{
    decode_items, lenient, missing_credentials, transport_failure, HttpEndpoint, NewsProvider,
};
use crate::config::ProviderConfig;

pub const DEFAULT_BASE_URL: &str = "https://newsapi.org/v2/";
pub const DEFAULT_KEY_ENV: &str = "NEWSAPI_KEY";

const DEFAULT_QUERY: &str = "latest news";
const DEFAULT_LANGUAGE: &str = "en";
const DEFAULT_PAGE_SIZE: u32 = 100;
const DEFAULT_LOOKBACK_DAYS: i64 = 7;

#[derive(Deserialize)]
struct Envelope {
    articles: Vec<Value>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct RawArticle {
    #[serde(deserialize_with = "lenient")]
    title: Option<String>,
    #[serde(deserialize_with = "lenient")]
    description: Option<String>,
    #[serde(deserialize_with = "lenient")]
    url: Option<String>,
    #[serde(deserialize_with = "lenient")]
    url_to_image: Option<String>,
    #[serde(deserialize_with = "lenient")]
    published_at: Option<String>,
    #[serde(deserialize_with = "lenient")]
    source: Option<RawSource>,
    #[serde(deserialize_with = "lenient")]
    author: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawSource {
    #[serde(deserialize_with = "lenient")]
    name: Option<String>,
}

fn map_article(raw: RawArticle) -> ArticleDraft {
    ArticleDraft {
        url: non_empty(raw.url),
        title: non_empty(raw.title),
        content: non_empty(raw.description),
        source: non_empty(raw.source.and_then(|s| s.name)),
        author: non_empty(raw.author),
        category: None,
        published_at: parse_timestamp(raw.published_at.as_deref()),
        image_url: non_empty(raw.url_to_image),
    }
}

pub struct NewsApiProvider {
    api_key: Option<String>,
    endpoint: HttpEndpoint,
    query: String,
    language: String,
    page_size: u32,
    lookback_days: i64,
    observer: Arc<dyn IngestObserver>,
}

impl NewsApiProvider {
    pub fn new(cfg: &ProviderConfig, observer: Arc<dyn IngestObserver>) -> Result<Self> {
        Ok(Self {
            api_key: cfg.resolve_api_key(DEFAULT_KEY_ENV),
            endpoint: HttpEndpoint::new(cfg, DEFAULT_BASE_URL)?,
            query: cfg.query.clone().unwrap_or_else(|| DEFAULT_QUERY.to_string()),
            language: cfg
                .language
                .clone()
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            page_size: cfg.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            lookback_days: cfg.lookback_days.unwrap_or(DEFAULT_LOOKBACK_DAYS),
            observer,
        })
    }

    fn params(&self, api_key: &str, criteria: &FetchCriteria) -> Vec<(&'static str, String)> {
        let from = criteria
            .date
            .unwrap_or_else(|| (Utc::now() - Duration::days(self.lookback_days)).date_naive());
        vec![
            ("q", criteria.query.clone().unwrap_or_else(|| self.query.clone())),
            ("from", from.format("%Y-%m-%d").to_string()),
            ("sortBy", "publishedAt".to_string()),
            ("apiKey", api_key.to_string()),
            (
                "language",
                criteria
                    .language
                    .clone()
                    .unwrap_or_else(|| self.language.clone()),
            ),
            (
                "pageSize",
                criteria.page_size.unwrap_or(self.page_size).to_string(),
            ),
        ]
    }
}

#[async_trait]
impl NewsProvider for NewsApiProvider {
    fn source(&self) -> SourceId {
        SourceId::NewsApi
    }

    fn description(&self) -> &str {
        "NewsAPI.org everything endpoint"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn fetch(&self, criteria: &FetchCriteria) -> Result<Vec<ArticleDraft>> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(missing_credentials(self.observer.as_ref(), self.source()));
        };

        let params = self.params(api_key, criteria);
        match self
            .endpoint
            .get_json::<Envelope>("everything", &params, None)
            .await
        {
            Ok(envelope) => {
                let raw: Vec<RawArticle> = decode_items(envelope.articles);
                Ok(raw.into_iter().map(map_article).collect())
            }
            Err(e) => Ok(transport_failure(self.observer.as_ref(), self.source(), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use mockito::Matcher;
    use newswire_core::{IngestEvent, RecordingObserver};

    fn provider(
        base: &str,
        key: Option<&str>,
        observer: Arc<RecordingObserver>,
    ) -> NewsApiProvider {
        let cfg = ProviderConfig {
            api_key: key.map(str::to_string),
            api_key_env: Some("NEWSWIRE_TEST_NEWSAPI_UNSET".into()),
            base_url: Some(base.to_string()),
            max_retries: 0,
            ..Default::default()
        };
        NewsApiProvider::new(&cfg, observer).unwrap()
    }

    #[test]
    fn maps_wire_fields() {
        let raw: RawArticle = serde_json::from_value(serde_json::json!({
            "title": "Markets rally",
            "description": "Stocks up",
            "url": "https://example.com/a",
            "urlToImage": "https://example.com/a.jpg",
            "publishedAt": "2024-05-01T12:00:00Z",
            "source": { "id": null, "name": "Example" },
            "author": null
        }))
        .unwrap();
        let draft = map_article(raw);
        assert_eq!(draft.title.as_deref(), Some("Markets rally"));
        assert_eq!(draft.content.as_deref(), Some("Stocks up"));
        assert_eq!(
            draft.image_url.as_deref(),
            Some("https://example.com/a.jpg")
        );
        assert_eq!(draft.source.as_deref(), Some("Example"));
        assert_eq!(draft.author, None);
        assert_eq!(draft.category, None);
        assert_eq!(
            draft.published_at,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn sends_expected_query_and_maps_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/everything")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "rust".into()),
                Matcher::UrlEncoded("from".into(), "2024-05-01".into()),
                Matcher::UrlEncoded("sortBy".into(), "publishedAt".into()),
                Matcher::UrlEncoded("apiKey".into(), "k".into()),
                Matcher::UrlEncoded("language".into(), "en".into()),
                Matcher::UrlEncoded("pageSize".into(), "100".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"status":"ok","articles":[
                    {"title":"A","url":"http://x/a","source":{"name":"S"}},
                    {"title":"","url":"http://x/b"}
                ]}"#,
            )
            .create_async()
            .await;

        let observer = Arc::new(RecordingObserver::new());
        let provider = provider(&server.url(), Some("k"), observer.clone());
        let criteria = FetchCriteria {
            query: Some("rust".into()),
            date: NaiveDate::from_ymd_opt(2024, 5, 1),
            ..Default::default()
        };
        let drafts = provider.fetch(&criteria).await.unwrap();

        mock.assert_async().await;
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].source.as_deref(), Some("S"));
        assert_eq!(drafts[1].title, None);
        assert!(observer.events().is_empty());
    }

    #[tokio::test]
    async fn missing_key_makes_no_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let observer = Arc::new(RecordingObserver::new());
        let provider = provider(&server.url(), None, observer.clone());
        assert!(!provider.is_configured());
        let drafts = provider.fetch(&FetchCriteria::default()).await.unwrap();

        mock.assert_async().await;
        assert!(drafts.is_empty());
        assert!(matches!(
            observer.events().as_slice(),
            [IngestEvent::ConfigurationError {
                source: SourceId::NewsApi,
                ..
            }]
        ));
    }

    #[tokio::test]
    async fn server_error_degrades_to_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/everything")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let observer = Arc::new(RecordingObserver::new());
        let provider = provider(&server.url(), Some("k"), observer.clone());
        let drafts = provider.fetch(&FetchCriteria::default()).await.unwrap();

        assert!(drafts.is_empty());
        match observer.events().as_slice() {
            [IngestEvent::TransportError { source, message }] => {
                assert_eq!(*source, SourceId::NewsApi);
                assert!(message.contains("500"));
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_articles_array_is_a_transport_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/everything")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"status":"error"}"#)
            .create_async()
            .await;

        let observer = Arc::new(RecordingObserver::new());
        let provider = provider(&server.url(), Some("k"), observer.clone());
        assert!(provider
            .fetch(&FetchCriteria::default())
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            observer.count(|e| matches!(e, IngestEvent::TransportError { .. })),
            1
        );
    }

    #[tokio::test]
    async fn network_error_message_does_not_contain_api_key() {
        const SECRET: &str = "SUPERSECRETKEY";
        // Nothing listens on port 1, so the request fails before any response.
        let observer = Arc::new(RecordingObserver::new());
        let provider = provider("http://127.0.0.1:1/v2/", Some(SECRET), observer.clone());
        let drafts = provider.fetch(&FetchCriteria::default()).await.unwrap();

        assert!(drafts.is_empty());
        match observer.events().as_slice() {
            [IngestEvent::TransportError { message, .. }] => {
                assert!(message.contains("network error"), "{message}");
                assert!(!message.contains(SECRET), "{message}");
                assert!(!message.contains("apiKey"), "{message}");
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[tokio::test]
    async fn wrong_typed_field_does_not_drop_the_batch() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/everything")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"articles":[
                    {"title":"A","url":"http://x/a"},
                    {"title":"B","url":"http://x/b","source":"BBC","author":7},
                    "not an object"
                ]}"#,
            )
            .create_async()
            .await;

        let observer = Arc::new(RecordingObserver::new());
        let provider = provider(&server.url(), Some("k"), observer.clone());
        let drafts = provider.fetch(&FetchCriteria::default()).await.unwrap();

        assert_eq!(drafts.len(), 3);
        assert_eq!(drafts[1].url.as_deref(), Some("http://x/b"));
        assert_eq!(drafts[1].source, None);
        assert_eq!(drafts[1].author, None);
        assert_eq!(drafts[2], ArticleDraft::default());
        assert!(observer.events().is_empty());
    }
}
