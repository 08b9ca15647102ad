//! OpenNews adapter (`GET {base}/articles`, `Authorization: Bearer` header).
//!
//! Articles arrive under a top-level `data` array; titles are called
//! `headline` and images are nested objects.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use newswire_core::normalize::{non_empty, parse_timestamp};
use newswire_core::{ArticleDraft, FetchCriteria, IngestObserver, SourceId};

use super::{
    decode_items, lenient, missing_credentials, transport_failure, HttpEndpoint, NewsProvider,
};
use crate::config::ProviderConfig;

pub const DEFAULT_BASE_URL: &str = "https://api.opennws.com/v1/";
pub const DEFAULT_KEY_ENV: &str = "OPENNWS_KEY";

const DEFAULT_QUERY: &str = "general";
const DEFAULT_LIMIT: u32 = 100;

#[derive(Deserialize)]
struct Envelope {
    data: Vec<Value>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawArticle {
    #[serde(deserialize_with = "lenient")]
    headline: Option<String>,
    #[serde(deserialize_with = "lenient")]
    summary: Option<String>,
    #[serde(deserialize_with = "lenient")]
    url: Option<String>,
    #[serde(deserialize_with = "lenient")]
    image: Option<RawImage>,
    #[serde(deserialize_with = "lenient")]
    published_date: Option<String>,
    #[serde(deserialize_with = "lenient")]
    source: Option<Named>,
    #[serde(deserialize_with = "lenient")]
    author: Option<Named>,
    #[serde(deserialize_with = "lenient")]
    category: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawImage {
    #[serde(deserialize_with = "lenient")]
    url: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Named {
    #[serde(deserialize_with = "lenient")]
    name: Option<String>,
}

fn map_article(raw: RawArticle) -> ArticleDraft {
    ArticleDraft {
        url: non_empty(raw.url),
        title: non_empty(raw.headline),
        content: non_empty(raw.summary),
        source: non_empty(raw.source.and_then(|s| s.name)),
        author: non_empty(raw.author.and_then(|a| a.name)),
        category: non_empty(raw.category),
        published_at: parse_timestamp(raw.published_date.as_deref()),
        image_url: non_empty(raw.image.and_then(|i| i.url)),
    }
}

pub struct OpenNwsProvider {
    api_key: Option<String>,
    endpoint: HttpEndpoint,
    query: String,
    limit: u32,
    observer: Arc<dyn IngestObserver>,
}

impl OpenNwsProvider {
    pub fn new(cfg: &ProviderConfig, observer: Arc<dyn IngestObserver>) -> Result<Self> {
        Ok(Self {
            api_key: cfg.resolve_api_key(DEFAULT_KEY_ENV),
            endpoint: HttpEndpoint::new(cfg, DEFAULT_BASE_URL)?,
            query: cfg.query.clone().unwrap_or_else(|| DEFAULT_QUERY.to_string()),
            limit: cfg.page_size.unwrap_or(DEFAULT_LIMIT),
            observer,
        })
    }
}

#[async_trait]
impl NewsProvider for OpenNwsProvider {
    fn source(&self) -> SourceId {
        SourceId::OpenNws
    }

    fn description(&self) -> &str {
        "OpenNews articles API"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn fetch(&self, criteria: &FetchCriteria) -> Result<Vec<ArticleDraft>> {
        let Some(token) = self.api_key.as_deref() else {
            return Ok(missing_credentials(self.observer.as_ref(), self.source()));
        };

        let params = [
            (
                "query",
                criteria.query.clone().unwrap_or_else(|| self.query.clone()),
            ),
            ("limit", criteria.page_size.unwrap_or(self.limit).to_string()),
        ];
        match self
            .endpoint
            .get_json::<Envelope>("articles", &params, Some(token))
            .await
        {
            Ok(envelope) => {
                let raw: Vec<RawArticle> = decode_items(envelope.data);
                Ok(raw.into_iter().map(map_article).collect())
            }
            Err(e) => Ok(transport_failure(self.observer.as_ref(), self.source(), e)),
        }
    }
}
