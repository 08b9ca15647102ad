//! NewsCred adapter (`GET {base}/articles`, bearer token).

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

pub const DEFAULT_BASE_URL: &str = "https://api.newscred.com/v2/";
pub const DEFAULT_KEY_ENV: &str = "NEWSCRED_KEY";

const DEFAULT_QUERY: &str = "trending";
const DEFAULT_LIMIT: u32 = 100;

#[derive(Deserialize)]
struct Envelope {
    articles: Vec<Value>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawArticle {
    #[serde(deserialize_with = "lenient")]
    title: Option<String>,
    #[serde(deserialize_with = "lenient")]
    body: Option<String>,
    #[serde(deserialize_with = "lenient")]
    link: Option<String>,
    #[serde(deserialize_with = "lenient")]
    image_url: Option<String>,
    #[serde(deserialize_with = "lenient")]
    published_date: Option<String>,
    #[serde(deserialize_with = "lenient")]
    source: Option<Named>,
    #[serde(deserialize_with = "lenient")]
    author: Option<RawAuthor>,
    #[serde(deserialize_with = "lenient")]
    topics: Option<Vec<Named>>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Named {
    #[serde(deserialize_with = "lenient")]
    name: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawAuthor {
    #[serde(deserialize_with = "lenient")]
    display_name: Option<String>,
}

fn map_article(raw: RawArticle) -> ArticleDraft {
    // First topic doubles as the category.
    let category = raw
        .topics
        .and_then(|topics| topics.into_iter().next())
        .and_then(|t| t.name);
    ArticleDraft {
        url: non_empty(raw.link),
        title: non_empty(raw.title),
        content: non_empty(raw.body),
        source: non_empty(raw.source.and_then(|s| s.name)),
        author: non_empty(raw.author.and_then(|a| a.display_name)),
        category: non_empty(category),
        published_at: parse_timestamp(raw.published_date.as_deref()),
        image_url: non_empty(raw.image_url),
    }
}

pub struct NewsCredProvider {
    api_key: Option<String>,
    endpoint: HttpEndpoint,
    query: String,
    limit: u32,
    observer: Arc<dyn IngestObserver>,
}

impl NewsCredProvider {
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
impl NewsProvider for NewsCredProvider {
    fn source(&self) -> SourceId {
        SourceId::NewsCred
    }

    fn description(&self) -> &str {
        "NewsCred articles API"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn fetch(&self, criteria: &FetchCriteria) -> Result<Vec<ArticleDraft>> {
        let Some(token) = self.api_key.as_deref() else {
            return Ok(missing_credentials(self.observer.as_ref(), self.source()));
        };

        let params = [
            ("q", criteria.query.clone().unwrap_or_else(|| self.query.clone())),
            ("limit", criteria.page_size.unwrap_or(self.limit).to_string()),
        ];
        match self
            .endpoint
            .get_json::<Envelope>("articles", &params, Some(token))
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
