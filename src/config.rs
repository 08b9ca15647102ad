use anyhow::{Context, Result};
use newswire_core::SourceId;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Articles per page on `GET /articles`.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            page_size: default_page_size(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}
fn default_page_size() -> u32 {
    15
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct IngestConfig {
    /// Replace a stored `image_url` when an article is ingested again.
    #[serde(default)]
    pub refresh_image_url: bool,
    /// Upper bound on one adapter fetch, in seconds. Unset means no bound
    /// beyond the per-request HTTP timeout.
    #[serde(default)]
    pub fetch_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_scheduled_sources")]
    pub sources: Vec<SourceId>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            sources: default_scheduled_sources(),
        }
    }
}

fn default_interval_secs() -> u64 {
    60
}
fn default_scheduled_sources() -> Vec<SourceId> {
    SourceId::ALL.to_vec()
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `tracing-subscriber` filter directive. `RUST_LOG` takes precedence.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub newsapi: ProviderConfig,
    #[serde(default)]
    pub opennws: ProviderConfig,
    #[serde(default)]
    pub newscred: ProviderConfig,
}

impl ProvidersConfig {
    pub fn get(&self, source: SourceId) -> &ProviderConfig {
        match source {
            SourceId::NewsApi => &self.newsapi,
            SourceId::OpenNws => &self.opennws,
            SourceId::NewsCred => &self.newscred,
        }
    }
}

/// Settings for one provider adapter. Every field falls back to the
/// adapter's own default when unset.
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    /// Credential given inline. Prefer `api_key_env` for real deployments.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable holding the credential.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub page_size: Option<u32>,
    /// How many days back the `from` date reaches (newsapi only).
    #[serde(default)]
    pub lookback_days: Option<i64>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: None,
            base_url: None,
            query: None,
            language: None,
            page_size: None,
            lookback_days: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}

impl ProviderConfig {
    /// Resolve the credential: inline `api_key` first, then the env var
    /// named by `api_key_env` (or `default_env`). Blank values count as
    /// missing.
    pub fn resolve_api_key(&self, default_env: &str) -> Option<String> {
        let inline = self.api_key.as_deref().map(str::trim).unwrap_or_default();
        if !inline.is_empty() {
            return Some(inline.to_string());
        }
        let var = self.api_key_env.as_deref().unwrap_or(default_env);
        std::env::var(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.server.page_size == 0 {
        anyhow::bail!("server.page_size must be > 0");
    }

    if config.scheduler.interval_secs == 0 {
        anyhow::bail!("scheduler.interval_secs must be > 0");
    }

    if config.ingest.fetch_timeout_secs == Some(0) {
        anyhow::bail!("ingest.fetch_timeout_secs must be > 0 when set");
    }

    for source in SourceId::ALL {
        let provider = config.providers.get(source);
        if let Some(base) = &provider.base_url {
            reqwest::Url::parse(base)
                .with_context(|| format!("providers.{}.base_url is not a valid URL", source))?;
        }
        if provider.page_size == Some(0) {
            anyhow::bail!("providers.{}.page_size must be > 0", source);
        }
        if provider.timeout_secs == 0 {
            anyhow::bail!("providers.{}.timeout_secs must be > 0", source);
        }
        if matches!(provider.lookback_days, Some(d) if d < 0) {
            anyhow::bail!("providers.{}.lookback_days must be >= 0", source);
        }
    }

    Ok(())
}
