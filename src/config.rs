use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, SearchError};
use crate::query::filter::BackendKind;

const ENV_PREFIX: &str = "ASSET_SEARCH_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimaryConfig {
    pub endpoint: String,
    /// Resource path of the serving config, e.g.
    /// `projects/p/locations/global/collections/default_collection/engines/e/servingConfigs/default_search`.
    pub serving_config: String,
    pub api_key: Option<String>,
    pub backend_kind: BackendKind,
    pub facet_limit: usize,
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        PrimaryConfig {
            endpoint: "https://discoveryengine.googleapis.com/v1".to_string(),
            serving_config: String::new(),
            api_key: None,
            backend_kind: BackendKind::Discovery,
            facet_limit: crate::strategy::primary::DEFAULT_FACET_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub quota: usize,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            quota: crate::rate_limiter::DEFAULT_QUOTA,
            window_secs: crate::rate_limiter::DEFAULT_WINDOW.as_secs(),
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Base URL of the document store's REST surface.
    pub store_url: Option<String>,
    pub collection: String,
    pub api_key: Option<String>,
    pub scan_limit: usize,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        FallbackConfig {
            store_url: None,
            collection: "assets".to_string(),
            api_key: None,
            scan_limit: crate::strategy::fallback::DEFAULT_SCAN_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionConfig {
    pub use_primary: bool,
    pub sample_size: usize,
    pub max_suggestions: usize,
    pub quota: usize,
    pub window_secs: u64,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        SuggestionConfig {
            use_primary: true,
            sample_size: crate::suggest::DEFAULT_SAMPLE_SIZE,
            max_suggestions: crate::suggest::DEFAULT_MAX_SUGGESTIONS,
            quota: crate::suggest::DEFAULT_QUOTA,
            window_secs: 60,
        }
    }
}

/// Everything needed to build a [`crate::SearchManager`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub primary: PrimaryConfig,
    pub rate_limit: RateLimitConfig,
    pub fallback: FallbackConfig,
    pub suggestions: SuggestionConfig,
    pub request_timeout_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            primary: PrimaryConfig::default(),
            rate_limit: RateLimitConfig::default(),
            fallback: FallbackConfig::default(),
            suggestions: SuggestionConfig::default(),
            request_timeout_ms: crate::strategy::DEFAULT_TIMEOUT.as_millis() as u64,
        }
    }
}

impl SearchConfig {
    /// Load from a JSON file, or from `ASSET_SEARCH_*` environment variables
    /// when the file is missing or unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match serde_json::from_str::<SearchConfig>(&content) {
                    Ok(config) => {
                        tracing::info!(
                            "Loaded search config from {}: serving_config={}, quota={}/{}s",
                            path.display(),
                            config.primary.serving_config,
                            config.rate_limit.quota,
                            config.rate_limit.window_secs
                        );
                        return config;
                    }
                    Err(e) => {
                        tracing::error!(
                            "Failed to parse {}: {}, using environment",
                            path.display(),
                            e
                        );
                    }
                },
                Err(e) => {
                    tracing::error!("Failed to read {}: {}, using environment", path.display(), e);
                }
            }
        }

        Self::from_env()
    }

    /// Defaults overridden by whichever `ASSET_SEARCH_*` variables are set.
    pub fn from_env() -> Self {
        let mut config = SearchConfig::default();

        if let Some(v) = env_string("ENDPOINT") {
            config.primary.endpoint = v;
        }
        if let Some(v) = env_string("SERVING_CONFIG") {
            config.primary.serving_config = v;
        }
        config.primary.api_key = env_string("API_KEY");
        if let Some(v) = env_string("BACKEND") {
            match v.to_ascii_lowercase().as_str() {
                "discovery" => config.primary.backend_kind = BackendKind::Discovery,
                "lucene" => config.primary.backend_kind = BackendKind::Lucene,
                other => tracing::warn!("Ignoring unknown {}BACKEND={}", ENV_PREFIX, other),
            }
        }
        if let Some(v) = env_parse("RATE_LIMIT_QUOTA") {
            config.rate_limit.quota = v;
        }
        if let Some(v) = env_parse("RATE_LIMIT_WINDOW_SECS") {
            config.rate_limit.window_secs = v;
        }
        config.fallback.store_url = env_string("STORE_URL");
        if let Some(v) = env_string("STORE_COLLECTION") {
            config.fallback.collection = v;
        }
        config.fallback.api_key = env_string("STORE_API_KEY");
        if let Some(v) = env_parse("FALLBACK_SCAN_LIMIT") {
            config.fallback.scan_limit = v;
        }
        if let Some(v) = env_parse("SUGGESTIONS_USE_PRIMARY") {
            config.suggestions.use_primary = v;
        }
        if let Some(v) = env_parse("REQUEST_TIMEOUT_MS") {
            config.request_timeout_ms = v;
        }

        config
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.quota == 0 {
            return Err(SearchError::Config("rate_limit.quota must be > 0".into()));
        }
        if self.rate_limit.window_secs == 0 {
            return Err(SearchError::Config("rate_limit.window_secs must be > 0".into()));
        }
        if self.fallback.scan_limit == 0 {
            return Err(SearchError::Config("fallback.scan_limit must be > 0".into()));
        }
        if self.suggestions.quota == 0 || self.suggestions.window_secs == 0 {
            return Err(SearchError::Config(
                "suggestions.quota and suggestions.window_secs must be > 0".into(),
            ));
        }
        if self.primary.serving_config.trim().is_empty() {
            return Err(SearchError::Config("primary.serving_config is required".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(SearchError::Config("request_timeout_ms must be > 0".into()));
        }
        Ok(())
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{key}"))
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env_string(key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring unparseable {}{}={}", ENV_PREFIX, key, raw);
            None
        }
    }
}
