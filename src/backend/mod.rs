//! Wire contract of the primary search backend.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{QuotaSource, Result, SearchError};

pub use self::http::HttpPrimaryBackend;

/// Marker the backend puts in quota errors.
pub const RESOURCE_EXHAUSTED: &str = "RESOURCE_EXHAUSTED";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetKey {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetSpec {
    pub facet_key: FacetKey,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpansionSpec {
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpellCorrectionSpec {
    pub mode: String,
}

/// Body of a backend search call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendRequest {
    pub serving_config: String,
    pub query: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub filter: String,
    pub page_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub facet_specs: Vec<FacetSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_pseudo_id: Option<String>,
    pub query_expansion_spec: ExpansionSpec,
    pub spell_correction_spec: SpellCorrectionSpec,
}

impl BackendRequest {
    pub fn new(serving_config: impl Into<String>, query: impl Into<String>) -> Self {
        BackendRequest {
            serving_config: serving_config.into(),
            query: query.into(),
            filter: String::new(),
            page_size: crate::types::DEFAULT_PAGE_SIZE,
            page_token: None,
            offset: None,
            order_by: None,
            facet_specs: Vec::new(),
            user_pseudo_id: None,
            query_expansion_spec: ExpansionSpec {
                condition: "AUTO".to_string(),
            },
            spell_correction_spec: SpellCorrectionSpec {
                mode: "AUTO".to_string(),
            },
        }
    }
}

/// One hit. `document` is handed to the mapper untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BackendResult {
    pub id: Option<String>,
    pub document: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BackendFacetValue {
    pub value: Option<serde_json::Value>,
    /// int64 counts may arrive as strings.
    pub count: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BackendFacet {
    pub key: String,
    pub values: Vec<BackendFacetValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackendResponse {
    pub results: Vec<BackendResult>,
    pub total_size: Option<serde_json::Value>,
    pub facets: Vec<BackendFacet>,
    pub next_page_token: Option<String>,
    pub corrected_query: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_pseudo_id: Option<String>,
    pub max_suggestions: usize,
}

#[async_trait]
pub trait PrimaryBackend: Send + Sync {
    async fn search(&self, request: &BackendRequest) -> Result<BackendResponse>;

    async fn suggest(&self, request: &SuggestRequest) -> Result<Vec<String>>;

    fn name(&self) -> &'static str;
}

/// Map a non-success HTTP answer to an error kind.
///
/// Quota exhaustion wins regardless of status. Remaining 4xx (except 408)
/// are rejections; everything else is treated as unavailability.
pub fn classify_http_failure(status: reqwest::StatusCode, body: &str) -> SearchError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || body.contains(RESOURCE_EXHAUSTED) {
        return SearchError::RateLimitExceeded {
            origin: QuotaSource::Backend,
            retry_after_ms: None,
        };
    }
    let detail = format!("backend returned {status}: {}", truncate(body, 512));
    if status.is_client_error() && status != reqwest::StatusCode::REQUEST_TIMEOUT {
        SearchError::BackendRejected(detail)
    } else {
        SearchError::BackendUnavailable(detail)
    }
}

/// True when an error, whatever its kind, carries the quota marker.
pub fn signals_resource_exhausted(err: &SearchError) -> bool {
    match err {
        SearchError::RateLimitExceeded {
            origin: QuotaSource::Backend,
            ..
        } => true,
        SearchError::BackendUnavailable(msg) | SearchError::BackendRejected(msg) => {
            msg.contains(RESOURCE_EXHAUSTED)
        }
        _ => false,
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
