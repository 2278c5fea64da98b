use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;
use std::time::Duration;

use super::{classify_http_failure, BackendRequest, BackendResponse, PrimaryBackend, SuggestRequest};
use crate::error::{Result, SearchError};

/// Managed search engine reached over its JSON REST surface.
///
/// `{endpoint}/{serving_config}:search` answers queries and
/// `{endpoint}/{serving_config}:completeQuery` answers autocomplete.
#[derive(Debug)]
pub struct HttpPrimaryBackend {
    client: reqwest::Client,
    endpoint: String,
    serving_config: String,
    api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CompleteQueryResponse {
    query_suggestions: Vec<QuerySuggestion>,
    suggestions: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QuerySuggestion {
    suggestion: String,
}

impl HttpPrimaryBackend {
    pub fn new(
        endpoint: impl Into<String>,
        serving_config: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let mut header_map = reqwest::header::HeaderMap::new();
        header_map.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let client = reqwest::Client::builder()
            .default_headers(header_map)
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            serving_config: serving_config.into().trim_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    pub fn serving_config(&self) -> &str {
        &self.serving_config
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}:{}", self.endpoint, self.serving_config, method)
    }

    async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<R> {
        let mut req = self.client.post(self.url(method)).json(body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body_text = resp
                .text()
                .await
                .unwrap_or_else(|_| "failed to read response body".into());
            return Err(classify_http_failure(status, &body_text));
        }

        Ok(resp.json::<R>().await?)
    }
}

#[async_trait]
impl PrimaryBackend for HttpPrimaryBackend {
    async fn search(&self, request: &BackendRequest) -> Result<BackendResponse> {
        self.post("search", request).await
    }

    async fn suggest(&self, request: &SuggestRequest) -> Result<Vec<String>> {
        let resp: CompleteQueryResponse = self.post("completeQuery", request).await?;
        let mut out: Vec<String> = resp
            .query_suggestions
            .into_iter()
            .map(|s| s.suggestion)
            .chain(resp.suggestions)
            .filter(|s| !s.trim().is_empty())
            .collect();
        out.truncate(request.max_suggestions);
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
