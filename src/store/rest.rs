use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::DocumentStore;
use crate::backend::classify_http_failure;
use crate::error::{Result, SearchError};

/// Largest page the store's list endpoint hands out in one response.
const MAX_PAGE: usize = 300;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<serde_json::Value>,
    next_page_token: Option<String>,
}

/// Document-store collection read over REST
/// (`GET {base_url}/{collection}?pageSize=N&pageToken=...`).
///
/// Documents come back with typed `fields`, which the mapper unwraps.
#[derive(Debug)]
pub struct RestDocumentStore {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    api_key: Option<String>,
}

impl RestDocumentStore {
    pub fn new(
        base_url: impl Into<String>,
        collection: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            api_key,
        })
    }

    async fn fetch_page(
        &self,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<ListDocumentsResponse> {
        let url = format!("{}/{}", self.base_url, self.collection);
        let mut req = self
            .client
            .get(&url)
            .query(&[("pageSize", page_size.to_string())]);
        if let Some(token) = page_token {
            req = req.query(&[("pageToken", token)]);
        }
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "failed to read response body".into());
            return Err(classify_http_failure(status, &body));
        }
        Ok(resp.json::<ListDocumentsResponse>().await?)
    }
}

#[async_trait]
impl DocumentStore for RestDocumentStore {
    async fn fetch(&self, limit: usize) -> Result<Vec<serde_json::Value>> {
        let mut docs = Vec::with_capacity(limit.min(MAX_PAGE));
        let mut token: Option<String> = None;

        while docs.len() < limit {
            let want = (limit - docs.len()).min(MAX_PAGE);
            let page = self.fetch_page(want, token.as_deref()).await?;
            let got = page.documents.len();
            docs.extend(page.documents.into_iter().take(want));
            match page.next_page_token {
                Some(next) if got > 0 && !next.is_empty() => token = Some(next),
                _ => break,
            }
        }

        tracing::debug!(
            collection = %self.collection,
            fetched = docs.len(),
            limit,
            "document store read"
        );
        Ok(docs)
    }

    fn name(&self) -> &'static str {
        "rest"
    }
}
