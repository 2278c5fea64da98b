//! Best-effort autocomplete. Never fails: the worst answer is an empty list.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::backend::{PrimaryBackend, SuggestRequest};
use crate::error::Result;
use crate::mapper::DocumentMapper;
use crate::rate_limiter::RateLimiter;
use crate::store::DocumentStore;
use crate::strategy::{guarded, DEFAULT_TIMEOUT};

pub const DEFAULT_SAMPLE_SIZE: usize = 200;
pub const DEFAULT_MAX_SUGGESTIONS: usize = 8;
/// Suggestion calls per window; looser than the search quota.
pub const DEFAULT_QUOTA: usize = 600;

pub struct Suggester {
    primary: Option<(Arc<dyn PrimaryBackend>, RateLimiter)>,
    store: Arc<dyn DocumentStore>,
    mapper: DocumentMapper,
    sample_size: usize,
    max_suggestions: usize,
    timeout: Duration,
}

impl Suggester {
    /// Heuristic-only suggester over `store`.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            primary: None,
            store,
            mapper: DocumentMapper::new(),
            sample_size: DEFAULT_SAMPLE_SIZE,
            max_suggestions: DEFAULT_MAX_SUGGESTIONS,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Ask `backend` first, through its own `limiter`.
    pub fn with_primary(mut self, backend: Arc<dyn PrimaryBackend>, limiter: RateLimiter) -> Self {
        self.primary = Some((backend, limiter));
        self
    }

    pub fn with_sample_size(mut self, n: usize) -> Self {
        self.sample_size = n.max(1);
        self
    }

    pub fn with_max_suggestions(mut self, n: usize) -> Self {
        self.max_suggestions = n.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn uses_primary(&self) -> bool {
        self.primary.is_some()
    }

    pub async fn suggest(
        &self,
        query: &str,
        user_pseudo_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Vec<String> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        if let Some((backend, limiter)) = &self.primary {
            match self.ask_primary(backend.as_ref(), limiter, query, user_pseudo_id, cancel).await {
                Ok(list) => return list,
                Err(e) => tracing::debug!(
                    error_code = e.code(),
                    error = %e,
                    "primary suggestions failed, using store sample"
                ),
            }
        }

        match self.sample_store(query, cancel).await {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(error_code = e.code(), error = %e, "suggestion sample failed");
                Vec::new()
            }
        }
    }

    async fn ask_primary(
        &self,
        backend: &dyn PrimaryBackend,
        limiter: &RateLimiter,
        query: &str,
        user_pseudo_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        limiter.admit()?;
        let request = SuggestRequest {
            query: query.to_string(),
            user_pseudo_id: user_pseudo_id.map(str::to_string),
            max_suggestions: self.max_suggestions,
        };
        let mut list = guarded(
            "primary suggestions",
            backend.suggest(&request),
            cancel,
            Some(self.timeout),
        )
        .await?;
        list.truncate(self.max_suggestions);
        Ok(list)
    }

    /// Distinct province/municipality values containing `query`.
    async fn sample_store(&self, query: &str, cancel: &CancellationToken) -> Result<Vec<String>> {
        let docs = guarded(
            "suggestion sample",
            self.store.fetch(self.sample_size),
            cancel,
            Some(self.timeout),
        )
        .await?;

        let needle = query.to_lowercase();
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for asset in docs.iter().map(|d| self.mapper.map_document(d)) {
            for value in [asset.province, asset.municipality].into_iter().flatten() {
                let folded = value.to_lowercase();
                if folded.contains(&needle) && seen.insert(folded) {
                    out.push(value);
                    if out.len() == self.max_suggestions {
                        return Ok(out);
                    }
                }
            }
        }
        Ok(out)
    }
}
