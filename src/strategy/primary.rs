use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::{guarded, SearchStrategy, DEFAULT_TIMEOUT};
use crate::backend::{
    signals_resource_exhausted, BackendFacet, BackendRequest, BackendResponse, FacetKey,
    FacetSpec, PrimaryBackend,
};
use crate::error::{QuotaSource, Result, SearchError};
use crate::mapper::{coerce, DocumentMapper};
use crate::query::fields;
use crate::query::filter::{translator_for, BackendKind, FilterTranslator};
use crate::rate_limiter::RateLimiter;
use crate::types::{FacetCount, SearchQuery, SearchResult};

/// Values requested per facet when the caller does not say otherwise.
pub const DEFAULT_FACET_LIMIT: usize = 20;

/// Match-all query token sent when only filters are given.
const WILDCARD: &str = "*";

/// Queries the managed search engine, guarded by a local rate limiter.
pub struct PrimaryBackendStrategy {
    backend: Arc<dyn PrimaryBackend>,
    limiter: Arc<RateLimiter>,
    translator: Box<dyn FilterTranslator>,
    mapper: DocumentMapper,
    serving_config: String,
    timeout: Duration,
    facet_limit: usize,
}

impl PrimaryBackendStrategy {
    pub fn new(
        backend: Arc<dyn PrimaryBackend>,
        limiter: Arc<RateLimiter>,
        serving_config: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            limiter,
            translator: translator_for(BackendKind::Discovery),
            mapper: DocumentMapper::new(),
            serving_config: serving_config.into(),
            timeout: DEFAULT_TIMEOUT,
            facet_limit: DEFAULT_FACET_LIMIT,
        }
    }

    pub fn with_backend_kind(mut self, kind: BackendKind) -> Self {
        self.translator = translator_for(kind);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_facet_limit(mut self, limit: usize) -> Self {
        self.facet_limit = limit.max(1);
        self
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Backend request for `query`, without touching the limiter.
    pub fn build_request(&self, query: &SearchQuery) -> BackendRequest {
        let options = &query.options;
        let text = query.text.trim();
        let query_text = if text.is_empty() && !query.filters.is_empty() {
            WILDCARD
        } else {
            text
        };

        let mut req = BackendRequest::new(self.serving_config.clone(), query_text);
        req.filter = self.translator.translate(&query.filters);
        req.page_size = options.effective_page_size();
        match options.page_token.as_deref().filter(|t| !t.is_empty()) {
            Some(token) => req.page_token = Some(token.to_string()),
            None => req.offset = options.offset.filter(|o| *o > 0),
        }
        req.order_by = self.translator.order_by(options.sort);
        req.facet_specs = options
            .facets
            .iter()
            .filter_map(|key| fields::facet_backend_field(key))
            .map(|backend| FacetSpec {
                facet_key: FacetKey {
                    key: backend.to_string(),
                },
                limit: self.facet_limit,
            })
            .collect();
        req.user_pseudo_id = options.user_pseudo_id.clone();
        req
    }

    fn build_result(
        &self,
        query: &SearchQuery,
        resp: BackendResponse,
        started: Instant,
    ) -> SearchResult {
        let assets: Vec<_> = resp
            .results
            .into_iter()
            .map(|r| {
                let mut doc = r.document.unwrap_or_else(|| serde_json::json!({}));
                if let (Some(id), Some(obj)) = (r.id, doc.as_object_mut()) {
                    obj.entry("id").or_insert(serde_json::Value::String(id));
                }
                self.mapper.map_document(&doc)
            })
            .collect();

        let total = coerce::integer::<u64>(resp.total_size.as_ref())
            .unwrap_or(assets.len() as u64);

        SearchResult {
            total,
            facets: rekey_facets(&query.options.facets, resp.facets),
            next_page_token: resp.next_page_token.filter(|t| !t.is_empty()),
            corrected_query: resp.corrected_query.filter(|q| !q.is_empty()),
            elapsed_ms: started.elapsed().as_millis() as u64,
            strategy: self.name().to_string(),
            error: None,
            assets,
        }
    }
}

/// Facets keyed by public key, requested keys first and in request order.
fn rekey_facets(
    requested: &[String],
    facets: Vec<BackendFacet>,
) -> IndexMap<String, Vec<FacetCount>> {
    let mut by_key: IndexMap<String, Vec<FacetCount>> = facets
        .into_iter()
        .map(|f| {
            let key = fields::facet_public_key(&f.key)
                .map(str::to_string)
                .unwrap_or(f.key);
            let values = f
                .values
                .into_iter()
                .filter_map(|v| {
                    Some(FacetCount {
                        value: coerce::text(v.value.as_ref())?,
                        count: coerce::integer::<u64>(v.count.as_ref()).unwrap_or(0),
                    })
                })
                .collect();
            (key, values)
        })
        .collect();

    let mut out = IndexMap::with_capacity(by_key.len());
    for key in requested {
        if let Some(values) = by_key.shift_remove(key) {
            out.insert(key.clone(), values);
        }
    }
    out.extend(by_key);
    out
}

#[async_trait]
impl SearchStrategy for PrimaryBackendStrategy {
    fn name(&self) -> &'static str {
        "primary"
    }

    async fn execute(
        &self,
        query: &SearchQuery,
        cancel: &CancellationToken,
    ) -> Result<SearchResult> {
        let started = Instant::now();
        self.limiter.admit()?;

        let request = self.build_request(query);
        tracing::debug!(
            backend = self.backend.name(),
            query = %request.query,
            filter = %request.filter,
            page_size = request.page_size,
            "primary search request"
        );

        let timeout = query.options.timeout.unwrap_or(self.timeout);
        let response = guarded(
            "primary search",
            self.backend.search(&request),
            cancel,
            Some(timeout),
        )
        .await
        .map_err(|e| {
            if signals_resource_exhausted(&e) {
                SearchError::RateLimitExceeded {
                    origin: QuotaSource::Backend,
                    retry_after_ms: None,
                }
            } else {
                e
            }
        })?;

        let result = self.build_result(query, response, started);
        tracing::debug!(
            strategy = self.name(),
            total = result.total,
            returned = result.assets.len(),
            elapsed_ms = result.elapsed_ms,
            "primary search done"
        );
        Ok(result)
    }
}
