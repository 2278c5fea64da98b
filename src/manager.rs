use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::analytics::{AnalyticsSink, SearchEvent, TracingSink};
use crate::backend::{HttpPrimaryBackend, PrimaryBackend};
use crate::config::SearchConfig;
use crate::error::{ErrorDescriptor, ErrorKind, Result, SearchError};
use crate::rate_limiter::RateLimiter;
use crate::store::{DocumentStore, RestDocumentStore};
use crate::strategy::{FallbackStoreStrategy, PrimaryBackendStrategy, SearchStrategy};
use crate::suggest::Suggester;
use crate::types::{SearchQuery, SearchResult};

/// Tries the primary strategy once, then the fallback; records analytics.
///
/// Holds no lock across calls, so one manager serves concurrent searches.
/// The only shared mutable state is the primary strategy's rate limiter.
pub struct SearchManager {
    primary: Arc<dyn SearchStrategy>,
    fallback: Arc<dyn SearchStrategy>,
    suggester: Suggester,
    analytics: Arc<dyn AnalyticsSink>,
}

impl SearchManager {
    pub fn new(
        primary: Arc<dyn SearchStrategy>,
        fallback: Arc<dyn SearchStrategy>,
        suggester: Suggester,
    ) -> Self {
        Self {
            primary,
            fallback,
            suggester,
            analytics: Arc::new(TracingSink),
        }
    }

    pub fn with_analytics(mut self, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = sink;
        self
    }

    /// HTTP primary backend plus REST document store, as configured.
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        config.validate()?;
        let timeout = config.request_timeout();

        let backend: Arc<dyn PrimaryBackend> = Arc::new(HttpPrimaryBackend::new(
            config.primary.endpoint.clone(),
            config.primary.serving_config.clone(),
            config.primary.api_key.clone(),
            timeout,
        )?);
        let limiter = Arc::new(RateLimiter::new(
            config.rate_limit.quota,
            config.rate_limit.window(),
        ));
        let primary = PrimaryBackendStrategy::new(
            backend.clone(),
            limiter,
            config.primary.serving_config.clone(),
        )
        .with_backend_kind(config.primary.backend_kind)
        .with_facet_limit(config.primary.facet_limit)
        .with_timeout(timeout);

        let store_url = config
            .fallback
            .store_url
            .as_deref()
            .ok_or_else(|| SearchError::Config("fallback.store_url is required".into()))?;
        let store: Arc<dyn DocumentStore> = Arc::new(RestDocumentStore::new(
            store_url,
            config.fallback.collection.clone(),
            config.fallback.api_key.clone(),
            timeout,
        )?);
        let fallback = FallbackStoreStrategy::new(store.clone())
            .with_scan_limit(config.fallback.scan_limit)
            .with_timeout(timeout);

        let mut suggester = Suggester::new(store)
            .with_sample_size(config.suggestions.sample_size)
            .with_max_suggestions(config.suggestions.max_suggestions)
            .with_timeout(timeout);
        if config.suggestions.use_primary {
            suggester = suggester.with_primary(
                backend,
                RateLimiter::new(
                    config.suggestions.quota,
                    std::time::Duration::from_secs(config.suggestions.window_secs),
                ),
            );
        }

        tracing::info!(
            backend_kind = ?config.primary.backend_kind,
            quota = config.rate_limit.quota,
            window_secs = config.rate_limit.window_secs,
            scan_limit = config.fallback.scan_limit,
            "search manager configured"
        );
        Ok(Self::new(Arc::new(primary), Arc::new(fallback), suggester))
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResult> {
        self.search_with_cancel(query, &CancellationToken::new()).await
    }

    /// `cancel` aborts the primary attempt, which then degrades like any other
    /// `BackendUnavailable`. It never covers the store scan: the fallback
    /// runs under a fresh token, bounded only by its own timeout, so a
    /// cancelled call still answers from the store.
    pub async fn search_with_cancel(
        &self,
        query: &SearchQuery,
        cancel: &CancellationToken,
    ) -> Result<SearchResult> {
        let started = Instant::now();

        let primary_err = match self.primary.execute(query, cancel).await {
            Ok(result) => {
                tracing::info!(
                    strategy = %result.strategy,
                    total = result.total,
                    elapsed_ms = result.elapsed_ms,
                    "search answered"
                );
                self.analytics
                    .record(SearchEvent::answered(query, &result, false));
                return Ok(result);
            }
            Err(e) => e,
        };

        if primary_err.kind() == ErrorKind::RateLimitExceeded {
            tracing::warn!(
                strategy = self.primary.name(),
                error_code = primary_err.code(),
                "primary over quota, falling back"
            );
        } else {
            tracing::warn!(
                strategy = self.primary.name(),
                error_code = primary_err.code(),
                error = %primary_err,
                "primary search failed, falling back"
            );
        }

        match self.fallback.execute(query, &CancellationToken::new()).await {
            Ok(mut result) => {
                result.error = Some(ErrorDescriptor::from(&primary_err));
                result.elapsed_ms = started.elapsed().as_millis() as u64;
                tracing::info!(
                    strategy = %result.strategy,
                    total = result.total,
                    elapsed_ms = result.elapsed_ms,
                    "search answered by fallback"
                );
                self.analytics
                    .record(SearchEvent::answered(query, &result, true));
                Ok(result)
            }
            Err(fallback_err) => {
                let err = SearchError::SearchUnavailable {
                    primary: primary_err.to_string(),
                    fallback: fallback_err.to_string(),
                };
                let elapsed_ms = started.elapsed().as_millis() as u64;
                tracing::error!(
                    error_code = err.code(),
                    elapsed_ms,
                    error = %err,
                    "search unavailable"
                );
                self.analytics
                    .record(SearchEvent::failed(query, err.code(), elapsed_ms));
                Err(err)
            }
        }
    }

    /// Never fails; an empty list is a valid degraded answer.
    pub async fn get_suggestions(&self, query: &str, user_pseudo_id: Option<&str>) -> Vec<String> {
        self.suggester
            .suggest(query, user_pseudo_id, &CancellationToken::new())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::MemorySink;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use indexmap::IndexMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        name: &'static str,
        calls: AtomicUsize,
        outcome: Result<SearchResult>,
    }

    impl Scripted {
        fn ok(name: &'static str, total: u64) -> Arc<Self> {
            Arc::new(Self {
                name,
                calls: AtomicUsize::new(0),
                outcome: Ok(SearchResult {
                    total,
                    strategy: name.to_string(),
                    ..Default::default()
                }),
            })
        }

        fn err(name: &'static str, e: SearchError) -> Arc<Self> {
            Arc::new(Self {
                name,
                calls: AtomicUsize::new(0),
                outcome: Err(e),
            })
        }
    }

    #[async_trait]
    impl SearchStrategy for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn execute(&self, _q: &SearchQuery, _c: &CancellationToken) -> Result<SearchResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    fn manager(
        primary: Arc<Scripted>,
        fallback: Arc<Scripted>,
        sink: Arc<MemorySink>,
    ) -> SearchManager {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new(vec![]));
        SearchManager::new(primary, fallback, Suggester::new(store)).with_analytics(sink)
    }

    #[tokio::test]
    async fn primary_success_skips_fallback() {
        let p = Scripted::ok("primary", 3);
        let f = Scripted::ok("fallback", 1);
        let sink = Arc::new(MemorySink::default());
        let m = manager(p.clone(), f.clone(), sink.clone());

        let res = m.search(&SearchQuery::new("madrid")).await.unwrap();
        assert_eq!(res.strategy, "primary");
        assert!(res.error.is_none());
        assert_eq!(p.calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.calls.load(Ordering::SeqCst), 0);

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert!(!events[0].fallback);
        assert_eq!(events[0].result_count, 3);
    }

    #[tokio::test]
    async fn any_primary_failure_falls_back_once() {
        for e in [
            SearchError::BackendUnavailable("down".into()),
            SearchError::BackendRejected("bad".into()),
            SearchError::RateLimitExceeded {
                origin: crate::error::QuotaSource::Local,
                retry_after_ms: Some(1000),
            },
        ] {
            let kind = e.kind();
            let p = Scripted::err("primary", e);
            let f = Scripted::ok("fallback", 2);
            let sink = Arc::new(MemorySink::default());
            let m = manager(p.clone(), f.clone(), sink.clone());

            let res = m.search(&SearchQuery::new("x")).await.unwrap();
            assert_eq!(res.strategy, "fallback");
            assert_eq!(res.error.as_ref().map(|d| d.kind), Some(kind));
            assert_eq!(p.calls.load(Ordering::SeqCst), 1);
            assert_eq!(f.calls.load(Ordering::SeqCst), 1);
            assert!(sink.events()[0].fallback);
        }
    }

    #[tokio::test]
    async fn both_failing_is_search_unavailable() {
        let p = Scripted::err("primary", SearchError::BackendUnavailable("down".into()));
        let f = Scripted::err("fallback", SearchError::BackendUnavailable("store down".into()));
        let sink = Arc::new(MemorySink::default());
        let m = manager(p, f, sink.clone());

        let err = m.search(&SearchQuery::new("x")).await.unwrap_err();
        assert_eq!(err.code(), "SEARCH_UNAVAILABLE");
        match err {
            SearchError::SearchUnavailable { primary, fallback } => {
                assert!(primary.contains("down"));
                assert!(fallback.contains("store down"));
            }
            other => panic!("expected SearchUnavailable, got {other:?}"),
        }
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].error_code.as_deref(), Some("SEARCH_UNAVAILABLE"));
    }

    #[tokio::test]
    async fn fallback_result_keeps_empty_facets() {
        let p = Scripted::err("primary", SearchError::BackendUnavailable("down".into()));
        let f = Scripted::ok("fallback", 0);
        let m = manager(p, f, Arc::new(MemorySink::default()));
        let res = m.search(&SearchQuery::new("x")).await.unwrap();
        assert_eq!(res.facets, IndexMap::<String, Vec<crate::types::FacetCount>>::new());
    }

    #[tokio::test]
    async fn suggestions_never_fail() {
        let m = manager(
            Scripted::ok("primary", 0),
            Scripted::ok("fallback", 0),
            Arc::new(MemorySink::default()),
        );
        assert!(m.get_suggestions("mad", None).await.is_empty());
    }

    #[test]
    fn from_config_requires_store_url() {
        let mut config = SearchConfig::default();
        config.primary.serving_config = "servingConfigs/default".into();
        assert!(matches!(
            SearchManager::from_config(&config),
            Err(SearchError::Config(_))
        ));

        config.fallback.store_url = Some("http://127.0.0.1:1/v1".into());
        assert!(SearchManager::from_config(&config).is_ok());
    }
}
