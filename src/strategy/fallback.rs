use async_trait::async_trait;
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::{guarded, SearchStrategy, DEFAULT_TIMEOUT};
use crate::asset::Asset;
use crate::error::Result;
use crate::mapper::DocumentMapper;
use crate::store::DocumentStore;
use crate::types::{SearchQuery, SearchResult, SortOrder};

/// Records read from the store per query.
pub const DEFAULT_SCAN_LIMIT: usize = 500;

/// Linear scan over the document store. No text index, no facets.
pub struct FallbackStoreStrategy {
    store: Arc<dyn DocumentStore>,
    mapper: DocumentMapper,
    scan_limit: usize,
    timeout: Duration,
}

impl FallbackStoreStrategy {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            mapper: DocumentMapper::new(),
            scan_limit: DEFAULT_SCAN_LIMIT,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_scan_limit(mut self, limit: usize) -> Self {
        self.scan_limit = limit.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }
}

fn nulls_last<T: PartialOrd>(a: Option<T>, b: Option<T>, descending: bool) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => {
            let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        }
    }
}

/// Stable in-process sort; `Relevance` keeps store order.
fn sort_assets(assets: &mut [Asset], sort: SortOrder) {
    match sort {
        SortOrder::Relevance => {}
        SortOrder::PriceAsc => {
            assets.sort_by(|a, b| nulls_last(a.price_approx, b.price_approx, false))
        }
        SortOrder::PriceDesc => {
            assets.sort_by(|a, b| nulls_last(a.price_approx, b.price_approx, true))
        }
        SortOrder::SurfaceAsc => assets.sort_by(|a, b| nulls_last(a.sqm, b.sqm, false)),
        SortOrder::SurfaceDesc => assets.sort_by(|a, b| nulls_last(a.sqm, b.sqm, true)),
        SortOrder::AuctionDateAsc => {
            assets.sort_by(|a, b| nulls_last(a.auction_date, b.auction_date, false))
        }
        SortOrder::Newest => {
            assets.sort_by(|a, b| nulls_last(a.publication_date, b.publication_date, true))
        }
    }
}

#[async_trait]
impl SearchStrategy for FallbackStoreStrategy {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn execute(
        &self,
        query: &SearchQuery,
        cancel: &CancellationToken,
    ) -> Result<SearchResult> {
        let started = Instant::now();
        let timeout = query.options.timeout.unwrap_or(self.timeout);
        let docs = guarded(
            "fallback store read",
            self.store.fetch(self.scan_limit),
            cancel,
            Some(timeout),
        )
        .await?;
        let scanned = docs.len();

        let needle = query.text.trim().to_lowercase();
        let mut matched: Vec<Asset> = docs
            .iter()
            .map(|d| self.mapper.map_document(d))
            .filter(|a| needle.is_empty() || a.searchable_text().contains(&needle))
            .filter(|a| query.filters.matches(a))
            .collect();
        sort_assets(&mut matched, query.options.sort);

        let total = matched.len() as u64;
        let assets: Vec<Asset> = matched
            .into_iter()
            .skip(query.options.offset.unwrap_or(0))
            .take(query.options.effective_page_size())
            .collect();

        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::debug!(
            store = self.store.name(),
            scanned,
            total,
            returned = assets.len(),
            elapsed_ms,
            "fallback scan done"
        );

        Ok(SearchResult {
            assets,
            total,
            facets: IndexMap::new(),
            next_page_token: None,
            corrected_query: None,
            elapsed_ms,
            strategy: self.name().to_string(),
            error: None,
        })
    }
}
