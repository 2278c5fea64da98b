//! Interchangeable ways of answering a [`SearchQuery`].

pub mod fallback;
pub mod primary;

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SearchError};
use crate::types::{SearchQuery, SearchResult};

pub use fallback::FallbackStoreStrategy;
pub use primary::PrimaryBackendStrategy;

/// Default bound on a single strategy call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait SearchStrategy: Send + Sync {
    /// Name recorded in results and analytics.
    fn name(&self) -> &'static str;

    /// Run one query. Cancellation and timeouts surface as
    /// [`SearchError::BackendUnavailable`].
    async fn execute(&self, query: &SearchQuery, cancel: &CancellationToken)
        -> Result<SearchResult>;
}

/// Race `fut` against `cancel` and an optional deadline.
pub(crate) async fn guarded<T, F>(
    what: &str,
    fut: F,
    cancel: &CancellationToken,
    timeout: Option<Duration>,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let bounded = async {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                SearchError::BackendUnavailable(format!(
                    "{what} timed out after {}ms",
                    limit.as_millis()
                ))
            })?,
            None => fut.await,
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SearchError::BackendUnavailable(format!("{what} cancelled"))),
        res = bounded => res,
    }
}
