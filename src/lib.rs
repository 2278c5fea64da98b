//! Resilient property search.
//!
//! A [`SearchManager`] answers a free-text plus structured-filter query from
//! a managed search backend and, when that fails for any reason, from a
//! linear scan of the document store. Every backend document shape is mapped
//! onto the one canonical [`Asset`] record.

pub mod analytics;
pub mod asset;
pub mod backend;
pub mod config;
pub mod error;
pub mod manager;
pub mod mapper;
pub mod query;
pub mod rate_limiter;
pub mod store;
pub mod strategy;
pub mod suggest;
pub mod types;

pub use analytics::{AnalyticsSink, ChannelSink, MemorySink, SearchEvent, TracingSink};
pub use asset::Asset;
pub use backend::{HttpPrimaryBackend, PrimaryBackend};
pub use config::SearchConfig;
pub use error::{ErrorDescriptor, ErrorKind, QuotaSource, Result, SearchError};
pub use manager::SearchManager;
pub use mapper::DocumentMapper;
pub use query::{translator_for, BackendKind, FilterTranslator};
pub use rate_limiter::{Clock, ManualClock, RateLimiter, SystemClock};
pub use store::{DocumentStore, MemoryStore, RestDocumentStore};
pub use strategy::{FallbackStoreStrategy, PrimaryBackendStrategy, SearchStrategy};
pub use suggest::Suggester;
pub use types::{
    Categorical, FacetCount, SearchFilters, SearchOptions, SearchQuery, SearchResult, SortOrder,
};
