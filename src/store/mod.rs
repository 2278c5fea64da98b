//! Read-only access to the underlying document store.
//!
//! The fallback strategy and the suggestion heuristic only ever need a bulk
//! read of the first N raw documents; filtering happens in-process.

pub mod memory;
pub mod rest;

use async_trait::async_trait;

use crate::error::Result;

pub use memory::MemoryStore;
pub use rest::RestDocumentStore;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Up to `limit` raw documents, in store order.
    async fn fetch(&self, limit: usize) -> Result<Vec<serde_json::Value>>;

    fn name(&self) -> &'static str;
}
