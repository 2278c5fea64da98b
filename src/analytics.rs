//! Search analytics. Recording is fire-and-forget: a sink never blocks the
//! search path and never reports failure back to it.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::types::{SearchQuery, SearchResult};

/// One answered (or failed) search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchEvent {
    pub timestamp_ms: i64,
    pub query: String,
    pub filter_count: usize,
    pub result_count: u64,
    pub elapsed_ms: u64,
    pub strategy: String,
    pub fallback: bool,
    pub error_code: Option<String>,
    pub user_pseudo_id: Option<String>,
}

impl SearchEvent {
    fn base(query: &SearchQuery) -> Self {
        SearchEvent {
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            query: query.text.clone(),
            filter_count: query.filters.active_count(),
            result_count: 0,
            elapsed_ms: 0,
            strategy: String::new(),
            fallback: false,
            error_code: None,
            user_pseudo_id: query.options.user_pseudo_id.clone(),
        }
    }

    pub fn answered(query: &SearchQuery, result: &SearchResult, fallback: bool) -> Self {
        SearchEvent {
            result_count: result.total,
            elapsed_ms: result.elapsed_ms,
            strategy: result.strategy.clone(),
            fallback,
            error_code: result.error.as_ref().map(|e| e.kind.code().to_string()),
            ..Self::base(query)
        }
    }

    pub fn failed(query: &SearchQuery, error_code: &str, elapsed_ms: u64) -> Self {
        SearchEvent {
            elapsed_ms,
            strategy: "none".to_string(),
            fallback: true,
            error_code: Some(error_code.to_string()),
            ..Self::base(query)
        }
    }
}

pub trait AnalyticsSink: Send + Sync {
    /// Must return promptly and must not panic.
    fn record(&self, event: SearchEvent);
}

/// Emits each event as a structured `info!` line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl AnalyticsSink for TracingSink {
    fn record(&self, event: SearchEvent) {
        tracing::info!(
            target: "asset_search::analytics",
            query = %event.query,
            filter_count = event.filter_count,
            result_count = event.result_count,
            elapsed_ms = event.elapsed_ms,
            strategy = %event.strategy,
            fallback = event.fallback,
            error_code = event.error_code.as_deref().unwrap_or(""),
            "search"
        );
    }
}

/// Keeps the most recent `capacity` events in memory.
#[derive(Debug)]
pub struct MemorySink {
    events: Mutex<VecDeque<SearchEvent>>,
    capacity: usize,
}

impl MemorySink {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Oldest first.
    pub fn events(&self) -> Vec<SearchEvent> {
        self.events
            .lock()
            .map(|e| e.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl AnalyticsSink for MemorySink {
    fn record(&self, event: SearchEvent) {
        if let Ok(mut events) = self.events.lock() {
            if events.len() == self.capacity {
                events.pop_front();
            }
            events.push_back(event);
        }
    }
}

/// Hands events to a consumer task over a bounded channel. Drops when full.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<SearchEvent>,
}

impl ChannelSink {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<SearchEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

impl AnalyticsSink for ChannelSink {
    fn record(&self, event: SearchEvent) {
        if let Err(e) = self.tx.try_send(event) {
            match e {
                mpsc::error::TrySendError::Full(_) => {
                    tracing::warn!("analytics channel full, dropping search event")
                }
                mpsc::error::TrySendError::Closed(_) => {
                    tracing::debug!("analytics channel closed, dropping search event")
                }
            }
        }
    }
}
