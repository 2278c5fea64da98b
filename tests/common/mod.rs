#![allow(dead_code)]

use asset_search::backend::{BackendRequest, BackendResponse, BackendResult, SuggestRequest};
use asset_search::{
    FallbackStoreStrategy, MemoryStore, PrimaryBackend, PrimaryBackendStrategy, RateLimiter,
    Result, SearchError, SearchManager, Suggester,
};
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SERVING_CONFIG: &str =
    "projects/p/locations/global/collections/default_collection/engines/assets/servingConfigs/default_search";

/// Raw store documents in both shapes the mapper understands.
pub fn store_documents() -> Vec<serde_json::Value> {
    vec![
        json!({
            "id": "m-1",
            "structData": {
                "province": "Madrid",
                "municipality": "Alcobendas",
                "property_type": "RESIDENTIAL",
                "price_approx": "185000.00",
                "sqm": "92,5",
                "rooms": "3"
            }
        }),
        json!({
            "id": "m-2",
            "jsonData": "{\"province\":\"Madrid\",\"municipality\":\"Getafe\",\"property_type\":\"COMMERCIAL\",\"price_approx\":95000}"
        }),
        json!({
            "name": "projects/p/databases/(default)/documents/assets/t-1",
            "fields": {
                "province": {"stringValue": "Toledo"},
                "municipality": {"stringValue": "Seseña"},
                "street_name": {"stringValue": "Calle Mayor"},
                "property_type": {"stringValue": "RESIDENTIAL"},
                "rooms": {"integerValue": "2"}
            }
        }),
        json!({
            "id": "m-3",
            "structData": {
                "province": "Toledo",
                "municipality": "Madridejos",
                "property_type": "residential",
                "price_approx": 60000
            }
        }),
        json!({
            "id": "b-1",
            "structData": {
                "province": "Barcelona",
                "municipality": "Sabadell",
                "property_type": "RESIDENTIAL",
                "price_approx": 240000
            }
        }),
    ]
}

/// Backend that records every request and answers from a closure.
pub struct ScriptedBackend {
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<BackendRequest>>,
    reply: Box<dyn Fn(&BackendRequest) -> Result<BackendResponse> + Send + Sync>,
}

impl ScriptedBackend {
    pub fn new(
        reply: impl Fn(&BackendRequest) -> Result<BackendResponse> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            reply: Box::new(reply),
        })
    }

    pub fn always_unavailable() -> Arc<Self> {
        Self::new(|_| Err(SearchError::BackendUnavailable("connection refused".into())))
    }

    pub fn one_hit() -> Arc<Self> {
        Self::new(|_| {
            Ok(BackendResponse {
                results: vec![BackendResult {
                    id: Some("p-1".into()),
                    document: Some(json!({"structData": {"province": "Madrid"}})),
                }],
                total_size: Some(json!(1)),
                ..Default::default()
            })
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<BackendRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl PrimaryBackend for ScriptedBackend {
    async fn search(&self, request: &BackendRequest) -> Result<BackendResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        (self.reply)(request)
    }

    async fn suggest(&self, _request: &SuggestRequest) -> Result<Vec<String>> {
        Err(SearchError::BackendUnavailable("no suggestions here".into()))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Backend whose searches never come back within any sane deadline.
#[derive(Default)]
pub struct StalledBackend {
    pub calls: AtomicUsize,
}

#[async_trait]
impl PrimaryBackend for StalledBackend {
    async fn search(&self, _request: &BackendRequest) -> Result<BackendResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(BackendResponse::default())
    }

    async fn suggest(&self, _request: &SuggestRequest) -> Result<Vec<String>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "stalled"
    }
}

/// Manager over `backend` with a fresh limiter of `quota` per minute and an
/// in-memory store holding [`store_documents`].
pub fn manager(backend: Arc<dyn PrimaryBackend>, quota: usize) -> SearchManager {
    let store = Arc::new(MemoryStore::new(store_documents()));
    let limiter = Arc::new(RateLimiter::new(quota, Duration::from_secs(60)));
    let primary = PrimaryBackendStrategy::new(backend.clone(), limiter, SERVING_CONFIG);
    let fallback = FallbackStoreStrategy::new(store.clone());
    let suggester = Suggester::new(store)
        .with_primary(backend, RateLimiter::new(600, Duration::from_secs(60)));
    SearchManager::new(Arc::new(primary), Arc::new(fallback), suggester)
}
