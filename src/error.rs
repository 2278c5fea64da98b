use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Who signaled a quota breach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaSource {
    /// The in-process sliding window refused the request before any I/O.
    Local,
    /// The backend answered with a resource-exhaustion signal.
    Backend,
}

impl std::fmt::Display for QuotaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuotaSource::Local => f.write_str("local limiter"),
            QuotaSource::Backend => f.write_str("backend"),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum SearchError {
    #[error("Rate limit exceeded ({origin})")]
    RateLimitExceeded {
        origin: QuotaSource,
        retry_after_ms: Option<u64>,
    },

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Backend rejected request: {0}")]
    BackendRejected(String),

    #[error("Search unavailable: primary failed ({primary}); fallback failed ({fallback})")]
    SearchUnavailable { primary: String, fallback: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(String),
}

pub type Result<T> = std::result::Result<T, SearchError>;

/// Copyable classification of a [`SearchError`], used for policy decisions
/// and for the degraded-result descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    RateLimitExceeded,
    BackendUnavailable,
    BackendRejected,
    SearchUnavailable,
    Config,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorKind::BackendUnavailable => "BACKEND_UNAVAILABLE",
            ErrorKind::BackendRejected => "BACKEND_REJECTED",
            ErrorKind::SearchUnavailable => "SEARCH_UNAVAILABLE",
            ErrorKind::Config => "CONFIG",
        }
    }
}

/// Serializable error summary attached to a [`crate::SearchResult`] that was
/// answered in degraded mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&SearchError> for ErrorDescriptor {
    fn from(e: &SearchError) -> Self {
        ErrorDescriptor {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(e: serde_json::Error) -> Self {
        SearchError::Json(e.to_string())
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(e: reqwest::Error) -> Self {
        // A body we cannot decode means the backend answered, but not with
        // something we asked for.
        if e.is_decode() {
            SearchError::BackendRejected(format!("undecodable response: {e}"))
        } else {
            SearchError::BackendUnavailable(e.to_string())
        }
    }
}

impl SearchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SearchError::RateLimitExceeded { .. } => ErrorKind::RateLimitExceeded,
            SearchError::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            SearchError::BackendRejected(_) => ErrorKind::BackendRejected,
            SearchError::SearchUnavailable { .. } => ErrorKind::SearchUnavailable,
            SearchError::Config(_) => ErrorKind::Config,
            SearchError::Json(_) => ErrorKind::BackendRejected,
        }
    }

    /// Stable error code a UI can switch on.
    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// True when retrying later (or elsewhere) may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::RateLimitExceeded | ErrorKind::BackendUnavailable
        )
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            SearchError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            SearchError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            SearchError::BackendRejected(_) => StatusCode::BAD_REQUEST,
            SearchError::SearchUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            SearchError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SearchError::Json(_) => StatusCode::BAD_REQUEST,
        }
    }
}
