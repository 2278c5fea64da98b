//! Sliding-window request limiter.
//!
//! Keeps the instants of recently admitted requests and refuses a new one
//! once `quota` of them fall inside the trailing `window`. The quota is set
//! below the backend's hard limit (280 of 300 per minute by default) so clock
//! skew and in-flight retries do not push us over.
//!
//! Single-process only: two replicas each get their own window.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{QuotaSource, Result, SearchError};

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
pub const DEFAULT_QUOTA: usize = 280;

/// Source of "now" for the limiter. Injected so tests can move time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        self.base + offset
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    quota: usize,
    clock: Arc<dyn Clock>,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(quota: usize, window: Duration) -> Self {
        Self::with_clock(quota, window, Arc::new(SystemClock))
    }

    pub fn with_clock(quota: usize, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            window,
            quota,
            clock,
            timestamps: Mutex::new(VecDeque::with_capacity(quota.min(4096))),
        }
    }

    pub fn quota(&self) -> usize {
        self.quota
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Admit one request or refuse it.
    ///
    /// Prune and append happen under one lock, so two concurrent callers can
    /// never both see the last free slot. A refusal records nothing.
    pub fn admit(&self) -> Result<()> {
        let now = self.clock.now();
        let mut window = self.lock();
        self.prune(&mut window, now);

        if window.len() >= self.quota {
            let retry_after = self.retry_after_locked(&window, now);
            tracing::debug!(
                in_window = window.len(),
                quota = self.quota,
                retry_after_ms = retry_after.map(|d| d.as_millis() as u64),
                "rate limiter refused request"
            );
            return Err(SearchError::RateLimitExceeded {
                origin: QuotaSource::Local,
                retry_after_ms: retry_after.map(|d| d.as_millis() as u64),
            });
        }

        window.push_back(now);
        Ok(())
    }

    /// Free slots in the current window.
    pub fn remaining(&self) -> usize {
        let now = self.clock.now();
        let mut window = self.lock();
        self.prune(&mut window, now);
        self.quota.saturating_sub(window.len())
    }

    /// How long until the oldest admitted request leaves the window, or
    /// `None` while there is headroom.
    pub fn retry_after(&self) -> Option<Duration> {
        let now = self.clock.now();
        let mut window = self.lock();
        self.prune(&mut window, now);
        if window.len() < self.quota {
            return None;
        }
        self.retry_after_locked(&window, now)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Instant>> {
        // The deque is always left consistent, so a poisoned lock is still usable.
        self.timestamps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn prune(&self, window: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&oldest) = window.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                window.pop_front();
            } else {
                break;
            }
        }
    }

    fn retry_after_locked(&self, window: &VecDeque<Instant>, now: Instant) -> Option<Duration> {
        window
            .front()
            .map(|&oldest| self.window.saturating_sub(now.saturating_duration_since(oldest)))
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_QUOTA, DEFAULT_WINDOW)
    }
}
