//! Abuse damping for the credential endpoints.
//!
//! Process-local and in-memory: the window resets on restart, which is
//! acceptable for damping, not as a hard security boundary. The policy
//! (window, max attempts) comes from configuration, and the limiter is
//! injected so a multi-process deployment can swap in an external store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Limited { retry_after: Duration },
}

pub trait RateLimiter: Send + Sync {
    /// Records an attempt for `key` and reports whether it is allowed.
    fn check(&self, key: &str) -> RateDecision;
}

/// Sliding-window counter keyed by an opaque string (client IP + attempted
/// email for login/register, client IP alone for refresh).
pub struct SlidingWindowLimiter {
    max_attempts: usize,
    window: Duration,
    attempts: Mutex<HashMap<String, Vec<Instant>>>,
}

impl SlidingWindowLimiter {
    #[must_use]
    pub fn new(max_attempts: usize, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Instant>>> {
        self.attempts.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl RateLimiter for SlidingWindowLimiter {
    fn check(&self, key: &str) -> RateDecision {
        let now = Instant::now();
        let mut attempts = self.lock();

        let hits = attempts.entry(key.to_string()).or_default();
        hits.retain(|t| now.duration_since(*t) < self.window);

        if hits.len() >= self.max_attempts {
            // Oldest retained hit defines when the window frees a slot
            let retry_after = hits
                .first()
                .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(self.window);
            return RateDecision::Limited { retry_after };
        }

        hits.push(now);
        RateDecision::Allowed
    }
}
