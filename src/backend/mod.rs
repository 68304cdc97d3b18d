mod input_builder;
mod memory;

pub use input_builder::{InputFuture, KeyFunctionBuilder};
pub use memory::{
    RateLimiter, RateLimiterBuilder, RollbackToken, DEFAULT_SWEEP_INTERVAL_SECONDS,
};

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_WINDOW_SECONDS: u64 = 60;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Decision {
    Allowed,
    Denied,
}

impl Decision {
    pub fn from_allowed(allowed: bool) -> Self {
        if allowed {
            Self::Allowed
        } else {
            Self::Denied
        }
    }

    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }

    pub fn is_denied(self) -> bool {
        matches!(self, Self::Denied)
    }
}

/// Quota applied to a single rate limit key.
///
/// Can be loaded from configuration, `window_seconds` may be omitted:
///
/// ```
/// # use careerkit_core::backend::RateLimitPolicy;
/// let policy: RateLimitPolicy = serde_json::from_str(r#"{ "limit": 5 }"#).unwrap();
/// assert_eq!(policy, RateLimitPolicy::new(5));
/// assert_eq!(policy.window_seconds, 60);
/// ```
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    /// The total calls to be allowed within the window. Must be positive.
    pub limit: u64,
    /// Length of the sliding window.
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
}

fn default_window_seconds() -> u64 {
    DEFAULT_WINDOW_SECONDS
}

impl RateLimitPolicy {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            window_seconds: DEFAULT_WINDOW_SECONDS,
        }
    }

    pub fn with_window_seconds(mut self, window_seconds: u64) -> Self {
        self.window_seconds = window_seconds;
        self
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

/// What the HTTP layer asks of a [Backend] for one incoming request.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RateLimitInput {
    /// Caller scope, usually an action name combined with a user or client identifier.
    pub key: String,
    pub policy: RateLimitPolicy,
}

/// Outcome of a single rate limit check.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct RateLimitStatus {
    pub decision: Decision,
    /// Total calls permitted within the window.
    pub limit: u64,
    /// Calls still permitted within the current window.
    pub remaining: u64,
    /// When allowed, the full window. When denied, the time until the oldest call in the window
    /// ages out.
    pub reset: Duration,
}

impl RateLimitStatus {
    pub fn is_allowed(&self) -> bool {
        self.decision.is_allowed()
    }

    pub fn reset_ms(&self) -> u64 {
        self.reset.as_millis() as u64
    }

    /// Whole seconds until the limit resets, rounded upwards so that it is guaranteed to have
    /// reset after waiting for the duration.
    pub fn retry_after_secs(&self) -> u64 {
        self.reset_ms().div_ceil(1000)
    }
}

/// Describes a rate limiting store.
///
/// The in-process [RateLimiter] is the provided implementation; a store shared between
/// processes would implement this trait as well. A Backend is required to implement [Clone],
/// usually by wrapping its state within an [Arc](std::sync::Arc).
pub trait Backend: Clone {
    type RollbackToken;
    type Error;

    /// Process an incoming request.
    ///
    /// Returns the rate limit status, and a token that allows the call to be refunded should the
    /// guarded work fail.
    fn request(
        &self,
        input: RateLimitInput,
    ) -> impl Future<Output = Result<(RateLimitStatus, Self::RollbackToken), Self::Error>>;

    /// Refund a previously allowed call.
    ///
    /// E.g. We may not want a failed AI completion to count against a user's quota, but we only
    /// learn that it failed after having allowed the request through.
    ///
    /// # Arguments
    ///
    /// * `token`: The token returned from the initial call to [Backend::request()].
    fn rollback(&self, token: Self::RollbackToken)
        -> impl Future<Output = Result<(), Self::Error>>;
}
