use crate::backend::{Backend, Decision, RateLimitInput, RateLimitPolicy, RateLimitStatus};
use crate::clock::{Clock, RuntimeClock};
use crate::Error;
use actix_web::rt::task::JoinHandle;
use actix_web::rt::time::Instant;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 60 * 5;

/// A sliding window rate limiter that keeps the timestamps of recent calls in memory, using
/// [DashMap](dashmap::DashMap).
///
/// Every check prunes the calling key's timestamps, and an optional sweeper task periodically
/// removes keys that have gone idle. Clones share the same table. The sweeper is stopped when the
/// last clone is dropped, or explicitly with [RateLimiter::stop].
///
/// State lives in this process only; limits are not shared between processes.
#[derive(Clone)]
pub struct RateLimiter {
    map: Arc<DashMap<String, Window>>,
    clock: Arc<dyn Clock>,
    sweeper: Option<Arc<Sweeper>>,
}

struct Window {
    hits: VecDeque<Instant>,
    span: Duration,
}

impl Window {
    fn new(span: Duration) -> Self {
        Self {
            hits: VecDeque::new(),
            span,
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.hits.front() {
            if now.saturating_duration_since(*oldest) < self.span {
                break;
            }
            self.hits.pop_front();
        }
    }
}

struct Sweeper(JoinHandle<()>);

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Identifies a single allowed call, see [Backend::rollback].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackToken {
    key: String,
    at: Option<Instant>,
}

impl RateLimiter {
    pub fn builder() -> RateLimiterBuilder {
        RateLimiterBuilder {
            sweep_interval: Some(Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECONDS)),
            clock: Arc::new(RuntimeClock),
        }
    }

    /// Check the quota for `key` and, if allowed, record the call.
    ///
    /// # Examples
    ///
    /// ```
    /// # use careerkit_core::backend::{RateLimiter, RateLimitPolicy};
    /// let limiter = RateLimiter::builder().with_sweep_interval(None).build();
    /// let policy = RateLimitPolicy::new(1);
    /// assert!(limiter.check("award-credits:user-1", &policy).is_allowed());
    /// assert!(!limiter.check("award-credits:user-1", &policy).is_allowed());
    /// ```
    pub fn check(&self, key: &str, policy: &RateLimitPolicy) -> RateLimitStatus {
        self.record(key, policy).0
    }

    /// [RateLimiter::check] with the window given in optional seconds, defaulting to 60.
    pub fn check_rate_limit(
        &self,
        key: &str,
        limit: u64,
        window_seconds: Option<u64>,
    ) -> RateLimitStatus {
        let mut policy = RateLimitPolicy::new(limit);
        if let Some(window_seconds) = window_seconds {
            policy = policy.with_window_seconds(window_seconds);
        }
        self.check(key, &policy)
    }

    // The entry guard holds the shard lock, so prune, decide and append are atomic per key.
    fn record(&self, key: &str, policy: &RateLimitPolicy) -> (RateLimitStatus, Option<Instant>) {
        let window = policy.window();
        let mut entry = self
            .map
            .entry(key.to_owned())
            .or_insert_with(|| Window::new(window));
        // Read under the guard so timestamps are pushed in order.
        let now = self.clock.now();
        entry.span = window;
        entry.prune(now);

        let count = entry.hits.len() as u64;
        if count >= policy.limit {
            let reset = match entry.hits.front() {
                Some(oldest) => window.saturating_sub(now.saturating_duration_since(*oldest)),
                None => window,
            };
            log::debug!("Rate limit exceeded for {key}, resets in {reset:?}");
            let status = RateLimitStatus {
                decision: Decision::Denied,
                limit: policy.limit,
                remaining: 0,
                reset,
            };
            return (status, None);
        }

        entry.hits.push_back(now);
        let status = RateLimitStatus {
            decision: Decision::Allowed,
            limit: policy.limit,
            remaining: policy.limit - (count + 1),
            reset: window,
        };
        (status, Some(now))
    }

    /// Run a single sweep, removing keys that have no calls left within their window.
    ///
    /// Returns the number of keys removed.
    pub fn sweep(&self) -> usize {
        sweep(&self.map, self.clock.now())
    }

    /// Stop the sweeper task, if one is running.
    pub fn stop(&self) {
        if let Some(sweeper) = &self.sweeper {
            sweeper.0.abort();
        }
    }

    /// Forget all calls recorded for a key.
    pub fn remove_key(&self, key: &str) {
        self.map.remove(key);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn spawn_sweeper(
        map: Arc<DashMap<String, Window>>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> JoinHandle<()> {
        assert!(
            interval.as_secs_f64() > 0f64,
            "Sweep interval must be non-zero"
        );
        actix_web::rt::spawn(async move {
            loop {
                let removed = sweep(&map, clock.now());
                if removed > 0 {
                    log::debug!("Rate limit sweep removed {removed} idle keys");
                }
                actix_web::rt::time::sleep(interval).await;
            }
        })
    }
}

// DashMap::retain locks one shard at a time, live traffic on other shards is unaffected.
fn sweep(map: &DashMap<String, Window>, now: Instant) -> usize {
    let before = map.len();
    map.retain(|_k, v| {
        v.prune(now);
        !v.hits.is_empty()
    });
    before.saturating_sub(map.len())
}

impl Backend for RateLimiter {
    type RollbackToken = RollbackToken;
    type Error = Error;

    async fn request(
        &self,
        input: RateLimitInput,
    ) -> Result<(RateLimitStatus, Self::RollbackToken), Self::Error> {
        let (status, at) = self.record(&input.key, &input.policy);
        Ok((
            status,
            RollbackToken {
                key: input.key,
                at,
            },
        ))
    }

    async fn rollback(&self, token: Self::RollbackToken) -> Result<(), Self::Error> {
        let Some(at) = token.at else {
            // Denied calls were never recorded
            return Ok(());
        };
        if let Some(mut entry) = self.map.get_mut(&token.key) {
            if let Some(index) = entry.hits.iter().rposition(|t| *t == at) {
                entry.hits.remove(index);
            }
        }
        Ok(())
    }
}

pub struct RateLimiterBuilder {
    sweep_interval: Option<Duration>,
    clock: Arc<dyn Clock>,
}

impl RateLimiterBuilder {
    /// Override the default sweep interval.
    ///
    /// Set to None to disable the sweeper.
    ///
    /// The sweeper periodically scans the internal map, removing keys that no longer have any
    /// calls within their window.
    pub fn with_sweep_interval(mut self, interval: Option<Duration>) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Override the time source, [RuntimeClock] by default.
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Build the limiter, spawning the sweeper onto the current runtime unless it was disabled.
    ///
    /// # Panics
    ///
    /// Spawning the sweeper requires a running actix (or tokio `LocalSet`) runtime. Outside of
    /// one, disable it with [RateLimiterBuilder::with_sweep_interval] set to `None`.
    pub fn build(self) -> RateLimiter {
        let map = Arc::new(DashMap::<String, Window>::new());
        let sweeper = self.sweep_interval.map(|interval| {
            Arc::new(Sweeper(RateLimiter::spawn_sweeper(
                map.clone(),
                self.clock.clone(),
                interval,
            )))
        });
        RateLimiter {
            map,
            clock: self.clock,
            sweeper,
        }
    }
}
