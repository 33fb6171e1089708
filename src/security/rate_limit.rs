//! Per-client token-bucket rate limiting with idle eviction.
//!
//! # Responsibilities
//! - Own one token bucket per [`ClientKey`]
//! - Decide admission atomically per key
//! - Sweep idle entries on a fixed interval so client churn cannot grow
//!   the map without bound
//!
//! # Design Decisions
//! - One `std::sync::Mutex` guards the whole map; it is only held for the
//!   lookup and the bucket arithmetic, never across an `.await`
//! - New buckets start full, so a fresh client gets `burst` requests
//! - All time arithmetic takes an explicit `Instant` so the decisions are
//!   testable without sleeping

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::config::{ClientIpConfig, RateLimitConfig};
use crate::error::GateError;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::security::client_ip::{client_key, ClientKey};

/// Upper bound for the idle timeout and the sweep interval.
pub const MAX_WINDOW_SECS: u64 = 86_400;

/// A token bucket refilled continuously at `rate` tokens per second.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    rate: f64,
    burst: f64,
    tokens: f64,
    updated_at: Instant,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(rate: f64, burst: u32, now: Instant) -> Self {
        let burst = f64::from(burst);
        Self {
            rate,
            burst,
            tokens: burst,
            updated_at: now,
        }
    }

    /// Tokens currently available, without refilling.
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    fn replenish(&mut self, now: Instant) {
        // A clock reading older than the last update adds nothing.
        let elapsed = now.saturating_duration_since(self.updated_at).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.burst);
        self.updated_at = self.updated_at.max(now);
    }

    /// Refill for the time elapsed since the last call, then take one token.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        self.replenish(now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[derive(Debug)]
struct LimiterEntry {
    bucket: TokenBucket,
    last_seen: Instant,
}

/// Registry of per-client limiters.
///
/// Built once at server start and shared via `Arc`. The idle sweep is
/// started with [`spawn_sweeper`](Self::spawn_sweeper) and stopped with
/// [`shutdown`](Self::shutdown).
pub struct ClientLimiterRegistry {
    clients: Mutex<HashMap<ClientKey, LimiterEntry>>,
    enabled: bool,
    rate: f64,
    burst: u32,
    idle_timeout: Duration,
    sweep_interval: Duration,
    shutdown: Shutdown,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl ClientLimiterRegistry {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            enabled: config.enabled,
            rate: config.requests_per_second,
            burst: config.burst,
            idle_timeout: Duration::from_secs(config.idle_timeout_secs.min(MAX_WINDOW_SECS)),
            sweep_interval: Duration::from_secs(
                config.sweep_interval_secs.clamp(1, MAX_WINDOW_SECS),
            ),
            shutdown: Shutdown::new(),
            sweeper: Mutex::new(None),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn clients(&self) -> MutexGuard<'_, HashMap<ClientKey, LimiterEntry>> {
        // Nothing inside the critical section can panic half-way through an
        // update, so a poisoned map is still consistent.
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decide whether `key` may make a request now.
    pub fn admit(&self, key: &ClientKey) -> bool {
        self.admit_at(key, Instant::now())
    }

    /// Admission decision at an explicit instant.
    pub fn admit_at(&self, key: &ClientKey, now: Instant) -> bool {
        if !self.enabled {
            return true;
        }

        let mut clients = self.clients();
        let entry = clients.entry(key.clone()).or_insert_with(|| LimiterEntry {
            bucket: TokenBucket::new(self.rate, self.burst, now),
            last_seen: now,
        });
        entry.last_seen = entry.last_seen.max(now);
        entry.bucket.try_acquire(now)
    }

    /// Evict every entry idle for longer than the idle timeout.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// Sweep relative to an explicit instant. Returns the number evicted.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut clients = self.clients();
        let before = clients.len();
        clients.retain(|_, entry| now.saturating_duration_since(entry.last_seen) <= self.idle_timeout);
        let evicted = before - clients.len();
        metrics::record_tracked_clients(clients.len());
        evicted
    }

    /// Number of clients currently tracked.
    pub fn len(&self) -> usize {
        self.clients().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &ClientKey) -> bool {
        self.clients().contains_key(key)
    }

    /// Start the periodic idle sweep.
    ///
    /// The task holds only a weak reference, so dropping the last registry
    /// handle also ends it. Calling this twice has no effect.
    pub fn spawn_sweeper(self: &Arc<Self>) {
        if !self.enabled {
            return;
        }

        let mut sweeper = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner);
        if sweeper.is_some() {
            return;
        }

        let registry = Arc::downgrade(self);
        let shutdown = self.shutdown.subscribe();
        let interval = self.sweep_interval;
        *sweeper = Some(tokio::spawn(run_sweeper(registry, interval, shutdown)));

        tracing::info!(
            interval_secs = interval.as_secs(),
            idle_timeout_secs = self.idle_timeout.as_secs(),
            "Rate limiter sweep started"
        );
    }

    /// Stop the sweep task and wait for it to exit.
    pub async fn shutdown(&self) {
        self.shutdown.trigger();
        let handle = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Rate limiter sweep task failed");
            }
        }
    }
}

async fn run_sweeper(
    registry: Weak<ClientLimiterRegistry>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let now = Instant::now();
    let mut ticker = time::interval_at(now.checked_add(interval).unwrap_or(now), interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                let evicted = registry.sweep();
                if evicted > 0 {
                    tracing::debug!(evicted, remaining = registry.len(), "Evicted idle rate limiter entries");
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Rate limiter sweep received shutdown signal, exiting loop");
                break;
            }
        }
    }
}

/// State for the admission middleware.
#[derive(Clone)]
pub struct RateAdmission {
    pub registry: Arc<ClientLimiterRegistry>,
    pub client_ip: ClientIpConfig,
}

/// Reject requests from clients that have exhausted their bucket.
pub async fn rate_limit_middleware(
    State(state): State<RateAdmission>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.registry.is_enabled() {
        return next.run(request).await;
    }

    let key = match client_key(&state.client_ip, &request) {
        Ok(key) => key,
        Err(err) => return err.into_response(),
    };

    if !state.registry.admit(&key) {
        tracing::debug!(client = %key, "Rate limit exceeded");
        return GateError::RateLimited.into_response();
    }

    next.run(request).await
}
