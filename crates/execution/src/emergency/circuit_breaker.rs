//! Per-position circuit breaker.
//!
//! A position whose check fails with a transient error is opened for a
//! back-off period. Once the period passes it is half-open: the next check
//! runs, and either closes the circuit or reopens it with a doubled
//! back-off, up to a ceiling.

use chrono::{DateTime, Duration, Utc};
use compoundor_domain::PositionId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Circuit state of one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Checks run normally.
    Closed,
    /// Checks are skipped until the given time.
    Open {
        /// End of the back-off.
        until: DateTime<Utc>,
    },
    /// The back-off elapsed; the next check decides.
    HalfOpen,
}

/// Configuration for the circuit breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Back-off after the first failure in milliseconds.
    pub backoff_ms: u64,
    /// Back-off ceiling in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            backoff_ms: 60_000,
            max_backoff_ms: 15 * 60 * 1_000,
        }
    }
}

impl CircuitBreakerConfig {
    /// Back-off after `failures` consecutive failures.
    fn backoff(&self, failures: u32) -> Duration {
        let shift = failures.saturating_sub(1).min(32);
        let millis = self
            .backoff_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_backoff_ms);
        Duration::milliseconds(i64::try_from(millis).unwrap_or(i64::MAX))
    }
}

#[derive(Debug, Clone, Copy)]
struct Trip {
    failures: u32,
    until: DateTime<Utc>,
}

/// Tracks failing positions and how long each sits out.
#[derive(Debug, Default)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    trips: RwLock<HashMap<PositionId, Trip>>,
    total_trips: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            trips: RwLock::new(HashMap::new()),
            total_trips: AtomicU64::new(0),
        }
    }

    /// Whether `position` may be checked at `now`.
    pub async fn is_allowed(&self, position: PositionId, now: DateTime<Utc>) -> bool {
        !matches!(self.state(position, now).await, CircuitState::Open { .. })
    }

    pub async fn state(&self, position: PositionId, now: DateTime<Utc>) -> CircuitState {
        match self.trips.read().await.get(&position) {
            None => CircuitState::Closed,
            Some(trip) if now < trip.until => CircuitState::Open { until: trip.until },
            Some(_) => CircuitState::HalfOpen,
        }
    }

    /// Closes the circuit of `position`.
    pub async fn record_success(&self, position: PositionId) {
        if self.trips.write().await.remove(&position).is_some() {
            info!(position = %position, "Circuit closed after successful check");
        }
    }

    /// Opens the circuit of `position` and returns the end of its back-off.
    pub async fn record_failure(
        &self,
        position: PositionId,
        now: DateTime<Utc>,
        reason: &str,
    ) -> DateTime<Utc> {
        let mut trips = self.trips.write().await;
        let failures = trips.get(&position).map_or(1, |trip| trip.failures + 1);
        let until = now + self.config.backoff(failures);
        trips.insert(position, Trip { failures, until });
        self.total_trips.fetch_add(1, Ordering::SeqCst);

        warn!(
            position = %position,
            failures,
            until = %until,
            reason,
            "Circuit opened"
        );
        until
    }

    /// Drops the state of a position that is no longer tracked.
    pub async fn forget(&self, position: PositionId) {
        self.trips.write().await.remove(&position);
    }

    pub async fn stats(&self, now: DateTime<Utc>) -> CircuitBreakerStats {
        let trips = self.trips.read().await;
        let open = trips.values().filter(|trip| now < trip.until).count();
        CircuitBreakerStats {
            open,
            half_open: trips.len() - open,
            total_trips: self.total_trips.load(Ordering::SeqCst),
        }
    }
}

/// Statistics for the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerStats {
    /// Positions currently backing off.
    pub open: usize,
    /// Positions waiting for a deciding check.
    pub half_open: usize,
    /// Failures recorded since start.
    pub total_trips: u64,
}
