use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::ClassPolicy;
use crate::limiter::Decision;

/// One client's consumption allowance for one traffic class.
///
/// Tokens refill continuously at `refill_per_second` up to `capacity` and
/// are spent one per admitted request. The count is fractional so slow
/// refill rates accrue smoothly.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_second: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// A fresh bucket starts full: the first request for a key is never
    /// denied for emptiness.
    pub fn new(policy: &ClassPolicy) -> Self {
        Self::new_at(policy, Instant::now())
    }

    fn new_at(policy: &ClassPolicy, now: Instant) -> Self {
        Self {
            capacity: f64::from(policy.capacity),
            refill_per_second: policy.refill_per_second,
            tokens: f64::from(policy.capacity),
            last_refill: now,
        }
    }

    /// Credit tokens for the time elapsed since the last refill, capped at
    /// capacity, and stamp the refill instant. Runs on every admission
    /// attempt, so the stamp doubles as a last-touched marker.
    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        if elapsed.is_zero() {
            return;
        }

        self.tokens =
            (self.tokens + elapsed.as_secs_f64() * self.refill_per_second).min(self.capacity);
        self.last_refill = now;
    }

    /// Refill, then withdraw one token if at least one is available.
    /// On failure the refill still sticks; nothing else changes.
    pub fn try_consume(&mut self, now: Instant) -> bool {
        self.refill(now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Whole tokens currently available
    pub fn remaining(&self) -> u64 {
        self.tokens.max(0.0).floor() as u64
    }

    /// Time until one whole token will have accrued
    pub fn retry_after(&self) -> Duration {
        if self.tokens >= 1.0 {
            return Duration::ZERO;
        }

        let deficit = 1.0 - self.tokens;
        Duration::from_secs_f64(deficit / self.refill_per_second)
    }

    /// Instant of the last admission attempt against this bucket
    pub fn last_touched(&self) -> Instant {
        self.last_refill
    }
}

/// Process-wide mapping from composite key (`"CLASS:identity"`) to bucket.
///
/// Backed by a sharded concurrent map: creation on first use is atomic
/// (at most one bucket per key, even under concurrent first-requests) and
/// the refill-then-consume sequence runs under the entry's shard guard, so
/// two concurrent admissions can never both spend the last token.
/// Contention is per shard, not global.
pub struct BucketRegistry {
    buckets: DashMap<String, TokenBucket>,
}

impl Default for BucketRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BucketRegistry {
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
        }
    }

    /// Fetch-or-create the bucket for `key` and attempt to withdraw one
    /// token under the entry guard.
    pub fn try_admit(&self, key: &str, policy: &ClassPolicy) -> Decision {
        self.try_admit_at(key, policy, Instant::now())
    }

    pub(crate) fn try_admit_at(&self, key: &str, policy: &ClassPolicy, now: Instant) -> Decision {
        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new_at(policy, now));

        if bucket.try_consume(now) {
            Decision::Allowed {
                remaining: bucket.remaining(),
            }
        } else {
            Decision::Denied {
                retry_after: bucket.retry_after(),
            }
        }
    }

    /// Number of live buckets
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Drop buckets untouched for at least `idle_threshold`.
    /// Returns the number of buckets removed.
    pub fn sweep_idle(&self, idle_threshold: Duration) -> usize {
        let now = Instant::now();
        let before = self.buckets.len();

        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_touched()) < idle_threshold);

        before.saturating_sub(self.buckets.len())
    }
}
