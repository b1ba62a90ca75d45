// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Minimum-spacing limiter for outbound upstream calls.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Spaces calls at least `min_interval` apart, across every clone of the
/// handle. Waiters are served in arrival order (tokio's mutex is fair).
#[derive(Clone, Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    next_slot: Arc<Mutex<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Reserve the next free slot and wait until it arrives.
    ///
    /// The lock is held only while reserving, so a caller sleeping for its
    /// slot does not hold up the reservations queued behind it.
    pub async fn acquire(&self) {
        let slot = {
            let mut next_slot = self.next_slot.lock().await;
            let slot = (*next_slot).max(Instant::now());
            *next_slot = slot + self.min_interval;
            slot
        };

        tokio::time::sleep_until(slot).await;
    }

    /// Run `call` once a slot is available.
    pub async fn schedule<F, T>(&self, call: F) -> T
    where
        F: Future<Output = T>,
    {
        self.acquire().await;
        call.await
    }
}
