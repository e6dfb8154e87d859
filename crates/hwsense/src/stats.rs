// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Engine diagnostics: poll timing and catalog sizes.
//!
//! All counters are atomic with `Relaxed` ordering; readers get an
//! eventually-consistent snapshot from any thread.

use serde::Serialize;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

/// Atomic diagnostics owned by one engine instance.
#[derive(Debug, Default)]
pub struct EngineStats {
    /// Duration of the last completed poll, microseconds.
    last_poll_micros: AtomicU64,
    /// Duration of the last completed poll, raw nanoseconds.
    last_poll_nanos: AtomicU64,
    /// Category count fixed at session start.
    categories: AtomicU32,
    /// Reading count declared by the superblock at session start.
    readings: AtomicU32,
    /// Completed polls.
    polls_completed: AtomicU64,
    /// Polls discarded on decode failure.
    polls_failed: AtomicU64,
}

impl EngineStats {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_poll_micros: AtomicU64::new(0),
            last_poll_nanos: AtomicU64::new(0),
            categories: AtomicU32::new(0),
            readings: AtomicU32::new(0),
            polls_completed: AtomicU64::new(0),
            polls_failed: AtomicU64::new(0),
        }
    }

    /// Record the session's fixed catalog sizes (launch time).
    pub fn set_catalog(&self, categories: u32, readings: u32) {
        self.categories.store(categories, Ordering::Relaxed);
        self.readings.store(readings, Ordering::Relaxed);
    }

    /// Record a completed poll and its duration.
    pub fn record_poll(&self, elapsed: Duration) {
        self.last_poll_micros
            .store(elapsed.as_micros() as u64, Ordering::Relaxed);
        self.last_poll_nanos
            .store(elapsed.as_nanos() as u64, Ordering::Relaxed);
        self.polls_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a discarded poll.
    pub fn record_failure(&self) {
        self.polls_failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    #[must_use]
    pub fn polls_completed(&self) -> u64 {
        self.polls_completed.load(Ordering::Relaxed)
    }

    #[inline]
    #[must_use]
    pub fn polls_failed(&self) -> u64 {
        self.polls_failed.load(Ordering::Relaxed)
    }

    /// Non-atomic snapshot for reporting.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            last_poll_ms: self.last_poll_micros.load(Ordering::Relaxed) as f64 / 1_000.0,
            last_poll_nanos: self.last_poll_nanos.load(Ordering::Relaxed),
            categories: self.categories.load(Ordering::Relaxed),
            readings: self.readings.load(Ordering::Relaxed),
            polls_completed: self.polls_completed(),
            polls_failed: self.polls_failed(),
        }
    }
}

/// Point-in-time copy of [`EngineStats`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatsSnapshot {
    /// Duration of the last completed poll, milliseconds.
    pub last_poll_ms: f64,
    /// Duration of the last completed poll, raw nanoseconds.
    pub last_poll_nanos: u64,
    pub categories: u32,
    pub readings: u32,
    pub polls_completed: u64,
    pub polls_failed: u64,
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "poll[last={:.3}ms, ok={}, failed={}] catalog[categories={}, readings={}]",
            self.last_poll_ms,
            self.polls_completed,
            self.polls_failed,
            self.categories,
            self.readings
        )
    }
}
