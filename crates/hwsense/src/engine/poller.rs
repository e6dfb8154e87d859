// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The poll loop: periodic re-decode of the readings table.
//!
//! One dedicated thread drives all polls, so polls never overlap. The
//! only blocking point between polls is a `recv_timeout` on the stop
//! channel, which doubles as the cancellable interval wait: a stop
//! signal (or a dropped sender) wakes it immediately instead of letting
//! a full interval elapse.
//!
//! Within a poll the readings table is copied out of the region in one
//! bounds-checked read, then decoded record by record. Large tables fan
//! out across scoped worker threads; every record's decode+upsert is
//! independent of every other record in the same poll.

use super::priority;
use crate::cache::{Category, SensorCache};
use crate::config::PARALLEL_DECODE_THRESHOLD;
use crate::shm::{reading_at, DecodeResult, SensorRegion, Superblock};
use crate::stats::EngineStats;
use arc_swap::ArcSwap;
use crossbeam::channel::{Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Runtime-tunable scheduler settings, swapped atomically as a unit.
#[derive(Debug, Clone)]
pub(crate) struct Tuning {
    pub interval_ms: u64,
}

/// Everything one poll needs, shared between launch (for the immediate
/// synchronous poll) and the scheduler thread.
pub(crate) struct PollContext {
    pub region: SensorRegion,
    pub superblock: Superblock,
    /// Session-immutable category table, indexed by reading order.
    pub categories: Arc<[Category]>,
    pub cache: Arc<SensorCache>,
    pub stats: Arc<EngineStats>,
}

impl PollContext {
    /// Re-scan the readings table once.
    ///
    /// A failure here discards the whole poll before any upsert ran:
    /// span and stride problems are detected up front, so the cache is
    /// never left with a partial poll applied. Per-record anomalies
    /// (identity overflow, dangling category index) skip that record
    /// only.
    pub(crate) fn poll(&self) -> DecodeResult<()> {
        let start = Instant::now();
        let count = self.superblock.reading_count as usize;
        let stride = self.superblock.reading_stride as usize;

        if count == 0 {
            self.stats.record_poll(start.elapsed());
            return Ok(());
        }

        let (offset, len) = self.superblock.reading_span()?;
        let table = self.region.read_bytes(offset, len)?;

        // The discovery pass stays inline: first-seen order must
        // reproduce the table scan order, and workers would interleave
        // it. Later polls only update existing identities, where
        // completion order is free, so large tables fan out.
        if count >= PARALLEL_DECODE_THRESHOLD && !self.cache.is_empty() {
            self.apply_parallel(&table, stride, count);
        } else {
            for index in 0..count {
                self.apply(&table, stride, index);
            }
        }

        self.stats.record_poll(start.elapsed());
        Ok(())
    }

    /// Decode and upsert one record out of the copied table.
    fn apply(&self, table: &[u8], stride: usize, index: usize) {
        let reading = match reading_at(table, stride, index) {
            Ok(r) => r,
            Err(e) => {
                // Unreachable after the span check, kept as a guard.
                log::debug!("[poller] record {index} skipped: {e}");
                return;
            }
        };

        let Some(parent) = self.categories.get(reading.category_index as usize) else {
            log::debug!(
                "[poller] record {index} skipped: category index {} outside table of {}",
                reading.category_index,
                self.categories.len()
            );
            return;
        };

        if let Err(e) = self.cache.upsert(&reading, parent) {
            log::debug!("[poller] record {index} skipped: {e}");
        }
    }

    /// Fan the record range out across scoped workers.
    fn apply_parallel(&self, table: &[u8], stride: usize, count: usize) {
        let workers = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1)
            .min(count);
        let chunk = count.div_ceil(workers);

        std::thread::scope(|scope| {
            for w in 0..workers {
                let lo = w * chunk;
                let hi = ((w + 1) * chunk).min(count);
                scope.spawn(move || {
                    for index in lo..hi {
                        self.apply(table, stride, index);
                    }
                });
            }
        });
    }
}

/// Scheduler body, run on the dedicated poll thread.
///
/// The immediate first poll already happened synchronously in launch;
/// this loop only handles the periodic re-polls.
pub(crate) fn run_loop(
    ctx: &Arc<PollContext>,
    tuning: &Arc<ArcSwap<Tuning>>,
    stop_rx: &Receiver<()>,
    running: &Arc<AtomicBool>,
    high_precision: bool,
    high_priority: bool,
) {
    if high_priority {
        priority::raise_thread_priority();
    }
    if high_precision {
        priority::begin_high_resolution();
    }

    loop {
        let interval = Duration::from_millis(tuning.load().interval_ms);
        match stop_rx.recv_timeout(interval) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
        if !running.load(Ordering::Acquire) {
            break;
        }

        match ctx.poll() {
            Ok(()) => {}
            Err(e) => {
                // The cache keeps its last-known-good contents; readers
                // only notice through diagnostics.
                ctx.stats.record_failure();
                log::warn!("[poller] poll discarded: {e}");
            }
        }
    }

    if high_precision {
        priority::end_high_resolution();
    }
    log::debug!(
        "[poller] stopped after {} polls ({} failed)",
        ctx.stats.polls_completed(),
        ctx.stats.polls_failed()
    );
}
