// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Engine lifecycle and query surface.
//!
//! An [`Engine`] is one ingestion session: launch attaches to the
//! export, builds the immutable category table, runs one synchronous
//! poll, and starts the scheduler thread. Several engines with
//! different configs can coexist in a process; nothing here is global.
//!
//! # Lifecycle
//!
//! ```text
//! Stopped --launch()--> Running --stop()/Drop--> Stopped
//! ```
//!
//! Launch is the only place the engine reports unrecoverable failure:
//! monitor absent, attach failed, or catalog undecodable. Everything
//! after that is per-poll recoverable.

mod poller;
mod priority;

use crate::cache::{Category, SensorCache, SensorRecord, SensorRecordMini};
use crate::config::{interval_in_range, EngineConfig};
use crate::process;
use crate::shm::{decode_categories, DecodeError, SensorRegion, ShmError, Superblock};
use crate::stats::{EngineStats, StatsSnapshot};
use crate::views;
use arc_swap::ArcSwap;
use crossbeam::channel::Sender;
use parking_lot::Mutex;
use poller::{PollContext, Tuning};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Errors returned by engine operations.
///
/// Launch-time variants are definite failures: the engine does not
/// start and no background thread exists.
#[derive(Debug)]
pub enum Error {
    /// Monitor process not found during the pre-flight check.
    MonitorNotRunning,

    /// Shared-memory attach failed (export absent or unmappable).
    Attach(ShmError),

    /// Superblock or category table undecodable at launch.
    Catalog(DecodeError),

    /// Poll interval outside the accepted `[20, 60000]` ms range.
    InvalidInterval(u64),

    /// JSON projection failed to serialize.
    Serialize(serde_json::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::MonitorNotRunning => write!(f, "Monitor process not found"),
            Error::Attach(e) => write!(f, "Attach failed: {e}"),
            Error::Catalog(e) => write!(f, "Catalog decode failed: {e}"),
            Error::InvalidInterval(ms) => {
                write!(f, "Invalid poll interval: {ms} ms (must be 20-60000)")
            }
            Error::Serialize(e) => write!(f, "Serialization failed: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Attach(e) => Some(e),
            Error::Catalog(e) => Some(e),
            Error::Serialize(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// One telemetry ingestion session.
pub struct Engine {
    ctx: Arc<PollContext>,
    tuning: Arc<ArcSwap<Tuning>>,
    running: Arc<AtomicBool>,
    stop_tx: Sender<()>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("running", &self.running.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Attach to the export and start polling.
    ///
    /// Performs, in order: the liveness gate, the read-only attach, the
    /// superblock + category decode, one synchronous poll (so readers
    /// right after launch see a populated cache), then spawns the
    /// scheduler thread.
    ///
    /// # Errors
    ///
    /// [`Error::MonitorNotRunning`], [`Error::Attach`],
    /// [`Error::Catalog`] or [`Error::InvalidInterval`]; in every case
    /// no background thread was started.
    pub fn launch(config: EngineConfig) -> Result<Self> {
        if !interval_in_range(config.poll_interval_ms) {
            return Err(Error::InvalidInterval(config.poll_interval_ms));
        }
        if config.require_monitor && !process::monitor_running(&config.process_names) {
            return Err(Error::MonitorNotRunning);
        }

        let region = SensorRegion::open(&config.segment_name).map_err(Error::Attach)?;
        let superblock = Superblock::read(&region).map_err(Error::Catalog)?;

        let (cat_offset, cat_len) = superblock.category_span().map_err(Error::Catalog)?;
        let cat_table = region.read_bytes(cat_offset, cat_len).map_err(Error::Catalog)?;
        let raw_categories = decode_categories(
            &cat_table,
            superblock.category_stride as usize,
            superblock.category_count as usize,
        )
        .map_err(Error::Catalog)?;
        let categories = raw_categories
            .iter()
            .map(Category::resolve)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::Catalog)?;

        log::info!(
            "[engine] attached to {} v{}.{}: {} categories, {} readings",
            region.name(),
            superblock.version,
            superblock.revision,
            superblock.category_count,
            superblock.reading_count
        );

        let stats = Arc::new(EngineStats::new());
        stats.set_catalog(superblock.category_count, superblock.reading_count);

        let ctx = Arc::new(PollContext {
            region,
            superblock,
            categories: categories.into(),
            cache: Arc::new(SensorCache::new()),
            stats,
        });

        // Immediate synchronous poll; a failure here is the recoverable
        // per-poll kind, not a launch failure.
        if let Err(e) = ctx.poll() {
            ctx.stats.record_failure();
            log::warn!("[engine] initial poll discarded: {e}");
        }

        let tuning = Arc::new(ArcSwap::from_pointee(Tuning {
            interval_ms: config.poll_interval_ms,
        }));
        let running = Arc::new(AtomicBool::new(true));
        let (stop_tx, stop_rx) = crossbeam::channel::bounded::<()>(1);

        let thread_ctx = Arc::clone(&ctx);
        let thread_tuning = Arc::clone(&tuning);
        let thread_running = Arc::clone(&running);
        let high_precision = config.high_precision;
        let high_priority = config.high_priority;

        #[allow(clippy::expect_used)] // thread spawn failure is unrecoverable
        let handle = std::thread::Builder::new()
            .name("hwsense-poll".to_string())
            .spawn(move || {
                poller::run_loop(
                    &thread_ctx,
                    &thread_tuning,
                    &stop_rx,
                    &thread_running,
                    high_precision,
                    high_priority,
                );
            })
            .expect("Failed to spawn poll thread");

        Ok(Self {
            ctx,
            tuning,
            running,
            stop_tx,
            join: Mutex::new(Some(handle)),
        })
    }

    /// Stop the scheduler. Idempotent; returns once the poll thread
    /// exited (bounded by an in-flight poll's own completion).
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        let _ = self.stop_tx.try_send(());
        if let Some(handle) = self.join.lock().take() {
            let _ = handle.join();
        }
        log::info!("[engine] stopped");
    }

    /// Whether the scheduler is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Change the poll cadence, rejecting values outside `[20, 60000]` ms.
    ///
    /// Returns `false` and keeps the prior interval on rejection. An
    /// accepted value takes effect from the next scheduler turn.
    pub fn set_poll_interval(&self, ms: u64) -> bool {
        if !interval_in_range(ms) {
            return false;
        }
        self.tuning.store(Arc::new(Tuning { interval_ms: ms }));
        true
    }

    /// Current poll cadence in milliseconds.
    #[must_use]
    pub fn poll_interval_ms(&self) -> u64 {
        self.tuning.load().interval_ms
    }

    /// Current diagnostics snapshot.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.ctx.stats.snapshot()
    }

    /// Session-immutable category table, in table order.
    #[must_use]
    pub fn categories(&self) -> &[Category] {
        &self.ctx.categories
    }

    /// Look up one sensor by identity.
    #[must_use]
    pub fn sensor(&self, uid: u64) -> Option<Arc<SensorRecord>> {
        self.ctx.cache.get(uid)
    }

    /// Number of distinct sensors seen this session.
    #[must_use]
    pub fn sensor_count(&self) -> usize {
        self.ctx.cache.len()
    }

    /// All full records, unordered.
    #[must_use]
    pub fn sensors(&self) -> Vec<Arc<SensorRecord>> {
        self.ctx.cache.snapshot()
    }

    /// All abridged records, unordered.
    #[must_use]
    pub fn sensors_mini(&self) -> Vec<Arc<SensorRecordMini>> {
        self.ctx.cache.snapshot_mini()
    }

    /// All full records in display order.
    #[must_use]
    pub fn ordered(&self) -> Vec<Arc<SensorRecord>> {
        views::ordered(&self.ctx.cache)
    }

    /// All abridged records in display order.
    #[must_use]
    pub fn ordered_mini(&self) -> Vec<Arc<SensorRecordMini>> {
        views::ordered_mini(&self.ctx.cache)
    }

    /// Allow-listed subset with disambiguated custom names.
    #[must_use]
    pub fn relevant(&self) -> Vec<SensorRecord> {
        views::relevant(&self.ctx.cache)
    }

    /// JSON of the full records: display-ordered list or identity map.
    pub fn to_json(&self, ordered: bool) -> Result<String> {
        views::to_json(&self.ctx.cache, ordered).map_err(Error::Serialize)
    }

    /// JSON of the abridged records.
    pub fn to_json_mini(&self, ordered: bool) -> Result<String> {
        views::to_json_mini(&self.ctx.cache, ordered).map_err(Error::Serialize)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}
