// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # hwsense - hardware sensor telemetry from shared memory
//!
//! Attaches read-only to the shared-memory sensor export of the HWiNFO
//! hardware monitor, decodes its binary catalog and live readings, and
//! maintains a continuously refreshed, identity-keyed snapshot of every
//! sensor with history (previous/min/max/avg) and original display
//! ordering preserved.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hwsense::{Engine, EngineConfig, Result};
//!
//! fn main() -> Result<()> {
//!     let mut config = EngineConfig::default();
//!     config.set_poll_interval(500);
//!
//!     // Attach, build the catalog, poll once, start the scheduler.
//!     let engine = Engine::launch(config)?;
//!
//!     for sensor in engine.ordered() {
//!         println!("{}: {} {}", sensor.name_custom, sensor.value, sensor.unit);
//!     }
//!
//!     engine.stop();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------+
//! |                     Query Surface                             |
//! |  ordered / relevant / JSON shapes | diagnostics snapshot      |
//! +---------------------------------------------------------------+
//! |                     Sensor Cache                              |
//! |  identity-keyed full + mini records | first-seen ordering     |
//! +---------------------------------------------------------------+
//! |                     Poll Scheduler                            |
//! |  dedicated thread | cancellable wait | worker fan-out         |
//! +---------------------------------------------------------------+
//! |                 Shared-Memory Ingestion                       |
//! |  read-only mmap | bounds-checked decode | fixed layouts       |
//! +---------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Engine`] | One ingestion session: launch, query, stop |
//! | [`EngineConfig`] | Segment, cadence, priority flags |
//! | [`SensorRecord`] | Full cached record with history and category |
//! | [`SensorRecordMini`] | Abridged record for low-overhead consumers |
//! | [`StatsSnapshot`] | Poll timing and catalog diagnostics |
//!
//! ## Guarantees
//!
//! - Readers never observe a torn record: updates replace whole records.
//! - First-seen order is gap-free and never reassigned; it reproduces
//!   the monitor's own display ordering.
//! - A failing poll leaves the cache at its last-known-good contents.
//! - The export is never written to; the mapping is `PROT_READ`.

/// Concurrent sensor record store (full + abridged, first-seen order).
pub mod cache;
/// Layout constants and the per-session configuration surface.
pub mod config;
/// Engine lifecycle: launch/stop, scheduler, query surface.
pub mod engine;
/// Composite identity synthesis (decimal concatenation, checked).
pub mod identity;
/// Monitor-process liveness gate.
pub mod process;
/// Shared-memory attach and binary table decode.
pub mod shm;
/// Poll timing and catalog diagnostics.
pub mod stats;
/// Read-only projections: ordered, relevant, JSON shapes.
pub mod views;

pub use cache::{Category, SensorCache, SensorRecord, SensorRecordMini};
pub use config::EngineConfig;
pub use engine::{Engine, Error, Result};
pub use shm::{DecodeError, RawCategory, RawReading, SensorRegion, SensorType, ShmError, Superblock};
pub use stats::{EngineStats, StatsSnapshot};

/// hwsense version string.
pub const VERSION: &str = "0.3.1";
