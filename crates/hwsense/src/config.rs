// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! hwsense Global Configuration - Single Source of Truth
//!
//! This module centralizes the shared-memory layout constants and the
//! runtime configuration surface. **NEVER hardcode elsewhere!**
//!
//! - **Level 1 (Static)**: Compile-time constants (segment name, record
//!   widths, interval bounds) fixed by the HWiNFO SM2 export format.
//! - **Level 2 (Dynamic)**: [`EngineConfig`] for per-session settings
//!   (segment override, cadence, priority flags).

// =======================================================================
// HWiNFO SM2 shared-memory export (fixed by the publishing application)
// =======================================================================

/// Name of the sensor shared-memory object published by the monitor.
///
/// Windows builds of the monitor publish `Global\HWiNFO_SENS_SM2`; the
/// POSIX export uses the flat namespace below.
pub const SEGMENT_NAME: &str = "/hwinfo_sens_sm2";

/// Superblock signature, ASCII `HWiS` read as a little-endian u32.
pub const SUPERBLOCK_SIGNATURE: u32 = 0x5369_5748;

/// Encoded superblock length in bytes (packed, little-endian).
pub const SUPERBLOCK_LEN: usize = 44;

/// Width of the fixed, NUL-padded name fields (category and reading).
pub const SENSOR_NAME_LEN: usize = 128;

/// Width of the fixed, NUL-padded unit field.
pub const UNIT_NAME_LEN: usize = 16;

/// Minimum category record size: id + instance + two name fields.
pub const CATEGORY_RECORD_MIN: usize = 8 + 2 * SENSOR_NAME_LEN;

/// Minimum reading record size: type + index + id, two names, unit,
/// four f64 value fields.
pub const READING_RECORD_MIN: usize = 12 + 2 * SENSOR_NAME_LEN + UNIT_NAME_LEN + 4 * 8;

// =======================================================================
// Poll cadence
// =======================================================================

/// Lower bound of the accepted poll interval (milliseconds, inclusive).
pub const MIN_POLL_INTERVAL_MS: u64 = 20;

/// Upper bound of the accepted poll interval (milliseconds, inclusive).
pub const MAX_POLL_INTERVAL_MS: u64 = 60_000;

/// Default poll interval when the caller does not configure one.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// Reading-table size above which a poll fans out across worker threads.
///
/// Below this, per-record decode+upsert is cheaper inline than the
/// thread-scope setup.
pub const PARALLEL_DECODE_THRESHOLD: usize = 64;

/// Check if an interval is inside the accepted `[20, 60000]` ms range.
#[must_use]
pub fn interval_in_range(ms: u64) -> bool {
    (MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&ms)
}

// =======================================================================
// External monitor process
// =======================================================================

/// Process names that identify a running monitor instance.
///
/// Matched case-insensitively as substrings of the process `comm` name,
/// so the bare stem also covers the `hwinfo32`/`hwinfo64` variants.
pub const MONITOR_PROCESS_NAMES: &[&str] = &["hwinfo32", "hwinfo64", "hwinfo"];

/// Default-name allow-list used by the "relevant" projection.
///
/// These are the default display names the monitor assigns to the
/// readings operators most commonly chart.
pub const RELEVANT_SENSORS: &[&str] = &[
    "Physical Memory Load",
    "Physical Memory Used",
    "P-core 0 VID",
    "P-core 0 Clock",
    "Ring/LLC Clock",
    "Total CPU Usage",
    "CPU Package",
    "Core Max",
    "CPU Package Power",
    "Vcore",
    "+12V",
    "SPD Hub Temperature",
    "GPU Temperature",
    "GPU Memory Junction Temperature",
    "GPU 8-pin #1 Input Voltage",
    "GPU 8-pin #2 Input Voltage",
    "GPU 8-pin #3 Input Voltage",
    "GPU Power (Total)",
    "GPU Core Load",
    "GPU Memory Controller Load",
    "Current DL rate",
    "Current UP rate",
    "Total Errors",
];

// =======================================================================
// Runtime configuration
// =======================================================================

/// Per-session engine configuration.
///
/// One [`crate::Engine`](crate::engine::Engine) owns one config; several
/// engines with different configs can coexist in a process.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Shared-memory object to attach to (read-only).
    pub segment_name: String,
    /// Poll cadence in milliseconds, `[20, 60000]`.
    pub poll_interval_ms: u64,
    /// Raise the poll thread's scheduling priority (niceness).
    pub high_priority: bool,
    /// Request elevated OS timer resolution for the scheduler's lifetime.
    pub high_precision: bool,
    /// Monitor process names for the pre-flight liveness gate.
    pub process_names: Vec<String>,
    /// Whether launch requires the monitor process to be found.
    ///
    /// Disabled by fixtures/tools that publish a synthetic segment.
    pub require_monitor: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            segment_name: SEGMENT_NAME.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            high_priority: false,
            high_precision: false,
            process_names: MONITOR_PROCESS_NAMES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            require_monitor: true,
        }
    }
}

impl EngineConfig {
    /// Config attached to a non-default segment (fixtures, alternate exports).
    #[must_use]
    pub fn for_segment(name: &str) -> Self {
        Self {
            segment_name: name.to_string(),
            ..Self::default()
        }
    }

    /// Set the poll interval, rejecting values outside `[20, 60000]` ms.
    ///
    /// Returns `false` and leaves the prior interval untouched on rejection.
    pub fn set_poll_interval(&mut self, ms: u64) -> bool {
        if interval_in_range(ms) {
            self.poll_interval_ms = ms;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_widths_match_packed_layout() {
        assert_eq!(CATEGORY_RECORD_MIN, 264);
        assert_eq!(READING_RECORD_MIN, 316);
        assert_eq!(SUPERBLOCK_LEN, 44);
    }

    #[test]
    fn test_interval_bounds_inclusive() {
        assert!(interval_in_range(MIN_POLL_INTERVAL_MS));
        assert!(interval_in_range(MAX_POLL_INTERVAL_MS));
        assert!(!interval_in_range(MIN_POLL_INTERVAL_MS - 1));
        assert!(!interval_in_range(MAX_POLL_INTERVAL_MS + 1));
    }

    #[test]
    fn test_set_poll_interval_rejects_out_of_range() {
        let mut config = EngineConfig::default();
        assert!(!config.set_poll_interval(10));
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);

        assert!(config.set_poll_interval(250));
        assert_eq!(config.poll_interval_ms, 250);

        assert!(!config.set_poll_interval(90_000));
        assert_eq!(config.poll_interval_ms, 250);
    }

    #[test]
    fn test_default_config_targets_monitor_segment() {
        let config = EngineConfig::default();
        assert_eq!(config.segment_name, SEGMENT_NAME);
        assert!(config.require_monitor);
        assert!(config
            .process_names
            .iter()
            .any(|n| n.contains("hwinfo")));
    }
}
