// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end engine tests against a synthetic sensor export.
//!
//! Each test publishes a real shared-memory object with the export's
//! binary layout, launches an engine against it, and asserts on the
//! query surface. The publisher side stands in for the monitor.

use hwsense::config::{READING_RECORD_MIN, SUPERBLOCK_LEN, SUPERBLOCK_SIGNATURE};
use hwsense::identity::compose_uid;
use hwsense::{
    Engine, EngineConfig, Error, RawCategory, RawReading, SensorRegion, SensorType, Superblock,
};
use std::collections::HashSet;
use std::time::Duration;

const CATEGORY_STRIDE: usize = 264;

/// Synthetic export publisher: owns the writable mapping and can update
/// reading values between polls like the monitor would.
struct Publisher {
    name: String,
    region: SensorRegion,
    reading_offset: usize,
    reading_stride: usize,
}

impl Publisher {
    fn publish(tag: &str, categories: &[RawCategory], readings: &[RawReading]) -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let name = format!("/hwsense_e2e_{tag}_{ts}");

        let reading_stride = READING_RECORD_MIN;
        let category_offset = SUPERBLOCK_LEN;
        let reading_offset = category_offset + categories.len() * CATEGORY_STRIDE;
        let total = reading_offset + readings.len() * reading_stride;

        let region = SensorRegion::create(&name, total).expect("create export");

        let superblock = Superblock {
            signature: SUPERBLOCK_SIGNATURE,
            version: 2,
            revision: 0,
            last_poll_unix: 1_700_000_000,
            category_offset: category_offset as u32,
            category_stride: CATEGORY_STRIDE as u32,
            category_count: categories.len() as u32,
            reading_offset: reading_offset as u32,
            reading_stride: reading_stride as u32,
            reading_count: readings.len() as u32,
        };
        region.write_bytes(0, &superblock.encode()).expect("superblock");

        for (i, cat) in categories.iter().enumerate() {
            region
                .write_bytes(
                    (category_offset + i * CATEGORY_STRIDE) as u64,
                    &cat.encode(CATEGORY_STRIDE),
                )
                .expect("category");
        }
        for (i, r) in readings.iter().enumerate() {
            region
                .write_bytes(
                    (reading_offset + i * reading_stride) as u64,
                    &r.encode(reading_stride),
                )
                .expect("reading");
        }

        Self {
            name,
            region,
            reading_offset,
            reading_stride,
        }
    }

    /// Rewrite one reading record in place, as the monitor does per poll.
    fn update_reading(&self, index: usize, reading: &RawReading) {
        self.region
            .write_bytes(
                (self.reading_offset + index * self.reading_stride) as u64,
                &reading.encode(self.reading_stride),
            )
            .expect("update reading");
    }

    fn config(&self) -> EngineConfig {
        let mut config = EngineConfig::for_segment(&self.name);
        config.require_monitor = false;
        config.poll_interval_ms = 25;
        config
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        SensorRegion::unlink(&self.name).ok();
    }
}

fn category(id: u32, instance: u32, name: &str) -> RawCategory {
    RawCategory {
        id,
        instance,
        name_default: name.to_string(),
        name_custom: name.to_string(),
    }
}

fn reading(
    category_index: u32,
    sensor_id: u32,
    kind: SensorType,
    name: &str,
    value: f64,
) -> RawReading {
    RawReading {
        kind,
        category_index,
        sensor_id,
        name_default: name.to_string(),
        name_custom: name.to_string(),
        unit: "°C".to_string(),
        value,
        value_min: value - 5.0,
        value_max: value + 5.0,
        value_avg: value,
    }
}

/// Small export: 2 categories, 3 readings.
fn standard_export(tag: &str) -> Publisher {
    Publisher::publish(
        tag,
        &[category(0xF100, 0, "CPU [#0]"), category(0xF200, 0, "GPU")],
        &[
            reading(0, 10, SensorType::Temperature, "CPU Package", 45.0),
            reading(0, 11, SensorType::Frequency, "Core Effective Clock", 4_200.0),
            reading(1, 20, SensorType::Temperature, "GPU Temperature", 61.0),
        ],
    )
}

#[test]
fn test_launch_populates_cache_before_returning() {
    let publisher = standard_export("immediate");
    let engine = Engine::launch(publisher.config()).expect("launch");

    // The synchronous first poll already ran.
    assert_eq!(engine.sensor_count(), 3);

    let uid = compose_uid(10, 0).unwrap();
    let rec = engine.sensor(uid).expect("reading #0 cached");
    assert_eq!(rec.value, 45.0);
    assert_eq!(rec.value_prev, 45.0);
    assert_eq!(rec.index_order, 0);
    assert_eq!(rec.reading_type, SensorType::Temperature);
    assert_eq!(rec.parent_name_default, "CPU [#0]");
    assert_eq!(rec.parent_uid, compose_uid(0xF100, 0).unwrap());

    let stats = engine.stats();
    assert_eq!(stats.categories, 2);
    assert_eq!(stats.readings, 3);
    assert!(stats.polls_completed >= 1);

    engine.stop();
}

#[test]
fn test_repoll_moves_current_into_previous() {
    let publisher = standard_export("repoll");
    // Slow cadence: a full second separates the poll that picks up the
    // new sample from the one that collapses previous into current, so
    // the intermediate state is reliably observable.
    let mut config = publisher.config();
    config.poll_interval_ms = 1_000;
    let engine = Engine::launch(config).expect("launch");

    let uid = compose_uid(10, 0).unwrap();
    assert_eq!(engine.sensor(uid).unwrap().value, 45.0);

    // The monitor reports a new sample.
    publisher.update_reading(
        0,
        &reading(0, 10, SensorType::Temperature, "CPU Package", 47.0),
    );

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        let rec = engine.sensor(uid).unwrap();
        if rec.value == 47.0 {
            assert_eq!(rec.value_prev, 45.0);
            assert_eq!(rec.index_order, 0, "order survives updates");
            break;
        }
        assert!(std::time::Instant::now() < deadline, "re-poll never landed");
        std::thread::sleep(Duration::from_millis(10));
    }

    // Same count: updates never create entries.
    assert_eq!(engine.sensor_count(), 3);

    engine.stop();
}

#[test]
fn test_stop_prevents_further_upserts_and_is_idempotent() {
    let publisher = standard_export("stop");
    let engine = Engine::launch(publisher.config()).expect("launch");
    assert!(engine.is_running());

    engine.stop();
    assert!(!engine.is_running());
    engine.stop(); // no-op, not an error

    let uid = compose_uid(10, 0).unwrap();
    let before = engine.sensor(uid).unwrap().value;
    publisher.update_reading(
        0,
        &reading(0, 10, SensorType::Temperature, "CPU Package", 99.0),
    );
    std::thread::sleep(Duration::from_millis(120));
    assert_eq!(
        engine.sensor(uid).unwrap().value,
        before,
        "no polls after stop"
    );
}

#[test]
fn test_interval_rejection_keeps_prior_cadence() {
    let publisher = standard_export("interval");
    let mut config = publisher.config();
    config.poll_interval_ms = 1_000;
    let engine = Engine::launch(config).expect("launch");

    assert!(!engine.set_poll_interval(10));
    assert_eq!(engine.poll_interval_ms(), 1_000);

    assert!(!engine.set_poll_interval(60_001));
    assert_eq!(engine.poll_interval_ms(), 1_000);

    assert!(engine.set_poll_interval(20));
    assert_eq!(engine.poll_interval_ms(), 20);

    engine.stop();
}

#[test]
fn test_ordered_view_matches_table_scan_order() {
    let publisher = standard_export("ordered");
    let engine = Engine::launch(publisher.config()).expect("launch");

    let ordered = engine.ordered();
    assert_eq!(ordered.len(), 3);
    let orders: Vec<u32> = ordered.iter().map(|r| r.index_order).collect();
    assert_eq!(orders, vec![0, 1, 2]);

    // Permutation of the unordered snapshot.
    let unordered: HashSet<u64> = engine.sensors().iter().map(|r| r.uid).collect();
    let sorted: HashSet<u64> = ordered.iter().map(|r| r.uid).collect();
    assert_eq!(unordered, sorted);

    // Full and mini agree on identities.
    let mini: HashSet<u64> = engine.sensors_mini().iter().map(|r| r.uid).collect();
    assert_eq!(unordered, mini);

    engine.stop();
}

#[test]
fn test_relevant_view_filters_allow_list() {
    let publisher = standard_export("relevant");
    let engine = Engine::launch(publisher.config()).expect("launch");

    let relevant = engine.relevant();
    let names: Vec<&str> = relevant.iter().map(|r| r.name_default.as_str()).collect();
    // The clock reading's default name is not on the allow-list.
    assert_eq!(names, vec!["CPU Package", "GPU Temperature"]);

    // Rewritten custom names carry the category index.
    assert_eq!(relevant[0].name_custom, "CPUPackage0");
    assert_eq!(relevant[1].name_custom, "GPUTemperature1");

    engine.stop();
}

#[test]
fn test_json_shapes_round_trip() {
    let publisher = standard_export("json");
    let engine = Engine::launch(publisher.config()).expect("launch");

    let list: serde_json::Value =
        serde_json::from_str(&engine.to_json(true).expect("ordered json")).unwrap();
    assert_eq!(list.as_array().unwrap().len(), 3);

    let map: serde_json::Value =
        serde_json::from_str(&engine.to_json(false).expect("map json")).unwrap();
    let uid = compose_uid(10, 0).unwrap().to_string();
    assert_eq!(map[&uid]["value"], 45.0);

    let mini: serde_json::Value =
        serde_json::from_str(&engine.to_json_mini(true).expect("mini json")).unwrap();
    let first = &mini.as_array().unwrap()[0];
    assert!(first.get("index_order").is_none());
    assert!(first.get("value_prev").is_some());

    engine.stop();
}

#[test]
fn test_monitor_death_keeps_last_known_values() {
    let publisher = standard_export("death");
    let engine = Engine::launch(publisher.config()).expect("launch");
    let failed_before = engine.stats().polls_failed;

    // Monitor exits: the object disappears but the mapping survives, so
    // later polls keep decoding the frozen snapshot. Either way readers
    // keep the last-known-good values.
    drop(publisher);
    std::thread::sleep(Duration::from_millis(120));

    assert_eq!(engine.sensor_count(), 3);
    let uid = compose_uid(10, 0).unwrap();
    assert_eq!(engine.sensor(uid).unwrap().value, 45.0);
    let _ = failed_before; // failure count depends on unmap timing

    engine.stop();
}

#[test]
fn test_two_sessions_coexist() {
    let a = standard_export("multi_a");
    let b = Publisher::publish(
        "multi_b",
        &[category(0xF300, 0, "Board")],
        &[reading(0, 77, SensorType::Voltage, "Vcore", 1.25)],
    );

    let engine_a = Engine::launch(a.config()).expect("launch a");
    let engine_b = Engine::launch(b.config()).expect("launch b");

    assert_eq!(engine_a.sensor_count(), 3);
    assert_eq!(engine_b.sensor_count(), 1);

    // Independent order counters per session.
    let rec = engine_b.sensor(compose_uid(77, 0).unwrap()).unwrap();
    assert_eq!(rec.index_order, 0);

    engine_a.stop();
    engine_b.stop();
}

#[test]
fn test_launch_fatal_paths_leave_no_engine() {
    // Absent segment.
    let mut config = EngineConfig::for_segment("/hwsense_e2e_absent_zzz");
    config.require_monitor = false;
    assert!(matches!(Engine::launch(config), Err(Error::Attach(_))));

    // Corrupt superblock.
    let publisher = standard_export("badsig");
    publisher.region.write_bytes(0, &[0u8; 4]).expect("corrupt");
    let err = Engine::launch(publisher.config()).unwrap_err();
    assert!(matches!(err, Error::Catalog(_)));
}
