// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Concurrent sensor record store.
//!
//! The cache is keyed by synthesized identity and holds two views of
//! every sensor: the full record and an abridged one for low-overhead
//! consumers. Records are created once, on first sighting of an
//! identity, and updated in place on every later poll; they are never
//! deleted while the session lives (a sensor the monitor stops
//! reporting keeps its last known values).
//!
//! # Invariants
//!
//! - First-seen order is a gap-free, strictly increasing sequence,
//!   claimed exactly once per identity under the map's entry guard.
//! - Updates replace the whole record (`Arc` swap): a concurrent reader
//!   sees either the complete old record or the complete new one.
//! - `value_prev` always equals the record's `value` from immediately
//!   before the last update; on creation both equal the first sample.
//! - Full and mini maps always contain the same key set; mini writes
//!   happen under the full map's entry guard.

use crate::identity::compose_uid;
use crate::shm::{DecodeError, DecodeResult, RawCategory, RawReading, SensorType};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// A category resolved at session start: wire fields plus identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: u32,
    pub instance: u32,
    pub uid: u64,
    pub name_default: String,
    pub name_custom: String,
}

impl Category {
    /// Resolve a wire category into its cached form.
    ///
    /// Fails only when the `(id, instance)` identity overflows, which is
    /// a launch-fatal catalog defect rather than a per-poll anomaly.
    pub fn resolve(raw: &RawCategory) -> DecodeResult<Self> {
        let uid = compose_uid(raw.id, raw.instance).ok_or(DecodeError::IdentityOverflow {
            outer: raw.id,
            inner: raw.instance,
        })?;
        Ok(Self {
            id: raw.id,
            instance: raw.instance,
            uid,
            name_default: raw.name_default.clone(),
            name_custom: raw.name_custom.clone(),
        })
    }
}

/// Full sensor record: reading fields, history, resolved category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorRecord {
    pub reading_type: SensorType,
    /// Index into the category table, part of the identity.
    pub category_index: u32,
    pub sensor_id: u32,
    pub uid: u64,
    pub name_default: String,
    pub name_custom: String,
    pub unit: String,
    pub value: f64,
    pub value_min: f64,
    pub value_max: f64,
    pub value_avg: f64,
    /// `value` as of the previous poll; equals `value` on first sighting.
    pub value_prev: f64,
    pub parent_name_default: String,
    pub parent_name_custom: String,
    pub parent_id: u32,
    pub parent_instance: u32,
    pub parent_uid: u64,
    /// Position in first-seen order, fixed at creation.
    pub index_order: u32,
}

/// Abridged sensor record for low-overhead consumers.
///
/// Strict subset of [`SensorRecord`]; the two maps always agree on key
/// set and on `value`/`value_prev`. The ordering/type fields exist for
/// in-process sorting and filtering but stay out of the serialized form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorRecordMini {
    pub uid: u64,
    pub name_custom: String,
    pub unit: String,
    pub value_prev: f64,
    pub value: f64,
    #[serde(skip)]
    pub index_order: u32,
    #[serde(skip)]
    pub reading_type: SensorType,
}

impl SensorRecordMini {
    fn project(full: &SensorRecord) -> Self {
        Self {
            uid: full.uid,
            name_custom: full.name_custom.clone(),
            unit: full.unit.clone(),
            value_prev: full.value_prev,
            value: full.value,
            index_order: full.index_order,
            reading_type: full.reading_type,
        }
    }
}

/// Concurrent, identity-keyed store of full + abridged sensor records.
pub struct SensorCache {
    full: DashMap<u64, Arc<SensorRecord>>,
    mini: DashMap<u64, Arc<SensorRecordMini>>,
    /// Next first-seen order value, shared across all identities.
    order: AtomicU32,
}

impl SensorCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            full: DashMap::new(),
            mini: DashMap::new(),
            order: AtomicU32::new(0),
        }
    }

    /// Insert or update the record for one decoded reading.
    ///
    /// Absent identity: claims the next first-seen order and inserts the
    /// full and mini records with `value_prev == value`. Present: swaps
    /// in a rebuilt record with `value_prev := old value` and the fresh
    /// value/min/max/avg; names, category fields and order are fixed at
    /// creation and never refreshed.
    ///
    /// Fails only on identity overflow; the caller skips that record.
    pub fn upsert(&self, reading: &RawReading, parent: &Category) -> DecodeResult<()> {
        let uid = compose_uid(reading.sensor_id, reading.category_index).ok_or(
            DecodeError::IdentityOverflow {
                outer: reading.sensor_id,
                inner: reading.category_index,
            },
        )?;

        // The entry guard serializes all writers of this identity: the
        // vacant arm runs at most once per uid, and mini stays in
        // lockstep because its writes happen before the guard drops.
        match self.full.entry(uid) {
            Entry::Occupied(mut slot) => {
                let prev = Arc::clone(slot.get());
                let mut next = (*prev).clone();
                next.value_prev = prev.value;
                next.value = reading.value;
                next.value_min = reading.value_min;
                next.value_max = reading.value_max;
                next.value_avg = reading.value_avg;
                let next = Arc::new(next);
                self.mini.insert(uid, Arc::new(SensorRecordMini::project(&next)));
                slot.insert(next);
            }
            Entry::Vacant(slot) => {
                let order = self.order.fetch_add(1, Ordering::Relaxed);
                let full = Arc::new(SensorRecord {
                    reading_type: reading.kind,
                    category_index: reading.category_index,
                    sensor_id: reading.sensor_id,
                    uid,
                    name_default: reading.name_default.clone(),
                    name_custom: reading.name_custom.clone(),
                    unit: reading.unit.clone(),
                    value: reading.value,
                    value_min: reading.value_min,
                    value_max: reading.value_max,
                    value_avg: reading.value_avg,
                    value_prev: reading.value,
                    parent_name_default: parent.name_default.clone(),
                    parent_name_custom: parent.name_custom.clone(),
                    parent_id: parent.id,
                    parent_instance: parent.instance,
                    parent_uid: parent.uid,
                    index_order: order,
                });
                self.mini.insert(uid, Arc::new(SensorRecordMini::project(&full)));
                slot.insert(full);
            }
        }
        Ok(())
    }

    /// Look up one full record.
    #[must_use]
    pub fn get(&self, uid: u64) -> Option<Arc<SensorRecord>> {
        self.full.get(&uid).map(|r| Arc::clone(r.value()))
    }

    /// Look up one abridged record.
    #[must_use]
    pub fn get_mini(&self, uid: u64) -> Option<Arc<SensorRecordMini>> {
        self.mini.get(&uid).map(|r| Arc::clone(r.value()))
    }

    /// Number of distinct identities seen this session.
    #[must_use]
    pub fn len(&self) -> usize {
        self.full.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.full.is_empty()
    }

    /// Snapshot of all full records, unordered.
    ///
    /// Safe concurrently with upserts; each element is a committed
    /// record (shard locks are held per element, never across the scan).
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<SensorRecord>> {
        self.full.iter().map(|r| Arc::clone(r.value())).collect()
    }

    /// Snapshot of all abridged records, unordered.
    #[must_use]
    pub fn snapshot_mini(&self) -> Vec<Arc<SensorRecordMini>> {
        self.mini.iter().map(|r| Arc::clone(r.value())).collect()
    }

    /// Identity-keyed snapshot of the full records.
    #[must_use]
    pub fn snapshot_map(&self) -> HashMap<u64, Arc<SensorRecord>> {
        self.full
            .iter()
            .map(|r| (*r.key(), Arc::clone(r.value())))
            .collect()
    }

    /// Identity-keyed snapshot of the abridged records.
    #[must_use]
    pub fn snapshot_map_mini(&self) -> HashMap<u64, Arc<SensorRecordMini>> {
        self.mini
            .iter()
            .map(|r| (*r.key(), Arc::clone(r.value())))
            .collect()
    }
}

impl Default for SensorCache {
    fn default() -> Self {
        Self::new()
    }
}
