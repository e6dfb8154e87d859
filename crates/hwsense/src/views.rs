// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Read-only projections over the sensor cache.
//!
//! Every projection snapshots first (cheap `Arc` clones), then sorts,
//! filters or serializes with no cache lock held. Four serialized
//! shapes exist: identity-keyed map or display-ordered list, in full or
//! abridged form.

use crate::cache::{SensorCache, SensorRecord, SensorRecordMini};
use crate::config::RELEVANT_SENSORS;
use std::collections::HashMap;
use std::sync::Arc;

/// All full records in display order (ascending first-seen order).
#[must_use]
pub fn ordered(cache: &SensorCache) -> Vec<Arc<SensorRecord>> {
    let mut list = cache.snapshot();
    list.sort_by_key(|r| r.index_order);
    list
}

/// All abridged records in display order.
#[must_use]
pub fn ordered_mini(cache: &SensorCache) -> Vec<Arc<SensorRecordMini>> {
    let mut list = cache.snapshot_mini();
    list.sort_by_key(|r| r.index_order);
    list
}

/// Default display name with spaces and slashes stripped.
#[must_use]
pub fn sanitized_name(name: &str) -> String {
    name.chars().filter(|c| *c != ' ' && *c != '/').collect()
}

/// The allow-listed subset, in display order.
///
/// Each match is cloned with its custom name rewritten to the sanitized
/// default name plus the reading's category index, which disambiguates
/// several instances of the same named sensor (one per category).
#[must_use]
pub fn relevant(cache: &SensorCache) -> Vec<SensorRecord> {
    let mut list: Vec<SensorRecord> = cache
        .snapshot()
        .into_iter()
        .filter(|r| RELEVANT_SENSORS.contains(&r.name_default.as_str()))
        .map(|r| {
            let mut rewritten = (*r).clone();
            rewritten.name_custom =
                format!("{}{}", sanitized_name(&r.name_default), r.category_index);
            rewritten
        })
        .collect();
    list.sort_by_key(|r| r.index_order);
    list
}

/// JSON of the full records: ordered list or identity-keyed map.
pub fn to_json(cache: &SensorCache, ordered_shape: bool) -> serde_json::Result<String> {
    if ordered_shape {
        let list = ordered(cache);
        let refs: Vec<&SensorRecord> = list.iter().map(|r| &**r).collect();
        serde_json::to_string(&refs)
    } else {
        let map = cache.snapshot_map();
        let refs: HashMap<u64, &SensorRecord> = map.iter().map(|(k, v)| (*k, &**v)).collect();
        serde_json::to_string(&refs)
    }
}

/// JSON of the abridged records: ordered list or identity-keyed map.
pub fn to_json_mini(cache: &SensorCache, ordered_shape: bool) -> serde_json::Result<String> {
    if ordered_shape {
        let list = ordered_mini(cache);
        let refs: Vec<&SensorRecordMini> = list.iter().map(|r| &**r).collect();
        serde_json::to_string(&refs)
    } else {
        let map = cache.snapshot_map_mini();
        let refs: HashMap<u64, &SensorRecordMini> = map.iter().map(|(k, v)| (*k, &**v)).collect();
        serde_json::to_string(&refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Category;
    use crate::identity::compose_uid;
    use crate::shm::{RawReading, SensorType};

    fn parent(index: u32) -> Category {
        Category {
            id: 0xF000 + index,
            instance: 0,
            uid: compose_uid(0xF000 + index, 0).unwrap(),
            name_default: format!("Group [#{index}]"),
            name_custom: String::new(),
        }
    }

    fn reading(category_index: u32, sensor_id: u32, name: &str, value: f64) -> RawReading {
        RawReading {
            kind: SensorType::Usage,
            category_index,
            sensor_id,
            name_default: name.to_string(),
            name_custom: name.to_string(),
            unit: "%".to_string(),
            value,
            value_min: 0.0,
            value_max: 100.0,
            value_avg: value,
        }
    }

    /// Two allow-listed instances of the same sensor plus one filler.
    fn seeded_cache() -> SensorCache {
        let cache = SensorCache::new();
        cache
            .upsert(&reading(0, 30, "Total CPU Usage", 17.5), &parent(0))
            .unwrap();
        cache
            .upsert(&reading(0, 11, "Uninteresting Rail", 1.0), &parent(0))
            .unwrap();
        cache
            .upsert(&reading(1, 30, "Total CPU Usage", 22.5), &parent(1))
            .unwrap();
        cache
    }

    #[test]
    fn test_ordered_is_sorted_permutation_of_cache() {
        let cache = seeded_cache();
        let list = ordered(&cache);

        assert_eq!(list.len(), cache.len());
        let orders: Vec<u32> = list.iter().map(|r| r.index_order).collect();
        assert_eq!(orders, vec![0, 1, 2]);

        let mut uids: Vec<u64> = list.iter().map(|r| r.uid).collect();
        uids.sort_unstable();
        let mut cached: Vec<u64> = cache.snapshot().iter().map(|r| r.uid).collect();
        cached.sort_unstable();
        assert_eq!(uids, cached);
    }

    #[test]
    fn test_ordered_mini_matches_full_ordering() {
        let cache = seeded_cache();
        let full: Vec<u64> = ordered(&cache).iter().map(|r| r.uid).collect();
        let mini: Vec<u64> = ordered_mini(&cache).iter().map(|r| r.uid).collect();
        assert_eq!(full, mini);
    }

    #[test]
    fn test_sanitized_name_strips_spaces_and_slashes() {
        assert_eq!(sanitized_name("Ring/LLC Clock"), "RingLLCClock");
        assert_eq!(sanitized_name("Total CPU Usage"), "TotalCPUUsage");
        assert_eq!(sanitized_name("+12V"), "+12V");
    }

    #[test]
    fn test_relevant_filters_and_disambiguates() {
        let cache = seeded_cache();
        let list = relevant(&cache);

        assert_eq!(list.len(), 2, "only allow-listed default names");
        assert!(list.iter().all(|r| r.name_default == "Total CPU Usage"));

        // Custom names are unique because the category indices differ.
        assert_eq!(list[0].name_custom, "TotalCPUUsage0");
        assert_eq!(list[1].name_custom, "TotalCPUUsage1");

        // Sorted by first-seen order.
        assert!(list[0].index_order < list[1].index_order);
    }

    #[test]
    fn test_relevant_does_not_mutate_cache() {
        let cache = seeded_cache();
        let _ = relevant(&cache);
        let rec = cache.get(compose_uid(30, 0).unwrap()).unwrap();
        assert_eq!(rec.name_custom, "Total CPU Usage");
    }

    #[test]
    fn test_json_map_shape_keys_by_identity() {
        let cache = seeded_cache();
        let text = to_json(&cache, false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        let obj = value.as_object().expect("map shape");
        assert_eq!(obj.len(), 3);
        let uid = compose_uid(30, 0).unwrap().to_string();
        assert_eq!(obj[&uid]["value"], 17.5);
        assert_eq!(obj[&uid]["reading_type"], "Usage");
    }

    #[test]
    fn test_json_list_shape_preserves_display_order() {
        let cache = seeded_cache();
        let text = to_json(&cache, true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        let list = value.as_array().expect("list shape");
        assert_eq!(list.len(), 3);
        let orders: Vec<u64> = list
            .iter()
            .map(|v| v["index_order"].as_u64().unwrap())
            .collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[test]
    fn test_json_mini_omits_internal_fields() {
        let cache = seeded_cache();
        let text = to_json_mini(&cache, true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        let first = &value.as_array().expect("list shape")[0];
        assert!(first.get("index_order").is_none());
        assert!(first.get("reading_type").is_none());
        assert!(first.get("uid").is_some());
        assert!(first.get("value_prev").is_some());
    }

    #[test]
    fn test_json_shapes_on_empty_cache() {
        let cache = SensorCache::new();
        assert_eq!(to_json(&cache, true).unwrap(), "[]");
        assert_eq!(to_json(&cache, false).unwrap(), "{}");
        assert_eq!(to_json_mini(&cache, false).unwrap(), "{}");
    }
}
