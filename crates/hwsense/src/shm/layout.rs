// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed-layout decoding of the export's binary tables.
//!
//! Layouts are packed and little-endian. The element *stride* of each
//! table comes from the superblock, never from Rust struct sizes, so a
//! newer publisher can append fields without breaking older readers.
//! Fixed-width strings are NUL-padded byte windows: decode stops at the
//! first NUL and trims trailing whitespace.
//!
//! Encode counterparts exist for the fixture/demo publisher path.

use super::{DecodeError, DecodeResult, SensorRegion};
use crate::config::{
    CATEGORY_RECORD_MIN, READING_RECORD_MIN, SENSOR_NAME_LEN, SUPERBLOCK_LEN,
    SUPERBLOCK_SIGNATURE, UNIT_NAME_LEN,
};
use serde::Serialize;

// ============================================================================
// Little-endian field access (callers validate record length first)
// ============================================================================

#[inline]
fn u32_le(b: &[u8], o: usize) -> u32 {
    u32::from_le_bytes([b[o], b[o + 1], b[o + 2], b[o + 3]])
}

#[inline]
fn i64_le(b: &[u8], o: usize) -> i64 {
    i64::from_le_bytes([
        b[o],
        b[o + 1],
        b[o + 2],
        b[o + 3],
        b[o + 4],
        b[o + 5],
        b[o + 6],
        b[o + 7],
    ])
}

#[inline]
fn f64_le(b: &[u8], o: usize) -> f64 {
    f64::from_le_bytes([
        b[o],
        b[o + 1],
        b[o + 2],
        b[o + 3],
        b[o + 4],
        b[o + 5],
        b[o + 6],
        b[o + 7],
    ])
}

/// Decode a fixed-width, NUL-padded text window.
fn fixed_str(window: &[u8]) -> String {
    let end = window.iter().position(|&b| b == 0).unwrap_or(window.len());
    String::from_utf8_lossy(&window[..end]).trim_end().to_string()
}

/// Encode text into a fixed-width, NUL-padded window (truncating).
fn put_fixed_str(window: &mut [u8], text: &str) {
    window.fill(0);
    let bytes = text.as_bytes();
    let n = bytes.len().min(window.len());
    window[..n].copy_from_slice(&bytes[..n]);
}

// ============================================================================
// Sensor type tags
// ============================================================================

/// Reading type tag.
///
/// Wire values 0..=8 in table order; anything else maps to `Unknown`
/// rather than failing the poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SensorType {
    None,
    Temperature,
    Voltage,
    Fan,
    Current,
    Power,
    Frequency,
    Usage,
    Other,
    Unknown,
}

impl SensorType {
    /// Map a wire tag to a type, unrecognized tags included.
    #[must_use]
    pub fn from_raw(tag: u32) -> Self {
        match tag {
            0 => Self::None,
            1 => Self::Temperature,
            2 => Self::Voltage,
            3 => Self::Fan,
            4 => Self::Current,
            5 => Self::Power,
            6 => Self::Frequency,
            7 => Self::Usage,
            8 => Self::Other,
            _ => Self::Unknown,
        }
    }

    /// Wire tag for this type (`Unknown` has none; encodes as `u32::MAX`).
    #[must_use]
    pub fn raw_tag(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Temperature => 1,
            Self::Voltage => 2,
            Self::Fan => 3,
            Self::Current => 4,
            Self::Power => 5,
            Self::Frequency => 6,
            Self::Usage => 7,
            Self::Other => 8,
            Self::Unknown => u32::MAX,
        }
    }

    /// Display label, identical to the serialized form.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Temperature => "Temperature",
            Self::Voltage => "Voltage",
            Self::Fan => "Fan",
            Self::Current => "Current",
            Self::Power => "Power",
            Self::Frequency => "Frequency",
            Self::Usage => "Usage",
            Self::Other => "Other",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for SensorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Superblock
// ============================================================================

/// Export superblock: identification plus the two table descriptors.
///
/// Read once per session; every offset/stride/count in it is untrusted
/// input until checked against the mapped region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    pub signature: u32,
    pub version: u32,
    pub revision: u32,
    /// Publisher's last poll, unix seconds.
    pub last_poll_unix: i64,
    pub category_offset: u32,
    pub category_stride: u32,
    pub category_count: u32,
    pub reading_offset: u32,
    pub reading_stride: u32,
    pub reading_count: u32,
}

impl Superblock {
    /// Decode and validate a superblock from raw bytes.
    ///
    /// Validates the signature and, for non-empty tables, that the
    /// declared strides cover the fixed record layouts.
    pub fn decode(buf: &[u8]) -> DecodeResult<Self> {
        if buf.len() < SUPERBLOCK_LEN {
            return Err(DecodeError::Truncated {
                need: SUPERBLOCK_LEN,
                have: buf.len(),
            });
        }

        let sb = Self {
            signature: u32_le(buf, 0),
            version: u32_le(buf, 4),
            revision: u32_le(buf, 8),
            last_poll_unix: i64_le(buf, 12),
            category_offset: u32_le(buf, 20),
            category_stride: u32_le(buf, 24),
            category_count: u32_le(buf, 28),
            reading_offset: u32_le(buf, 32),
            reading_stride: u32_le(buf, 36),
            reading_count: u32_le(buf, 40),
        };

        if sb.signature != SUPERBLOCK_SIGNATURE {
            return Err(DecodeError::BadSignature {
                found: sb.signature,
            });
        }
        if sb.category_count > 0 && (sb.category_stride as usize) < CATEGORY_RECORD_MIN {
            return Err(DecodeError::StrideTooSmall {
                kind: "category",
                stride: sb.category_stride as usize,
                min: CATEGORY_RECORD_MIN,
            });
        }
        if sb.reading_count > 0 && (sb.reading_stride as usize) < READING_RECORD_MIN {
            return Err(DecodeError::StrideTooSmall {
                kind: "reading",
                stride: sb.reading_stride as usize,
                min: READING_RECORD_MIN,
            });
        }

        Ok(sb)
    }

    /// Read and decode the superblock at region offset 0.
    pub fn read(region: &SensorRegion) -> DecodeResult<Self> {
        let buf = region.read_bytes(0, SUPERBLOCK_LEN)?;
        Self::decode(&buf)
    }

    /// `(offset, byte length)` of the category table, overflow-checked.
    pub fn category_span(&self) -> DecodeResult<(u64, usize)> {
        Self::span("category", self.category_offset, self.category_stride, self.category_count)
    }

    /// `(offset, byte length)` of the readings table, overflow-checked.
    pub fn reading_span(&self) -> DecodeResult<(u64, usize)> {
        Self::span("reading", self.reading_offset, self.reading_stride, self.reading_count)
    }

    fn span(kind: &'static str, offset: u32, stride: u32, count: u32) -> DecodeResult<(u64, usize)> {
        let total = u64::from(stride)
            .checked_mul(u64::from(count))
            .ok_or(DecodeError::SpanOverflow { kind })?;
        let len = usize::try_from(total).map_err(|_| DecodeError::SpanOverflow { kind })?;
        Ok((u64::from(offset), len))
    }

    /// Encode for the fixture/demo publisher path.
    #[must_use]
    pub fn encode(&self) -> [u8; SUPERBLOCK_LEN] {
        let mut buf = [0u8; SUPERBLOCK_LEN];
        buf[0..4].copy_from_slice(&self.signature.to_le_bytes());
        buf[4..8].copy_from_slice(&self.version.to_le_bytes());
        buf[8..12].copy_from_slice(&self.revision.to_le_bytes());
        buf[12..20].copy_from_slice(&self.last_poll_unix.to_le_bytes());
        buf[20..24].copy_from_slice(&self.category_offset.to_le_bytes());
        buf[24..28].copy_from_slice(&self.category_stride.to_le_bytes());
        buf[28..32].copy_from_slice(&self.category_count.to_le_bytes());
        buf[32..36].copy_from_slice(&self.reading_offset.to_le_bytes());
        buf[36..40].copy_from_slice(&self.reading_stride.to_le_bytes());
        buf[40..44].copy_from_slice(&self.reading_count.to_le_bytes());
        buf
    }
}

// ============================================================================
// Category records
// ============================================================================

/// One category (source grouping) record, as on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCategory {
    pub id: u32,
    pub instance: u32,
    pub name_default: String,
    pub name_custom: String,
}

impl RawCategory {
    /// Decode one record. `record` must span at least one stride.
    pub fn decode(record: &[u8]) -> DecodeResult<Self> {
        if record.len() < CATEGORY_RECORD_MIN {
            return Err(DecodeError::Truncated {
                need: CATEGORY_RECORD_MIN,
                have: record.len(),
            });
        }
        Ok(Self {
            id: u32_le(record, 0),
            instance: u32_le(record, 4),
            name_default: fixed_str(&record[8..8 + SENSOR_NAME_LEN]),
            name_custom: fixed_str(&record[8 + SENSOR_NAME_LEN..8 + 2 * SENSOR_NAME_LEN]),
        })
    }

    /// Encode zero-padded to `stride` (fixture path).
    #[must_use]
    pub fn encode(&self, stride: usize) -> Vec<u8> {
        let mut buf = vec![0u8; stride.max(CATEGORY_RECORD_MIN)];
        buf[0..4].copy_from_slice(&self.id.to_le_bytes());
        buf[4..8].copy_from_slice(&self.instance.to_le_bytes());
        put_fixed_str(&mut buf[8..8 + SENSOR_NAME_LEN], &self.name_default);
        put_fixed_str(
            &mut buf[8 + SENSOR_NAME_LEN..8 + 2 * SENSOR_NAME_LEN],
            &self.name_custom,
        );
        buf.truncate(stride.max(CATEGORY_RECORD_MIN));
        buf
    }
}

/// Decode a whole category table from its copied-out bytes.
///
/// Zero-count tables decode to an empty vec without failure.
pub fn decode_categories(buf: &[u8], stride: usize, count: usize) -> DecodeResult<Vec<RawCategory>> {
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let start = i * stride;
        let end = start + stride;
        if end > buf.len() {
            return Err(DecodeError::Truncated {
                need: end,
                have: buf.len(),
            });
        }
        out.push(RawCategory::decode(&buf[start..end])?);
    }
    Ok(out)
}

// ============================================================================
// Reading records
// ============================================================================

/// One live reading record, as on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReading {
    pub kind: SensorType,
    /// Index into the category table.
    pub category_index: u32,
    pub sensor_id: u32,
    pub name_default: String,
    pub name_custom: String,
    pub unit: String,
    pub value: f64,
    pub value_min: f64,
    pub value_max: f64,
    pub value_avg: f64,
}

impl RawReading {
    /// Decode one record. `record` must span at least one stride.
    pub fn decode(record: &[u8]) -> DecodeResult<Self> {
        if record.len() < READING_RECORD_MIN {
            return Err(DecodeError::Truncated {
                need: READING_RECORD_MIN,
                have: record.len(),
            });
        }
        let names = 12;
        let unit_off = names + 2 * SENSOR_NAME_LEN;
        let values = unit_off + UNIT_NAME_LEN;
        Ok(Self {
            kind: SensorType::from_raw(u32_le(record, 0)),
            category_index: u32_le(record, 4),
            sensor_id: u32_le(record, 8),
            name_default: fixed_str(&record[names..names + SENSOR_NAME_LEN]),
            name_custom: fixed_str(&record[names + SENSOR_NAME_LEN..names + 2 * SENSOR_NAME_LEN]),
            unit: fixed_str(&record[unit_off..unit_off + UNIT_NAME_LEN]),
            value: f64_le(record, values),
            value_min: f64_le(record, values + 8),
            value_max: f64_le(record, values + 16),
            value_avg: f64_le(record, values + 24),
        })
    }

    /// Encode zero-padded to `stride` (fixture path).
    #[must_use]
    pub fn encode(&self, stride: usize) -> Vec<u8> {
        let mut buf = vec![0u8; stride.max(READING_RECORD_MIN)];
        buf[0..4].copy_from_slice(&self.kind.raw_tag().to_le_bytes());
        buf[4..8].copy_from_slice(&self.category_index.to_le_bytes());
        buf[8..12].copy_from_slice(&self.sensor_id.to_le_bytes());
        let names = 12;
        let unit_off = names + 2 * SENSOR_NAME_LEN;
        let values = unit_off + UNIT_NAME_LEN;
        put_fixed_str(&mut buf[names..names + SENSOR_NAME_LEN], &self.name_default);
        put_fixed_str(
            &mut buf[names + SENSOR_NAME_LEN..names + 2 * SENSOR_NAME_LEN],
            &self.name_custom,
        );
        put_fixed_str(&mut buf[unit_off..unit_off + UNIT_NAME_LEN], &self.unit);
        buf[values..values + 8].copy_from_slice(&self.value.to_le_bytes());
        buf[values + 8..values + 16].copy_from_slice(&self.value_min.to_le_bytes());
        buf[values + 16..values + 24].copy_from_slice(&self.value_max.to_le_bytes());
        buf[values + 24..values + 32].copy_from_slice(&self.value_avg.to_le_bytes());
        buf.truncate(stride.max(READING_RECORD_MIN));
        buf
    }
}

/// Decode the reading at `index` out of a copied table buffer.
pub fn reading_at(buf: &[u8], stride: usize, index: usize) -> DecodeResult<RawReading> {
    let start = index * stride;
    let end = start + stride;
    if end > buf.len() {
        return Err(DecodeError::Truncated {
            need: end,
            have: buf.len(),
        });
    }
    RawReading::decode(&buf[start..end])
}
