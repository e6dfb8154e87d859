// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared-memory attach and binary decode for the sensor export.
//!
//! The monitor process publishes one POSIX shared-memory object holding a
//! superblock, a category table and a readings table:
//!
//! ```text
//! +-----------------------------------------------------------+
//! | Superblock (44 B)                                         |
//! |   signature / version / revision / last-poll timestamp    |
//! |   (offset, stride, count) for each table                  |
//! +-----------------------------------------------------------+
//! | Category table:  count x stride, stride >= 264 B          |
//! +-----------------------------------------------------------+
//! | Readings table:  count x stride, stride >= 316 B          |
//! +-----------------------------------------------------------+
//! ```
//!
//! The engine maps the object read-only and treats every offset and size
//! in it as untrusted: all reads are bounds-checked against the mapping,
//! and a bad combination fails that decode call, never the process.

mod layout;
mod region;

pub use layout::{decode_categories, reading_at, RawCategory, RawReading, SensorType, Superblock};
pub use region::SensorRegion;

use std::fmt;
use std::io;

/// Errors raised while attaching to or writing a shared-memory object.
#[derive(Debug)]
pub enum ShmError {
    /// Named object does not exist (monitor not running or not exporting).
    NotFound(String),

    /// `shm_open` failed for a reason other than absence.
    SegmentOpen(io::Error),

    /// Segment creation failed (fixture/demo path).
    SegmentCreate(io::Error),

    /// Memory mapping failed.
    Mmap(io::Error),

    /// Object name violates POSIX naming rules.
    InvalidName(String),

    /// Write attempted on a read-only mapping.
    ReadOnly(String),

    /// Write outside the mapped region (fixture bug, not decoder input).
    OutOfBounds {
        offset: u64,
        len: usize,
        region: usize,
    },
}

impl fmt::Display for ShmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(name) => write!(f, "Shared memory object not found: {name}"),
            Self::SegmentOpen(e) => write!(f, "Shared memory open failed: {e}"),
            Self::SegmentCreate(e) => write!(f, "Shared memory creation failed: {e}"),
            Self::Mmap(e) => write!(f, "Memory mapping failed: {e}"),
            Self::InvalidName(name) => write!(f, "Invalid object name: {name}"),
            Self::ReadOnly(name) => write!(f, "Mapping is read-only: {name}"),
            Self::OutOfBounds {
                offset,
                len,
                region,
            } => write!(
                f,
                "Write of {len} bytes at offset {offset} exceeds region of {region} bytes"
            ),
        }
    }
}

impl std::error::Error for ShmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SegmentOpen(e) | Self::SegmentCreate(e) | Self::Mmap(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type for attach/write operations.
pub type Result<T> = std::result::Result<T, ShmError>;

/// Errors raised while decoding the export's binary tables.
///
/// All variants are recoverable at the poll level: the failing call's
/// results are discarded and the next scheduled poll retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Buffer shorter than the structure being decoded.
    Truncated { need: usize, have: usize },

    /// Superblock signature does not identify a sensor export.
    BadSignature { found: u32 },

    /// A declared (offset, size) span falls outside the mapped region.
    OutOfBounds {
        offset: u64,
        len: u64,
        region: usize,
    },

    /// Declared element stride smaller than the fixed record layout.
    StrideTooSmall {
        kind: &'static str,
        stride: usize,
        min: usize,
    },

    /// Table span arithmetic overflowed (count x stride past u64).
    SpanOverflow { kind: &'static str },

    /// Composite identity of a pair does not fit in 64 bits.
    IdentityOverflow { outer: u32, inner: u32 },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { need, have } => {
                write!(f, "Truncated structure: need {need} bytes, have {have}")
            }
            Self::BadSignature { found } => {
                write!(f, "Bad superblock signature: {found:#010x}")
            }
            Self::OutOfBounds {
                offset,
                len,
                region,
            } => write!(
                f,
                "Declared span of {len} bytes at offset {offset} exceeds region of {region} bytes"
            ),
            Self::StrideTooSmall { kind, stride, min } => {
                write!(f, "{kind} stride {stride} below fixed layout minimum {min}")
            }
            Self::SpanOverflow { kind } => write!(f, "{kind} table span overflows"),
            Self::IdentityOverflow { outer, inner } => {
                write!(f, "Identity of pair ({outer}, {inner}) overflows 64 bits")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Result type for decode operations.
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;
