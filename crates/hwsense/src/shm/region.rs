// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! POSIX shared-memory region accessor.
//!
//! Wraps `shm_open` + `mmap` for the sensor export object. The engine
//! path is [`SensorRegion::open`], which maps the existing object
//! read-only at whatever size the publisher gave it; the mapping is
//! released on drop. [`SensorRegion::create`] exists for fixtures and
//! demo publishers only; the engine never writes to the export.
//!
//! All data access goes through bounds-checked copy operations; the raw
//! pointer never leaves this module.

use super::{DecodeError, DecodeResult, Result, ShmError};
use std::ffi::CString;
use std::io;
use std::ptr;

/// Mapped shared-memory region.
///
/// Automatically unmaps on drop. Does NOT unlink the object (the
/// publisher owns the name).
pub struct SensorRegion {
    /// Pointer to mapped memory
    ptr: *mut u8,
    /// Size of the mapping
    len: usize,
    /// Object name (diagnostics, unlink by creator)
    name: String,
    /// Whether the mapping was created writable (fixture path)
    writable: bool,
}

// SAFETY: the mapping is shared with the publishing process, which only
// ever appends whole-table rewrites; all access from this side is via
// bounded byte copies, and torn values are tolerated by the decode layer
// (a failing poll retries). The pointer itself is valid for the struct's
// lifetime and freed exactly once in Drop.
unsafe impl Send for SensorRegion {}
unsafe impl Sync for SensorRegion {}

impl SensorRegion {
    /// Map an existing object read-only, sized by `fstat`.
    ///
    /// # Errors
    ///
    /// `ShmError::NotFound` when the object does not exist (monitor not
    /// running); other variants for open/map failures.
    pub fn open(name: &str) -> Result<Self> {
        Self::validate_name(name)?;

        let c_name = CString::new(name).map_err(|_| ShmError::InvalidName(name.to_string()))?;

        // SAFETY:
        // - c_name is a valid NUL-terminated CString created above
        // - O_RDONLY without O_CREAT never creates; mode is ignored
        // - shm_open returns a valid fd on success or -1 on error (checked)
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDONLY, 0) };
        if fd < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::NotFound {
                return Err(ShmError::NotFound(name.to_string()));
            }
            return Err(ShmError::SegmentOpen(err));
        }

        // Publisher controls the size; take it from the object itself.
        // SAFETY:
        // - fd is valid from the successful shm_open above
        // - stat is zero-initialized and fstat fully writes it on success
        let size = unsafe {
            let mut stat: libc::stat = std::mem::zeroed();
            if libc::fstat(fd, &mut stat) < 0 {
                let err = io::Error::last_os_error();
                libc::close(fd);
                return Err(ShmError::SegmentOpen(err));
            }
            stat.st_size as usize
        };

        if size == 0 {
            // SAFETY: fd valid, closed once on this error path
            unsafe { libc::close(fd) };
            return Err(ShmError::SegmentOpen(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "object has zero size",
            )));
        }

        // SAFETY:
        // - null hint lets the kernel choose the address
        // - size comes from fstat on this very object
        // - PROT_READ + MAP_SHARED is a valid read-only shared mapping
        // - fd is valid; offset 0 maps from the start
        // - MAP_FAILED is checked below
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };

        // SAFETY: fd valid; the mapping holds its own reference
        unsafe { libc::close(fd) };

        if ptr == libc::MAP_FAILED {
            return Err(ShmError::Mmap(io::Error::last_os_error()));
        }

        log::debug!("[shm] mapped {name} read-only, {size} bytes");

        Ok(Self {
            ptr: ptr.cast::<u8>(),
            len: size,
            name: name.to_string(),
            writable: false,
        })
    }

    /// Create a zeroed, writable object of `len` bytes.
    ///
    /// Fixture/demo path: integration tests and the demo publisher use
    /// this to stand in for the monitor. An existing object with the
    /// same name is replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if creation or mapping fails.
    pub fn create(name: &str, len: usize) -> Result<Self> {
        Self::validate_name(name)?;

        let c_name = CString::new(name).map_err(|_| ShmError::InvalidName(name.to_string()))?;

        // SAFETY:
        // - c_name is a valid NUL-terminated CString
        // - shm_unlink of a missing name is harmless (errors ignored)
        // - O_CREAT|O_RDWR|O_EXCL with mode 0600 creates a fresh object
        let fd = unsafe {
            libc::shm_unlink(c_name.as_ptr());
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_RDWR | libc::O_EXCL,
                0o600,
            )
        };
        if fd < 0 {
            return Err(ShmError::SegmentCreate(io::Error::last_os_error()));
        }

        // SAFETY: fd valid from shm_open; ftruncate fails gracefully on a
        // bad size and fd is closed once on the error path
        let ret = unsafe { libc::ftruncate(fd, len as libc::off_t) };
        if ret < 0 {
            let err = io::Error::last_os_error();
            // SAFETY: fd still valid, error path, not reused
            unsafe { libc::close(fd) };
            return Err(ShmError::SegmentCreate(err));
        }

        // SAFETY: same contract as in open(), with PROT_WRITE added for
        // the fixture mapping
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };

        // SAFETY: fd valid; the mapping holds its own reference
        unsafe { libc::close(fd) };

        if ptr == libc::MAP_FAILED {
            return Err(ShmError::Mmap(io::Error::last_os_error()));
        }

        // SAFETY: ptr/len describe exactly the fresh writable mapping; no
        // other reference exists yet
        unsafe {
            ptr::write_bytes(ptr.cast::<u8>(), 0, len);
        }

        Ok(Self {
            ptr: ptr.cast::<u8>(),
            len,
            name: name.to_string(),
            writable: true,
        })
    }

    /// Validate the object name follows POSIX rules.
    fn validate_name(name: &str) -> Result<()> {
        if !name.starts_with('/') {
            return Err(ShmError::InvalidName(format!(
                "Object name must start with '/': {name}"
            )));
        }
        if name.len() > 1 && name[1..].contains('/') {
            return Err(ShmError::InvalidName(format!(
                "Object name cannot contain '/' after prefix: {name}"
            )));
        }
        if name.len() > 255 {
            return Err(ShmError::InvalidName(format!(
                "Object name too long (max 255): {name}"
            )));
        }
        Ok(())
    }

    /// Unlink an object by name. Missing objects are not an error.
    pub fn unlink(name: &str) -> Result<()> {
        let c_name = CString::new(name).map_err(|_| ShmError::InvalidName(name.to_string()))?;

        // SAFETY: c_name is a valid NUL-terminated CString; shm_unlink
        // only touches the namespace
        let ret = unsafe { libc::shm_unlink(c_name.as_ptr()) };

        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::NotFound {
                return Err(ShmError::SegmentOpen(err));
            }
        }

        Ok(())
    }

    /// Check whether an object with the given name exists.
    #[must_use]
    pub fn exists(name: &str) -> bool {
        let Ok(c_name) = CString::new(name) else {
            return false;
        };

        // SAFETY: valid CString; O_RDONLY probe, fd closed immediately
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDONLY, 0) };
        if fd >= 0 {
            // SAFETY: fd valid, closed once, not reused
            unsafe { libc::close(fd) };
            true
        } else {
            false
        }
    }

    /// Size of the mapping in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the mapping is empty (never true for a mapped object).
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Object name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Copy `buf.len()` bytes starting at `offset` into `buf`.
    ///
    /// The (offset, len) pair comes from publisher-controlled data and is
    /// checked against the mapping before any access.
    pub fn read_into(&self, offset: u64, buf: &mut [u8]) -> DecodeResult<()> {
        self.check_span(offset, buf.len())?;

        // SAFETY: check_span proved offset + buf.len() <= self.len, so
        // the source range lies inside the mapping; src and dst never
        // overlap (dst is caller-owned heap/stack memory)
        unsafe {
            ptr::copy_nonoverlapping(
                self.ptr.add(offset as usize),
                buf.as_mut_ptr(),
                buf.len(),
            );
        }
        Ok(())
    }

    /// Copy `len` bytes starting at `offset` into a fresh buffer.
    pub fn read_bytes(&self, offset: u64, len: usize) -> DecodeResult<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_into(offset, &mut buf)?;
        Ok(buf)
    }

    /// Write `data` at `offset`. Fixture/demo mappings only.
    ///
    /// # Errors
    ///
    /// `ShmError::ReadOnly` on an engine-side mapping, `OutOfBounds` on a
    /// span outside the region.
    pub fn write_bytes(&self, offset: u64, data: &[u8]) -> Result<()> {
        if !self.writable {
            return Err(ShmError::ReadOnly(self.name.clone()));
        }
        if self.check_span(offset, data.len()).is_err() {
            return Err(ShmError::OutOfBounds {
                offset,
                len: data.len(),
                region: self.len,
            });
        }

        // SAFETY: the span was checked against the mapping, the mapping
        // was created with PROT_WRITE (writable == true), and src is a
        // caller-owned slice disjoint from the mapping
        unsafe {
            ptr::copy_nonoverlapping(data.as_ptr(), self.ptr.add(offset as usize), data.len());
        }
        Ok(())
    }

    /// Bounds-check a publisher-declared span against the mapping.
    fn check_span(&self, offset: u64, len: usize) -> DecodeResult<()> {
        let end = offset.checked_add(len as u64);
        match end {
            Some(end) if end <= self.len as u64 => Ok(()),
            _ => Err(DecodeError::OutOfBounds {
                offset,
                len: len as u64,
                region: self.len,
            }),
        }
    }
}

impl Drop for SensorRegion {
    fn drop(&mut self) {
        // SAFETY: ptr/len come from the successful mmap in open/create
        // and Drop runs exactly once
        unsafe {
            libc::munmap(self.ptr.cast::<libc::c_void>(), self.len);
        }
        // The publisher owns the name; no unlink here.
    }
}
