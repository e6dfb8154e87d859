// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! OS scheduling shims for the poll thread.
//!
//! High-precision mode narrows the kernel's timer slack for the calling
//! thread so the interval sleep wakes close to the requested instant;
//! begin/end form an idempotent-safe pair and the setting dies with the
//! thread, so an abrupt exit can never leak it to other threads.
//! High-priority mode lowers the thread's niceness. Both are best
//! effort: failure is logged, never fatal.

/// Kernel default timer slack, nanoseconds.
#[cfg(target_os = "linux")]
const DEFAULT_TIMER_SLACK_NS: libc::c_ulong = 50_000;

/// Niceness applied to the poll thread in high-priority mode.
#[cfg(target_os = "linux")]
const POLL_THREAD_NICE: libc::c_int = -10;

/// Request high-resolution interval timing for the calling thread.
#[cfg(target_os = "linux")]
pub(crate) fn begin_high_resolution() {
    // SAFETY: PR_SET_TIMERSLACK only affects the calling thread's timer
    // slack; an invalid value is rejected with -1, nothing is read.
    let ret = unsafe { libc::prctl(libc::PR_SET_TIMERSLACK, 1 as libc::c_ulong) };
    if ret != 0 {
        log::warn!(
            "[priority] timer slack request failed: {}",
            std::io::Error::last_os_error()
        );
    } else {
        log::debug!("[priority] timer slack narrowed to 1ns");
    }
}

/// Release the high-resolution request (restore the kernel default).
#[cfg(target_os = "linux")]
pub(crate) fn end_high_resolution() {
    // SAFETY: same contract as in begin_high_resolution
    let ret = unsafe { libc::prctl(libc::PR_SET_TIMERSLACK, DEFAULT_TIMER_SLACK_NS) };
    if ret != 0 {
        log::warn!(
            "[priority] timer slack restore failed: {}",
            std::io::Error::last_os_error()
        );
    }
}

/// Raise the calling thread's scheduling priority.
#[cfg(target_os = "linux")]
pub(crate) fn raise_thread_priority() {
    // SAFETY: gettid cannot fail; setpriority on the calling thread's
    // tid only adjusts niceness and reports EPERM for unprivileged
    // callers, handled below.
    let ret = unsafe {
        let tid = libc::gettid();
        libc::setpriority(libc::PRIO_PROCESS as _, tid as libc::id_t, POLL_THREAD_NICE)
    };
    if ret != 0 {
        // Unprivileged processes cannot lower niceness; run at default.
        log::warn!(
            "[priority] thread priority raise failed: {}",
            std::io::Error::last_os_error()
        );
    } else {
        log::debug!("[priority] poll thread niceness set to {POLL_THREAD_NICE}");
    }
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn begin_high_resolution() {
    log::debug!("[priority] high-resolution timing not available on this platform");
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn end_high_resolution() {}

#[cfg(not(target_os = "linux"))]
pub(crate) fn raise_thread_priority() {
    log::debug!("[priority] thread priority raise not available on this platform");
}
