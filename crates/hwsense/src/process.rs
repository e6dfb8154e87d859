// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pre-flight liveness gate for the monitor process.
//!
//! Scans `/proc/<pid>/comm` for a process whose name matches one of the
//! configured monitor names, case-insensitively as a substring (so the
//! bare stem covers 32/64-bit build suffixes). Used only before attach;
//! once a session runs, the monitor exiting just makes later polls fail
//! recoverably.

use std::fs;
use std::path::Path;

/// Check whether any running process matches one of `names`.
#[must_use]
pub fn monitor_running(names: &[String]) -> bool {
    scan_proc(Path::new("/proc"), names)
}

fn scan_proc(proc_root: &Path, names: &[String]) -> bool {
    let Ok(entries) = fs::read_dir(proc_root) else {
        return false;
    };

    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(pid) = file_name.to_str() else {
            continue;
        };
        if !pid.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }

        let Ok(comm) = fs::read_to_string(entry.path().join("comm")) else {
            continue; // process vanished mid-scan
        };
        if comm_matches(comm.trim(), names) {
            log::debug!("[process] monitor match: pid {pid} comm {}", comm.trim());
            return true;
        }
    }

    false
}

/// Case-insensitive substring match of a `comm` name against the set.
fn comm_matches(comm: &str, names: &[String]) -> bool {
    let comm = comm.to_ascii_lowercase();
    names
        .iter()
        .any(|name| !name.is_empty() && comm.contains(&name.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_comm_match_case_insensitive() {
        let set = names(&["hwinfo32", "hwinfo64", "hwinfo"]);
        assert!(comm_matches("HWiNFO64", &set));
        assert!(comm_matches("hwinfo32", &set));
        assert!(comm_matches("hwinfo", &set));
        assert!(!comm_matches("htop", &set));
    }

    #[test]
    fn test_stem_covers_suffixed_variants() {
        let set = names(&["hwinfo"]);
        assert!(comm_matches("hwinfo64", &set));
        assert!(comm_matches("HWINFO32", &set));
    }

    #[test]
    fn test_empty_name_never_matches() {
        assert!(!comm_matches("anything", &names(&[""])));
        assert!(!comm_matches("anything", &[]));
    }

    #[test]
    fn test_scan_finds_own_test_runner() {
        // The test binary itself is in /proc; match on a stem of its comm.
        let comm = fs::read_to_string("/proc/self/comm").expect("/proc available");
        let stem: String = comm.trim().chars().take(4).collect();
        assert!(scan_proc(Path::new("/proc"), &names(&[&stem])));
    }

    #[test]
    fn test_scan_fake_proc_tree() {
        // Deterministic scan against a synthetic /proc layout.
        let root = tempfile::tempdir().expect("tempdir");
        fs::create_dir(root.path().join("4242")).unwrap();
        fs::write(root.path().join("4242/comm"), "HWiNFO64\n").unwrap();
        fs::create_dir(root.path().join("17")).unwrap();
        fs::write(root.path().join("17/comm"), "init\n").unwrap();
        // Non-numeric entries are skipped, comm or not.
        fs::create_dir(root.path().join("sys")).unwrap();

        assert!(scan_proc(root.path(), &names(&["hwinfo"])));
        assert!(!scan_proc(root.path(), &names(&["hwmonitor"])));
    }

    #[test]
    fn test_scan_misses_absent_process() {
        assert!(!monitor_running(&names(&["hwsense_definitely_absent_zzz"])));
    }

    #[test]
    fn test_scan_of_missing_root_is_false() {
        assert!(!scan_proc(Path::new("/hwsense_no_such_dir"), &names(&["x"])));
    }
}
