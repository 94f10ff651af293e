// Copyright 2024 RustFS Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Object locator: the oid -> path happy path, stale-epoch lookup, and
//! the cross-disk scan-and-move fallback for objects a ring rebuild
//! left behind. See spec.md §4.5-§4.6, grounded on `sheep/md.c`'s
//! `scan_wd`, `check_and_move`, `md_exist`, and `md_get_stale_path`.

use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};

use super::multi_disk::{path_for, MultiDisk};
use super::ring;

const OID_HEX_LEN: usize = 16;
const TMP_SUFFIX: &str = ".tmp";
const TMP_NAME_LEN: usize = OID_HEX_LEN + 4;

fn object_name(oid: u64) -> String {
    format!("{oid:016x}")
}

fn stale_name(oid: u64, epoch: u64) -> String {
    format!("{oid:016x}.{epoch}")
}

impl MultiDisk {
    /// The disk root the ring currently assigns `oid` to, or the
    /// single configured object path when multi-disk support isn't
    /// enabled (spec.md §4.5).
    fn ring_disk_root(&self, oid: u64) -> PathBuf {
        if self.is_multi_disk() {
            let root = self.with_state_read(|disks, ring| {
                ring::lookup(ring, oid)
                    .and_then(|vd| path_for(disks, vd))
                    .map(Path::to_path_buf)
            });
            if let Some(root) = root {
                return root;
            }
        }
        self.object_path().to_path_buf()
    }

    /// `oid -> path`, per the ring's current choice. Does not touch
    /// the filesystem: a path here need not exist yet (spec.md §4.5).
    pub fn get_object_path(&self, oid: u64) -> PathBuf {
        self.ring_disk_root(oid).join(object_name(oid))
    }

    /// Whether `oid` is present at its ring-assigned path, falling
    /// back to a cross-disk scan-and-move (spec.md §4.5-§4.6) for
    /// objects a ring rebuild relocated but that haven't been migrated
    /// yet.
    pub fn exists(&self, oid: u64) -> bool {
        let path = self.get_object_path(oid);
        if path.is_file() {
            return true;
        }
        self.scan_and_relocate(oid).is_some()
    }

    /// `.stale/<oid>.<epoch>` under the ring's current disk for `oid`,
    /// falling back to a cross-disk scan-and-move over every disk's
    /// `.stale/` directory. `epoch` must be non-zero (spec.md §4.5).
    pub fn get_stale_path(&self, oid: u64, epoch: u64) -> Result<PathBuf> {
        if epoch == 0 {
            return Err(StoreError::BadEpoch);
        }

        let candidate = self.ring_disk_root(oid).join(".stale").join(stale_name(oid, epoch));
        if candidate.is_file() {
            return Ok(candidate);
        }
        self.scan_stale_and_relocate(oid, epoch)
            .ok_or(StoreError::NoObject)
    }

    /// Linear sweep over every disk's root per spec.md §4.6: the first
    /// disk holding `oid` at its old location gets renamed onto the
    /// ring's current choice, and the sweep stops. `None` if no disk
    /// has it.
    fn scan_and_relocate(&self, oid: u64) -> Option<PathBuf> {
        let target = self.get_object_path(oid);
        self.with_state_read(|disks, _ring| {
            for disk in disks {
                let old = disk.path.join(object_name(oid));
                if old == target {
                    continue;
                }
                if old.is_file() && std::fs::rename(&old, &target).is_ok() {
                    return Some(target.clone());
                }
            }
            None
        })
    }

    /// Same sweep as `scan_and_relocate`, but over each disk's
    /// `.stale/<oid>.<epoch>` entry instead of its live object.
    fn scan_stale_and_relocate(&self, oid: u64, epoch: u64) -> Option<PathBuf> {
        let target = self.ring_disk_root(oid).join(".stale").join(stale_name(oid, epoch));
        self.with_state_read(|disks, _ring| {
            for disk in disks {
                let old = disk.path.join(".stale").join(stale_name(oid, epoch));
                if old == target {
                    continue;
                }
                if old.is_file() && std::fs::rename(&old, &target).is_ok() {
                    return Some(target.clone());
                }
            }
            None
        })
    }

    /// Runs the temp-file cleanup enumerator (see `enumerate_objects`)
    /// against every registered disk's root and returns how many
    /// `.tmp` leftovers were unlinked.
    pub fn cleanup_temp_files(&self) -> io::Result<usize> {
        let roots: Vec<PathBuf> = self.with_state_read(|disks, _ring| {
            disks.iter().map(|d| d.path.clone()).collect()
        });

        let mut removed = 0;
        for root in roots {
            removed += enumerate_objects(&root, true)?.removed_tmp;
        }
        Ok(removed)
    }
}

/// Result of sweeping one directory of object files: the live oids
/// found, plus how many `.tmp` leftovers were unlinked (only nonzero
/// when `cleanup` was requested).
pub struct Listing {
    pub oids: Vec<u64>,
    pub removed_tmp: usize,
}

/// A 16-hex-digit filename that parses to `0` or `u64::MAX` is a
/// sentinel, not a real oid (`sheep/md.c`'s `scan_wd` rejects both the
/// same way: `if (oid == 0 || oid == ULLONG_MAX) continue;`).
fn is_sentinel_oid(oid: u64) -> bool {
    oid == 0 || oid == u64::MAX
}

/// Per-path object enumerator, per spec.md §4.6. Recognizes exactly
/// 16-hex-digit object filenames, excluding the `0`/`u64::MAX`
/// sentinels; filenames of exactly 20 characters ending in `.tmp` are
/// in-progress writes — unlinked when `cleanup` is true, otherwise
/// left alone. Anything else (hidden entries, non-hex names, wrong
/// lengths) is skipped without error.
pub fn enumerate_objects(dir: &Path, cleanup: bool) -> io::Result<Listing> {
    let mut oids = Vec::new();
    let mut removed_tmp = 0;

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Ok(Listing { oids, removed_tmp })
        }
        Err(err) => return Err(err),
    };

    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };

        if name.starts_with('.') {
            continue;
        }

        if name.len() == TMP_NAME_LEN && name.ends_with(TMP_SUFFIX) {
            if cleanup {
                if std::fs::remove_file(entry.path()).is_ok() {
                    removed_tmp += 1;
                }
            }
            continue;
        }

        if name.len() != OID_HEX_LEN {
            continue;
        }
        if let Ok(oid) = u64::from_str_radix(name, 16) {
            if !is_sentinel_oid(oid) {
                oids.push(oid);
            }
        }
    }

    Ok(Listing { oids, removed_tmp })
}

/// Total bytes occupied by live object files directly under `dir`
/// (the same 16-hex-digit, non-sentinel names `enumerate_objects`
/// recognizes). Used by `MultiDisk::info()` for `DiskSummary::used_bytes`.
/// An unreadable directory counts as zero rather than failing the
/// whole `info()` call for every other disk.
pub(crate) fn used_bytes(dir: &Path) -> u64 {
    let listing = match enumerate_objects(dir, false) {
        Ok(listing) => listing,
        Err(_) => return 0,
    };
    listing
        .oids
        .iter()
        .map(|oid| {
            dir.join(object_name(*oid))
                .metadata()
                .map(|m| m.len())
                .unwrap_or(0)
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    use crate::disk::multi_disk::LoggingRecoveryTrigger;

    fn md_with_one_disk(dir: &Path) -> MultiDisk {
        let md = MultiDisk::new(dir.to_path_buf(), Arc::new(LoggingRecoveryTrigger));
        md.add(dir).unwrap();
        md.reinit();
        md
    }

    #[test]
    fn missing_object_does_not_exist() {
        let dir = tempdir().unwrap();
        let md = md_with_one_disk(dir.path());
        assert!(!md.exists(42));
    }

    #[test]
    fn object_at_ring_placement_is_found_without_a_scan() {
        let dir = tempdir().unwrap();
        let md = md_with_one_disk(dir.path());
        let path = md.get_object_path(7);
        std::fs::write(&path, b"payload").unwrap();
        assert!(md.exists(7));
    }

    #[test]
    fn scan_relocates_an_object_left_on_another_disk() {
        let dir_a = tempdir().unwrap();
        let dir_b = tempdir().unwrap();
        let md = MultiDisk::new(dir_a.path().to_path_buf(), Arc::new(LoggingRecoveryTrigger));
        md.add(dir_a.path()).unwrap();
        md.add(dir_b.path()).unwrap();
        md.reinit();

        // Find an oid the ring assigns to dir_a, then plant it in
        // dir_b to simulate an object stranded by an earlier ring.
        let mut oid = 1u64;
        while md.get_object_path(oid).parent() != Some(dir_a.path()) {
            oid += 1;
        }
        std::fs::write(dir_b.path().join(object_name(oid)), b"payload").unwrap();

        assert!(md.exists(oid));
        assert!(md.get_object_path(oid).is_file());
        assert!(!dir_b.path().join(object_name(oid)).exists());
    }

    #[test]
    fn stale_lookup_rejects_zero_epoch() {
        let dir = tempdir().unwrap();
        let md = md_with_one_disk(dir.path());
        let err = md.get_stale_path(1, 0).unwrap_err();
        assert!(matches!(err, StoreError::BadEpoch));
    }

    #[test]
    fn stale_lookup_finds_direct_hit() {
        let dir = tempdir().unwrap();
        let md = md_with_one_disk(dir.path());
        let stale_dir = dir.path().join(".stale");
        std::fs::create_dir_all(&stale_dir).unwrap();
        std::fs::write(stale_dir.join(stale_name(9, 3)), b"payload").unwrap();
        let found = md.get_stale_path(9, 3).unwrap();
        assert_eq!(found, stale_dir.join(stale_name(9, 3)));
    }

    #[test]
    fn enumerate_skips_hidden_and_tmp_and_unlinks_tmp_on_cleanup() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("0000000000000001"), b"x").unwrap();
        std::fs::write(dir.path().join(".hidden"), b"x").unwrap();
        std::fs::write(dir.path().join("0000000000000002.tmp"), b"x").unwrap();
        std::fs::write(dir.path().join("not-hex-garbage!!!!!"), b"x").unwrap();

        let listing = enumerate_objects(dir.path(), false).unwrap();
        assert_eq!(listing.oids, vec![1]);
        assert_eq!(listing.removed_tmp, 0);
        assert!(dir.path().join("0000000000000002.tmp").exists());

        let listing = enumerate_objects(dir.path(), true).unwrap();
        assert_eq!(listing.removed_tmp, 1);
        assert!(!dir.path().join("0000000000000002.tmp").exists());
    }

    #[test]
    fn enumerate_excludes_sentinel_oids() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("0000000000000000"), b"x").unwrap();
        std::fs::write(dir.path().join("ffffffffffffffff"), b"x").unwrap();
        std::fs::write(dir.path().join("0000000000000001"), b"x").unwrap();

        let listing = enumerate_objects(dir.path(), false).unwrap();
        assert_eq!(listing.oids, vec![1]);
    }

    #[test]
    fn used_bytes_sums_live_objects_only() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("0000000000000001"), b"1234567").unwrap();
        std::fs::write(dir.path().join("0000000000000002"), b"12").unwrap();
        std::fs::write(dir.path().join("0000000000000002.tmp"), b"ignored").unwrap();
        std::fs::write(dir.path().join("ffffffffffffffff"), b"ignored-sentinel").unwrap();

        assert_eq!(used_bytes(dir.path()), 9);
    }
}
