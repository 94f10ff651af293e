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

//! Disk records and the pure (lock-free) bookkeeping functions the
//! registry applies to them. See spec.md §3, §4.4.

use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};

/// Default vdisks per disk at unit weight, per spec.md §3.
pub const DEFAULT_VDISKS: u16 = 128;

/// Maximum number of disks a single node may register. Bounds both the
/// registry itself and the ring (`MAX_DISKS * DEFAULT_VDISKS`).
pub const MAX_DISKS: usize = 64;

pub const MAX_RING_SIZE: usize = MAX_DISKS * DEFAULT_VDISKS as usize;

#[derive(Clone, Debug)]
pub struct Disk {
    pub path: PathBuf,
    /// Free bytes as of the last probe. `0` means broken.
    pub weight: u64,
    pub vdisk_count: u16,
}

impl Disk {
    pub fn new(path: PathBuf) -> Self {
        Disk {
            path,
            weight: 0,
            vdisk_count: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.weight > 0
    }
}

/// Find a disk by exact path match, per spec.md §4.4 (`path_to_disk_idx`
/// in the original C).
pub fn path_to_disk_idx(disks: &[Disk], path: &Path) -> Option<usize> {
    disks.iter().position(|d| d.path == path)
}

/// Append a new disk slot for `path`, creating the directory tree.
/// Rejects exact-path duplicates and registries already at capacity.
/// Does not probe or rebuild the ring — callers batch adds/removes and
/// invoke `reinit` once (spec.md §4.4).
pub fn add_disk(disks: &mut Vec<Disk>, path: &Path) -> Result<()> {
    if path_to_disk_idx(disks, path).is_some() {
        tracing::warn!(path = %path.display(), "duplicate disk path, ignoring");
        return Err(StoreError::DuplicatePath(path.to_path_buf()));
    }
    if disks.len() >= MAX_DISKS {
        return Err(StoreError::TooManyDisks(disks.len(), MAX_DISKS));
    }

    std::fs::create_dir_all(path)?;
    disks.push(Disk::new(path.to_path_buf()));
    tracing::info!(path = %path.display(), total = disks.len(), "disk added");
    Ok(())
}

/// Remove a disk by path. Unknown paths are a programmer error per
/// spec.md §7 rule #5: logged, no state change, no failure surfaced.
pub fn del_disk(disks: &mut Vec<Disk>, path: &Path) {
    match path_to_disk_idx(disks, path) {
        Some(idx) => remove_at(disks, idx),
        None => tracing::warn!(path = %path.display(), "unplug of unknown path, ignoring"),
    }
}

/// Stable erase preserving the relative order of the remaining disks
/// (spec.md P3). Unlike the upstream C (which keeps slots implicit via
/// a fixed array and a count), `Vec::remove` already gives us this for
/// free; we still name the function to keep the mapping to spec.md
/// §4.4 obvious.
pub fn remove_at(disks: &mut Vec<Disk>, idx: usize) {
    let removed = disks.remove(idx);
    tracing::info!(path = %removed.path.display(), "disk removed");
}

/// Assign vdisk counts proportional to free space, per spec.md §3:
/// `DEFAULT_VDISKS * (weight / mean_weight)`, rounded to nearest.
pub fn calculate_vdisks(disks: &mut [Disk]) {
    if disks.is_empty() {
        return;
    }
    let total: u64 = disks.iter().map(|d| d.weight).sum();
    let mean = total / disks.len() as u64;
    if mean == 0 {
        for d in disks.iter_mut() {
            d.vdisk_count = 0;
        }
        return;
    }
    for d in disks.iter_mut() {
        let factor = d.weight as f64 / mean as f64;
        d.vdisk_count = (DEFAULT_VDISKS as f64 * factor).round() as u16;
        tracing::debug!(path = %d.path.display(), vdisks = d.vdisk_count, weight = d.weight, "vdisk count assigned");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disk(weight: u64) -> Disk {
        Disk {
            path: PathBuf::from(format!("/disk-{weight}")),
            weight,
            vdisk_count: 0,
        }
    }

    #[test]
    fn weighted_vdisks_match_scenario_1() {
        const GIB: u64 = 1 << 30;
        let mut disks = vec![disk(100 * GIB), disk(300 * GIB)];
        calculate_vdisks(&mut disks);
        assert_eq!(disks[0].vdisk_count, 64);
        assert_eq!(disks[1].vdisk_count, 192);
    }

    #[test]
    fn equal_weights_get_equal_vdisks() {
        let mut disks = vec![disk(10), disk(10), disk(10)];
        calculate_vdisks(&mut disks);
        assert!(disks.iter().all(|d| d.vdisk_count == DEFAULT_VDISKS));
    }

    #[test]
    fn remove_preserves_relative_order() {
        let mut disks = vec![disk(1), disk(2), disk(3), disk(4)];
        remove_at(&mut disks, 1);
        let weights: Vec<u64> = disks.iter().map(|d| d.weight).collect();
        assert_eq!(weights, vec![1, 3, 4]);
    }

    #[test]
    fn duplicate_add_is_rejected() {
        let mut disks = vec![];
        let tmp = std::env::temp_dir().join("ecstore-dup-test");
        add_disk(&mut disks, &tmp).unwrap();
        let err = add_disk(&mut disks, &tmp).unwrap_err();
        assert!(matches!(err, StoreError::DuplicatePath(_)));
        assert_eq!(disks.len(), 1);
        let _ = std::fs::remove_dir_all(&tmp);
    }
}
