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

//! Virtual-disk ring: consistent-hash placement over the active disk
//! set. See spec.md §4.1-§4.2.

use crate::fnv::{hash_oid, Fnv1a};

/// A single point on the hash ring. `disk_index` refers into whichever
/// disk slice the ring was built from; callers must rebuild the ring
/// whenever that slice changes (see `DiskRegistry::reinit`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VDisk {
    pub hash: u64,
    pub disk_index: u16,
}

/// Build the sorted vdisk ring from a slice of (path, vdisk_count)
/// pairs, in disk order.
///
/// Per spec.md §4.1: for each disk, iterate `i` from `vdisk_count - 1`
/// down to `0`; fold `i` (as bytes) and then the path bytes traversed
/// from last character to first into a fresh FNV-1a accumulator. The
/// per-vdisk index is folded first so that two vdisks belonging to the
/// same disk never collapse onto the same hash just because they share
/// a path. The full array is then sorted by hash ascending; ties are
/// left in whatever order the sort produces (collisions are tolerated,
/// not specially resolved — see spec.md "Ambiguities").
pub fn build_ring(disks: &[(&str, u16)]) -> Vec<VDisk> {
    let mut ring = Vec::new();

    for (disk_index, &(path, vdisk_count)) in disks.iter().enumerate() {
        let path_bytes = path.as_bytes();
        for i in (0..vdisk_count).rev() {
            let hash = Fnv1a::new()
                .fold(&i.to_le_bytes())
                .fold_reversed(path_bytes)
                .finish();
            ring.push(VDisk {
                hash,
                disk_index: disk_index as u16,
            });
        }
    }

    ring.sort_unstable_by_key(|v| v.hash);
    ring
}

/// `oid -> vdisk` per spec.md §4.2: hash the oid, then binary-search
/// for the smallest vdisk whose hash is `>= key`, wrapping to index 0
/// when the key exceeds the ring's maximum (or is below its minimum,
/// which `partition_point` already resolves to index 0).
///
/// Calling this on an empty ring is undefined per spec.md §4.2;
/// callers must check `ring.is_empty()` first. We still avoid a panic
/// by returning `None`, but a caller that lets this happen has already
/// violated the contract.
pub fn lookup(ring: &[VDisk], oid: u64) -> Option<VDisk> {
    if ring.is_empty() {
        return None;
    }
    let key = hash_oid(oid);
    let pos = ring.partition_point(|v| v.hash < key);
    let pos = if pos == ring.len() { 0 } else { pos };
    Some(ring[pos])
}

trait FoldReversed {
    fn fold_reversed(self, bytes: &[u8]) -> Self;
}

impl FoldReversed for Fnv1a {
    fn fold_reversed(self, bytes: &[u8]) -> Self {
        bytes.iter().rev().fold(self, |acc, &b| acc.fold(&[b]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_is_sorted() {
        let disks = [("/disk0", 64u16), ("/disk1", 192u16)];
        let ring = build_ring(&disks);
        assert_eq!(ring.len(), 64 + 192);
        assert!(ring.windows(2).all(|w| w[0].hash <= w[1].hash));
    }

    #[test]
    fn every_index_refers_to_an_active_disk() {
        let disks = [("/a", 10u16), ("/b", 10u16), ("/c", 10u16)];
        let ring = build_ring(&disks);
        assert!(ring.iter().all(|v| (v.disk_index as usize) < disks.len()));
    }

    #[test]
    fn lookup_is_stable_across_repeated_calls() {
        let disks = [("/a", 64u16), ("/b", 64u16)];
        let ring = build_ring(&disks);
        let first = lookup(&ring, 0x1111_1111_1111_1111).unwrap();
        for _ in 0..1000 {
            assert_eq!(lookup(&ring, 0x1111_1111_1111_1111), Some(first));
        }
    }

    #[test]
    fn lookup_wraps_around() {
        let disks = [("/a", 4u16)];
        let ring = build_ring(&disks);
        // Every oid must resolve to a vdisk even at the boundary keys.
        assert!(lookup(&ring, 0).is_some());
        assert!(lookup(&ring, u64::MAX).is_some());
    }

    #[test]
    fn empty_ring_returns_none_without_panicking() {
        assert_eq!(lookup(&[], 42), None);
    }

    #[test]
    fn same_disk_vdisks_get_distinct_hashes() {
        let disks = [("/only", 8u16)];
        let ring = build_ring(&disks);
        let mut hashes: Vec<u64> = ring.iter().map(|v| v.hash).collect();
        hashes.sort_unstable();
        hashes.dedup();
        assert_eq!(hashes.len(), 8, "each vdisk of the same disk must hash distinctly");
    }
}
