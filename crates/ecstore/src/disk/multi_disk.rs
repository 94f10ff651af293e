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

//! The owned registry value: disk set + ring behind one reader-writer
//! lock, plus the one-way `enable_multi_disk` latch. See spec.md §3
//! invariants and §9 "Global mutable arrays → owned registry".

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;

use super::locator;
use super::probe;
use super::registry::{self, Disk};
use super::ring::{self, VDisk};

/// Triggers background recovery after a ring change. Out of scope per
/// spec.md §1 (the recovery algorithm itself and cluster
/// membership/epoch management are external collaborators); this is
/// only the interface the core invokes.
pub trait RecoveryTrigger: Send + Sync {
    fn start_recovery(&self, vnodes_before: &[VDisk], vnodes_after: &[VDisk]);
}

/// Default trigger that just logs; good enough for a node wired up
/// without a real recovery subsystem attached.
pub struct LoggingRecoveryTrigger;

impl RecoveryTrigger for LoggingRecoveryTrigger {
    fn start_recovery(&self, vnodes_before: &[VDisk], vnodes_after: &[VDisk]) {
        tracing::info!(
            before = vnodes_before.len(),
            after = vnodes_after.len(),
            "kicking recovery after ring change"
        );
    }
}

struct State {
    disks: Vec<Disk>,
    ring: Vec<VDisk>,
}

#[derive(Clone, Debug)]
pub struct DiskSummary {
    pub index: usize,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub used_bytes: u64,
}

pub struct MultiDisk {
    state: RwLock<State>,
    enable_multi_disk: AtomicBool,
    object_path: PathBuf,
    recovery: Arc<dyn RecoveryTrigger>,
}

impl MultiDisk {
    pub fn new(object_path: PathBuf, recovery: Arc<dyn RecoveryTrigger>) -> Self {
        MultiDisk {
            state: RwLock::new(State {
                disks: Vec::new(),
                ring: Vec::new(),
            }),
            enable_multi_disk: AtomicBool::new(false),
            object_path,
            recovery,
        }
    }

    pub fn with_default_recovery(object_path: PathBuf) -> Self {
        Self::new(object_path, Arc::new(LoggingRecoveryTrigger))
    }

    /// Latches true after the first successful `reinit` and never
    /// reverts (spec.md §3). Read without the lock: a monotonic bool
    /// is safe to observe racily.
    pub fn is_multi_disk(&self) -> bool {
        self.enable_multi_disk.load(Ordering::Acquire)
    }

    pub fn object_path(&self) -> &Path {
        &self.object_path
    }

    /// Register a new path. Does not probe or rebuild the ring; call
    /// `reinit` afterward (spec.md §4.4).
    pub fn add(&self, path: &Path) -> Result<()> {
        let mut state = self.state.write();
        registry::add_disk(&mut state.disks, path)
    }

    /// Unregister a path by exact match. Unknown paths are logged and
    /// ignored (spec.md §7 rule #5).
    pub fn remove(&self, path: &Path) {
        let mut state = self.state.write();
        registry::del_disk(&mut state.disks, path);
    }

    /// Re-probes every disk, drops any that probe to zero weight
    /// (restarting the scan each time one is dropped, per spec.md
    /// §4.4), recomputes vdisk counts, rebuilds the ring, and latches
    /// `enable_multi_disk`. Returns total capacity across surviving
    /// disks.
    ///
    /// At least one disk *record* is always retained even if it probes
    /// broken, so the registry stays queryable (spec.md §3, §7 rule
    /// #4) — but a lone broken disk contributes nothing to the ring.
    pub fn reinit(&self) -> u64 {
        let mut state = self.state.write();
        self.reinit_locked(&mut state)
    }

    /// The body of `reinit`, factored out so `plug_or_unplug` can run
    /// parse + apply + reinit + recovery-kick as one critical section
    /// under a single write guard (spec.md §4.4, §5 — mirrors
    /// `sheep/md.c`'s `do_plug_unplug`, one `wrlock`/`unlock` pair
    /// spanning the whole sequence).
    fn reinit_locked(&self, state: &mut State) -> u64 {
        loop {
            if state.disks.is_empty() {
                state.ring.clear();
                break;
            }

            let mut broken = None;
            for (i, d) in state.disks.iter_mut().enumerate() {
                d.weight = probe::probe_path(&d.path);
                if d.weight == 0 {
                    broken = Some(i);
                    break;
                }
            }

            match broken {
                Some(_) if state.disks.len() == 1 => {
                    tracing::warn!(
                        path = %state.disks[0].path.display(),
                        "last disk is broken, keeping its slot so the registry stays queryable"
                    );
                    break;
                }
                Some(idx) => {
                    registry::remove_at(&mut state.disks, idx);
                    continue;
                }
                None => break,
            }
        }

        registry::calculate_vdisks(&mut state.disks);
        let pairs: Vec<(&str, u16)> = state
            .disks
            .iter()
            .map(|d| (d.path.to_str().unwrap_or_default(), d.vdisk_count))
            .collect();
        state.ring = ring::build_ring(&pairs);

        self.enable_multi_disk.store(true, Ordering::Release);
        state.disks.iter().map(|d| d.weight).sum()
    }

    pub(crate) fn active_disk_count(&self) -> usize {
        self.state.read().disks.iter().filter(|d| d.is_active()).count()
    }

    pub(crate) fn ring_snapshot(&self) -> Vec<VDisk> {
        self.state.read().ring.clone()
    }

    pub(crate) fn kick_recovery(&self, before: Vec<VDisk>) {
        let after = self.ring_snapshot();
        self.recovery.start_recovery(&before, &after);
    }

    pub(crate) fn find_disk_idx(&self, path: &Path) -> Option<usize> {
        self.state.read().disks.iter().position(|d| d.path == path)
    }

    /// Parse comma-separated paths and add each; reinit and kick
    /// recovery only if the disk count actually changed and at least
    /// one disk remains (spec.md §4.4).
    pub fn plug(&self, csv_paths: &str) -> bool {
        self.plug_or_unplug(csv_paths, true)
    }

    pub fn unplug(&self, csv_paths: &str) -> bool {
        self.plug_or_unplug(csv_paths, false)
    }

    /// Parses, applies, reinits, and (if warranted) kicks recovery all
    /// under one held write guard, so a concurrent reader or another
    /// writer never observes the disk set or ring mid-update.
    fn plug_or_unplug(&self, csv_paths: &str, plug: bool) -> bool {
        let mut state = self.state.write();
        let before_count = state.disks.len();

        for raw in csv_paths.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let path = Path::new(raw);
            if plug {
                let _ = registry::add_disk(&mut state.disks, path);
            } else {
                registry::del_disk(&mut state.disks, path);
            }
        }

        if before_count == state.disks.len() {
            return false;
        }

        let before_ring = state.ring.clone();
        self.reinit_locked(&mut state);
        let active = state.disks.iter().filter(|d| d.is_active()).count();
        let after_ring = state.ring.clone();
        drop(state);

        if active > 0 {
            self.recovery.start_recovery(&before_ring, &after_ring);
        }
        true
    }

    pub fn info(&self) -> Vec<DiskSummary> {
        let state = self.state.read();
        state
            .disks
            .iter()
            .enumerate()
            .map(|(index, d)| DiskSummary {
                index,
                path: d.path.clone(),
                size_bytes: d.weight,
                used_bytes: locator::used_bytes(&d.path),
            })
            .collect()
    }

    pub(crate) fn with_state_read<T>(&self, f: impl FnOnce(&[Disk], &[VDisk]) -> T) -> T {
        let state = self.state.read();
        f(&state.disks, &state.ring)
    }
}

pub(crate) fn path_for(disks: &[Disk], vd: VDisk) -> Option<&Path> {
    disks.get(vd.disk_index as usize).map(|d| d.path.as_path())
}
