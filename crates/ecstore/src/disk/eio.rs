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

//! Hard I/O error handling: translate an EIO on one path into a
//! background ring rebuild plus a retriable error for the caller. See
//! spec.md §4.7, grounded on `sheep/md.c`'s `md_handle_eio` and
//! `md_do_recover`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use workers::WorkerPool;

use crate::error::StoreError;

use super::multi_disk::MultiDisk;

impl MultiDisk {
    /// Called by the I/O path when a read or write against `path`
    /// comes back as a hard error. Schedules disk removal and ring
    /// rebuild on `queue` and returns immediately: the caller gets
    /// `NetworkError` so it retries elsewhere once the ring settles,
    /// rather than `Eio`, which would surface to the client as
    /// unrecoverable.
    ///
    /// If multi-disk support was never enabled, or every disk is
    /// already gone, there's no remediation to schedule: this is
    /// already the permanent failure state, so `Eio` is returned
    /// directly.
    pub fn handle_eio(self: &Arc<Self>, queue: &Arc<WorkerPool>, path: PathBuf) -> StoreError {
        if !self.is_multi_disk() || self.active_disk_count() == 0 {
            tracing::error!(path = %path.display(), "EIO with no multi-disk recovery available");
            return StoreError::Eio;
        }

        let md = Arc::clone(self);
        let job_path = path.clone();
        if let Err(err) = queue.submit(move || md.run_eio_recovery(&job_path), || {}) {
            tracing::error!(path = %path.display(), error = %err, "failed to schedule EIO recovery");
            return StoreError::Eio;
        }

        tracing::warn!(path = %path.display(), "EIO reported, recovery scheduled");
        StoreError::NetworkError
    }

    /// The recovery job body. A duplicate EIO against a path some
    /// earlier job already dropped is a silent no-op: by the time this
    /// runs, `path` may no longer be in the registry at all.
    fn run_eio_recovery(&self, path: &Path) {
        if self.find_disk_idx(path).is_none() {
            tracing::debug!(path = %path.display(), "EIO job for an already-removed disk, ignoring");
            return;
        }

        let before = self.ring_snapshot();
        self.remove(path);
        self.reinit();
        if self.active_disk_count() > 0 {
            self.kick_recovery(before);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::multi_disk::LoggingRecoveryTrigger;
    use tempfile::tempdir;
    use workers::{CompletionBus, Policy};

    fn test_queue() -> (Arc<WorkerPool>, Arc<CompletionBus>) {
        let bus = Arc::new(CompletionBus::new().unwrap());
        let pool = WorkerPool::new("eio-test", Policy::Ordered, bus.clone());
        (pool, bus)
    }

    #[test]
    fn eio_against_known_disk_schedules_removal() {
        let dir_a = tempdir().unwrap();
        let dir_b = tempdir().unwrap();
        let md = Arc::new(MultiDisk::new(
            dir_a.path().to_path_buf(),
            Arc::new(LoggingRecoveryTrigger),
        ));
        md.add(dir_a.path()).unwrap();
        md.add(dir_b.path()).unwrap();
        md.reinit();
        assert_eq!(md.active_disk_count(), 2);

        let (queue, bus) = test_queue();
        let result = md.handle_eio(&queue, dir_a.path().to_path_buf());
        assert!(matches!(result, StoreError::NetworkError));

        bus.wait_and_drain();
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(md.active_disk_count(), 1);
    }

    #[test]
    fn eio_with_no_disks_is_unrecoverable() {
        let md = Arc::new(MultiDisk::new(
            PathBuf::from("/unused"),
            Arc::new(LoggingRecoveryTrigger),
        ));
        let (queue, _bus) = test_queue();
        let result = md.handle_eio(&queue, PathBuf::from("/unused"));
        assert!(matches!(result, StoreError::Eio));
    }

    #[test]
    fn duplicate_eio_against_removed_disk_is_a_no_op() {
        let dir = tempdir().unwrap();
        let md = MultiDisk::new(dir.path().to_path_buf(), Arc::new(LoggingRecoveryTrigger));
        md.add(dir.path()).unwrap();
        md.reinit();

        let path = dir.path().to_path_buf();
        md.remove(&path);
        // The disk is already gone from the registry; running the job
        // body directly must not panic or resurrect it.
        md.run_eio_recovery(&path);
        assert_eq!(md.active_disk_count(), 0);
    }
}
