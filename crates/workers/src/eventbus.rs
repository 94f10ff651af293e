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

//! Fan-in completion delivery: every worker pool signals the same
//! eventfd when it finishes a job, and a single event loop drains it.
//! See spec.md §5.4, grounded on `sheep/work.c`'s
//! `bs_thread_request_done` and its single shared `efd`.

use std::collections::VecDeque;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

use parking_lot::Mutex;
use rustix::event::eventfd;
use rustix::event::EventfdFlags;

type Done = Box<dyn FnOnce() + Send + 'static>;

/// Owns the eventfd and the single finished-job queue every pool
/// drains into. Shared (via `Arc`) between every `WorkerPool` on a
/// node and the one `EventLoop` that drains them.
pub struct CompletionBus {
    fd: OwnedFd,
    finished: Mutex<VecDeque<Done>>,
}

impl CompletionBus {
    pub fn new() -> rustix::io::Result<Self> {
        let fd = eventfd(0, EventfdFlags::empty())?;
        Ok(CompletionBus {
            fd,
            finished: Mutex::new(VecDeque::new()),
        })
    }

    pub(crate) fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }

    /// Called from a worker thread once a job's `run` half has
    /// completed. Queues the `done` half and pings the eventfd so the
    /// event loop wakes up.
    pub(crate) fn complete(&self, done: Done) {
        self.finished.lock().push_back(done);
        // A blocking eventfd write never fails for a single increment
        // short of counter overflow (unreachable at u64 scale here).
        let _ = rustix::io::write(&self.fd, &1u64.to_ne_bytes());
    }

    /// Blocks until at least one completion is pending, then drains
    /// and returns every `done` callback queued so far. Mirrors
    /// `bs_thread_request_done`'s splice-then-run-outside-the-lock
    /// shape: callers run the returned callbacks after this returns,
    /// not while any pool's internal lock is held.
    pub fn wait_and_drain(&self) -> Vec<Done> {
        let mut buf = [0u8; 8];
        // Blocking read: sleeps until at least one complete() call has
        // incremented the counter, then clears it back to zero.
        if rustix::io::read(&self.fd, &mut buf).is_err() {
            return Vec::new();
        }
        let mut finished = self.finished.lock();
        finished.drain(..).collect()
    }
}
