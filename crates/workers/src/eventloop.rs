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

//! The single-threaded loop that drains the shared completion bus and
//! runs each job's `done` callback. See spec.md §5.4, grounded on
//! `sheep/work.c`'s `bs_thread_request_done` registered once against
//! the node's main event loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::eventbus::CompletionBus;

/// Drives completion delivery for every `WorkerPool` sharing `bus`.
/// Call `run` from whichever thread owns the node's main loop; `stop`
/// can be called from any thread to unwind it after the next wakeup.
pub struct EventLoop {
    bus: Arc<CompletionBus>,
    stopped: AtomicBool,
}

impl EventLoop {
    pub fn new(bus: Arc<CompletionBus>) -> Self {
        EventLoop {
            bus,
            stopped: AtomicBool::new(false),
        }
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    /// Blocks until at least one job has completed, then runs every
    /// queued `done` callback. Returns how many ran.
    pub fn tick(&self) -> usize {
        let callbacks = self.bus.wait_and_drain();
        let n = callbacks.len();
        for cb in callbacks {
            cb();
        }
        n
    }

    /// Runs `tick` until `stop` is called.
    pub fn run(&self) {
        while !self.stopped.load(Ordering::Acquire) {
            self.tick();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn tick_runs_pending_callbacks() {
        let bus = Arc::new(CompletionBus::new().unwrap());
        let loop_ = EventLoop::new(bus.clone());
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        bus.complete(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(loop_.tick(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
