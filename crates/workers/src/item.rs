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

//! The unit of work a pool executes, and its completion callback. See
//! spec.md §5.2, grounded on `sheep/work.c`'s `struct work` (`fn` run
//! on a worker thread, `done` run back on the event loop thread).

use std::panic::{self, AssertUnwindSafe};

/// Work run on a pool thread, plus the callback to run on the event
/// loop once it finishes. `done` never runs concurrently with other
/// `done` callbacks: the event loop drains one job at a time.
pub struct Job {
    run: Box<dyn FnOnce() + Send + 'static>,
    done: Box<dyn FnOnce() + Send + 'static>,
}

impl Job {
    pub fn new(
        run: impl FnOnce() + Send + 'static,
        done: impl FnOnce() + Send + 'static,
    ) -> Self {
        Job {
            run: Box::new(run),
            done: Box::new(done),
        }
    }

    /// Runs `run` on the calling (worker) thread and hands back the
    /// `done` half for the event loop to run later. A panicking `run`
    /// is caught and logged rather than unwinding the worker thread:
    /// per spec.md §7's propagation policy, a failing work item must
    /// still complete normally so `done` always reaches the event loop.
    pub(crate) fn execute(self) -> Box<dyn FnOnce() + Send + 'static> {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(self.run)) {
            let msg = payload
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                .unwrap_or("<non-string panic payload>");
            tracing::error!(panic = msg, "work item panicked, completing normally");
        }
        self.done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn panicking_run_still_yields_done() {
        let ran_done = Arc::new(AtomicBool::new(false));
        let ran_done2 = ran_done.clone();
        let job = Job::new(
            || panic!("boom"),
            move || ran_done2.store(true, Ordering::SeqCst),
        );
        let done = job.execute();
        done();
        assert!(ran_done.load(Ordering::SeqCst));
    }
}
