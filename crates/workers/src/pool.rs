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

//! The autoscaling thread pool itself. See spec.md §5.2-§5.3, grounded
//! on `sheep/work.c`'s `queue_work`, `worker_routine`,
//! `wq_need_grow`/`wq_need_shrink`, and `create_worker_threads`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{QueueError, Result};
use crate::eventbus::CompletionBus;
use crate::item::Job;
use crate::policy::Policy;

/// How long a pool holds off shrinking after it last grew, so a brief
/// lull right after scaling up doesn't immediately tear threads back
/// down. See spec.md §5.3.
const PROTECTION_PERIOD: Duration = Duration::from_millis(1000);

struct State {
    pending: VecDeque<Job>,
    nr_running: usize,
    nr_threads: usize,
    protection_until: Option<Instant>,
    shutting_down: bool,
}

/// A named work queue. Threads are created lazily as load demands and
/// retired once it subsides, bounded by `policy`'s roof.
pub struct WorkerPool {
    name: String,
    policy: Policy,
    state: Mutex<State>,
    cond: Condvar,
    bus: Arc<CompletionBus>,
}

impl WorkerPool {
    /// Starts with a single worker thread, matching
    /// `init_work_queue`'s initial `create_worker_threads(q, 1)`.
    pub fn new(name: impl Into<String>, policy: Policy, bus: Arc<CompletionBus>) -> Arc<Self> {
        let pool = Arc::new(WorkerPool {
            name: name.into(),
            policy,
            state: Mutex::new(State {
                pending: VecDeque::new(),
                nr_running: 0,
                nr_threads: 1,
                protection_until: None,
                shutting_down: false,
            }),
            cond: Condvar::new(),
            bus,
        });
        pool.spawn_workers(1);
        pool
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn thread_count(&self) -> usize {
        self.state.lock().nr_threads
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Enqueue work. `run` executes on a pool thread; `done` is handed
    /// to the shared completion bus once `run` finishes, to be run
    /// later on the event loop thread.
    pub fn submit(
        self: &Arc<Self>,
        run: impl FnOnce() + Send + 'static,
        done: impl FnOnce() + Send + 'static,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if state.shutting_down {
            return Err(QueueError::ShuttingDown);
        }
        state.pending.push_back(Job::new(run, done));
        self.maybe_grow(&mut state);
        self.cond.notify_one();
        Ok(())
    }

    /// Doubles the thread count, capped at the policy's roof, whenever
    /// demand (pending + running) outstrips current capacity. Matches
    /// `wq_need_grow`.
    fn maybe_grow(self: &Arc<Self>, state: &mut State) {
        let roof = self.policy.roof();
        let demand = state.pending.len() + state.nr_running;
        if state.nr_threads < demand && state.nr_threads.saturating_mul(2) <= roof {
            let target = (state.nr_threads * 2).max(1).min(roof);
            let extra = target - state.nr_threads;
            state.nr_threads = target;
            state.protection_until = Some(Instant::now() + PROTECTION_PERIOD);
            drop(state);
            self.spawn_workers(extra);
            return;
        }
    }

    /// True once demand has dropped to half capacity or below *and*
    /// the protection period since the last grow has elapsed. Matches
    /// `wq_need_shrink`: a shrink candidate within the protection
    /// window just gets its deadline refreshed and declines.
    fn maybe_shrink(&self, state: &mut State) -> bool {
        let demand = state.pending.len() + state.nr_running;
        if demand > state.nr_threads / 2 {
            return false;
        }
        match state.protection_until {
            Some(deadline) if deadline > Instant::now() => false,
            _ => {
                state.protection_until = Some(Instant::now() + PROTECTION_PERIOD);
                true
            }
        }
    }

    fn spawn_workers(self: &Arc<Self>, count: usize) {
        for _ in 0..count {
            let pool = Arc::clone(self);
            std::thread::spawn(move || pool.worker_loop());
        }
    }

    fn worker_loop(self: Arc<Self>) {
        {
            let mut state = self.state.lock();
            state.nr_running += 1;
        }

        loop {
            let mut state = self.state.lock();

            if self.maybe_shrink(&mut state) {
                state.nr_running -= 1;
                state.nr_threads -= 1;
                tracing::debug!(pool = %self.name, threads = state.nr_threads, "worker retiring");
                return;
            }

            if state.pending.is_empty() {
                if state.shutting_down {
                    state.nr_running -= 1;
                    state.nr_threads -= 1;
                    return;
                }
                state.nr_running -= 1;
                self.cond.wait(&mut state);
                state.nr_running += 1;
                continue;
            }

            let job = state.pending.pop_front().expect("checked non-empty above");
            drop(state);

            let done = job.execute();
            self.bus.complete(done);
        }
    }

    /// Stops accepting new work; existing workers drain `pending` and
    /// then exit on their own.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        state.shutting_down = true;
        self.cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn ordered_pool_never_exceeds_one_thread() {
        let bus = Arc::new(CompletionBus::new().unwrap());
        let pool = WorkerPool::new("ordered", Policy::Ordered, bus);
        for _ in 0..10 {
            pool.submit(|| {}, || {}).unwrap();
        }
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(pool.thread_count(), 1);
    }

    #[test]
    fn completed_jobs_reach_the_event_loop() {
        let bus = Arc::new(CompletionBus::new().unwrap());
        let pool = WorkerPool::new("counting", Policy::Dynamic { cluster_nodes: 2 }, bus.clone());
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let c = counter.clone();
            pool.submit(move || {}, move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        let mut seen = 0;
        while seen < 5 {
            let callbacks = bus.wait_and_drain();
            seen += callbacks.len();
            for cb in callbacks {
                cb();
            }
        }
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn dynamic_pool_grows_under_load() {
        let bus = Arc::new(CompletionBus::new().unwrap());
        let pool = WorkerPool::new("growing", Policy::Dynamic { cluster_nodes: 8 }, bus.clone());
        let barrier = Arc::new(std::sync::Barrier::new(2));

        for _ in 0..4 {
            let b = barrier.clone();
            pool.submit(
                move || {
                    let _ = b.wait();
                },
                || {},
            )
            .unwrap();
        }
        std::thread::sleep(Duration::from_millis(30));
        assert!(pool.thread_count() > 1);

        for _ in 0..4 {
            barrier.wait();
        }
        for _ in 0..4 {
            bus.wait_and_drain();
        }
    }
}
