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

//! Adaptive thread-pool work queue: a small number of named pools,
//! each autoscaling under one of three policies, all funneling
//! completions through a single eventfd-backed event loop.

mod error;
mod eventbus;
mod eventloop;
mod item;
mod policy;
mod pool;

pub use error::{QueueError, Result};
pub use eventbus::CompletionBus;
pub use eventloop::EventLoop;
pub use policy::Policy;
pub use pool::WorkerPool;
