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

pub mod probe;
pub mod registry;
pub mod ring;

mod eio;
mod locator;
mod multi_disk;

pub use multi_disk::{DiskSummary, LoggingRecoveryTrigger, MultiDisk, RecoveryTrigger};
pub use registry::{Disk, DEFAULT_VDISKS, MAX_DISKS, MAX_RING_SIZE};
pub use ring::VDisk;
