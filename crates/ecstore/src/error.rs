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

use std::path::PathBuf;

/// Result codes a caller can act on, per spec.md §6/§7.
///
/// `Io` is an internal escape hatch for the probe/scan layer; it never
/// crosses the `get_object_path`/`exists`/`handle_eio` boundary — those
/// paths convert filesystem failures into zero weight, a logged no-op,
/// or one of the variants below before returning.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object not found")]
    NoObject,

    #[error("I/O error, all placements exhausted")]
    Eio,

    #[error("transient error, retry against the rebuilt ring")]
    NetworkError,

    #[error("disk registry already holds {0} disks (max {1})")]
    TooManyDisks(usize, usize),

    #[error("stale lookup requires a non-zero epoch")]
    BadEpoch,

    #[error("path already registered: {0}")]
    DuplicatePath(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
