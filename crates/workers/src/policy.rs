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

//! Scheduling policies a work queue can grow under. See spec.md §5.1,
//! grounded on `sheep/work.c`'s `wq_get_roof`.

/// Caps how many worker threads a queue's autoscaler may create.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Policy {
    /// Exactly one worker thread; work runs strictly in submission
    /// order. Used for queues where concurrent execution would
    /// violate an ordering invariant.
    Ordered,
    /// Scales up to twice the cluster's node count.
    Dynamic { cluster_nodes: usize },
    /// No cap beyond the machine's own limits.
    Unlimited,
}

impl Policy {
    pub fn roof(self) -> usize {
        match self {
            Policy::Ordered => 1,
            Policy::Dynamic { cluster_nodes } => 2 * cluster_nodes.max(1),
            Policy::Unlimited => usize::MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_roof_is_one() {
        assert_eq!(Policy::Ordered.roof(), 1);
    }

    #[test]
    fn dynamic_roof_doubles_cluster_size() {
        assert_eq!(Policy::Dynamic { cluster_nodes: 5 }.roof(), 10);
    }

    #[test]
    fn unlimited_roof_is_max() {
        assert_eq!(Policy::Unlimited.roof(), usize::MAX);
    }
}
