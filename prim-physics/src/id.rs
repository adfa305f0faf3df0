// Copyright 2025 John Brosnihan
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
//! Stable body identifiers
//!
//! Every body carries a `u32` id issued by the scene's [`IdAllocator`].
//! Producers hold a shared reference to the allocator so they can name a
//! body in the same breath as queueing its `Add` change.
//!
//! # Wraparound policy
//!
//! Ids start at 1 and increase monotonically; 0 is never issued. When the
//! counter wraps it restarts at 1 and skips every id that is still live, so
//! an id is never handed out twice while its first holder exists.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Stable numeric identifier of a body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyId(u32);

impl BodyId {
    /// Create a BodyId from a raw value
    pub fn new(id: u32) -> Self {
        BodyId(id)
    }

    /// Get the raw u32 value
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Body({})", self.0)
    }
}

struct AllocatorState {
    next: u32,
    live: HashSet<u32>,
}

/// World-owned source of body ids
pub struct IdAllocator {
    state: Mutex<AllocatorState>,
}

impl IdAllocator {
    /// Create an allocator whose first id is 1
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Create an allocator whose next id is `first`
    ///
    /// A `first` of 0 is treated as 1.
    pub fn starting_at(first: u32) -> Self {
        IdAllocator {
            state: Mutex::new(AllocatorState {
                next: first.max(1),
                live: HashSet::new(),
            }),
        }
    }

    /// Issue a fresh id and mark it live
    pub fn allocate(&self) -> BodyId {
        let mut state = self.state.lock();
        loop {
            let candidate = state.next;
            state.next = match state.next.wrapping_add(1) {
                0 => {
                    log::debug!(target: "prim_physics::id", "body id counter wrapped");
                    1
                }
                n => n,
            };
            if state.live.insert(candidate) {
                return BodyId(candidate);
            }
        }
    }

    /// Return an id to the pool
    ///
    /// Returns false if the id was not live.
    pub fn release(&self, id: BodyId) -> bool {
        self.state.lock().live.remove(&id.0)
    }

    /// Check whether an id is currently issued
    pub fn is_live(&self, id: BodyId) -> bool {
        self.state.lock().live.contains(&id.0)
    }

    /// Number of ids currently issued
    pub fn live_count(&self) -> usize {
        self.state.lock().live.len()
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_start_at_one() {
        let ids = IdAllocator::new();
        assert_eq!(ids.allocate(), BodyId::new(1));
        assert_eq!(ids.allocate(), BodyId::new(2));
        assert_eq!(ids.live_count(), 2);
    }

    #[test]
    fn test_release() {
        let ids = IdAllocator::new();
        let a = ids.allocate();
        assert!(ids.is_live(a));
        assert!(ids.release(a));
        assert!(!ids.is_live(a));
        assert!(!ids.release(a));
    }

    #[test]
    fn test_wraparound_skips_zero_and_live_ids() {
        let ids = IdAllocator::starting_at(u32::MAX - 1);
        let first = ids.allocate();
        assert_eq!(first.raw(), u32::MAX - 1);

        let second = ids.allocate();
        assert_eq!(second.raw(), u32::MAX);

        // 0 is never issued; 1 comes next
        let third = ids.allocate();
        assert_eq!(third.raw(), 1);
        let fourth = ids.allocate();
        assert_eq!(fourth.raw(), 2);
    }

    #[test]
    fn test_wraparound_does_not_reissue_live_id() {
        let ids = IdAllocator::starting_at(1);
        let one = ids.allocate();
        assert_eq!(one.raw(), 1);

        {
            let mut state = ids.state.lock();
            state.next = u32::MAX;
        }
        assert_eq!(ids.allocate().raw(), u32::MAX);
        // 1 is still live, so the allocator moves on to 2
        assert_eq!(ids.allocate().raw(), 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(BodyId::new(42).to_string(), "Body(42)");
    }
}
