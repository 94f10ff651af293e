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

//! 64-bit FNV-1a, used for both the vdisk ring construction and the oid
//! lookup key. Kept byte-oriented (rather than hashing a `u64` in one
//! shot) because ring construction folds multiple heterogeneous fields
//! into a single running hash.

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fnv1a(u64);

impl Fnv1a {
    pub const fn new() -> Self {
        Fnv1a(FNV_OFFSET_BASIS)
    }

    pub fn fold(mut self, bytes: &[u8]) -> Self {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(FNV_PRIME);
        }
        self
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for Fnv1a {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash an 8-byte object id, per spec.md §4.2: fold the little-endian
/// byte representation of the oid through FNV-1a.
pub fn hash_oid(oid: u64) -> u64 {
    Fnv1a::new().fold(&oid.to_le_bytes()).finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let a = hash_oid(0x1111_1111_1111_1111);
        let b = hash_oid(0x1111_1111_1111_1111);
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_oids_usually_differ() {
        assert_ne!(hash_oid(1), hash_oid(2));
    }
}
