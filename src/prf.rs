//! Pre-shared-key, counter-mode PRF used to synchronize tree insertion
//! hashes between the two parties without extra communication.
//!
//! A nondeterministic per-party RNG would desynchronize the two mirrored
//! trees, so both parties instead construct a [`HashStream`] from the same
//! pre-shared key; each call to [`HashStream::next_hash`] advances an
//! explicit counter and is a pure function of `(key, counter)`, so two
//! independently running processes that call it the same number of times in
//! the same order derive bit-identical leaf hashes.
//!
//! Domain-separated and counter-bound: a fixed tag, the key, and a
//! big-endian counter are absorbed into a BLAKE3 hasher, then a fresh XOF
//! reader is taken rather than consuming shared hasher state, so derivations
//! are independent and replayable.

#![forbid(unsafe_code)]

use blake3::Hasher;
use serde::{Deserialize, Serialize};

/// Width of a derived leaf hash, matching `HashList`'s 32-byte entries.
pub const HASH_LEN: usize = 32;

/// A 32-byte pre-shared PRF key. Both parties must be configured with the
/// same key out of band (e.g. from the same key-generation run).
#[derive(Clone, Copy, Serialize, Deserialize)]
pub struct PrfKey(pub [u8; 32]);

impl PrfKey {
    /// Derive a fresh key from arbitrary seed bytes (test/dev convenience).
    pub fn from_seed(seed: &[u8]) -> Self {
        let mut hasher = Hasher::new();
        hasher.update(b"upsi.prf.keygen.v1");
        hasher.update(seed);
        let mut key = [0u8; 32];
        key.copy_from_slice(hasher.finalize().as_bytes());
        PrfKey(key)
    }
}

/// A deterministic hash stream bound to a [`PrfKey`] and advanced by an
/// explicit counter. Both parties construct one of these per tree and call
/// [`next_hash`](HashStream::next_hash) exactly once per element inserted,
/// in the same order, so the resulting leaf hashes stay in lockstep.
#[derive(Clone)]
pub struct HashStream {
    key: PrfKey,
    ctr: u64,
}

impl HashStream {
    /// Build a stream at counter zero.
    pub fn new(key: PrfKey) -> Self {
        HashStream { key, ctr: 0 }
    }

    /// Resume a stream at an explicit counter (used when re-opening a
    /// persisted tree so new insertions continue the same sequence).
    pub fn resume(key: PrfKey, ctr: u64) -> Self {
        HashStream { key, ctr }
    }

    /// Current counter value (persisted alongside tree snapshots).
    pub fn counter(&self) -> u64 {
        self.ctr
    }

    /// Derive the next 32-byte hash and advance the counter.
    pub fn next_hash(&mut self) -> [u8; HASH_LEN] {
        let mut h = Hasher::new();
        h.update(b"upsi.prf.hash.v1");
        h.update(&self.key.0);
        h.update(&self.ctr.to_be_bytes());
        self.ctr = self
            .ctr
            .checked_add(1)
            .expect("PRF counter exhausted (2^64 insertions)");
        let mut out = [0u8; HASH_LEN];
        out.copy_from_slice(h.finalize().as_bytes());
        out
    }

    /// Derive `n` hashes in order (convenience for batch inserts).
    pub fn next_hashes(&mut self, n: usize) -> Vec<[u8; HASH_LEN]> {
        (0..n).map(|_| self.next_hash()).collect()
    }
}

/// A keyed, deterministic PRF used for per-element probe hashes (the probe
/// path is recomputed from the element itself, not from the insertion
/// counter, so both parties can look up the same leaf for a given element
/// without synchronizing state).
pub fn probe_hash(key: &PrfKey, element_bytes: &[u8]) -> [u8; HASH_LEN] {
    let mut h = Hasher::new();
    h.update(b"upsi.prf.probe.v1");
    h.update(&key.0);
    h.update(element_bytes);
    let mut out = [0u8; HASH_LEN];
    out.copy_from_slice(h.finalize().as_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_keys_produce_identical_streams() {
        let key = PrfKey::from_seed(b"test-seed");
        let mut a = HashStream::new(key);
        let mut b = HashStream::new(key);
        for _ in 0..16 {
            assert_eq!(a.next_hash(), b.next_hash());
        }
    }

    #[test]
    fn distinct_counters_diverge() {
        let key = PrfKey::from_seed(b"test-seed");
        let mut s = HashStream::new(key);
        let h0 = s.next_hash();
        let h1 = s.next_hash();
        assert_ne!(h0, h1);
    }

    #[test]
    fn probe_hash_is_deterministic_per_element() {
        let key = PrfKey::from_seed(b"test-seed");
        let a = probe_hash(&key, b"element-42");
        let b = probe_hash(&key, b"element-42");
        assert_eq!(a, b);
        let c = probe_hash(&key, b"element-43");
        assert_ne!(a, c);
    }
}
