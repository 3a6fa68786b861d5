//! Bucketed oblivious tree: a history-independent binary tree of
//! fixed-capacity buckets plus a stash, indexed so that `0` is the stash,
//! `1` is the root, and the children of `i` are `2i` and `2i+1`.
//!
//! Generic over the bucket content type `T` so the same structure backs
//! both the plaintext `my_tree` (`T = ElementAndPayload`) and the
//! encrypted `other_tree` (`T = EncryptedElement`); this module never
//! inspects the concrete shape of `T`.

use serde::{Deserialize, Serialize};

use crate::bucket::Bucket;
use crate::error::TreeError;
use crate::prf::{HashStream, HASH_LEN};

/// An entry stored in the tree together with the hash that placed it,
/// needed to recompute its current leaf (and hence its LCA with a new
/// insertion) whenever the tree's depth changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry<T> {
    pub value: T,
    pub hash: [u8; HASH_LEN],
}

/// The bucketed oblivious tree itself.
pub struct Tree<T> {
    depth: usize,
    node_size: usize,
    stash_size: usize,
    actual_size: usize,
    buckets: Vec<Bucket<StoredEntry<T>>>,
}

/// Interpret the low-order `depth` bits of `hash` as a leaf index in
/// `[2^depth, 2^(depth+1) - 1]`, descending root-to-leaf one bit at a time.
fn compute_leaf(hash: &[u8; HASH_LEN], depth: usize) -> usize {
    let mut idx: usize = 1;
    for level in 0..depth {
        let byte = hash[level / 8];
        let bit = (byte >> (7 - (level % 8))) & 1;
        idx = idx * 2 + bit as usize;
    }
    idx
}

/// Bit length of `a ^ b`; `0` when equal. Used to find each entry's
/// lowest-common-ancestor bucket with the currently-inserted leaf.
fn steps(a: usize, b: usize) -> u32 {
    let x = a ^ b;
    if x == 0 {
        0
    } else {
        usize::BITS - x.leading_zeros()
    }
}

impl<T: Clone> Tree<T> {
    /// Construct an empty tree at depth 0 (a single root bucket plus stash).
    pub fn new(node_size: usize, stash_size: usize) -> Self {
        let mut t = Tree {
            depth: 0,
            node_size,
            stash_size,
            actual_size: 0,
            buckets: Vec::new(),
        };
        t.resize_to_depth(0);
        t
    }

    /// Current depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of entries currently stored (stash included).
    pub fn actual_size(&self) -> usize {
        self.actual_size
    }

    fn capacity_at(&self, index: usize) -> usize {
        if index == 0 {
            self.stash_size
        } else {
            self.node_size
        }
    }

    fn total_slots(depth: usize) -> usize {
        1usize << (depth + 1)
    }

    /// Grow the tree to exactly `depth`, appending empty buckets. Existing
    /// bucket contents are left untouched at their current indices: a
    /// bucket that was a leaf before growth becomes an internal node,
    /// which is still a valid ancestor for every entry it holds (see
    /// DESIGN.md for why no data movement is needed on growth).
    fn resize_to_depth(&mut self, depth: usize) {
        let target = Self::total_slots(depth);
        while self.buckets.len() < target {
            let idx = self.buckets.len();
            self.buckets.push(Bucket::new(self.capacity_at(idx)));
        }
        self.depth = depth;
    }

    fn grow_one_level(&mut self) {
        self.resize_to_depth(self.depth + 1);
    }

    /// Root-to-leaf bucket indices for `leaf` at the tree's current depth,
    /// in root-first order, NOT including the stash (matches
    /// `extractPathIndices` minus the stash prepend, which callers add
    /// explicitly since stash handling differs between insert and probe).
    fn ancestors_of(&self, leaf: usize) -> Vec<usize> {
        let mut v = Vec::new();
        let mut idx = leaf;
        while idx >= 1 {
            v.push(idx);
            if idx == 1 {
                break;
            }
            idx /= 2;
        }
        v.reverse();
        v
    }

    /// `path(element)`: stash, root, ..., leaf, in that order, for the
    /// probe leaf derived from `hash`. Length is `depth + 2`.
    pub fn path(&self, hash: &[u8; HASH_LEN]) -> Vec<&T> {
        let leaf = compute_leaf(hash, self.depth);
        let mut out = Vec::with_capacity(self.depth + 2);
        for e in &self.buckets[0].entries {
            out.push(&e.value);
        }
        for idx in self.ancestors_of(leaf) {
            for e in &self.buckets[idx].entries {
                out.push(&e.value);
            }
        }
        out
    }

    /// `insert(batch, hashes_out)`: insert each `(value, hash)` pair
    /// (hash drawn from the shared [`HashStream`] by the caller so both
    /// parties can replay identical hashes), greedily redistributing the
    /// stash and the new leaf's path. Returns the set of `(index, bucket)`
    /// pairs that changed, for transmission as `TreeUpdates`.
    pub fn insert_batch(
        &mut self,
        batch: Vec<T>,
        hash_stream: &mut HashStream,
    ) -> Result<Vec<(usize, Bucket<T>)>, TreeError> {
        let mut changed: std::collections::BTreeMap<usize, Bucket<T>> = std::collections::BTreeMap::new();

        for value in batch {
            let hash = hash_stream.next_hash();
            self.insert_one(value, hash, &mut changed)?;
        }

        Ok(changed
            .into_iter()
            .map(|(idx, stored_bucket)| (idx, stored_bucket))
            .collect())
    }

    fn insert_one(
        &mut self,
        value: T,
        hash: [u8; HASH_LEN],
        changed: &mut std::collections::BTreeMap<usize, Bucket<T>>,
    ) -> Result<(), TreeError> {
        // Grow until the batch can possibly fit;.
        while self.actual_size + 1 >= Self::total_slots(self.depth) {
            self.grow_one_level();
        }

        let leaf = compute_leaf(&hash, self.depth);
        let touched = self.ancestors_of(leaf);

        // Collect stash + path entries, clearing their source buckets.
        let mut collected: Vec<StoredEntry<T>> = Vec::new();
        collected.append(&mut self.buckets[0].take_all());
        for &idx in &touched {
            collected.append(&mut self.buckets[idx].take_all());
        }
        let removed_count = collected.len();
        collected.push(StoredEntry { value, hash });
        self.actual_size = self.actual_size + 1;
        let _ = removed_count;

        // Sort by ascending distance-to-LCA so entries whose LCA with the
        // new leaf is deepest get first claim on the deepest bucket.
        let target_leaf = leaf;
        let mut with_steps: Vec<(u32, StoredEntry<T>)> = collected
            .into_iter()
            .map(|e| {
                let own_leaf = compute_leaf(&e.hash, self.depth);
                (steps(own_leaf, target_leaf), e)
            })
            .collect();
        with_steps.sort_by_key(|(s, _)| *s);

        let mut placed_into: Vec<usize> = Vec::new();
        for (s, entry) in with_steps {
            let own_leaf = compute_leaf(&entry.hash, self.depth);
            let mut bucket_idx = own_leaf >> s;
            loop {
                if bucket_idx == 0 {
                    // Fell through to the stash.
                    if self.buckets[0].add(entry) {
                        placed_into.push(0);
                    } else {
                        return Err(TreeError::Stash {
                            count: self.buckets[0].len() + 1,
                            limit: self.stash_size,
                        });
                    }
                    break;
                }
                if self.buckets[bucket_idx].add(entry.clone()) {
                    placed_into.push(bucket_idx);
                    break;
                }
                bucket_idx /= 2;
            }
        }

        for idx in touched.into_iter().chain(std::iter::once(0usize)) {
            let wire = Bucket {
                entries: self.buckets[idx]
                    .entries
                    .iter()
                    .map(|e| e.value.clone())
                    .collect(),
                capacity: self.buckets[idx].capacity,
            };
            changed.insert(idx, wire);
        }
        let _ = placed_into;
        Ok(())
    }

    /// `replace_nodes`: apply a peer's delta. The sender already
    /// performed redistribution, so this side only grows to match the
    /// sender's depth and overwrites the named buckets positionally.
    pub fn replace_nodes(
        &mut self,
        sender_depth: usize,
        updates: Vec<(usize, Bucket<T>)>,
    ) -> Result<(), TreeError> {
        if sender_depth < self.depth {
            return Err(TreeError::Depth {
                local: self.depth,
                peer: sender_depth,
            });
        }
        self.resize_to_depth(sender_depth);

        for (idx, bucket) in updates {
            if idx >= self.buckets.len() {
                return Err(TreeError::Address { bucket: idx, leaf: idx });
            }
            if bucket.entries.len() > self.capacity_at(idx) {
                return Err(TreeError::Capacity {
                    index: idx,
                    capacity: self.capacity_at(idx),
                });
            }
            let stored = Bucket {
                entries: bucket
                    .entries
                    .into_iter()
                    .map(|value| StoredEntry { value, hash: [0u8; HASH_LEN] })
                    .collect(),
                capacity: bucket.capacity,
            };
            self.actual_size = self.actual_size + stored.entries.len()
                - self.buckets[idx].entries.len();
            self.buckets[idx] = stored;
        }
        Ok(())
    }

    /// Read-only snapshot of all non-empty buckets (debugging/serialization).
    pub fn snapshot(&self) -> Vec<(usize, Bucket<T>)> {
        self.buckets
            .iter()
            .enumerate()
            .filter(|(_, b)| !b.is_empty())
            .map(|(idx, b)| {
                (
                    idx,
                    Bucket {
                        entries: b.entries.iter().map(|e| e.value.clone()).collect(),
                        capacity: b.capacity,
                    },
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::{Element, ElementAndPayload, Payload};
    use crate::prf::PrfKey;

    fn owner_tree() -> (Tree<ElementAndPayload>, HashStream) {
        let key = PrfKey::from_seed(b"tree-test");
        (Tree::new(4, 4), HashStream::new(key))
    }

    #[test]
    fn insert_respects_capacity_and_returns_changed_buckets() {
        let (mut tree, mut hs) = owner_tree();
        let batch: Vec<_> = (0..6)
            .map(|i| ElementAndPayload::no_payload(Element::from_str(&format!("e{i}"))))
            .collect();
        let changed = tree.insert_batch(batch, &mut hs).unwrap();
        assert!(!changed.is_empty());
        for (_, b) in &changed {
            assert!(b.entries.len() <= b.capacity);
        }
        assert_eq!(tree.actual_size(), 6);
    }

    #[test]
    fn depth_grows_to_fit_batch() {
        let (mut tree, mut hs) = owner_tree();
        assert_eq!(tree.depth(), 0);
        let batch: Vec<_> = (0..10)
            .map(|i| ElementAndPayload::no_payload(Element::from_str(&format!("x{i}"))))
            .collect();
        tree.insert_batch(batch, &mut hs).unwrap();
        assert!(tree.depth() >= 1);
    }

    #[test]
    fn batch_exactly_filling_capacity_defers_growth_by_one_slot() {
        let (mut tree, mut hs) = owner_tree();
        assert_eq!(Tree::<ElementAndPayload>::total_slots(0), 2);

        // total_slots(0) - 1 = 1 entry must fit at depth 0 without growing.
        let e0 = ElementAndPayload::no_payload(Element::from_str("a"));
        tree.insert_batch(vec![e0], &mut hs).unwrap();
        assert_eq!(tree.depth(), 0);

        // The entry that would make actual_size hit total_slots(0) forces
        // exactly one level of growth, not zero and not two.
        let e1 = ElementAndPayload::no_payload(Element::from_str("b"));
        tree.insert_batch(vec![e1], &mut hs).unwrap();
        assert_eq!(tree.depth(), 1);

        // Same boundary one level up: total_slots(1) - 1 = 3 entries total
        // fit at depth 1; the 4th forces growth to depth 2.
        let e2 = ElementAndPayload::no_payload(Element::from_str("c"));
        tree.insert_batch(vec![e2], &mut hs).unwrap();
        assert_eq!(tree.depth(), 1);

        let e3 = ElementAndPayload::no_payload(Element::from_str("d"));
        tree.insert_batch(vec![e3], &mut hs).unwrap();
        assert_eq!(tree.depth(), 2);
    }

    #[test]
    fn stash_saturation_under_node_size_2_stash_size_2_returns_stash_error() {
        // Every entry carries the identical all-ones hash, so every
        // insertion's `own_leaf` equals the current target leaf exactly
        // (steps == 0) regardless of how deep the tree grows: all ten
        // entries forever compete for the same single root-to-leaf chain
        // plus the stash, rather than spreading out across the tree the
        // way distinct hashes would.
        let mut tree: Tree<ElementAndPayload> = Tree::new(2, 2);
        let same_hash = [0xFFu8; HASH_LEN];
        let mut changed = std::collections::BTreeMap::new();

        for i in 0..10 {
            let v = ElementAndPayload::no_payload(Element::from_str(&format!("e{i}")));
            tree.insert_one(v, same_hash, &mut changed)
                .unwrap_or_else(|e| panic!("entry {i} should still fit: {e}"));
        }

        let overflow = ElementAndPayload::no_payload(Element::from_str("e10"));
        let err = tree.insert_one(overflow, same_hash, &mut changed);
        assert!(
            matches!(err, Err(TreeError::Stash { .. })),
            "11th colliding entry must overflow the stash, got {err:?}"
        );
    }

    #[test]
    fn path_contains_inserted_element_payload() {
        let (mut tree, mut hs) = owner_tree();
        let target = ElementAndPayload::no_payload(Element::from_str("target"));
        let mut batch = vec![target.clone()];
        for i in 0..5 {
            batch.push(ElementAndPayload::no_payload(Element::from_str(&format!(
                "other{i}"
            ))));
        }
        tree.insert_batch(batch, &mut hs).unwrap();

        let key = PrfKey::from_seed(b"tree-test-probe");
        let probe_hash = crate::prf::probe_hash(&key, target.element.as_bytes());
        // Use the same hash stream's derivation convention used for
        // insertion so this test documents the probe-hash call shape; the
        // tree's `path` takes a raw 32-byte hash irrespective of source.
        let _ = probe_hash;

        // Re-derive the hash actually used at insertion time by replaying
        // the same stream from scratch, since PRF insertion hashes are
        // counter-bound rather than content-bound.
        let replay_key = PrfKey::from_seed(b"tree-test");
        let mut replay = HashStream::new(replay_key);
        let target_hash = replay.next_hash();

        let found = tree
            .path(&target_hash)
            .into_iter()
            .any(|e| e.element == target.element);
        assert!(found, "inserted element must appear on its own path");
    }
}
