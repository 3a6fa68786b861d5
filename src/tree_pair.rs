//! The plaintext/encrypted tree pair: `my_tree` holds a party's own
//! elements in the clear; `other_tree` mirrors the peer's elements under
//! encryption, kept in lockstep via the shared PRF and the peer's nightly
//! `TreeUpdates` delta.

use rand::RngCore;

use crate::bucket::{Bucket, Element, ElementAndPayload, EncryptedElement, Payload};
use crate::crypto::ElGamalPublicKey;
use crate::error::TreeError;
use crate::prf::{HashStream, HASH_LEN};
use crate::tree::Tree;

/// A party's view of both trees for one functionality's session.
pub struct TreePair {
    pub my_tree: Tree<ElementAndPayload>,
    pub other_tree: Tree<EncryptedElement>,
    hash_stream: HashStream,
}

/// A bucket-indexed delta as sent over the wire after an `insert` batch.
pub type TreeUpdates<T> = Vec<(usize, Bucket<T>)>;

impl TreePair {
    pub fn new(node_size: usize, stash_size: usize, hash_stream: HashStream) -> Self {
        TreePair {
            my_tree: Tree::new(node_size, stash_size),
            other_tree: Tree::new(node_size, stash_size),
            hash_stream,
        }
    }

    /// Insert today's batch of own elements into `my_tree`, returning the
    /// plaintext delta to encrypt and send to the peer as that peer's
    /// `other_tree` update.
    pub fn update_mine(
        &mut self,
        batch: Vec<ElementAndPayload>,
    ) -> Result<TreeUpdates<ElementAndPayload>, TreeError> {
        self.my_tree.insert_batch(batch, &mut self.hash_stream)
    }

    /// Encrypt a plaintext delta under the peer's (or the joint) ElGamal
    /// public key, ready to be sent as the wire-level `TreeUpdates` message.
    /// Paillier-only variants build their own payload separately
    /// (see `deletion.rs`).
    pub fn encrypt_delta(
        delta: &TreeUpdates<ElementAndPayload>,
        pk: &ElGamalPublicKey,
        rng: &mut impl RngCore,
    ) -> TreeUpdates<EncryptedElement> {
        delta
            .iter()
            .map(|(idx, bucket)| {
                let entries = bucket
                    .entries
                    .iter()
                    .map(|ep| encrypt_entry(ep, pk, rng))
                    .collect();
                (
                    *idx,
                    Bucket {
                        entries,
                        capacity: bucket.capacity,
                    },
                )
            })
            .collect()
    }

    /// Apply the peer's encrypted delta (and matching depth) to `other_tree`.
    pub fn apply_peer_delta(
        &mut self,
        peer_depth: usize,
        updates: TreeUpdates<EncryptedElement>,
    ) -> Result<(), TreeError> {
        self.other_tree.replace_nodes(peer_depth, updates)
    }

    /// Hash used to probe both trees for `element` (content-derived, not
    /// counter-derived, so it is stable across days for the same element).
    pub fn probe_hash(&self, key: &crate::prf::PrfKey, element: &Element) -> [u8; HASH_LEN] {
        crate::prf::probe_hash(key, element.as_bytes())
    }
}

fn encrypt_entry(
    ep: &ElementAndPayload,
    pk: &ElGamalPublicKey,
    rng: &mut impl RngCore,
) -> EncryptedElement {
    let element_point = crate::crypto::curve::hash_to_curve(ep.element.as_bytes());
    let element_ct = pk.encrypt(&element_point, rng);
    match ep.payload {
        Payload::None => EncryptedElement::NoPayload {
            element: element_ct,
        },
        Payload::Value(v) => EncryptedElement::ElGamalPair {
            element: element_ct,
            payload: pk.encrypt_i64(v, rng),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{combine_public_key, ElGamalKeyShare};
    use crate::prf::PrfKey;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn insert_then_encrypt_then_apply_round_trips_counts() {
        let mut rng = StdRng::from_seed([3u8; 32]);
        let share_a = ElGamalKeyShare::random(&mut rng);
        let share_b = ElGamalKeyShare::random(&mut rng);
        let pk = combine_public_key(&share_a, &share_b);

        let stream = HashStream::new(PrfKey::from_seed(b"pair-test"));
        let mut mine = TreePair::new(4, 4, stream);

        let batch: Vec<_> = (0..5)
            .map(|i| ElementAndPayload::no_payload(Element::from_str(&format!("p{i}"))))
            .collect();
        let delta = mine.update_mine(batch).unwrap();
        assert!(!delta.is_empty());

        let encrypted = TreePair::encrypt_delta(&delta, &pk, &mut rng);

        let peer_stream = HashStream::new(PrfKey::from_seed(b"peer-unused"));
        let mut theirs = TreePair::new(4, 4, peer_stream);
        theirs
            .apply_peer_delta(mine.my_tree.depth(), encrypted)
            .unwrap();
        assert_eq!(theirs.other_tree.depth(), mine.my_tree.depth());
    }
}
