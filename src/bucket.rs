//! Data model: elements, payloads, and the closed set of bucket
//! content kinds the tree can hold.
//!
//! Bucket content polymorphism is expressed as a small closed enum
//! ([`EncryptedElement`]) rather than per-combination specialized types;
//! the tree itself ([`crate::tree`]) is written once against this enum's
//! shared surface and never matches on the specific variant.

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::crypto::{ElGamalCiphertext, PaillierCiphertext};

/// A dataset element: a nonnegative integer drawn from a fixed domain,
/// unique within a party's own dataset. Carried as raw bytes so callers may
/// interpret it as a big integer (curve hashing) or a fixed-width integer
/// (GC equality) as needed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Element(pub Vec<u8>);

impl Element {
    /// Build an element from a UTF-8 string (the CSV/dataset convention).
    pub fn from_str(s: &str) -> Self {
        Element(s.as_bytes().to_vec())
    }

    /// View as bytes (for hashing to curve or deriving a 64-bit GC input).
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Truncate/extend to a fixed-width `u64` for the GC equality predicate.
    pub fn to_u64_lossy(&self) -> u64 {
        let digest = blake3::hash(&self.0);
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&digest.as_bytes()[..8]);
        u64::from_be_bytes(buf)
    }
}

/// The payload associated with a P0 element. Sign encodes addition
/// (`>= 0`) vs. deletion intent (`< 0`) in the deletion-capable variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    /// No payload carried (PSI, CA).
    None,
    /// A bounded integer value (SUM), or a signed add/delete value
    /// (deletion variant).
    Value(i64),
}

impl Payload {
    /// The payload's sign as an add/delete intent; `None` and `Value(v>=0)`
    /// both mean "add".
    pub fn is_deletion(&self) -> bool {
        matches!(self, Payload::Value(v) if *v < 0)
    }

    /// Numeric value, or zero if absent.
    pub fn value(&self) -> i64 {
        match self {
            Payload::None => 0,
            Payload::Value(v) => *v,
        }
    }
}

/// A plaintext element/payload pair, as held in `my_tree`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementAndPayload {
    pub element: Element,
    pub payload: Payload,
}

impl ElementAndPayload {
    pub fn new(element: Element, payload: Payload) -> Self {
        ElementAndPayload { element, payload }
    }

    pub fn no_payload(element: Element) -> Self {
        ElementAndPayload {
            element,
            payload: Payload::None,
        }
    }
}

/// A single encrypted bucket cell. The closed set of content kinds named
/// : `NoPayload` (PSI probe target / CA),
/// `ElGamalPair` (element + ElGamal payload, SUM), `ElGamalPaillier`
/// (element under ElGamal, payload under Paillier, SS), and `PaillierPair`
/// (both under Paillier, deletion variant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EncryptedElement {
    NoPayload {
        element: ElGamalCiphertext,
    },
    ElGamalPair {
        element: ElGamalCiphertext,
        payload: ElGamalCiphertext,
    },
    ElGamalPaillier {
        element: ElGamalCiphertext,
        payload: PaillierCiphertext,
    },
    PaillierPair {
        element: PaillierCiphertext,
        payload: PaillierCiphertext,
    },
}

impl EncryptedElement {
    /// The ElGamal ciphertext component, if this variant carries one.
    pub fn elgamal_element(&self) -> Option<&ElGamalCiphertext> {
        match self {
            EncryptedElement::NoPayload { element }
            | EncryptedElement::ElGamalPair { element, .. }
            | EncryptedElement::ElGamalPaillier { element, .. } => Some(element),
            EncryptedElement::PaillierPair { .. } => None,
        }
    }

    /// The Paillier ciphertext element component, if this variant carries one.
    pub fn paillier_element(&self) -> Option<&PaillierCiphertext> {
        match self {
            EncryptedElement::PaillierPair { element, .. } => Some(element),
            _ => None,
        }
    }
}

/// A pad element: a fresh encryption of a random draw from a padding
/// domain disjoint from the real element domain, so peers cannot tell
/// occupied cells from padding by content.
pub fn pad_scalar(rng: &mut impl rand::RngCore) -> BigInt {
    use num_bigint::RandBigInt;
    BigInt::from(rng.gen_bigint(256))
}

/// A fixed-capacity, ordered container of entries. Generic over the
/// content type so the same `Bucket<T>` shape backs `my_tree`
/// (`T = ElementAndPayload`) and `other_tree` (`T = EncryptedElement`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bucket<T> {
    pub entries: Vec<T>,
    pub capacity: usize,
}

impl<T> Bucket<T> {
    pub fn new(capacity: usize) -> Self {
        Bucket {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Attempt to add an entry; returns `false` (without mutating) if full.
    pub fn add(&mut self, entry: T) -> bool {
        if self.is_full() {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn take_all(&mut self) -> Vec<T> {
        std::mem::take(&mut self.entries)
    }
}
