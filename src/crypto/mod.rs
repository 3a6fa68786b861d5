//! Crypto primitives adapter: a thin, uniform surface over the EC
//! group, ElGamal, Paillier, and BSGS recovery used by the rest of the
//! crate. The tree and party layers depend only on these types, never on
//! `ark_secp256r1`/`num_bigint` directly, so the curve or big-integer
//! backend could be swapped without touching protocol logic.

pub mod bsgs;
pub mod curve;
pub mod elgamal;
pub mod paillier;

pub use bsgs::bsgs_decode;
pub use curve::{hash_to_curve, Point, Scalar};
pub use elgamal::{combine_public_key, ElGamalCiphertext, ElGamalKeyShare, ElGamalPublicKey};
pub use paillier::{PaillierCiphertext, PaillierPrivateShare, PaillierPublicKey};
