//! Rerandomizable, multiplicatively-homomorphic (exponential) ElGamal with
//! a 2-of-2 threshold decryption split: `Encrypt`, `Invert`, `Mul`, `Exp`,
//! `ReRandomize`, `PartialDecrypt`, `Decrypt`, `DecryptExp`.
//!
//! Messages are encoded additively on the curve (`M = m * G`), so `Mul`
//! (homomorphic message addition) and `Exp` (homomorphic scalar multiply)
//! are plain EC-point operations; recovering an integer message back out
//! requires the baby-step-giant-step search in [`crate::crypto::bsgs`].

use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::UniformRand;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::curve::{self, Point, Scalar};
use crate::error::CryptoError;

/// An ElGamal ciphertext `(c1, c2) = (r*G, r*PK + M)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElGamalCiphertext {
    #[serde(with = "point_serde")]
    pub c1: Point,
    #[serde(with = "point_serde")]
    pub c2: Point,
}

mod point_serde {
    use super::Point;
    use crate::crypto::curve::{point_from_bytes, point_to_bytes};
    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(p: &Point, s: S) -> Result<S::Ok, S::Error> {
        hex::encode(point_to_bytes(p)).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Point, D::Error> {
        let hexstr = String::deserialize(d)?;
        let bytes = hex::decode(hexstr).map_err(D::Error::custom)?;
        point_from_bytes(&bytes).ok_or_else(|| D::Error::custom("invalid curve point"))
    }
}

/// The jointly-known public key `PK = (sk0 + sk1) * G`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ElGamalPublicKey {
    #[serde(with = "point_serde")]
    pub pk: Point,
}

/// One party's share of the 2-of-2 threshold private key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ElGamalKeyShare {
    #[serde(with = "scalar_serde")]
    pub share: Scalar,
}

mod scalar_serde {
    use super::Scalar;
    use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &Scalar, s: S) -> Result<S::Ok, S::Error> {
        let mut bytes = Vec::new();
        v.serialize_compressed(&mut bytes)
            .map_err(serde::ser::Error::custom)?;
        hex::encode(bytes).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Scalar, D::Error> {
        let hexstr = String::deserialize(d)?;
        let bytes = hex::decode(hexstr).map_err(D::Error::custom)?;
        Scalar::deserialize_compressed(&bytes[..]).map_err(D::Error::custom)
    }
}

impl ElGamalKeyShare {
    /// Generate a fresh random share.
    pub fn random(rng: &mut impl RngCore) -> Self {
        ElGamalKeyShare {
            share: Scalar::rand(rng),
        }
    }

    /// This share's contribution to the public key, `share * G`.
    pub fn public_share(&self) -> Point {
        curve::scalar_mul(&curve::generator(), &self.share)
    }
}

/// Combine two independently generated shares into the joint public key.
pub fn combine_public_key(a: &ElGamalKeyShare, b: &ElGamalKeyShare) -> ElGamalPublicKey {
    ElGamalPublicKey {
        pk: curve::add(&a.public_share(), &b.public_share()),
    }
}

impl ElGamalPublicKey {
    /// Encrypt a curve point message under this public key with fresh
    /// randomness `r`.
    pub fn encrypt(&self, message: &Point, rng: &mut impl RngCore) -> ElGamalCiphertext {
        let r = Scalar::rand(rng);
        let c1 = curve::scalar_mul(&curve::generator(), &r);
        let c2 = curve::add(&curve::scalar_mul(&self.pk, &r), message);
        ElGamalCiphertext { c1, c2 }
    }

    /// Encrypt an integer as `m * G` (exponential ElGamal), for payloads
    /// that must later be recovered via BSGS (SUM).
    pub fn encrypt_i64(&self, m: i64, rng: &mut impl RngCore) -> ElGamalCiphertext {
        let scalar = i64_to_scalar(m);
        let point = curve::scalar_mul(&curve::generator(), &scalar);
        self.encrypt(&point, rng)
    }

    /// Rerandomize a ciphertext: add an encryption of the identity, yielding
    /// a fresh ciphertext under the same plaintext.
    pub fn rerandomize(&self, ct: &ElGamalCiphertext, rng: &mut impl RngCore) -> ElGamalCiphertext {
        let pad = self.encrypt(&curve::identity(), rng);
        mul(ct, &pad)
    }
}

fn i64_to_scalar(m: i64) -> Scalar {
    if m >= 0 {
        Scalar::from(m as u64)
    } else {
        -Scalar::from((-m) as u64)
    }
}

/// Homomorphic negation of the message: `Invert((c1, c2)) = (-c1, -c2)`.
pub fn invert(ct: &ElGamalCiphertext) -> ElGamalCiphertext {
    ElGamalCiphertext {
        c1: curve::neg(&ct.c1),
        c2: curve::neg(&ct.c2),
    }
}

/// Homomorphic message addition: `Mul((c1,c2),(c1',c2')) = (c1+c1', c2+c2')`.
pub fn mul(a: &ElGamalCiphertext, b: &ElGamalCiphertext) -> ElGamalCiphertext {
    ElGamalCiphertext {
        c1: curve::add(&a.c1, &b.c1),
        c2: curve::add(&a.c2, &b.c2),
    }
}

/// Homomorphic scalar multiply of the message: `Exp(ct, alpha)`.
pub fn exp(ct: &ElGamalCiphertext, alpha: &Scalar) -> ElGamalCiphertext {
    ElGamalCiphertext {
        c1: curve::scalar_mul(&ct.c1, alpha),
        c2: curve::scalar_mul(&ct.c2, alpha),
    }
}

/// A partially decrypted ciphertext: `c2 - share * c1`, still carrying the
/// other party's share.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PartialDecryption {
    #[serde(with = "point_serde")]
    pub c1: Point,
    #[serde(with = "point_serde")]
    pub value: Point,
}

/// Consume one key share to partially decrypt a ciphertext.
pub fn partial_decrypt(ct: &ElGamalCiphertext, share: &ElGamalKeyShare) -> PartialDecryption {
    PartialDecryption {
        c1: ct.c1,
        value: curve::add(&ct.c2, &curve::neg(&curve::scalar_mul(&ct.c1, &share.share))),
    }
}

/// Complete decryption with the other party's share, recovering the
/// plaintext curve point `M`.
pub fn decrypt(partial: &PartialDecryption, other_share: &ElGamalKeyShare) -> Point {
    curve::add(
        &partial.value,
        &curve::neg(&curve::scalar_mul(&partial.c1, &other_share.share)),
    )
}

/// Check whether a fully-recovered plaintext point is the identity, i.e.
/// whether the homomorphic `y - x` was zero (an intersection hit).
pub fn is_identity(point: &Point) -> bool {
    point.is_zero()
}

/// Recover a small signed integer message via baby-step-giant-step,
/// bounded by `max_abs`. Fails with [`CryptoError::BsgsNotFound`] if no
/// integer in `[-max_abs, max_abs]` maps to `point`.
pub fn decrypt_exp(point: &Point, max_abs: i64) -> Result<i64, CryptoError> {
    super::bsgs::bsgs_decode(point, max_abs).ok_or(CryptoError::BsgsNotFound { max_sum: max_abs })
}
