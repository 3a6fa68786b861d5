//! EC group operations on the default curve (NIST P-256 / secp256r1), via
//! the `ark_secp256r1` crate layered on the `ark_ec`/`ark_ff` traits used
//! throughout this crate's crypto layer.

#![allow(missing_docs)]

use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::PrimeField;
use ark_secp256r1::{Affine, Fr, Projective};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use blake3::Hasher;

/// Scalar field of the curve.
pub type Scalar = Fr;
/// Affine point on the curve.
pub type Point = Affine;

/// Serialize a point to compressed bytes (used on the wire and for hashing).
pub fn point_to_bytes(p: &Point) -> Vec<u8> {
    let mut out = Vec::new();
    p.serialize_compressed(&mut out).expect("serialize point");
    out
}

/// Parse compressed bytes back into a point.
pub fn point_from_bytes(bytes: &[u8]) -> Option<Point> {
    Point::deserialize_compressed(bytes).ok()
}

/// Hash arbitrary bytes to a scalar (used for mask/nonce derivation where a
/// full hash-to-curve isn't needed).
pub fn hash_to_scalar(domain: &str, bytes: &[u8]) -> Scalar {
    let mut h = Hasher::new();
    h.update(b"upsi.curve.hash_to_scalar.v1");
    h.update(domain.as_bytes());
    h.update(bytes);
    let digest = h.finalize();
    Scalar::from_le_bytes_mod_order(digest.as_bytes())
}

/// Deterministic try-and-increment hash-to-curve: hash `bytes` with a
/// counter suffix until the digest decodes to a valid scalar, then return
/// `scalar * G`. This is how dataset elements are mapped onto the curve for
/// ElGamal encryption (the "x" and "y" of `Enc(y - x)`); it is a function of
/// the element's bytes alone, so both parties derive the same point for the
/// same element without communicating.
///
/// P-256 has cofactor 1, so in practice this returns on the first iteration;
/// the loop exists so the function has a well-defined (if academic) retry
/// path rather than an unconditional `unwrap`.
pub fn hash_to_curve(bytes: &[u8]) -> Point {
    for counter in 0u32..256 {
        let mut h = Hasher::new();
        h.update(b"upsi.curve.hash_to_curve.v1");
        h.update(bytes);
        h.update(&counter.to_be_bytes());
        let digest = h.finalize();
        let scalar = Scalar::from_le_bytes_mod_order(digest.as_bytes());
        if scalar.is_zero() {
            continue;
        }
        return (Point::generator() * scalar).into_affine();
    }
    unreachable!("hash-to-curve exhausted retries on a cofactor-1 curve")
}

use ark_ff::Zero;

/// Scalar multiply a point by an integer scalar.
pub fn scalar_mul(p: &Point, s: &Scalar) -> Point {
    (Projective::from(*p) * s).into_affine()
}

/// Add two points.
pub fn add(a: &Point, b: &Point) -> Point {
    (Projective::from(*a) + Projective::from(*b)).into_affine()
}

/// Negate a point.
pub fn neg(a: &Point) -> Point {
    -*a
}

/// The curve's distinguished generator.
pub fn generator() -> Point {
    Point::generator()
}

/// The point at infinity (additive identity), i.e. the "zero message" in
/// exponential ElGamal.
pub fn identity() -> Point {
    Point::zero()
}
