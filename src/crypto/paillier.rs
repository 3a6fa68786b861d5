//! Additively-homomorphic Paillier with a 2-of-2 threshold decryption
//! split: `Encrypt`, `Add`, `Multiply`, `ReRand`, `PartialDecrypt`,
//! `Decrypt`.
//!
//! The threshold split is directional rather than symmetric: the private
//! exponent `lambda` is split additively into `lambda0 + lambda1 = lambda`,
//! and each side can locally raise a ciphertext to its own share
//! ([`partial_decrypt`]). Combining both shares' contributions and applying
//! the final `L`/`mu` step ([`decrypt`]) requires the Carmichael inverse
//! `mu`, which in this protocol is known only to whichever party is the
//! designated *completer* for a given exchange (B completes SS shares, A
//! completes the SUM total) — so `mu` lives only on that side's
//! [`PaillierPrivateShare`], not on both.

use num_bigint::{BigInt, BigUint, RandBigInt, Sign};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

fn biguint_serde_hex(v: &BigUint) -> String {
    hex::encode(v.to_bytes_be())
}
fn biguint_from_hex(s: &str) -> Result<BigUint, hex::FromHexError> {
    Ok(BigUint::from_bytes_be(&hex::decode(s)?))
}

/// The Paillier public key `(n, n^2)`. Uses the common optimization `g = n+1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaillierPublicKey {
    #[serde(serialize_with = "ser_biguint", deserialize_with = "de_biguint")]
    pub n: BigUint,
    #[serde(serialize_with = "ser_biguint", deserialize_with = "de_biguint")]
    pub n_squared: BigUint,
}

fn ser_biguint<S: serde::Serializer>(v: &BigUint, s: S) -> Result<S::Ok, S::Error> {
    serde::Serialize::serialize(&biguint_serde_hex(v), s)
}
fn de_biguint<'de, D: serde::Deserializer<'de>>(d: D) -> Result<BigUint, D::Error> {
    let s: String = serde::Deserialize::deserialize(d)?;
    biguint_from_hex(&s).map_err(serde::de::Error::custom)
}

/// A Paillier ciphertext, `c in Z_{n^2}^*`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaillierCiphertext {
    #[serde(serialize_with = "ser_biguint", deserialize_with = "de_biguint")]
    pub c: BigUint,
}

/// One party's additive share of the private exponent, plus (only on the
/// designated completing side) the Carmichael inverse needed to finish a
/// decryption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaillierPrivateShare {
    pub lambda_share: BigInt,
    pub mu: Option<BigUint>,
}

impl PaillierPublicKey {
    /// Encrypt `m` (any representative, reduced mod n) with fresh
    /// randomness `r` coprime to `n`.
    pub fn encrypt(&self, m: &BigInt, rng: &mut impl RngCore) -> PaillierCiphertext {
        let m_mod_n = mod_bigint(m, &self.n);
        let r = self.sample_unit(rng);
        // g^m = (1+n)^m ≡ 1 + m*n (mod n^2)
        let gm = (BigUint::one() + &m_mod_n * &self.n) % &self.n_squared;
        let rn = r.modpow(&self.n, &self.n_squared);
        let c = (gm * rn) % &self.n_squared;
        PaillierCiphertext { c }
    }

    /// Encrypt a nonnegative or negative `i64`, shifting negatives into
    /// `n - |v|` per the deletion-variant sign convention.
    pub fn encrypt_signed(&self, v: i64, rng: &mut impl RngCore) -> PaillierCiphertext {
        let plain = if v >= 0 {
            BigInt::from(v)
        } else {
            BigInt::from_biguint(Sign::Plus, &self.n - BigUint::from((-v) as u64))
        };
        self.encrypt(&plain, rng)
    }

    fn sample_unit(&self, rng: &mut impl RngCore) -> BigUint {
        loop {
            let candidate = rng.gen_biguint_below(&self.n);
            if candidate.is_zero() {
                continue;
            }
            if candidate.gcd(&self.n) == BigUint::one() {
                return candidate;
            }
        }
    }

    /// Homomorphic addition of two ciphertexts' plaintexts.
    pub fn add(&self, a: &PaillierCiphertext, b: &PaillierCiphertext) -> PaillierCiphertext {
        PaillierCiphertext {
            c: (&a.c * &b.c) % &self.n_squared,
        }
    }

    /// Homomorphic scalar multiplication of the plaintext by `scalar`.
    pub fn multiply(&self, a: &PaillierCiphertext, scalar: &BigInt) -> PaillierCiphertext {
        let scalar_mod = mod_bigint(scalar, &self.n);
        PaillierCiphertext {
            c: a.c.modpow(&scalar_mod, &self.n_squared),
        }
    }

    /// Rerandomize a ciphertext in place of a fresh encryption of the same
    /// plaintext.
    pub fn rerandomize(&self, a: &PaillierCiphertext, rng: &mut impl RngCore) -> PaillierCiphertext {
        let r = self.sample_unit(rng);
        let rn = r.modpow(&self.n, &self.n_squared);
        PaillierCiphertext {
            c: (&a.c * rn) % &self.n_squared,
        }
    }
}

fn mod_bigint(v: &BigInt, modulus: &BigUint) -> BigUint {
    let m = BigInt::from_biguint(Sign::Plus, modulus.clone());
    let r = ((v % &m) + &m) % &m;
    r.to_biguint().expect("nonnegative by construction")
}

/// Consume this side's share of `lambda` to raise `ct` to `lambda_share`.
/// Produces a partial result that the designated completer combines with
/// its own share via [`decrypt`].
pub fn partial_decrypt(ct: &PaillierCiphertext, share: &PaillierPrivateShare, pk: &PaillierPublicKey) -> PaillierCiphertext {
    let exponent = mod_signed_to_unsigned(&share.lambda_share, &pk.n_squared);
    PaillierCiphertext {
        c: ct.c.modpow(&exponent, &pk.n_squared),
    }
}

fn mod_signed_to_unsigned(v: &BigInt, modulus: &BigUint) -> BigUint {
    let m = BigInt::from_biguint(Sign::Plus, modulus.clone());
    let r = ((v % &m) + &m) % &m;
    r.to_biguint().expect("nonnegative by construction")
}

/// Finish a decryption given the other side's partial result, this side's
/// own share (including `mu`), and the original ciphertext. Only valid for
/// a [`PaillierPrivateShare`] whose `mu` is populated.
pub fn decrypt(
    other_partial: &PaillierCiphertext,
    own_share: &PaillierPrivateShare,
    ct: &PaillierCiphertext,
    pk: &PaillierPublicKey,
) -> Result<BigInt, CryptoError> {
    let mu = own_share.mu.as_ref().ok_or(CryptoError::InvalidCiphertext)?;
    let own_partial = partial_decrypt(ct, own_share, pk);
    let combined = (&other_partial.c * &own_partial.c) % &pk.n_squared;
    let l = l_function(&combined, &pk.n)?;
    let m = (l * mu) % &pk.n;
    Ok(signed_representative(&m, &pk.n))
}

fn l_function(x: &BigUint, n: &BigUint) -> Result<BigUint, CryptoError> {
    if x < &BigUint::one() {
        return Err(CryptoError::RangeError);
    }
    Ok((x - BigUint::one()) / n)
}

/// Map a value in `[0, n)` to a signed representative in `(-n/2, n/2]`,
/// undoing the deletion variant's `N - |v|` convention.
fn signed_representative(v: &BigUint, n: &BigUint) -> BigInt {
    let half = n / BigUint::from(2u8);
    if *v > half {
        -BigInt::from_biguint(Sign::Plus, n - v)
    } else {
        BigInt::from_biguint(Sign::Plus, v.clone())
    }
}

/// A freshly generated Paillier keypair, split into two private shares.
/// Represents the output of a trusted key-generation step (the external
/// `keygen` binary) — not something either protocol party computes for
/// itself at runtime.
pub struct PaillierKeyPair {
    pub public: PaillierPublicKey,
    pub share0: PaillierPrivateShare,
    pub share1: PaillierPrivateShare,
}

/// Generate a Paillier keypair with primes of approximately `bits` bits
/// each, and split the decryption material into two shares. `mu` (the
/// finishing constant) is attached to `share1` only, matching this crate's
/// convention that P1 is the designated completer for SS and P0 for SUM
/// (callers that need the other direction construct a second keypair, or
/// swap which share carries `mu`).
pub fn generate_keypair(bits: u64, rng: &mut impl RngCore) -> PaillierKeyPair {
    let p = random_prime(bits, rng);
    let q = random_prime(bits, rng);
    let n = &p * &q;
    let n_squared = &n * &n;
    let lambda = lcm(&(&p - BigUint::one()), &(&q - BigUint::one()));
    let mu = mod_inverse(&lambda, &n).expect("lambda invertible mod n for RSA moduli");

    let lambda_signed = BigInt::from_biguint(Sign::Plus, lambda);
    let half_bound = BigInt::from_biguint(Sign::Plus, n.clone());
    let lambda0 = rng.gen_bigint_range(&BigInt::zero(), &half_bound);
    let lambda1 = &lambda_signed - &lambda0;

    let public = PaillierPublicKey { n: n.clone(), n_squared };
    PaillierKeyPair {
        public,
        share0: PaillierPrivateShare {
            lambda_share: lambda0,
            mu: None,
        },
        share1: PaillierPrivateShare {
            lambda_share: lambda1,
            mu: Some(mu),
        },
    }
}

fn lcm(a: &BigUint, b: &BigUint) -> BigUint {
    a / a.gcd(b) * b
}

fn mod_inverse(a: &BigUint, modulus: &BigUint) -> Option<BigUint> {
    let a_signed = BigInt::from_biguint(Sign::Plus, a.clone());
    let m_signed = BigInt::from_biguint(Sign::Plus, modulus.clone());
    let (g, x, _y) = extended_gcd(&a_signed, &m_signed);
    if g != BigInt::one() {
        return None;
    }
    let m = &m_signed;
    let result = ((x % m) + m) % m;
    result.to_biguint()
}

fn extended_gcd(a: &BigInt, b: &BigInt) -> (BigInt, BigInt, BigInt) {
    if b.is_zero() {
        (a.clone(), BigInt::one(), BigInt::zero())
    } else {
        let (g, x1, y1) = extended_gcd(b, &(a % b));
        let q = a / b;
        (g, y1.clone(), x1 - &q * &y1)
    }
}

fn random_prime(bits: u64, rng: &mut impl RngCore) -> BigUint {
    loop {
        let mut candidate = rng.gen_biguint(bits);
        candidate.set_bit(bits - 1, true);
        candidate.set_bit(0, true);
        if is_probable_prime(&candidate, 40, rng) {
            return candidate;
        }
    }
}

/// Miller-Rabin primality test with `rounds` random witnesses.
fn is_probable_prime(n: &BigUint, rounds: u32, rng: &mut impl RngCore) -> bool {
    let small_primes: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];
    if *n < BigUint::from(2u8) {
        return false;
    }
    for &sp in &small_primes {
        let spb = BigUint::from(sp);
        if *n == spb {
            return true;
        }
        if (n % &spb).is_zero() {
            return false;
        }
    }

    let one = BigUint::one();
    let n_minus_one = n - &one;
    let mut d = n_minus_one.clone();
    let mut r = 0u32;
    while (&d % 2u8).is_zero() {
        d /= 2u8;
        r += 1;
    }

    'witness: for _ in 0..rounds {
        let a = rng.gen_biguint_range(&BigUint::from(2u8), &n_minus_one);
        let mut x = a.modpow(&d, n);
        if x == one || x == n_minus_one {
            continue;
        }
        for _ in 0..r.saturating_sub(1) {
            x = x.modpow(&BigUint::from(2u8), n);
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn test_keypair(rng: &mut StdRng) -> PaillierKeyPair {
        // Small primes: fine for unit tests, never for production use.
        generate_keypair(64, rng)
    }

    #[test]
    fn encrypt_decrypt_roundtrip_positive_and_negative() {
        let mut rng = StdRng::from_seed([1u8; 32]);
        let kp = test_keypair(&mut rng);
        for m in [0i64, 1, 42, -42, 1000] {
            let ct = kp.public.encrypt_signed(m, &mut rng);
            let p0 = partial_decrypt(&ct, &kp.share0, &kp.public);
            let recovered = decrypt(&p0, &kp.share1, &ct, &kp.public).unwrap();
            assert_eq!(recovered, BigInt::from(m));
        }
    }

    #[test]
    fn add_is_homomorphic() {
        let mut rng = StdRng::from_seed([2u8; 32]);
        let kp = test_keypair(&mut rng);
        let a = kp.public.encrypt_signed(7, &mut rng);
        let b = kp.public.encrypt_signed(9, &mut rng);
        let sum = kp.public.add(&a, &b);
        let p0 = partial_decrypt(&sum, &kp.share0, &kp.public);
        let recovered = decrypt(&p0, &kp.share1, &sum, &kp.public).unwrap();
        assert_eq!(recovered, BigInt::from(16));
    }

    #[test]
    fn rerandomize_preserves_plaintext() {
        let mut rng = StdRng::from_seed([3u8; 32]);
        let kp = test_keypair(&mut rng);
        let a = kp.public.encrypt_signed(5, &mut rng);
        let b = kp.public.rerandomize(&a, &mut rng);
        assert_ne!(a.c, b.c);
        let p0 = partial_decrypt(&b, &kp.share0, &kp.public);
        let recovered = decrypt(&p0, &kp.share1, &b, &kp.public).unwrap();
        assert_eq!(recovered, BigInt::from(5));
    }

    #[test]
    fn deletion_sign_convention_cancels() {
        let mut rng = StdRng::from_seed([4u8; 32]);
        let kp = test_keypair(&mut rng);
        let add = kp.public.encrypt_signed(5, &mut rng);
        let del = kp.public.encrypt_signed(-5, &mut rng);
        let combined = kp.public.add(&add, &del);
        let p0 = partial_decrypt(&combined, &kp.share0, &kp.public);
        let recovered = decrypt(&p0, &kp.share1, &combined, &kp.public).unwrap();
        assert_eq!(recovered, BigInt::from(0));
    }
}
