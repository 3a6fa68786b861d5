//! Candidate evaluator: per-probed-element homomorphic `Enc(y - x)`
//! construction along a probe path, shuffle + mask + partial decryption on
//! the responder side, and final decryption/hit detection on the prober
//! side.
//!
//! Role convention (matches the transport's client/server split):
//! the client (`P0`) is the *prober*, "A"; the server (`P1`) is the
//! *responder*, "B". Both sides build candidates from their own daily
//! batch against their mirrored view of the peer's tree; only the
//! responder shuffles, masks, and partially decrypts the combined list.

use rand::seq::SliceRandom;
use rand::RngCore;

use crate::bucket::EncryptedElement;
use crate::crypto::elgamal::{self, ElGamalCiphertext, ElGamalKeyShare, ElGamalPublicKey, PartialDecryption};
use crate::crypto::paillier::{self, PaillierCiphertext, PaillierPrivateShare, PaillierPublicKey};
use crate::error::CryptoError;
use num_bigint::{BigInt, RandBigInt, Sign};
use crate::crypto::{curve, Scalar};

/// The payload half of a candidate, when the functionality carries one.
#[derive(Debug, Clone)]
pub enum CandidatePayload {
    ElGamal(ElGamalCiphertext),
    Paillier(PaillierCiphertext),
    /// PSI only: the responder's partial decryption of the (masked)
    /// recovery payload. PSI has no round three, so the responder must
    /// finish its half of the payload decryption inline on `MessageII`
    /// rather than leave it for a later message.
    ElGamalPartial(PartialDecryption),
}

/// A single "is *x* at this path position?" question: the homomorphic
/// element difference, plus an optional coupled payload ciphertext.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub diff: ElGamalCiphertext,
    pub payload: Option<CandidatePayload>,
}

/// Build one candidate per bucket-cell ciphertext on `path`, for probed
/// element `x`. `recovery_payload` is `Some(Encrypt(g^x))` for PSI (so a
/// hit can be mapped back to the plaintext element) and `None` for CA;
/// SUM/SS attach the probed element's own payload ciphertext instead via
/// `payload_override`.
pub fn build_candidates(
    path: &[&EncryptedElement],
    x: &[u8],
    pk: &ElGamalPublicKey,
    recovery_payload: Option<&ElGamalCiphertext>,
    payload_override: Option<&CandidatePayload>,
    rng: &mut impl RngCore,
) -> Vec<Candidate> {
    let x_point = curve::hash_to_curve(x);
    let x_ct = pk.encrypt(&x_point, rng);
    let neg_x = elgamal::invert(&x_ct);

    path.iter()
        .filter_map(|cell| cell.elgamal_element().map(|y_ct| (cell, y_ct)))
        .map(|(cell, y_ct)| {
            let diff = elgamal::mul(y_ct, &neg_x);
            let payload = payload_override.cloned().or_else(|| {
                recovery_payload.map(|p| CandidatePayload::ElGamal(pk.rerandomize(p, rng)))
            });
            let _ = cell;
            Candidate { diff, payload }
        })
        .collect()
}

/// Responder-side step (steps 5–7): shuffle the combined candidate
/// list, mask each with an independent scalar (so a miss randomizes to a
/// uniform nonzero ciphertext), and partially decrypt with `share`.
///
/// `independent_payload_mask` selects the PSI-specific behavior: when
/// `true`, the payload is masked with its own independent scalar `β`
/// (distinct from the element mask `α`) so a non-match never leaks the
/// element-recovery key; when `false` (SUM/SS), the payload is only
/// rerandomized, since downstream only confirmed hits are aggregated.
pub fn shuffle_mask_and_partial_decrypt(
    mut candidates: Vec<Candidate>,
    pk: &ElGamalPublicKey,
    share: &ElGamalKeyShare,
    independent_payload_mask: bool,
    rng: &mut impl RngCore,
) -> Vec<PartialCandidate> {
    use ark_ff::UniformRand;

    candidates.shuffle(rng);

    candidates
        .into_iter()
        .map(|c| {
            let alpha = Scalar::rand(rng);
            let masked_diff = elgamal::exp(&c.diff, &alpha);
            let payload = c.payload.map(|p| match p {
                CandidatePayload::ElGamal(ct) => {
                    if independent_payload_mask {
                        let beta = Scalar::rand(rng);
                        let masked = elgamal::exp(&ct, &beta);
                        CandidatePayload::ElGamalPartial(elgamal::partial_decrypt(&masked, share))
                    } else {
                        CandidatePayload::ElGamal(pk.rerandomize(&ct, rng))
                    }
                }
                CandidatePayload::Paillier(ct) => CandidatePayload::Paillier(ct),
                CandidatePayload::ElGamalPartial(p) => CandidatePayload::ElGamalPartial(p),
            });
            PartialCandidate {
                diff: elgamal::partial_decrypt(&masked_diff, share),
                payload,
            }
        })
        .collect()
}

/// A candidate after the responder's mask + partial decryption step, as
/// carried on `MessageII`.
#[derive(Debug, Clone)]
pub struct PartialCandidate {
    pub diff: PartialDecryption,
    pub payload: Option<CandidatePayload>,
}

/// Outcome of fully decrypting one candidate on the prober side.
pub struct CandidateResult {
    pub is_hit: bool,
    pub payload: Option<CandidatePayload>,
    /// PSI only: the fully recovered `g^x` point, once the responder's
    /// partial decryption is completed with this party's own share.
    pub recovered_point: Option<crate::crypto::Point>,
}

/// Prober-side final step: complete decryption with the other share and
/// test for the identity element. For PSI, also finishes decrypting the
/// payload so the element behind a hit can be recovered without a further
/// round trip.
pub fn decrypt_candidates(
    partials: &[PartialCandidate],
    other_share: &ElGamalKeyShare,
) -> Vec<CandidateResult> {
    partials
        .iter()
        .map(|p| {
            let point = elgamal::decrypt(&p.diff, other_share);
            let recovered_point = match &p.payload {
                Some(CandidatePayload::ElGamalPartial(partial)) => {
                    Some(elgamal::decrypt(partial, other_share))
                }
                _ => None,
            };
            CandidateResult {
                is_hit: elgamal::is_identity(&point),
                payload: p.payload.clone(),
                recovered_point,
            }
        })
        .collect()
}

/// CA: count hits.
pub fn count_hits(results: &[CandidateResult]) -> usize {
    results.iter().filter(|r| r.is_hit).count()
}

/// SUM: homomorphically sum the ElGamal payload ciphertexts of every hit,
/// for the party to then send onward as `MessageIII_SUM`.
pub fn sum_hit_payloads(
    results: &[CandidateResult],
    pk: &ElGamalPublicKey,
    rng: &mut impl RngCore,
) -> ElGamalCiphertext {
    let mut acc = pk.encrypt_i64(0, rng);
    for r in results {
        if !r.is_hit {
            continue;
        }
        if let Some(CandidatePayload::ElGamal(ct)) = &r.payload {
            acc = elgamal::mul(&acc, ct);
        }
    }
    acc
}

/// SS: for each hit, sample a fresh additive share `s`, keep `-s mod N` as
/// this party's own share, and return the Paillier ciphertext of
/// `payload + s` to send onward together with this party's partial
/// decryption of it.
pub fn split_hit_shares(
    results: &[CandidateResult],
    pub_key: &PaillierPublicKey,
    rng: &mut impl RngCore,
) -> Vec<(PaillierCiphertext, BigInt)> {
    results
        .iter()
        .filter(|r| r.is_hit)
        .filter_map(|r| match &r.payload {
            Some(CandidatePayload::Paillier(ct)) => {
                let s = rng.gen_biguint_below(&pub_key.n);
                let s_signed = BigInt::from_biguint(Sign::Plus, s);
                let own_share = -s_signed.clone();
                let blinded = pub_key.add(ct, &pub_key.encrypt(&s_signed, rng));
                Some((blinded, own_share))
            }
            _ => None,
        })
        .collect()
}

/// Deletion-capable variant of [`split_hit_shares`]: emits one blinded
/// share per Paillier-carrying candidate *regardless of `is_hit`*, with a
/// miss's contribution replaced by a fresh `Enc(0)` rather than omitted.
/// Paillier ciphertexts are semantically secure, so a miss's blinded
/// share is indistinguishable from a hit's to whoever only holds the
/// public key -- the peer can no longer infer how many of today's
/// candidates matched from the length of this vector, the way
/// [`split_hit_shares`]'s hit-only filtering allows.
pub fn split_all_shares(
    results: &[CandidateResult],
    pub_key: &PaillierPublicKey,
    rng: &mut impl RngCore,
) -> Vec<(PaillierCiphertext, BigInt)> {
    results
        .iter()
        .filter_map(|r| match &r.payload {
            Some(CandidatePayload::Paillier(ct)) => {
                let s = rng.gen_biguint_below(&pub_key.n);
                let s_signed = BigInt::from_biguint(Sign::Plus, s);
                let own_share = -s_signed.clone();
                let contribution = if r.is_hit {
                    ct.clone()
                } else {
                    pub_key.encrypt_signed(0, rng)
                };
                let blinded = pub_key.add(&contribution, &pub_key.encrypt(&s_signed, rng));
                Some((blinded, own_share))
            }
            _ => None,
        })
        .collect()
}

/// Complete the other party's blinded SS ciphertext into this party's
/// share, via the threshold-Paillier partial/decrypt pair: the recovered
/// plaintext of `payload + s` *is* this party's additive share, since the
/// sender already holds `-s` as its own share.
pub fn complete_ss_share(
    blinded: &PaillierCiphertext,
    sender_partial: &PaillierCiphertext,
    my_share: &PaillierPrivateShare,
    pub_key: &PaillierPublicKey,
) -> Result<BigInt, CryptoError> {
    paillier::decrypt(sender_partial, my_share, blinded, pub_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::EncryptedElement;
    use crate::crypto::{combine_public_key, ElGamalKeyShare};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn keys(rng: &mut StdRng) -> (ElGamalKeyShare, ElGamalKeyShare, ElGamalPublicKey) {
        let a = ElGamalKeyShare::random(rng);
        let b = ElGamalKeyShare::random(rng);
        let pk = combine_public_key(&a, &b);
        (a, b, pk)
    }

    #[test]
    fn matching_element_decrypts_to_identity() {
        let mut rng = StdRng::from_seed([21u8; 32]);
        let (share_a, share_b, pk) = keys(&mut rng);

        let y_point = curve::hash_to_curve(b"same-element");
        let y_ct = pk.encrypt(&y_point, &mut rng);
        let cell = EncryptedElement::NoPayload { element: y_ct };
        let path = vec![&cell];

        let candidates = build_candidates(&path, b"same-element", &pk, None, None, &mut rng);
        let partials =
            shuffle_mask_and_partial_decrypt(candidates, &pk, &share_b, false, &mut rng);
        let results = decrypt_candidates(&partials, &share_a);
        assert!(results.iter().any(|r| r.is_hit));
    }

    #[test]
    fn distinct_elements_do_not_decrypt_to_identity() {
        let mut rng = StdRng::from_seed([22u8; 32]);
        let (share_a, share_b, pk) = keys(&mut rng);

        let y_point = curve::hash_to_curve(b"element-y");
        let y_ct = pk.encrypt(&y_point, &mut rng);
        let cell = EncryptedElement::NoPayload { element: y_ct };
        let path = vec![&cell];

        let candidates = build_candidates(&path, b"element-x", &pk, None, None, &mut rng);
        let partials =
            shuffle_mask_and_partial_decrypt(candidates, &pk, &share_b, false, &mut rng);
        let results = decrypt_candidates(&partials, &share_a);
        assert!(results.iter().all(|r| !r.is_hit));
    }

    #[test]
    fn psi_hit_recovers_payload_point_without_a_third_round() {
        let mut rng = StdRng::from_seed([24u8; 32]);
        let (share_a, share_b, pk) = keys(&mut rng);

        let x_point = curve::hash_to_curve(b"shared-element");
        let recovery_payload = pk.encrypt(&x_point, &mut rng);
        let y_ct = pk.encrypt(&x_point, &mut rng);
        let cell = EncryptedElement::NoPayload { element: y_ct };
        let path = vec![&cell];

        let candidates = build_candidates(
            &path,
            b"shared-element",
            &pk,
            Some(&recovery_payload),
            None,
            &mut rng,
        );
        let partials = shuffle_mask_and_partial_decrypt(candidates, &pk, &share_b, true, &mut rng);
        let results = decrypt_candidates(&partials, &share_a);

        let hit = results.iter().find(|r| r.is_hit).expect("should be a hit");
        let recovered = hit.recovered_point.expect("PSI hit must carry a recovered point");
        assert_eq!(recovered, x_point);
    }

    #[test]
    fn count_hits_matches_expected_intersection_size() {
        let mut rng = StdRng::from_seed([23u8; 32]);
        let (share_a, share_b, pk) = keys(&mut rng);

        let shared = ["200", "300"];
        let misses = ["900"];
        let mut cells = Vec::new();
        for e in shared.iter().chain(misses.iter()) {
            let point = curve::hash_to_curve(e.as_bytes());
            cells.push(EncryptedElement::NoPayload {
                element: pk.encrypt(&point, &mut rng),
            });
        }
        let cell_refs: Vec<&EncryptedElement> = cells.iter().collect();

        let mut all_partials = Vec::new();
        for probe in shared.iter() {
            let candidates = build_candidates(&cell_refs, probe.as_bytes(), &pk, None, None, &mut rng);
            let mut partials =
                shuffle_mask_and_partial_decrypt(candidates, &pk, &share_b, false, &mut rng);
            all_partials.append(&mut partials);
        }
        let results = decrypt_candidates(&all_partials, &share_a);
        assert_eq!(count_hits(&results), shared.len());
    }

    #[test]
    fn split_all_shares_emits_one_entry_per_slot_hit_or_miss() {
        use crate::crypto::paillier;

        let mut rng = StdRng::from_seed([26u8; 32]);
        let kp = paillier::generate_keypair(64, &mut rng);

        let hit = CandidateResult {
            is_hit: true,
            payload: Some(CandidatePayload::Paillier(kp.public.encrypt_signed(7, &mut rng))),
            recovered_point: None,
        };
        let miss = CandidateResult {
            is_hit: false,
            payload: Some(CandidatePayload::Paillier(kp.public.encrypt_signed(7, &mut rng))),
            recovered_point: None,
        };

        let shares = split_all_shares(&[hit, miss], &kp.public, &mut rng);
        assert_eq!(shares.len(), 2, "a miss must still contribute a blinded entry");

        let expected = [BigInt::from(7), BigInt::from(0)];
        for ((blinded, own_share), want) in shares.iter().zip(expected.iter()) {
            let sender_partial = paillier::partial_decrypt(blinded, &kp.share0, &kp.public);
            let completer_share =
                complete_ss_share(blinded, &sender_partial, &kp.share1, &kp.public).unwrap();
            assert_eq!(&(completer_share + own_share), want);
        }
    }
}
