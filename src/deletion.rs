//! Deletion-capable variant of the secret-share functionality.
//!
//! A plain SS day ([`candidate::split_hit_shares`]) only emits a blinded
//! share for candidates that hit, so the length of the `blinded` vector on
//! [`crate::wire::MessageIIISs`] already leaks the day's intersection size
//! to the peer. Deletion support needs the stronger property that *no*
//! round reveals which probed elements matched: an add day and a delete
//! day for the same element must cancel out once both sides' shares are
//! summed, and a peer who only sees ciphertexts must not be able to tell
//! the difference between a cancelling pair and two unrelated misses.
//!
//! [`prepare_blind_shares`] gets this from Paillier's semantic security
//! rather than from a garbled-circuit/OT equality test: it blinds *every*
//! candidate slot, hit or miss, with a miss contributing `Enc(0)` in place
//! of the real payload. Ciphertexts are indistinguishable without the
//! private share, so the vector's contents (not just its length) carry no
//! information about which slots were hits.
//!
//! Negative-payload sign convention: a payload `>= 0` is an addition, `< 0`
//! is a deletion intent, represented inside Paillier as `N - |v|`
//! ([`crate::crypto::paillier::PaillierPublicKey::encrypt_signed`]). A
//! same-day delete of a value an addition just inserted cancels
//! homomorphically once both ciphertexts are summed, and so does a delete
//! of a value inserted on an earlier day, once both parties' completed
//! shares for each day are added together.

use num_bigint::BigInt;
use rand::RngCore;

use crate::candidate::{self, CandidateResult};
use crate::crypto::paillier::{PaillierCiphertext, PaillierPublicKey};

/// Blind every SS candidate from today's batch, hit or miss alike. This is
/// the call [`crate::party::Party::handle_message_ii`] makes in place of
/// [`candidate::split_hit_shares`] when [`crate::config::Config::deletion_enabled`]
/// is set.
pub fn prepare_blind_shares(
    results: &[CandidateResult],
    pub_key: &PaillierPublicKey,
    rng: &mut impl RngCore,
) -> Vec<(PaillierCiphertext, BigInt)> {
    candidate::split_all_shares(results, pub_key, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::{complete_ss_share, CandidatePayload};
    use crate::crypto::paillier::{self, generate_keypair};
    use num_bigint::BigInt;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn recombine(
        shares: &[(PaillierCiphertext, BigInt)],
        kp: &paillier::PaillierKeyPair,
    ) -> Vec<BigInt> {
        shares
            .iter()
            .map(|(blinded, own_share)| {
                let sender_partial = paillier::partial_decrypt(blinded, &kp.share0, &kp.public);
                let completer_share =
                    complete_ss_share(blinded, &sender_partial, &kp.share1, &kp.public).unwrap();
                completer_share + own_share
            })
            .collect()
    }

    #[test]
    fn same_day_delete_cancels_an_addition() {
        let mut rng = StdRng::from_seed([33u8; 32]);
        let kp = generate_keypair(64, &mut rng);

        let add = CandidateResult {
            is_hit: true,
            payload: Some(CandidatePayload::Paillier(kp.public.encrypt_signed(12, &mut rng))),
            recovered_point: None,
        };
        let delete = CandidateResult {
            is_hit: true,
            payload: Some(CandidatePayload::Paillier(kp.public.encrypt_signed(-12, &mut rng))),
            recovered_point: None,
        };
        let miss = CandidateResult {
            is_hit: false,
            payload: Some(CandidatePayload::Paillier(kp.public.encrypt_signed(99, &mut rng))),
            recovered_point: None,
        };

        let shares = prepare_blind_shares(&[add, delete, miss], &kp.public, &mut rng);
        assert_eq!(shares.len(), 3, "misses must still contribute a blinded entry");

        let totals = recombine(&shares, &kp);
        let net = totals.iter().fold(BigInt::from(0), |acc, t| &acc + t);
        assert_eq!(net, BigInt::from(0), "add + delete + miss must net to zero");
    }
}
