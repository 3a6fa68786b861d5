//! Per-functionality party (class-hierarchy-flattening): one value
//! type parameterized by [`Functionality`] and [`Role`], whose
//! message-building/handling methods branch on that tag instead of going
//! through a virtual-dispatch hierarchy.

use rand::rngs::StdRng;
use rand::RngCore;

use crate::bucket::{Element, ElementAndPayload, EncryptedElement, Payload};
use crate::candidate::{self, Candidate, CandidatePayload, CandidateResult, PartialCandidate};
use crate::config::{Config, Functionality, Role};
use crate::crypto::curve;
use crate::crypto::elgamal::{ElGamalKeyShare, ElGamalPublicKey};
use crate::crypto::paillier::{PaillierPrivateShare, PaillierPublicKey};
use crate::error::{SessionError, UpsiError};
use crate::functionality::DayState;
use crate::metrics::Metrics;
use crate::prf::{HashStream, PrfKey};
use crate::tree_pair::TreePair;
use crate::wire::{
    HashList, MessageI, MessageII, MessageIIISs, MessageIIISum, MessageIV, TreeUpdates,
    WireCandidate, WirePartialCandidate,
};

/// Key material a party holds for one session: its own ElGamal share and
/// the joint public key, plus (for SUM/SS) its Paillier share.
pub struct Keys {
    pub elgamal_share: ElGamalKeyShare,
    pub elgamal_pk: ElGamalPublicKey,
    pub paillier_share: Option<PaillierPrivateShare>,
    pub paillier_pk: Option<PaillierPublicKey>,
}

/// Accumulated running output across days, per functionality.
#[derive(Debug, Default)]
pub struct Output {
    pub intersection: Vec<Element>,
    pub cardinality: usize,
    pub sum: i64,
    pub shares: Vec<num_bigint::BigInt>,
}

/// A session's per-day driver. Holds the party's own tree pair, role,
/// functionality tag, key material, and the shared PRF stream used to keep
/// insertion hashes synchronized with the peer.
pub struct Party {
    pub config: Config,
    pub role: Role,
    pub keys: Keys,
    pub pair: TreePair,
    pub probe_key: PrfKey,
    pub state: DayState,
    pub output: Output,
    pub metrics: Metrics,
    pending_own_hits: Vec<(Element, Option<CandidatePayload>)>,
    /// PSI only: `hash_to_curve(x)` (compressed bytes) back to the plaintext
    /// element `x`, for every element this party has ever probed. A hit's
    /// recovered payload point is looked up here to report which element
    /// matched.
    psi_element_table: std::collections::HashMap<Vec<u8>, Element>,
}

impl Party {
    pub fn new(config: Config, role: Role, keys: Keys, probe_key: PrfKey, insert_key: PrfKey) -> Self {
        let pair = TreePair::new(config.node_size, config.stash_size, HashStream::new(insert_key));
        Party {
            config,
            role,
            keys,
            pair,
            probe_key,
            state: DayState::initial(),
            output: Output::default(),
            metrics: Metrics::new(),
            pending_own_hits: Vec::new(),
            psi_element_table: std::collections::HashMap::new(),
        }
    }

    /// PSI only: remember `hash_to_curve(x)` for every element in this
    /// batch, so a later hit's recovered payload point can be mapped back
    /// to its plaintext element.
    fn record_own_elements_for_psi(&mut self, batch: &[ElementAndPayload]) {
        if self.config.functionality != Functionality::Psi {
            return;
        }
        for ep in batch {
            let point = curve::hash_to_curve(ep.element.as_bytes());
            self.psi_element_table
                .insert(curve::point_to_bytes(&point), ep.element.clone());
        }
    }

    /// Build today's probe candidates against `other_tree`, for every
    /// element in `batch`. Returns the wire-ready candidate list.
    fn build_candidates_for_batch(
        &self,
        batch: &[ElementAndPayload],
        rng: &mut impl RngCore,
    ) -> Vec<Candidate> {
        let mut out = Vec::new();
        for ep in batch {
            let probe_hash = self.pair.probe_hash(&self.probe_key, &ep.element);
            let path = self.pair.other_tree.path(&probe_hash);
            let recovery_payload = if self.config.functionality == Functionality::Psi {
                Some(self.keys.elgamal_pk.encrypt(
                    &crate::crypto::curve::hash_to_curve(ep.element.as_bytes()),
                    rng,
                ))
            } else {
                None
            };
            let payload_override = match (self.config.functionality, ep.payload) {
                (Functionality::Sum, Payload::Value(v)) => Some(CandidatePayload::ElGamal(
                    self.keys.elgamal_pk.encrypt_i64(v, rng),
                )),
                (Functionality::SecretShare, Payload::Value(v)) => {
                    let pk = self
                        .keys
                        .paillier_pk
                        .as_ref()
                        .expect("SS session must carry a Paillier public key");
                    Some(CandidatePayload::Paillier(pk.encrypt_signed(v, rng)))
                }
                _ => None,
            };
            let candidates = candidate::build_candidates(
                &path,
                ep.element.as_bytes(),
                &self.keys.elgamal_pk,
                recovery_payload.as_ref(),
                payload_override.as_ref(),
                rng,
            );
            out.extend(candidates);
        }
        out
    }

    /// Client-side (P0, role `Initiator`): insert-then-probe, producing
    /// `MessageI`.
    pub fn build_message_i(
        &mut self,
        batch: Vec<ElementAndPayload>,
        rng: &mut impl RngCore,
    ) -> Result<MessageI, UpsiError> {
        self.state = self.state.on_message_i_sent()?;

        self.record_own_elements_for_psi(&batch);
        let candidates = self.build_candidates_for_batch(&batch, rng);
        let plain_delta = self.pair.update_mine(batch)?;
        let encrypted_delta = TreePair::encrypt_delta(&plain_delta, &self.keys.elgamal_pk, rng);

        self.metrics.record_bytes("updates", wire_size_estimate(&encrypted_delta));

        Ok(MessageI {
            sender_depth: self.pair.my_tree.depth(),
            updates: encrypted_delta,
            hashes: HashList::new(),
            candidates: candidates.iter().map(WireCandidate::from).collect(),
        })
    }

    /// Server-side (P1, role `Responder`): apply the peer's delta, build our
    /// own candidates, merge with the peer's, shuffle+mask+partial-decrypt,
    /// and reply with `MessageII`.
    pub fn handle_message_i(
        &mut self,
        msg: MessageI,
        batch: Vec<ElementAndPayload>,
        rng: &mut impl RngCore,
    ) -> Result<MessageII, UpsiError> {
        self.state = self.state.on_message_i()?;

        self.pair
            .apply_peer_delta(msg.sender_depth, msg.updates)?;

        let mut candidates: Vec<Candidate> =
            msg.candidates.into_iter().map(Into::into).collect();
        candidates.extend(self.build_candidates_for_batch(&batch, rng));

        self.record_own_elements_for_psi(&batch);
        let plain_delta = self.pair.update_mine(batch)?;
        let encrypted_delta = TreePair::encrypt_delta(&plain_delta, &self.keys.elgamal_pk, rng);

        let independent_payload_mask = self.config.functionality == Functionality::Psi;
        let partials = candidate::shuffle_mask_and_partial_decrypt(
            candidates,
            &self.keys.elgamal_pk,
            &self.keys.elgamal_share,
            independent_payload_mask,
            rng,
        );

        self.state = self.state.on_message_ii_sent(self.config.functionality)?;

        Ok(MessageII {
            sender_depth: self.pair.my_tree.depth(),
            updates: encrypted_delta,
            hashes: HashList::new(),
            candidates: partials.iter().map(WirePartialCandidate::from).collect(),
        })
    }

    /// Client-side: apply the peer's delta, finish decrypting every
    /// candidate, and either finish the day (PSI/CA) or prepare round two
    /// (SUM/SS).
    pub fn handle_message_ii(
        &mut self,
        msg: MessageII,
        rng: &mut impl RngCore,
    ) -> Result<Option<MessageIIIEnvelope>, UpsiError> {
        self.state = self.state.on_message_ii(self.config.functionality)?;

        self.pair
            .apply_peer_delta(msg.sender_depth, msg.updates)?;

        let partials: Vec<PartialCandidate> =
            msg.candidates.into_iter().map(Into::into).collect();
        let results = candidate::decrypt_candidates(&partials, &self.keys.elgamal_share);

        match self.config.functionality {
            Functionality::Psi => {
                self.output.intersection.extend(self.recover_psi_hits(&results));
                self.state = self.state_done()?;
                Ok(None)
            }
            Functionality::CardinalityOnly => {
                self.output.cardinality += candidate::count_hits(&results);
                self.state = self.state_done()?;
                Ok(None)
            }
            Functionality::Sum => {
                let sum_ct = candidate::sum_hit_payloads(&results, &self.keys.elgamal_pk, rng);
                self.state = self.state.on_message_iii()?;
                Ok(Some(MessageIIIEnvelope::Sum(MessageIIISum { sum: sum_ct })))
            }
            Functionality::SecretShare => {
                let pk = self
                    .keys
                    .paillier_pk
                    .as_ref()
                    .expect("SS session must carry a Paillier public key");
                #[cfg(feature = "deletion")]
                let shares = if self.config.deletion_enabled {
                    crate::deletion::prepare_blind_shares(&results, pk, rng)
                } else {
                    candidate::split_hit_shares(&results, pk, rng)
                };
                #[cfg(not(feature = "deletion"))]
                let shares = candidate::split_hit_shares(&results, pk, rng);
                for (_, own_share) in &shares {
                    self.output.shares.push(own_share.clone());
                }
                let share = self
                    .keys
                    .paillier_share
                    .as_ref()
                    .expect("SS session must carry a Paillier private share");
                let sender_partials = shares
                    .iter()
                    .map(|(blinded, _)| {
                        crate::crypto::paillier::partial_decrypt(blinded, share, pk)
                    })
                    .collect();
                self.state = self.state.on_message_iii()?;
                Ok(Some(MessageIIIEnvelope::Ss(MessageIIISs {
                    blinded: shares.into_iter().map(|(b, _)| b).collect(),
                    sender_partials,
                })))
            }
        }
    }

    /// Server-side SUM: complete the partial decryption of A's sum
    /// ciphertext and reply with `MessageIV`.
    pub fn handle_message_iii_sum(&mut self, msg: MessageIIISum) -> Result<MessageIV, UpsiError> {
        self.state = self.state.on_message_iii()?;
        let partial = crate::crypto::elgamal::partial_decrypt(&msg.sum, &self.keys.elgamal_share);
        self.state = self.state.on_message_iv()?;
        Ok(MessageIV { sum_partial: partial })
    }

    /// Client-side SUM: recover the integer sum via BSGS and finish the day.
    pub fn handle_message_iv(&mut self, msg: MessageIV) -> Result<(), UpsiError> {
        let point = crate::crypto::elgamal::decrypt(&msg.sum_partial, &self.keys.elgamal_share);
        let recovered = crate::crypto::elgamal::decrypt_exp(&point, self.config.max_sum)?;
        self.output.sum += recovered;
        self.state = self.state_done()?;
        Ok(())
    }

    /// Server-side SS: complete each blinded share into this party's own
    /// additive share.
    pub fn handle_message_iii_ss(&mut self, msg: MessageIIISs) -> Result<(), UpsiError> {
        self.state = self.state.on_message_iii()?;
        let pk = self
            .keys
            .paillier_pk
            .as_ref()
            .expect("SS session must carry a Paillier public key");
        let share = self
            .keys
            .paillier_share
            .as_ref()
            .expect("SS session must carry a Paillier private share");
        for (blinded, sender_partial) in msg.blinded.iter().zip(msg.sender_partials.iter()) {
            let my_share = candidate::complete_ss_share(blinded, sender_partial, share, pk)?;
            self.output.shares.push(my_share);
        }
        self.state = self.state.on_message_iv()?;
        self.state = self.state_done()?;
        Ok(())
    }

    /// Mark the day complete. Callers only reach here after the state
    /// machine has already progressed through every message this
    /// functionality's day flow requires.
    fn state_done(&self) -> Result<DayState, UpsiError> {
        Ok(DayState::DayDone)
    }

    /// Reset for the next day; valid only once the current day reached
    /// `DAY_DONE`.
    pub fn advance_day(&mut self) -> Result<(), UpsiError> {
        self.state = self.state.advance_day()?;
        Ok(())
    }

    /// Client-side SS only: after sending `MessageIIISs`, there is no wire
    /// `MessageIV` to wait for (B completes its share locally), so the
    /// client reuses the `WAIT_IV -> DAY_DONE` transition purely as a local
    /// bookkeeping step.
    pub fn finish_ss_day_locally(&mut self) -> Result<(), UpsiError> {
        self.state = self.state.on_message_iv()?;
        Ok(())
    }

    /// PSI: map each hit's fully recovered `g^x` point back to the
    /// plaintext element `x` via this party's own probe table. A hit whose
    /// point isn't in the table (shouldn't happen for a correctly-built
    /// candidate) is silently dropped rather than surfaced as an error,
    /// since it carries no actionable element.
    fn recover_psi_hits(&self, results: &[CandidateResult]) -> Vec<Element> {
        results
            .iter()
            .filter(|r| r.is_hit)
            .filter_map(|r| r.recovered_point.as_ref())
            .filter_map(|point| {
                self.psi_element_table
                    .get(&curve::point_to_bytes(point))
                    .cloned()
            })
            .collect()
    }
}

/// The union of round-two message kinds a client may need to send,
/// selected by functionality.
#[derive(Debug)]
pub enum MessageIIIEnvelope {
    Sum(MessageIIISum),
    Ss(MessageIIISs),
}

fn wire_size_estimate(delta: &TreeUpdates) -> u64 {
    delta
        .iter()
        .map(|(_, b)| b.entries.len() as u64 * 128)
        .sum()
}

trait DayStateExt {
    fn on_message_i_sent(self) -> Result<DayState, SessionError>;
    fn on_message_ii_sent(self, func: Functionality) -> Result<DayState, SessionError>;
}

impl DayStateExt for DayState {
    /// The client sending `MessageI` is the same transition as a receiver
    /// observing it; modeled identically since both sides track their own
    /// local day state independently.
    fn on_message_i_sent(self) -> Result<DayState, SessionError> {
        self.on_message_i()
    }

    /// Symmetric to `on_message_i_sent`: the server sending `MessageII`
    /// advances its own local state exactly as the client does on
    /// receiving it, so PSI/CA finish the day here while SUM/SS move on to
    /// await `MessageIII`.
    fn on_message_ii_sent(self, func: Functionality) -> Result<DayState, SessionError> {
        self.on_message_ii(func)
    }
}

#[cfg(test)]
mod day_simulation_tests {
    use super::*;
    use crate::bucket::{Element, ElementAndPayload, Payload};
    use crate::config::{Config, Functionality, Role};
    use crate::crypto::{combine_public_key, paillier, ElGamalKeyShare};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Two in-process parties sharing a joint ElGamal key (and, when asked,
    /// a threshold Paillier key) and the PRF keys that keep their tree
    /// inserts in lockstep, as a real pair of `party_zero`/`party_one`
    /// processes would after a `keygen` run.
    fn build_parties(functionality: Functionality, with_paillier: bool) -> (Party, Party, StdRng) {
        let mut rng = StdRng::from_seed([64u8; 32]);
        let share0 = ElGamalKeyShare::random(&mut rng);
        let share1 = ElGamalKeyShare::random(&mut rng);
        let pk = combine_public_key(&share0, &share1);

        let (paillier_pk, paillier_share0, paillier_share1) = if with_paillier {
            let kp = paillier::generate_keypair(64, &mut rng);
            (Some(kp.public), Some(kp.share0), Some(kp.share1))
        } else {
            (None, None, None)
        };

        let config = Config::new(functionality, 10, ".", ".");
        let insert_key = PrfKey::from_seed(b"day-sim-insert");
        let probe_key = PrfKey::from_seed(b"day-sim-probe");

        let p0 = Party::new(
            config.clone(),
            Role::PartyZero,
            Keys {
                elgamal_share: share0,
                elgamal_pk: pk,
                paillier_share: paillier_share0,
                paillier_pk: paillier_pk.clone(),
            },
            probe_key,
            insert_key,
        );
        let p1 = Party::new(
            config,
            Role::PartyOne,
            Keys {
                elgamal_share: share1,
                elgamal_pk: pk,
                paillier_share: paillier_share1,
                paillier_pk,
            },
            probe_key,
            insert_key,
        );
        (p0, p1, rng)
    }

    fn batch(elements: &[(&str, Payload)]) -> Vec<ElementAndPayload> {
        elements
            .iter()
            .map(|(e, p)| ElementAndPayload::new(Element::from_str(e), *p))
            .collect()
    }

    /// Drives one PSI/CA day (no round three) between two in-process parties.
    fn run_no_round_two_day(
        p0: &mut Party,
        p1: &mut Party,
        batch0: Vec<ElementAndPayload>,
        batch1: Vec<ElementAndPayload>,
        rng: &mut StdRng,
    ) {
        let msg_i = p0.build_message_i(batch0, rng).unwrap();
        let msg_ii = p1.handle_message_i(msg_i, batch1, rng).unwrap();
        let envelope = p0.handle_message_ii(msg_ii, rng).unwrap();
        assert!(envelope.is_none());
        p0.advance_day().unwrap();
        p1.advance_day().unwrap();
    }

    #[test]
    fn ca_single_day_counts_same_day_mutual_element() {
        let (mut p0, mut p1, mut rng) = build_parties(Functionality::CardinalityOnly, false);
        run_no_round_two_day(
            &mut p0,
            &mut p1,
            batch(&[("a", Payload::None), ("b", Payload::None)]),
            batch(&[("a", Payload::None), ("z", Payload::None)]),
            &mut rng,
        );
        assert_eq!(p0.output.cardinality, 1);
    }

    /// A genuine two-day "toy" run: day one plants an element on P1's side
    /// only, day two has P0 insert the same element for the first time and
    /// observe the hit against P1's mirrored tree from the day before.
    #[test]
    fn ca_two_day_toy_counts_intersection_revealed_on_day_two() {
        let (mut p0, mut p1, mut rng) = build_parties(Functionality::CardinalityOnly, false);

        run_no_round_two_day(&mut p0, &mut p1, batch(&[]), batch(&[("x", Payload::None)]), &mut rng);
        assert_eq!(p0.output.cardinality, 0);

        run_no_round_two_day(
            &mut p0,
            &mut p1,
            batch(&[("x", Payload::None)]),
            batch(&[]),
            &mut rng,
        );
        assert_eq!(p0.output.cardinality, 1);
    }

    #[test]
    fn psi_single_day_reveals_mutual_element() {
        let (mut p0, mut p1, mut rng) = build_parties(Functionality::Psi, false);
        run_no_round_two_day(
            &mut p0,
            &mut p1,
            batch(&[("x", Payload::None), ("y", Payload::None)]),
            batch(&[("x", Payload::None), ("z", Payload::None)]),
            &mut rng,
        );
        assert_eq!(p0.output.intersection, vec![Element::from_str("x")]);
    }

    #[test]
    fn sum_functionality_recovers_total_on_the_day_the_match_lands() {
        let (mut p0, mut p1, mut rng) = build_parties(Functionality::Sum, false);

        // Day one: P1 plants "x"; no match yet, but the round-two/-three
        // dance still runs (sum of zero hits) so the day advances cleanly.
        let msg_i = p0.build_message_i(batch(&[]), &mut rng).unwrap();
        let msg_ii = p1
            .handle_message_i(msg_i, batch(&[("x", Payload::None)]), &mut rng)
            .unwrap();
        let envelope = p0.handle_message_ii(msg_ii, &mut rng).unwrap();
        let msg_iii = match envelope.unwrap() {
            MessageIIIEnvelope::Sum(m) => m,
            other => panic!("expected a SUM round-three message, got {other:?}"),
        };
        let msg_iv = p1.handle_message_iii_sum(msg_iii).unwrap();
        p0.handle_message_iv(msg_iv).unwrap();
        p0.advance_day().unwrap();
        p1.advance_day().unwrap();
        assert_eq!(p0.output.sum, 0);

        // Day two: P0 inserts "x" with a payload of 7, matching P1's day-one
        // element mirrored into P0's `other_tree`.
        let msg_i = p0
            .build_message_i(batch(&[("x", Payload::Value(7))]), &mut rng)
            .unwrap();
        let msg_ii = p1.handle_message_i(msg_i, batch(&[]), &mut rng).unwrap();
        let envelope = p0.handle_message_ii(msg_ii, &mut rng).unwrap();
        let msg_iii = match envelope.unwrap() {
            MessageIIIEnvelope::Sum(m) => m,
            other => panic!("expected a SUM round-three message, got {other:?}"),
        };
        let msg_iv = p1.handle_message_iii_sum(msg_iii).unwrap();
        p0.handle_message_iv(msg_iv).unwrap();
        p0.advance_day().unwrap();
        p1.advance_day().unwrap();

        assert_eq!(p0.output.sum, 7);
    }

    #[test]
    fn secret_share_functionality_splits_hit_value_additively() {
        let (mut p0, mut p1, mut rng) = build_parties(Functionality::SecretShare, true);

        // Day one: P1 plants "x"; the SS round-three still runs with zero
        // per-hit ciphertexts.
        let msg_i = p0.build_message_i(batch(&[]), &mut rng).unwrap();
        let msg_ii = p1
            .handle_message_i(msg_i, batch(&[("x", Payload::None)]), &mut rng)
            .unwrap();
        let envelope = p0.handle_message_ii(msg_ii, &mut rng).unwrap();
        let msg_iii = match envelope.unwrap() {
            MessageIIIEnvelope::Ss(m) => m,
            other => panic!("expected an SS round-three message, got {other:?}"),
        };
        assert!(msg_iii.blinded.is_empty());
        p1.handle_message_iii_ss(msg_iii).unwrap();
        p0.finish_ss_day_locally().unwrap();
        p0.advance_day().unwrap();
        p1.advance_day().unwrap();
        assert!(p0.output.shares.is_empty());
        assert!(p1.output.shares.is_empty());

        // Day two: P0 inserts "x" with payload 7, matching P1's mirrored
        // day-one element.
        let msg_i = p0
            .build_message_i(batch(&[("x", Payload::Value(7))]), &mut rng)
            .unwrap();
        let msg_ii = p1.handle_message_i(msg_i, batch(&[]), &mut rng).unwrap();
        let envelope = p0.handle_message_ii(msg_ii, &mut rng).unwrap();
        let msg_iii = match envelope.unwrap() {
            MessageIIIEnvelope::Ss(m) => m,
            other => panic!("expected an SS round-three message, got {other:?}"),
        };
        p1.handle_message_iii_ss(msg_iii).unwrap();
        p0.finish_ss_day_locally().unwrap();
        p0.advance_day().unwrap();
        p1.advance_day().unwrap();

        assert_eq!(p0.output.shares.len(), 1);
        assert_eq!(p1.output.shares.len(), 1);
        let total = &p0.output.shares[0] + &p1.output.shares[0];
        assert_eq!(total, num_bigint::BigInt::from(7));
    }

    /// With `deletion_enabled`, a later day's negative-payload delete of an
    /// element cancels an earlier day's addition once every day's shares
    /// are summed, and a same-day miss contributes a share entry exactly
    /// like a hit does (so the peer can't read the day's intersection size
    /// off `Vec::len()`).
    #[test]
    #[cfg(feature = "deletion")]
    fn deletion_enabled_ss_day_cancels_an_earlier_addition() {
        let (mut p0, mut p1, mut rng) = build_parties(Functionality::SecretShare, true);
        p0.config.deletion_enabled = true;
        p1.config.deletion_enabled = true;

        // Day one: P1 plants "x" as the only shared element.
        let msg_i = p0.build_message_i(batch(&[]), &mut rng).unwrap();
        let msg_ii = p1
            .handle_message_i(msg_i, batch(&[("x", Payload::None)]), &mut rng)
            .unwrap();
        let envelope = p0.handle_message_ii(msg_ii, &mut rng).unwrap();
        let msg_iii = match envelope.unwrap() {
            MessageIIIEnvelope::Ss(m) => m,
            other => panic!("expected an SS round-three message, got {other:?}"),
        };
        assert!(msg_iii.blinded.is_empty());
        p1.handle_message_iii_ss(msg_iii).unwrap();
        p0.finish_ss_day_locally().unwrap();
        p0.advance_day().unwrap();
        p1.advance_day().unwrap();

        // Day two: P0 adds "x" with payload 12 (a hit against P1's day-one
        // entry) and probes "y" (a miss -- never planted by P1). Both must
        // surface as blinded entries.
        let msg_i = p0
            .build_message_i(
                batch(&[("x", Payload::Value(12)), ("y", Payload::Value(99))]),
                &mut rng,
            )
            .unwrap();
        let msg_ii = p1.handle_message_i(msg_i, batch(&[]), &mut rng).unwrap();
        let envelope = p0.handle_message_ii(msg_ii, &mut rng).unwrap();
        let msg_iii = match envelope.unwrap() {
            MessageIIIEnvelope::Ss(m) => m,
            other => panic!("expected an SS round-three message, got {other:?}"),
        };
        assert_eq!(msg_iii.blinded.len(), 2, "a miss must still contribute a blinded entry");
        p1.handle_message_iii_ss(msg_iii).unwrap();
        p0.finish_ss_day_locally().unwrap();
        p0.advance_day().unwrap();
        p1.advance_day().unwrap();

        // Day three: P0 deletes "x" (payload -12), hitting the same
        // still-present day-one entry.
        let msg_i = p0
            .build_message_i(batch(&[("x", Payload::Value(-12))]), &mut rng)
            .unwrap();
        let msg_ii = p1.handle_message_i(msg_i, batch(&[]), &mut rng).unwrap();
        let envelope = p0.handle_message_ii(msg_ii, &mut rng).unwrap();
        let msg_iii = match envelope.unwrap() {
            MessageIIIEnvelope::Ss(m) => m,
            other => panic!("expected an SS round-three message, got {other:?}"),
        };
        assert_eq!(msg_iii.blinded.len(), 1);
        p1.handle_message_iii_ss(msg_iii).unwrap();
        p0.finish_ss_day_locally().unwrap();
        p0.advance_day().unwrap();
        p1.advance_day().unwrap();

        assert_eq!(p0.output.shares.len(), 3);
        assert_eq!(p1.output.shares.len(), 3);
        let net = p0
            .output
            .shares
            .iter()
            .chain(p1.output.shares.iter())
            .fold(num_bigint::BigInt::from(0), |acc, s| &acc + s);
        assert_eq!(net, num_bigint::BigInt::from(0));
    }
}
