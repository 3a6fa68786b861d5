//! Chou-Orlandi "Simplest OT": a two-message 1-of-2 base oblivious
//! transfer built on the same elliptic curve group this crate already
//! uses for ElGamal ([`crate::crypto::curve`]).
//!
//! Each step below touches only one party's own secret material --
//! `sender_transfer` never takes the receiver's choice bit, and
//! `receiver_open` never takes the sender's scalar. The two parties
//! exchange only curve points (`SenderSetup`/`ReceiverSetup`) and the
//! blinded blocks `sender_transfer` returns.

use ark_ff::UniformRand;
use rand::RngCore;

use crate::crypto::curve::{self, Point, Scalar};

/// A transfer block: one message, XOR-padded with a key derived from the
/// shared curve point. Arbitrary length, so a single transfer carries a
/// message of any size.
pub type Block = Vec<u8>;

/// Sender's secret scalar, kept locally and never sent.
pub struct SenderState {
    a: Scalar,
}

/// Sender's first message: `A = a*G`.
#[derive(Debug, Clone, Copy)]
pub struct SenderSetup {
    pub cap_a: Point,
}

/// Receiver's secret scalar and choice bit, kept locally and never sent.
pub struct ReceiverState {
    b: Scalar,
    choice: bool,
}

/// Receiver's reply: `B = b*G` for choice 0, `B = A + b*G` for choice 1.
#[derive(Debug, Clone, Copy)]
pub struct ReceiverSetup {
    pub cap_b: Point,
}

/// Step 1 (sender): pick `a`, publish `A`.
pub fn sender_setup(rng: &mut impl RngCore) -> (SenderState, SenderSetup) {
    let a = Scalar::rand(rng);
    let cap_a = curve::scalar_mul(&curve::generator(), &a);
    (SenderState { a }, SenderSetup { cap_a })
}

/// Step 2 (receiver): pick `b` and this transfer's choice bit, publish `B`.
/// The sender never learns `choice` -- it only changes which generator
/// `B` is built from, never sent alongside it.
pub fn receiver_choose(
    sender: &SenderSetup,
    choice: bool,
    rng: &mut impl RngCore,
) -> (ReceiverState, ReceiverSetup) {
    let b = Scalar::rand(rng);
    let base = curve::scalar_mul(&curve::generator(), &b);
    let cap_b = if choice {
        curve::add(&sender.cap_a, &base)
    } else {
        base
    };
    (ReceiverState { b, choice }, ReceiverSetup { cap_b })
}

/// Step 3 (sender): derive `k0 = H(a*B)` and `k1 = H(a*(B - A))`, and
/// encrypt `msg0`/`msg1` under a keystream derived from each. Exactly one
/// of the two keys will ever match a `receiver_open` call, and which one
/// depends only on the receiver's own secret `b`/`choice`.
pub fn sender_transfer(
    state: &SenderState,
    setup: &SenderSetup,
    receiver: &ReceiverSetup,
    msg0: &[u8],
    msg1: &[u8],
) -> (Block, Block) {
    let k0_point = curve::scalar_mul(&receiver.cap_b, &state.a);
    let b_minus_a = curve::add(&receiver.cap_b, &curve::neg(&setup.cap_a));
    let k1_point = curve::scalar_mul(&b_minus_a, &state.a);
    (
        xor_keystream(msg0, &k0_point),
        xor_keystream(msg1, &k1_point),
    )
}

/// Step 4 (receiver): derive `k = H(b*A)`, which equals `k0` if `choice`
/// was `false` and `k1` if `choice` was `true`, and decrypt the matching
/// half.
pub fn receiver_open(
    state: &ReceiverState,
    setup: &SenderSetup,
    transferred: &(Block, Block),
) -> Block {
    let k_point = curve::scalar_mul(&setup.cap_a, &state.b);
    let chosen = if state.choice {
        &transferred.1
    } else {
        &transferred.0
    };
    xor_keystream(chosen, &k_point)
}

fn xor_keystream(data: &[u8], key_point: &Point) -> Block {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"upsi.ot.keystream.v1");
    hasher.update(&curve::point_to_bytes(key_point));
    let mut xof = hasher.finalize_xof();
    let mut pad = vec![0u8; data.len()];
    xof.fill(&mut pad);
    data.iter().zip(pad.iter()).map(|(d, p)| d ^ p).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn receiver_recovers_only_the_chosen_message() {
        let mut rng = StdRng::from_seed([9u8; 32]);
        let (sender_state, sender_setup_msg) = sender_setup(&mut rng);

        let (receiver_state, receiver_setup_msg) =
            receiver_choose(&sender_setup_msg, true, &mut rng);
        let transferred = sender_transfer(
            &sender_state,
            &sender_setup_msg,
            &receiver_setup_msg,
            b"message-zero",
            b"message-one!",
        );
        let opened = receiver_open(&receiver_state, &sender_setup_msg, &transferred);
        assert_eq!(opened, b"message-one!".to_vec());

        let (receiver_state, receiver_setup_msg) =
            receiver_choose(&sender_setup_msg, false, &mut rng);
        let transferred = sender_transfer(
            &sender_state,
            &sender_setup_msg,
            &receiver_setup_msg,
            b"message-zero",
            b"message-one!",
        );
        let opened = receiver_open(&receiver_state, &sender_setup_msg, &transferred);
        assert_eq!(opened, b"message-zero".to_vec());
    }

    #[test]
    fn distinct_receivers_derive_independent_keys() {
        let mut rng = StdRng::from_seed([10u8; 32]);
        let (sender_state, sender_setup_msg) = sender_setup(&mut rng);
        let (_r1_state, r1_setup) = receiver_choose(&sender_setup_msg, true, &mut rng);
        let (_r2_state, r2_setup) = receiver_choose(&sender_setup_msg, true, &mut rng);

        let t1 = sender_transfer(&sender_state, &sender_setup_msg, &r1_setup, b"aaaa", b"bbbb");
        let t2 = sender_transfer(&sender_state, &sender_setup_msg, &r2_setup, b"aaaa", b"bbbb");
        assert_ne!(t1.1, t2.1, "independent receiver scalars must yield independent ciphertexts");
    }
}
