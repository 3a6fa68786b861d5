//! Wire message envelopes: the labeled sub-messages exchanged once
//! per day, carried over the transport adapter's length-delimited framing.

use serde::{Deserialize, Serialize};

use crate::bucket::{Bucket, EncryptedElement};
use crate::candidate::{Candidate, PartialCandidate};
use crate::crypto::elgamal::PartialDecryption;
use crate::crypto::{ElGamalCiphertext, PaillierCiphertext};
use crate::prf::HASH_LEN;

/// `TreeUpdates`: the bucket-indexed delta produced by an `insert`.
pub type TreeUpdates = Vec<(usize, Bucket<EncryptedElement>)>;

/// `HashList`: present exactly on a sender's `I`/`II` message when that
/// sender performed an insert this day, so the receiver's mirrored tree's
/// PRF-derived bookkeeping (depth growth) stays in lockstep.
pub type HashList = Vec<[u8; HASH_LEN]>;

/// `MessageI { TreeUpdates; candidates; optional HashList }`: client-to-server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageI {
    pub sender_depth: usize,
    pub updates: TreeUpdates,
    pub hashes: HashList,
    pub candidates: Vec<WireCandidate>,
}

/// `MessageII { TreeUpdates; shuffled/partial-decrypted candidates }`:
/// server-to-client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageII {
    pub sender_depth: usize,
    pub updates: TreeUpdates,
    pub hashes: HashList,
    pub candidates: Vec<WirePartialCandidate>,
}

/// `MessageIII_SUM { Ciphertext sum }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageIIISum {
    pub sum: ElGamalCiphertext,
}

/// `MessageIII_SS { repeated Ciphertext payloads }`: pairs of (blinded
/// Paillier ciphertext, sender's partial decryption of it), one per hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageIIISs {
    pub blinded: Vec<PaillierCiphertext>,
    pub sender_partials: Vec<PaillierCiphertext>,
}

/// `MessageIV { Ciphertext sum }`: the responder's partial decryption of
/// the SUM total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageIV {
    pub sum_partial: PartialDecryption,
}

/// Wire form of a not-yet-masked [`Candidate`] (sent on `MessageI`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireCandidate {
    pub diff: ElGamalCiphertext,
    pub payload: Option<WirePayload>,
}

/// Wire form of the payload half of a candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WirePayload {
    ElGamal(ElGamalCiphertext),
    Paillier(PaillierCiphertext),
    ElGamalPartial(PartialDecryption),
}

/// Wire form of a masked + partially-decrypted [`PartialCandidate`] (sent
/// on `MessageII`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WirePartialCandidate {
    pub diff: PartialDecryption,
    pub payload: Option<WirePayload>,
}

impl From<&Candidate> for WireCandidate {
    fn from(c: &Candidate) -> Self {
        WireCandidate {
            diff: c.diff,
            payload: c.payload.as_ref().map(|p| match p {
                crate::candidate::CandidatePayload::ElGamal(ct) => WirePayload::ElGamal(*ct),
                crate::candidate::CandidatePayload::Paillier(ct) => WirePayload::Paillier(ct.clone()),
                crate::candidate::CandidatePayload::ElGamalPartial(p) => {
                    WirePayload::ElGamalPartial(*p)
                }
            }),
        }
    }
}

impl From<&PartialCandidate> for WirePartialCandidate {
    fn from(p: &PartialCandidate) -> Self {
        WirePartialCandidate {
            diff: p.diff,
            payload: p.payload.as_ref().map(|p| match p {
                crate::candidate::CandidatePayload::ElGamal(ct) => WirePayload::ElGamal(*ct),
                crate::candidate::CandidatePayload::Paillier(ct) => WirePayload::Paillier(ct.clone()),
                crate::candidate::CandidatePayload::ElGamalPartial(p) => {
                    WirePayload::ElGamalPartial(*p)
                }
            }),
        }
    }
}

impl From<WirePayload> for crate::candidate::CandidatePayload {
    fn from(p: WirePayload) -> Self {
        match p {
            WirePayload::ElGamal(ct) => crate::candidate::CandidatePayload::ElGamal(ct),
            WirePayload::Paillier(ct) => crate::candidate::CandidatePayload::Paillier(ct),
            WirePayload::ElGamalPartial(p) => crate::candidate::CandidatePayload::ElGamalPartial(p),
        }
    }
}

impl From<WireCandidate> for Candidate {
    fn from(c: WireCandidate) -> Self {
        Candidate {
            diff: c.diff,
            payload: c.payload.map(Into::into),
        }
    }
}

impl From<WirePartialCandidate> for PartialCandidate {
    fn from(p: WirePartialCandidate) -> Self {
        PartialCandidate {
            diff: p.diff,
            payload: p.payload.map(Into::into),
        }
    }
}

/// Empty acknowledgement: the transport contract requires exactly one
/// response per request, but SS's `MessageIIISs` has no
/// corresponding wire reply (B completes its share locally) — the server
/// still owes the client a response to close out that round.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Ack;

/// Every request kind the client may send to the server for one day,
/// carried over a single `serve_one` dispatcher loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientRequest {
    MessageI(MessageI),
    MessageIIISum(MessageIIISum),
    MessageIIISs(MessageIIISs),
}

/// Every response kind the server may send back, matching [`ClientRequest`]
/// one-to-one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerResponse {
    MessageII(MessageII),
    MessageIV(MessageIV),
    Ack(Ack),
}
