//! Two-party Updatable Private Set Intersection (UPSI) protocol core.
//!
//! This crate implements the encrypted oblivious-tree data structure and
//! the per-day two-party message schedule shared by all four supported
//! functionalities: PSI (the intersection itself), CA (its cardinality),
//! SUM (the sum of P0's payloads on hits), and SS (additive secret shares
//! of P0's payloads on hits). A deletion-capable variant (`deletion`
//! feature, [`config::Config::deletion_enabled`]) blinds every SS
//! candidate instead of only its hits, so an add/delete pair for the same
//! element cancels out without revealing to either peer which elements
//! matched; see [`deletion`].
//!
//! ## Invariants
//!
//! - **Tree capacity.** Every bucket holds at most its declared capacity;
//!   the stash (index 0) alone may exceed `NODE_SIZE`, up to `STASH_SIZE`.
//! - **Address invariant.** Any entry stored at a non-stash bucket `u` has
//!   `u` on its own leaf's root-to-leaf path at the tree's current depth.
//! - **PRF lockstep.** Both parties derive insertion hashes from the same
//!   pre-shared key and an identically-advanced counter
//!   ([`prf::HashStream`]), never from a per-party nondeterministic RNG —
//!   otherwise the two mirrored trees desynchronize.
//!
//! Module layout follows the dependency order of the design: crypto
//! primitives and the data model at the bottom, the tree and its
//! encrypted mirror above that, the candidate evaluator and
//! per-functionality state machine above that, and the transport/metrics
//! ambient concerns alongside.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

/// Crate-wide error kinds (`TreeError`, `CryptoError`, `WireError`,
/// `TransportError`, `SessionError`) unified under [`error::UpsiError`].
pub mod error;
/// Protocol parameters (`NODE_SIZE`, `STASH_SIZE`, `MAX_SUM`, functionality
/// and role tags) as a plain, explicitly-constructed [`config::Config`].
pub mod config;
/// Pre-shared-key counter-mode PRF synchronizing insertion hashes between
/// parties without extra communication.
pub mod prf;
/// Crypto primitives adapter: EC group, ElGamal, Paillier, BSGS recovery.
pub mod crypto;
/// Data model: elements, payloads, and the closed set of bucket content
/// kinds ([`bucket::EncryptedElement`]) the tree can hold.
pub mod bucket;
/// The bucketed oblivious tree: history-independent binary tree of
/// fixed-capacity buckets plus a stash.
pub mod tree;
/// Each party's plaintext tree paired with its encrypted mirror of the
/// peer's tree, kept in lockstep via the shared PRF.
pub mod tree_pair;
/// Homomorphic per-element candidate construction, shuffle/mask/partial
/// decrypt, and result recovery.
pub mod candidate;
/// The per-functionality day state machine (`WAIT_I` .. `DAY_DONE`).
pub mod functionality;
/// Wire message types and their conversions to/from the in-memory
/// candidate/bucket representations.
pub mod wire;
/// The per-day session driver: one `Party` value parameterized by role
/// and functionality.
pub mod party;
/// Per-day byte and timing accounting, printed at end-of-run.
pub mod metrics;
/// Blocking length-delimited TCP transport adapter.
pub mod transport;
/// Chou-Orlandi 1-of-2 base oblivious transfer, built on the same curve
/// group as [`crypto::curve`]. Not on the live SS-with-deletion path (see
/// [`deletion`]), but kept as a real, independently testable primitive for
/// callers that need an actual OT handshake rather than a same-process
/// equality check.
#[cfg(feature = "deletion")]
pub mod gc_ot;
/// The deletion-capable SS variant: blind every candidate, not just hits.
#[cfg(feature = "deletion")]
pub mod deletion;

pub use config::{Config, Functionality, Role};
pub use error::{ErrorKind, UpsiError};
pub use party::{Keys, Output, Party};
