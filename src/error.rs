//! Crate-wide error kinds.
//!
//! Mirrors the five error categories of the design: `InvalidArgument`,
//! `Invariant`, `Crypto`, `Transport`, `Internal`. Each layer gets its own
//! `thiserror` enum; [`UpsiError`] wraps them so callers at the session
//! boundary can match on [`UpsiError::kind`] without caring which layer
//! raised it.

use thiserror::Error;

/// Errors raised by the bucketed oblivious tree.
#[derive(Debug, Error)]
pub enum TreeError {
    /// A bucket received more entries than its declared capacity.
    #[error("bucket {index} exceeds capacity {capacity}")]
    Capacity {
        /// Bucket index that overflowed.
        index: usize,
        /// Declared capacity of that bucket.
        capacity: usize,
    },
    /// The stash overflowed even after a depth growth and re-pack.
    #[error("stash overflow: {count} entries exceed stash size {limit} after growth")]
    Stash {
        /// Entries that needed a stash slot.
        count: usize,
        /// Configured stash capacity.
        limit: usize,
    },
    /// The two mirrored trees (plaintext/encrypted) disagree on depth.
    #[error("depth mismatch: local depth {local} vs peer delta depth {peer}")]
    Depth {
        /// This side's current depth.
        local: usize,
        /// Depth implied by an incoming delta.
        peer: usize,
    },
    /// An entry was found at a bucket that is not on its own root-to-leaf path.
    #[error("address invariant violated: entry's leaf {leaf} not reachable from bucket {bucket}")]
    Address {
        /// Bucket index where the violation was observed.
        bucket: usize,
        /// Leaf the entry actually hashes to.
        leaf: usize,
    },
}

/// Errors raised by the crypto primitives adapter.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// A ciphertext component is not a member of the expected group.
    #[error("ciphertext operand outside expected group")]
    InvalidCiphertext,
    /// A decrypted integer fell outside the range the caller expected.
    #[error("decrypted value out of range")]
    RangeError,
    /// Baby-step-giant-step search exhausted `MAX_SUM` without a match.
    #[error("BSGS search exhausted MAX_SUM={max_sum} without recovering a discrete log")]
    BsgsNotFound {
        /// Configured search bound.
        max_sum: i64,
    },
    /// Two ciphertexts or keys referenced incompatible moduli/curves.
    #[error("group mismatch between operands")]
    GroupMismatch,
}

/// Errors raised while decoding or validating wire messages.
#[derive(Debug, Error)]
pub enum WireError {
    /// A required field was absent.
    #[error("truncated message: missing field `{field}`")]
    Truncated {
        /// Name of the missing field.
        field: &'static str,
    },
    /// A tagged union carried an unrecognized tag.
    #[error("unrecognized tag {tag} for `{field}`")]
    BadTag {
        /// Field where the tag appeared.
        field: &'static str,
        /// The unrecognized tag value.
        tag: u32,
    },
    /// A declared length did not match the actual payload length.
    #[error("length mismatch: declared {declared}, actual {actual}")]
    LengthMismatch {
        /// Declared length.
        declared: usize,
        /// Actual length.
        actual: usize,
    },
}

/// Errors raised by the transport adapter.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The peer closed the connection.
    #[error("peer closed the connection")]
    PeerClosed,
    /// A message exceeded the configured size ceiling.
    #[error("message of {size} bytes exceeds ceiling of {limit} bytes")]
    TooLarge {
        /// Actual serialized size.
        size: u64,
        /// Configured ceiling.
        limit: u64,
    },
}

/// Errors raised by the per-day session state machine.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A message arrived that the current state does not expect.
    #[error("out-of-order message: expected {expected}, got {got}")]
    OutOfOrderMessage {
        /// State label the session expected to receive.
        expected: &'static str,
        /// State label actually observed.
        got: &'static str,
    },
    /// Two parties disagree about which day or functionality is active.
    #[error("state mismatch: {0}")]
    StateMismatch(String),
}

/// Umbrella error type spanning every layer, with a [`kind`](UpsiError::kind)
/// accessor matching the design's five error categories.
#[derive(Debug, Error)]
pub enum UpsiError {
    /// Wire decode/validation failure (`InvalidArgument`).
    #[error(transparent)]
    Wire(#[from] WireError),
    /// Tree invariant failure (`Invariant`).
    #[error(transparent)]
    Tree(#[from] TreeError),
    /// Cryptographic failure (`Crypto`).
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    /// Transport failure (`Transport`).
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Out-of-order or inconsistent session state (`InvalidArgument`/`Internal`).
    #[error(transparent)]
    Session(#[from] SessionError),
    /// Unreachable branch was reached (`Internal`).
    #[error("internal error: {0}")]
    Internal(String),
}

/// The five error-kind labels from the design document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or out-of-order input.
    InvalidArgument,
    /// A structural invariant was violated.
    Invariant,
    /// A cryptographic operation failed.
    Crypto,
    /// A transport-level failure occurred.
    Transport,
    /// An unreachable branch was reached.
    Internal,
}

impl UpsiError {
    /// Classify this error into one of the five design-level kinds.
    pub fn kind(&self) -> ErrorKind {
        match self {
            UpsiError::Wire(_) => ErrorKind::InvalidArgument,
            UpsiError::Tree(_) => ErrorKind::Invariant,
            UpsiError::Crypto(_) => ErrorKind::Crypto,
            UpsiError::Transport(_) => ErrorKind::Transport,
            UpsiError::Session(_) => ErrorKind::InvalidArgument,
            UpsiError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, UpsiError>;
