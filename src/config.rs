//! Protocol parameters, plain-struct configuration (no env-var magic).
//!
//! A value constructed explicitly by the CLI layer (or by tests) and
//! passed by reference into the party/session types.

use serde::{Deserialize, Serialize};

/// Default bucket capacity for non-stash nodes.
pub const DEFAULT_NODE_SIZE: usize = 4;
/// Default stash capacity (must be `>= NODE_SIZE`).
pub const DEFAULT_STASH_SIZE: usize = 4;
/// Default ceiling for BSGS discrete-log recovery in the exponential-ElGamal
/// SUM path.
pub const DEFAULT_MAX_SUM: i64 = 1 << 20;

/// The four supported functionalities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Functionality {
    /// Reveal the intersection itself.
    Psi,
    /// Reveal only the cardinality of the intersection.
    CardinalityOnly,
    /// Reveal the sum of P0's payloads on intersecting elements.
    Sum,
    /// Reveal additive secret shares of P0's payloads on intersecting elements.
    SecretShare,
}

impl Functionality {
    /// Whether this functionality's day flow includes a III/IV round trip.
    pub fn has_round_two(self) -> bool {
        matches!(self, Functionality::Sum | Functionality::SecretShare)
    }

    /// Whether payloads travel alongside elements at all.
    pub fn carries_payload(self) -> bool {
        matches!(self, Functionality::Sum | Functionality::SecretShare)
    }
}

/// Which party role this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// P0: the client that initiates each day with MessageI.
    PartyZero,
    /// P1: the server that responds with MessageII (and MessageIV for SUM).
    PartyOne,
}

/// Tree and protocol tuning parameters, explicit and owned by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bucket capacity for non-stash nodes.
    pub node_size: usize,
    /// Stash capacity.
    pub stash_size: usize,
    /// BSGS discrete-log search bound for SUM.
    pub max_sum: i64,
    /// Which of the four functionalities this run computes.
    pub functionality: Functionality,
    /// Whether the deletion-capable variant is in effect.
    pub deletion_enabled: bool,
    /// Number of protocol days to run.
    pub total_days: usize,
    /// Directory holding key material (EC keypair share, Paillier shares).
    pub key_dir: std::path::PathBuf,
    /// Directory holding per-day CSV datasets.
    pub data_dir: std::path::PathBuf,
    /// Directory persisted tree snapshots are written to/read from, if any.
    pub tree_dir: Option<std::path::PathBuf>,
}

impl Config {
    /// Build a config with the design's stated defaults, overriding only
    /// the fields that differ per run.
    pub fn new(
        functionality: Functionality,
        total_days: usize,
        key_dir: impl Into<std::path::PathBuf>,
        data_dir: impl Into<std::path::PathBuf>,
    ) -> Self {
        Config {
            node_size: DEFAULT_NODE_SIZE,
            stash_size: DEFAULT_STASH_SIZE,
            max_sum: DEFAULT_MAX_SUM,
            functionality,
            deletion_enabled: false,
            total_days,
            key_dir: key_dir.into(),
            data_dir: data_dir.into(),
            tree_dir: None,
        }
    }

    /// Validate cross-field constraints (`stash_size >= node_size`, etc.).
    pub fn validate(&self) -> Result<(), crate::error::UpsiError> {
        if self.stash_size < self.node_size {
            return Err(crate::error::UpsiError::Internal(format!(
                "stash_size ({}) must be >= node_size ({})",
                self.stash_size, self.node_size
            )));
        }
        if self.node_size == 0 {
            return Err(crate::error::UpsiError::Internal(
                "node_size must be nonzero".into(),
            ));
        }
        Ok(())
    }
}
