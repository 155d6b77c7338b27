use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::canonical_sha256_hex;

/// The kind of governance fact an append-only [`LedgerEntry`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEntryType {
    TrustChange,
    WaterCoolerLesson,
    RegistryUpdate,
    TrustStabilityMetric,
    ArbitrationOutcome,
}

/// One hash-chained record in the governance ledger (spec.md §6).
///
/// `entry_hash` commits to `seq`, `entry_type`, `timestamp`, `payload`, and
/// `prev_hash` via [`canonical_sha256_hex`]; a ledger whose `entry_hash`
/// chain does not reproduce on replay has been tampered with or corrupted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub seq: u64,
    pub entry_type: LedgerEntryType,
    pub timestamp: DateTime<Utc>,
    pub payload: Value,
    pub prev_hash: String,
    pub entry_hash: String,
}

/// `prev_hash` used for the first entry in a ledger.
pub const GENESIS_HASH: &str = "GENESIS";

impl LedgerEntry {
    /// Build the next entry in the chain, computing `entry_hash` from the
    /// given `prev_hash` and this entry's own fields.
    #[must_use]
    pub fn next(
        seq: u64,
        entry_type: LedgerEntryType,
        timestamp: DateTime<Utc>,
        payload: Value,
        prev_hash: &str,
    ) -> Self {
        let hashable = serde_json::json!({
            "seq": seq,
            "entry_type": entry_type,
            "timestamp": timestamp.to_rfc3339(),
            "payload": payload,
            "prev_hash": prev_hash,
        });
        let entry_hash = canonical_sha256_hex(&hashable);
        Self {
            seq,
            entry_type,
            timestamp,
            payload,
            prev_hash: prev_hash.to_owned(),
            entry_hash,
        }
    }

    /// Recompute this entry's hash and compare it against the stored one.
    #[must_use]
    pub fn verify(&self) -> bool {
        let recomputed = Self::next(
            self.seq,
            self.entry_type,
            self.timestamp,
            self.payload.clone(),
            &self.prev_hash,
        );
        recomputed.entry_hash == self.entry_hash
    }
}
