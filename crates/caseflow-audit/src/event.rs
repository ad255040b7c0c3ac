//! Decision events and the exported log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use caseflow_contracts::decision::DecisionRecord;

/// A single entry in the SHA-256 hash chain of one decision log.
///
/// Modifying any field, including those of the embedded `record`,
/// invalidates `this_hash` and every later `prev_hash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionEvent {
    /// Position in the chain, starting at 0.
    pub sequence: u64,

    pub log_id: String,

    pub record: DecisionRecord,

    /// `this_hash` of the previous event, or `GENESIS_HASH` for the first.
    pub prev_hash: String,

    /// SHA-256 (hex) over (log_id, sequence, prev_hash, record JSON).
    pub this_hash: String,
}

impl DecisionEvent {
    /// The `prev_hash` of the first event in every chain: 64 hex zeros.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// A point-in-time export of a decision log.
///
/// `terminal_hash` is the `this_hash` of the last event and commits to the
/// whole chain. Empty when nothing has been written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionLog {
    pub log_id: String,
    pub events: Vec<DecisionEvent>,
    pub exported_at: DateTime<Utc>,
    pub terminal_hash: String,
}
