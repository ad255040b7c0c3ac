//! Hash-chain primitives: hashing and chain integrity verification.
//!
//! Hash input layout (bytes, in order):
//!   1. log_id as UTF-8 bytes
//!   2. sequence as 8-byte little-endian
//!   3. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   4. compact JSON of the decision record

use sha2::{Digest, Sha256};

use caseflow_contracts::{
    decision::DecisionRecord,
    error::{CaseflowError, CaseflowResult},
};

use crate::event::DecisionEvent;

/// Compute the SHA-256 hash for a single decision event.
///
/// Returns a lowercase 64-character hex string, or `AuditWriteFailed` if the
/// record cannot be serialized.
pub fn hash_event(
    log_id: &str,
    sequence: u64,
    record: &DecisionRecord,
    prev_hash: &str,
) -> CaseflowResult<String> {
    let record_json = serde_json::to_vec(record).map_err(|e| CaseflowError::AuditWriteFailed {
        reason: format!("decision record could not be serialized: {}", e),
    })?;

    let mut hasher = Sha256::new();
    hasher.update(log_id.as_bytes());
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&record_json);

    Ok(hex::encode(hasher.finalize()))
}

/// Verify the integrity of a decision chain.
///
/// Valid when every event's `prev_hash` equals the previous `this_hash`
/// (`GENESIS_HASH` for the first), every `this_hash` matches the value
/// recomputed from its fields, and sequences run 0, 1, 2, … without gaps.
/// An empty chain is valid.
pub fn verify_chain(events: &[DecisionEvent]) -> bool {
    let mut expected_prev = DecisionEvent::GENESIS_HASH.to_string();

    for (position, event) in events.iter().enumerate() {
        if event.sequence != position as u64 || event.prev_hash != expected_prev {
            return false;
        }

        match hash_event(&event.log_id, event.sequence, &event.record, &event.prev_hash) {
            Ok(recomputed) if recomputed == event.this_hash => {}
            _ => return false,
        }

        expected_prev = event.this_hash.clone();
    }

    true
}
