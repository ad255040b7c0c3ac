//! In-memory implementation of `DecisionAudit`.
//!
//! `InMemoryDecisionLog` keeps all events in a `Vec` behind a `Mutex`, so the
//! review workflow can write from any task. Use `export_log()` to obtain a
//! snapshot of the chain and `verify_integrity()` to confirm it has not been
//! tampered with in memory.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::debug;

use caseflow_contracts::{
    decision::DecisionRecord,
    error::{CaseflowError, CaseflowResult},
    patient::PatientId,
};
use caseflow_core::traits::DecisionAudit;

use crate::{
    chain::{hash_event, verify_chain},
    event::{DecisionEvent, DecisionLog},
};

// ── Internal mutable state ────────────────────────────────────────────────────

pub(crate) struct InMemoryState {
    /// All events written so far, in append order.
    pub(crate) events: Vec<DecisionEvent>,

    /// The next sequence number to assign.
    pub(crate) sequence: u64,

    /// `this_hash` of the last event, or `GENESIS_HASH` before the first.
    pub(crate) last_hash: String,
}

// ── Public log ────────────────────────────────────────────────────────────────

/// An append-only decision log backed by a SHA-256 hash chain.
pub struct InMemoryDecisionLog {
    log_id: String,
    pub(crate) state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryDecisionLog {
    pub fn new(log_id: impl Into<String>) -> Self {
        let state = InMemoryState {
            events: Vec::new(),
            sequence: 0,
            last_hash: DecisionEvent::GENESIS_HASH.to_string(),
        };
        Self {
            log_id: log_id.into(),
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn log_id(&self) -> &str {
        &self.log_id
    }

    // Readers only inspect the chain; a poisoned lock still holds a
    // verifiable one.
    fn read_state(&self) -> MutexGuard<'_, InMemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.read_state().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every record written for `case_id`, in chain order.
    pub fn decisions_for(&self, case_id: &PatientId) -> Vec<DecisionRecord> {
        self.read_state()
            .events
            .iter()
            .filter(|e| &e.record.case_id == case_id)
            .map(|e| e.record.clone())
            .collect()
    }

    /// Export all events written so far.
    pub fn export_log(&self) -> DecisionLog {
        let state = self.read_state();
        let terminal_hash = state
            .events
            .last()
            .map(|e| e.this_hash.clone())
            .unwrap_or_default();

        DecisionLog {
            log_id: self.log_id.clone(),
            events: state.events.clone(),
            exported_at: Utc::now(),
            terminal_hash,
        }
    }

    /// Whether the in-memory chain is intact. See `verify_chain`.
    pub fn verify_integrity(&self) -> bool {
        verify_chain(&self.read_state().events)
    }
}

// ── DecisionAudit impl ────────────────────────────────────────────────────────

impl DecisionAudit for InMemoryDecisionLog {
    /// Append one decision record to the hash chain.
    ///
    /// Returns `AuditWriteFailed` if the lock is poisoned or the record
    /// cannot be hashed; the chain is left unchanged in both cases.
    fn write(&self, record: &DecisionRecord) -> CaseflowResult<()> {
        let mut state = self.state.lock().map_err(|e| CaseflowError::AuditWriteFailed {
            reason: format!("decision log lock poisoned: {}", e),
        })?;

        let prev_hash = state.last_hash.clone();
        let sequence = state.sequence;
        let this_hash = hash_event(&self.log_id, sequence, record, &prev_hash)?;

        state.events.push(DecisionEvent {
            sequence,
            log_id: self.log_id.clone(),
            record: record.clone(),
            prev_hash,
            this_hash: this_hash.clone(),
        });
        state.sequence += 1;
        state.last_hash = this_hash;

        debug!(
            log_id = %self.log_id,
            sequence,
            decision_id = %record.decision_id.0,
            patient_id = %record.case_id,
            "decision record appended"
        );

        Ok(())
    }
}
