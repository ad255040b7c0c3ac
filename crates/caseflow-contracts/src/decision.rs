//! Review decision records written to the audit log.
//!
//! Every `decide()` call that reaches the optimistic update produces a
//! `Requested` record followed by exactly one `Confirmed` or `RolledBack`
//! record, all sharing the same `DecisionId`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{consultation::ReviewOutcome, patient::PatientId};

/// Unique identifier for a single review decision attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecisionId(pub uuid::Uuid);

impl DecisionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for DecisionId {
    fn default() -> Self {
        Self::new()
    }
}

/// How far a decision got.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionPhase {
    /// The optimistic update was applied; write-back not yet confirmed.
    Requested,
    /// The upstream accepted the consultation.
    Confirmed,
    /// The write-back failed and the case was restored.
    RolledBack { reason: String },
}

/// An immutable record of one phase of a review decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub decision_id: DecisionId,
    pub case_id: PatientId,
    pub outcome: ReviewOutcome,
    pub diagnosis: String,
    /// Treatment plan as written back (lines joined with ", ").
    pub treatment_plan: String,
    pub phase: DecisionPhase,
    pub timestamp: DateTime<Utc>,
}

impl DecisionRecord {
    /// Copy this record into a later phase, stamped with the current time.
    pub fn advance(&self, phase: DecisionPhase) -> Self {
        Self {
            phase,
            timestamp: Utc::now(),
            ..self.clone()
        }
    }
}
