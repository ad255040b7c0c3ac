//! Consultation history and review outcomes.
//!
//! Consultations are append-only and chronological: the last entry is the
//! latest and determines a case's displayed status.

use serde::{Deserialize, Serialize};

use crate::case::CaseStatus;

/// One neurologist consultation on a patient.
///
/// The same shape is used for entries fetched from the history endpoint and
/// for the payload written back when a reviewer records a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consultation {
    #[serde(rename = "neurologist_notes", alias = "notes", default)]
    pub notes: String,
    pub diagnosis: String,
    #[serde(default)]
    pub treatment_plan: String,
    /// Whether treatment was approved. Absent on the wire reads as `false`.
    #[serde(rename = "tpa_approval", alias = "approval", default)]
    pub approval: bool,
}

/// The two terminal outcomes a reviewer can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewOutcome {
    Approved,
    Denied,
}

impl ReviewOutcome {
    /// The `approval` flag a consultation carries for this outcome.
    pub fn approval(self) -> bool {
        matches!(self, ReviewOutcome::Approved)
    }

    /// The case status this outcome transitions to.
    pub fn status(self) -> CaseStatus {
        match self {
            ReviewOutcome::Approved => CaseStatus::Approved,
            ReviewOutcome::Denied => CaseStatus::Denied,
        }
    }
}
