//! The review state machine: `pending → approved | denied`.
//!
//! A decision is applied optimistically so the reviewer sees it
//! immediately, then confirmed against the upstream:
//!
//!   Validate → Optimistic edit → Audit (requested) → Write-back
//!       → Confirm (audit confirmed) | Roll back (audit rolled_back, surface error)
//!
//! Approved and denied are terminal. Validation, lookup, writability, and
//! transition failures happen before any mutation.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use caseflow_contracts::{
    case::{Case, CaseStatus},
    consultation::{Consultation, ReviewOutcome},
    decision::{DecisionId, DecisionPhase, DecisionRecord},
    error::{CaseflowError, CaseflowResult},
    patient::PatientId,
};

use crate::{
    registry::CaseRegistry,
    traits::{DecisionAudit, ResourceClient},
};

/// Drives review decisions against the shared registry.
pub struct ReviewWorkflow {
    client: Arc<dyn ResourceClient>,
    registry: Arc<CaseRegistry>,
    audit: Arc<dyn DecisionAudit>,
}

impl ReviewWorkflow {
    pub fn new(
        client: Arc<dyn ResourceClient>,
        registry: Arc<CaseRegistry>,
        audit: Arc<dyn DecisionAudit>,
    ) -> Self {
        Self { client, registry, audit }
    }

    /// Record a review decision for `case_id`.
    ///
    /// `treatment_plan` lines are trimmed and blank lines dropped; the rest
    /// are joined with `", "` in the written consultation.
    ///
    /// # Errors
    ///
    /// - `Validation` if the diagnosis or treatment plan is blank
    /// - `CaseNotFound`, `NotWritable`, `InvalidTransition` before any change
    /// - `AuditWriteFailed` if the decision could not be audited (rolled back)
    /// - the write-back's `Transport` error after the case is rolled back
    ///
    /// On success returns the case as confirmed. A refresh that lands while
    /// the write-back is in flight keeps the decision applied.
    pub async fn decide(
        &self,
        case_id: &PatientId,
        outcome: ReviewOutcome,
        diagnosis: &str,
        treatment_plan: &[String],
    ) -> CaseflowResult<Case> {
        let payload = build_consultation(outcome, diagnosis, treatment_plan)?;

        // ── Optimistic edit ──────────────────────────────────────────────────
        let edit = self.registry.apply_optimistic(case_id, payload.clone(), |case| {
            if !case.is_writable() {
                return Err(CaseflowError::NotWritable {
                    case_id: case.id.to_string(),
                    origin: case.origin.to_string(),
                });
            }
            if case.status != CaseStatus::Pending {
                return Err(CaseflowError::InvalidTransition {
                    case_id: case.id.to_string(),
                    from: case.status.to_string(),
                });
            }
            Ok(())
        })?;

        let requested = DecisionRecord {
            decision_id: DecisionId::new(),
            case_id: case_id.clone(),
            outcome,
            diagnosis: payload.diagnosis.clone(),
            treatment_plan: payload.treatment_plan.clone(),
            phase: DecisionPhase::Requested,
            timestamp: Utc::now(),
        };
        let decision_id = requested.decision_id.0.to_string();

        if let Err(e) = self.audit.write(&requested) {
            warn!(decision_id = %decision_id, patient_id = %case_id, error = %e, "decision could not be audited, rolling back");
            self.registry.rollback(&edit);
            self.registry.clear_selection_of(case_id);
            return Err(e);
        }

        // ── Remote confirmation ──────────────────────────────────────────────
        let result = self.client.submit_consultation(case_id, &payload).await;
        self.registry.clear_selection_of(case_id);

        match result {
            Ok(()) => {
                let confirmed = self.registry.confirm(&edit);
                info!(
                    decision_id = %decision_id,
                    patient_id = %case_id,
                    outcome = ?outcome,
                    "review decision confirmed"
                );
                self.audit_settlement(&requested, DecisionPhase::Confirmed);
                Ok(confirmed.unwrap_or(edit.after))
            }
            Err(e) => {
                let restored = self.registry.rollback(&edit);
                warn!(
                    decision_id = %decision_id,
                    patient_id = %case_id,
                    restored,
                    error = %e,
                    "write-back failed, optimistic decision rolled back"
                );
                self.audit_settlement(&requested, DecisionPhase::RolledBack { reason: e.to_string() });
                Err(e)
            }
        }
    }

    // The write-back has already settled, so a failed settlement record is
    // logged rather than turned into a failure of the decision itself.
    fn audit_settlement(&self, requested: &DecisionRecord, phase: DecisionPhase) {
        if let Err(e) = self.audit.write(&requested.advance(phase)) {
            error!(
                decision_id = %requested.decision_id.0,
                patient_id = %requested.case_id,
                error = %e,
                "failed to audit decision settlement"
            );
        }
    }
}

/// Validate reviewer input and build the consultation to append.
fn build_consultation(
    outcome: ReviewOutcome,
    diagnosis: &str,
    treatment_plan: &[String],
) -> CaseflowResult<Consultation> {
    let diagnosis = diagnosis.trim();
    if diagnosis.is_empty() {
        return Err(CaseflowError::Validation {
            reason: "a diagnosis is required before recording a decision".to_string(),
        });
    }

    let lines: Vec<&str> = treatment_plan
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        return Err(CaseflowError::Validation {
            reason: "a treatment plan is required before recording a decision".to_string(),
        });
    }

    Ok(Consultation {
        notes: diagnosis.to_string(),
        diagnosis: diagnosis.to_string(),
        treatment_plan: lines.join(", "),
        approval: outcome.approval(),
    })
}
