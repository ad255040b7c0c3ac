//! Trait seams of the Caseflow core.
//!
//! - `ResourceClient`: the I/O boundary to the upstream patient API
//! - `DecisionAudit`: trusted sink recording every review decision
//!
//! Both are object-safe so the desk can hold them behind `Arc<dyn _>`.

use async_trait::async_trait;

use caseflow_contracts::{
    consultation::Consultation,
    decision::DecisionRecord,
    error::CaseflowResult,
    patient::{EligibilityVerdict, LabResult, PatientId, PatientIdentity, VitalsRecord},
};

/// Typed access to the four per-patient sub-resources and the write-back.
///
/// Pure I/O: implementations must not retry, cache, or interpret results.
/// Every failure is returned as `CaseflowError::Transport`; nothing panics
/// past this boundary.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// List every identity with the patient role.
    async fn list_patient_identities(&self) -> CaseflowResult<Vec<PatientIdentity>>;

    async fn get_vitals(&self, id: &PatientId) -> CaseflowResult<VitalsRecord>;

    async fn get_labs(&self, id: &PatientId) -> CaseflowResult<LabResult>;

    /// Consultation history in chronological order.
    async fn get_consultations(&self, id: &PatientId) -> CaseflowResult<Vec<Consultation>>;

    async fn get_eligibility(&self, id: &PatientId) -> CaseflowResult<EligibilityVerdict>;

    /// Append a consultation to the patient's history.
    async fn submit_consultation(&self, id: &PatientId, payload: &Consultation) -> CaseflowResult<()>;
}

/// The decision audit log.
///
/// Implementations must treat `write` as append-only. A failed write of a
/// `Requested` record aborts the decision before it reaches the upstream.
pub trait DecisionAudit: Send + Sync {
    fn write(&self, record: &DecisionRecord) -> CaseflowResult<()>;
}
