//! Scripted test doubles shared by the core's unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use caseflow_contracts::{
    case::ResourceKind,
    consultation::Consultation,
    decision::DecisionRecord,
    error::{CaseflowError, CaseflowResult},
    patient::{
        EligibilityVerdict, Gender, LabClass, LabResult, PatientId, PatientIdentity, VitalsRecord,
    },
};

use crate::traits::{DecisionAudit, ResourceClient};

pub(crate) fn identity(id: &str) -> PatientIdentity {
    PatientIdentity {
        id: PatientId::new(id),
        name: format!("Patient {id}"),
        age: 64,
        gender: Gender::Female,
    }
}

pub(crate) fn vitals() -> VitalsRecord {
    VitalsRecord {
        chief_complaint: "Facial droop and arm drift".to_string(),
        medical_history: "Atrial fibrillation".to_string(),
        blood_pressure_systolic: 150,
        blood_pressure_diastolic: 88,
        heart_rate: 92,
        respiratory_rate: 17,
        oxygen_saturation: 97.0,
        significant_head_trauma: false,
        recent_surgery: false,
        recent_myocardial_infarction: false,
        recent_hemorrhage: false,
        platelet_count: 210_000,
        severity_score: Some(9),
        coagulation_index: Some(1.1),
    }
}

pub(crate) fn labs() -> LabResult {
    LabResult {
        cbc: LabClass::Normal,
        glucose: 118.0,
        creatinine: 0.9,
        coagulation: LabClass::Normal,
    }
}

pub(crate) fn consultation(approval: bool) -> Consultation {
    Consultation {
        notes: "prior review".to_string(),
        diagnosis: "ischemic stroke".to_string(),
        treatment_plan: "alteplase".to_string(),
        approval,
    }
}

type Key = (String, ResourceKind);

#[derive(Default)]
struct Script {
    identities: Vec<PatientIdentity>,
    identity_error: Option<CaseflowError>,
    failures: HashSet<Key>,
    flaky: HashMap<Key, u32>,
    delays: HashMap<Key, Duration>,
    history: HashMap<String, Vec<Consultation>>,
    eligible: HashMap<String, bool>,
    reject_writes: bool,
    write_delay: Option<Duration>,
}

/// An in-memory `ResourceClient` with per-(patient, resource) failures.
#[derive(Default)]
pub(crate) struct ScriptedClient {
    script: Mutex<Script>,
    pub(crate) calls: Arc<Mutex<Vec<Key>>>,
    pub(crate) submitted: Arc<Mutex<Vec<(PatientId, Consultation)>>>,
}

impl ScriptedClient {
    pub(crate) fn with_patients(ids: &[&str]) -> Self {
        let client = Self::default();
        client.script.lock().unwrap().identities = ids.iter().map(|id| identity(id)).collect();
        client
    }

    pub(crate) fn with_identities(identities: Vec<PatientIdentity>) -> Self {
        let client = Self::default();
        client.script.lock().unwrap().identities = identities;
        client
    }

    pub(crate) fn identity_list_fails(self) -> Self {
        self.script.lock().unwrap().identity_error =
            Some(CaseflowError::transport("identities", "connection refused"));
        self
    }

    pub(crate) fn fail(self, id: &str, kind: ResourceKind) -> Self {
        self.script.lock().unwrap().failures.insert((id.to_string(), kind));
        self
    }

    pub(crate) fn fail_everything_for(self, id: &str) -> Self {
        for kind in ResourceKind::ALL {
            self.script.lock().unwrap().failures.insert((id.to_string(), kind));
        }
        self
    }

    /// Fail the first `times` attempts, then succeed.
    pub(crate) fn flaky(self, id: &str, kind: ResourceKind, times: u32) -> Self {
        self.script.lock().unwrap().flaky.insert((id.to_string(), kind), times);
        self
    }

    pub(crate) fn delay(self, id: &str, kind: ResourceKind, delay: Duration) -> Self {
        self.script.lock().unwrap().delays.insert((id.to_string(), kind), delay);
        self
    }

    pub(crate) fn history(self, id: &str, entries: Vec<Consultation>) -> Self {
        self.script.lock().unwrap().history.insert(id.to_string(), entries);
        self
    }

    pub(crate) fn eligible(self, id: &str, eligible: bool) -> Self {
        self.script.lock().unwrap().eligible.insert(id.to_string(), eligible);
        self
    }

    /// Hold every write-back for `delay` before answering.
    pub(crate) fn slow_writes(self, delay: Duration) -> Self {
        self.script.lock().unwrap().write_delay = Some(delay);
        self
    }

    pub(crate) fn reject_writes(&self, reject: bool) {
        self.script.lock().unwrap().reject_writes = reject;
    }

    pub(crate) fn calls_for(&self, id: &str, kind: ResourceKind) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(call_id, call_kind)| call_id == id && *call_kind == kind)
            .count()
    }

    async fn gate(&self, id: &PatientId, kind: ResourceKind) -> CaseflowResult<()> {
        let key = (id.0.clone(), kind);
        self.calls.lock().unwrap().push(key.clone());

        let delay = self.script.lock().unwrap().delays.get(&key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut script = self.script.lock().unwrap();
        if script.failures.contains(&key) {
            return Err(CaseflowError::Transport {
                resource: kind.as_str().to_string(),
                status: Some(500),
                reason: "scripted failure".to_string(),
            });
        }
        if let Some(remaining) = script.flaky.get_mut(&key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(CaseflowError::transport(kind.as_str(), "scripted flake"));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceClient for ScriptedClient {
    async fn list_patient_identities(&self) -> CaseflowResult<Vec<PatientIdentity>> {
        let script = self.script.lock().unwrap();
        match &script.identity_error {
            Some(err) => Err(err.clone()),
            None => Ok(script.identities.clone()),
        }
    }

    async fn get_vitals(&self, id: &PatientId) -> CaseflowResult<VitalsRecord> {
        self.gate(id, ResourceKind::Vitals).await?;
        Ok(vitals())
    }

    async fn get_labs(&self, id: &PatientId) -> CaseflowResult<LabResult> {
        self.gate(id, ResourceKind::Labs).await?;
        Ok(labs())
    }

    async fn get_consultations(&self, id: &PatientId) -> CaseflowResult<Vec<Consultation>> {
        self.gate(id, ResourceKind::Consultations).await?;
        Ok(self.script.lock().unwrap().history.get(&id.0).cloned().unwrap_or_default())
    }

    async fn get_eligibility(&self, id: &PatientId) -> CaseflowResult<EligibilityVerdict> {
        self.gate(id, ResourceKind::Eligibility).await?;
        let eligible = self.script.lock().unwrap().eligible.get(&id.0).copied().unwrap_or(true);
        Ok(EligibilityVerdict { eligible })
    }

    async fn submit_consultation(&self, id: &PatientId, payload: &Consultation) -> CaseflowResult<()> {
        let delay = self.script.lock().unwrap().write_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut script = self.script.lock().unwrap();
        if script.reject_writes {
            return Err(CaseflowError::Transport {
                resource: "consultations".to_string(),
                status: Some(502),
                reason: "bad gateway".to_string(),
            });
        }
        script.history.entry(id.0.clone()).or_default().push(payload.clone());
        self.submitted.lock().unwrap().push((id.clone(), payload.clone()));
        Ok(())
    }
}

/// A decision audit that records every write and can be told to fail.
#[derive(Default)]
pub(crate) struct RecordingAudit {
    pub(crate) records: Arc<Mutex<Vec<DecisionRecord>>>,
    pub(crate) fail: Mutex<bool>,
}

impl DecisionAudit for RecordingAudit {
    fn write(&self, record: &DecisionRecord) -> CaseflowResult<()> {
        if *self.fail.lock().unwrap() {
            return Err(CaseflowError::AuditWriteFailed {
                reason: "disk full".to_string(),
            });
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}
