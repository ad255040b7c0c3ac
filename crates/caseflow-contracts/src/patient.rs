//! Patient-owned records fetched read-only by the review workflow.
//!
//! Field names on the wire follow the upstream intake API, which is why
//! several fields carry `serde(rename)` attributes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier for a patient, issued by the upstream identity service.
///
/// A `Case` uses the same identifier, so refreshes upsert rather than
/// duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientId(pub String);

impl PatientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the identifier is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// Patient gender as reported by the identity service.
///
/// Parsed case-insensitively; unrecognized labels are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Gender {
    Male,
    Female,
    Other(String),
}

impl From<String> for Gender {
    fn from(label: String) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Gender::Male,
            "female" | "f" => Gender::Female,
            _ => Gender::Other(label),
        }
    }
}

impl From<Gender> for String {
    fn from(gender: Gender) -> Self {
        match gender {
            Gender::Male => "Male".to_string(),
            Gender::Female => "Female".to_string(),
            Gender::Other(label) => label,
        }
    }
}

/// Demographic identity of a patient. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientIdentity {
    pub id: PatientId,
    pub name: String,
    pub age: u32,
    pub gender: Gender,
}

/// Presenting vitals and exclusion flags submitted by the patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalsRecord {
    pub chief_complaint: String,
    pub medical_history: String,
    pub blood_pressure_systolic: u32,
    pub blood_pressure_diastolic: u32,
    pub heart_rate: u32,
    pub respiratory_rate: u32,
    /// Peripheral oxygen saturation, in percent.
    pub oxygen_saturation: f64,
    pub significant_head_trauma: bool,
    pub recent_surgery: bool,
    pub recent_myocardial_infarction: bool,
    pub recent_hemorrhage: bool,
    pub platelet_count: u32,
    /// NIHSS stroke severity score, when assessed.
    #[serde(rename = "nihss_score", default, skip_serializing_if = "Option::is_none")]
    pub severity_score: Option<u32>,
    /// International normalized ratio, when measured.
    #[serde(rename = "inr_score", default, skip_serializing_if = "Option::is_none")]
    pub coagulation_index: Option<f64>,
}

impl VitalsRecord {
    /// True if any of the four hard exclusion flags is set.
    pub fn has_exclusion_flag(&self) -> bool {
        self.significant_head_trauma
            || self.recent_surgery
            || self.recent_myocardial_infarction
            || self.recent_hemorrhage
    }
}

/// Two-way classification used by the CBC and coagulation panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabClass {
    Normal,
    Abnormal,
}

/// Laboratory panel results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabResult {
    pub cbc: LabClass,
    /// Basic metabolic panel glucose, mg/dL.
    #[serde(rename = "bmp_glucose")]
    pub glucose: f64,
    /// Serum creatinine, mg/dL.
    pub creatinine: f64,
    pub coagulation: LabClass,
}

/// Treatment-eligibility verdict computed upstream.
///
/// Treated as an opaque advisory input; nothing in this workspace derives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityVerdict {
    pub eligible: bool,
}
