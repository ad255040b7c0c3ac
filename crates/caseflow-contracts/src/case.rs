//! The aggregated per-patient `Case` and its status vocabulary.
//!
//! A `Case` is assembled from up to four independently fetched
//! sub-resources. Any of them may be absent; absence is modelled with
//! `Option` fields plus the `degraded` set rather than by dropping the case.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    consultation::Consultation,
    error::CaseflowError,
    patient::{EligibilityVerdict, LabResult, PatientId, PatientIdentity, VitalsRecord},
};

/// Review lifecycle state of a case.
///
/// `Approved` and `Denied` are terminal; re-review is not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Pending,
    Approved,
    Denied,
}

impl CaseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CaseStatus::Pending => "pending",
            CaseStatus::Approved => "approved",
            CaseStatus::Denied => "denied",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, CaseStatus::Pending)
    }

    /// Derive the status from a chronological consultation history.
    pub fn from_history(consultations: &[Consultation]) -> Self {
        match consultations.last() {
            Some(latest) if latest.approval => CaseStatus::Approved,
            Some(_) => CaseStatus::Denied,
            None => CaseStatus::Pending,
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Treatment eligibility as displayed to the reviewer.
///
/// `Unknown` means the eligibility sub-fetch failed. It is deliberately
/// distinct from `Ineligible`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Eligibility {
    Eligible,
    Ineligible,
    Unknown,
}

impl Eligibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Eligibility::Eligible => "eligible",
            Eligibility::Ineligible => "ineligible",
            Eligibility::Unknown => "unknown",
        }
    }
}

impl From<Option<EligibilityVerdict>> for Eligibility {
    fn from(verdict: Option<EligibilityVerdict>) -> Self {
        match verdict {
            Some(EligibilityVerdict { eligible: true }) => Eligibility::Eligible,
            Some(EligibilityVerdict { eligible: false }) => Eligibility::Ineligible,
            None => Eligibility::Unknown,
        }
    }
}

impl fmt::Display for Eligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Where a case came from. Only `Live` cases may be written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Assembled from the upstream API during this session.
    Live,
    /// Recovered from the local case cache after an upstream failure.
    Cached,
    /// Taken from the embedded sample dataset.
    Fallback,
}

impl Origin {
    pub fn as_str(self) -> &'static str {
        match self {
            Origin::Live => "live",
            Origin::Cached => "cached",
            Origin::Fallback => "fallback",
        }
    }

    pub fn is_writable(self) -> bool {
        matches!(self, Origin::Live)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// The four independently fetched sub-resources of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Vitals,
    Labs,
    Consultations,
    Eligibility,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Vitals,
        ResourceKind::Labs,
        ResourceKind::Consultations,
        ResourceKind::Eligibility,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Vitals => "vitals",
            ResourceKind::Labs => "labs",
            ResourceKind::Consultations => "consultations",
            ResourceKind::Eligibility => "eligibility",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// The aggregated record a clinician reviews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    /// Equal to `identity.id`; stable across refreshes.
    pub id: PatientId,
    pub identity: PatientIdentity,
    pub vitals: Option<VitalsRecord>,
    pub labs: Option<LabResult>,
    pub eligibility: Eligibility,
    /// Chronological; the last entry is the latest.
    #[serde(default)]
    pub consultations: Vec<Consultation>,
    pub status: CaseStatus,
    pub origin: Origin,
    /// Sub-resources that could not be fetched for this case.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub degraded: BTreeSet<ResourceKind>,
}

impl Case {
    /// A case with every optional field unset and status `Pending`.
    pub fn bare(identity: PatientIdentity, origin: Origin) -> Self {
        Self {
            id: identity.id.clone(),
            identity,
            vitals: None,
            labs: None,
            eligibility: Eligibility::Unknown,
            consultations: Vec::new(),
            status: CaseStatus::Pending,
            origin,
            degraded: BTreeSet::new(),
        }
    }

    pub fn latest_consultation(&self) -> Option<&Consultation> {
        self.consultations.last()
    }

    pub fn is_writable(&self) -> bool {
        self.origin.is_writable()
    }

    /// True when `status` agrees with the latest consultation.
    pub fn status_is_consistent(&self) -> bool {
        self.status == CaseStatus::from_history(&self.consultations)
    }

    /// The informational `AggregationDegraded` signal for this case, if any
    /// sub-resource could not be fetched.
    pub fn degradation(&self) -> Option<CaseflowError> {
        if self.degraded.is_empty() {
            return None;
        }
        let missing = self
            .degraded
            .iter()
            .map(|kind| kind.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Some(CaseflowError::AggregationDegraded {
            case_id: self.id.to_string(),
            missing,
        })
    }
}
