//! The case assembler: fan-out/fan-in aggregation of per-patient cases.
//!
//! ```text
//!   list identities ──fail/empty──► fallback store
//!        │
//!        ▼  (at most max_in_flight patients at a time, listing order kept)
//!   per patient: join!(vitals, labs, consultations, eligibility)
//!        │        each sub-fetch isolated; failure → absent + degraded
//!        ▼
//!   merge → Case ──all skipped──► fallback store
//! ```
//!
//! Failure isolation is per (patient, resource kind). A failed sub-fetch
//! never aborts its siblings, its patient's merge, or other patients.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use caseflow_contracts::{
    case::{Case, CaseStatus, Eligibility, Origin, ResourceKind},
    error::{CaseflowError, CaseflowResult},
    patient::{PatientId, PatientIdentity},
};

use crate::{config::AggregationConfig, fallback::FallbackStore, traits::ResourceClient};

/// Why a refresh returned the fallback dataset instead of live cases.
///
/// Reported once per refresh as an advisory, never as an error.
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    /// The identity list could not be fetched at all.
    IdentityListUnavailable(CaseflowError),
    /// The identity list was fetched but empty.
    NoIdentities,
    /// Identities were listed but none produced a usable case.
    NothingAssembled,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::IdentityListUnavailable(e) => write!(f, "patient list unavailable: {}", e),
            FallbackReason::NoIdentities => f.write_str("upstream returned no patients"),
            FallbackReason::NothingAssembled => f.write_str("no listed patient produced a usable case"),
        }
    }
}

/// The result of one refresh cycle.
#[derive(Debug, Clone)]
pub struct AssembledBatch {
    pub cases: Vec<Case>,
    pub origin: Origin,
    pub fallback_reason: Option<FallbackReason>,
}

impl AssembledBatch {
    /// `AggregationDegraded` signals for every case with missing fields.
    pub fn degraded(&self) -> Vec<CaseflowError> {
        self.cases.iter().filter_map(Case::degradation).collect()
    }
}

/// Assembles `Case` records from the four per-patient sub-resources.
pub struct CaseAssembler {
    client: Arc<dyn ResourceClient>,
    fallback: FallbackStore,
    settings: AggregationConfig,
}

impl CaseAssembler {
    pub fn new(client: Arc<dyn ResourceClient>, fallback: FallbackStore, settings: AggregationConfig) -> Self {
        Self { client, fallback, settings }
    }

    pub fn fallback(&self) -> &FallbackStore {
        &self.fallback
    }

    /// Run one refresh cycle.
    ///
    /// Never fails: a total upstream failure yields the fallback dataset with
    /// `fallback_reason` set. Live cases are returned in listing order.
    pub async fn refresh(&self) -> AssembledBatch {
        let identities = match self.client.list_patient_identities().await {
            Ok(identities) if identities.is_empty() => {
                return self.fall_back(FallbackReason::NoIdentities);
            }
            Ok(identities) => identities,
            Err(e) => return self.fall_back(FallbackReason::IdentityListUnavailable(e)),
        };

        let listed = identities.len();
        let limit = match self.settings.max_in_flight {
            0 => listed,
            n => n,
        };

        let cases: Vec<Case> = stream::iter(identities)
            .map(|identity| self.assemble_case(identity))
            .buffered(limit)
            .filter_map(|case| async move { case })
            .collect()
            .await;

        if cases.is_empty() {
            return self.fall_back(FallbackReason::NothingAssembled);
        }

        let degraded = cases.iter().filter(|c| !c.degraded.is_empty()).count();
        info!(
            listed,
            case_count = cases.len(),
            degraded,
            "refresh assembled live cases"
        );

        self.fallback.remember(&cases);

        AssembledBatch {
            cases,
            origin: Origin::Live,
            fallback_reason: None,
        }
    }

    fn fall_back(&self, reason: FallbackReason) -> AssembledBatch {
        let (cases, origin) = self.fallback.recover();
        warn!(
            reason = %reason,
            origin = %origin,
            case_count = cases.len(),
            "refresh fell back to offline cases"
        );
        AssembledBatch {
            cases,
            origin,
            fallback_reason: Some(reason),
        }
    }

    /// Fetch and merge the four sub-resources of one patient.
    ///
    /// Returns `None` only for an identity that cannot key a case.
    async fn assemble_case(&self, identity: PatientIdentity) -> Option<Case> {
        if identity.id.is_blank() {
            warn!(name = %identity.name, "skipping patient identity with blank id");
            return None;
        }

        let id = identity.id.clone();
        let client = &self.client;

        let (vitals, labs, consultations, eligibility) = futures::join!(
            self.fetch(ResourceKind::Vitals, &id, || client.get_vitals(&id)),
            self.fetch(ResourceKind::Labs, &id, || client.get_labs(&id)),
            self.fetch(ResourceKind::Consultations, &id, || client.get_consultations(&id)),
            self.fetch(ResourceKind::Eligibility, &id, || client.get_eligibility(&id)),
        );

        let mut degraded = BTreeSet::new();
        let mut settle = |kind: ResourceKind, ok: bool| {
            if !ok {
                degraded.insert(kind);
            }
        };
        settle(ResourceKind::Vitals, vitals.is_some());
        settle(ResourceKind::Labs, labs.is_some());
        settle(ResourceKind::Consultations, consultations.is_some());
        settle(ResourceKind::Eligibility, eligibility.is_some());

        let consultations = consultations.unwrap_or_default();
        let mut case = Case::bare(identity, Origin::Live);
        case.vitals = vitals;
        case.labs = labs;
        case.eligibility = Eligibility::from(eligibility);
        case.status = CaseStatus::from_history(&consultations);
        case.consultations = consultations;
        case.degraded = degraded;

        debug!(
            patient_id = %case.id,
            status = %case.status,
            eligibility = %case.eligibility,
            degraded = case.degraded.len(),
            "case assembled"
        );
        Some(case)
    }

    /// Run one sub-fetch with the configured number of attempts.
    ///
    /// Returns `None` once every attempt has failed.
    async fn fetch<T, F, Fut>(&self, kind: ResourceKind, id: &PatientId, mut op: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CaseflowResult<T>>,
    {
        let attempts = self.settings.sub_fetch_attempts.max(1);
        for attempt in 1..=attempts {
            match op().await {
                Ok(value) => return Some(value),
                Err(e) if attempt < attempts => {
                    debug!(patient_id = %id, resource = %kind, attempt, error = %e, "sub-fetch failed, retrying");
                }
                Err(e) => {
                    warn!(patient_id = %id, resource = %kind, attempt, error = %e, "sub-fetch failed, field left absent");
                }
            }
        }
        None
    }
}
