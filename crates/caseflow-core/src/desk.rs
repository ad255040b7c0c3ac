//! `ReviewDesk`: the public surface the presentation layer talks to.
//!
//! Wires one `CaseAssembler`, the shared `CaseRegistry` and a
//! `ReviewWorkflow` together. Presentation code reads snapshots through
//! `registry()` and never touches the resource client directly.

use std::sync::Arc;

use tracing::info;

use caseflow_contracts::{
    case::{Case, Origin},
    consultation::ReviewOutcome,
    error::{CaseflowError, CaseflowResult},
    patient::PatientId,
};

use crate::{
    assembler::{CaseAssembler, FallbackReason},
    config::CaseflowConfig,
    fallback::{CaseCache, FallbackStore},
    registry::CaseRegistry,
    review::ReviewWorkflow,
    traits::{DecisionAudit, ResourceClient},
};

/// Summary of one `ReviewDesk::refresh` call.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub origin: Origin,
    pub case_count: usize,
    /// Set when the batch came from the fallback store.
    pub fallback_reason: Option<FallbackReason>,
    /// One `AggregationDegraded` per case with missing sub-resources.
    pub degraded: Vec<CaseflowError>,
    /// False if a newer refresh or a reset happened first and this batch
    /// was discarded.
    pub applied: bool,
}

/// The entry point for refreshing, browsing, and deciding cases.
pub struct ReviewDesk {
    assembler: CaseAssembler,
    registry: Arc<CaseRegistry>,
    workflow: ReviewWorkflow,
}

impl ReviewDesk {
    /// Build a desk from configuration. A configured cache path enables the
    /// local case cache.
    pub fn new(
        client: Arc<dyn ResourceClient>,
        audit: Arc<dyn DecisionAudit>,
        config: &CaseflowConfig,
    ) -> Self {
        let fallback = match &config.cache.path {
            Some(path) => FallbackStore::with_cache(CaseCache::new(path)),
            None => FallbackStore::new(),
        };
        let registry = Arc::new(CaseRegistry::new());
        let assembler = CaseAssembler::new(client.clone(), fallback, config.aggregation.clone());
        let workflow = ReviewWorkflow::new(client, registry.clone(), audit);
        Self::from_parts(assembler, registry, workflow)
    }

    /// Assemble a desk from pre-built parts. `workflow` must have been built
    /// over the same `registry`.
    pub fn from_parts(assembler: CaseAssembler, registry: Arc<CaseRegistry>, workflow: ReviewWorkflow) -> Self {
        Self { assembler, registry, workflow }
    }

    pub fn registry(&self) -> &CaseRegistry {
        &self.registry
    }

    /// Re-assemble every case and publish the batch.
    ///
    /// Never fails. If another refresh on the same registry started after
    /// this one, or the registry was reset meanwhile, this batch is dropped
    /// and `applied` is false. Decisions still awaiting write-back stay
    /// applied to the refreshed cases.
    pub async fn refresh(&self) -> RefreshOutcome {
        let ticket = self.registry.begin_refresh();
        let batch = self.assembler.refresh().await;

        let degraded = batch.degraded();
        let origin = batch.origin;
        let case_count = batch.cases.len();
        let fallback_reason = batch.fallback_reason.clone();
        let applied = self.registry.replace_if_current(ticket, batch.cases, origin);

        if applied {
            info!(origin = %origin, case_count, degraded = degraded.len(), "case registry refreshed");
        }

        RefreshOutcome { origin, case_count, fallback_reason, degraded, applied }
    }

    /// Open `case_id` for review.
    pub fn select(&self, case_id: &PatientId) -> CaseflowResult<()> {
        self.registry.select(case_id)
    }

    /// Record a review decision. See `ReviewWorkflow::decide`.
    pub async fn decide(
        &self,
        case_id: &PatientId,
        outcome: ReviewOutcome,
        diagnosis: &str,
        treatment_plan: &[String],
    ) -> CaseflowResult<Case> {
        self.workflow.decide(case_id, outcome, diagnosis, treatment_plan).await
    }

    /// Drop all cases and the selection.
    pub fn reset(&self) {
        self.registry.reset();
    }
}
