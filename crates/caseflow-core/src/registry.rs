//! The case registry: the single shared snapshot read by the UI layer.
//!
//! The registry holds an immutable `Snapshot` behind an `Arc`. Every write
//! (`replace_all`, `mutate`, optimistic edits) builds a new snapshot and
//! swaps it in under the write lock, so readers never observe a partially
//! replaced batch and writers are serialized against each other.
//!
//! Optimistic decisions stay registered until confirmed or rolled back.
//! A batch published in the meantime gets the in-flight consultation
//! re-applied, so a refresh cannot silently undo a decision awaiting
//! write-back.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use caseflow_contracts::{
    case::{Case, CaseStatus, Origin},
    consultation::Consultation,
    error::{CaseflowError, CaseflowResult},
    patient::PatientId,
};

/// An immutable batch of cases as last published.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    cases: Vec<Case>,
    origin: Option<Origin>,
}

impl Snapshot {
    fn empty() -> Self {
        Self { cases: Vec::new(), origin: None }
    }

    pub fn cases(&self) -> &[Case] {
        &self.cases
    }

    /// Origin of the batch, or `None` before the first refresh.
    pub fn origin(&self) -> Option<Origin> {
        self.origin
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn by_id(&self, id: &PatientId) -> Option<&Case> {
        self.cases.iter().find(|c| &c.id == id)
    }

    pub fn by_status(&self, status: CaseStatus) -> impl Iterator<Item = &Case> {
        self.cases.iter().filter(move |c| c.status == status)
    }
}

/// Handed out by `begin_refresh`; only the newest ticket may publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket(u64);

/// A pending optimistic decision: the case before and after the synthetic
/// consultation was appended.
///
/// Settle it with `CaseRegistry::confirm` or `CaseRegistry::rollback`.
#[derive(Debug, Clone)]
pub struct OptimisticEdit {
    pub before: Case,
    pub after: Case,
    pub entry: Consultation,
    edit_id: u64,
}

struct InFlight {
    edit_id: u64,
    case_id: PatientId,
    entry: Consultation,
}

struct RegistryState {
    snapshot: Arc<Snapshot>,
    selected: Option<PatientId>,
    issued_tickets: u64,
    in_flight: Vec<InFlight>,
    issued_edits: u64,
}

/// Append `entry` as the latest consultation unless it already is.
fn overlay(case: &mut Case, entry: &Consultation) -> bool {
    if case.latest_consultation() == Some(entry) {
        return false;
    }
    case.consultations.push(entry.clone());
    case.status = CaseStatus::from_history(&case.consultations);
    true
}

/// In-memory collection of cases with atomic snapshot replacement.
pub struct CaseRegistry {
    state: RwLock<RegistryState>,
}

impl Default for CaseRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CaseRegistry {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState {
                snapshot: Arc::new(Snapshot::empty()),
                selected: None,
                issued_tickets: 0,
                in_flight: Vec::new(),
                issued_edits: 0,
            }),
        }
    }

    // A poisoned lock only means a writer panicked mid-closure; the snapshot
    // itself is swapped whole and is never left torn.
    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    /// The current snapshot. Cheap; holds no lock after returning.
    pub fn all(&self) -> Arc<Snapshot> {
        Arc::clone(&self.read().snapshot)
    }

    pub fn by_status(&self, status: CaseStatus) -> Vec<Case> {
        self.all().by_status(status).cloned().collect()
    }

    pub fn by_id(&self, id: &PatientId) -> Option<Case> {
        self.all().by_id(id).cloned()
    }

    /// The case currently open for review, if any.
    pub fn selected(&self) -> Option<PatientId> {
        self.read().selected.clone()
    }

    // ── Mutations ───────────────────────────────────────────────────────────

    /// Replace the whole snapshot with `cases`.
    pub fn replace_all(&self, cases: Vec<Case>, origin: Origin) {
        let mut state = self.write();
        Self::publish(&mut state, cases, origin);
    }

    /// Start a refresh. Any ticket issued earlier becomes stale.
    pub fn begin_refresh(&self) -> RefreshTicket {
        let mut state = self.write();
        state.issued_tickets += 1;
        RefreshTicket(state.issued_tickets)
    }

    /// Publish `cases` only if no newer refresh has started since `ticket`
    /// was issued. Returns whether the batch was published.
    pub fn replace_if_current(&self, ticket: RefreshTicket, cases: Vec<Case>, origin: Origin) -> bool {
        let mut state = self.write();
        if ticket.0 != state.issued_tickets {
            debug!(
                ticket = ticket.0,
                newest = state.issued_tickets,
                "discarding result of superseded refresh"
            );
            return false;
        }
        Self::publish(&mut state, cases, origin);
        true
    }

    fn publish(state: &mut RegistryState, mut cases: Vec<Case>, origin: Origin) {
        for pending in &state.in_flight {
            let target = cases
                .iter_mut()
                .find(|c| c.id == pending.case_id && c.is_writable());
            if let Some(case) = target {
                if overlay(case, &pending.entry) {
                    debug!(patient_id = %case.id, "re-applied in-flight decision to refreshed case");
                }
            }
        }

        let selection_survives = state
            .selected
            .as_ref()
            .map_or(true, |selected| cases.iter().any(|c| &c.id == selected));
        if !selection_survives {
            state.selected = None;
        }
        state.snapshot = Arc::new(Snapshot { cases, origin: Some(origin) });
    }

    /// Apply `f` to the case with `id` and publish the result.
    ///
    /// If `f` returns `Err`, nothing is published.
    pub fn mutate<R>(
        &self,
        id: &PatientId,
        f: impl FnOnce(&mut Case) -> CaseflowResult<R>,
    ) -> CaseflowResult<R> {
        let mut state = self.write();
        let mut cases = state.snapshot.cases.clone();
        let case = cases
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| CaseflowError::CaseNotFound { case_id: id.to_string() })?;

        let result = f(case)?;

        let origin = state.snapshot.origin;
        state.snapshot = Arc::new(Snapshot { cases, origin });
        Ok(result)
    }

    /// Append `entry` to the case with `id` as an unconfirmed decision.
    ///
    /// `guard` sees the case first; if it returns `Err`, nothing changes.
    /// Until the edit is confirmed or rolled back, every published batch
    /// gets `entry` re-applied to the case.
    pub fn apply_optimistic(
        &self,
        id: &PatientId,
        entry: Consultation,
        guard: impl FnOnce(&Case) -> CaseflowResult<()>,
    ) -> CaseflowResult<OptimisticEdit> {
        let mut state = self.write();
        let mut cases = state.snapshot.cases.clone();
        let case = cases
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| CaseflowError::CaseNotFound { case_id: id.to_string() })?;
        guard(case)?;

        let before = case.clone();
        case.consultations.push(entry.clone());
        case.status = CaseStatus::from_history(&case.consultations);
        let after = case.clone();

        state.issued_edits += 1;
        let edit_id = state.issued_edits;
        state.in_flight.push(InFlight { edit_id, case_id: id.clone(), entry: entry.clone() });
        let origin = state.snapshot.origin;
        state.snapshot = Arc::new(Snapshot { cases, origin });

        Ok(OptimisticEdit { before, after, entry, edit_id })
    }

    fn take_in_flight(state: &mut RegistryState, edit: &OptimisticEdit) -> bool {
        let held = state.in_flight.len();
        state.in_flight.retain(|pending| pending.edit_id != edit.edit_id);
        state.in_flight.len() != held
    }

    /// Settle an optimistic edit as accepted upstream.
    ///
    /// Returns the case as now published, or `None` if it is no longer in
    /// the registry (e.g. after a reset).
    pub fn confirm(&self, edit: &OptimisticEdit) -> Option<Case> {
        let mut state = self.write();
        if !Self::take_in_flight(&mut state, edit) {
            return None;
        }
        let mut cases = state.snapshot.cases.clone();
        let case = cases.iter_mut().find(|c| c.id == edit.after.id)?;
        if overlay(case, &edit.entry) {
            let confirmed = case.clone();
            let origin = state.snapshot.origin;
            state.snapshot = Arc::new(Snapshot { cases, origin });
            return Some(confirmed);
        }
        Some(case.clone())
    }

    /// Undo an optimistic edit.
    ///
    /// If the case is untouched since the edit, the pre-edit case is
    /// restored exactly. If a refresh replaced it meanwhile, only the
    /// synthetic consultation is dropped and the status re-derived. Returns
    /// whether anything was restored.
    pub fn rollback(&self, edit: &OptimisticEdit) -> bool {
        let mut state = self.write();
        if !Self::take_in_flight(&mut state, edit) {
            return false;
        }
        let mut cases = state.snapshot.cases.clone();
        let Some(case) = cases.iter_mut().find(|c| c.id == edit.after.id) else {
            return false;
        };
        if *case == edit.after {
            *case = edit.before.clone();
        } else if case.latest_consultation() == Some(&edit.entry) {
            case.consultations.pop();
            case.status = CaseStatus::from_history(&case.consultations);
        } else {
            return false;
        }
        let origin = state.snapshot.origin;
        state.snapshot = Arc::new(Snapshot { cases, origin });
        true
    }

    /// Mark `id` as the case open for review.
    pub fn select(&self, id: &PatientId) -> CaseflowResult<()> {
        let mut state = self.write();
        if state.snapshot.by_id(id).is_none() {
            return Err(CaseflowError::CaseNotFound { case_id: id.to_string() });
        }
        state.selected = Some(id.clone());
        Ok(())
    }

    /// Clear the selection if it currently points at `id`.
    pub fn clear_selection_of(&self, id: &PatientId) {
        let mut state = self.write();
        if state.selected.as_ref() == Some(id) {
            state.selected = None;
        }
    }

    /// Drop every case and the selection, e.g. when the reviewer logs out.
    ///
    /// Refreshes already in flight become stale and will not republish,
    /// and in-flight decisions are no longer re-applied.
    pub fn reset(&self) {
        let mut state = self.write();
        state.snapshot = Arc::new(Snapshot::empty());
        state.selected = None;
        state.issued_tickets += 1;
        state.in_flight.clear();
        info!("case registry reset");
    }
}

#[cfg(test)]
mod tests {
    use caseflow_contracts::patient::{Gender, PatientIdentity};

    use super::*;

    fn case(id: &str, status: CaseStatus) -> Case {
        let mut case = Case::bare(
            PatientIdentity {
                id: PatientId::new(id),
                name: id.to_uppercase(),
                age: 50,
                gender: Gender::Male,
            },
            Origin::Live,
        );
        case.status = status;
        case
    }

    fn pid(id: &str) -> PatientId {
        PatientId::new(id)
    }

    #[test]
    fn starts_empty_without_origin() {
        let registry = CaseRegistry::new();
        assert!(registry.all().is_empty());
        assert_eq!(registry.all().origin(), None);
        assert!(registry.selected().is_none());
    }

    #[test]
    fn queries_project_current_snapshot() {
        let registry = CaseRegistry::new();
        registry.replace_all(
            vec![
                case("a", CaseStatus::Pending),
                case("b", CaseStatus::Approved),
                case("c", CaseStatus::Pending),
            ],
            Origin::Live,
        );

        let pending: Vec<String> = registry
            .by_status(CaseStatus::Pending)
            .into_iter()
            .map(|c| c.id.0)
            .collect();
        assert_eq!(pending, ["a", "c"]);
        assert_eq!(registry.by_id(&pid("b")).unwrap().status, CaseStatus::Approved);
        assert!(registry.by_id(&pid("zz")).is_none());
        assert_eq!(registry.all().origin(), Some(Origin::Live));
    }

    #[test]
    fn held_snapshot_is_unaffected_by_replacement() {
        let registry = CaseRegistry::new();
        registry.replace_all(vec![case("a", CaseStatus::Pending)], Origin::Live);
        let before = registry.all();

        registry.replace_all(vec![case("x", CaseStatus::Pending), case("y", CaseStatus::Pending)], Origin::Live);

        assert_eq!(before.len(), 1);
        assert_eq!(before.cases()[0].id, pid("a"));
        assert_eq!(registry.all().len(), 2);
    }

    #[test]
    fn stale_refresh_ticket_is_discarded() {
        let registry = CaseRegistry::new();
        let first = registry.begin_refresh();
        let second = registry.begin_refresh();

        assert!(registry.replace_if_current(second, vec![case("new", CaseStatus::Pending)], Origin::Live));
        assert!(!registry.replace_if_current(first, vec![case("old", CaseStatus::Pending)], Origin::Live));

        assert!(registry.by_id(&pid("new")).is_some());
        assert!(registry.by_id(&pid("old")).is_none());
    }

    #[test]
    fn mutate_error_publishes_nothing() {
        let registry = CaseRegistry::new();
        registry.replace_all(vec![case("a", CaseStatus::Pending)], Origin::Live);
        let before = registry.all();

        let result: CaseflowResult<()> = registry.mutate(&pid("a"), |c| {
            c.status = CaseStatus::Denied;
            Err(CaseflowError::Validation { reason: "nope".to_string() })
        });

        assert!(result.is_err());
        assert!(Arc::ptr_eq(&before, &registry.all()));
    }

    #[test]
    fn mutate_unknown_case_is_not_found() {
        let registry = CaseRegistry::new();
        let result = registry.mutate(&pid("ghost"), |_| Ok(()));
        assert!(matches!(result, Err(CaseflowError::CaseNotFound { .. })));
    }

    fn decision(approval: bool) -> Consultation {
        Consultation {
            notes: "dx".to_string(),
            diagnosis: "dx".to_string(),
            treatment_plan: "plan".to_string(),
            approval,
        }
    }

    fn approve(registry: &CaseRegistry, id: &str) -> OptimisticEdit {
        registry.apply_optimistic(&pid(id), decision(true), |_| Ok(())).unwrap()
    }

    #[test]
    fn rollback_restores_pre_edit_case() {
        let registry = CaseRegistry::new();
        registry.replace_all(vec![case("a", CaseStatus::Pending)], Origin::Live);
        let original = registry.by_id(&pid("a")).unwrap();

        let edit = approve(&registry, "a");
        assert_eq!(registry.by_id(&pid("a")).unwrap().status, CaseStatus::Approved);

        assert!(registry.rollback(&edit));
        assert_eq!(registry.by_id(&pid("a")).unwrap(), original);
        assert!(!registry.rollback(&edit), "an edit settles once");
    }

    #[test]
    fn guard_error_leaves_case_untouched() {
        let registry = CaseRegistry::new();
        registry.replace_all(vec![case("a", CaseStatus::Pending)], Origin::Live);
        let before = registry.all();

        let result = registry.apply_optimistic(&pid("a"), decision(true), |_| {
            Err(CaseflowError::Validation { reason: "nope".to_string() })
        });

        assert!(result.is_err());
        assert!(Arc::ptr_eq(&before, &registry.all()));
    }

    #[test]
    fn refresh_during_edit_keeps_decision() {
        let registry = CaseRegistry::new();
        registry.replace_all(vec![case("a", CaseStatus::Pending)], Origin::Live);
        let edit = approve(&registry, "a");

        // The upstream has not seen the write yet.
        registry.replace_all(vec![case("a", CaseStatus::Pending)], Origin::Live);
        let refreshed = registry.by_id(&pid("a")).unwrap();
        assert_eq!(refreshed.status, CaseStatus::Approved);
        assert_eq!(refreshed.consultations, vec![decision(true)]);

        let confirmed = registry.confirm(&edit).unwrap();
        assert_eq!(confirmed.status, CaseStatus::Approved);

        registry.replace_all(vec![case("a", CaseStatus::Pending)], Origin::Live);
        assert_eq!(
            registry.by_id(&pid("a")).unwrap().status,
            CaseStatus::Pending,
            "confirmed edits are no longer re-applied"
        );
    }

    #[test]
    fn refresh_carrying_the_write_is_not_duplicated() {
        let registry = CaseRegistry::new();
        registry.replace_all(vec![case("a", CaseStatus::Pending)], Origin::Live);
        let edit = approve(&registry, "a");

        let mut stored = case("a", CaseStatus::Approved);
        stored.consultations.push(decision(true));
        registry.replace_all(vec![stored], Origin::Live);
        registry.confirm(&edit);

        assert_eq!(registry.by_id(&pid("a")).unwrap().consultations.len(), 1);
    }

    #[test]
    fn rollback_after_refresh_drops_only_synthetic_entry() {
        let registry = CaseRegistry::new();
        registry.replace_all(vec![case("a", CaseStatus::Pending)], Origin::Live);
        let edit = approve(&registry, "a");

        let mut earlier = case("a", CaseStatus::Denied);
        earlier.identity.name = "Renamed".to_string();
        earlier.consultations.push(decision(false));
        registry.replace_all(vec![earlier], Origin::Live);
        assert_eq!(registry.by_id(&pid("a")).unwrap().status, CaseStatus::Approved);

        assert!(registry.rollback(&edit));
        let restored = registry.by_id(&pid("a")).unwrap();
        assert_eq!(restored.identity.name, "Renamed");
        assert_eq!(restored.consultations, vec![decision(false)]);
        assert_eq!(restored.status, CaseStatus::Denied);
    }

    #[test]
    fn in_flight_decision_not_applied_to_fallback_batch() {
        let registry = CaseRegistry::new();
        registry.replace_all(vec![case("a", CaseStatus::Pending)], Origin::Live);
        let _edit = approve(&registry, "a");

        let mut sample = case("a", CaseStatus::Pending);
        sample.origin = Origin::Fallback;
        registry.replace_all(vec![sample], Origin::Fallback);

        assert!(registry.by_id(&pid("a")).unwrap().consultations.is_empty());
    }

    #[test]
    fn select_requires_known_case() {
        let registry = CaseRegistry::new();
        registry.replace_all(vec![case("a", CaseStatus::Pending)], Origin::Live);

        assert!(matches!(registry.select(&pid("b")), Err(CaseflowError::CaseNotFound { .. })));
        registry.select(&pid("a")).unwrap();
        assert_eq!(registry.selected(), Some(pid("a")));

        registry.clear_selection_of(&pid("other"));
        assert_eq!(registry.selected(), Some(pid("a")));
        registry.clear_selection_of(&pid("a"));
        assert!(registry.selected().is_none());
    }

    #[test]
    fn replacement_drops_selection_of_vanished_case() {
        let registry = CaseRegistry::new();
        registry.replace_all(vec![case("a", CaseStatus::Pending)], Origin::Live);
        registry.select(&pid("a")).unwrap();

        registry.replace_all(vec![case("a", CaseStatus::Pending)], Origin::Live);
        assert_eq!(registry.selected(), Some(pid("a")));

        registry.replace_all(vec![case("b", CaseStatus::Pending)], Origin::Live);
        assert!(registry.selected().is_none());
    }

    #[test]
    fn reset_clears_everything() {
        let registry = CaseRegistry::new();
        registry.replace_all(vec![case("a", CaseStatus::Pending)], Origin::Fallback);
        registry.select(&pid("a")).unwrap();

        registry.reset();
        assert!(registry.all().is_empty());
        assert!(registry.selected().is_none());
    }

    #[test]
    fn reset_invalidates_refresh_in_flight() {
        let registry = CaseRegistry::new();
        let ticket = registry.begin_refresh();

        registry.reset();

        assert!(!registry.replace_if_current(ticket, vec![case("a", CaseStatus::Pending)], Origin::Live));
        assert!(registry.all().is_empty());
    }

    #[test]
    fn reset_forgets_in_flight_decisions() {
        let registry = CaseRegistry::new();
        registry.replace_all(vec![case("a", CaseStatus::Pending)], Origin::Live);
        let edit = approve(&registry, "a");

        registry.reset();
        registry.replace_all(vec![case("a", CaseStatus::Pending)], Origin::Live);

        assert_eq!(registry.by_id(&pid("a")).unwrap().status, CaseStatus::Pending);
        assert!(registry.confirm(&edit).is_none());
    }
}
