//! Per-mutation lifecycle.
//!
//! Each create/complete/remove call moves through
//! `Idle -> OptimisticApplied -> (Succeeded | Failed) -> Reconciling -> Idle`.
//! Transitions are checked: feeding an event the current phase does not
//! accept is a `StoreError::InvalidTransition`.

use crate::cache::Patch;
use crate::error::StoreError;
use crate::store::RequestId;
use crate::types::{Todo, TodoId};

/// Which remote write a mutation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Create,
    Complete,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationPhase {
    Idle,
    OptimisticApplied,
    Succeeded,
    Failed,
    Reconciling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationEvent {
    /// Local patch published, remote call issued.
    Apply,
    /// Remote call succeeded.
    Resolve,
    /// Remote call failed.
    Reject,
    /// Authoritative re-fetch issued.
    Reconcile,
    /// Re-fetch result (or failure) arrived.
    Settle,
}

impl MutationPhase {
    pub fn next(self, event: MutationEvent) -> Result<MutationPhase, StoreError> {
        use MutationEvent::*;
        use MutationPhase::*;

        match (self, event) {
            (Idle, Apply) => Ok(OptimisticApplied),
            (OptimisticApplied, Resolve) => Ok(Succeeded),
            (OptimisticApplied, Reject) => Ok(Failed),
            (Succeeded | Failed, Reconcile) => Ok(Reconciling),
            (Reconciling, Settle) => Ok(Idle),
            (from, event) => Err(StoreError::InvalidTransition { from, event }),
        }
    }
}

/// One in-flight mutation as tracked by the store.
#[derive(Debug, Clone)]
pub struct Mutation {
    kind: MutationKind,
    phase: MutationPhase,
    patch: Patch,
    snapshot: Option<Vec<Todo>>,
    failed: bool,
    awaiting: Option<RequestId>,
    created: Option<Todo>,
}

impl Mutation {
    /// Start a mutation whose `patch` was just published over `snapshot`.
    pub fn begin(kind: MutationKind, patch: Patch, snapshot: Option<Vec<Todo>>) -> Result<Self, StoreError> {
        Ok(Self {
            kind,
            phase: MutationPhase::Idle.next(MutationEvent::Apply)?,
            patch,
            snapshot,
            failed: false,
            awaiting: None,
            created: None,
        })
    }

    pub fn kind(&self) -> MutationKind {
        self.kind
    }

    pub fn phase(&self) -> MutationPhase {
        self.phase
    }

    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    /// Cache value captured immediately before the patch was applied.
    pub fn snapshot(&self) -> Option<&[Todo]> {
        self.snapshot.as_deref()
    }

    /// Fetch ticket whose result will settle this mutation.
    pub fn awaiting(&self) -> Option<RequestId> {
        self.awaiting
    }

    /// Whether the optimistic patch still belongs in the visible cache.
    pub fn holds_patch(&self) -> bool {
        !self.failed && self.phase != MutationPhase::Idle
    }

    pub fn is_busy(&self) -> bool {
        self.phase != MutationPhase::Idle
    }

    pub fn resolve(&mut self) -> Result<(), StoreError> {
        self.phase = self.phase.next(MutationEvent::Resolve)?;
        Ok(())
    }

    /// Keep the item the server returned for a create.
    pub fn record_created(&mut self, todo: Todo) {
        self.created = Some(todo);
    }

    /// Item the server created, once the create call has resolved.
    pub fn created(&self) -> Option<&Todo> {
        self.created.as_ref()
    }

    /// Server id of the item this create produced, when `base` already lists
    /// it. Before the call resolves, the first unclaimed item with the same
    /// title that was absent from the snapshot is taken to be it.
    pub fn landed_in(&self, base: Option<&[Todo]>, claimed: &[TodoId]) -> Option<TodoId> {
        let Patch::Append(provisional) = &self.patch else {
            return None;
        };
        let known = |id: TodoId| self.snapshot.iter().flatten().any(|todo| todo.id == id);
        base?
            .iter()
            .filter(|todo| !claimed.contains(&todo.id))
            .find(|todo| match &self.created {
                Some(created) => todo.id == created.id,
                None => todo.title == provisional.title && !known(todo.id),
            })
            .map(|todo| todo.id)
    }

    /// Patch describing what the server acknowledged: the created item with
    /// its real id for creates, the optimistic patch otherwise.
    pub fn acknowledged_patch(&self) -> Patch {
        match &self.created {
            Some(created) => Patch::Append(created.clone()),
            None => self.patch.clone(),
        }
    }

    pub fn reject(&mut self) -> Result<(), StoreError> {
        self.phase = self.phase.next(MutationEvent::Reject)?;
        self.failed = true;
        Ok(())
    }

    pub fn reconcile(&mut self, fetch: RequestId) -> Result<(), StoreError> {
        self.phase = self.phase.next(MutationEvent::Reconcile)?;
        self.awaiting = Some(fetch);
        Ok(())
    }

    /// Settle if `fetch` is the awaited fetch or a later one.
    pub fn settle_by(&mut self, fetch: RequestId) -> Result<bool, StoreError> {
        match self.awaiting {
            Some(awaited) if self.phase == MutationPhase::Reconciling && awaited <= fetch => {
                self.phase = self.phase.next(MutationEvent::Settle)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn succeeded(&self) -> bool {
        !self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mutation() -> Mutation {
        Mutation::begin(MutationKind::Remove, Patch::Remove(1), None).unwrap()
    }

    #[test]
    fn success_path_walks_every_phase() {
        let mut m = mutation();
        assert_eq!(m.phase(), MutationPhase::OptimisticApplied);
        m.resolve().unwrap();
        assert_eq!(m.phase(), MutationPhase::Succeeded);
        m.reconcile(RequestId(4)).unwrap();
        assert_eq!(m.phase(), MutationPhase::Reconciling);
        assert!(m.holds_patch());
        assert!(m.settle_by(RequestId(4)).unwrap());
        assert_eq!(m.phase(), MutationPhase::Idle);
        assert!(!m.is_busy());
    }

    #[test]
    fn failed_mutation_drops_its_patch() {
        let mut m = mutation();
        m.reject().unwrap();
        assert_eq!(m.phase(), MutationPhase::Failed);
        assert!(!m.holds_patch());
        assert!(m.is_busy());
    }

    #[test]
    fn earlier_fetch_does_not_settle() {
        let mut m = mutation();
        m.resolve().unwrap();
        m.reconcile(RequestId(9)).unwrap();
        assert!(!m.settle_by(RequestId(8)).unwrap());
        assert!(m.settle_by(RequestId(12)).unwrap());
    }

    #[test]
    fn resolving_twice_is_rejected() {
        let mut m = mutation();
        m.resolve().unwrap();
        let err = m.resolve().unwrap_err();
        assert_eq!(
            err,
            StoreError::InvalidTransition {
                from: MutationPhase::Succeeded,
                event: MutationEvent::Resolve,
            }
        );
    }

    #[test]
    fn create_is_found_in_base_by_server_id() {
        let mut m = Mutation::begin(MutationKind::Create, Patch::Append(Todo::provisional("B", false)), Some(Vec::new()))
            .unwrap();
        let mut created = Todo::provisional("B", false);
        created.id = 7;
        let other = Todo { id: 8, ..created.clone() };

        // Before the call resolves any new same-titled item counts.
        assert_eq!(m.landed_in(Some(&[other.clone()][..]), &[]), Some(8));
        assert_eq!(m.landed_in(Some(&[other.clone()][..]), &[8]), None);

        m.resolve().unwrap();
        m.record_created(created.clone());
        assert_eq!(m.landed_in(Some(&[other.clone()][..]), &[]), None);
        assert_eq!(m.landed_in(Some(&[other, created.clone()][..]), &[]), Some(7));
        assert_eq!(m.acknowledged_patch(), Patch::Append(created));
    }

    #[test]
    fn reconcile_before_outcome_is_rejected() {
        assert!(MutationPhase::OptimisticApplied
            .next(MutationEvent::Reconcile)
            .is_err());
        assert!(MutationPhase::Idle.next(MutationEvent::Settle).is_err());
    }
}
