//! Client-side todo cache with optimistic writes.
//!
//! # Design
//! `TodoStore` never performs I/O. Every operation that needs the network
//! hands back a `Dispatch` (a ticket plus an `HttpRequest`); the host executes
//! it and reports the outcome through `on_response` / `on_failure`. A settled
//! mutation answers with the reconciling fetch the host must run next.
//!
//! Under `RollbackPolicy::Rebase` the visible cache is always the last
//! confirmed collection with every live optimistic patch folded on in start
//! order, so a failing mutation only takes its own patch with it.
//! `RollbackPolicy::Snapshot` restores the failing mutation's captured
//! snapshot instead, and a fetch overwrites the cache verbatim.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::cache::{self, Patch};
use crate::client::TodoClient;
use crate::error::{ApiError, StoreError};
use crate::http::{HttpRequest, HttpResponse};
use crate::mutation::{Mutation, MutationKind};
use crate::types::{CompleteTodoRequest, CreateTodoRequest, Todo, TodoId};

/// Ticket identifying one request handed to the host. Tickets increase
/// monotonically, so comparing two fetch tickets orders them in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A request the host must execute, tagged with the ticket to report back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub ticket: RequestId,
    pub request: HttpRequest,
}

/// How a failed mutation is undone when other mutations are in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackPolicy {
    /// Drop only the failing patch and replay the others.
    #[default]
    Rebase,
    /// Restore the cache captured before the failing patch.
    Snapshot,
}

#[derive(Debug, Clone, Copy)]
struct Fetch {
    cancelled: bool,
}

/// Everything the view may read, captured at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodosState {
    pub todos: Option<Vec<Todo>>,
    pub is_loading_todos: bool,
    pub is_updating_todo: bool,
    pub is_creating_todo: bool,
    pub is_removing_todo: bool,
    pub fetch_error: Option<ApiError>,
}

impl TodosState {
    pub fn items_left(&self) -> usize {
        self.todos.as_deref().map_or(0, cache::items_left)
    }

    pub fn completed_items(&self) -> usize {
        self.todos.as_deref().map_or(0, cache::completed_items)
    }
}

#[derive(Debug)]
pub struct TodoStore {
    client: TodoClient,
    policy: RollbackPolicy,
    confirmed: Option<Vec<Todo>>,
    todos: Option<Vec<Todo>>,
    fetch_error: Option<ApiError>,
    fetches: BTreeMap<RequestId, Fetch>,
    mutations: BTreeMap<RequestId, Mutation>,
    next_ticket: u64,
}

impl TodoStore {
    pub fn new(client: TodoClient, policy: RollbackPolicy) -> Self {
        Self {
            client,
            policy,
            confirmed: None,
            todos: None,
            fetch_error: None,
            fetches: BTreeMap::new(),
            mutations: BTreeMap::new(),
            next_ticket: 1,
        }
    }

    pub fn policy(&self) -> RollbackPolicy {
        self.policy
    }

    /// Current cache; `None` until the first fetch lands or a create runs.
    pub fn todos(&self) -> Option<&[Todo]> {
        self.todos.as_deref()
    }

    /// True while no collection is available yet but one is on its way.
    pub fn is_loading_todos(&self) -> bool {
        self.todos.is_none()
            && (self.fetches.values().any(|fetch| !fetch.cancelled) || !self.mutations.is_empty())
    }

    pub fn is_busy(&self, kind: MutationKind) -> bool {
        self.mutations
            .values()
            .any(|mutation| mutation.kind() == kind && mutation.is_busy())
    }

    pub fn is_updating_todo(&self) -> bool {
        self.is_busy(MutationKind::Complete)
    }

    pub fn is_creating_todo(&self) -> bool {
        self.is_busy(MutationKind::Create)
    }

    pub fn is_removing_todo(&self) -> bool {
        self.is_busy(MutationKind::Remove)
    }

    pub fn fetch_error(&self) -> Option<&ApiError> {
        self.fetch_error.as_ref()
    }

    /// Nothing in flight: no fetch and no unsettled mutation.
    pub fn is_idle(&self) -> bool {
        self.fetches.is_empty() && self.mutations.is_empty()
    }

    pub fn mutation(&self, ticket: RequestId) -> Option<&Mutation> {
        self.mutations.get(&ticket)
    }

    pub fn state(&self) -> TodosState {
        TodosState {
            todos: self.todos.clone(),
            is_loading_todos: self.is_loading_todos(),
            is_updating_todo: self.is_updating_todo(),
            is_creating_todo: self.is_creating_todo(),
            is_removing_todo: self.is_removing_todo(),
            fetch_error: self.fetch_error.clone(),
        }
    }

    /// Issue the initial load of the collection.
    pub fn mount(&mut self) -> Dispatch {
        info!(base_url = self.client.base_url(), "loading todos");
        self.issue_fetch()
    }

    /// Mark every in-flight fetch as cancelled; their responses will be
    /// discarded on arrival. Returns how many were cancelled.
    pub fn cancel_refresh(&mut self) -> usize {
        let mut cancelled = 0;
        for (ticket, fetch) in self.fetches.iter_mut().filter(|(_, fetch)| !fetch.cancelled) {
            fetch.cancelled = true;
            cancelled += 1;
            debug!(%ticket, "refresh cancelled");
        }
        cancelled
    }

    /// Cancel refreshes, snapshot the cache, publish `patch`, and register
    /// the mutation whose remote call is `request`.
    pub fn begin_mutation(
        &mut self,
        kind: MutationKind,
        patch: Patch,
        request: HttpRequest,
    ) -> Result<Dispatch, StoreError> {
        self.cancel_refresh();
        let snapshot = self.todos.clone();
        let mutation = Mutation::begin(kind, patch, snapshot)?;
        self.todos = mutation.patch().apply(self.todos.as_deref());

        let ticket = self.next_ticket();
        debug!(%ticket, ?kind, "optimistic patch applied");
        self.mutations.insert(ticket, mutation);
        Ok(Dispatch { ticket, request })
    }

    pub fn create_todo(&mut self, input: CreateTodoRequest) -> Result<Dispatch, StoreError> {
        let request = self.client.build_create_todo(&input)?;
        let patch = Patch::Append(Todo::provisional(&input.title, input.is_completed));
        self.begin_mutation(MutationKind::Create, patch, request)
    }

    /// Set the completion flag in either direction.
    pub fn complete_todo(&mut self, input: CompleteTodoRequest) -> Result<Dispatch, StoreError> {
        let request = self.client.build_complete_todo(&input)?;
        let patch = Patch::SetCompleted {
            id: input.id,
            completed: input.completed,
        };
        self.begin_mutation(MutationKind::Complete, patch, request)
    }

    pub fn remove_todo(&mut self, id: TodoId) -> Result<Dispatch, StoreError> {
        let request = self.client.build_remove_todo(id);
        self.begin_mutation(MutationKind::Remove, Patch::Remove(id), request)
    }

    /// Remove every completed item, one independent mutation each, in cache
    /// order. Provisional items have no server identity and are skipped.
    pub fn clear_completed_todos(&mut self) -> Result<Vec<Dispatch>, StoreError> {
        let ids: Vec<TodoId> = self
            .todos
            .iter()
            .flatten()
            .filter(|todo| todo.is_completed && !todo.is_pending())
            .map(|todo| todo.id)
            .collect();
        debug!(count = ids.len(), "clearing completed todos");
        ids.into_iter().map(|id| self.remove_todo(id)).collect()
    }

    /// Report the response for `ticket`. Returns the reconciling fetch to run
    /// when `ticket` was a mutation.
    pub fn on_response(&mut self, ticket: RequestId, response: HttpResponse) -> Result<Option<Dispatch>, StoreError> {
        self.settle(ticket, Ok(response))
    }

    /// Report that the host could not complete the request for `ticket`.
    pub fn on_failure(&mut self, ticket: RequestId, error: ApiError) -> Result<Option<Dispatch>, StoreError> {
        self.settle(ticket, Err(error))
    }

    fn settle(
        &mut self,
        ticket: RequestId,
        outcome: Result<HttpResponse, ApiError>,
    ) -> Result<Option<Dispatch>, StoreError> {
        if let Some(fetch) = self.fetches.remove(&ticket) {
            self.settle_fetch(ticket, fetch, outcome)?;
            return Ok(None);
        }
        if self.mutations.contains_key(&ticket) {
            return self.settle_mutation(ticket, outcome).map(Some);
        }
        Err(StoreError::UnknownRequest(ticket))
    }

    fn settle_fetch(
        &mut self,
        ticket: RequestId,
        fetch: Fetch,
        outcome: Result<HttpResponse, ApiError>,
    ) -> Result<(), StoreError> {
        if fetch.cancelled {
            debug!(%ticket, "discarding cancelled refresh");
            return Ok(());
        }

        let settled = self.settle_mutations_by(ticket)?;
        match outcome.and_then(|response| self.client.parse_get_todos(response)) {
            Ok(todos) => {
                debug!(%ticket, count = todos.len(), settled = settled.len(), "todos refreshed");
                self.fetch_error = None;
                self.confirmed = Some(todos);
                match self.policy {
                    RollbackPolicy::Rebase => self.rebuild(),
                    RollbackPolicy::Snapshot => self.todos = self.confirmed.clone(),
                }
            }
            Err(err) => {
                warn!(%ticket, error = %err, "refresh failed");
                self.fetch_error = Some(err);
                if self.policy == RollbackPolicy::Rebase {
                    // The server acknowledged these writes; keep them visible.
                    for mutation in settled.iter().filter(|mutation| mutation.succeeded()) {
                        if mutation.landed_in(self.confirmed.as_deref(), &[]).is_none() {
                            self.confirmed = mutation.acknowledged_patch().apply(self.confirmed.as_deref());
                        }
                    }
                    self.rebuild();
                }
            }
        }
        Ok(())
    }

    fn settle_mutation(
        &mut self,
        ticket: RequestId,
        outcome: Result<HttpResponse, ApiError>,
    ) -> Result<Dispatch, StoreError> {
        let kind = self
            .mutations
            .get(&ticket)
            .map(Mutation::kind)
            .ok_or(StoreError::UnknownRequest(ticket))?;

        match outcome.and_then(|response| self.parse_mutation(kind, response)) {
            Ok(created) => {
                info!(%ticket, ?kind, "mutation succeeded");
                let mutation = self.mutation_mut(ticket)?;
                mutation.resolve()?;
                if let Some(todo) = created {
                    mutation.record_created(todo);
                }
                if self.policy == RollbackPolicy::Rebase {
                    self.rebuild();
                }
            }
            Err(err) => {
                warn!(%ticket, ?kind, error = %err, "mutation failed, rolling back");
                self.mutation_mut(ticket)?.reject()?;
                self.rollback(ticket)?;
            }
        }

        let dispatch = self.issue_fetch();
        self.mutation_mut(ticket)?.reconcile(dispatch.ticket)?;
        Ok(dispatch)
    }

    /// Parse a mutation's response. Creates yield the stored item.
    fn parse_mutation(&self, kind: MutationKind, response: HttpResponse) -> Result<Option<Todo>, ApiError> {
        match kind {
            MutationKind::Create => self.client.parse_create_todo(response).map(Some),
            MutationKind::Complete => self.client.parse_complete_todo(response).map(|_| None),
            MutationKind::Remove => self.client.parse_remove_todo(response).map(|()| None),
        }
    }

    fn rollback(&mut self, ticket: RequestId) -> Result<(), StoreError> {
        match self.policy {
            RollbackPolicy::Rebase => self.rebuild(),
            RollbackPolicy::Snapshot => {
                let snapshot = self
                    .mutations
                    .get(&ticket)
                    .ok_or(StoreError::UnknownRequest(ticket))?
                    .snapshot()
                    .map(<[Todo]>::to_vec);
                self.todos = snapshot;
            }
        }
        Ok(())
    }

    /// Replay live patches over the confirmed base. A create whose item the
    /// base already lists is not appended again.
    fn rebuild(&mut self) {
        let base = self.confirmed.as_deref();
        let mut claimed = Vec::new();
        let live = self
            .mutations
            .values()
            .filter(|mutation| mutation.holds_patch())
            .filter(|mutation| match mutation.landed_in(base, &claimed) {
                Some(id) => {
                    claimed.push(id);
                    false
                }
                None => true,
            })
            .map(Mutation::patch);
        self.todos = cache::replay(base, live);
    }

    /// Move every mutation awaiting `fetch` (or an earlier fetch) to idle and
    /// drop it from the in-flight set.
    fn settle_mutations_by(&mut self, fetch: RequestId) -> Result<Vec<Mutation>, StoreError> {
        let mut settled = Vec::new();
        for (ticket, mutation) in self.mutations.iter_mut() {
            if mutation.settle_by(fetch)? {
                settled.push(*ticket);
            }
        }
        Ok(settled
            .into_iter()
            .filter_map(|ticket| self.mutations.remove(&ticket))
            .collect())
    }

    fn mutation_mut(&mut self, ticket: RequestId) -> Result<&mut Mutation, StoreError> {
        self.mutations
            .get_mut(&ticket)
            .ok_or(StoreError::UnknownRequest(ticket))
    }

    fn issue_fetch(&mut self) -> Dispatch {
        let ticket = self.next_ticket();
        self.fetches.insert(ticket, Fetch { cancelled: false });
        Dispatch {
            ticket,
            request: self.client.build_get_todos(),
        }
    }

    fn next_ticket(&mut self) -> RequestId {
        let ticket = RequestId(self.next_ticket);
        self.next_ticket += 1;
        ticket
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::mutation::MutationPhase;

    fn todo(id: TodoId, title: &str, is_completed: bool) -> Todo {
        Todo {
            id,
            title: title.to_string(),
            is_completed,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn list(todos: &[Todo]) -> HttpResponse {
        HttpResponse::new(200, serde_json::to_string(todos).unwrap())
    }

    fn loaded(policy: RollbackPolicy, todos: &[Todo]) -> TodoStore {
        let mut store = TodoStore::new(TodoClient::new("http://localhost:3000"), policy);
        let mount = store.mount();
        store.on_response(mount.ticket, list(todos)).unwrap();
        store
    }

    #[test]
    fn mount_sets_loading_until_first_fetch() {
        let mut store = TodoStore::new(TodoClient::new("http://localhost:3000"), RollbackPolicy::Rebase);
        assert!(!store.is_loading_todos());
        let mount = store.mount();
        assert!(store.is_loading_todos());
        assert!(store.todos().is_none());
        assert!(store.on_response(mount.ticket, list(&[])).unwrap().is_none());
        assert!(!store.is_loading_todos());
        assert_eq!(store.todos(), Some(&[][..]));
        assert!(store.is_idle());
    }

    #[test]
    fn begin_mutation_cancels_in_flight_refresh() {
        let mut store = TodoStore::new(TodoClient::new("http://localhost:3000"), RollbackPolicy::Rebase);
        let mount = store.mount();
        let dispatch = store.remove_todo(1).unwrap();
        assert!(dispatch.ticket > mount.ticket);

        // A stale list arriving after the patch must not clobber it.
        let stale = store.on_response(mount.ticket, list(&[todo(1, "A", false)])).unwrap();
        assert!(stale.is_none());
        assert!(store.todos().is_none());
    }

    #[test]
    fn mutation_response_returns_reconciling_fetch() {
        let mut store = loaded(RollbackPolicy::Rebase, &[todo(1, "A", false)]);
        let dispatch = store.remove_todo(1).unwrap();
        assert!(store.is_removing_todo());

        let refetch = store
            .on_response(dispatch.ticket, HttpResponse::new(204, ""))
            .unwrap()
            .expect("reconciling fetch");
        assert_eq!(refetch.request, TodoClient::new("http://localhost:3000").build_get_todos());
        assert_eq!(
            store.mutation(dispatch.ticket).map(Mutation::phase),
            Some(MutationPhase::Reconciling)
        );
        assert!(store.is_removing_todo());

        store.on_response(refetch.ticket, list(&[])).unwrap();
        assert!(store.mutation(dispatch.ticket).is_none());
        assert!(!store.is_removing_todo());
        assert!(store.is_idle());
    }

    #[test]
    fn unknown_ticket_is_rejected() {
        let mut store = loaded(RollbackPolicy::Rebase, &[]);
        let err = store
            .on_response(RequestId(99), HttpResponse::new(200, "[]"))
            .unwrap_err();
        assert_eq!(err, StoreError::UnknownRequest(RequestId(99)));
    }

    #[test]
    fn transport_failure_rolls_back() {
        let mut store = loaded(RollbackPolicy::Rebase, &[todo(1, "A", false)]);
        let dispatch = store.remove_todo(1).unwrap();
        assert!(store.todos().unwrap().is_empty());
        let refetch = store
            .on_failure(dispatch.ticket, ApiError::Transport("connection refused".into()))
            .unwrap();
        assert!(refetch.is_some());
        assert_eq!(store.todos().unwrap(), &[todo(1, "A", false)]);
    }

    #[test]
    fn rebase_keeps_sibling_patch_on_failure() {
        let base = [todo(1, "A", false), todo(2, "B", false)];
        let mut store = loaded(RollbackPolicy::Rebase, &base);
        let complete = store
            .complete_todo(CompleteTodoRequest { id: 1, completed: true })
            .unwrap();
        let remove = store.remove_todo(2).unwrap();

        store.on_response(complete.ticket, HttpResponse::new(500, "boom")).unwrap();
        // Item 2 stays removed; only the completion is undone.
        assert_eq!(store.todos().unwrap(), &[todo(1, "A", false)]);
        assert!(store.mutation(remove.ticket).unwrap().holds_patch());
    }

    #[test]
    fn snapshot_policy_restores_captured_cache() {
        let base = [todo(1, "A", false), todo(2, "B", false)];
        let mut store = loaded(RollbackPolicy::Snapshot, &base);
        let complete = store
            .complete_todo(CompleteTodoRequest { id: 1, completed: true })
            .unwrap();
        store.remove_todo(2).unwrap();

        store.on_response(complete.ticket, HttpResponse::new(500, "boom")).unwrap();
        // The snapshot predates the removal, so item 2 reappears.
        assert_eq!(store.todos().unwrap(), &base);
    }

    #[test]
    fn rebase_replays_unsettled_patches_over_fresh_fetch() {
        let base = [todo(1, "A", false), todo(2, "B", false)];
        let mut store = loaded(RollbackPolicy::Rebase, &base);
        let remove = store.remove_todo(2).unwrap();
        let refetch = store
            .on_response(remove.ticket, HttpResponse::new(204, ""))
            .unwrap()
            .unwrap();
        // A later mutation starts before the reconciling fetch is issued...
        let complete = store
            .complete_todo(CompleteTodoRequest { id: 1, completed: true })
            .unwrap();
        // ...and cancels it, so its result is ignored.
        store.on_response(refetch.ticket, list(&base)).unwrap();
        assert_eq!(store.todos().unwrap(), &[todo(1, "A", true)]);

        let refetch = store
            .on_response(complete.ticket, HttpResponse::new(200, serde_json::to_string(&todo(1, "A", true)).unwrap()))
            .unwrap()
            .unwrap();
        store.on_response(refetch.ticket, list(&[todo(1, "A", true)])).unwrap();
        assert_eq!(store.todos().unwrap(), &[todo(1, "A", true)]);
        assert!(store.is_idle());
    }

    #[test]
    fn failed_refetch_keeps_acknowledged_writes() {
        let mut store = loaded(RollbackPolicy::Rebase, &[todo(1, "A", false)]);
        let complete = store
            .complete_todo(CompleteTodoRequest { id: 1, completed: true })
            .unwrap();
        let refetch = store
            .on_response(complete.ticket, HttpResponse::new(200, serde_json::to_string(&todo(1, "A", true)).unwrap()))
            .unwrap()
            .unwrap();
        store.on_response(refetch.ticket, HttpResponse::new(503, "unavailable")).unwrap();

        assert_eq!(store.todos().unwrap(), &[todo(1, "A", true)]);
        assert!(matches!(store.fetch_error(), Some(ApiError::HttpError { status: 503, .. })));
        assert!(store.is_idle());
    }

    #[test]
    fn sibling_refetch_listing_the_created_item_does_not_duplicate_it() {
        let mut store = loaded(RollbackPolicy::Rebase, &[todo(1, "A", false)]);
        let create = store
            .create_todo(CreateTodoRequest {
                title: "B".into(),
                is_completed: false,
            })
            .unwrap();
        let remove = store.remove_todo(1).unwrap();
        let refetch = store
            .on_response(remove.ticket, HttpResponse::new(204, ""))
            .unwrap()
            .unwrap();

        // The create has not answered yet, but the server already stored it.
        store.on_response(refetch.ticket, list(&[todo(7, "B", false)])).unwrap();
        assert_eq!(store.todos().unwrap(), &[todo(7, "B", false)]);
        assert_eq!(store.state().items_left(), 1);
        assert!(store.is_creating_todo());

        let refetch = store
            .on_response(create.ticket, HttpResponse::new(201, serde_json::to_string(&todo(7, "B", false)).unwrap()))
            .unwrap()
            .unwrap();
        assert_eq!(store.todos().unwrap(), &[todo(7, "B", false)]);
        store.on_response(refetch.ticket, list(&[todo(7, "B", false)])).unwrap();
        assert_eq!(store.todos().unwrap(), &[todo(7, "B", false)]);
        assert!(store.is_idle());
    }

    #[test]
    fn resolved_create_is_matched_by_server_id() {
        let mut store = loaded(RollbackPolicy::Rebase, &[todo(1, "A", false)]);
        let create = store
            .create_todo(CreateTodoRequest {
                title: "B".into(),
                is_completed: false,
            })
            .unwrap();
        let remove = store.remove_todo(1).unwrap();
        store
            .on_response(create.ticket, HttpResponse::new(201, serde_json::to_string(&todo(7, "B", false)).unwrap()))
            .unwrap();
        let refetch = store
            .on_response(remove.ticket, HttpResponse::new(204, ""))
            .unwrap()
            .unwrap();

        // Another client added a same-titled item; ours is the one with id 7.
        store
            .on_response(refetch.ticket, list(&[todo(6, "B", false), todo(7, "B", false)]))
            .unwrap();
        assert_eq!(store.todos().unwrap(), &[todo(6, "B", false), todo(7, "B", false)]);
    }

    #[test]
    fn failed_refetch_keeps_created_item_with_server_id() {
        let mut store = loaded(RollbackPolicy::Rebase, &[]);
        let create = store
            .create_todo(CreateTodoRequest {
                title: "B".into(),
                is_completed: false,
            })
            .unwrap();
        let refetch = store
            .on_response(create.ticket, HttpResponse::new(201, serde_json::to_string(&todo(7, "B", false)).unwrap()))
            .unwrap()
            .unwrap();
        store.on_response(refetch.ticket, HttpResponse::new(503, "unavailable")).unwrap();

        assert_eq!(store.todos().unwrap(), &[todo(7, "B", false)]);
        assert!(store.is_idle());
    }

    #[test]
    fn clear_completed_skips_provisional_items() {
        let mut store = loaded(RollbackPolicy::Rebase, &[todo(1, "A", true)]);
        store
            .create_todo(CreateTodoRequest {
                title: "B".into(),
                is_completed: true,
            })
            .unwrap();
        let dispatches = store.clear_completed_todos().unwrap();
        assert_eq!(dispatches.len(), 1);
        assert_eq!(dispatches[0].request.path, "http://localhost:3000/todos/1");
    }
}
