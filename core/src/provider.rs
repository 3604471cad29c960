//! Scoped access to a `TodoStore`.
//!
//! A `TodosProvider` owns the store for as long as it lives. Consumers only
//! ever hold a `TodosHandle`, and must go through `use_todos` to reach the
//! store; once the provider is gone (or if the handle was never attached to
//! one) that call fails with `StoreError::OutsideProvider`.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::error::{ApiError, StoreError};
use crate::http::HttpResponse;
use crate::store::{Dispatch, RequestId, TodoStore, TodosState};
use crate::types::{CompleteTodoRequest, CreateTodoRequest, TodoId};

pub struct TodosProvider {
    store: Rc<RefCell<TodoStore>>,
}

impl TodosProvider {
    pub fn new(store: TodoStore) -> Self {
        Self {
            store: Rc::new(RefCell::new(store)),
        }
    }

    /// Issue the initial fetch.
    pub fn mount(&self) -> Dispatch {
        self.store.borrow_mut().mount()
    }

    pub fn handle(&self) -> TodosHandle {
        TodosHandle {
            store: Rc::downgrade(&self.store),
        }
    }

    /// End the scope, returning the store.
    ///
    /// Fails with the provider back if a `Todos` value still holds the store.
    pub fn teardown(self) -> Result<TodoStore, Self> {
        Rc::try_unwrap(self.store)
            .map(RefCell::into_inner)
            .map_err(|store| Self { store })
    }
}

/// Detached reference to a provider's store. `TodosHandle::default()` is
/// attached to nothing.
#[derive(Clone, Default)]
pub struct TodosHandle {
    store: Weak<RefCell<TodoStore>>,
}

impl TodosHandle {
    pub fn use_todos(&self) -> Result<Todos, StoreError> {
        self.store
            .upgrade()
            .map(|store| Todos { store })
            .ok_or(StoreError::OutsideProvider)
    }
}

/// Read values and operations exposed to the view.
pub struct Todos {
    store: Rc<RefCell<TodoStore>>,
}

impl Todos {
    pub fn state(&self) -> TodosState {
        self.store.borrow().state()
    }

    pub fn is_loading_todos(&self) -> bool {
        self.store.borrow().is_loading_todos()
    }

    pub fn is_updating_todo(&self) -> bool {
        self.store.borrow().is_updating_todo()
    }

    pub fn create_todo(&self, input: CreateTodoRequest) -> Result<Dispatch, StoreError> {
        self.store.borrow_mut().create_todo(input)
    }

    pub fn complete_todo(&self, input: CompleteTodoRequest) -> Result<Dispatch, StoreError> {
        self.store.borrow_mut().complete_todo(input)
    }

    pub fn remove_todo(&self, id: TodoId) -> Result<Dispatch, StoreError> {
        self.store.borrow_mut().remove_todo(id)
    }

    pub fn clear_completed_todos(&self) -> Result<Vec<Dispatch>, StoreError> {
        self.store.borrow_mut().clear_completed_todos()
    }

    pub fn on_response(&self, ticket: RequestId, response: HttpResponse) -> Result<Option<Dispatch>, StoreError> {
        self.store.borrow_mut().on_response(ticket, response)
    }

    pub fn on_failure(&self, ticket: RequestId, error: ApiError) -> Result<Option<Dispatch>, StoreError> {
        self.store.borrow_mut().on_failure(ticket, error)
    }
}
