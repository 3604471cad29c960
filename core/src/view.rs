//! Stateless list view over the store.
//!
//! `ListView::render` is a pure function of the store's exposed values. The
//! resulting `ListModel` can be handed to any presentation layer, or printed
//! through its `Display` impl.

use std::fmt;

use crate::error::{ApiError, StoreError};
use crate::provider::TodosHandle;
use crate::store::{Dispatch, TodosState};
use crate::types::{Todo, TodoId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoRow {
    pub id: TodoId,
    pub title: String,
    pub is_completed: bool,
    pub is_pending: bool,
}

impl From<&Todo> for TodoRow {
    fn from(todo: &Todo) -> Self {
        Self {
            id: todo.id,
            title: todo.title.clone(),
            is_completed: todo.is_completed,
            is_pending: todo.is_pending(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListBody {
    Loading,
    /// No collection yet and none on its way. Carries the error when the
    /// initial load failed.
    Unavailable(Option<ApiError>),
    Empty,
    Items(Vec<TodoRow>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    pub items_left: usize,
    pub completed_items: usize,
    pub clear_completed_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListModel {
    pub body: ListBody,
    pub footer: Footer,
}

impl ListModel {
    pub fn from_state(state: &TodosState) -> Self {
        let body = match state.todos.as_deref() {
            _ if state.is_loading_todos => ListBody::Loading,
            Some([]) => ListBody::Empty,
            Some(todos) => ListBody::Items(todos.iter().map(TodoRow::from).collect()),
            None => ListBody::Unavailable(state.fetch_error.clone()),
        };
        let completed_items = state.completed_items();
        Self {
            body,
            footer: Footer {
                items_left: state.items_left(),
                completed_items,
                clear_completed_enabled: completed_items > 0,
            },
        }
    }
}

impl fmt::Display for ListModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            ListBody::Loading => writeln!(f, "Loading...")?,
            ListBody::Unavailable(None) => writeln!(f, "Not loaded")?,
            ListBody::Unavailable(Some(err)) => writeln!(f, "Could not load todos: {err}")?,
            ListBody::Empty => writeln!(f, "Nothing to do")?,
            ListBody::Items(rows) => {
                for row in rows {
                    let mark = if row.is_completed { "x" } else { " " };
                    let pending = if row.is_pending { " (saving)" } else { "" };
                    writeln!(f, "[{mark}] {}{pending}", row.title)?;
                }
            }
        }
        let clear = if self.footer.clear_completed_enabled {
            "Clear Completed"
        } else {
            "Clear Completed (disabled)"
        };
        write!(f, "{} items left | {clear}", self.footer.items_left)
    }
}

pub struct ListView {
    todos: TodosHandle,
}

impl ListView {
    /// Bind the view to a provider. Fails when the handle is outside any
    /// provider's scope.
    pub fn new(todos: &TodosHandle) -> Result<Self, StoreError> {
        todos.use_todos()?;
        Ok(Self { todos: todos.clone() })
    }

    pub fn render(&self) -> Result<ListModel, StoreError> {
        let state = self.todos.use_todos()?.state();
        Ok(ListModel::from_state(&state))
    }

    /// Handle the "clear completed" control. Does nothing while disabled.
    pub fn clear_completed(&self) -> Result<Vec<Dispatch>, StoreError> {
        let todos = self.todos.use_todos()?;
        if todos.state().completed_items() == 0 {
            return Ok(Vec::new());
        }
        todos.clear_completed_todos()
    }
}
