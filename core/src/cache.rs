//! Optimistic patches over the cached todo collection.
//!
//! A patch is a pure function from one cache value to the next. The cache is
//! `Option<Vec<Todo>>`: `None` until the first successful fetch.

use crate::types::{Todo, TodoId};

/// Predicted local change for one in-flight mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch {
    /// Append a provisional item.
    Append(Todo),
    /// Replace the matching item with a copy carrying the new flag.
    SetCompleted { id: TodoId, completed: bool },
    /// Drop the matching item.
    Remove(TodoId),
}

impl Patch {
    /// Apply the patch, producing a new cache value.
    ///
    /// Appending to an undefined cache yields a one-item cache; the other
    /// patches leave an undefined cache undefined.
    pub fn apply(&self, todos: Option<&[Todo]>) -> Option<Vec<Todo>> {
        match self {
            Patch::Append(todo) => {
                let mut next = todos.map(<[Todo]>::to_vec).unwrap_or_default();
                next.push(todo.clone());
                Some(next)
            }
            Patch::SetCompleted { id, completed } => todos.map(|todos| {
                todos
                    .iter()
                    .map(|todo| {
                        if todo.id == *id {
                            todo.with_completed(*completed)
                        } else {
                            todo.clone()
                        }
                    })
                    .collect()
            }),
            Patch::Remove(id) => todos.map(|todos| {
                todos.iter().filter(|todo| todo.id != *id).cloned().collect()
            }),
        }
    }
}

/// Fold `patches` over `base` in order.
pub fn replay<'a>(base: Option<&[Todo]>, patches: impl IntoIterator<Item = &'a Patch>) -> Option<Vec<Todo>> {
    let mut current = base.map(<[Todo]>::to_vec);
    for patch in patches {
        current = patch.apply(current.as_deref());
    }
    current
}

/// Number of items not yet completed.
pub fn items_left(todos: &[Todo]) -> usize {
    todos.iter().filter(|todo| !todo.is_completed).count()
}

/// Number of completed items.
pub fn completed_items(todos: &[Todo]) -> usize {
    todos.iter().filter(|todo| todo.is_completed).count()
}
