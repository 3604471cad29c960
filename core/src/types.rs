//! Domain DTOs for the todo API.
//!
//! # Design
//! These types mirror the mock-server's schema but are defined independently.
//! Integration tests catch any schema drift between the two crates.
//!
//! A `Todo` is an immutable value record: the store never edits one in place,
//! it swaps in a fresh copy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-assigned identifier of a todo.
pub type TodoId = i64;

/// Placeholder id carried by an optimistically created todo until the server
/// assigns it a real identity.
pub const PENDING_ID: TodoId = -1;

/// A single todo item returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Todo {
    pub id: TodoId,
    pub title: String,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Todo {
    /// Build the provisional record shown while a create is in flight.
    pub fn provisional(title: &str, is_completed: bool) -> Self {
        Self {
            id: PENDING_ID,
            title: title.to_string(),
            is_completed,
            created_at: Utc::now(),
        }
    }

    /// True while the todo has no server-assigned id.
    pub fn is_pending(&self) -> bool {
        self.id == PENDING_ID
    }

    /// Copy of this todo with the completion flag replaced.
    pub fn with_completed(&self, completed: bool) -> Self {
        Self {
            is_completed: completed,
            ..self.clone()
        }
    }
}

/// Request payload for creating a new todo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTodoRequest {
    pub title: String,
    #[serde(default)]
    pub is_completed: bool,
}

/// Request for toggling a todo's completion flag. The id travels in the URL
/// path, so only `completed` is serialized into the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteTodoRequest {
    #[serde(skip)]
    pub id: TodoId,
    pub completed: bool,
}
