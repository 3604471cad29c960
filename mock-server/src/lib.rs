use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Todo {
    pub id: i64,
    pub title: String,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct CreateTodo {
    pub title: String,
    #[serde(default)]
    pub is_completed: bool,
}

#[derive(Deserialize)]
pub struct CompleteTodo {
    pub completed: bool,
}

/// Todos keyed by id, so listing returns them in creation order.
#[derive(Default)]
pub struct TodoTable {
    todos: BTreeMap<i64, Todo>,
    last_id: i64,
}

pub type Db = Arc<RwLock<TodoTable>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(TodoTable::default()));
    Router::new()
        .route("/todos", get(list_todos).post(create_todo))
        .route("/todos/{id}", put(complete_todo).delete(remove_todo))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "mock todo server listening");
    }
    axum::serve(listener, app()).await
}

async fn list_todos(State(db): State<Db>) -> Json<Vec<Todo>> {
    let table = db.read().await;
    debug!(count = table.todos.len(), "list todos");
    Json(table.todos.values().cloned().collect())
}

async fn create_todo(
    State(db): State<Db>,
    Json(input): Json<CreateTodo>,
) -> Result<(StatusCode, Json<Todo>), (StatusCode, String)> {
    if input.title.trim().is_empty() {
        return Err((StatusCode::UNPROCESSABLE_ENTITY, "title must not be blank".to_string()));
    }
    let mut table = db.write().await;
    table.last_id += 1;
    let todo = Todo {
        id: table.last_id,
        title: input.title,
        is_completed: input.is_completed,
        created_at: Utc::now(),
    };
    table.todos.insert(todo.id, todo.clone());
    info!(id = todo.id, "todo created");
    Ok((StatusCode::CREATED, Json(todo)))
}

async fn complete_todo(
    State(db): State<Db>,
    Path(id): Path<i64>,
    Json(input): Json<CompleteTodo>,
) -> Result<Json<Todo>, StatusCode> {
    let mut table = db.write().await;
    let todo = table.todos.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    todo.is_completed = input.completed;
    info!(id, completed = input.completed, "todo completion set");
    Ok(Json(todo.clone()))
}

async fn remove_todo(
    State(db): State<Db>,
    Path(id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    let mut table = db.write().await;
    table
        .todos
        .remove(&id)
        .map(|_| {
            info!(id, "todo removed");
            StatusCode::NO_CONTENT
        })
        .ok_or(StatusCode::NOT_FOUND)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn todo_serializes_to_json() {
        let todo = Todo {
            id: 3,
            title: "Test".to_string(),
            is_completed: false,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        };
        let json = serde_json::to_value(&todo).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["title"], "Test");
        assert_eq!(json["is_completed"], false);
        assert_eq!(json["created_at"], "2024-01-01T00:00:00Z");
    }

    #[test]
    fn create_todo_defaults_completed_to_false() {
        let input: CreateTodo = serde_json::from_str(r#"{"title":"No completed field"}"#).unwrap();
        assert_eq!(input.title, "No completed field");
        assert!(!input.is_completed);
    }

    #[test]
    fn create_todo_rejects_missing_title() {
        let result: Result<CreateTodo, _> = serde_json::from_str(r#"{"is_completed":true}"#);
        assert!(result.is_err());
    }

    #[test]
    fn complete_todo_requires_flag() {
        let result: Result<CompleteTodo, _> = serde_json::from_str(r#"{}"#);
        assert!(result.is_err());
    }
}
