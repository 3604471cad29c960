//! Optimistic client-side store for the todo service.
//!
//! # Overview
//! Keeps a cache of todos, applies create/complete/remove locally before the
//! server confirms them, and reconciles with a fresh read once each call
//! settles. The store builds `HttpRequest` values and parses `HttpResponse`
//! values without touching the network (host-does-IO pattern), so the whole
//! optimistic protocol is deterministic and testable.
//!
//! # Design
//! - `TodoClient` is stateless; it holds only `base_url`.
//! - `TodoStore` owns the cache and hands out `Dispatch` tickets; the host
//!   reports each outcome back with `on_response` / `on_failure`.
//! - `TodosProvider` scopes the store; `ListView` reads it through a
//!   `TodosHandle` and fails when used outside a provider.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod mutation;
pub mod provider;
pub mod store;
pub mod types;
pub mod view;

pub use cache::Patch;
pub use client::TodoClient;
pub use config::StoreConfig;
pub use error::{ApiError, ConfigError, StoreError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use mutation::{MutationKind, MutationPhase};
pub use provider::{Todos, TodosHandle, TodosProvider};
pub use store::{Dispatch, RequestId, RollbackPolicy, TodoStore, TodosState};
pub use types::{CompleteTodoRequest, CreateTodoRequest, Todo, TodoId, PENDING_ID};
pub use view::{Footer, ListBody, ListModel, ListView, TodoRow};
