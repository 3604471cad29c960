//! C-ABI wrapper around the `todo-core` store.
//!
//! # Overview
//! Exposes the optimistic todo store through `extern "C"` functions so a
//! native UI can drive it: the store hands out dispatches, the host executes
//! them over its own HTTP stack and reports each response back.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Store operations mirror `TodoStore` 1:1 and answer with a single
//!   `FfiStoreResult` envelope carrying either the next dispatch or an error.
//! - The C caller owns all returned pointers and must call the matching
//!   `todo_free_*` function to release them.
//! - The store handle is not thread-safe; use it from one thread.

pub mod types;

use std::ffi::CStr;
use std::os::raw::c_char;
use std::panic::catch_unwind;

use todo_core::{
    ApiError, CompleteTodoRequest, CreateTodoRequest, HttpResponse, RequestId, RollbackPolicy, TodoClient,
    TodoStore,
};

pub use types::*;

/// Read a borrowed C string, treating invalid UTF-8 as empty.
fn read_c_str<'a>(s: *const c_char) -> &'a str {
    unsafe { CStr::from_ptr(s) }.to_str().unwrap_or("")
}

// ---------------------------------------------------------------------------
// Store lifecycle
// ---------------------------------------------------------------------------

/// Create a store talking to `base_url`. `snapshot_rollback` selects the
/// snapshot-restoring rollback policy instead of the default rebase policy.
///
/// Returns null if `base_url` is null or if an internal panic occurs.
/// The caller must free the returned pointer with `todo_store_free`.
#[unsafe(no_mangle)]
pub extern "C" fn todo_store_new(base_url: *const c_char, snapshot_rollback: bool) -> *mut FfiTodoStore {
    catch_unwind(|| {
        if base_url.is_null() {
            return std::ptr::null_mut();
        }
        let policy = if snapshot_rollback {
            RollbackPolicy::Snapshot
        } else {
            RollbackPolicy::Rebase
        };
        let store = TodoStore::new(TodoClient::new(read_c_str(base_url)), policy);
        Box::into_raw(Box::new(FfiTodoStore { inner: store }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a store created by `todo_store_new`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn todo_store_free(store: *mut FfiTodoStore) {
    if !store.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(store) });
        });
    }
}

/// Issue the initial load.
///
/// Returns null if `store` is null. Free with `todo_free_dispatch`.
#[unsafe(no_mangle)]
pub extern "C" fn todo_store_mount(store: *mut FfiTodoStore) -> *mut FfiDispatch {
    catch_unwind(|| {
        if store.is_null() {
            return std::ptr::null_mut();
        }
        let store = unsafe { &mut *store };
        FfiDispatch::boxed(store.inner.mount())
    })
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// Optimistically create a todo. On success the result's `dispatch` is the
/// create request to execute.
#[unsafe(no_mangle)]
pub extern "C" fn todo_store_create(
    store: *mut FfiTodoStore,
    title: *const c_char,
    is_completed: bool,
) -> *mut FfiStoreResult {
    catch_unwind(|| {
        if store.is_null() {
            return FfiStoreResult::null_arg("store");
        }
        if title.is_null() {
            return FfiStoreResult::null_arg("title");
        }
        let store = unsafe { &mut *store };
        let input = CreateTodoRequest {
            title: read_c_str(title).to_string(),
            is_completed,
        };
        match store.inner.create_todo(input) {
            Ok(dispatch) => FfiStoreResult::ok(Some(dispatch)),
            Err(e) => FfiStoreResult::from_error(e),
        }
    })
    .unwrap_or_else(|_| FfiStoreResult::panic("panic in todo_store_create"))
}

/// Optimistically set a todo's completion flag (either direction).
#[unsafe(no_mangle)]
pub extern "C" fn todo_store_complete(store: *mut FfiTodoStore, id: i64, completed: bool) -> *mut FfiStoreResult {
    catch_unwind(|| {
        if store.is_null() {
            return FfiStoreResult::null_arg("store");
        }
        let store = unsafe { &mut *store };
        match store.inner.complete_todo(CompleteTodoRequest { id, completed }) {
            Ok(dispatch) => FfiStoreResult::ok(Some(dispatch)),
            Err(e) => FfiStoreResult::from_error(e),
        }
    })
    .unwrap_or_else(|_| FfiStoreResult::panic("panic in todo_store_complete"))
}

/// Optimistically remove a todo.
#[unsafe(no_mangle)]
pub extern "C" fn todo_store_remove(store: *mut FfiTodoStore, id: i64) -> *mut FfiStoreResult {
    catch_unwind(|| {
        if store.is_null() {
            return FfiStoreResult::null_arg("store");
        }
        let store = unsafe { &mut *store };
        match store.inner.remove_todo(id) {
            Ok(dispatch) => FfiStoreResult::ok(Some(dispatch)),
            Err(e) => FfiStoreResult::from_error(e),
        }
    })
    .unwrap_or_else(|_| FfiStoreResult::panic("panic in todo_store_remove"))
}

/// Remove every completed todo, one dispatch per item in list order.
///
/// Returns null if `store` is null or the operation fails.
/// Free with `todo_free_dispatch_list`.
#[unsafe(no_mangle)]
pub extern "C" fn todo_store_clear_completed(store: *mut FfiTodoStore) -> *mut FfiDispatchList {
    catch_unwind(|| {
        if store.is_null() {
            return std::ptr::null_mut();
        }
        let store = unsafe { &mut *store };
        match store.inner.clear_completed_todos() {
            Ok(dispatches) => FfiDispatchList::boxed(dispatches),
            Err(_) => std::ptr::null_mut(),
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Host callbacks
// ---------------------------------------------------------------------------

/// Report the HTTP response for `ticket`.
///
/// A mutation failure is not an error here: the store rolls back and the
/// result still carries the reconciling fetch in `dispatch`. Errors are
/// reserved for protocol misuse such as an unknown ticket.
#[unsafe(no_mangle)]
pub extern "C" fn todo_store_on_response(
    store: *mut FfiTodoStore,
    ticket: u64,
    response: *const FfiHttpResponse,
) -> *mut FfiStoreResult {
    catch_unwind(|| {
        if store.is_null() {
            return FfiStoreResult::null_arg("store");
        }
        if response.is_null() {
            return FfiStoreResult::null_arg("response");
        }
        let store = unsafe { &mut *store };
        let resp = unsafe { &*response };
        let body = if resp.body.is_null() { "" } else { read_c_str(resp.body) };
        match store
            .inner
            .on_response(RequestId(ticket), HttpResponse::new(resp.status, body))
        {
            Ok(next) => FfiStoreResult::ok(next),
            Err(e) => FfiStoreResult::from_error(e),
        }
    })
    .unwrap_or_else(|_| FfiStoreResult::panic("panic in todo_store_on_response"))
}

/// Report that the request for `ticket` could not be executed at all.
/// `message` may be null.
#[unsafe(no_mangle)]
pub extern "C" fn todo_store_on_transport_error(
    store: *mut FfiTodoStore,
    ticket: u64,
    message: *const c_char,
) -> *mut FfiStoreResult {
    catch_unwind(|| {
        if store.is_null() {
            return FfiStoreResult::null_arg("store");
        }
        let store = unsafe { &mut *store };
        let message = if message.is_null() { "" } else { read_c_str(message) };
        match store
            .inner
            .on_failure(RequestId(ticket), ApiError::Transport(message.to_string()))
        {
            Ok(next) => FfiStoreResult::ok(next),
            Err(e) => FfiStoreResult::from_error(e),
        }
    })
    .unwrap_or_else(|_| FfiStoreResult::panic("panic in todo_store_on_transport_error"))
}

/// Copy out the current cache and flags.
///
/// Returns null if `store` is null. Free with `todo_free_state`.
#[unsafe(no_mangle)]
pub extern "C" fn todo_store_state(store: *const FfiTodoStore) -> *mut FfiTodosState {
    catch_unwind(|| {
        if store.is_null() {
            return std::ptr::null_mut();
        }
        let store = unsafe { &*store };
        FfiTodosState::boxed(store.inner.state())
    })
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free a dispatch returned by `todo_store_mount`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn todo_free_dispatch(dispatch: *mut FfiDispatch) {
    let _ = catch_unwind(|| unsafe { FfiDispatch::free(dispatch) });
}

/// Free a list returned by `todo_store_clear_completed`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn todo_free_dispatch_list(list: *mut FfiDispatchList) {
    let _ = catch_unwind(|| unsafe { FfiDispatchList::free(list) });
}

/// Free a result and the dispatch it carries. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn todo_free_result(result: *mut FfiStoreResult) {
    let _ = catch_unwind(|| unsafe { FfiStoreResult::free(result) });
}

/// Free a state snapshot returned by `todo_store_state`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn todo_free_state(state: *mut FfiTodosState) {
    let _ = catch_unwind(|| unsafe { FfiTodosState::free(state) });
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
