//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type but uses C-compatible representations:
//! `*mut c_char` instead of `String`, raw pointers instead of `Vec`, and
//! tagged enums with explicit discriminants. Conversion and release helpers
//! live here to keep `lib.rs` focused on the `extern "C"` surface.

use std::ffi::CString;
use std::os::raw::c_char;

use todo_core::{ApiError, Dispatch, HttpMethod, HttpRequest, StoreError, Todo, TodoStore, TodosState};

/// Opaque handle to a `TodoStore`. C callers receive a pointer to this and
/// pass it back into every `todo_store_*` function.
pub struct FfiTodoStore {
    pub(crate) inner: TodoStore,
}

/// Copy `s` into a heap C string. Interior NULs are dropped.
pub(crate) fn to_c_string(s: impl Into<String>) -> *mut c_char {
    let s: String = s.into();
    CString::new(s.replace('\0', "")).unwrap_or_default().into_raw()
}

/// Release a C string created by `to_c_string`. Null is ignored.
pub(crate) fn free_c_string(s: *mut c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s) });
    }
}

/// Move `items` onto the heap and return (pointer, length). Empty vectors
/// become a null pointer.
fn into_raw_parts<T>(items: Vec<T>) -> (*mut T, u32) {
    if items.is_empty() {
        return (std::ptr::null_mut(), 0);
    }
    let boxed = items.into_boxed_slice();
    let len = boxed.len() as u32;
    (Box::into_raw(boxed) as *mut T, len)
}

/// Reclaim a buffer produced by `into_raw_parts`.
unsafe fn from_raw_parts<T>(ptr: *mut T, len: u32) -> Vec<T> {
    if ptr.is_null() || len == 0 {
        return Vec::new();
    }
    let slice = std::ptr::slice_from_raw_parts_mut(ptr, len as usize);
    unsafe { Box::from_raw(slice) }.into_vec()
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// HTTP method as a C enum.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiHttpMethod {
    Get = 0,
    Post = 1,
    Put = 2,
    Delete = 3,
}

impl From<HttpMethod> for FfiHttpMethod {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => FfiHttpMethod::Get,
            HttpMethod::Post => FfiHttpMethod::Post,
            HttpMethod::Put => FfiHttpMethod::Put,
            HttpMethod::Delete => FfiHttpMethod::Delete,
        }
    }
}

/// A single HTTP header as a key-value pair of C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// An HTTP request described as C-compatible plain data.
#[repr(C)]
pub struct FfiHttpRequest {
    pub method: FfiHttpMethod,
    pub path: *mut c_char,
    pub headers: *mut FfiHeader,
    pub headers_len: u32,
    pub body: *mut c_char,
}

impl FfiHttpRequest {
    fn from_core(req: HttpRequest) -> Self {
        let headers: Vec<FfiHeader> = req
            .headers
            .into_iter()
            .map(|(k, v)| FfiHeader {
                key: to_c_string(k),
                value: to_c_string(v),
            })
            .collect();
        let (headers, headers_len) = into_raw_parts(headers);
        FfiHttpRequest {
            method: req.method.into(),
            path: to_c_string(req.path),
            headers,
            headers_len,
            body: req.body.map_or(std::ptr::null_mut(), to_c_string),
        }
    }

    fn release(&mut self) {
        free_c_string(self.path);
        free_c_string(self.body);
        for header in unsafe { from_raw_parts(self.headers, self.headers_len) } {
            free_c_string(header.key);
            free_c_string(header.value);
        }
        self.path = std::ptr::null_mut();
        self.body = std::ptr::null_mut();
        self.headers = std::ptr::null_mut();
        self.headers_len = 0;
    }
}

/// A request the host must execute, plus the ticket to report back with.
#[repr(C)]
pub struct FfiDispatch {
    pub ticket: u64,
    pub request: FfiHttpRequest,
}

impl FfiDispatch {
    fn from_core(dispatch: Dispatch) -> Self {
        FfiDispatch {
            ticket: dispatch.ticket.0,
            request: FfiHttpRequest::from_core(dispatch.request),
        }
    }

    /// Heap-allocate a dispatch for the C caller.
    pub(crate) fn boxed(dispatch: Dispatch) -> *mut Self {
        Box::into_raw(Box::new(Self::from_core(dispatch)))
    }

    /// Free a dispatch returned by `boxed`. Null is ignored.
    pub(crate) unsafe fn free(ptr: *mut Self) {
        if !ptr.is_null() {
            let mut dispatch = unsafe { Box::from_raw(ptr) };
            dispatch.request.release();
        }
    }
}

/// Dispatches produced by a bulk operation, in issue order.
#[repr(C)]
pub struct FfiDispatchList {
    pub items: *mut FfiDispatch,
    pub len: u32,
}

impl FfiDispatchList {
    pub(crate) fn boxed(dispatches: Vec<Dispatch>) -> *mut Self {
        let items: Vec<FfiDispatch> = dispatches.into_iter().map(FfiDispatch::from_core).collect();
        let (items, len) = into_raw_parts(items);
        Box::into_raw(Box::new(FfiDispatchList { items, len }))
    }

    pub(crate) unsafe fn free(ptr: *mut Self) {
        if ptr.is_null() {
            return;
        }
        let list = unsafe { Box::from_raw(ptr) };
        for mut dispatch in unsafe { from_raw_parts(list.items, list.len) } {
            dispatch.request.release();
        }
    }
}

// ---------------------------------------------------------------------------
// Response input (caller-provided, not heap-allocated by us)
// ---------------------------------------------------------------------------

/// An HTTP response described as C-compatible plain data.
///
/// The C caller constructs this on the stack after executing a dispatch and
/// passes a pointer to `todo_store_on_response`. The FFI layer reads but
/// does not free these fields.
#[repr(C)]
pub struct FfiHttpResponse {
    pub status: u16,
    pub body: *const c_char,
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Error codes returned in `FfiStoreResult`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    NotFound = 1,
    Http = 2,
    Deserialization = 3,
    Serialization = 4,
    Transport = 5,
    UnknownRequest = 6,
    InvalidTransition = 7,
    OutsideProvider = 8,
    Panic = 9,
    NullArg = 10,
}

/// Result envelope for every store operation.
///
/// On success `error_code` is `Ok` and `dispatch` points to the next request
/// the host must run, or is null when there is nothing to run. On failure
/// `error_message` holds a human-readable C string.
#[repr(C)]
pub struct FfiStoreResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub http_status: u16,
    pub dispatch: *mut FfiDispatch,
}

impl FfiStoreResult {
    fn boxed(error_code: FfiErrorCode, message: Option<String>, http_status: u16, dispatch: *mut FfiDispatch) -> *mut Self {
        Box::into_raw(Box::new(FfiStoreResult {
            error_code,
            error_message: message.map_or(std::ptr::null_mut(), to_c_string),
            http_status,
            dispatch,
        }))
    }

    pub(crate) fn ok(dispatch: Option<Dispatch>) -> *mut Self {
        let dispatch = dispatch.map_or(std::ptr::null_mut(), FfiDispatch::boxed);
        Self::boxed(FfiErrorCode::Ok, None, 0, dispatch)
    }

    pub(crate) fn from_error(err: StoreError) -> *mut Self {
        let (error_code, http_status) = match &err {
            StoreError::Api(api) => api_error_code(api),
            StoreError::UnknownRequest(_) => (FfiErrorCode::UnknownRequest, 0),
            StoreError::InvalidTransition { .. } => (FfiErrorCode::InvalidTransition, 0),
            StoreError::OutsideProvider => (FfiErrorCode::OutsideProvider, 0),
        };
        Self::boxed(error_code, Some(err.to_string()), http_status, std::ptr::null_mut())
    }

    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::boxed(FfiErrorCode::NullArg, Some(format!("null argument: {name}")), 0, std::ptr::null_mut())
    }

    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::boxed(FfiErrorCode::Panic, Some(msg.to_string()), 0, std::ptr::null_mut())
    }

    pub(crate) unsafe fn free(ptr: *mut Self) {
        if ptr.is_null() {
            return;
        }
        let result = unsafe { Box::from_raw(ptr) };
        free_c_string(result.error_message);
        unsafe { FfiDispatch::free(result.dispatch) };
    }
}

fn api_error_code(err: &ApiError) -> (FfiErrorCode, u16) {
    match err {
        ApiError::NotFound => (FfiErrorCode::NotFound, 404),
        ApiError::HttpError { status, .. } => (FfiErrorCode::Http, *status),
        ApiError::DeserializationError(_) => (FfiErrorCode::Deserialization, 0),
        ApiError::SerializationError(_) => (FfiErrorCode::Serialization, 0),
        ApiError::Transport(_) => (FfiErrorCode::Transport, 0),
    }
}

// ---------------------------------------------------------------------------
// State snapshot
// ---------------------------------------------------------------------------

/// A single todo item exposed to C.
#[repr(C)]
pub struct FfiTodo {
    pub id: i64,
    pub title: *mut c_char,
    pub is_completed: bool,
    pub is_pending: bool,
    /// RFC 3339 timestamp.
    pub created_at: *mut c_char,
}

impl From<Todo> for FfiTodo {
    fn from(todo: Todo) -> Self {
        FfiTodo {
            id: todo.id,
            is_completed: todo.is_completed,
            is_pending: todo.is_pending(),
            created_at: to_c_string(todo.created_at.to_rfc3339()),
            title: to_c_string(todo.title),
        }
    }
}

/// Everything a view reads from the store, copied out at one point in time.
///
/// `has_todos` is false until the first collection is available; `todos`
/// may be null when the collection is empty.
#[repr(C)]
pub struct FfiTodosState {
    pub has_todos: bool,
    pub todos: *mut FfiTodo,
    pub len: u32,
    pub items_left: u32,
    pub completed_items: u32,
    pub is_loading_todos: bool,
    pub is_updating_todo: bool,
    pub is_creating_todo: bool,
    pub is_removing_todo: bool,
    pub fetch_error: *mut c_char,
}

impl FfiTodosState {
    pub(crate) fn boxed(state: TodosState) -> *mut Self {
        let items_left = state.items_left() as u32;
        let completed_items = state.completed_items() as u32;
        let has_todos = state.todos.is_some();
        let todos: Vec<FfiTodo> = state.todos.unwrap_or_default().into_iter().map(FfiTodo::from).collect();
        let (todos, len) = into_raw_parts(todos);
        Box::into_raw(Box::new(FfiTodosState {
            has_todos,
            todos,
            len,
            items_left,
            completed_items,
            is_loading_todos: state.is_loading_todos,
            is_updating_todo: state.is_updating_todo,
            is_creating_todo: state.is_creating_todo,
            is_removing_todo: state.is_removing_todo,
            fetch_error: state
                .fetch_error
                .map_or(std::ptr::null_mut(), |err| to_c_string(err.to_string())),
        }))
    }

    pub(crate) unsafe fn free(ptr: *mut Self) {
        if ptr.is_null() {
            return;
        }
        let state = unsafe { Box::from_raw(ptr) };
        free_c_string(state.fetch_error);
        for todo in unsafe { from_raw_parts(state.todos, state.len) } {
            free_c_string(todo.title);
            free_c_string(todo.created_at);
        }
    }
}
