//! Error types for the todo API client and the store.
//!
//! # Design
//! `NotFound` gets a dedicated variant because callers frequently distinguish
//! "the resource does not exist" from "the server returned an unexpected
//! status." All other non-2xx responses land in `HttpError` with the raw
//! status code and body for debugging.

use std::path::PathBuf;

use thiserror::Error;

use crate::mutation::{MutationEvent, MutationPhase};
use crate::store::RequestId;

/// Errors returned by `TodoClient` parse methods, or reported by the host
/// when it could not execute a request at all.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The server returned 404: the requested todo does not exist.
    #[error("resource not found")]
    NotFound,

    /// The server returned a non-2xx status other than 404.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// The host failed to complete the round-trip (connection refused, timeout).
    #[error("transport failed: {0}")]
    Transport(String),
}

/// Misuse of the store protocol by the host or the view.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("use_todos must be called within a TodosProvider")]
    OutsideProvider,

    #[error("no request in flight for ticket {0}")]
    UnknownRequest(RequestId),

    #[error("invalid mutation transition: {event:?} while {from:?}")]
    InvalidTransition {
        from: MutationPhase,
        event: MutationEvent,
    },

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot open config file '{0}': {1}")]
    OpeningError(PathBuf, std::io::Error),
    #[error("format error {0} when reading config")]
    FormatError(#[from] toml::de::Error),
}
