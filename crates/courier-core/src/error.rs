// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for Courier.

use thiserror::Error;

/// The primary error type used across all Courier adapter traits and core operations.
#[derive(Debug, Error)]
pub enum CourierError {
    /// Configuration errors (invalid TOML, missing required fields, bad time zone).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (I/O, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A persisted collection file could not be parsed and was replaced by an empty default.
    #[error("store file `{path}` is corrupt: {detail}")]
    StoreCorruption { path: String, detail: String },

    /// The transport rejected an operation (invalid recipient, provider-side failure).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Dispatch attempted against a tenant with no connected transport.
    #[error("session for tenant `{tenant_id}` is not connected")]
    SessionNotReady { tenant_id: String },

    /// Malformed input rejected before anything was persisted.
    #[error("validation error: {0}")]
    Validation(String),

    /// The requested record does not exist (or is not owned by the caller).
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller could not be authenticated.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// A temporary resource could not be released.
    #[error("failed to release resource `{reference}`: {source}")]
    ResourceRelease {
        reference: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CourierError {
    /// Shorthand for a transport error without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        CourierError::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps any error as a storage error.
    pub fn storage(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        CourierError::Storage {
            source: Box::new(source),
        }
    }
}

impl From<serde_json::Error> for CourierError {
    fn from(e: serde_json::Error) -> Self {
        CourierError::storage(e)
    }
}
