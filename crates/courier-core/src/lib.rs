// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Courier.
//!
//! This crate provides the trait definitions, error type, and shared types
//! used by the session registry, the scheduler, and every adapter.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::CourierError;
pub use types::{
    AdapterType, Criteria, HealthStatus, Identity, JobContent, JobId, JobStatus, MessageId,
    OutboundMessage, PayloadKind, ScheduledJob, SessionEvent, SessionState, TenantId,
    SCHEDULES_COLLECTION, SESSIONS_COLLECTION, TenantIdentity, TransportEvent, USERS_COLLECTION,
};

pub use traits::{
    AuthAdapter, PluginAdapter, ResourceReleaser, StoreAdapter, TransportDirectory,
    TransportFactory, TransportProvider,
};
