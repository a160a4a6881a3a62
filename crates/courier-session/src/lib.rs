// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant session registry.
//!
//! Each tenant owns at most one live transport connection. The registry creates
//! it on first [`SessionRegistry::acquire`], relays its lifecycle events to every
//! bound observer, replays the current state to late joiners and tears the
//! session down on logout or disconnect.

pub mod registry;
pub mod session;

pub use registry::SessionRegistry;
pub use session::{Observer, ObserverId, SessionHandle, SessionSnapshot};
