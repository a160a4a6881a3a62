// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deferred dispatch for Courier.
//!
//! Jobs are persisted `pending` in the `schedules` collection and picked up by
//! a fixed-interval polling loop once due. Each due job is dispatched at most
//! once through the [`DispatchBridge`] and ends `sent` or `failed`; failed jobs
//! are not retried.

pub mod bridge;
mod claims;
pub mod scheduler;
pub mod time;

pub use bridge::DispatchBridge;
pub use scheduler::{JobRequest, Scheduler, TickReport};
pub use time::{now_in, parse_due_at};
