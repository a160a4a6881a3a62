// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Courier integration tests.
//!
//! Mock adapters and a harness for fast, deterministic tests without a real
//! messaging bridge.
//!
//! # Components
//!
//! - [`MockTransport`] / [`MockTransportFactory`] - scripted lifecycle events,
//!   injectable failures and delays, captured sends
//! - [`CountingReleaser`] - counts temporary-resource releases per reference
//! - [`FlakyStore`] - memory store with injectable update failures
//! - [`observer`] helpers - channel constructors and bounded waits on events
//! - [`TestHarness`] - memory store, registry and scheduler wired together

pub mod flaky_store;
pub mod harness;
pub mod mock_transport;
pub mod observer;
pub mod releaser;

pub use flaky_store::FlakyStore;
pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_transport::{MockBehavior, MockTransport, MockTransportFactory};
pub use releaser::CountingReleaser;
