// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp transport for Courier.
//!
//! Talks to an external WhatsApp-Web session bridge over HTTP: sessions are
//! started and stopped through it, their status is polled and translated into
//! lifecycle events, and messages are sent through it.

pub mod client;
pub mod transport;
pub mod types;

pub use client::BridgeClient;
pub use transport::{BridgeTransport, BridgeTransportFactory};
pub use types::{BridgeState, BridgeStatus, BridgeUser, SendRequest};
