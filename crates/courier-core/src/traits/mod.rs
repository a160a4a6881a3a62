// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! Transports, stores and authenticators extend the [`PluginAdapter`] base
//! trait and use `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod auth;
pub mod release;
pub mod store;
pub mod transport;

pub use adapter::PluginAdapter;
pub use auth::AuthAdapter;
pub use release::ResourceReleaser;
pub use store::StoreAdapter;
pub use transport::{TransportDirectory, TransportFactory, TransportProvider};
