// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/WebSocket gateway for Courier.
//!
//! Exposes scheduling, immediate sends, media staging and session status over
//! a token-authenticated REST API, plus a WebSocket that streams a tenant's
//! session lifecycle (handshake artifacts, status changes, errors). Tokens come
//! from password login under `/auth` or from `courier token`.

pub mod accounts;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;
pub mod ws;

pub use accounts::{UserAccounts, UserProfile};
pub use auth::{Claims, JwtAuthenticator, auth_middleware};
pub use error::ApiError;
pub use server::{Accounts, GatewayState, MAX_UPLOAD_BYTES, router, serve};
