// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence for Courier.
//!
//! Record collections live in plain JSON documents (one file per store, one
//! array per collection) and are queried with field-equality [`Criteria`].
//! There are no transactions: every operation re-reads the file, applies one
//! change and atomically replaces the file. Uploaded media is staged on disk by
//! [`MediaStaging`] and released through the `ResourceReleaser` trait.
//!
//! [`Criteria`]: courier_core::Criteria

pub mod document;
pub mod json;
pub mod media;
pub mod memory;

pub use document::Document;
pub use json::JsonStore;
pub use media::{MediaStaging, StagedMedia};
pub use memory::MemoryStore;
