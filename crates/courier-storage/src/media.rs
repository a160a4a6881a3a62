// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Staging area for uploaded media that scheduled jobs reference until dispatch.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use courier_core::{CourierError, ResourceReleaser};

/// Longest extension kept from an uploaded file name.
const MAX_EXTENSION_LEN: usize = 8;

/// A file written into the staging directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedMedia {
    /// Reference stored in job content; an absolute path inside the staging dir.
    pub handle: String,
    pub size: usize,
}

/// Owns a directory of uploaded files named by random UUIDs.
///
/// Only paths directly inside the directory are ever resolved or deleted, so a
/// job record cannot be used to remove arbitrary files.
#[derive(Debug, Clone)]
pub struct MediaStaging {
    dir: PathBuf,
}

impl MediaStaging {
    /// Creates the directory if needed.
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self, CourierError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(CourierError::storage)?;
        let dir = tokio::fs::canonicalize(&dir)
            .await
            .map_err(CourierError::storage)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `bytes` under a fresh name, keeping a sane extension from `original_name`.
    pub async fn stage(
        &self,
        bytes: &[u8],
        original_name: Option<&str>,
    ) -> Result<StagedMedia, CourierError> {
        if bytes.is_empty() {
            return Err(CourierError::Validation("media upload is empty".into()));
        }
        let mut name = uuid::Uuid::new_v4().to_string();
        if let Some(ext) = original_name.and_then(extension_of) {
            name.push('.');
            name.push_str(&ext);
        }
        let path = self.dir.join(&name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(CourierError::storage)?;
        debug!(path = %path.display(), size = bytes.len(), "media staged");
        Ok(StagedMedia {
            handle: path.display().to_string(),
            size: bytes.len(),
        })
    }

    /// Map a handle back to a path, or `None` when it does not point directly
    /// inside the staging directory.
    pub fn resolve(&self, handle: &str) -> Option<PathBuf> {
        let candidate = Path::new(handle);
        let mut components = candidate.components();
        let file_name = match components.next_back()? {
            Component::Normal(name) => name,
            _ => return None,
        };
        let parent = components.as_path();
        if parent.as_os_str().is_empty() || parent == self.dir {
            Some(self.dir.join(file_name))
        } else {
            None
        }
    }

    /// The handle points inside the staging directory and its file still exists.
    pub async fn is_staged(&self, handle: &str) -> bool {
        match self.resolve(handle) {
            Some(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            None => false,
        }
    }
}

fn extension_of(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?;
    (!ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.chars().all(|c| c.is_ascii_alphanumeric()))
    .then(|| ext.to_ascii_lowercase())
}

#[async_trait]
impl ResourceReleaser for MediaStaging {
    async fn release(&self, reference: &str) -> Result<(), CourierError> {
        let path = self.resolve(reference).ok_or_else(|| CourierError::ResourceRelease {
            reference: reference.to_string(),
            source: "reference is outside the media staging directory".into(),
        })?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(path = %path.display(), "staged media released");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "staged media already gone");
                Ok(())
            }
            Err(e) => Err(CourierError::ResourceRelease {
                reference: reference.to_string(),
                source: Box::new(e),
            }),
        }
    }
}
