// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! File-backed implementation of the StoreAdapter trait.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use courier_core::{
    AdapterType, CourierError, Criteria, HealthStatus, PluginAdapter, StoreAdapter,
};

use crate::document::Document;

/// A JSON document of collections stored in a single file.
///
/// Writers inside this process are serialized by a mutex; each operation reads
/// the file, applies its change and replaces the file through a temp file in
/// the same directory, so a crash leaves either the old or the new document.
/// A file that fails to parse is logged and treated as empty; it is overwritten
/// by the next write.
#[derive(Clone)]
pub struct JsonStore {
    path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl JsonStore {
    /// Use `path` as the backing file. Nothing is touched until the first operation.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `op` against the current document, persisting it when `op` reports a change.
    async fn with_document<T, F>(&self, op: F) -> Result<T, CourierError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Document) -> (T, bool) + Send + 'static,
    {
        let _guard = self.lock.lock().await;
        let path = Arc::clone(&self.path);
        let span = tracing::Span::current();
        tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            let mut doc = load(&path)?;
            let (out, changed) = op(&mut doc);
            if changed {
                save(&path, &doc)?;
            }
            Ok(out)
        })
        .await
        .map_err(|e| CourierError::Internal(format!("store task failed: {e}")))?
    }
}

fn load(path: &Path) -> Result<Document, CourierError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Document::default()),
        Err(e) => return Err(CourierError::storage(e)),
    };
    match Document::parse(&raw) {
        Ok(doc) => Ok(doc),
        Err(e) => {
            let err = CourierError::StoreCorruption {
                path: path.display().to_string(),
                detail: e.to_string(),
            };
            warn!(error = %err, "store file is corrupt, starting from an empty document");
            Ok(Document::default())
        }
    }
}

fn save(path: &Path, doc: &Document) -> Result<(), CourierError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(CourierError::storage)?;

    let body = doc.to_json_pretty()?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(CourierError::storage)?;
    tmp.write_all(body.as_bytes()).map_err(CourierError::storage)?;
    tmp.as_file().sync_all().map_err(CourierError::storage)?;
    tmp.persist(path).map_err(|e| CourierError::storage(e.error))?;
    debug!(path = %path.display(), "store file written");
    Ok(())
}

#[async_trait]
impl PluginAdapter for JsonStore {
    fn name(&self) -> &str {
        "json"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        let path = Arc::clone(&self.path);
        let status = tokio::task::spawn_blocking(move || match std::fs::metadata(&*path) {
            Ok(meta) if meta.permissions().readonly() => {
                HealthStatus::Degraded(format!("{} is read-only", path.display()))
            }
            Ok(_) => HealthStatus::Healthy,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        })
        .await
        .map_err(|e| CourierError::Internal(format!("store task failed: {e}")))?;
        Ok(status)
    }
}

#[async_trait]
impl StoreAdapter for JsonStore {
    async fn find(
        &self,
        collection: &str,
        criteria: &Criteria,
    ) -> Result<Option<Value>, CourierError> {
        let (collection, criteria) = (collection.to_string(), criteria.clone());
        self.with_document(move |doc| (doc.find(&collection, &criteria), false))
            .await
    }

    async fn filter(
        &self,
        collection: &str,
        criteria: &Criteria,
    ) -> Result<Vec<Value>, CourierError> {
        let (collection, criteria) = (collection.to_string(), criteria.clone());
        self.with_document(move |doc| (doc.filter(&collection, &criteria), false))
            .await
    }

    async fn append(&self, collection: &str, record: Value) -> Result<(), CourierError> {
        let collection = collection.to_string();
        self.with_document(move |doc| {
            doc.append(&collection, record);
            ((), true)
        })
        .await
    }

    async fn update(
        &self,
        collection: &str,
        criteria: &Criteria,
        patch: Value,
    ) -> Result<Option<Value>, CourierError> {
        let (collection, criteria) = (collection.to_string(), criteria.clone());
        self.with_document(move |doc| {
            let updated = doc.update(&collection, &criteria, patch);
            let changed = updated.is_some();
            (updated, changed)
        })
        .await
    }

    async fn remove(&self, collection: &str, criteria: &Criteria) -> Result<bool, CourierError> {
        let (collection, criteria) = (collection.to_string(), criteria.clone());
        self.with_document(move |doc| {
            let removed = doc.remove(&collection, &criteria);
            (removed, removed)
        })
        .await
    }
}
