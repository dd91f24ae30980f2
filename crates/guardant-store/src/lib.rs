//! The Tenant Data Store ("Golem adapter") — the sole persistence path for
//! the GuardAnt core. Every read and write is namespaced by `(nestId,
//! dataType, key)`; no component may bypass it to share state directly.
//!
//! [`Store`] is the abstraction the rest of the core depends on.
//! [`JsonFileStore`] is the one production implementation: an in-memory
//! index snapshotted to JSON files on every write, one file per
//! `(nestId, dataType)` pair so a tenant's data lives under its own
//! subtree on disk.

#![forbid(unsafe_code)]

pub mod error;

pub use error::{StoreError, StoreResult};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Metadata accompanying a write. Reserved for future indexing (tags,
/// content hashes); currently opaque to the store.
#[derive(Debug, Clone, Default, Serialize, serde::Deserialize)]
pub struct PutMeta {
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

/// The namespaced, typed key/value interface every GuardAnt component
/// treats as the only persistence path (spec §4.1).
#[async_trait]
pub trait Store: Send + Sync {
    async fn put(
        &self,
        nest_id: &str,
        data_type: &str,
        key: &str,
        value: Value,
        meta: PutMeta,
    ) -> StoreResult<()>;

    async fn get(&self, nest_id: &str, data_type: &str, key: &str) -> StoreResult<Option<Value>>;

    async fn delete(&self, nest_id: &str, data_type: &str, key: &str) -> StoreResult<()>;

    /// Unordered; implementers may stream in a real backend.
    async fn list_by_type(&self, nest_id: &str, data_type: &str) -> StoreResult<Vec<Value>>;
}

/// Convenience typed wrappers over the raw JSON `Store` trait.
#[async_trait]
pub trait StoreExt: Store {
    async fn put_typed<T: Serialize + Send + Sync>(
        &self,
        nest_id: &str,
        data_type: &str,
        key: &str,
        value: &T,
    ) -> StoreResult<()> {
        let v = serde_json::to_value(value)?;
        self.put(nest_id, data_type, key, v, PutMeta::default()).await
    }

    async fn get_typed<T: DeserializeOwned>(
        &self,
        nest_id: &str,
        data_type: &str,
        key: &str,
    ) -> StoreResult<Option<T>> {
        match self.get(nest_id, data_type, key).await? {
            Some(v) => Ok(Some(serde_json::from_value(v)?)),
            None => Ok(None),
        }
    }

    async fn list_by_type_typed<T: DeserializeOwned>(
        &self,
        nest_id: &str,
        data_type: &str,
    ) -> StoreResult<Vec<T>> {
        let raw = self.list_by_type(nest_id, data_type).await?;
        raw.into_iter()
            .map(|v| serde_json::from_value(v).map_err(StoreError::from))
            .collect()
    }
}

impl<T: Store + ?Sized> StoreExt for T {}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct NamespaceKey {
    nest_id: String,
    data_type: String,
}

/// In-memory, JSON-snapshotted implementation of [`Store`].
///
/// Every `(nestId, dataType)` pair is its own logical namespace, persisted
/// to `{root}/{nestId}/{dataType}.json` as a flat `{key: value}` object.
/// A successful `put` is visible to a subsequent `get` from the same
/// process immediately (read-your-writes) because both go through the
/// same in-memory map; the on-disk snapshot exists for durability across
/// restarts, not for cross-call visibility.
pub struct JsonFileStore {
    root: PathBuf,
    namespaces: RwLock<HashMap<NamespaceKey, HashMap<String, Value>>>,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            namespaces: RwLock::new(HashMap::new()),
        }
    }

    fn namespace_path(&self, nest_id: &str, data_type: &str) -> PathBuf {
        self.root.join(nest_id).join(format!("{data_type}.json"))
    }

    /// Load a namespace from disk into memory if it isn't already resident.
    fn ensure_loaded(&self, key: &NamespaceKey) {
        {
            let ns = self.namespaces.read();
            if ns.contains_key(key) {
                return;
            }
        }
        let path = self.namespace_path(&key.nest_id, &key.data_type);
        let loaded = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "corrupt namespace snapshot, starting fresh");
                HashMap::new()
            }),
            Err(_) => {
                debug!(path = %path.display(), "no namespace snapshot yet, starting fresh");
                HashMap::new()
            }
        };
        self.namespaces.write().entry(key.clone()).or_insert(loaded);
    }

    fn snapshot(&self, key: &NamespaceKey) -> StoreResult<()> {
        let path = self.namespace_path(&key.nest_id, &key.data_type);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let ns = self.namespaces.read();
        let data = ns.get(key).cloned().unwrap_or_default();
        let content = serde_json::to_string_pretty(&data)?;
        std::fs::write(&path, content)?;
        Ok(())
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn put(
        &self,
        nest_id: &str,
        data_type: &str,
        key: &str,
        value: Value,
        _meta: PutMeta,
    ) -> StoreResult<()> {
        let nk = NamespaceKey {
            nest_id: nest_id.to_string(),
            data_type: data_type.to_string(),
        };
        self.ensure_loaded(&nk);
        self.namespaces
            .write()
            .get_mut(&nk)
            .expect("namespace loaded above")
            .insert(key.to_string(), value);
        self.snapshot(&nk)
    }

    async fn get(&self, nest_id: &str, data_type: &str, key: &str) -> StoreResult<Option<Value>> {
        let nk = NamespaceKey {
            nest_id: nest_id.to_string(),
            data_type: data_type.to_string(),
        };
        self.ensure_loaded(&nk);
        Ok(self.namespaces.read().get(&nk).and_then(|m| m.get(key).cloned()))
    }

    async fn delete(&self, nest_id: &str, data_type: &str, key: &str) -> StoreResult<()> {
        let nk = NamespaceKey {
            nest_id: nest_id.to_string(),
            data_type: data_type.to_string(),
        };
        self.ensure_loaded(&nk);
        self.namespaces.write().get_mut(&nk).map(|m| m.remove(key));
        self.snapshot(&nk)
    }

    async fn list_by_type(&self, nest_id: &str, data_type: &str) -> StoreResult<Vec<Value>> {
        let nk = NamespaceKey {
            nest_id: nest_id.to_string(),
            data_type: data_type.to_string(),
        };
        self.ensure_loaded(&nk);
        Ok(self
            .namespaces
            .read()
            .get(&nk)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }
}

/// Helper for callers that want a store rooted at a given directory,
/// creating it if necessary.
pub fn file_store_at(dir: &Path) -> JsonFileStore {
    JsonFileStore::new(dir.to_path_buf())
}
