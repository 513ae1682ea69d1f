//! Named collections under the data root.
//!
//! Each collection lives in its own directory, `<data_root>/<name>/`,
//! holding one SQLite index. The [`CollectionRegistry`] opens collections
//! lazily and caches the handles, so the HTTP server and the stdio bridge
//! share one pool per collection for the life of the process.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use repo_harness_core::agent::Retriever;
use repo_harness_core::collection::Collection;
use repo_harness_core::embedding::Embedder;
use repo_harness_core::models::{RetrievalFilter, ScoredFragment};
use repo_harness_core::HarnessError;

use crate::db;
use crate::migrate;
use crate::sqlite_store::SqliteStore;

/// Names become directory names, so only a safe alphabet is accepted.
pub fn validate_collection_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("collection name must not be empty");
    }
    if name.starts_with('.') {
        bail!("collection name must not start with '.': {}", name);
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        bail!("invalid character {:?} in collection name: {}", c, name);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read paths: a missing collection is `None`, never created.
    Existing,
    /// Ingestion: create the directory and schema on first use.
    CreateIfMissing,
}

pub struct CollectionRegistry {
    data_root: PathBuf,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    cache: Mutex<HashMap<String, Arc<Collection>>>,
}

impl CollectionRegistry {
    pub fn new(data_root: impl Into<PathBuf>, embedder: Arc<dyn Embedder>, batch_size: usize) -> Self {
        Self {
            data_root: data_root.into(),
            embedder,
            batch_size,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn collection_dir(&self, name: &str) -> PathBuf {
        self.data_root.join(name)
    }

    /// Open collection `name`. With [`OpenMode::Existing`], returns
    /// `Ok(None)` when no index has been written yet.
    pub async fn create_or_open(&self, name: &str, mode: OpenMode) -> Result<Option<Arc<Collection>>> {
        validate_collection_name(name)?;

        let mut cache = self.cache.lock().await;
        if let Some(collection) = cache.get(name) {
            return Ok(Some(collection.clone()));
        }

        let dir = self.collection_dir(name);
        if mode == OpenMode::Existing && !dir.join(db::INDEX_FILE).exists() {
            debug!(collection = name, "collection not found");
            return Ok(None);
        }

        let pool = db::connect(&dir).await?;
        migrate::run_migrations(&pool).await?;
        let store = Arc::new(SqliteStore::new(pool, self.embedder.model_name()));
        let collection = Arc::new(Collection::new(
            name,
            store,
            self.embedder.clone(),
            self.batch_size,
        )?);

        debug!(collection = name, dir = %dir.display(), "opened collection");
        cache.insert(name.to_string(), collection.clone());
        Ok(Some(collection))
    }
}

/// Names of every collection under `data_root` that has an index, sorted.
pub fn list_collections(data_root: &Path) -> Result<Vec<String>> {
    if !data_root.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(data_root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if validate_collection_name(&name).is_ok() && entry.path().join(db::INDEX_FILE).exists() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// [`Retriever`] over one named collection that tolerates the collection
/// not existing yet. The agent is built at startup, possibly before any
/// ingestion has run.
pub struct RegistryRetriever {
    registry: Arc<CollectionRegistry>,
    name: String,
}

impl RegistryRetriever {
    pub fn new(registry: Arc<CollectionRegistry>, name: impl Into<String>) -> Self {
        Self {
            registry,
            name: name.into(),
        }
    }
}

#[async_trait]
impl Retriever for RegistryRetriever {
    async fn retrieve(
        &self,
        query: &str,
        k: usize,
        filter: Option<&RetrievalFilter>,
    ) -> repo_harness_core::Result<Option<Vec<ScoredFragment>>> {
        let collection = self
            .registry
            .create_or_open(&self.name, OpenMode::Existing)
            .await
            .map_err(HarnessError::store)?;
        match collection {
            Some(collection) => collection.query(query, k, filter).await.map(Some),
            None => Ok(None),
        }
    }
}
