//! Vector store abstraction.
//!
//! The [`Store`] trait is the persistence seam of the write and read
//! paths: a batch of fragments and their vectors goes in as one commit,
//! and similarity search comes out, optionally scoped by a
//! [`RetrievalFilter`].
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::{Fragment, RetrievalFilter, ScoredFragment};

/// Counts describing a collection's contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub fragments: u64,
    /// Fragment count per `source_type` value.
    pub by_source_type: BTreeMap<String, u64>,
    /// Number of distinct `path` values among repo fragments.
    pub distinct_paths: u64,
}

/// Abstract storage backend for one collection.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`add`](Store::add) | Persist one batch of fragments with their vectors |
/// | [`similarity_search`](Store::similarity_search) | Top-k by cosine similarity |
/// | [`stats`](Store::stats) | Counts for inspection |
#[async_trait]
pub trait Store: Send + Sync {
    /// Persist `fragments[i]` with `vectors[i]`. One call is one commit:
    /// either the whole batch is visible afterwards or none of it.
    async fn add(&self, fragments: &[Fragment], vectors: &[Vec<f32>]) -> Result<()>;

    /// At most `k` fragments ordered by descending similarity. A filter
    /// restricts candidates before ranking.
    async fn similarity_search(
        &self,
        query_vec: &[f32],
        k: usize,
        filter: Option<&RetrievalFilter>,
    ) -> Result<Vec<ScoredFragment>>;

    async fn stats(&self) -> Result<StoreStats>;
}
