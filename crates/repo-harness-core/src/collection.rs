//! Tagged document store adapter.
//!
//! A [`Collection`] pairs a [`Store`] with an [`Embedder`] under a name.
//! The write path embeds and commits fragments in fixed-size batches; the
//! read path embeds the query and runs a similarity search scoped by an
//! optional [`RetrievalFilter`].
//!
//! Batches are committed strictly in order. A failure stops the write and
//! leaves every earlier batch persisted; there is no cross-batch rollback.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::agent::Retriever;
use crate::embedding::Embedder;
use crate::error::{HarnessError, Result};
use crate::models::{Fragment, RetrievalFilter, ScoredFragment};
use crate::store::{Store, StoreStats};

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Outcome of a completed write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub fragments: usize,
    pub batches: usize,
}

/// Reported after each committed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// 1-based index of the batch just committed.
    pub batch: usize,
    pub batches: usize,
    /// Fragments committed so far.
    pub written: usize,
    pub total: usize,
}

pub struct Collection {
    name: String,
    store: Arc<dyn Store>,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
}

impl Collection {
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn Store>,
        embedder: Arc<dyn Embedder>,
        batch_size: usize,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(HarnessError::configuration("batch_size must be > 0"));
        }
        Ok(Self {
            name: name.into(),
            store,
            embedder,
            batch_size,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Embed and commit `fragments` in batches of `batch_size`.
    pub async fn write(&self, fragments: &[Fragment]) -> Result<WriteSummary> {
        self.write_with_progress(fragments, |_| {}).await
    }

    /// Like [`write`](Self::write), calling `on_batch` after every commit.
    pub async fn write_with_progress<F>(
        &self,
        fragments: &[Fragment],
        mut on_batch: F,
    ) -> Result<WriteSummary>
    where
        F: FnMut(BatchProgress) + Send,
    {
        let total = fragments.len();
        let batches = total.div_ceil(self.batch_size);
        let mut summary = WriteSummary::default();

        for (i, batch) in fragments.chunks(self.batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|f| f.text.clone()).collect();
            let vectors = self
                .embedder
                .embed(&texts)
                .await
                .map_err(HarnessError::upstream)?;
            if vectors.len() != batch.len() {
                return Err(HarnessError::Upstream(format!(
                    "embedder returned {} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                )));
            }

            self.store
                .add(batch, &vectors)
                .await
                .map_err(HarnessError::store)?;

            summary.batches += 1;
            summary.fragments += batch.len();
            debug!(
                collection = %self.name,
                batch = i + 1,
                batches,
                written = summary.fragments,
                "committed batch"
            );
            on_batch(BatchProgress {
                batch: i + 1,
                batches,
                written: summary.fragments,
                total,
            });
        }

        Ok(summary)
    }

    /// Top `k` fragments for `text`, restricted by `filter` when given.
    pub async fn query(
        &self,
        text: &str,
        k: usize,
        filter: Option<&RetrievalFilter>,
    ) -> Result<Vec<ScoredFragment>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = self
            .embedder
            .embed(&[text.to_string()])
            .await
            .map_err(HarnessError::upstream)?
            .into_iter()
            .next()
            .ok_or_else(|| HarnessError::upstream("empty embedding response"))?;

        let mut results = self
            .store
            .similarity_search(&query_vec, k, filter)
            .await
            .map_err(HarnessError::store)?;
        results.truncate(k);
        debug!(
            collection = %self.name,
            k,
            filter = ?filter.map(|f| f.source_type),
            hits = results.len(),
            "similarity search"
        );
        Ok(results)
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        self.store.stats().await.map_err(HarnessError::store)
    }
}

#[async_trait]
impl Retriever for Collection {
    async fn retrieve(
        &self,
        query: &str,
        k: usize,
        filter: Option<&RetrievalFilter>,
    ) -> Result<Option<Vec<ScoredFragment>>> {
        self.query(query, k, filter).await.map(Some)
    }
}
