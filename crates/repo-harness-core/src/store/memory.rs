//! In-memory [`Store`] implementation for tests and embedding in other tools.
//!
//! Rows live in a `Vec` behind `std::sync::RwLock`. Search is brute-force
//! cosine similarity over every stored vector.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{keys, Fragment, RetrievalFilter, ScoredFragment, SourceType};

use super::{Store, StoreStats};

struct StoredFragment {
    fragment: Fragment,
    vector: Vec<f32>,
}

pub struct InMemoryStore {
    rows: RwLock<Vec<StoredFragment>>,
    commits: AtomicUsize,
    batch_sizes: RwLock<Vec<usize>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            commits: AtomicUsize::new(0),
            batch_sizes: RwLock::new(Vec::new()),
        }
    }

    /// Number of successful [`Store::add`] calls.
    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Size of each committed batch, in commit order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes
            .read()
            .map(|sizes| sizes.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn add(&self, fragments: &[Fragment], vectors: &[Vec<f32>]) -> Result<()> {
        if fragments.len() != vectors.len() {
            return Err(anyhow!(
                "batch has {} fragments but {} vectors",
                fragments.len(),
                vectors.len()
            ));
        }
        {
            let mut rows = self
                .rows
                .write()
                .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
            for (fragment, vector) in fragments.iter().zip(vectors) {
                rows.retain(|r| r.fragment.id != fragment.id);
                rows.push(StoredFragment {
                    fragment: fragment.clone(),
                    vector: vector.clone(),
                });
            }
        }
        if let Ok(mut sizes) = self.batch_sizes.write() {
            sizes.push(fragments.len());
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn similarity_search(
        &self,
        query_vec: &[f32],
        k: usize,
        filter: Option<&RetrievalFilter>,
    ) -> Result<Vec<ScoredFragment>> {
        let rows = self
            .rows
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        let mut scored = Vec::new();
        for r in rows
            .iter()
            .filter(|r| filter.map_or(true, |f| f.matches(&r.fragment.metadata)))
        {
            if r.vector.len() != query_vec.len() {
                return Err(anyhow!(
                    "stored vectors have {} dims but the query has {}; re-ingest with the current embedding model",
                    r.vector.len(),
                    query_vec.len()
                ));
            }
            scored.push(ScoredFragment {
                fragment: r.fragment.clone(),
                score: cosine_similarity(query_vec, &r.vector),
            });
        }
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let rows = self
            .rows
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        let mut stats = StoreStats {
            fragments: rows.len() as u64,
            ..StoreStats::default()
        };
        let mut paths = BTreeSet::new();
        for row in rows.iter() {
            let source_type = row
                .fragment
                .str_field(keys::SOURCE_TYPE)
                .unwrap_or("unknown")
                .to_string();
            *stats.by_source_type.entry(source_type).or_insert(0) += 1;
            if row.fragment.source_type() == Some(SourceType::Repo) {
                if let Some(path) = row.fragment.path() {
                    paths.insert(path.to_string());
                }
            }
        }
        stats.distinct_paths = paths.len() as u64;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{chunk_document, ChunkParams};
    use crate::embedding::HashEmbedder;
    use crate::models::Document;

    fn fragments_for(docs: &[Document]) -> Vec<Fragment> {
        docs.iter()
            .flat_map(|d| chunk_document(d, &ChunkParams::default()).unwrap())
            .collect()
    }

    async fn seeded() -> (InMemoryStore, HashEmbedder) {
        let embedder = HashEmbedder::new(128);
        let docs = vec![
            Document::new("fn connect_database() {}", SourceType::Repo).with(keys::PATH, "src/db.rs"),
            Document::new("fn render_ui() {}", SourceType::Repo).with(keys::PATH, "src/ui.rs"),
            Document::new("How to connect the database", SourceType::Docs)
                .with(keys::SOURCE, "https://docs.example.com/db"),
        ];
        let fragments = fragments_for(&docs);
        let vectors: Vec<Vec<f32>> = fragments.iter().map(|f| embedder.embed_one(&f.text)).collect();
        let store = InMemoryStore::new();
        store.add(&fragments, &vectors).await.unwrap();
        (store, embedder)
    }

    #[tokio::test]
    async fn dimension_mismatch_is_an_error() {
        let (store, _) = seeded().await;
        let q = HashEmbedder::new(16).embed_one("database");
        let err = store.similarity_search(&q, 5, None).await.unwrap_err();
        assert!(err.to_string().contains("128 dims"), "{}", err);
    }

    #[tokio::test]
    async fn filter_soundness() {
        let (store, embedder) = seeded().await;
        let q = embedder.embed_one("database");

        let docs_filter = RetrievalFilter::source_type(SourceType::Docs);
        let hits = store.similarity_search(&q, 10, Some(&docs_filter)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits.iter().all(|h| h.fragment.source_type() == Some(SourceType::Docs)));

        let repo_filter = RetrievalFilter::source_type(SourceType::Repo);
        let hits = store.similarity_search(&q, 10, Some(&repo_filter)).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.fragment.source_type() == Some(SourceType::Repo)));
    }

    #[tokio::test]
    async fn search_orders_by_score_and_truncates() {
        let (store, embedder) = seeded().await;
        let q = embedder.embed_one("connect database");
        let hits = store.similarity_search(&q, 2, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn stats_counts_types_and_paths() {
        let (store, _) = seeded().await;
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.fragments, 3);
        assert_eq!(stats.by_source_type.get("repo"), Some(&2));
        assert_eq!(stats.by_source_type.get("docs"), Some(&1));
        assert_eq!(stats.distinct_paths, 2);
        assert_eq!(store.commits(), 1);
    }

    #[tokio::test]
    async fn re_adding_same_fragment_replaces_row() {
        let (store, embedder) = seeded().await;
        let docs = vec![Document::new("fn render_ui() {}", SourceType::Repo).with(keys::PATH, "src/ui.rs")];
        let fragments = fragments_for(&docs);
        let vectors: Vec<Vec<f32>> = fragments.iter().map(|f| embedder.embed_one(&f.text)).collect();
        store.add(&fragments, &vectors).await.unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.commits(), 2);
    }

    #[tokio::test]
    async fn mismatched_vectors_rejected() {
        let store = InMemoryStore::new();
        let fragments = fragments_for(&[Document::new("x", SourceType::Repo)]);
        assert!(store.add(&fragments, &[]).await.is_err());
        assert_eq!(store.commits(), 0);
    }
}
