//! SQLite-backed [`Store`] implementation.
//!
//! One database per collection. Each [`Store::add`] call runs in a single
//! transaction, so a batch is either fully visible or absent. Vectors are
//! stored as little-endian `f32` BLOBs and ranked by brute-force cosine
//! similarity.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use repo_harness_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use repo_harness_core::models::{Fragment, Metadata, RetrievalFilter, ScoredFragment};
use repo_harness_core::store::{Store, StoreStats};

pub struct SqliteStore {
    pool: SqlitePool,
    model: String,
}

impl SqliteStore {
    /// `model` is recorded on every row written through this store.
    pub fn new(pool: SqlitePool, model: impl Into<String>) -> Self {
        Self {
            pool,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn add(&self, fragments: &[Fragment], vectors: &[Vec<f32>]) -> Result<()> {
        if fragments.len() != vectors.len() {
            bail!(
                "batch has {} fragments but {} vectors",
                fragments.len(),
                vectors.len()
            );
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for (fragment, vector) in fragments.iter().zip(vectors) {
            let metadata_json = serde_json::to_string(&fragment.metadata)?;
            let source_type = fragment
                .source_type()
                .map(|s| s.as_str())
                .unwrap_or("unknown");

            sqlx::query(
                r#"
                INSERT INTO fragments (id, text, metadata_json, source_type, path,
                                       chunk_index, total_chunks, hash, embedding,
                                       model, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    text = excluded.text,
                    metadata_json = excluded.metadata_json,
                    source_type = excluded.source_type,
                    path = excluded.path,
                    chunk_index = excluded.chunk_index,
                    total_chunks = excluded.total_chunks,
                    hash = excluded.hash,
                    embedding = excluded.embedding,
                    model = excluded.model
                "#,
            )
            .bind(&fragment.id)
            .bind(&fragment.text)
            .bind(&metadata_json)
            .bind(source_type)
            .bind(fragment.path())
            .bind(fragment.chunk_index() as i64)
            .bind(fragment.total_chunks() as i64)
            .bind(&fragment.hash)
            .bind(vec_to_blob(vector))
            .bind(&self.model)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn similarity_search(
        &self,
        query_vec: &[f32],
        k: usize,
        filter: Option<&RetrievalFilter>,
    ) -> Result<Vec<ScoredFragment>> {
        let rows = match filter {
            Some(f) => {
                sqlx::query(
                    "SELECT id, text, metadata_json, hash, embedding, model FROM fragments WHERE source_type = ?",
                )
                .bind(f.source_type.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT id, text, metadata_json, hash, embedding, model FROM fragments")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut scored = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            let vector = blob_to_vec(&blob);
            if vector.len() != query_vec.len() {
                let stored_model: String = row.get("model");
                bail!(
                    "index was embedded with '{}' ({} dims) but the query uses '{}' ({} dims); \
                     re-ingest with the current embedding model",
                    stored_model,
                    vector.len(),
                    self.model,
                    query_vec.len()
                );
            }
            let metadata_json: String = row.get("metadata_json");
            let metadata: Metadata = serde_json::from_str(&metadata_json)?;
            scored.push(ScoredFragment {
                score: cosine_similarity(query_vec, &vector),
                fragment: Fragment {
                    id: row.get("id"),
                    text: row.get("text"),
                    metadata,
                    hash: row.get("hash"),
                },
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
        let fragments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM fragments")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(
            "SELECT source_type, COUNT(*) AS n FROM fragments GROUP BY source_type ORDER BY source_type",
        )
        .fetch_all(&self.pool)
        .await?;
        let by_source_type: BTreeMap<String, u64> = rows
            .iter()
            .map(|row| {
                let n: i64 = row.get("n");
                (row.get::<String, _>("source_type"), n as u64)
            })
            .collect();

        let distinct_paths: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT path) FROM fragments WHERE source_type = 'repo' AND path IS NOT NULL",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(StoreStats {
            fragments: fragments as u64,
            by_source_type,
            distinct_paths: distinct_paths as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, migrate};
    use repo_harness_core::chunk::{chunk_documents, ChunkParams};
    use repo_harness_core::embedding::HashEmbedder;
    use repo_harness_core::models::{keys, Document, SourceType};

    async fn store_in(dir: &std::path::Path) -> SqliteStore {
        let pool = db::connect(dir).await.unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        SqliteStore::new(pool, "hash")
    }

    fn sample() -> Vec<Fragment> {
        let docs = vec![
            Document::new("pub fn open_pool() {}", SourceType::Repo).with(keys::PATH, "src/db.rs"),
            Document::new("pub fn serve() {}", SourceType::Repo).with(keys::PATH, "src/server.rs"),
            Document::new("Start the server with rh serve http", SourceType::Docs)
                .with(keys::SOURCE, "https://docs.example.com/serve")
                .with(keys::TITLE, "Serving"),
        ];
        chunk_documents(&docs, &ChunkParams::default()).unwrap()
    }

    #[tokio::test]
    async fn add_search_and_stats() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = store_in(tmp.path()).await;
        let embedder = HashEmbedder::new(64);
        let fragments = sample();
        let vectors: Vec<Vec<f32>> = fragments.iter().map(|f| embedder.embed_one(&f.text)).collect();
        store.add(&fragments, &vectors).await.unwrap();

        let q = embedder.embed_one("serve");
        let docs_only = store
            .similarity_search(&q, 10, Some(&RetrievalFilter::source_type(SourceType::Docs)))
            .await
            .unwrap();
        assert_eq!(docs_only.len(), 1);
        assert_eq!(docs_only[0].fragment.title(), Some("Serving"));

        let all = store.similarity_search(&q, 2, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].score >= all[1].score);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.fragments, 3);
        assert_eq!(stats.by_source_type.get("repo"), Some(&2));
        assert_eq!(stats.by_source_type.get("docs"), Some(&1));
        assert_eq!(stats.distinct_paths, 2);
    }

    #[tokio::test]
    async fn re_adding_upserts() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = store_in(tmp.path()).await;
        let embedder = HashEmbedder::new(16);
        let fragments = sample();
        let vectors: Vec<Vec<f32>> = fragments.iter().map(|f| embedder.embed_one(&f.text)).collect();
        store.add(&fragments, &vectors).await.unwrap();
        store.add(&fragments, &vectors).await.unwrap();
        assert_eq!(store.stats().await.unwrap().fragments, 3);
    }

    #[tokio::test]
    async fn metadata_round_trips() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = store_in(tmp.path()).await;
        let fragments = sample();
        let vectors = vec![vec![1.0, 0.0]; fragments.len()];
        store.add(&fragments, &vectors).await.unwrap();

        let hits = store
            .similarity_search(&[1.0, 0.0], 10, Some(&RetrievalFilter::source_type(SourceType::Repo)))
            .await
            .unwrap();
        let paths: Vec<_> = hits.iter().filter_map(|h| h.fragment.path()).collect();
        assert!(paths.contains(&"src/db.rs"));
        assert!(hits.iter().all(|h| h.fragment.total_chunks() == 1));
    }

    #[tokio::test]
    async fn search_with_other_dimensions_fails() {
        let tmp = tempfile::TempDir::new().unwrap();
        let writer = store_in(tmp.path()).await;
        let small = HashEmbedder::new(8);
        let fragments = sample();
        let vectors: Vec<Vec<f32>> = fragments.iter().map(|f| small.embed_one(&f.text)).collect();
        writer.add(&fragments, &vectors).await.unwrap();

        let pool = db::connect(tmp.path()).await.unwrap();
        let reader = SqliteStore::new(pool, "text-embedding-3-small");
        let q = HashEmbedder::new(16).embed_one("serve");
        let err = reader.similarity_search(&q, 5, None).await.unwrap_err().to_string();
        assert!(err.contains("'hash' (8 dims)"), "{}", err);
        assert!(err.contains("'text-embedding-3-small' (16 dims)"), "{}", err);
    }
}
