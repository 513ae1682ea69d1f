//! Inspection commands: `rh collections`, `rh query`, and `rh stats`.
//!
//! These read an existing collection and print to stdout. They never create
//! a collection; asking about a missing one is an error.

use anyhow::{Context, Result};
use std::sync::Arc;

use repo_harness_core::assemble::annotate;
use repo_harness_core::collection::Collection;
use repo_harness_core::models::{RetrievalFilter, SourceType};

use crate::collections::{list_collections, CollectionRegistry, OpenMode};
use crate::config::Config;
use crate::db;
use crate::progress::format_number;

async fn open_existing(registry: &CollectionRegistry, name: &str) -> Result<Arc<Collection>> {
    registry
        .create_or_open(name, OpenMode::Existing)
        .await?
        .with_context(|| format!("collection '{}' not found; run `rh ingest` first", name))
}

pub fn run_collections(config: &Config) -> Result<()> {
    let names = list_collections(&config.data.root)?;
    if names.is_empty() {
        println!("No collections under {}.", config.data.root.display());
        return Ok(());
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

/// Raw similarity search, printed in annotated form with scores.
pub async fn run_query(
    registry: &CollectionRegistry,
    collection: &str,
    text: &str,
    k: usize,
    source_type: Option<SourceType>,
) -> Result<()> {
    let collection = open_existing(registry, collection).await?;
    let filter = source_type.map(RetrievalFilter::source_type);
    let results = collection.query(text, k, filter.as_ref()).await?;

    let blocks = annotate(&results);
    if results.is_empty() {
        println!("{}", blocks.join("\n"));
        return Ok(());
    }
    for (result, block) in results.iter().zip(blocks) {
        let source_type = result
            .fragment
            .source_type()
            .map(|s| s.as_str())
            .unwrap_or("unknown");
        println!("[{:.4}] ({})", result.score, source_type);
        println!("{}", block);
    }
    Ok(())
}

pub async fn run_stats(registry: &CollectionRegistry, collection: &str) -> Result<()> {
    let handle = open_existing(registry, collection).await?;
    let stats = handle.stats().await?;

    let index_path = registry.collection_dir(collection).join(db::INDEX_FILE);
    let index_size = std::fs::metadata(&index_path).map(|m| m.len()).unwrap_or(0);

    println!("Repo Harness: collection '{}'", collection);
    println!();
    println!("  Index:       {}", index_path.display());
    println!("  Size:        {}", format_bytes(index_size));
    println!("  Embedder:    {}", handle.embedder().model_name());
    println!();
    println!("  Fragments:   {}", format_number(stats.fragments));
    println!("  Repo files:  {}", format_number(stats.distinct_paths));

    if !stats.by_source_type.is_empty() {
        println!();
        println!("  By source type:");
        println!("  {:<12} {:>10}", "TYPE", "FRAGMENTS");
        println!("  {}", "-".repeat(23));
        for (source_type, count) in &stats.by_source_type {
            println!("  {:<12} {:>10}", source_type, format_number(*count));
        }
    }
    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
