//! Ingestion pipeline orchestration.
//!
//! Coordinates the full flow: repository (and optionally documentation) →
//! documents → fragments → batched embed-and-commit into one collection.
//! A failed documentation crawl is logged and does not fail the run.

use anyhow::{Context, Result};
use tracing::{info, warn};

use repo_harness_core::chunk::chunk_documents;
use repo_harness_core::collection::WriteSummary;
use repo_harness_core::models::Document;

use crate::collections::{CollectionRegistry, OpenMode};
use crate::config::Config;
use crate::docs::DocsCrawler;
use crate::progress::{IngestEvent, ProgressReporter};
use crate::repo;

/// What to ingest.
#[derive(Debug, Clone, Default)]
pub struct IngestRequest {
    pub repo: String,
    pub docs_url: Option<String>,
    /// Falls back to `GITHUB_TOKEN`.
    pub token: Option<String>,
    pub collection: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub repo_documents: usize,
    pub repo: WriteSummary,
    pub docs_documents: usize,
    pub docs: WriteSummary,
    /// Set when the documentation step failed.
    pub docs_error: Option<String>,
}

pub async fn run_ingest(
    config: &Config,
    registry: &CollectionRegistry,
    request: &IngestRequest,
    progress: &dyn ProgressReporter,
) -> Result<IngestReport> {
    let collection = registry
        .create_or_open(&request.collection, OpenMode::CreateIfMissing)
        .await?
        .with_context(|| format!("Failed to create collection '{}'", request.collection))?;

    let params = config.chunking.params();
    let mut report = IngestReport::default();

    // Repository
    progress.report(IngestEvent::Loading {
        source: "repo".to_string(),
    });
    let token = request
        .token
        .clone()
        .or_else(|| std::env::var("GITHUB_TOKEN").ok());
    let resolved = repo::resolve(
        &request.repo,
        token.as_deref(),
        config.repo.branch.as_deref(),
        &config.data.root,
    )?;
    let documents = repo::load_documents(&resolved, &config.repo)?;
    report.repo_documents = documents.len();

    let fragments = chunk_documents(&documents, &params)?;
    info!(
        repo = %request.repo,
        documents = documents.len(),
        fragments = fragments.len(),
        "writing repository fragments"
    );
    report.repo = collection
        .write_with_progress(&fragments, |batch| {
            progress.report(IngestEvent::Writing {
                source: "repo".to_string(),
                batch,
            })
        })
        .await?;

    // Documentation
    if let Some(docs_url) = &request.docs_url {
        progress.report(IngestEvent::Loading {
            source: "docs".to_string(),
        });
        match crawl_docs(config, docs_url).await {
            Ok(documents) => {
                report.docs_documents = documents.len();
                let fragments = chunk_documents(&documents, &params)?;
                info!(
                    docs = %docs_url,
                    documents = documents.len(),
                    fragments = fragments.len(),
                    "writing documentation fragments"
                );
                report.docs = collection
                    .write_with_progress(&fragments, |batch| {
                        progress.report(IngestEvent::Writing {
                            source: "docs".to_string(),
                            batch,
                        })
                    })
                    .await?;
            }
            Err(e) => {
                warn!(docs = %docs_url, error = %e, "documentation ingestion failed, continuing");
                report.docs_error = Some(format!("{:#}", e));
            }
        }
    }

    Ok(report)
}

async fn crawl_docs(config: &Config, docs_url: &str) -> Result<Vec<Document>> {
    DocsCrawler::new(&config.docs)?.crawl(docs_url).await
}

pub fn print_report(request: &IngestRequest, report: &IngestReport) {
    println!("ingest {}", request.repo);
    println!("  collection: {}", request.collection);
    println!("  repo documents: {}", report.repo_documents);
    println!(
        "  repo fragments: {} ({} batches)",
        report.repo.fragments, report.repo.batches
    );
    if let Some(docs_url) = &request.docs_url {
        println!("  docs: {}", docs_url);
        match &report.docs_error {
            Some(err) => println!("  docs skipped: {}", err),
            None => {
                println!("  docs pages: {}", report.docs_documents);
                println!(
                    "  docs fragments: {} ({} batches)",
                    report.docs.fragments, report.docs.batches
                );
            }
        }
    }
    println!("ok");
}
