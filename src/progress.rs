//! Ingest progress reporting.
//!
//! Progress is emitted on **stderr** so stdout remains parseable for scripts.

use std::io::{IsTerminal, Write};

use repo_harness_core::collection::BatchProgress;

/// A single progress event for ingestion.
#[derive(Clone, Debug)]
pub enum IngestEvent {
    /// Loading a source (repo walk or docs crawl). Total unknown.
    Loading { source: String },
    /// Fragments of `source` are being embedded and committed.
    Writing {
        source: String,
        batch: BatchProgress,
    },
}

/// Reports ingest progress. Implementations write to stderr.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: IngestEvent);
}

/// Human-friendly progress: "ingest repo  batch 2/3  200 / 250 fragments".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: IngestEvent) {
        let line = match &event {
            IngestEvent::Loading { source } => format!("ingest {}  loading...\n", source),
            IngestEvent::Writing { source, batch } => format!(
                "ingest {}  batch {}/{}  {} / {} fragments\n",
                source,
                batch.batch,
                batch.batches,
                format_number(batch.written as u64),
                format_number(batch.total as u64)
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: IngestEvent) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Human progress when stderr is a TTY, otherwise none.
pub fn default_reporter() -> Box<dyn ProgressReporter> {
    if std::io::stderr().is_terminal() {
        Box::new(StderrProgress)
    } else {
        Box::new(NoProgress)
    }
}
