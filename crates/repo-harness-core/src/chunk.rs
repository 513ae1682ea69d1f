//! Recursive-separator text fragmenter with overlap.
//!
//! Splits a [`Document`] into [`Fragment`]s of at most `chunk_size`
//! characters, carrying up to `chunk_overlap` characters of trailing
//! context from one fragment into the next.
//!
//! Each fragment receives a deterministic UUID derived from its source
//! metadata, index and text, plus a SHA-256 hash of its text. Re-ingesting
//! unchanged content therefore yields the same ids.
//!
//! # Algorithm
//!
//! 1. **Split.** A worklist holds `(span, tier)` pairs. A span that fits
//!    in `chunk_size` becomes a unit. A larger span is cut on the first
//!    separator from [`SEPARATORS`] (starting at its tier) that occurs in
//!    it, keeping the separator at the end of each piece; the pieces go
//!    back on the worklist one tier lower. The last tier (`""`) cuts into
//!    single characters.
//! 2. **Merge.** Units are appended to a window while it stays within
//!    `chunk_size`. When the next unit would overflow, the window is
//!    emitted and units are dropped from its front until at most
//!    `chunk_overlap` characters remain and the next unit fits.
//!
//! Lengths are counted in `char`s; fragment text is always an exact
//! slice of the source, so overlap-trimmed concatenation reproduces it.
//!
//! # Example
//!
//! ```rust
//! use repo_harness_core::chunk::{chunk_document, ChunkParams};
//! use repo_harness_core::models::{Document, SourceType};
//!
//! let doc = Document::new("Hello world.\n\nSecond paragraph.", SourceType::Repo);
//! let fragments = chunk_document(&doc, &ChunkParams::default()).unwrap();
//! assert_eq!(fragments.len(), 1);
//! assert_eq!(fragments[0].chunk_index(), 0);
//! ```

use std::collections::VecDeque;

use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{HarnessError, Result};
use crate::models::{keys, Document, Fragment, Metadata};

/// Separator hierarchy, coarsest first. `""` means "anywhere".
pub const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

pub const DEFAULT_CHUNK_SIZE: usize = 800;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    /// Maximum fragment length in characters.
    pub chunk_size: usize,
    /// Maximum characters shared between consecutive fragments.
    pub chunk_overlap: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkParams {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(HarnessError::configuration("chunk_size must be > 0"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(HarnessError::configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// A contiguous piece of the source: byte range plus char length and offset.
#[derive(Debug, Clone, Copy)]
struct Unit {
    start: usize,
    end: usize,
    chars: usize,
    char_offset: usize,
}

/// Split one document into ordered, overlapping fragments.
///
/// # Errors
///
/// [`HarnessError::Configuration`] when `chunk_size == 0` or
/// `chunk_overlap >= chunk_size`.
///
/// # Guarantees
///
/// - Empty text yields no fragments.
/// - Text within `chunk_size` yields exactly one fragment equal to it.
/// - Indices are contiguous `0..n` and every fragment has `total_chunks = n`.
pub fn chunk_document(document: &Document, params: &ChunkParams) -> Result<Vec<Fragment>> {
    params.validate()?;

    let text = document.text.as_str();
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let units = split_units(text, params.chunk_size);
    let windows = merge_units(&units, params);

    let total = windows.len();
    let fragments = windows
        .into_iter()
        .enumerate()
        .map(|(index, (start, end, char_offset))| {
            make_fragment(&document.metadata, index, total, char_offset, &text[start..end])
        })
        .collect();

    Ok(fragments)
}

/// Chunk many documents, concatenating their fragments in input order.
pub fn chunk_documents(documents: &[Document], params: &ChunkParams) -> Result<Vec<Fragment>> {
    let mut all = Vec::new();
    for doc in documents {
        all.extend(chunk_document(doc, params)?);
    }
    Ok(all)
}

/// Break `text` into units no longer than `max_chars`, in source order.
fn split_units(text: &str, max_chars: usize) -> Vec<Unit> {
    let mut raw: Vec<(usize, usize)> = Vec::new();
    let mut work: Vec<(usize, usize, usize)> = vec![(0, text.len(), 0)];

    while let Some((start, end, tier)) = work.pop() {
        let span = &text[start..end];
        if span.chars().count() <= max_chars {
            raw.push((start, end));
            continue;
        }

        let found = SEPARATORS[tier..]
            .iter()
            .enumerate()
            .find(|(_, sep)| !sep.is_empty() && span.contains(**sep))
            .map(|(offset, sep)| (tier + offset, *sep));

        match found {
            Some((sep_tier, sep)) => {
                let mut pieces = Vec::new();
                let mut cursor = start;
                for piece in span.split_inclusive(sep) {
                    pieces.push((cursor, cursor + piece.len()));
                    cursor += piece.len();
                }
                // Stack: push in reverse so pieces pop in source order.
                for (s, e) in pieces.into_iter().rev() {
                    work.push((s, e, sep_tier + 1));
                }
            }
            None => {
                for (offset, ch) in span.char_indices() {
                    raw.push((start + offset, start + offset + ch.len_utf8()));
                }
            }
        }
    }

    let mut char_offset = 0;
    raw.into_iter()
        .map(|(start, end)| {
            let chars = text[start..end].chars().count();
            let unit = Unit {
                start,
                end,
                chars,
                char_offset,
            };
            char_offset += chars;
            unit
        })
        .collect()
}

/// Greedy merge with overlap. Returns `(byte_start, byte_end, char_offset)`.
fn merge_units(units: &[Unit], params: &ChunkParams) -> Vec<(usize, usize, usize)> {
    let mut windows = Vec::new();
    let mut window: VecDeque<Unit> = VecDeque::new();
    let mut total = 0usize;

    for unit in units {
        if total + unit.chars > params.chunk_size && !window.is_empty() {
            windows.push(span_of(&window));
            while total > params.chunk_overlap
                || (total + unit.chars > params.chunk_size && total > 0)
            {
                match window.pop_front() {
                    Some(dropped) => total -= dropped.chars,
                    None => break,
                }
            }
        }
        window.push_back(*unit);
        total += unit.chars;
    }

    if !window.is_empty() {
        windows.push(span_of(&window));
    }
    windows
}

fn span_of(window: &VecDeque<Unit>) -> (usize, usize, usize) {
    match (window.front(), window.back()) {
        (Some(first), Some(last)) => (first.start, last.end, first.char_offset),
        _ => (0, 0, 0),
    }
}

/// Build a [`Fragment`] with a deterministic id and SHA-256 content hash.
fn make_fragment(
    source: &Metadata,
    index: usize,
    total: usize,
    start_index: usize,
    text: &str,
) -> Fragment {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    let identity = format!("{}\u{0}{}\u{0}{}", Value::Object(source.clone()), index, hash);
    let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, identity.as_bytes()).to_string();

    let mut metadata = source.clone();
    metadata.insert(keys::CHUNK_INDEX.to_string(), Value::from(index));
    metadata.insert(keys::TOTAL_CHUNKS.to_string(), Value::from(total));
    metadata.insert(keys::START_INDEX.to_string(), Value::from(start_index));

    Fragment {
        id,
        text: text.to_string(),
        metadata,
        hash,
    }
}
