//! Core data types: documents, fragments, and retrieval filters.
//!
//! Metadata is an open JSON object so provenance fields from the repo
//! adapter and the docs crawler pass through chunking untouched. The
//! handful of keys the pipeline itself reads live in [`keys`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HarnessError;

pub type Metadata = serde_json::Map<String, Value>;

/// Well-known metadata keys.
pub mod keys {
    pub const SOURCE_TYPE: &str = "source_type";
    pub const PATH: &str = "path";
    pub const CHUNK_INDEX: &str = "chunk_index";
    pub const TOTAL_CHUNKS: &str = "total_chunks";
    pub const START_INDEX: &str = "start_index";
    pub const REPO: &str = "repo";
    pub const SUMMARY: &str = "summary";
    pub const TREE: &str = "tree";
    pub const DOCS_BASE: &str = "docs_base";
    pub const SOURCE: &str = "source";
    pub const TITLE: &str = "title";
}

/// Where a document came from. Drives the tool filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Repo,
    Docs,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Repo => "repo",
            SourceType::Docs => "docs",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "repo" => Ok(SourceType::Repo),
            "docs" => Ok(SourceType::Docs),
            other => Err(HarnessError::configuration(format!(
                "unknown source type '{}': expected repo or docs",
                other
            ))),
        }
    }
}

/// A unit of ingested text before chunking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    pub metadata: Metadata,
}

impl Document {
    pub fn new(text: impl Into<String>, source_type: SourceType) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert(
            keys::SOURCE_TYPE.to_string(),
            Value::String(source_type.as_str().to_string()),
        );
        Self {
            text: text.into(),
            metadata,
        }
    }

    /// Attach a string metadata field.
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata
            .insert(key.to_string(), Value::String(value.into()));
        self
    }

    pub fn source_type(&self) -> Option<SourceType> {
        source_type_of(&self.metadata)
    }
}

/// A bounded, contiguous slice of a document plus inherited metadata.
///
/// Immutable once produced by the fragmenter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    /// Deterministic UUIDv5 over source metadata, index, and text.
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    /// SHA-256 of `text`.
    pub hash: String,
}

impl Fragment {
    pub fn chunk_index(&self) -> usize {
        self.usize_field(keys::CHUNK_INDEX)
    }

    pub fn total_chunks(&self) -> usize {
        self.usize_field(keys::TOTAL_CHUNKS)
    }

    /// Char offset of this fragment within its source text.
    pub fn start_index(&self) -> usize {
        self.usize_field(keys::START_INDEX)
    }

    pub fn source_type(&self) -> Option<SourceType> {
        source_type_of(&self.metadata)
    }

    pub fn path(&self) -> Option<&str> {
        self.str_field(keys::PATH)
    }

    pub fn title(&self) -> Option<&str> {
        self.str_field(keys::TITLE).filter(|t| !t.is_empty())
    }

    /// Human label: the repo path, else the page URL, else `"Unknown"`.
    pub fn label(&self) -> &str {
        self.path()
            .filter(|p| !p.is_empty())
            .or_else(|| self.str_field(keys::SOURCE).filter(|s| !s.is_empty()))
            .unwrap_or("Unknown")
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    fn usize_field(&self, key: &str) -> usize {
        self.metadata
            .get(key)
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize
    }
}

/// A fragment with its similarity to the query (higher is closer).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredFragment {
    pub fragment: Fragment,
    pub score: f32,
}

/// Metadata predicate applied at the store-read boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalFilter {
    pub source_type: SourceType,
}

impl RetrievalFilter {
    pub fn source_type(source_type: SourceType) -> Self {
        Self { source_type }
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        source_type_of(metadata) == Some(self.source_type)
    }
}

fn source_type_of(metadata: &Metadata) -> Option<SourceType> {
    metadata
        .get(keys::SOURCE_TYPE)
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
}
