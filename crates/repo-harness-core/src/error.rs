//! Error taxonomy shared by the pipeline, the router, and the transports.
//!
//! Transports map each variant to a status: HTTP picks a response code,
//! the stdio server turns store failures into text blocks. An empty
//! result set is not an error; it is rendered as
//! [`NO_RESULTS`](crate::assemble::NO_RESULTS).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    /// Invalid parameters, unknown tool names, or a router with no tools.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The persisted index could not be opened, migrated, or queried.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The embedding service or language model failed or returned garbage.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Iteration cap exceeded or the caller's deadline expired.
    #[error("timed out: {0}")]
    Timeout(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl HarnessError {
    /// Machine-readable code used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            HarnessError::Configuration(_) => "configuration",
            HarnessError::StoreUnavailable(_) => "store_unavailable",
            HarnessError::Upstream(_) => "upstream",
            HarnessError::Timeout(_) => "timeout",
            HarnessError::InvalidRequest(_) => "bad_request",
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        HarnessError::Configuration(msg.into())
    }

    pub fn store(err: impl std::fmt::Display) -> Self {
        HarnessError::StoreUnavailable(err.to_string())
    }

    pub fn upstream(err: impl std::fmt::Display) -> Self {
        HarnessError::Upstream(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
