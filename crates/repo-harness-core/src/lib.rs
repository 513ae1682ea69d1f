//! # Repo Harness Core
//!
//! Pure retrieval logic for Repo Harness: data models, the fragmenter,
//! the tagged store adapter, the tool router, and answer assembly.
//!
//! This crate contains no tokio runtime, sqlx, HTTP clients, or
//! filesystem I/O. Concrete stores, embedders, and language models are
//! plugged in through the [`store::Store`], [`embedding::Embedder`], and
//! [`agent::ChatModel`] traits.

pub mod agent;
pub mod assemble;
pub mod chunk;
pub mod collection;
pub mod embedding;
pub mod error;
pub mod models;
pub mod store;

pub use error::{HarnessError, Result};
